//! JSON fixtures: a self-contained snapshot of assessments, exams, and
//! accommodations for driving assembly without the sibling services.
//!
//! ```json
//! {
//!   "assessments": [ { "key": "(SBAC)MATH-3", "segments": [ ... ] } ],
//!   "exams": [ { "id": "exam-1", "assessment_key": "(SBAC)MATH-3", ... } ],
//!   "accommodations": [ { "exam_id": "exam-1", "type": "Language", "code": "ENU" } ]
//! }
//! ```

use proctor_core::assessment::Assessment;
use proctor_core::error::StoreError;
use proctor_core::exam::{Accommodation, Exam};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::in_memory::{InMemoryAccommodationProvider, InMemoryAssessmentProvider};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub exams: Vec<Exam>,
    #[serde(default)]
    pub accommodations: Vec<Accommodation>,
}

impl Fixture {
    /// Read and validate a fixture file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Storage(format!("Failed to read fixture {}: {e}", path.display()))
        })?;
        let fixture = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            assessments = fixture.assessments.len(),
            exams = fixture.exams.len(),
            "Fixture loaded"
        );
        Ok(fixture)
    }

    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        let fixture: Self = serde_json::from_str(content)
            .map_err(|e| StoreError::QueryFailed(format!("Invalid fixture: {e}")))?;
        for exam in &fixture.exams {
            exam.validate()
                .map_err(|e| StoreError::QueryFailed(format!("Invalid fixture: {e}")))?;
        }
        Ok(fixture)
    }

    pub fn exam(&self, id: &str) -> Option<&Exam> {
        self.exams.iter().find(|e| e.id == id)
    }

    /// Build in-memory providers seeded with this fixture's content.
    pub fn providers(&self) -> (InMemoryAssessmentProvider, InMemoryAccommodationProvider) {
        (
            InMemoryAssessmentProvider::with_assessments(self.assessments.iter().cloned()),
            InMemoryAccommodationProvider::with_accommodations(self.accommodations.iter().cloned()),
        )
    }
}
