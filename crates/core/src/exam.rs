//! Exams and the accommodations granted to them.
//!
//! An [`Exam`] is one test-taker's attempt at an assessment. Assembly only
//! reads it; the exam lifecycle (pause/resume/complete) lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Accommodation type that carries the exam's delivery language.
pub const LANGUAGE_ACCOMMODATION_TYPE: &str = "Language";

/// Where the exam is being administered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    /// Simulated administrations bypass field-test date windows.
    Simulation,
    Development,
}

/// A single exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub assessment_key: String,
    pub language_code: String,
    #[serde(default)]
    pub environment: Environment,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Exam {
    pub fn new(
        id: impl Into<String>,
        assessment_key: impl Into<String>,
        language_code: impl Into<String>,
        environment: Environment,
        session_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        let exam = Self {
            id: id.into(),
            assessment_key: assessment_key.into(),
            language_code: language_code.into(),
            environment,
            session_id: session_id.into(),
            created_at,
        };
        exam.validate()?;
        Ok(exam)
    }

    /// Check the invariants a deserialized exam may have skipped.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.id.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue("exam id must not be empty".into()));
        }
        if self.assessment_key.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(format!(
                "exam {} has no assessment key",
                self.id
            )));
        }
        Ok(())
    }

    pub fn is_simulation(&self) -> bool {
        self.environment == Environment::Simulation
    }
}

/// An accommodation granted (or denied) to one exam.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accommodation {
    pub exam_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    #[serde(default)]
    pub denied: bool,
}

impl Accommodation {
    pub fn new(exam_id: impl Into<String>, kind: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            kind: kind.into(),
            code: code.into(),
            denied: false,
        }
    }

    /// Same accommodation, marked as denied.
    pub fn denied(mut self) -> Self {
        self.denied = true;
        self
    }

    pub fn is_approved(&self) -> bool {
        !self.denied
    }

    pub fn is_language(&self) -> bool {
        self.kind == LANGUAGE_ACCOMMODATION_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_requires_id() {
        let result = Exam::new("", "(SBAC)ELA-3", "ENU", Environment::Production, "s1", Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn environment_deserializes_snake_case() {
        let env: Environment = serde_json::from_str("\"simulation\"").unwrap();
        assert_eq!(env, Environment::Simulation);
    }

    #[test]
    fn accommodation_uses_type_on_the_wire() {
        let acc = Accommodation::new("exam-1", "Language", "ENU");
        let json = serde_json::to_string(&acc).unwrap();
        assert!(json.contains("\"type\":\"Language\""));
        assert!(acc.is_language());
        assert!(acc.is_approved());
        assert!(!acc.denied().is_approved());
    }
}
