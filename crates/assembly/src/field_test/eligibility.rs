use proctor_core::assessment::{Assessment, Segment};
use proctor_core::clock::Clock;
use proctor_core::exam::Exam;
use std::sync::Arc;
use tracing::debug;

/// Decides whether field-test items may be embedded in an exam segment.
#[derive(Clone)]
pub struct FieldTestEligibility {
    clock: Arc<dyn Clock>,
}

impl FieldTestEligibility {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Field-test items in `language` exist, the segment asks for some, and
    /// the exam falls inside the eligibility windows.
    ///
    /// Simulation exams skip the window checks. The segment window only
    /// applies to segmented assessments whose own window already passed.
    pub fn is_field_test_eligible(
        &self,
        exam: &Exam,
        assessment: &Assessment,
        segment: &Segment,
        language: &str,
    ) -> bool {
        if segment.field_test_items(language).next().is_none() {
            debug!(segment_key = %segment.key, language, "No field test items in language");
            return false;
        }
        if segment.field_test.min_items <= 0 {
            return false;
        }
        if exam.is_simulation() {
            return true;
        }

        let now = self.clock.now();
        let in_assessment_window = assessment.field_test_window.contains(now);
        if !assessment.is_segmented() || !in_assessment_window {
            return in_assessment_window;
        }
        segment.field_test.window.contains(now)
    }
}
