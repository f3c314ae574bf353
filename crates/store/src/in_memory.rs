//! In-memory collaborators for tests and ephemeral CLI runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::assessment::Assessment;
use proctor_core::error::StoreError;
use proctor_core::exam::Accommodation;
use proctor_core::provider::{AccommodationProvider, AssessmentProvider, SegmentStore};
use proctor_core::segment::{ExamSegment, ExamSegmentUpdate, FieldTestItemGroup};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ledger::{LedgerRecord, SegmentLedger};

/// Assessments held in a map keyed by assessment key.
pub struct InMemoryAssessmentProvider {
    assessments: Arc<RwLock<HashMap<String, Assessment>>>,
}

impl InMemoryAssessmentProvider {
    pub fn new() -> Self {
        Self {
            assessments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_assessments(assessments: impl IntoIterator<Item = Assessment>) -> Self {
        let map = assessments.into_iter().map(|a| (a.key.clone(), a)).collect();
        Self {
            assessments: Arc::new(RwLock::new(map)),
        }
    }

    /// Insert or replace an assessment.
    pub async fn insert(&self, assessment: Assessment) {
        self.assessments.write().await.insert(assessment.key.clone(), assessment);
    }
}

impl Default for InMemoryAssessmentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssessmentProvider for InMemoryAssessmentProvider {
    fn name(&self) -> &str { "in_memory" }

    async fn find_assessment(&self, key: &str) -> Result<Option<Assessment>, StoreError> {
        Ok(self.assessments.read().await.get(key).cloned())
    }
}

/// Accommodations held in a flat list; denied ones are filtered on read.
pub struct InMemoryAccommodationProvider {
    accommodations: Arc<RwLock<Vec<Accommodation>>>,
}

impl InMemoryAccommodationProvider {
    pub fn new() -> Self {
        Self {
            accommodations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_accommodations(accommodations: impl IntoIterator<Item = Accommodation>) -> Self {
        Self {
            accommodations: Arc::new(RwLock::new(accommodations.into_iter().collect())),
        }
    }

    pub async fn grant(&self, accommodation: Accommodation) {
        self.accommodations.write().await.push(accommodation);
    }
}

impl Default for InMemoryAccommodationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccommodationProvider for InMemoryAccommodationProvider {
    fn name(&self) -> &str { "in_memory" }

    async fn approved_accommodations(&self, exam_id: &str) -> Result<Vec<Accommodation>, StoreError> {
        let accommodations = self.accommodations.read().await;
        Ok(accommodations
            .iter()
            .filter(|a| a.exam_id == exam_id && a.is_approved())
            .cloned()
            .collect())
    }
}

/// A segment store that folds its record log in memory.
///
/// Batches are validated in full before any record is applied, so a failed
/// insert leaves the store untouched.
pub struct InMemorySegmentStore {
    ledger: Arc<RwLock<SegmentLedger>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(RwLock::new(SegmentLedger::default())),
        }
    }

    /// Total segment rows ever inserted, across all exams.
    pub async fn segment_count(&self) -> usize {
        self.ledger.read().await.segment_count()
    }

    /// Total field-test group rows ever inserted, including deleted ones.
    pub async fn group_count(&self) -> usize {
        self.ledger.read().await.group_count()
    }
}

impl Default for InMemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    fn name(&self) -> &str { "in_memory" }

    async fn insert_segments(&self, segments: Vec<ExamSegment>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_segments(&segments)?;
        debug!(count = segments.len(), "Inserting exam segments");
        for segment in segments {
            ledger.apply(LedgerRecord::Segment(segment));
        }
        Ok(())
    }

    async fn insert_assembly(
        &self,
        segments: Vec<ExamSegment>,
        groups: Vec<FieldTestItemGroup>,
    ) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_assembly(&segments, &groups)?;
        debug!(segments = segments.len(), groups = groups.len(), "Inserting exam assembly");
        for group in groups {
            ledger.apply(LedgerRecord::FieldTestGroup(group));
        }
        for segment in segments {
            ledger.apply(LedgerRecord::Segment(segment));
        }
        Ok(())
    }

    async fn update_segments(&self, updates: Vec<ExamSegmentUpdate>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_updates(&updates)?;
        for update in updates {
            ledger.apply(LedgerRecord::SegmentUpdate(update));
        }
        Ok(())
    }

    async fn find_segments(&self, exam_id: &str) -> Result<Vec<ExamSegment>, StoreError> {
        Ok(self.ledger.read().await.segments_for(exam_id))
    }

    async fn insert_field_test_groups(&self, groups: Vec<FieldTestItemGroup>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_groups(&groups)?;
        for group in groups {
            ledger.apply(LedgerRecord::FieldTestGroup(group));
        }
        Ok(())
    }

    async fn find_field_test_groups(
        &self,
        exam_id: &str,
        segment_key: &str,
    ) -> Result<Vec<FieldTestItemGroup>, StoreError> {
        Ok(self.ledger.read().await.groups_for(exam_id, segment_key))
    }

    async fn mark_groups_administered(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self.ledger.write().await.apply(LedgerRecord::GroupsAdministered {
            exam_id: exam_id.to_string(),
            group_keys: group_keys.to_vec(),
            at,
        }))
    }

    async fn delete_field_test_groups(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self.ledger.write().await.apply(LedgerRecord::GroupsDeleted {
            exam_id: exam_id.to_string(),
            group_keys: group_keys.to_vec(),
            at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::assessment::{FieldTestSettings, Segment, SelectionAlgorithm};
    use proctor_core::exam::{Environment, Exam};
    use proctor_core::segment::SegmentPool;

    fn exam() -> Exam {
        Exam::new("exam-1", "(SBAC)MATH-3", "ENU", Environment::Production, "session-1", Utc::now()).unwrap()
    }

    fn exam_segment(position: u32) -> ExamSegment {
        let segment = Segment {
            key: format!("SEG-{position}"),
            id: format!("SEG-{position}"),
            position,
            algorithm: SelectionAlgorithm::Adaptive,
            min_items: 0,
            max_items: 10,
            items: vec![],
            strands: vec![],
            forms: vec![],
            field_test: FieldTestSettings::default(),
        };
        let pool = SegmentPool {
            length: 10,
            pool_count: 30,
            item_pool: vec![],
        };
        ExamSegment::adaptive("exam-1", &segment, pool, 0, Utc::now())
    }

    #[tokio::test]
    async fn approved_accommodations_skip_denied_and_other_exams() {
        let provider = InMemoryAccommodationProvider::with_accommodations([
            Accommodation::new("exam-1", "Language", "ENU"),
            Accommodation::new("exam-1", "Calculator", "TDS_Calc0").denied(),
            Accommodation::new("exam-2", "Language", "ESN"),
        ]);
        let approved = provider.approved_accommodations("exam-1").await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].code, "ENU");
    }

    #[tokio::test]
    async fn missing_assessment_is_none() {
        let provider = InMemoryAssessmentProvider::new();
        assert!(provider.find_assessment("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn segments_round_trip_in_position_order() {
        let store = InMemorySegmentStore::new();
        store.insert_segments(vec![exam_segment(2), exam_segment(1)]).await.unwrap();

        let segments = store.find_segments("exam-1").await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment_position, 1);
        assert!(store.find_segments("exam-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_inserts_nothing() {
        let store = InMemorySegmentStore::new();
        store.insert_segments(vec![exam_segment(1)]).await.unwrap();

        let err = store.insert_segments(vec![exam_segment(2), exam_segment(1)]).await;
        assert!(matches!(err, Err(StoreError::Duplicate(_))));
        assert_eq!(store.segment_count().await, 1);
    }

    #[tokio::test]
    async fn assembly_with_clashing_group_stores_nothing() {
        let store = InMemorySegmentStore::new();
        let group = FieldTestItemGroup::new(&exam(), "SEG-1", "G1", "A", 3, 4, Utc::now()).unwrap();
        store.insert_field_test_groups(vec![group.clone()]).await.unwrap();

        let err = store.insert_assembly(vec![exam_segment(1)], vec![group]).await;
        assert!(matches!(err, Err(StoreError::Duplicate(_))));
        assert_eq!(store.segment_count().await, 0);
        assert_eq!(store.group_count().await, 1);
    }

    #[tokio::test]
    async fn second_assembly_of_an_exam_stores_no_groups() {
        let store = InMemorySegmentStore::new();
        let first = FieldTestItemGroup::new(&exam(), "SEG-1", "G1", "A", 3, 4, Utc::now()).unwrap();
        store.insert_assembly(vec![exam_segment(1)], vec![first]).await.unwrap();

        let second = FieldTestItemGroup::new(&exam(), "SEG-1", "G2", "A", 3, 4, Utc::now()).unwrap();
        let err = store.insert_assembly(vec![exam_segment(1)], vec![second]).await;
        assert!(matches!(err, Err(StoreError::Duplicate(_))));
        assert_eq!(store.segment_count().await, 1);
        assert_eq!(store.group_count().await, 1);
    }

    #[tokio::test]
    async fn updates_fold_onto_segments() {
        let store = InMemorySegmentStore::new();
        store.insert_segments(vec![exam_segment(1)]).await.unwrap();
        store
            .update_segments(vec![ExamSegmentUpdate::new("exam-1", 1, Utc::now()).satisfied(true)])
            .await
            .unwrap();

        let segments = store.find_segments("exam-1").await.unwrap();
        assert!(segments[0].is_satisfied);

        let missing = store
            .update_segments(vec![ExamSegmentUpdate::new("exam-1", 9, Utc::now()).satisfied(true)])
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn groups_can_be_administered_then_deleted() {
        let store = InMemorySegmentStore::new();
        let group = FieldTestItemGroup::new(&exam(), "SEG-1", "G1", "A", 3, 4, Utc::now()).unwrap();
        store.insert_field_test_groups(vec![group]).await.unwrap();

        let keys = vec!["G1_A".to_string()];
        assert_eq!(store.mark_groups_administered("exam-1", &keys, Utc::now()).await.unwrap(), 1);
        let live = store.find_field_test_groups("exam-1", "SEG-1").await.unwrap();
        assert!(live[0].administered_at.is_some());

        assert_eq!(store.delete_field_test_groups("exam-1", &keys, Utc::now()).await.unwrap(), 1);
        assert!(store.find_field_test_groups("exam-1", "SEG-1").await.unwrap().is_empty());
        assert_eq!(store.group_count().await, 1);
    }
}
