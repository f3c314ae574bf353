//! Collaborator traits: where assembly meets the rest of the system.
//!
//! Assessment content, accommodations, and segment persistence are owned by
//! sibling services. Assembly only talks to them through these traits, so
//! tests and the CLI can plug in in-memory implementations.
//!
//! "No match" is always an ordinary empty result (`None` / empty `Vec`),
//! never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::assessment::Assessment;
use crate::error::StoreError;
use crate::exam::Accommodation;
use crate::segment::{ExamSegment, ExamSegmentUpdate, FieldTestItemGroup};

/// Read-only access to assessment definitions.
#[async_trait]
pub trait AssessmentProvider: Send + Sync {
    /// The provider name (e.g., "in_memory", "fixture").
    fn name(&self) -> &str;

    /// Look up a full assessment aggregate by key.
    async fn find_assessment(&self, key: &str) -> Result<Option<Assessment>, StoreError>;
}

/// Read-only access to the accommodations granted to an exam.
#[async_trait]
pub trait AccommodationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Approved (not denied) accommodations for the exam.
    async fn approved_accommodations(&self, exam_id: &str) -> Result<Vec<Accommodation>, StoreError>;
}

/// Persistence for assembly output.
///
/// Segment records are inserted once and then only changed through
/// append-only update events; field-test groups are inserted once and then
/// only marked administered or deleted.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert all segments of an exam as one batch.
    async fn insert_segments(&self, segments: Vec<ExamSegment>) -> Result<(), StoreError>;

    /// Append update events to previously inserted segments.
    async fn update_segments(&self, updates: Vec<ExamSegmentUpdate>) -> Result<(), StoreError>;

    /// Current state of an exam's segments, ordered by position.
    async fn find_segments(&self, exam_id: &str) -> Result<Vec<ExamSegment>, StoreError>;

    /// Insert an exam's segments together with the field-test groups
    /// planned for them. Either every row is stored or none is.
    async fn insert_assembly(
        &self,
        segments: Vec<ExamSegment>,
        groups: Vec<FieldTestItemGroup>,
    ) -> Result<(), StoreError>;

    /// Insert field-test item groups as one batch.
    async fn insert_field_test_groups(&self, groups: Vec<FieldTestItemGroup>) -> Result<(), StoreError>;

    /// Live (not deleted) field-test groups assigned to an exam segment.
    async fn find_field_test_groups(
        &self,
        exam_id: &str,
        segment_key: &str,
    ) -> Result<Vec<FieldTestItemGroup>, StoreError>;

    /// Record that the given groups were delivered. Returns how many matched.
    async fn mark_groups_administered(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Record deletion of the given groups. Returns how many matched.
    async fn delete_field_test_groups(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}
