//! Assembly output: the per-exam segment records and the field-test item
//! groups embedded into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::{Form, Segment, SelectionAlgorithm};
use crate::error::ConfigurationError;
use crate::exam::Exam;

/// The adaptive pool computed for one segment of one exam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPool {
    /// Number of items the segment should administer.
    pub length: u32,
    /// Operational (non-field-test) items counted toward the blueprint.
    pub pool_count: u32,
    /// Ids of every item that survived accommodation filtering.
    pub item_pool: Vec<String>,
}

impl SegmentPool {
    pub fn is_empty(&self) -> bool {
        self.item_pool.is_empty()
    }
}

/// One segment of one exam, as it will be administered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSegment {
    pub exam_id: String,
    pub segment_key: String,
    pub segment_id: String,
    pub segment_position: u32,
    pub algorithm: SelectionAlgorithm,
    #[serde(default)]
    pub form_key: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub form_cohort: Option<String>,
    pub exam_item_count: u32,
    pub field_test_item_count: u32,
    pub pool_count: u32,
    #[serde(default)]
    pub item_pool: Vec<String>,
    pub is_satisfied: bool,
    pub is_permeable: bool,
    #[serde(default)]
    pub exited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExamSegment {
    /// A fixed-form segment administering `form` as-is.
    pub fn fixed_form(exam_id: &str, segment: &Segment, form: &Form, created_at: DateTime<Utc>) -> Self {
        Self {
            exam_id: exam_id.to_string(),
            segment_key: segment.key.clone(),
            segment_id: segment.id.clone(),
            segment_position: segment.position,
            algorithm: SelectionAlgorithm::FixedForm,
            form_key: Some(form.key.clone()),
            form_id: Some(form.id.clone()),
            form_cohort: Some(form.cohort.clone()),
            exam_item_count: form.length,
            field_test_item_count: 0,
            pool_count: 0,
            item_pool: Vec::new(),
            is_satisfied: false,
            is_permeable: false,
            exited_at: None,
            created_at,
        }
    }

    /// An adaptive segment drawing from `pool` plus `field_test_item_count`
    /// embedded field-test items.
    ///
    /// A segment with nothing to administer starts out satisfied.
    pub fn adaptive(
        exam_id: &str,
        segment: &Segment,
        pool: SegmentPool,
        field_test_item_count: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exam_id: exam_id.to_string(),
            segment_key: segment.key.clone(),
            segment_id: segment.id.clone(),
            segment_position: segment.position,
            algorithm: SelectionAlgorithm::Adaptive,
            form_key: None,
            form_id: None,
            form_cohort: None,
            exam_item_count: pool.length + field_test_item_count,
            field_test_item_count,
            pool_count: pool.pool_count,
            is_satisfied: field_test_item_count + pool.length == 0,
            item_pool: pool.item_pool,
            is_permeable: false,
            exited_at: None,
            created_at,
        }
    }
}

/// Append-only change to a persisted [`ExamSegment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSegmentUpdate {
    pub exam_id: String,
    pub segment_position: u32,
    #[serde(default)]
    pub is_satisfied: Option<bool>,
    #[serde(default)]
    pub is_permeable: Option<bool>,
    #[serde(default)]
    pub exited_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl ExamSegmentUpdate {
    pub fn new(exam_id: impl Into<String>, segment_position: u32, recorded_at: DateTime<Utc>) -> Self {
        Self {
            exam_id: exam_id.into(),
            segment_position,
            is_satisfied: None,
            is_permeable: None,
            exited_at: None,
            recorded_at,
        }
    }

    pub fn satisfied(mut self, value: bool) -> Self {
        self.is_satisfied = Some(value);
        self
    }

    pub fn permeable(mut self, value: bool) -> Self {
        self.is_permeable = Some(value);
        self
    }

    pub fn exited(mut self, at: DateTime<Utc>) -> Self {
        self.exited_at = Some(at);
        self
    }

    pub fn applies_to(&self, segment: &ExamSegment) -> bool {
        self.exam_id == segment.exam_id && self.segment_position == segment.segment_position
    }

    /// Fold this event onto the segment's current state.
    pub fn apply(&self, segment: &mut ExamSegment) {
        if let Some(satisfied) = self.is_satisfied {
            segment.is_satisfied = satisfied;
        }
        if let Some(permeable) = self.is_permeable {
            segment.is_permeable = permeable;
        }
        if self.exited_at.is_some() {
            segment.exited_at = self.exited_at;
        }
    }
}

/// A whole field-test item group assigned to a position in an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTestItemGroup {
    pub exam_id: String,
    pub session_id: String,
    pub segment_key: String,
    pub language_code: String,
    pub group_id: String,
    pub group_key: String,
    pub block_id: String,
    pub num_items: u32,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub administered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FieldTestItemGroup {
    pub fn new(
        exam: &Exam,
        segment_key: impl Into<String>,
        group_id: impl Into<String>,
        block_id: impl Into<String>,
        num_items: u32,
        position: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        let group_id = group_id.into();
        let block_id = block_id.into();
        if num_items == 0 {
            return Err(ConfigurationError::InvalidValue(format!(
                "field test group {group_id} has no items"
            )));
        }
        if position < 1 {
            return Err(ConfigurationError::InvalidValue(format!(
                "field test group {group_id} assigned to invalid position {position}"
            )));
        }
        Ok(Self {
            exam_id: exam.id.clone(),
            session_id: exam.session_id.clone(),
            segment_key: segment_key.into(),
            language_code: exam.language_code.clone(),
            group_key: format!("{group_id}_{block_id}"),
            group_id,
            block_id,
            num_items,
            position,
            created_at,
            administered_at: None,
            deleted_at: None,
        })
    }

    /// Record the language the group is administered in, when it differs
    /// from the exam's own.
    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    /// Not deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}
