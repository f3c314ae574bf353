//! Append-only record log shared by the segment stores.
//!
//! Every mutation is expressed as a [`LedgerRecord`]; current state is the
//! fold of all records in order. The in-memory store keeps the fold, the
//! file store additionally appends each record to disk.

use chrono::{DateTime, Utc};
use proctor_core::error::StoreError;
use proctor_core::segment::{ExamSegment, ExamSegmentUpdate, FieldTestItemGroup};
use serde::{Deserialize, Serialize};

/// One persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LedgerRecord {
    Segment(ExamSegment),
    SegmentUpdate(ExamSegmentUpdate),
    FieldTestGroup(FieldTestItemGroup),
    GroupsAdministered {
        exam_id: String,
        group_keys: Vec<String>,
        at: DateTime<Utc>,
    },
    GroupsDeleted {
        exam_id: String,
        group_keys: Vec<String>,
        at: DateTime<Utc>,
    },
}

/// Folded state of a record log.
#[derive(Debug, Default)]
pub(crate) struct SegmentLedger {
    segments: Vec<ExamSegment>,
    groups: Vec<FieldTestItemGroup>,
}

impl SegmentLedger {
    /// Check a segment batch against current state without applying it.
    pub(crate) fn check_segments(&self, segments: &[ExamSegment]) -> Result<(), StoreError> {
        for (i, seg) in segments.iter().enumerate() {
            let clash = self
                .segments
                .iter()
                .chain(segments[..i].iter())
                .any(|s| s.exam_id == seg.exam_id && s.segment_position == seg.segment_position);
            if clash {
                return Err(StoreError::Duplicate(format!(
                    "segment {} of exam {}",
                    seg.segment_position, seg.exam_id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_updates(&self, updates: &[ExamSegmentUpdate]) -> Result<(), StoreError> {
        for update in updates {
            if !self.segments.iter().any(|s| update.applies_to(s)) {
                return Err(StoreError::QueryFailed(format!(
                    "no segment {} for exam {}",
                    update.segment_position, update.exam_id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_groups(&self, groups: &[FieldTestItemGroup]) -> Result<(), StoreError> {
        for (i, group) in groups.iter().enumerate() {
            let clash = self
                .groups
                .iter()
                .filter(|g| g.is_live())
                .chain(groups[..i].iter())
                .any(|g| g.exam_id == group.exam_id && g.group_key == group.group_key);
            if clash {
                return Err(StoreError::Duplicate(format!(
                    "field test group {} of exam {}",
                    group.group_key, group.exam_id
                )));
            }
        }
        Ok(())
    }

    /// Check segments and groups that must land together.
    pub(crate) fn check_assembly(
        &self,
        segments: &[ExamSegment],
        groups: &[FieldTestItemGroup],
    ) -> Result<(), StoreError> {
        if let Some(existing) = segments
            .iter()
            .find(|seg| self.segments.iter().any(|s| s.exam_id == seg.exam_id))
        {
            return Err(StoreError::Duplicate(format!("segments for exam {}", existing.exam_id)));
        }
        self.check_segments(segments)?;
        self.check_groups(groups)
    }

    /// Fold one record. Returns how many stored rows it touched.
    pub(crate) fn apply(&mut self, record: LedgerRecord) -> usize {
        match record {
            LedgerRecord::Segment(segment) => {
                self.segments.push(segment);
                1
            }
            LedgerRecord::SegmentUpdate(update) => {
                let mut touched = 0;
                for seg in self.segments.iter_mut().filter(|s| update.applies_to(s)) {
                    update.apply(seg);
                    touched += 1;
                }
                touched
            }
            LedgerRecord::FieldTestGroup(group) => {
                self.groups.push(group);
                1
            }
            LedgerRecord::GroupsAdministered { exam_id, group_keys, at } => {
                let mut touched = 0;
                for group in self.live_groups_mut(&exam_id, &group_keys) {
                    group.administered_at = Some(at);
                    touched += 1;
                }
                touched
            }
            LedgerRecord::GroupsDeleted { exam_id, group_keys, at } => {
                let mut touched = 0;
                for group in self.live_groups_mut(&exam_id, &group_keys) {
                    group.deleted_at = Some(at);
                    touched += 1;
                }
                touched
            }
        }
    }

    fn live_groups_mut<'a>(
        &'a mut self,
        exam_id: &'a str,
        group_keys: &'a [String],
    ) -> impl Iterator<Item = &'a mut FieldTestItemGroup> + 'a {
        self.groups
            .iter_mut()
            .filter(move |g| g.is_live() && g.exam_id == exam_id && group_keys.contains(&g.group_key))
    }

    pub(crate) fn segments_for(&self, exam_id: &str) -> Vec<ExamSegment> {
        let mut segments: Vec<ExamSegment> =
            self.segments.iter().filter(|s| s.exam_id == exam_id).cloned().collect();
        segments.sort_by_key(|s| s.segment_position);
        segments
    }

    pub(crate) fn groups_for(&self, exam_id: &str, segment_key: &str) -> Vec<FieldTestItemGroup> {
        let mut groups: Vec<FieldTestItemGroup> = self
            .groups
            .iter()
            .filter(|g| g.is_live() && g.exam_id == exam_id && g.segment_key == segment_key)
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.position);
        groups
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::assessment::{FieldTestSettings, Segment, SelectionAlgorithm};
    use proctor_core::exam::{Environment, Exam};
    use proctor_core::segment::SegmentPool;

    fn exam_segment(position: u32) -> ExamSegment {
        let segment = Segment {
            key: format!("SEG-{position}"),
            id: format!("SEG-{position}"),
            position,
            algorithm: SelectionAlgorithm::Adaptive,
            min_items: 0,
            max_items: 0,
            items: vec![],
            strands: vec![],
            forms: vec![],
            field_test: FieldTestSettings::default(),
        };
        ExamSegment::adaptive("exam-1", &segment, SegmentPool::default(), 0, Utc::now())
    }

    #[test]
    fn duplicate_positions_in_one_batch_are_rejected() {
        let ledger = SegmentLedger::default();
        let err = ledger.check_segments(&[exam_segment(1), exam_segment(1)]).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn assembly_for_exam_with_segments_is_rejected() {
        let mut ledger = SegmentLedger::default();
        ledger.apply(LedgerRecord::Segment(exam_segment(1)));
        // A different position still clashes: the exam is already assembled
        let err = ledger.check_assembly(&[exam_segment(2)], &[]).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(ledger.check_segments(&[exam_segment(2)]).is_ok());
    }

    #[test]
    fn deleted_groups_are_hidden_and_may_be_reassigned() {
        let exam = Exam::new("exam-1", "A", "ENU", Environment::Production, "s", Utc::now()).unwrap();
        let group = FieldTestItemGroup::new(&exam, "SEG-1", "G1", "A", 2, 5, Utc::now()).unwrap();

        let mut ledger = SegmentLedger::default();
        ledger.apply(LedgerRecord::FieldTestGroup(group.clone()));
        assert!(ledger.check_groups(std::slice::from_ref(&group)).is_err());

        let touched = ledger.apply(LedgerRecord::GroupsDeleted {
            exam_id: "exam-1".into(),
            group_keys: vec!["G1_A".into()],
            at: Utc::now(),
        });
        assert_eq!(touched, 1);
        assert!(ledger.groups_for("exam-1", "SEG-1").is_empty());
        assert!(ledger.check_groups(&[group]).is_ok());
        assert_eq!(ledger.group_count(), 1);
    }
}
