use proctor_core::assessment::{Assessment, Segment};
use proctor_core::clock::Clock;
use proctor_core::error::{ConfigurationError, Result};
use proctor_core::exam::Exam;
use proctor_core::provider::SegmentStore;
use proctor_core::segment::FieldTestItemGroup;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::selector::{FieldTestGroupSelector, GroupSelection};

/// Field-test groups accepted for one exam segment, ready to persist.
#[derive(Debug, Clone, Serialize)]
pub struct FieldTestPlan {
    pub segment_key: String,
    pub groups: Vec<FieldTestItemGroup>,
    /// Total items across `groups`.
    pub item_count: u32,
}

impl FieldTestPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_keys(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.group_key.clone()).collect()
    }
}

/// Fits selected field-test groups into a segment's position window.
pub struct FieldTestOrchestrator {
    selector: Arc<FieldTestGroupSelector>,
    store: Arc<dyn SegmentStore>,
    clock: Arc<dyn Clock>,
}

impl FieldTestOrchestrator {
    pub fn new(
        selector: Arc<FieldTestGroupSelector>,
        store: Arc<dyn SegmentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { selector, store, clock }
    }

    /// Choose and place field-test groups without persisting them.
    ///
    /// `language` is the language the exam is administered in, which the
    /// groups are stamped with.
    pub async fn plan_item_groups(
        &self,
        exam: &Exam,
        assessment: &Assessment,
        segment: &Segment,
        language: &str,
    ) -> Result<FieldTestPlan> {
        let settings = &segment.field_test;
        let (Some(start), Some(end)) = (settings.start_position, settings.end_position) else {
            return Err(ConfigurationError::FieldTestPositionsUnset {
                segment_key: segment.key.clone(),
            }
            .into());
        };

        let available = end - start + 1;
        if available < settings.min_items {
            return Err(ConfigurationError::FieldTestWindowTooSmall {
                segment_key: segment.key.clone(),
                available,
                required: settings.min_items,
            }
            .into());
        }

        let assigned: HashSet<String> = self
            .store
            .find_field_test_groups(&exam.id, &segment.key)
            .await?
            .into_iter()
            .map(|g| g.group_id)
            .collect();

        let requested = u32::try_from(settings.min_items.max(0)).unwrap_or(u32::MAX);
        let selections = self
            .selector
            .select(&exam.id, &assessment.item_constraints, segment, requested, &assigned)
            .await?;
        let accepted = accept_within_budget(selections, available, settings.min_items);

        let now = self.clock.now();
        // Spread by item so a group's items occupy consecutive positions
        // that the next group never reaches
        let total_items: i64 = accepted.iter().map(|s| i64::from(s.num_items)).sum();
        let step = (available / total_items.max(1)).max(1);
        let mut placed_items: i64 = 0;
        let mut groups = Vec::with_capacity(accepted.len());
        for selection in accepted {
            let position = start + placed_items * step;
            placed_items += i64::from(selection.num_items);
            groups.push(
                FieldTestItemGroup::new(
                    exam,
                    segment.key.as_str(),
                    selection.group_id,
                    selection.block_id,
                    selection.num_items,
                    position,
                    now,
                )?
                .with_language(language),
            );
        }

        let item_count = groups.iter().map(|g| g.num_items).sum();
        debug!(
            exam_id = %exam.id,
            segment_key = %segment.key,
            groups = groups.len(),
            item_count,
            "Field test groups planned"
        );
        Ok(FieldTestPlan {
            segment_key: segment.key.clone(),
            groups,
            item_count,
        })
    }

    /// Plan field-test groups and persist them as one batch.
    pub async fn assign_item_groups(
        &self,
        exam: &Exam,
        assessment: &Assessment,
        segment: &Segment,
        language: &str,
    ) -> Result<FieldTestPlan> {
        let plan = self.plan_item_groups(exam, assessment, segment, language).await?;
        if !plan.is_empty() {
            self.store.insert_field_test_groups(plan.groups.clone()).await?;
            info!(
                exam_id = %exam.id,
                segment_key = %segment.key,
                groups = plan.groups.len(),
                item_count = plan.item_count,
                "Field test groups assigned"
            );
        }
        Ok(plan)
    }
}

/// Accept selections in order until `min_items` is reached without exceeding
/// `budget` positions. A group that does not fit is skipped whole.
pub fn accept_within_budget(
    selections: Vec<GroupSelection>,
    budget: i64,
    min_items: i64,
) -> Vec<GroupSelection> {
    let mut remaining = budget;
    let mut total: i64 = 0;
    let mut accepted = Vec::new();
    for selection in selections {
        if total >= min_items {
            break;
        }
        let size = i64::from(selection.num_items);
        if size > remaining {
            debug!(group_key = %selection.group_key, size, remaining, "Field test group exceeds remaining positions");
            continue;
        }
        remaining -= size;
        total += size;
        accepted.push(selection);
    }
    accepted
}
