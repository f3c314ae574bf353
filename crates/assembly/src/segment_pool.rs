//! Pool size and target length for adaptive segments.
//!
//! The target length starts from the segment's configured length and is cut
//! by the blueprint shortfall: for every strand whose available operational
//! items fall below the strand minimum, the missing items cannot be
//! administered. The result never exceeds the operational items counted
//! toward the blueprint.

use proctor_core::assessment::{Item, ItemConstraint, Segment, SelectionAlgorithm};
use proctor_core::error::Result;
use proctor_core::segment::SegmentPool;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::item_pool::ItemPoolFilter;

#[derive(Clone)]
pub struct SegmentPoolCalculator {
    filter: ItemPoolFilter,
}

impl SegmentPoolCalculator {
    pub fn new(filter: ItemPoolFilter) -> Self {
        Self { filter }
    }

    /// Filter the segment's items for the exam and size the resulting pool.
    pub async fn compute_segment_pool(
        &self,
        exam_id: &str,
        segment: &Segment,
        constraints: &[ItemConstraint],
    ) -> Result<SegmentPool> {
        let item_pool = self
            .filter
            .item_pool(exam_id, constraints, &segment.items, None)
            .await?;
        let pool = compute_pool(segment, &item_pool);
        debug!(
            exam_id,
            segment_key = %segment.key,
            length = pool.length,
            pool_count = pool.pool_count,
            items = pool.item_pool.len(),
            "Segment pool computed"
        );
        Ok(pool)
    }
}

/// Size an already-filtered pool against the segment's blueprint.
pub fn compute_pool(segment: &Segment, item_pool: &[Item]) -> SegmentPool {
    // Operational item count per strand present in the pool
    let mut strand_counts: BTreeMap<&str, i64> = BTreeMap::new();
    for item in item_pool {
        let count = strand_counts.entry(item.strand.as_str()).or_insert(0);
        if !item.is_field_test {
            *count += 1;
        }
    }

    let mut shortfall: i64 = 0;
    let mut total_strand_pool: i64 = 0;
    for (strand_key, pool_count) in strand_counts {
        let Some(strand) = segment.strand(strand_key) else {
            warn!(
                segment_key = %segment.key,
                strand = strand_key,
                "Item strand not declared on segment, skipping it in blueprint counts"
            );
            continue;
        };
        let min_items = i64::from(strand.min_items);
        if pool_count < min_items {
            shortfall += min_items - pool_count;
        }
        total_strand_pool += pool_count;
    }

    let test_length = i64::from(match segment.algorithm {
        SelectionAlgorithm::Adaptive => segment.max_items,
        SelectionAlgorithm::FixedForm => segment.min_items,
    });
    let length_delta = test_length - shortfall;

    let length = if length_delta < total_strand_pool {
        if length_delta > 0 { length_delta } else { test_length }
    } else {
        total_strand_pool
    };
    let length = length.clamp(0, total_strand_pool);

    SegmentPool {
        length: to_count(length),
        pool_count: to_count(total_strand_pool),
        item_pool: item_pool.iter().map(|i| i.id.clone()).collect(),
    }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
