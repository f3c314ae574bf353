//! Accommodation-constrained item filtering.
//!
//! An assessment's item constraints tie item properties to accommodations.
//! Only constraints whose `(property_name, property_value)` matches one of the
//! exam's approved accommodations `(type, code)` take part. Inclusive
//! constraints admit items; exclusive constraints remove them, and removal
//! always wins. With no matching inclusive constraint nothing is admitted.

use proctor_core::assessment::{Item, ItemConstraint};
use proctor_core::error::Result;
use proctor_core::exam::Accommodation;
use proctor_core::provider::AccommodationProvider;
use std::sync::Arc;
use tracing::debug;

/// Filters candidate items against an exam's accommodations.
#[derive(Clone)]
pub struct ItemPoolFilter {
    accommodations: Arc<dyn AccommodationProvider>,
}

impl ItemPoolFilter {
    pub fn new(accommodations: Arc<dyn AccommodationProvider>) -> Self {
        Self { accommodations }
    }

    /// Items from `items` the exam may receive, in candidate order.
    ///
    /// `field_test` restricts the result to field-test (`Some(true)`) or
    /// operational (`Some(false)`) items.
    pub async fn item_pool(
        &self,
        exam_id: &str,
        constraints: &[ItemConstraint],
        items: &[Item],
        field_test: Option<bool>,
    ) -> Result<Vec<Item>> {
        let accommodations = self.accommodations.approved_accommodations(exam_id).await?;
        let pool = filter_items(&accommodations, constraints, items, field_test);
        debug!(
            exam_id,
            candidates = items.len(),
            accommodations = accommodations.len(),
            pool = pool.len(),
            "Item pool filtered"
        );
        Ok(pool)
    }
}

/// The pure filtering rule behind [`ItemPoolFilter::item_pool`].
pub fn filter_items(
    accommodations: &[Accommodation],
    constraints: &[ItemConstraint],
    items: &[Item],
    field_test: Option<bool>,
) -> Vec<Item> {
    let (inclusive, exclusive): (Vec<&ItemConstraint>, Vec<&ItemConstraint>) = constraints
        .iter()
        .filter(|c| {
            accommodations.iter().any(|a| {
                a.is_approved() && a.kind == c.property_name && a.code == c.property_value
            })
        })
        .partition(|c| c.inclusive);

    items
        .iter()
        .filter(|item| inclusive.iter().any(|c| c.matches(item)))
        .filter(|item| !exclusive.iter().any(|c| c.matches(item)))
        .filter(|item| field_test.is_none_or(|ft| item.is_field_test == ft))
        .cloned()
        .collect()
}
