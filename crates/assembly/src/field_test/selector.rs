//! Equal-distribution selection of field-test item groups.
//!
//! Every segment key keeps a list of occurrence counters sorted from least to
//! most used. Each call walks that list from the front and takes whole groups
//! until the requested number of items is covered, so over many exams every
//! eligible group is administered about equally often.

use chrono::Duration;
use proctor_core::assessment::{Item, ItemConstraint, Segment};
use proctor_core::clock::Clock;
use proctor_core::error::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::cache::KeyedCache;
use crate::item_pool::ItemPoolFilter;

/// A whole item group chosen for one exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSelection {
    pub group_id: String,
    pub group_key: String,
    pub block_id: String,
    pub num_items: u32,
}

/// How many exams a group has been selected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCounter {
    pub group_key: String,
    pub occurrences: u64,
}

impl GroupCounter {
    fn new(group_key: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            occurrences: 0,
        }
    }
}

pub struct FieldTestGroupSelector {
    filter: ItemPoolFilter,
    counters: KeyedCache<Mutex<Vec<GroupCounter>>>,
}

impl FieldTestGroupSelector {
    pub fn new(filter: ItemPoolFilter, idle_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            filter,
            counters: KeyedCache::new(idle_ttl, clock),
        }
    }

    /// Select groups covering at least `num_items` field-test items.
    ///
    /// Groups whose id is in `assigned_group_ids` are never returned. The
    /// total may exceed `num_items` by at most the last group's size.
    pub async fn select(
        &self,
        exam_id: &str,
        constraints: &[ItemConstraint],
        segment: &Segment,
        num_items: u32,
        assigned_group_ids: &HashSet<String>,
    ) -> Result<Vec<GroupSelection>> {
        let items = self
            .filter
            .item_pool(exam_id, constraints, &segment.items, Some(true))
            .await?;
        let selected = self.select_from_pool(&segment.key, &items, num_items, assigned_group_ids);
        debug!(
            exam_id,
            segment_key = %segment.key,
            requested = num_items,
            selected = selected.len(),
            "Field test groups selected"
        );
        Ok(selected)
    }

    /// The selection walk over an already-filtered field-test pool.
    pub fn select_from_pool(
        &self,
        segment_key: &str,
        items: &[Item],
        num_items: u32,
        assigned_group_ids: &HashSet<String>,
    ) -> Vec<GroupSelection> {
        let (order, mut eligible) = group_items(items, assigned_group_ids);

        let entry = self
            .counters
            .get_or_insert_with(segment_key, || Mutex::new(Vec::new()));
        let mut counters = entry.lock().unwrap_or_else(|e| e.into_inner());

        if counters.is_empty() {
            counters.extend(order.iter().map(|key| GroupCounter::new(key.as_str())));
        }

        let mut selected = Vec::new();
        let mut total: u32 = 0;
        for counter in counters.iter_mut() {
            if total >= num_items {
                break;
            }
            if let Some(group) = eligible.remove(&counter.group_key) {
                total += group.num_items;
                counter.occurrences += 1;
                selected.push(group);
            }
        }

        // Remember groups seen for the first time so later exams can pick them
        let known: HashSet<String> = counters.iter().map(|c| c.group_key.clone()).collect();
        for key in order {
            if eligible.contains_key(&key) && !known.contains(&key) {
                counters.push(GroupCounter::new(key));
            }
        }

        counters.sort_by_key(|c| c.occurrences);
        selected
    }

    /// Snapshot of the counters for a segment, least used first.
    pub fn occurrence_counts(&self, segment_key: &str) -> Vec<GroupCounter> {
        self.counters
            .get(segment_key)
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }
}

/// Group unassigned items by group key, keeping first-seen key order.
fn group_items(
    items: &[Item],
    assigned_group_ids: &HashSet<String>,
) -> (Vec<String>, HashMap<String, GroupSelection>) {
    let mut order = Vec::new();
    let mut groups: HashMap<String, GroupSelection> = HashMap::new();
    for item in items.iter().filter(|i| !assigned_group_ids.contains(&i.group_id)) {
        let key = item.group_key();
        groups
            .entry(key.clone())
            .and_modify(|g| g.num_items += 1)
            .or_insert_with(|| {
                order.push(key.clone());
                GroupSelection {
                    group_id: item.group_id.clone(),
                    group_key: key,
                    block_id: item.block_id.clone(),
                    num_items: 1,
                }
            });
    }
    (order, groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_core::assessment::{FieldTestSettings, ItemProperty, SelectionAlgorithm};
    use proctor_core::clock::FixedClock;
    use proctor_core::exam::Accommodation;
    use proctor_store::InMemoryAccommodationProvider;

    fn ft_items(group_id: &str, count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| {
                Item::new(
                    format!("{group_id}-{i}"),
                    "S1",
                    group_id,
                    "A",
                    true,
                    vec![ItemProperty::new("Language", "ENU")],
                )
            })
            .collect()
    }

    fn selector() -> FieldTestGroupSelector {
        let provider = InMemoryAccommodationProvider::with_accommodations([Accommodation::new(
            "exam-1", "Language", "ENU",
        )]);
        FieldTestGroupSelector::new(
            ItemPoolFilter::new(Arc::new(provider)),
            Duration::hours(24),
            Arc::new(FixedClock::new(Utc::now())),
        )
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn counts_stay_balanced() {
        let selector = selector();
        let pool = [ft_items("g1", 1), ft_items("g2", 1), ft_items("g3", 1), ft_items("g4", 1)].concat();

        for _ in 0..20 {
            let picked = selector.select_from_pool("SEG", &pool, 1, &none());
            assert_eq!(picked.len(), 1);
        }

        let counts: Vec<u64> = selector.occurrence_counts("SEG").iter().map(|c| c.occurrences).collect();
        assert_eq!(counts.len(), 4);
        let max = counts.iter().max().unwrap();
        let min = counts.iter().min().unwrap();
        assert!(max - min <= 1, "{counts:?}");
        assert_eq!(counts.iter().sum::<u64>(), 20);
    }

    #[test]
    fn uneven_groups_stay_balanced() {
        let selector = selector();
        let pool = [ft_items("g1", 2), ft_items("g2", 1), ft_items("g3", 3), ft_items("g4", 1)].concat();
        for _ in 0..21 {
            selector.select_from_pool("SEG", &pool, 3, &none());
        }
        let counts: Vec<u64> = selector.occurrence_counts("SEG").iter().map(|c| c.occurrences).collect();
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1, "{counts:?}");
    }

    #[test]
    fn assigned_groups_are_excluded() {
        let selector = selector();
        let pool = [ft_items("g1", 1), ft_items("g2", 1), ft_items("g3", 1)].concat();
        let assigned: HashSet<String> = ["g1".to_string(), "g3".to_string()].into();

        for _ in 0..5 {
            let picked = selector.select_from_pool("SEG", &pool, 3, &assigned);
            assert!(picked.iter().all(|g| g.group_id == "g2"));
        }
    }

    #[test]
    fn whole_groups_cover_the_request() {
        let selector = selector();
        let pool = [ft_items("g1", 3), ft_items("g2", 1)].concat();

        let picked = selector.select_from_pool("SEG", &pool, 4, &none());
        let keys: Vec<&str> = picked.iter().map(|g| g.group_key.as_str()).collect();
        assert_eq!(keys, vec!["g1_A", "g2_A"]);
        assert_eq!(picked[0].num_items, 3);
        assert_eq!(picked.iter().map(|g| g.num_items).sum::<u32>(), 4);
    }

    #[test]
    fn overshoot_is_at_most_one_group() {
        let selector = selector();
        let pool = [ft_items("g1", 3), ft_items("g2", 3), ft_items("g3", 3)].concat();
        let picked = selector.select_from_pool("SEG", &pool, 4, &none());
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.iter().map(|g| g.num_items).sum::<u32>(), 6);
    }

    #[test]
    fn newly_seen_groups_are_preferred_next() {
        let selector = selector();
        let first = [ft_items("g1", 1), ft_items("g2", 1)].concat();
        assert_eq!(selector.select_from_pool("SEG", &first, 1, &none())[0].group_id, "g1");

        let grown = [first.clone(), ft_items("g3", 1)].concat();
        assert_eq!(selector.select_from_pool("SEG", &grown, 1, &none())[0].group_id, "g2");
        assert_eq!(selector.select_from_pool("SEG", &grown, 1, &none())[0].group_id, "g3");

        let counts: Vec<u64> = selector.occurrence_counts("SEG").iter().map(|c| c.occurrences).collect();
        assert_eq!(counts, vec![1, 1, 1]);
    }

    #[test]
    fn segments_keep_separate_counters() {
        let selector = selector();
        let pool = [ft_items("g1", 1), ft_items("g2", 1)].concat();
        selector.select_from_pool("SEG-1", &pool, 1, &none());
        assert_eq!(selector.select_from_pool("SEG-2", &pool, 1, &none())[0].group_id, "g1");
        assert!(selector.occurrence_counts("SEG-3").is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_counter_list() {
        let selector = Arc::new(selector());
        let pool = Arc::new([ft_items("g1", 1), ft_items("g2", 1), ft_items("g3", 1), ft_items("g4", 1)].concat());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let selector = Arc::clone(&selector);
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        assert_eq!(selector.select_from_pool("SEG", &pool, 1, &HashSet::new()).len(), 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counts: Vec<u64> = selector.occurrence_counts("SEG").iter().map(|c| c.occurrences).collect();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts.iter().sum::<u64>(), 100);
        assert_eq!(counts, vec![25, 25, 25, 25]);
    }

    #[tokio::test]
    async fn select_filters_through_accommodations() {
        let selector = selector();
        let mut items = [ft_items("g1", 2), ft_items("g2", 2)].concat();
        items.push(Item::new(
            "esn-1",
            "S1",
            "g3",
            "A",
            true,
            vec![ItemProperty::new("Language", "ESN")],
        ));
        items.push(Item::new(
            "op-1",
            "S1",
            "g4",
            "A",
            false,
            vec![ItemProperty::new("Language", "ENU")],
        ));
        let segment = Segment {
            key: "SEG".into(),
            id: "SEG".into(),
            position: 1,
            algorithm: SelectionAlgorithm::Adaptive,
            min_items: 4,
            max_items: 4,
            items,
            strands: vec![],
            forms: vec![],
            field_test: FieldTestSettings::default(),
        };
        let constraints = vec![
            ItemConstraint::inclusive("Language", "ENU"),
            ItemConstraint::inclusive("Language", "ESN"),
        ];

        let picked = selector.select("exam-1", &constraints, &segment, 10, &none()).await.unwrap();
        let ids: Vec<&str> = picked.iter().map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2"]);
    }
}
