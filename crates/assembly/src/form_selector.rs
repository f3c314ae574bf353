//! Round-robin form rotation for fixed-form segments.

use chrono::Duration;
use proctor_core::assessment::{Form, Segment};
use proctor_core::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::cache::KeyedCache;

/// Spreads exams across a segment's forms.
///
/// Each segment key keeps its own rotation index, so exams opening different
/// segments never touch the same counter.
pub struct FormSelector {
    rotations: KeyedCache<AtomicUsize>,
}

impl FormSelector {
    pub fn new(idle_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            rotations: KeyedCache::new(idle_ttl, clock),
        }
    }

    /// The next form for `segment` in `language`, or `None` when the segment
    /// has no form in that language.
    pub fn select_form<'a>(&self, segment: &'a Segment, language: &str) -> Option<&'a Form> {
        let forms = segment.forms_for_language(language);
        match forms.len() {
            0 => None,
            1 => Some(forms[0]),
            count => {
                let rotation = self
                    .rotations
                    .get_or_insert_with(&segment.key, || AtomicUsize::new(0));
                // The closure always returns Some, so both arms carry the previous index
                let previous = match rotation
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i % count + 1) % count))
                {
                    Ok(i) | Err(i) => i,
                };
                let form = forms[previous % count];
                debug!(
                    segment_key = %segment.key,
                    language,
                    form_key = %form.key,
                    index = previous % count,
                    "Form selected"
                );
                Some(form)
            }
        }
    }

    /// The form in `language` that belongs to `cohort`. Does not rotate.
    pub fn select_cohort_form<'a>(segment: &'a Segment, language: &str, cohort: &str) -> Option<&'a Form> {
        segment
            .forms
            .iter()
            .find(|f| f.language_code == language && f.cohort == cohort)
    }

    /// Number of segment keys currently holding rotation state.
    pub fn tracked_segments(&self) -> usize {
        self.rotations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_core::assessment::{FieldTestSettings, SelectionAlgorithm};
    use proctor_core::clock::FixedClock;

    fn form(key: &str, cohort: &str, language: &str) -> Form {
        Form {
            key: key.into(),
            id: format!("{key}-id"),
            cohort: cohort.into(),
            language_code: language.into(),
            length: 10,
        }
    }

    fn segment(key: &str, forms: Vec<Form>) -> Segment {
        Segment {
            key: key.into(),
            id: key.into(),
            position: 1,
            algorithm: SelectionAlgorithm::FixedForm,
            min_items: 10,
            max_items: 10,
            items: vec![],
            strands: vec![],
            forms,
            field_test: FieldTestSettings::default(),
        }
    }

    fn selector() -> (FormSelector, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        (FormSelector::new(Duration::hours(24), clock.clone()), clock)
    }

    #[test]
    fn rotates_through_forms_in_order() {
        let (selector, _) = selector();
        let seg = segment(
            "SEG-FF",
            vec![form("A", "Default", "ENU"), form("B", "Default", "ENU"), form("C", "Default", "ENU")],
        );

        let picked: Vec<&str> = (0..4)
            .map(|_| selector.select_form(&seg, "ENU").unwrap().key.as_str())
            .collect();
        assert_eq!(picked, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn single_form_does_not_rotate() {
        let (selector, _) = selector();
        let seg = segment("SEG-FF", vec![form("A", "Default", "ENU"), form("S", "Default", "ESN")]);
        for _ in 0..3 {
            assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "A");
        }
        assert_eq!(selector.tracked_segments(), 0);
    }

    #[test]
    fn no_form_in_language() {
        let (selector, _) = selector();
        let seg = segment("SEG-FF", vec![form("A", "Default", "ENU")]);
        assert!(selector.select_form(&seg, "FRN").is_none());
    }

    #[test]
    fn forms_are_filtered_by_language_before_rotating() {
        let (selector, _) = selector();
        let seg = segment(
            "SEG-FF",
            vec![
                form("E1", "Default", "ENU"),
                form("S1", "Default", "ESN"),
                form("E2", "Default", "ENU"),
            ],
        );
        assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "E1");
        assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "E2");
        assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "E1");
    }

    #[test]
    fn segments_rotate_independently() {
        let (selector, _) = selector();
        let forms = vec![form("A", "Default", "ENU"), form("B", "Default", "ENU")];
        let first = segment("SEG-1", forms.clone());
        let second = segment("SEG-2", forms);

        assert_eq!(selector.select_form(&first, "ENU").unwrap().key, "A");
        assert_eq!(selector.select_form(&first, "ENU").unwrap().key, "B");
        assert_eq!(selector.select_form(&second, "ENU").unwrap().key, "A");
        assert_eq!(selector.tracked_segments(), 2);
    }

    #[test]
    fn idle_rotation_restarts() {
        let (selector, clock) = selector();
        let seg = segment("SEG-FF", vec![form("A", "Default", "ENU"), form("B", "Default", "ENU")]);
        assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "A");
        clock.advance(Duration::hours(25));
        assert_eq!(selector.select_form(&seg, "ENU").unwrap().key, "A");
    }

    #[test]
    fn concurrent_selection_spreads_evenly() {
        let (selector, _) = selector();
        let selector = Arc::new(selector);
        let seg = Arc::new(segment(
            "SEG-FF",
            vec![form("A", "Default", "ENU"), form("B", "Default", "ENU")],
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let selector = Arc::clone(&selector);
                let seg = Arc::clone(&seg);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| selector.select_form(&seg, "ENU").unwrap().key.clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let picks: Vec<String> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let a = picks.iter().filter(|k| *k == "A").count();
        assert_eq!(a, 100);
        assert_eq!(picks.len() - a, 100);
    }

    #[test]
    fn cohort_lookup_matches_language_and_cohort() {
        let seg = segment(
            "SEG-FF",
            vec![
                form("A", "Blue", "ENU"),
                form("B", "Red", "ENU"),
                form("C", "Red", "ESN"),
            ],
        );
        assert_eq!(FormSelector::select_cohort_form(&seg, "ENU", "Red").unwrap().key, "B");
        assert_eq!(FormSelector::select_cohort_form(&seg, "ESN", "Red").unwrap().key, "C");
        assert!(FormSelector::select_cohort_form(&seg, "ESN", "Blue").is_none());
    }
}
