//! Segment assembly for a newly opened exam.

use chrono::Duration;
use proctor_core::assessment::{Assessment, SelectionAlgorithm};
use proctor_core::clock::Clock;
use proctor_core::error::{ConfigurationError, Error, Result, StoreError};
use proctor_core::event::{DomainEvent, EventBus};
use proctor_core::exam::{Exam, LANGUAGE_ACCOMMODATION_TYPE};
use proctor_core::provider::{AccommodationProvider, AssessmentProvider, SegmentStore};
use proctor_core::segment::{ExamSegment, FieldTestItemGroup};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::DEFAULT_IDLE_TTL_HOURS;
use crate::field_test::{FieldTestEligibility, FieldTestGroupSelector, FieldTestOrchestrator, FieldTestPlan};
use crate::form_selector::FormSelector;
use crate::item_pool::ItemPoolFilter;
use crate::segment_pool::SegmentPoolCalculator;

/// The services assembly reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub assessments: Arc<dyn AssessmentProvider>,
    pub accommodations: Arc<dyn AccommodationProvider>,
    pub store: Arc<dyn SegmentStore>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables for a [`SegmentAssembler`].
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// Idle window for form rotation and field-test counters
    pub cache_idle_ttl: Duration,
    /// Accommodation type whose code names the exam language
    pub language_accommodation_type: String,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            cache_idle_ttl: Duration::hours(DEFAULT_IDLE_TTL_HOURS),
            language_accommodation_type: LANGUAGE_ACCOMMODATION_TYPE.to_string(),
        }
    }
}

/// Everything persisted for one exam.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyOutcome {
    pub exam_id: String,
    pub segments: Vec<ExamSegment>,
    pub field_test_groups: Vec<FieldTestItemGroup>,
    pub total_items: u32,
}

/// Builds the segment records for an exam.
///
/// The form rotation and field-test counters live inside the assembler, so
/// one instance should be shared by every exam the process opens.
pub struct SegmentAssembler {
    assessments: Arc<dyn AssessmentProvider>,
    accommodations: Arc<dyn AccommodationProvider>,
    store: Arc<dyn SegmentStore>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    pools: SegmentPoolCalculator,
    forms: FormSelector,
    groups: Arc<FieldTestGroupSelector>,
    eligibility: FieldTestEligibility,
    field_tests: FieldTestOrchestrator,
    language_accommodation_type: String,
}

impl SegmentAssembler {
    pub fn new(collaborators: Collaborators, options: AssemblyOptions) -> Self {
        let Collaborators {
            assessments,
            accommodations,
            store,
            clock,
        } = collaborators;

        let filter = ItemPoolFilter::new(Arc::clone(&accommodations));
        let groups = Arc::new(FieldTestGroupSelector::new(
            filter.clone(),
            options.cache_idle_ttl,
            Arc::clone(&clock),
        ));

        Self {
            pools: SegmentPoolCalculator::new(filter),
            forms: FormSelector::new(options.cache_idle_ttl, Arc::clone(&clock)),
            field_tests: FieldTestOrchestrator::new(Arc::clone(&groups), Arc::clone(&store), Arc::clone(&clock)),
            eligibility: FieldTestEligibility::new(Arc::clone(&clock)),
            groups,
            assessments,
            accommodations,
            store,
            clock,
            event_bus: Arc::new(EventBus::default()),
            language_accommodation_type: options.language_accommodation_type,
        }
    }

    /// Publish assembly events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn form_selector(&self) -> &FormSelector {
        &self.forms
    }

    pub fn group_selector(&self) -> &FieldTestGroupSelector {
        &self.groups
    }

    /// Look up the exam's assessment and assemble it.
    pub async fn assemble_by_key(&self, exam: &Exam) -> Result<AssemblyOutcome> {
        let assessment = self
            .assessments
            .find_assessment(&exam.assessment_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("assessment {}", exam.assessment_key)))?;
        self.assemble(exam, &assessment).await
    }

    /// Assemble every segment of `assessment` for `exam` and persist the
    /// result. Nothing is written unless every segment succeeds.
    pub async fn assemble(&self, exam: &Exam, assessment: &Assessment) -> Result<AssemblyOutcome> {
        match self.try_assemble(exam, assessment).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(exam_id = %exam.id, assessment_key = %assessment.key, "Assembly failed: {e}");
                self.event_bus.publish(DomainEvent::AssemblyFailed {
                    exam_id: exam.id.clone(),
                    error_message: e.to_string(),
                    timestamp: self.clock.now(),
                });
                Err(e)
            }
        }
    }

    async fn try_assemble(&self, exam: &Exam, assessment: &Assessment) -> Result<AssemblyOutcome> {
        if !self.store.find_segments(&exam.id).await?.is_empty() {
            return Err(StoreError::Duplicate(format!("segments for exam {}", exam.id)).into());
        }

        let language = self.resolve_language(exam).await?;
        let now = self.clock.now();

        let mut cohort: Option<String> = None;
        let mut segments = Vec::with_capacity(assessment.segments.len());
        let mut plans: Vec<FieldTestPlan> = Vec::new();
        let mut total_items: u32 = 0;

        for segment in assessment.segments_in_order() {
            let record = match segment.algorithm {
                SelectionAlgorithm::FixedForm => {
                    let form = match &cohort {
                        Some(cohort) => FormSelector::select_cohort_form(segment, &language, cohort),
                        None => self.forms.select_form(segment, &language),
                    }
                    .ok_or_else(|| ConfigurationError::NoSelectableForm {
                        segment_key: segment.key.clone(),
                        language: language.clone(),
                    })?;
                    if cohort.is_none() {
                        cohort = Some(form.cohort.clone());
                    }
                    ExamSegment::fixed_form(&exam.id, segment, form, now)
                }
                SelectionAlgorithm::Adaptive => {
                    let pool = self
                        .pools
                        .compute_segment_pool(&exam.id, segment, &assessment.item_constraints)
                        .await?;

                    // Field-test items are only embedded in a full-length draw
                    let mut field_test_items = 0;
                    if pool.length == segment.max_items
                        && self.eligibility.is_field_test_eligible(exam, assessment, segment, &language)
                    {
                        let plan = self
                            .field_tests
                            .plan_item_groups(exam, assessment, segment, &language)
                            .await?;
                        field_test_items = plan.item_count;
                        if !plan.is_empty() {
                            plans.push(plan);
                        }
                    }
                    ExamSegment::adaptive(&exam.id, segment, pool, field_test_items, now)
                }
            };

            debug!(
                exam_id = %exam.id,
                segment_key = %record.segment_key,
                algorithm = %record.algorithm,
                items = record.exam_item_count,
                "Segment assembled"
            );
            total_items += record.exam_item_count;
            segments.push(record);
        }

        if total_items == 0 {
            return Err(ConfigurationError::NoItemsAvailable {
                exam_id: exam.id.clone(),
            }
            .into());
        }

        let field_test_groups: Vec<FieldTestItemGroup> =
            plans.iter().flat_map(|p| p.groups.iter().cloned()).collect();
        self.store
            .insert_assembly(segments.clone(), field_test_groups.clone())
            .await?;

        for plan in &plans {
            self.event_bus.publish(DomainEvent::FieldTestGroupsAssigned {
                exam_id: exam.id.clone(),
                segment_key: plan.segment_key.clone(),
                group_keys: plan.group_keys(),
                item_count: plan.item_count,
                timestamp: now,
            });
        }
        self.event_bus.publish(DomainEvent::SegmentsInitialized {
            exam_id: exam.id.clone(),
            assessment_key: assessment.key.clone(),
            segment_count: segments.len(),
            total_items,
            timestamp: now,
        });

        info!(
            exam_id = %exam.id,
            assessment_key = %assessment.key,
            language = %language,
            segments = segments.len(),
            field_test_groups = field_test_groups.len(),
            total_items,
            "Exam segments initialized"
        );

        Ok(AssemblyOutcome {
            exam_id: exam.id.clone(),
            segments,
            field_test_groups,
            total_items,
        })
    }

    /// The approved language accommodation, else the exam's own language.
    async fn resolve_language(&self, exam: &Exam) -> Result<String> {
        let accommodations = self.accommodations.approved_accommodations(&exam.id).await?;
        Ok(accommodations
            .into_iter()
            .find(|a| a.kind == self.language_accommodation_type)
            .map(|a| a.code)
            .unwrap_or_else(|| exam.language_code.clone()))
    }
}
