//! # proctor-assembly
//!
//! Builds the per-exam segment records when an exam is opened:
//!
//! - [`ItemPoolFilter`] narrows candidate items to the exam's accommodations
//! - [`SegmentPoolCalculator`] sizes adaptive segments against their blueprint
//! - [`FormSelector`] rotates fixed-form segments across their forms
//! - [`field_test`] embeds unscored pilot item groups
//! - [`SegmentAssembler`] runs all of the above and persists the result

pub mod assembler;
pub mod cache;
pub mod field_test;
pub mod form_selector;
pub mod item_pool;
pub mod segment_pool;

pub use assembler::{AssemblyOptions, AssemblyOutcome, Collaborators, SegmentAssembler};
pub use cache::{DEFAULT_IDLE_TTL_HOURS, KeyedCache};
pub use field_test::{
    FieldTestEligibility, FieldTestGroupSelector, FieldTestOrchestrator, FieldTestPlan, GroupSelection,
};
pub use form_selector::FormSelector;
pub use item_pool::ItemPoolFilter;
pub use segment_pool::SegmentPoolCalculator;
