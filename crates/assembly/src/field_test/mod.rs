//! Embedded field-test items: eligibility, equal-distribution group
//! selection, and placement within a segment's position window.

pub mod eligibility;
pub mod orchestrator;
pub mod selector;

pub use eligibility::FieldTestEligibility;
pub use orchestrator::{FieldTestOrchestrator, FieldTestPlan, accept_within_budget};
pub use selector::{FieldTestGroupSelector, GroupCounter, GroupSelection};
