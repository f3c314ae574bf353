//! # Proctor Core
//!
//! Domain types, collaborator traits, and error definitions for Proctor's
//! exam segment assembly. This crate has **no framework dependencies**; it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (assessment catalog, accommodation service,
//! segment persistence, wall clock) is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with in-memory stubs and a fixed clock
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod exam;
pub mod assessment;
pub mod segment;
pub mod provider;
pub mod clock;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{ConfigurationError, Error, Result, StoreError};
pub use exam::{Accommodation, Environment, Exam};
pub use assessment::{
    Assessment, FieldTestSettings, Form, Item, ItemConstraint, ItemProperty, Segment,
    SelectionAlgorithm, Strand, TimeWindow,
};
pub use segment::{ExamSegment, ExamSegmentUpdate, FieldTestItemGroup, SegmentPool};
pub use provider::{AccommodationProvider, AssessmentProvider, SegmentStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use event::{DomainEvent, EventBus};
