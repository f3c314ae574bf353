//! Collaborator implementations for Proctor.
//!
//! The in-memory providers back tests and the CLI; the JSONL segment store
//! keeps assembly output across CLI runs.

pub mod ledger;
pub mod in_memory;
pub mod file_store;
pub mod fixture;

pub use in_memory::{InMemoryAccommodationProvider, InMemoryAssessmentProvider, InMemorySegmentStore};
pub use file_store::FileSegmentStore;
pub use fixture::Fixture;
pub use ledger::LedgerRecord;
