//! Error types for the Proctor domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Proctor operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Assessment configuration errors (fatal, never retried) ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Lookups that the caller required to succeed ---
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Assessment content that cannot be administered as configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no selectable form for segment {segment_key} in language {language}")]
    NoSelectableForm { segment_key: String, language: String },

    #[error("field test start/end position is not set for segment {segment_key}")]
    FieldTestPositionsUnset { segment_key: String },

    #[error(
        "field test window for segment {segment_key} spans {available} positions but requires at least {required} items"
    )]
    FieldTestWindowTooSmall {
        segment_key: String,
        available: i64,
        required: i64,
    },

    #[error("no items available for exam {exam_id}")]
    NoItemsAvailable { exam_id: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record already exists: {0}")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_displays_correctly() {
        let err = Error::Configuration(ConfigurationError::FieldTestWindowTooSmall {
            segment_key: "(SBAC)MATH-7".into(),
            available: 1,
            required: 2,
        });
        let msg = err.to_string();
        assert!(msg.contains("(SBAC)MATH-7"));
        assert!(msg.contains("spans 1 positions"));
        assert!(msg.contains("at least 2"));
    }

    #[test]
    fn store_error_converts_into_top_level() {
        let err: Error = StoreError::Duplicate("exam-1/1".into()).into();
        assert!(matches!(err, Error::Store(StoreError::Duplicate(_))));
        assert!(err.to_string().contains("exam-1/1"));
    }
}
