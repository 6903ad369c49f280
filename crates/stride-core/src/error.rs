//! Error taxonomy shared by the store operations and the HTTP surface.

use uuid::Uuid;

/// Errors from goal/habit/todo operations.
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// The external planner produced no usable habits. Retryable: nothing
    /// was persisted.
    #[error("habit planning failed: {0}")]
    PlanningFailed(String),

    /// The caller supplied an id that is not a well-formed identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Well-formed id, but no matching record owned by the caller. Also
    /// returned on ownership mismatch so non-owners cannot probe for
    /// existence.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request body is structurally valid but semantically wrong.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage-layer failure.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Parse a caller-supplied string id into a [`Uuid`].
///
/// A malformed id is rejected distinctly from "not found".
pub fn parse_id(raw: &str) -> Result<Uuid, OpError> {
    Uuid::parse_str(raw).map_err(|_| OpError::InvalidIdentifier(raw.to_owned()))
}
