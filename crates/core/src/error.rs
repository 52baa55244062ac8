//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every fallible operation in the core returns one of these; the variant
/// tells the caller whether to fix the input, re-prompt the user, retry
/// later, or page someone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input: malformed, out of range, or an illegal state transition.
    /// Surfaced immediately, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier did not parse as a UUID.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown product, order, reservation, or refund id.
    #[error("not found")]
    NotFound,

    /// A conflict occurred (insufficient available stock, duplicate resource).
    ///
    /// This is normal business contention and is surfaced to the caller for a
    /// user-facing re-prompt; it is never retried automatically.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An on-hand adjustment would take a quantity below zero.
    ///
    /// Distinct from [`DomainError::Conflict`]: it signals that the ledger
    /// invariant was already violated upstream, not ordinary contention.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// Authorization failure at the domain boundary (passed through from the
    /// auth collaborator).
    #[error("unauthorized")]
    Unauthorized,

    /// An external collaborator exhausted its retries.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
}
