//! The module contains the errors the engine can return.
//!
//! Every failing operation leaves the ledger, balances and budget state as
//! they were before the call. The variants map onto the categories the
//! transport layer translates into user-visible status codes:
//!
//! - [`Validation`] and [`InvalidCategory`] are rejected before any mutation.
//! - [`NotFound`] and [`AccountInactive`] point at a missing or tombstoned
//!   entity.
//! - [`ConcurrencyConflict`] means a per-entity lock was not obtained in time;
//!   callers should retry.
//! - [`Overflow`] is raised by [`Money`] arithmetic.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`InvalidCategory`]: EngineError::InvalidCategory
//!  [`NotFound`]: EngineError::NotFound
//!  [`AccountInactive`]: EngineError::AccountInactive
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`Overflow`]: EngineError::Overflow
//!  [`Money`]: crate::Money
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Account inactive: {0}")]
    AccountInactive(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("Amount overflow: {0}")]
    Overflow(String),
    #[error("\"{0}\" already present!")]
    Conflict(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for errors raised by input validation (bad amount, date, field
    /// or category).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidCategory(_))
    }

    /// `true` when the referenced entity is missing, voided or inactive.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AccountInactive(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AccountInactive(a), Self::AccountInactive(b)) => a == b,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::Overflow(a), Self::Overflow(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Cancelled(a), Self::Cancelled(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
