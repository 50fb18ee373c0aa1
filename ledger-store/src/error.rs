//! Error taxonomy for ledger operations.
//!
//! - [`ValidationError`]: raised before any network call, no state touched
//! - [`RemoteError`]: the remote store refused or never answered; the
//!   optimistic mutation has already been rolled back when a caller sees it
//! - [`LedgerError::StaleBootstrap`]: startup fell back to a cached snapshot
//!
//! All of these are returned to the caller of the operation. None are fatal.

use chrono::{DateTime, Utc};
use shared::AmountError;
use thiserror::Error;

use crate::domain::EntityKind;

/// Local, pre-flight rejection of a draft or patch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Name is too long ({0} characters)")]
    NameTooLong(usize),
    #[error("Description is too long ({0} characters)")]
    DescriptionTooLong(usize),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Amount must not be negative")]
    NegativeAmount,
    #[error("Amount exceeds the maximum of {0:.2}")]
    AmountTooLarge(f64),
    #[error("No {kind} with id '{id}'")]
    UnknownId { kind: EntityKind, id: String },
    #[error("Update contains no fields")]
    EmptyPatch,
}

impl From<AmountError> for ValidationError {
    fn from(error: AmountError) -> Self {
        match error {
            AmountError::Negative => ValidationError::NegativeAmount,
            other => ValidationError::InvalidAmount(other.to_string()),
        }
    }
}

/// Failure reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network unreachable, timeout, or a malformed response
    #[error("Could not reach the server: {0}")]
    Transport(String),
    /// Missing or expired credential
    #[error("Your session has expired, please sign in again")]
    AuthExpired,
    /// The server refused the payload
    #[error("The server rejected the change: {0}")]
    Rejected(String),
    #[error("The server has no record of '{0}'")]
    NotFound(String),
}

impl RemoteError {
    /// The surrounding session must re-authenticate; the ledger never does it itself
    pub fn requires_reauth(&self) -> bool {
        matches!(self, RemoteError::AuthExpired)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Showing data cached at {saved_at}; refresh failed: {cause}")]
    StaleBootstrap {
        saved_at: DateTime<Utc>,
        cause: RemoteError,
    },
    /// A background sync task ended without producing a result
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn requires_reauth(&self) -> bool {
        match self {
            LedgerError::Remote(error) => error.requires_reauth(),
            LedgerError::StaleBootstrap { cause, .. } => cause.requires_reauth(),
            _ => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
