//! Exchange error types
//!
//! Every variant is a local validation failure detected before any state
//! mutation, except `Conflict`, which reports a lost conditional update.
//! Side-channel (notification/activity) failures never surface here.

use chrono::{DateTime, Utc};
use common::{BookId, ExchangeId, RequestId, UserId};
use inventory::InventoryError;
use thiserror::Error;

/// Errors that can occur in the exchange lifecycle
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Exchange request not found
    #[error("Exchange request not found: {0}")]
    RequestNotFound(RequestId),

    /// Exchange not found
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(ExchangeId),

    /// The calling user has no member profile
    #[error("No member profile for user: {0}")]
    MemberNotFound(UserId),

    /// Caller is not the required participant for this operation
    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// The entity is not in a state that permits the transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requester's trust score is below the initiation floor
    #[error("Trust score {score} is below the required minimum of {floor}")]
    TrustBelowFloor { score: f64, floor: f64 },

    /// A pending request already exists for this requester/receiver pair
    #[error("A pending request already exists between these members")]
    DuplicatePendingRequest,

    /// The requested book already has too many pending requests
    #[error("Book {book_id} already has {pending} pending requests")]
    BookContended { book_id: BookId, pending: usize },

    /// One or more tied books are no longer available
    #[error("Books no longer available: {book_ids:?}")]
    BooksUnavailable { book_ids: Vec<BookId> },

    /// This side has already confirmed
    #[error("Participant has already confirmed")]
    AlreadyConfirmed,

    /// The request passed its expiry horizon before the response
    #[error("The request expired at {0}")]
    RequestExpired(DateTime<Utc>),

    /// A meeting operation requires a scheduled meeting
    #[error("No meeting has been scheduled for this exchange")]
    MeetingNotSet,

    /// Meeting times must be in the future
    #[error("Meeting time must be in the future")]
    MeetingTimeInPast,

    /// A conditional update lost to a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Inventory store failure
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
