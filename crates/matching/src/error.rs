//! Matching engine error types

use common::UserId;
use inventory::InventoryError;
use thiserror::Error;

/// Errors that can occur while generating suggestions
#[derive(Error, Debug)]
pub enum MatchingError {
    /// The querying user has no member profile
    #[error("No member profile for user: {0}")]
    MemberNotFound(UserId),

    /// Inventory store failure
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Suggestion storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for matching operations
pub type MatchingResult<T> = std::result::Result<T, MatchingError>;
