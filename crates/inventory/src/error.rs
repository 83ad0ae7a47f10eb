//! Inventory error types

use common::{BookId, MemberId, UserId};
use thiserror::Error;

/// Errors surfaced by the inventory store
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Member not found
    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    /// No member row exists for this user identity
    #[error("No member profile for user: {0}")]
    UserNotFound(UserId),

    /// Book not found
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for inventory operations
pub type InventoryResult<T> = std::result::Result<T, InventoryError>;
