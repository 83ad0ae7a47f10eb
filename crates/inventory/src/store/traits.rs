//! Inventory store trait definitions
//!
//! These traits are the narrow interface through which the matching engine
//! and the exchange state machines touch member/book/want-list state. The
//! production backend lives outside this repository; the in-memory
//! implementation backs the binary and the tests.

use crate::error::InventoryResult;
use crate::types::{Book, BookStatus, Member, WantedBook};
use async_trait::async_trait;
use common::{BookId, MemberId, UserId, WantedBookId};

/// Member directory and reputation fields
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Get a member by id
    async fn get(&self, member_id: MemberId) -> InventoryResult<Option<Member>>;

    /// Insert or replace a member row
    async fn upsert(&self, member: Member) -> InventoryResult<Member>;

    /// All member rows belonging to one user identity, oldest first
    ///
    /// The directory tolerates more than one member row per user; callers
    /// must treat the whole set as the owning identity rather than compare
    /// against a single id.
    async fn member_ids_for_user(&self, user_id: UserId) -> InventoryResult<Vec<MemberId>>;

    /// Whether either member blocks the other
    async fn are_blocked(&self, a: MemberId, b: MemberId) -> InventoryResult<bool>;

    /// Add or remove a directed block edge
    async fn set_blocked(&self, blocker: MemberId, blocked: MemberId, value: bool)
        -> InventoryResult<()>;

    /// Apply a relative trust-score delta; returns the new score
    ///
    /// Absolute overwrites are reserved for admin tooling outside this
    /// repository.
    async fn adjust_trust(&self, member_id: MemberId, delta: f64) -> InventoryResult<f64>;

    /// Increment the member's completed-exchange counter
    async fn record_completion(&self, member_id: MemberId) -> InventoryResult<()>;

    /// Increment the member's cancelled-exchange counter
    async fn record_cancellation(&self, member_id: MemberId) -> InventoryResult<()>;
}

/// Book inventory
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Get a book by id
    async fn get(&self, book_id: BookId) -> InventoryResult<Option<Book>>;

    /// Get several books; missing ids are simply absent from the result
    async fn get_many(&self, book_ids: &[BookId]) -> InventoryResult<Vec<Book>>;

    /// Insert or replace a book row
    async fn upsert(&self, book: Book) -> InventoryResult<Book>;

    /// Listed (available, non-deleted) books with this exact ISBN
    async fn find_available_by_isbn(&self, isbn: &str) -> InventoryResult<Vec<Book>>;

    /// Listed books with this exact external catalog id
    async fn find_available_by_catalog_id(&self, catalog_id: &str) -> InventoryResult<Vec<Book>>;

    /// Every listed book, for the fuzzy text strategy
    async fn list_available(&self) -> InventoryResult<Vec<Book>>;

    /// Listed books owned by one member
    async fn list_available_by_owner(&self, owner: MemberId) -> InventoryResult<Vec<Book>>;

    /// Conditionally transition a book's status
    ///
    /// The row is updated only if its current status equals `expected`;
    /// `Ok(false)` means the precondition was lost to a concurrent writer
    /// and nothing was changed. This is the only way status transitions
    /// that depend on the prior status are performed.
    async fn transition_status(
        &self,
        book_id: BookId,
        expected: BookStatus,
        next: BookStatus,
    ) -> InventoryResult<bool>;

    /// Reassign ownership after a completed exchange
    ///
    /// Sets the new owner, resets status to Available, and clears the
    /// soft-delete marker.
    async fn transfer_owner(&self, book_id: BookId, new_owner: MemberId) -> InventoryResult<()>;
}

/// Want-list entries, read-mostly from the matching engine's side
#[async_trait]
pub trait WantListStore: Send + Sync {
    /// A member's want-list sorted by priority descending
    async fn list_for_member(&self, member_id: MemberId) -> InventoryResult<Vec<WantedBook>>;

    /// Insert or replace a want-list entry
    async fn upsert(&self, wanted: WantedBook) -> InventoryResult<WantedBook>;

    /// Remove a want-list entry
    async fn remove(&self, wanted_id: WantedBookId) -> InventoryResult<()>;
}
