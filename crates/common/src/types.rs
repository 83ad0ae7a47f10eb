//! Common types used across BookSwap
//!
//! This module provides the fundamental identifier and pagination types
//! used throughout the platform.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! impl_id_display {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Unique identifier for the authenticated user behind one or more members
///
/// More than one member row may exist for a single user identity (a known
/// data-quality artifact of the upstream member directory); resolution of a
/// `UserId` to its member rows happens in the inventory crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a UserId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(UserId);

/// Unique identifier for members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    /// Create a new random MemberId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a MemberId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(MemberId);

/// Unique identifier for books
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(pub Uuid);

impl BookId {
    /// Create a new random BookId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(BookId);

/// Unique identifier for want-list entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WantedBookId(pub Uuid);

impl WantedBookId {
    /// Create a new random WantedBookId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WantedBookId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(WantedBookId);

/// Unique identifier for exchange requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random RequestId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(RequestId);

/// Unique identifier for exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub Uuid);

impl ExchangeId {
    /// Create a new random ExchangeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(ExchangeId);

/// Unique identifier for match suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(pub Uuid);

impl SuggestionId {
    /// Create a new random SuggestionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl_id_display!(SuggestionId);

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of results
    pub limit: u32,
    /// Number of results to skip
    pub offset: u32,
}

impl PageRequest {
    /// Create a page request, clamping the limit to `1..=max_limit`
    pub fn clamped(limit: u32, offset: u32, max_limit: u32) -> Self {
        Self {
            limit: limit.clamp(1, max_limit),
            offset,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of results plus the total row count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    /// Build a page from an already-filtered full result set
    pub fn from_full(mut items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let start = (request.offset as usize).min(items.len());
        let mut items: Vec<T> = items.drain(start..).collect();
        items.truncate(request.limit as usize);
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(MemberId::new(), MemberId::new());
        assert_ne!(BookId::new(), BookId::new());
    }

    #[test]
    fn test_page_request_clamped() {
        let page = PageRequest::clamped(0, 5, 100);
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 5);

        let page = PageRequest::clamped(500, 0, 100);
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn test_page_from_full() {
        let page = Page::from_full(vec![1, 2, 3, 4, 5], PageRequest { limit: 2, offset: 1 });
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.total, 5);
    }

    #[test]
    fn test_page_from_full_offset_past_end() {
        let page = Page::from_full(vec![1, 2], PageRequest { limit: 10, offset: 9 });
        assert!(page.items.is_empty());
        assert_eq!(page.total, 2);
    }
}
