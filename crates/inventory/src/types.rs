//! Inventory domain types
//!
//! Members, their books, and their want-lists. Book `status` is the most
//! contended field in the system; every transition that depends on the
//! current status goes through [`crate::store::traits::BookStore::transition_status`].

use chrono::{DateTime, Utc};
use common::{BookId, MemberId, UserId, WantedBookId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a physical book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// Listed and free to be requested
    Available,
    /// Locked into an accepted exchange
    Exchanging,
    /// Lent out, not tradeable
    Borrowed,
    /// Withdrawn by the owner
    Removed,
}

impl Default for BookStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookStatus::Available => write!(f, "available"),
            BookStatus::Exchanging => write!(f, "exchanging"),
            BookStatus::Borrowed => write!(f, "borrowed"),
            BookStatus::Removed => write!(f, "removed"),
        }
    }
}

/// Physical condition tier, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookCondition {
    Poor,
    Fair,
    Good,
    VeryGood,
    LikeNew,
}

/// A member of the platform
///
/// `trust_score` is conceptually bounded to 0-100 but no single writer
/// clamps it; all mutations are relative deltas applied through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    /// Owning user identity; more than one member row may share it
    pub user_id: UserId,
    pub display_name: String,
    /// Free-text locality, matched case-insensitively by the proximity factor
    pub region: String,
    pub trust_score: f64,
    pub average_rating: f64,
    pub completed_exchanges: u32,
    pub cancelled_exchanges: u32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Create a new member with a neutral reputation profile
    pub fn new(user_id: UserId, display_name: impl Into<String>, region: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            member_id: MemberId::new(),
            user_id,
            display_name: display_name.into(),
            region: region.into(),
            trust_score: 50.0,
            average_rating: 0.0,
            completed_exchanges: 0,
            cancelled_exchanges: 0,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A physical book owned by exactly one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub owner_id: MemberId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    /// External catalog identifier (e.g. an OpenLibrary id)
    pub catalog_id: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub condition: BookCondition,
    pub status: BookStatus,
    /// Soft-delete marker; deleted books are invisible to matching
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create an available, listed book
    pub fn new(
        owner_id: MemberId,
        title: impl Into<String>,
        author: impl Into<String>,
        condition: BookCondition,
    ) -> Self {
        let now = Utc::now();
        Self {
            book_id: BookId::new(),
            owner_id,
            title: title.into(),
            author: author.into(),
            isbn: None,
            catalog_id: None,
            category: None,
            language: None,
            condition,
            status: BookStatus::Available,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the book can be offered or requested right now
    pub fn is_listed(&self) -> bool {
        !self.deleted && self.status == BookStatus::Available
    }
}

/// An entry in a member's want-list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WantedBook {
    pub wanted_id: WantedBookId,
    pub member_id: MemberId,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub catalog_id: Option<String>,
    pub category: Option<String>,
    /// 0-10; values above 10 are clamped at construction
    pub priority: u8,
    /// Candidate books below this condition are filtered out
    pub min_condition: Option<BookCondition>,
    /// Candidate books in a different language are filtered out
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WantedBook {
    /// Create a want-list entry; priority is clamped to 0-10
    pub fn new(member_id: MemberId, title: impl Into<String>, priority: u8) -> Self {
        Self {
            wanted_id: WantedBookId::new(),
            member_id,
            title: title.into(),
            author: None,
            isbn: None,
            catalog_id: None,
            category: None,
            priority: priority.min(10),
            min_condition: None,
            language: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a candidate book passes this entry's condition and language filters
    pub fn accepts(&self, book: &Book) -> bool {
        if let Some(min) = self.min_condition {
            if book.condition < min {
                return false;
            }
        }
        if let Some(ref lang) = self.language {
            match book.language {
                Some(ref book_lang) if book_lang.eq_ignore_ascii_case(lang) => {}
                _ => return false,
            }
        }
        true
    }
}
