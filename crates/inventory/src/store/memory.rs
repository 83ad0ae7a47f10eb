//! In-memory inventory store for testing and development

use crate::error::{InventoryError, InventoryResult};
use crate::store::traits::{BookStore, MemberStore, WantListStore};
use crate::types::{Book, BookStatus, Member, WantedBook};
use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, MemberId, UserId, WantedBookId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory implementation of all three inventory store traits
pub struct InMemoryInventory {
    members: RwLock<HashMap<MemberId, Member>>,
    books: RwLock<HashMap<BookId, Book>>,
    wants: RwLock<HashMap<WantedBookId, WantedBook>>,
    blocks: RwLock<HashSet<(MemberId, MemberId)>>,
}

impl InMemoryInventory {
    /// Create an empty in-memory inventory
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
            wants: RwLock::new(HashMap::new()),
            blocks: RwLock::new(HashSet::new()),
        }
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberStore for InMemoryInventory {
    async fn get(&self, member_id: MemberId) -> InventoryResult<Option<Member>> {
        let members = self.members.read().unwrap();
        Ok(members.get(&member_id).cloned())
    }

    async fn upsert(&self, member: Member) -> InventoryResult<Member> {
        let mut members = self.members.write().unwrap();
        members.insert(member.member_id, member.clone());
        Ok(member)
    }

    async fn member_ids_for_user(&self, user_id: UserId) -> InventoryResult<Vec<MemberId>> {
        let members = self.members.read().unwrap();
        let mut rows: Vec<&Member> = members.values().filter(|m| m.user_id == user_id).collect();
        // Oldest row first so the primary member is deterministic
        rows.sort_by_key(|m| m.created_at);
        Ok(rows.iter().map(|m| m.member_id).collect())
    }

    async fn are_blocked(&self, a: MemberId, b: MemberId) -> InventoryResult<bool> {
        let blocks = self.blocks.read().unwrap();
        Ok(blocks.contains(&(a, b)) || blocks.contains(&(b, a)))
    }

    async fn set_blocked(
        &self,
        blocker: MemberId,
        blocked: MemberId,
        value: bool,
    ) -> InventoryResult<()> {
        let mut blocks = self.blocks.write().unwrap();
        if value {
            blocks.insert((blocker, blocked));
        } else {
            blocks.remove(&(blocker, blocked));
        }
        Ok(())
    }

    async fn adjust_trust(&self, member_id: MemberId, delta: f64) -> InventoryResult<f64> {
        let mut members = self.members.write().unwrap();
        let member = members
            .get_mut(&member_id)
            .ok_or(InventoryError::MemberNotFound(member_id))?;
        member.trust_score += delta;
        member.updated_at = Utc::now();
        Ok(member.trust_score)
    }

    async fn record_completion(&self, member_id: MemberId) -> InventoryResult<()> {
        let mut members = self.members.write().unwrap();
        let member = members
            .get_mut(&member_id)
            .ok_or(InventoryError::MemberNotFound(member_id))?;
        member.completed_exchanges += 1;
        member.updated_at = Utc::now();
        Ok(())
    }

    async fn record_cancellation(&self, member_id: MemberId) -> InventoryResult<()> {
        let mut members = self.members.write().unwrap();
        let member = members
            .get_mut(&member_id)
            .ok_or(InventoryError::MemberNotFound(member_id))?;
        member.cancelled_exchanges += 1;
        member.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BookStore for InMemoryInventory {
    async fn get(&self, book_id: BookId) -> InventoryResult<Option<Book>> {
        let books = self.books.read().unwrap();
        Ok(books.get(&book_id).cloned())
    }

    async fn get_many(&self, book_ids: &[BookId]) -> InventoryResult<Vec<Book>> {
        let books = self.books.read().unwrap();
        Ok(book_ids
            .iter()
            .filter_map(|id| books.get(id).cloned())
            .collect())
    }

    async fn upsert(&self, book: Book) -> InventoryResult<Book> {
        let mut books = self.books.write().unwrap();
        books.insert(book.book_id, book.clone());
        Ok(book)
    }

    async fn find_available_by_isbn(&self, isbn: &str) -> InventoryResult<Vec<Book>> {
        let books = self.books.read().unwrap();
        Ok(books
            .values()
            .filter(|b| b.is_listed() && b.isbn.as_deref() == Some(isbn))
            .cloned()
            .collect())
    }

    async fn find_available_by_catalog_id(&self, catalog_id: &str) -> InventoryResult<Vec<Book>> {
        let books = self.books.read().unwrap();
        Ok(books
            .values()
            .filter(|b| b.is_listed() && b.catalog_id.as_deref() == Some(catalog_id))
            .cloned()
            .collect())
    }

    async fn list_available(&self) -> InventoryResult<Vec<Book>> {
        let books = self.books.read().unwrap();
        Ok(books.values().filter(|b| b.is_listed()).cloned().collect())
    }

    async fn list_available_by_owner(&self, owner: MemberId) -> InventoryResult<Vec<Book>> {
        let books = self.books.read().unwrap();
        Ok(books
            .values()
            .filter(|b| b.is_listed() && b.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        book_id: BookId,
        expected: BookStatus,
        next: BookStatus,
    ) -> InventoryResult<bool> {
        let mut books = self.books.write().unwrap();
        let book = books
            .get_mut(&book_id)
            .ok_or(InventoryError::BookNotFound(book_id))?;

        if book.status != expected {
            return Ok(false);
        }

        book.status = next;
        book.updated_at = Utc::now();
        Ok(true)
    }

    async fn transfer_owner(&self, book_id: BookId, new_owner: MemberId) -> InventoryResult<()> {
        let mut books = self.books.write().unwrap();
        let book = books
            .get_mut(&book_id)
            .ok_or(InventoryError::BookNotFound(book_id))?;

        book.owner_id = new_owner;
        book.status = BookStatus::Available;
        book.deleted = false;
        book.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl WantListStore for InMemoryInventory {
    async fn list_for_member(&self, member_id: MemberId) -> InventoryResult<Vec<WantedBook>> {
        let wants = self.wants.read().unwrap();
        let mut result: Vec<WantedBook> = wants
            .values()
            .filter(|w| w.member_id == member_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(result)
    }

    async fn upsert(&self, wanted: WantedBook) -> InventoryResult<WantedBook> {
        let mut wants = self.wants.write().unwrap();
        wants.insert(wanted.wanted_id, wanted.clone());
        Ok(wanted)
    }

    async fn remove(&self, wanted_id: WantedBookId) -> InventoryResult<()> {
        let mut wants = self.wants.write().unwrap();
        wants.remove(&wanted_id);
        Ok(())
    }
}
