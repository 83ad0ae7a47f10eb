//! In-memory request and exchange stores for testing and development

use crate::error::{ExchangeError, ExchangeResult};
use crate::store::traits::{ExchangeStore, RequestStore};
use crate::types::{
    BookRole, Exchange, ExchangeRequest, ExchangeRole, ExchangeStatus, RequestStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, ExchangeId, MemberId, RequestId};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory request store
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<RequestId, ExchangeRequest>>,
}

impl InMemoryRequestStore {
    /// Create an empty request store
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn create(&self, request: ExchangeRequest) -> ExchangeResult<ExchangeRequest> {
        let mut requests = self.requests.write().unwrap();
        requests.insert(request.request_id, request.clone());
        Ok(request)
    }

    async fn get(&self, request_id: RequestId) -> ExchangeResult<Option<ExchangeRequest>> {
        let requests = self.requests.read().unwrap();
        Ok(requests.get(&request_id).cloned())
    }

    async fn update(&self, request: &ExchangeRequest) -> ExchangeResult<()> {
        let mut requests = self.requests.write().unwrap();
        let row = requests
            .get_mut(&request.request_id)
            .ok_or(ExchangeError::RequestNotFound(request.request_id))?;

        // Status only moves through transition_status
        let status = row.status;
        *row = request.clone();
        row.status = status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        request_id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> ExchangeResult<bool> {
        let mut requests = self.requests.write().unwrap();
        let row = requests
            .get_mut(&request_id)
            .ok_or(ExchangeError::RequestNotFound(request_id))?;

        if row.status != expected {
            return Ok(false);
        }

        row.status = next;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_pending_for_pair(
        &self,
        requester: MemberId,
        receiver: MemberId,
    ) -> ExchangeResult<Option<ExchangeRequest>> {
        let requests = self.requests.read().unwrap();
        Ok(requests
            .values()
            .find(|r| {
                r.status == RequestStatus::Pending
                    && r.requester_id == requester
                    && r.receiver_id == receiver
            })
            .cloned())
    }

    async fn has_pending_between(&self, a: MemberId, b: MemberId) -> ExchangeResult<bool> {
        let requests = self.requests.read().unwrap();
        Ok(requests.values().any(|r| {
            r.status == RequestStatus::Pending
                && ((r.requester_id == a && r.receiver_id == b)
                    || (r.requester_id == b && r.receiver_id == a))
        }))
    }

    async fn count_pending_requesting_book(&self, book_id: BookId) -> ExchangeResult<usize> {
        let requests = self.requests.read().unwrap();
        Ok(requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .filter(|r| {
                r.books
                    .iter()
                    .any(|b| b.role == BookRole::Requested && b.book_id == book_id)
            })
            .count())
    }

    async fn list_involving(&self, member_id: MemberId) -> ExchangeResult<Vec<ExchangeRequest>> {
        let requests = self.requests.read().unwrap();
        let mut result: Vec<ExchangeRequest> = requests
            .values()
            .filter(|r| r.requester_id == member_id || r.receiver_id == member_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> ExchangeResult<Vec<ExchangeRequest>> {
        let requests = self.requests.read().unwrap();
        Ok(requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending && r.is_expired(now))
            .cloned()
            .collect())
    }
}

/// In-memory exchange store
pub struct InMemoryExchangeStore {
    exchanges: RwLock<HashMap<ExchangeId, Exchange>>,
}

impl InMemoryExchangeStore {
    /// Create an empty exchange store
    pub fn new() -> Self {
        Self {
            exchanges: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryExchangeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeStore for InMemoryExchangeStore {
    async fn create(&self, exchange: Exchange) -> ExchangeResult<Exchange> {
        let mut exchanges = self.exchanges.write().unwrap();
        exchanges.insert(exchange.exchange_id, exchange.clone());
        Ok(exchange)
    }

    async fn get(&self, exchange_id: ExchangeId) -> ExchangeResult<Option<Exchange>> {
        let exchanges = self.exchanges.read().unwrap();
        Ok(exchanges.get(&exchange_id).cloned())
    }

    async fn update(&self, exchange: &Exchange) -> ExchangeResult<()> {
        let mut exchanges = self.exchanges.write().unwrap();
        let row = exchanges
            .get_mut(&exchange.exchange_id)
            .ok_or(ExchangeError::ExchangeNotFound(exchange.exchange_id))?;

        // Status only moves through transition_status
        let status = row.status;
        *row = exchange.clone();
        row.status = status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        exchange_id: ExchangeId,
        expected: ExchangeStatus,
        next: ExchangeStatus,
    ) -> ExchangeResult<bool> {
        let mut exchanges = self.exchanges.write().unwrap();
        let row = exchanges
            .get_mut(&exchange_id)
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))?;

        if row.status != expected {
            return Ok(false);
        }

        row.status = next;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_confirmed(
        &self,
        exchange_id: ExchangeId,
        role: ExchangeRole,
    ) -> ExchangeResult<Exchange> {
        let mut exchanges = self.exchanges.write().unwrap();
        let row = exchanges
            .get_mut(&exchange_id)
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))?;

        match role {
            ExchangeRole::SideA => row.confirmed_by_a = true,
            ExchangeRole::SideB => row.confirmed_by_b = true,
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_meeting_confirmed(
        &self,
        exchange_id: ExchangeId,
        role: ExchangeRole,
    ) -> ExchangeResult<Exchange> {
        let mut exchanges = self.exchanges.write().unwrap();
        let row = exchanges
            .get_mut(&exchange_id)
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))?;

        let meeting = row.meeting.as_mut().ok_or(ExchangeError::MeetingNotSet)?;
        meeting.set_confirmed(role);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn list_involving(
        &self,
        member_id: MemberId,
        statuses: Option<Vec<ExchangeStatus>>,
    ) -> ExchangeResult<Vec<Exchange>> {
        let exchanges = self.exchanges.read().unwrap();
        let mut result: Vec<Exchange> = exchanges
            .values()
            .filter(|e| e.member_a == member_id || e.member_b == member_id)
            .filter(|e| match statuses {
                Some(ref wanted) => wanted.contains(&e.status),
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> ExchangeResult<Vec<Exchange>> {
        let exchanges = self.exchanges.read().unwrap();
        Ok(exchanges
            .values()
            .filter(|e| e.status == ExchangeStatus::Pending && e.is_expired(now))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestBook;

    fn request(requester: MemberId, receiver: MemberId) -> ExchangeRequest {
        ExchangeRequest::new(
            requester,
            receiver,
            vec![RequestBook {
                book_id: BookId::new(),
                role: BookRole::Requested,
            }],
            None,
            Utc::now() + chrono::Duration::days(14),
        )
    }

    #[tokio::test]
    async fn test_request_transition_cas() {
        let store = InMemoryRequestStore::new();
        let r = request(MemberId::new(), MemberId::new());
        let id = r.request_id;
        store.create(r).await.unwrap();

        assert!(store
            .transition_status(id, RequestStatus::Pending, RequestStatus::Accepted)
            .await
            .unwrap());
        assert!(!store
            .transition_status(id, RequestStatus::Pending, RequestStatus::Cancelled)
            .await
            .unwrap());

        let row = store.get(id).await.unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_request_update_never_touches_status() {
        let store = InMemoryRequestStore::new();
        let r = request(MemberId::new(), MemberId::new());
        let id = r.request_id;
        store.create(r.clone()).await.unwrap();
        store
            .transition_status(id, RequestStatus::Pending, RequestStatus::Rejected)
            .await
            .unwrap();

        let mut stale = r;
        stale.status = RequestStatus::Pending;
        stale.rejection_reason = Some("changed my mind".to_string());
        store.update(&stale).await.unwrap();

        let row = store.get(id).await.unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Rejected);
        assert_eq!(row.rejection_reason.as_deref(), Some("changed my mind"));
    }

    #[tokio::test]
    async fn test_pending_pair_lookup_is_ordered() {
        let store = InMemoryRequestStore::new();
        let (a, b) = (MemberId::new(), MemberId::new());
        store.create(request(a, b)).await.unwrap();

        assert!(store.find_pending_for_pair(a, b).await.unwrap().is_some());
        assert!(store.find_pending_for_pair(b, a).await.unwrap().is_none());
        assert!(store.has_pending_between(b, a).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_pending_requesting_book() {
        let store = InMemoryRequestStore::new();
        let book_id = BookId::new();

        for _ in 0..2 {
            let mut r = request(MemberId::new(), MemberId::new());
            r.books = vec![RequestBook {
                book_id,
                role: BookRole::Requested,
            }];
            store.create(r).await.unwrap();
        }

        // Offered side never counts toward contention
        let mut offered = request(MemberId::new(), MemberId::new());
        offered.books = vec![RequestBook {
            book_id,
            role: BookRole::Offered,
        }];
        store.create(offered).await.unwrap();

        assert_eq!(store.count_pending_requesting_book(book_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_pending_scan() {
        let store = InMemoryRequestStore::new();
        let mut expired = request(MemberId::new(), MemberId::new());
        expired.expires_at = Utc::now() - chrono::Duration::hours(1);
        let expired_id = expired.request_id;
        store.create(expired).await.unwrap();
        store.create(request(MemberId::new(), MemberId::new())).await.unwrap();

        let found = store.list_expired_pending(Utc::now()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].request_id, expired_id);
    }

    #[tokio::test]
    async fn test_exchange_set_confirmed_returns_updated_row() {
        let store = InMemoryExchangeStore::new();
        let exchange = Exchange::new(
            RequestId::new(),
            MemberId::new(),
            MemberId::new(),
            vec![],
            Utc::now() + chrono::Duration::days(30),
        );
        let id = exchange.exchange_id;
        store.create(exchange).await.unwrap();

        let after_a = store.set_confirmed(id, ExchangeRole::SideA).await.unwrap();
        assert!(after_a.confirmed_by_a && !after_a.confirmed_by_b);

        let after_b = store.set_confirmed(id, ExchangeRole::SideB).await.unwrap();
        assert!(after_b.both_confirmed());
    }

    #[tokio::test]
    async fn test_meeting_confirm_requires_meeting() {
        let store = InMemoryExchangeStore::new();
        let exchange = Exchange::new(
            RequestId::new(),
            MemberId::new(),
            MemberId::new(),
            vec![],
            Utc::now() + chrono::Duration::days(30),
        );
        let id = exchange.exchange_id;
        store.create(exchange).await.unwrap();

        let result = store.set_meeting_confirmed(id, ExchangeRole::SideA).await;
        assert!(matches!(result, Err(ExchangeError::MeetingNotSet)));
    }

    #[tokio::test]
    async fn test_exchange_list_involving_filters_status() {
        let store = InMemoryExchangeStore::new();
        let member = MemberId::new();

        let pending = Exchange::new(
            RequestId::new(),
            member,
            MemberId::new(),
            vec![],
            Utc::now() + chrono::Duration::days(30),
        );
        store.create(pending).await.unwrap();

        let done = Exchange::new(
            RequestId::new(),
            MemberId::new(),
            member,
            vec![],
            Utc::now() + chrono::Duration::days(30),
        );
        let done_id = done.exchange_id;
        store.create(done).await.unwrap();
        store
            .transition_status(done_id, ExchangeStatus::Pending, ExchangeStatus::Completed)
            .await
            .unwrap();

        let all = store.list_involving(member, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let completed = store
            .list_involving(member, Some(vec![ExchangeStatus::Completed]))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].exchange_id, done_id);
    }
}
