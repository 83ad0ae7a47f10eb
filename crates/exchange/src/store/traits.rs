//! Exchange storage trait definitions
//!
//! Status fields only ever move through the conditional `transition_status`
//! operations; the plain `update` methods write every other field and leave
//! status untouched. That split is what lets user-driven transitions and
//! the expiry sweeps run concurrently without double-applying effects.

use crate::error::ExchangeResult;
use crate::types::{Exchange, ExchangeRequest, ExchangeRole, ExchangeStatus, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, ExchangeId, MemberId, RequestId};

/// Storage for exchange requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persist a new request
    async fn create(&self, request: ExchangeRequest) -> ExchangeResult<ExchangeRequest>;

    /// Get a request by id
    async fn get(&self, request_id: RequestId) -> ExchangeResult<Option<ExchangeRequest>>;

    /// Write all non-status fields of an existing request
    async fn update(&self, request: &ExchangeRequest) -> ExchangeResult<()>;

    /// Conditionally transition a request's status
    ///
    /// `Ok(false)` means the row was not in `expected` and nothing changed.
    async fn transition_status(
        &self,
        request_id: RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> ExchangeResult<bool>;

    /// The pending request from `requester` to `receiver`, if any (ordered pair)
    async fn find_pending_for_pair(
        &self,
        requester: MemberId,
        receiver: MemberId,
    ) -> ExchangeResult<Option<ExchangeRequest>>;

    /// Whether any pending request links the two members, in either direction
    async fn has_pending_between(&self, a: MemberId, b: MemberId) -> ExchangeResult<bool>;

    /// How many pending requests name this book as requested
    async fn count_pending_requesting_book(&self, book_id: BookId) -> ExchangeResult<usize>;

    /// Every request the member participates in, newest first
    async fn list_involving(&self, member_id: MemberId) -> ExchangeResult<Vec<ExchangeRequest>>;

    /// Pending requests whose expiry horizon has passed
    async fn list_expired_pending(&self, now: DateTime<Utc>)
        -> ExchangeResult<Vec<ExchangeRequest>>;
}

/// Storage for accepted exchanges
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Persist a new exchange
    async fn create(&self, exchange: Exchange) -> ExchangeResult<Exchange>;

    /// Get an exchange by id
    async fn get(&self, exchange_id: ExchangeId) -> ExchangeResult<Option<Exchange>>;

    /// Write all non-status fields of an existing exchange
    async fn update(&self, exchange: &Exchange) -> ExchangeResult<()>;

    /// Conditionally transition an exchange's status
    ///
    /// `Ok(false)` means the row was not in `expected` and nothing changed.
    async fn transition_status(
        &self,
        exchange_id: ExchangeId,
        expected: ExchangeStatus,
        next: ExchangeStatus,
    ) -> ExchangeResult<bool>;

    /// Atomically set one side's completion confirmation; returns the row
    /// as it stands after the write, so the caller can observe whether its
    /// write made both sides confirmed
    async fn set_confirmed(
        &self,
        exchange_id: ExchangeId,
        role: ExchangeRole,
    ) -> ExchangeResult<Exchange>;

    /// Atomically set one side's meeting confirmation; errors when no
    /// meeting is scheduled
    async fn set_meeting_confirmed(
        &self,
        exchange_id: ExchangeId,
        role: ExchangeRole,
    ) -> ExchangeResult<Exchange>;

    /// Exchanges the member participates in, optionally filtered by
    /// status, newest first
    async fn list_involving(
        &self,
        member_id: MemberId,
        statuses: Option<Vec<ExchangeStatus>>,
    ) -> ExchangeResult<Vec<Exchange>>;

    /// Pending exchanges whose expiry horizon has passed
    async fn list_expired_pending(&self, now: DateTime<Utc>) -> ExchangeResult<Vec<Exchange>>;
}
