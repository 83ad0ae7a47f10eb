//! Exchange request state machine
//!
//! PENDING → ACCEPTED | REJECTED | CANCELLED. Books are not locked when a
//! request is created; other members may keep proposing on the same book.
//! Only acceptance locks books, which is also why resolving a pending
//! request (reject/cancel/expire) never mutates book rows.

use crate::clients::activity::{ActivityAction, ActivityLogClient, ActivityRecord};
use crate::clients::notifications::{NotificationClient, NotificationKind};
use crate::error::{ExchangeError, ExchangeResult};
use crate::store::traits::{ExchangeStore, RequestStore};
use crate::types::{
    BookRole, Exchange, ExchangeBook, ExchangeRequest, RequestBook, RequestStatus,
};
use chrono::{Duration, Utc};
use common::{BookId, MemberId, RequestId, UserId};
use config::{LifecycleConfig, TrustConfig};
use inventory::{
    BookStatus, BookStore, IdentityResolver, InventoryError, MemberIdentity, MemberStore,
};
use metrics::counter;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// The receiver's response to a pending request
#[derive(Debug, Clone)]
pub enum RequestAction {
    Accept,
    Reject { reason: Option<String> },
}

/// Result of responding to a request
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// Books are locked and an exchange now exists
    Accepted {
        request: ExchangeRequest,
        exchange: Exchange,
    },
    /// The request is closed; books were never locked
    Rejected(ExchangeRequest),
}

/// Request manager - drives the request state machine
pub struct RequestManager {
    requests: Arc<dyn RequestStore>,
    exchanges: Arc<dyn ExchangeStore>,
    members: Arc<dyn MemberStore>,
    books: Arc<dyn BookStore>,
    identity: IdentityResolver,
    notifications: Arc<dyn NotificationClient>,
    activity: Arc<dyn ActivityLogClient>,
    trust: TrustConfig,
    lifecycle: LifecycleConfig,
}

impl RequestManager {
    /// Create a new RequestManager
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn RequestStore>,
        exchanges: Arc<dyn ExchangeStore>,
        members: Arc<dyn MemberStore>,
        books: Arc<dyn BookStore>,
        notifications: Arc<dyn NotificationClient>,
        activity: Arc<dyn ActivityLogClient>,
        trust: TrustConfig,
        lifecycle: LifecycleConfig,
    ) -> Self {
        let identity = IdentityResolver::new(members.clone());
        Self {
            requests,
            exchanges,
            members,
            books,
            identity,
            notifications,
            activity,
            trust,
            lifecycle,
        }
    }

    /// Propose a trade: offer some of the caller's books for some of the
    /// receiver's
    ///
    /// Validation is all-or-nothing and runs before any mutation. Books
    /// stay AVAILABLE; only acceptance locks them.
    pub async fn create_request(
        &self,
        user_id: UserId,
        receiver_id: MemberId,
        offered: Vec<BookId>,
        requested: Vec<BookId>,
        message: Option<String>,
    ) -> ExchangeResult<ExchangeRequest> {
        let identity = self.resolve(user_id).await?;
        let requester = &identity.primary;

        if requester.trust_score < self.trust.floor {
            return Err(ExchangeError::TrustBelowFloor {
                score: requester.trust_score,
                floor: self.trust.floor,
            });
        }

        if identity.owns(receiver_id) {
            return Err(ExchangeError::Validation(
                "cannot open an exchange request with yourself".to_string(),
            ));
        }

        self.members
            .get(receiver_id)
            .await?
            .ok_or(ExchangeError::Inventory(InventoryError::MemberNotFound(
                receiver_id,
            )))?;

        if offered.is_empty() || requested.is_empty() {
            return Err(ExchangeError::Validation(
                "a request needs at least one offered and one requested book".to_string(),
            ));
        }

        if offered.len() + requested.len() > self.lifecycle.max_books_per_request {
            return Err(ExchangeError::Validation(format!(
                "a request may tie at most {} books",
                self.lifecycle.max_books_per_request
            )));
        }

        let unique: HashSet<BookId> = offered.iter().chain(requested.iter()).copied().collect();
        if unique.len() != offered.len() + requested.len() {
            return Err(ExchangeError::Validation(
                "duplicate book ids in request".to_string(),
            ));
        }

        self.validate_books(&offered, &identity.member_ids, "offered").await?;
        let receiver_set: HashSet<MemberId> = [receiver_id].into_iter().collect();
        self.validate_books(&requested, &receiver_set, "requested").await?;

        // One pending request per ordered (requester, receiver) pair,
        // counted across every member row of the caller's identity
        for own_id in &identity.member_ids {
            if self
                .requests
                .find_pending_for_pair(*own_id, receiver_id)
                .await?
                .is_some()
            {
                return Err(ExchangeError::DuplicatePendingRequest);
            }
        }

        // Contention guard on each requested book
        for book_id in &requested {
            let pending = self.requests.count_pending_requesting_book(*book_id).await?;
            if pending >= self.lifecycle.max_pending_per_book {
                return Err(ExchangeError::BookContended {
                    book_id: *book_id,
                    pending,
                });
            }
        }

        let books: Vec<RequestBook> = offered
            .iter()
            .map(|id| RequestBook {
                book_id: *id,
                role: BookRole::Offered,
            })
            .chain(requested.iter().map(|id| RequestBook {
                book_id: *id,
                role: BookRole::Requested,
            }))
            .collect();

        let expires_at = Utc::now() + Duration::days(self.lifecycle.request_expiry_days);
        let request = ExchangeRequest::new(
            identity.primary_id(),
            receiver_id,
            books,
            message,
            expires_at,
        );
        let request = self.requests.create(request).await?;

        counter!("requests_created_total").increment(1);
        info!(
            request = %request.request_id,
            requester = %request.requester_id,
            receiver = %request.receiver_id,
            "Exchange request created"
        );
        self.log_activity(
            ActivityRecord::new(
                request.requester_id,
                ActivityAction::RequestCreated,
                "request",
                request.request_id,
            )
            .with_metadata(json!({ "receiver": request.receiver_id.to_string() })),
        )
        .await;

        Ok(request)
    }

    /// Accept or reject a pending request; receiver only
    ///
    /// A request past its expiry horizon is cancelled on the spot and the
    /// caller is told it expired.
    pub async fn respond_to_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
        action: RequestAction,
    ) -> ExchangeResult<RequestOutcome> {
        let identity = self.resolve(user_id).await?;
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or(ExchangeError::RequestNotFound(request_id))?;

        if !identity.owns(request.receiver_id) {
            return Err(ExchangeError::Forbidden(
                "only the receiver may respond to a request".to_string(),
            ));
        }

        if request.status != RequestStatus::Pending {
            return Err(ExchangeError::InvalidState(format!(
                "request is already {}",
                request.status
            )));
        }

        let now = Utc::now();
        if request.is_expired(now) {
            // Late response: close the row and tell the caller. Losing the
            // CAS here just means the sweep got there first.
            let _ = self
                .requests
                .transition_status(request_id, RequestStatus::Pending, RequestStatus::Cancelled)
                .await?;
            counter!("requests_expired_total").increment(1);
            self.log_activity(ActivityRecord::new(
                request.receiver_id,
                ActivityAction::RequestExpired,
                "request",
                request_id,
            ))
            .await;
            return Err(ExchangeError::RequestExpired(request.expires_at));
        }

        match action {
            RequestAction::Accept => self.accept(identity, request).await,
            RequestAction::Reject { reason } => self.reject(request, reason).await,
        }
    }

    /// Withdraw a pending request; requester only
    pub async fn cancel_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
    ) -> ExchangeResult<ExchangeRequest> {
        let identity = self.resolve(user_id).await?;
        let mut request = self
            .requests
            .get(request_id)
            .await?
            .ok_or(ExchangeError::RequestNotFound(request_id))?;

        if !identity.owns(request.requester_id) {
            return Err(ExchangeError::Forbidden(
                "only the requester may cancel a request".to_string(),
            ));
        }

        if request.status != RequestStatus::Pending {
            return Err(ExchangeError::InvalidState(format!(
                "request is already {}",
                request.status
            )));
        }

        if !self
            .requests
            .transition_status(request_id, RequestStatus::Pending, RequestStatus::Cancelled)
            .await?
        {
            return Err(ExchangeError::Conflict(
                "request is no longer pending".to_string(),
            ));
        }
        request.status = RequestStatus::Cancelled;

        counter!("requests_cancelled_total").increment(1);
        info!(request = %request_id, "Exchange request cancelled by requester");
        self.log_activity(ActivityRecord::new(
            request.requester_id,
            ActivityAction::RequestCancelled,
            "request",
            request_id,
        ))
        .await;

        Ok(request)
    }

    /// Get a request; participants only
    pub async fn get_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
    ) -> ExchangeResult<ExchangeRequest> {
        let identity = self.resolve(user_id).await?;
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or(ExchangeError::RequestNotFound(request_id))?;

        if !identity.owns(request.requester_id) && !identity.owns(request.receiver_id) {
            return Err(ExchangeError::Forbidden(
                "not a participant of this request".to_string(),
            ));
        }

        Ok(request)
    }

    /// Every request the caller participates in, newest first
    pub async fn list_requests(&self, user_id: UserId) -> ExchangeResult<Vec<ExchangeRequest>> {
        let identity = self.resolve(user_id).await?;

        let mut result = Vec::new();
        let mut seen: HashSet<RequestId> = HashSet::new();
        for member_id in &identity.member_ids {
            for request in self.requests.list_involving(*member_id).await? {
                if seen.insert(request.request_id) {
                    result.push(request);
                }
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn accept(
        &self,
        identity: MemberIdentity,
        mut request: ExchangeRequest,
    ) -> ExchangeResult<RequestOutcome> {
        let book_ids = request.book_ids();

        // Friendly pre-check so the caller learns every lost book at once.
        // The CAS below remains the source of truth under races.
        let current = self.books.get_many(&book_ids).await?;
        let mut unavailable: Vec<BookId> = current
            .iter()
            .filter(|b| !b.is_listed())
            .map(|b| b.book_id)
            .collect();
        let found: HashSet<BookId> = current.iter().map(|b| b.book_id).collect();
        unavailable.extend(book_ids.iter().filter(|id| !found.contains(id)));
        if !unavailable.is_empty() {
            return Err(ExchangeError::BooksUnavailable {
                book_ids: unavailable,
            });
        }

        // Lock every tied book; unwind on the first lost race
        let mut locked: Vec<BookId> = Vec::new();
        for book_id in &book_ids {
            let won = self
                .books
                .transition_status(*book_id, BookStatus::Available, BookStatus::Exchanging)
                .await?;
            if !won {
                self.release_books(&locked).await;
                return Err(ExchangeError::BooksUnavailable {
                    book_ids: vec![*book_id],
                });
            }
            locked.push(*book_id);
        }

        if !self
            .requests
            .transition_status(
                request.request_id,
                RequestStatus::Pending,
                RequestStatus::Accepted,
            )
            .await?
        {
            self.release_books(&locked).await;
            return Err(ExchangeError::Conflict(
                "request is no longer pending".to_string(),
            ));
        }
        request.status = RequestStatus::Accepted;

        // Offered books flow requester -> receiver, requested books the
        // other way
        let exchange_books: Vec<ExchangeBook> = request
            .books
            .iter()
            .map(|b| match b.role {
                BookRole::Offered => ExchangeBook {
                    book_id: b.book_id,
                    from_member: request.requester_id,
                    to_member: request.receiver_id,
                },
                BookRole::Requested => ExchangeBook {
                    book_id: b.book_id,
                    from_member: request.receiver_id,
                    to_member: request.requester_id,
                },
            })
            .collect();

        let expires_at = Utc::now() + Duration::days(self.lifecycle.exchange_expiry_days);
        let exchange = Exchange::new(
            request.request_id,
            request.requester_id,
            request.receiver_id,
            exchange_books,
            expires_at,
        );
        let exchange = self.exchanges.create(exchange).await?;

        counter!("requests_accepted_total").increment(1);
        info!(
            request = %request.request_id,
            exchange = %exchange.exchange_id,
            books = locked.len(),
            "Request accepted, books locked, exchange created"
        );

        self.notify(
            request.requester_id,
            NotificationKind::ExchangeAccepted,
            json!({
                "request_id": request.request_id.to_string(),
                "exchange_id": exchange.exchange_id.to_string(),
            }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            identity.primary_id(),
            ActivityAction::RequestAccepted,
            "request",
            request.request_id,
        ))
        .await;

        Ok(RequestOutcome::Accepted { request, exchange })
    }

    async fn reject(
        &self,
        mut request: ExchangeRequest,
        reason: Option<String>,
    ) -> ExchangeResult<RequestOutcome> {
        if !self
            .requests
            .transition_status(
                request.request_id,
                RequestStatus::Pending,
                RequestStatus::Rejected,
            )
            .await?
        {
            return Err(ExchangeError::Conflict(
                "request is no longer pending".to_string(),
            ));
        }
        request.status = RequestStatus::Rejected;
        request.rejection_reason = reason;
        self.requests.update(&request).await?;

        counter!("requests_rejected_total").increment(1);
        info!(request = %request.request_id, "Request rejected");

        self.notify(
            request.requester_id,
            NotificationKind::ExchangeRejected,
            json!({
                "request_id": request.request_id.to_string(),
                "reason": request.rejection_reason,
            }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            request.receiver_id,
            ActivityAction::RequestRejected,
            "request",
            request.request_id,
        ))
        .await;

        Ok(RequestOutcome::Rejected(request))
    }

    async fn validate_books(
        &self,
        book_ids: &[BookId],
        expected_owners: &HashSet<MemberId>,
        side: &str,
    ) -> ExchangeResult<()> {
        let books = self.books.get_many(book_ids).await?;

        if books.len() != book_ids.len() {
            let found: HashSet<BookId> = books.iter().map(|b| b.book_id).collect();
            let missing: Vec<String> = book_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(ExchangeError::Validation(format!(
                "unknown {} books: {}",
                side,
                missing.join(", ")
            )));
        }

        for book in &books {
            if !expected_owners.contains(&book.owner_id) {
                return Err(ExchangeError::Validation(format!(
                    "{} book {} is not owned by the expected member",
                    side, book.book_id
                )));
            }
            if !book.is_listed() {
                return Err(ExchangeError::Validation(format!(
                    "{} book {} is not available",
                    side, book.book_id
                )));
            }
        }

        Ok(())
    }

    /// Undo partially-taken locks after a lost race
    async fn release_books(&self, book_ids: &[BookId]) {
        for book_id in book_ids {
            match self
                .books
                .transition_status(*book_id, BookStatus::Exchanging, BookStatus::Available)
                .await
            {
                Ok(_) => {}
                Err(e) => warn!(book = %book_id, error = %e, "Failed to release book lock"),
            }
        }
    }

    async fn resolve(&self, user_id: UserId) -> ExchangeResult<MemberIdentity> {
        self.identity.resolve(user_id).await.map_err(|e| match e {
            InventoryError::UserNotFound(user) => ExchangeError::MemberNotFound(user),
            other => ExchangeError::Inventory(other),
        })
    }

    async fn notify(
        &self,
        recipient: MemberId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) {
        if let Err(e) = self.notifications.create(recipient, kind, payload).await {
            warn!(error = %e, ?kind, "Notification delivery failed");
        }
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!(error = %e, "Activity log write failed");
        }
    }
}
