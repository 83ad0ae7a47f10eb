//! Exchange state machine
//!
//! PENDING → MEETING_SCHEDULED → IN_PROGRESS → COMPLETED, with CANCELLED
//! reachable from every non-terminal state. Completion confirmation is
//! independent of the meeting flow and may short-circuit it: both sides
//! confirming from PENDING completes the exchange directly.

use crate::clients::activity::{ActivityAction, ActivityLogClient, ActivityRecord};
use crate::clients::notifications::{Notification, NotificationClient, NotificationKind};
use crate::error::{ExchangeError, ExchangeResult};
use crate::store::traits::ExchangeStore;
use crate::types::{
    CancelReason, CancellationInfo, Exchange, ExchangeRole, ExchangeStatus, MeetingInfo,
};
use chrono::{DateTime, Utc};
use common::{ExchangeId, MemberId, Page, PageRequest, UserId};
use config::{LifecycleConfig, TrustConfig};
use inventory::{
    BookStatus, BookStore, IdentityResolver, InventoryError, MemberIdentity, MemberStore,
};
use metrics::counter;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Meeting fields as provided by a participant
#[derive(Debug, Clone)]
pub struct MeetingDetails {
    pub location: String,
    pub time: DateTime<Utc>,
    pub notes: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Exchange manager - drives the exchange state machine
pub struct ExchangeManager {
    exchanges: Arc<dyn ExchangeStore>,
    members: Arc<dyn MemberStore>,
    books: Arc<dyn BookStore>,
    identity: IdentityResolver,
    notifications: Arc<dyn NotificationClient>,
    activity: Arc<dyn ActivityLogClient>,
    trust: TrustConfig,
    lifecycle: LifecycleConfig,
}

impl ExchangeManager {
    /// Create a new ExchangeManager
    #[allow(clippy::too_many_arguments)]
    pub fn new(
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

    /// Propose a meeting; only while PENDING, proposer's side auto-confirms
    ///
    /// Does not change the exchange status; that happens when the other
    /// side confirms.
    pub async fn schedule_meeting(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
        details: MeetingDetails,
    ) -> ExchangeResult<Exchange> {
        let (_, mut exchange, role) = self.load(user_id, exchange_id).await?;

        if exchange.status != ExchangeStatus::Pending {
            return Err(ExchangeError::InvalidState(format!(
                "meetings are proposed while pending, exchange is {}",
                exchange.status
            )));
        }
        if exchange.meeting.is_some() {
            return Err(ExchangeError::InvalidState(
                "a meeting is already scheduled; update it instead".to_string(),
            ));
        }
        if details.time <= Utc::now() {
            return Err(ExchangeError::MeetingTimeInPast);
        }

        let proposer = exchange.member(role);
        exchange.meeting = Some(MeetingInfo {
            location: details.location,
            time: details.time,
            notes: details.notes,
            latitude: details.latitude,
            longitude: details.longitude,
            scheduled_by: proposer,
            confirmed_by_a: role == ExchangeRole::SideA,
            confirmed_by_b: role == ExchangeRole::SideB,
        });
        self.exchanges.update(&exchange).await?;

        info!(exchange = %exchange_id, proposer = %proposer, "Meeting proposed");
        self.notify(
            exchange.member(role.other()),
            NotificationKind::MeetingScheduled,
            json!({ "exchange_id": exchange_id.to_string() }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            proposer,
            ActivityAction::MeetingScheduled,
            "exchange",
            exchange_id,
        ))
        .await;

        Ok(exchange)
    }

    /// Confirm the proposed meeting; both confirmations move the exchange
    /// to MEETING_SCHEDULED
    pub async fn confirm_meeting(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
    ) -> ExchangeResult<Exchange> {
        let (_, exchange, role) = self.load(user_id, exchange_id).await?;

        let meeting = exchange.meeting.as_ref().ok_or(ExchangeError::MeetingNotSet)?;
        if meeting.confirmed(role) {
            return Err(ExchangeError::AlreadyConfirmed);
        }

        let updated = self.exchanges.set_meeting_confirmed(exchange_id, role).await?;
        let both = updated
            .meeting
            .as_ref()
            .map(|m| m.both_confirmed())
            .unwrap_or(false);

        if both {
            if !self
                .exchanges
                .transition_status(
                    exchange_id,
                    ExchangeStatus::Pending,
                    ExchangeStatus::MeetingScheduled,
                )
                .await?
            {
                return Err(ExchangeError::Conflict(
                    "exchange changed state during meeting confirmation".to_string(),
                ));
            }

            info!(exchange = %exchange_id, "Meeting confirmed by both sides");
            self.notify_both(
                &updated,
                NotificationKind::MeetingConfirmed,
                json!({ "exchange_id": exchange_id.to_string() }),
            )
            .await;
        } else {
            self.notify(
                updated.member(role.other()),
                NotificationKind::MeetingConfirmationPending,
                json!({ "exchange_id": exchange_id.to_string() }),
            )
            .await;
        }

        self.log_activity(ActivityRecord::new(
            updated.member(role),
            ActivityAction::MeetingConfirmed,
            "exchange",
            exchange_id,
        ))
        .await;

        self.exchanges
            .get(exchange_id)
            .await?
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))
    }

    /// Edit the meeting; resets confirmation to the editor only and, if
    /// the meeting was already locked in, reverts to PENDING
    pub async fn update_meeting(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
        details: MeetingDetails,
    ) -> ExchangeResult<Exchange> {
        let (_, mut exchange, role) = self.load(user_id, exchange_id).await?;

        if !matches!(
            exchange.status,
            ExchangeStatus::Pending | ExchangeStatus::MeetingScheduled
        ) {
            return Err(ExchangeError::InvalidState(format!(
                "meeting can no longer be edited, exchange is {}",
                exchange.status
            )));
        }
        if exchange.meeting.is_none() {
            return Err(ExchangeError::MeetingNotSet);
        }
        if details.time <= Utc::now() {
            return Err(ExchangeError::MeetingTimeInPast);
        }

        // Changed place or time needs the other side's agreement again
        if exchange.status == ExchangeStatus::MeetingScheduled
            && !self
                .exchanges
                .transition_status(
                    exchange_id,
                    ExchangeStatus::MeetingScheduled,
                    ExchangeStatus::Pending,
                )
                .await?
        {
            return Err(ExchangeError::Conflict(
                "exchange changed state during meeting update".to_string(),
            ));
        }

        let editor = exchange.member(role);
        exchange.meeting = Some(MeetingInfo {
            location: details.location,
            time: details.time,
            notes: details.notes,
            latitude: details.latitude,
            longitude: details.longitude,
            scheduled_by: editor,
            confirmed_by_a: role == ExchangeRole::SideA,
            confirmed_by_b: role == ExchangeRole::SideB,
        });
        self.exchanges.update(&exchange).await?;

        info!(exchange = %exchange_id, editor = %editor, "Meeting updated, re-confirmation required");
        self.notify(
            exchange.member(role.other()),
            NotificationKind::MeetingScheduled,
            json!({ "exchange_id": exchange_id.to_string(), "updated": true }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            editor,
            ActivityAction::MeetingUpdated,
            "exchange",
            exchange_id,
        ))
        .await;

        self.exchanges
            .get(exchange_id)
            .await?
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))
    }

    /// Mark the handover as underway; any participant, from MEETING_SCHEDULED only
    pub async fn start_exchange(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
    ) -> ExchangeResult<Exchange> {
        let (_, exchange, role) = self.load(user_id, exchange_id).await?;

        if exchange.status != ExchangeStatus::MeetingScheduled {
            return Err(ExchangeError::InvalidState(format!(
                "exchange can only start from a scheduled meeting, it is {}",
                exchange.status
            )));
        }

        if !self
            .exchanges
            .transition_status(
                exchange_id,
                ExchangeStatus::MeetingScheduled,
                ExchangeStatus::InProgress,
            )
            .await?
        {
            return Err(ExchangeError::Conflict(
                "exchange changed state before starting".to_string(),
            ));
        }

        info!(exchange = %exchange_id, "Exchange in progress");
        self.log_activity(ActivityRecord::new(
            exchange.member(role),
            ActivityAction::ExchangeStarted,
            "exchange",
            exchange_id,
        ))
        .await;

        self.exchanges
            .get(exchange_id)
            .await?
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))
    }

    /// Confirm completion for the caller's side
    ///
    /// Allowed from PENDING, MEETING_SCHEDULED, or IN_PROGRESS, so mutual
    /// confirmation can short-circuit the meeting flow. When both sides
    /// have confirmed, ownership transfers, counters and trust rewards
    /// apply, and the exchange completes.
    pub async fn confirm_exchange(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
    ) -> ExchangeResult<Exchange> {
        let (_, exchange, role) = self.load(user_id, exchange_id).await?;

        if !exchange.can_confirm() {
            return Err(ExchangeError::InvalidState(format!(
                "exchange is {}",
                exchange.status
            )));
        }
        if exchange.confirmed(role) {
            return Err(ExchangeError::AlreadyConfirmed);
        }

        let updated = self.exchanges.set_confirmed(exchange_id, role).await?;

        self.log_activity(ActivityRecord::new(
            updated.member(role),
            ActivityAction::ExchangeConfirmed,
            "exchange",
            exchange_id,
        ))
        .await;

        if updated.both_confirmed() {
            self.complete(updated).await
        } else {
            self.notify(
                updated.member(role.other()),
                NotificationKind::ExchangeConfirmationPending,
                json!({ "exchange_id": exchange_id.to_string() }),
            )
            .await;
            Ok(updated)
        }
    }

    /// Cancel the exchange; participant only, never after completion
    ///
    /// Books go back to AVAILABLE and the penalty lands on the cancelling
    /// side only, scaled by reason.
    pub async fn cancel_exchange(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
        reason: CancelReason,
        details: Option<String>,
    ) -> ExchangeResult<Exchange> {
        let (_, mut exchange, role) = self.load(user_id, exchange_id).await?;

        if !exchange.can_cancel() {
            return Err(ExchangeError::InvalidState(format!(
                "exchange is already {}",
                exchange.status
            )));
        }
        if reason == CancelReason::Expired {
            return Err(ExchangeError::Validation(
                "the expired reason is reserved for the scheduler".to_string(),
            ));
        }

        if !self
            .exchanges
            .transition_status(exchange_id, exchange.status, ExchangeStatus::Cancelled)
            .await?
        {
            return Err(ExchangeError::Conflict(
                "exchange changed state during cancellation".to_string(),
            ));
        }

        let canceller = exchange.member(role);
        exchange.cancellation = Some(CancellationInfo {
            reason,
            details,
            cancelled_by: Some(canceller),
            cancelled_at: Utc::now(),
        });
        self.exchanges.update(&exchange).await?;
        exchange.status = ExchangeStatus::Cancelled;

        self.release_books(&exchange).await;

        self.members.record_cancellation(canceller).await?;
        let penalty = reason.penalty(&self.trust);
        if penalty != 0.0 {
            self.members.adjust_trust(canceller, -penalty).await?;
        }

        counter!("exchanges_cancelled_total").increment(1);
        info!(
            exchange = %exchange_id,
            canceller = %canceller,
            ?reason,
            penalty,
            "Exchange cancelled"
        );

        self.notify(
            exchange.member(role.other()),
            NotificationKind::ExchangeCancelled,
            json!({
                "exchange_id": exchange_id.to_string(),
                "reason": format!("{:?}", reason),
            }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            canceller,
            ActivityAction::ExchangeCancelled,
            "exchange",
            exchange_id,
        ))
        .await;

        Ok(exchange)
    }

    /// Get an exchange; participants only
    pub async fn get_exchange(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
    ) -> ExchangeResult<Exchange> {
        let (_, exchange, _) = self.load(user_id, exchange_id).await?;
        Ok(exchange)
    }

    /// The caller's exchanges, optionally filtered by status, newest first
    pub async fn list_my_exchanges(
        &self,
        user_id: UserId,
        status: Option<ExchangeStatus>,
        limit: u32,
        offset: u32,
    ) -> ExchangeResult<Page<Exchange>> {
        let identity = self.resolve(user_id).await?;
        let page = PageRequest::clamped(limit, offset, self.lifecycle.max_page_size);

        let statuses = status.map(|s| vec![s]);
        let mut result = Vec::new();
        let mut seen: HashSet<ExchangeId> = HashSet::new();
        for member_id in &identity.member_ids {
            for exchange in self
                .exchanges
                .list_involving(*member_id, statuses.clone())
                .await?
            {
                if seen.insert(exchange.exchange_id) {
                    result.push(exchange);
                }
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Page::from_full(result, page))
    }

    /// A member's completed trades; public, no participant check
    pub async fn completed_history(&self, member_id: MemberId) -> ExchangeResult<Vec<Exchange>> {
        self.exchanges
            .list_involving(member_id, Some(vec![ExchangeStatus::Completed]))
            .await
    }

    /// Finish a mutually-confirmed exchange
    async fn complete(&self, mut exchange: Exchange) -> ExchangeResult<Exchange> {
        let exchange_id = exchange.exchange_id;

        if !self
            .exchanges
            .transition_status(exchange_id, exchange.status, ExchangeStatus::Completed)
            .await?
        {
            // The concurrent confirmer may have finished it already
            let current = self
                .exchanges
                .get(exchange_id)
                .await?
                .ok_or(ExchangeError::ExchangeNotFound(exchange_id))?;
            if current.status == ExchangeStatus::Completed {
                debug!(exchange = %exchange_id, "Completion already applied by the other side");
                return Ok(current);
            }
            return Err(ExchangeError::Conflict(
                "exchange changed state during completion".to_string(),
            ));
        }

        exchange.completed_at = Some(Utc::now());
        self.exchanges.update(&exchange).await?;
        exchange.status = ExchangeStatus::Completed;

        // Ownership transfer per recorded direction; books come back
        // listed under their new owner
        for book in &exchange.books {
            self.books.transfer_owner(book.book_id, book.to_member).await?;
        }

        for member_id in [exchange.member_a, exchange.member_b] {
            self.members.record_completion(member_id).await?;
            self.members
                .adjust_trust(member_id, self.trust.completion_reward)
                .await?;
        }

        counter!("exchanges_completed_total").increment(1);
        info!(
            exchange = %exchange_id,
            books = exchange.books.len(),
            reward = self.trust.completion_reward,
            "Exchange completed"
        );

        self.notify_both(
            &exchange,
            NotificationKind::ExchangeCompleted,
            json!({ "exchange_id": exchange_id.to_string() }),
        )
        .await;
        self.log_activity(ActivityRecord::new(
            exchange.member_a,
            ActivityAction::ExchangeCompleted,
            "exchange",
            exchange_id,
        ))
        .await;

        Ok(exchange)
    }

    /// Release tied books after cancellation; a lost CAS here just means
    /// the book already moved on
    async fn release_books(&self, exchange: &Exchange) {
        for book_id in exchange.book_ids() {
            match self
                .books
                .transition_status(book_id, BookStatus::Exchanging, BookStatus::Available)
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(book = %book_id, "Book was not locked at release time"),
                Err(e) => warn!(book = %book_id, error = %e, "Failed to release book"),
            }
        }
    }

    async fn load(
        &self,
        user_id: UserId,
        exchange_id: ExchangeId,
    ) -> ExchangeResult<(MemberIdentity, Exchange, ExchangeRole)> {
        let identity = self.resolve(user_id).await?;
        let exchange = self
            .exchanges
            .get(exchange_id)
            .await?
            .ok_or(ExchangeError::ExchangeNotFound(exchange_id))?;

        let role = exchange
            .role_of(&identity.member_ids)
            .ok_or_else(|| {
                ExchangeError::Forbidden("not a participant of this exchange".to_string())
            })?;

        Ok((identity, exchange, role))
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

    async fn notify_both(
        &self,
        exchange: &Exchange,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) {
        let batch = vec![
            Notification {
                recipient: exchange.member_a,
                kind,
                payload: payload.clone(),
            },
            Notification {
                recipient: exchange.member_b,
                kind,
                payload,
            },
        ];
        if let Err(e) = self.notifications.create_batch(batch).await {
            warn!(error = %e, ?kind, "Batch notification delivery failed");
        }
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!(error = %e, "Activity log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::activity::MockActivityLogClient;
    use crate::clients::notifications::MockNotificationClient;
    use crate::store::memory::InMemoryExchangeStore;
    use crate::types::ExchangeBook;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use common::RequestId;
    use inventory::{Book, BookCondition, InMemoryInventory, Member};

    struct Setup {
        member_a: Member,
        member_b: Member,
        book_a: Book,
        book_b: Book,
        exchange: Exchange,
    }

    struct Fixture {
        inventory: Arc<InMemoryInventory>,
        exchanges: Arc<InMemoryExchangeStore>,
        notifications: Arc<MockNotificationClient>,
        activity: Arc<MockActivityLogClient>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                inventory: Arc::new(InMemoryInventory::new()),
                exchanges: Arc::new(InMemoryExchangeStore::new()),
                notifications: Arc::new(MockNotificationClient::new()),
                activity: Arc::new(MockActivityLogClient::new()),
            }
        }

        fn manager(&self) -> ExchangeManager {
            ExchangeManager::new(
                self.exchanges.clone(),
                self.inventory.clone(),
                self.inventory.clone(),
                self.notifications.clone(),
                self.activity.clone(),
                TrustConfig::default(),
                LifecycleConfig::default(),
            )
        }

        async fn member(&self) -> Member {
            let member = Member::new(UserId::new(), "reader", "london");
            MemberStore::upsert(self.inventory.as_ref(), member.clone())
                .await
                .unwrap();
            member
        }

        /// An accepted exchange with one locked book on each side
        async fn accepted_exchange(&self) -> Setup {
            let member_a = self.member().await;
            let member_b = self.member().await;

            let mut book_a = Book::new(
                member_a.member_id,
                "Neuromancer",
                "William Gibson",
                BookCondition::Good,
            );
            book_a.status = BookStatus::Exchanging;
            let mut book_b = Book::new(
                member_b.member_id,
                "Dune",
                "Frank Herbert",
                BookCondition::Good,
            );
            book_b.status = BookStatus::Exchanging;
            BookStore::upsert(self.inventory.as_ref(), book_a.clone())
                .await
                .unwrap();
            BookStore::upsert(self.inventory.as_ref(), book_b.clone())
                .await
                .unwrap();

            let exchange = Exchange::new(
                RequestId::new(),
                member_a.member_id,
                member_b.member_id,
                vec![
                    ExchangeBook {
                        book_id: book_a.book_id,
                        from_member: member_a.member_id,
                        to_member: member_b.member_id,
                    },
                    ExchangeBook {
                        book_id: book_b.book_id,
                        from_member: member_b.member_id,
                        to_member: member_a.member_id,
                    },
                ],
                Utc::now() + Duration::days(30),
            );
            let exchange = self.exchanges.create(exchange).await.unwrap();

            Setup {
                member_a,
                member_b,
                book_a,
                book_b,
                exchange,
            }
        }

        async fn trust_of(&self, member_id: MemberId) -> f64 {
            MemberStore::get(self.inventory.as_ref(), member_id)
                .await
                .unwrap()
                .unwrap()
                .trust_score
        }

        async fn member_row(&self, member_id: MemberId) -> Member {
            MemberStore::get(self.inventory.as_ref(), member_id)
                .await
                .unwrap()
                .unwrap()
        }

        async fn book_row(&self, book_id: common::BookId) -> Book {
            BookStore::get(self.inventory.as_ref(), book_id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    fn meeting_in(hours: i64) -> MeetingDetails {
        MeetingDetails {
            location: "Library café".to_string(),
            time: Utc::now() + Duration::hours(hours),
            notes: None,
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_meeting_auto_confirms_proposer() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        let exchange = manager
            .schedule_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(24))
            .await
            .unwrap();

        let meeting = exchange.meeting.unwrap();
        assert!(meeting.confirmed_by_a);
        assert!(!meeting.confirmed_by_b);
        assert_eq!(meeting.scheduled_by, setup.member_a.member_id);
        assert_eq!(exchange.status, ExchangeStatus::Pending);

        assert_eq!(
            fixture.notifications.kinds_for(setup.member_b.member_id),
            vec![NotificationKind::MeetingScheduled]
        );
    }

    #[tokio::test]
    async fn test_meeting_time_must_be_future() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        let result = fixture
            .manager()
            .schedule_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(-2))
            .await;
        assert_matches!(result, Err(ExchangeError::MeetingTimeInPast));
    }

    #[tokio::test]
    async fn test_non_participant_is_forbidden() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let outsider = fixture.member().await;

        let result = fixture
            .manager()
            .schedule_meeting(outsider.user_id, setup.exchange.exchange_id, meeting_in(24))
            .await;
        assert_matches!(result, Err(ExchangeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_both_meeting_confirmations_schedule_the_exchange() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .schedule_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(24))
            .await
            .unwrap();

        // Other side confirms; proposer was auto-confirmed
        let exchange = manager
            .confirm_meeting(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        assert_eq!(exchange.status, ExchangeStatus::MeetingScheduled);
        assert_eq!(
            fixture.notifications.count_of(NotificationKind::MeetingConfirmed),
            2
        );
    }

    #[tokio::test]
    async fn test_confirm_meeting_without_meeting_fails() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        let result = fixture
            .manager()
            .confirm_meeting(setup.member_b.user_id, setup.exchange.exchange_id)
            .await;
        assert_matches!(result, Err(ExchangeError::MeetingNotSet));
    }

    #[tokio::test]
    async fn test_update_meeting_reverts_schedule_and_confirmations() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .schedule_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(24))
            .await
            .unwrap();
        manager
            .confirm_meeting(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        // Side A edits the location; side B must re-confirm
        let exchange = manager
            .update_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(48))
            .await
            .unwrap();

        assert_eq!(exchange.status, ExchangeStatus::Pending);
        let meeting = exchange.meeting.unwrap();
        assert!(meeting.confirmed_by_a);
        assert!(!meeting.confirmed_by_b);
    }

    #[tokio::test]
    async fn test_start_requires_scheduled_meeting() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        let early = manager
            .start_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await;
        assert_matches!(early, Err(ExchangeError::InvalidState(_)));

        manager
            .schedule_meeting(setup.member_a.user_id, setup.exchange.exchange_id, meeting_in(24))
            .await
            .unwrap();
        manager
            .confirm_meeting(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        let started = manager
            .start_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        assert_eq!(started.status, ExchangeStatus::InProgress);
    }

    #[tokio::test]
    async fn test_same_side_cannot_confirm_twice() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        let trust_after_first = fixture.trust_of(setup.member_a.member_id).await;

        let second = manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await;
        assert_matches!(second, Err(ExchangeError::AlreadyConfirmed));

        // Nothing was re-applied
        let row = fixture.member_row(setup.member_a.member_id).await;
        assert_eq!(row.completed_exchanges, 0);
        assert_eq!(row.trust_score, trust_after_first);
    }

    #[tokio::test]
    async fn test_dual_confirmation_completes_and_transfers_ownership() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        let exchange = manager
            .confirm_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        assert_eq!(exchange.status, ExchangeStatus::Completed);
        assert!(exchange.completed_at.is_some());

        // Ownership swapped, both books listed again
        let book_a = fixture.book_row(setup.book_a.book_id).await;
        assert_eq!(book_a.owner_id, setup.member_b.member_id);
        assert_eq!(book_a.status, BookStatus::Available);
        let book_b = fixture.book_row(setup.book_b.book_id).await;
        assert_eq!(book_b.owner_id, setup.member_a.member_id);
        assert_eq!(book_b.status, BookStatus::Available);

        // Symmetric counters and reward (base trust is 50.0)
        for member_id in [setup.member_a.member_id, setup.member_b.member_id] {
            let row = fixture.member_row(member_id).await;
            assert_eq!(row.completed_exchanges, 1);
            assert_eq!(row.trust_score, 52.0);
        }

        assert_eq!(
            fixture.notifications.count_of(NotificationKind::ExchangeCompleted),
            2
        );
    }

    #[tokio::test]
    async fn test_completion_clears_soft_deleted_books() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        // Owner soft-deleted the listing while the exchange was running
        let mut book = setup.book_a.clone();
        book.deleted = true;
        BookStore::upsert(fixture.inventory.as_ref(), book).await.unwrap();

        let manager = fixture.manager();
        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        manager
            .confirm_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        let book = fixture.book_row(setup.book_a.book_id).await;
        assert!(!book.deleted);
        assert_eq!(book.owner_id, setup.member_b.member_id);
    }

    #[tokio::test]
    async fn test_cancel_penalizes_only_the_canceller() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        let exchange = fixture
            .manager()
            .cancel_exchange(
                setup.member_a.user_id,
                setup.exchange.exchange_id,
                CancelReason::UserCancelled,
                Some("plans changed".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(exchange.status, ExchangeStatus::Cancelled);
        let cancellation = exchange.cancellation.unwrap();
        assert_eq!(cancellation.cancelled_by, Some(setup.member_a.member_id));

        // Canceller pays, counterpart untouched
        let canceller = fixture.member_row(setup.member_a.member_id).await;
        assert_eq!(canceller.trust_score, 48.0);
        assert_eq!(canceller.cancelled_exchanges, 1);
        let other = fixture.member_row(setup.member_b.member_id).await;
        assert_eq!(other.trust_score, 50.0);
        assert_eq!(other.cancelled_exchanges, 0);

        // Books released, owners unchanged
        let book_a = fixture.book_row(setup.book_a.book_id).await;
        assert_eq!(book_a.status, BookStatus::Available);
        assert_eq!(book_a.owner_id, setup.member_a.member_id);

        assert_eq!(
            fixture.notifications.kinds_for(setup.member_b.member_id),
            vec![NotificationKind::ExchangeCancelled]
        );
    }

    #[tokio::test]
    async fn test_no_show_and_administrative_penalties() {
        let fixture = Fixture::new();
        let no_show = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .cancel_exchange(
                no_show.member_b.user_id,
                no_show.exchange.exchange_id,
                CancelReason::NoShow,
                None,
            )
            .await
            .unwrap();
        assert_eq!(fixture.trust_of(no_show.member_b.member_id).await, 45.0);

        let admin = fixture.accepted_exchange().await;
        manager
            .cancel_exchange(
                admin.member_a.user_id,
                admin.exchange.exchange_id,
                CancelReason::Administrative,
                None,
            )
            .await
            .unwrap();
        assert_eq!(fixture.trust_of(admin.member_a.member_id).await, 50.0);
    }

    #[tokio::test]
    async fn test_cancel_rejects_reserved_reason_and_completed_exchange() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        let reserved = manager
            .cancel_exchange(
                setup.member_a.user_id,
                setup.exchange.exchange_id,
                CancelReason::Expired,
                None,
            )
            .await;
        assert_matches!(reserved, Err(ExchangeError::Validation(_)));

        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        manager
            .confirm_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        let after_completion = manager
            .cancel_exchange(
                setup.member_a.user_id,
                setup.exchange.exchange_id,
                CancelReason::UserCancelled,
                None,
            )
            .await;
        assert_matches!(after_completion, Err(ExchangeError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_confirmation_pending_notifies_other_side() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        fixture
            .manager()
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        assert_eq!(
            fixture.notifications.kinds_for(setup.member_b.member_id),
            vec![NotificationKind::ExchangeConfirmationPending]
        );
    }

    #[tokio::test]
    async fn test_notification_failure_never_blocks_completion() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;

        let manager = ExchangeManager::new(
            fixture.exchanges.clone(),
            fixture.inventory.clone(),
            fixture.inventory.clone(),
            Arc::new(MockNotificationClient::new().with_failures()),
            Arc::new(MockActivityLogClient::new().with_failures()),
            TrustConfig::default(),
            LifecycleConfig::default(),
        );

        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        let exchange = manager
            .confirm_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        assert_eq!(exchange.status, ExchangeStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_my_exchanges_filters_and_paginates() {
        let fixture = Fixture::new();
        let setup = fixture.accepted_exchange().await;
        let manager = fixture.manager();

        manager
            .confirm_exchange(setup.member_a.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();
        manager
            .confirm_exchange(setup.member_b.user_id, setup.exchange.exchange_id)
            .await
            .unwrap();

        let completed = manager
            .list_my_exchanges(
                setup.member_a.user_id,
                Some(ExchangeStatus::Completed),
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(completed.items.len(), 1);
        assert_eq!(completed.total, 1);

        let cancelled = manager
            .list_my_exchanges(
                setup.member_a.user_id,
                Some(ExchangeStatus::Cancelled),
                10,
                0,
            )
            .await
            .unwrap();
        assert!(cancelled.items.is_empty());

        // Public history shows the completed trade
        let history = manager
            .completed_history(setup.member_b.member_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
