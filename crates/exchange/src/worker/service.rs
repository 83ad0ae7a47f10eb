//! Expiration sweeper
//!
//! Two periodic sweeps keep books from being locked forever: pending
//! requests past their horizon are cancelled hourly, and pending
//! exchanges past theirs are expired every few hours with a symmetric
//! trust penalty. Every row is claimed with a conditional status update
//! first, so sweeps are idempotent and safe to run concurrently with
//! user-driven transitions and with other sweeper instances.

use crate::clients::activity::{ActivityAction, ActivityLogClient, ActivityRecord};
use crate::clients::notifications::{Notification, NotificationClient, NotificationKind};
use crate::error::ExchangeResult;
use crate::store::traits::{ExchangeStore, RequestStore};
use crate::types::{
    CancelReason, CancellationInfo, Exchange, ExchangeStatus, RequestStatus,
};
use chrono::Utc;
use common::BookId;
use config::{SweeperConfig, TrustConfig};
use inventory::{BookStatus, BookStore, MemberStore};
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Background worker that expires stale requests and exchanges
pub struct ExpirySweeper {
    requests: Arc<dyn RequestStore>,
    exchanges: Arc<dyn ExchangeStore>,
    members: Arc<dyn MemberStore>,
    books: Arc<dyn BookStore>,
    notifications: Arc<dyn NotificationClient>,
    activity: Arc<dyn ActivityLogClient>,
    trust: TrustConfig,
    config: SweeperConfig,
}

impl ExpirySweeper {
    /// Create a new ExpirySweeper
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn RequestStore>,
        exchanges: Arc<dyn ExchangeStore>,
        members: Arc<dyn MemberStore>,
        books: Arc<dyn BookStore>,
        notifications: Arc<dyn NotificationClient>,
        activity: Arc<dyn ActivityLogClient>,
        trust: TrustConfig,
        config: SweeperConfig,
    ) -> Self {
        Self {
            requests,
            exchanges,
            members,
            books,
            notifications,
            activity,
            trust,
            config,
        }
    }

    /// Run the sweeper. Blocks until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            request_interval = self.config.request_sweep_interval_secs,
            exchange_interval = self.config.exchange_sweep_interval_secs,
            run_on_startup = self.config.run_on_startup,
            "Starting ExpirySweeper"
        );

        if self.config.run_on_startup {
            if let Err(e) = self.sweep_requests().await {
                error!("Initial request sweep failed: {}", e);
            }
            if let Err(e) = self.sweep_exchanges().await {
                error!("Initial exchange sweep failed: {}", e);
            }
        }

        let mut request_timer =
            tokio::time::interval(Duration::from_secs(self.config.request_sweep_interval_secs));
        let mut exchange_timer =
            tokio::time::interval(Duration::from_secs(self.config.exchange_sweep_interval_secs));
        // Skip the immediate first ticks (already ran on startup if configured)
        request_timer.tick().await;
        exchange_timer.tick().await;

        loop {
            tokio::select! {
                _ = request_timer.tick() => {
                    if let Err(e) = self.sweep_requests().await {
                        error!("Request sweep failed: {}", e);
                    }
                }
                _ = exchange_timer.tick() => {
                    if let Err(e) = self.sweep_exchanges().await {
                        error!("Exchange sweep failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("ExpirySweeper shutting down.");
                        return;
                    }
                }
            }
        }
    }

    /// Cancel every pending request past its expiry horizon
    ///
    /// Books were never locked by a pending request, so no book rows are
    /// touched. Returns how many rows this run actually cancelled.
    pub async fn sweep_requests(&self) -> ExchangeResult<usize> {
        let now = Utc::now();
        let expired = self.requests.list_expired_pending(now).await?;
        let mut cancelled = 0;

        for request in expired {
            // The receiver may be responding this instant; losing the CAS
            // means the row is no longer ours to expire
            if !self
                .requests
                .transition_status(
                    request.request_id,
                    RequestStatus::Pending,
                    RequestStatus::Cancelled,
                )
                .await?
            {
                debug!(request = %request.request_id, "Request resolved before the sweep claimed it");
                continue;
            }

            cancelled += 1;
            counter!("requests_expired_total").increment(1);
            self.log_activity(ActivityRecord::new(
                request.requester_id,
                ActivityAction::RequestExpired,
                "request",
                request.request_id,
            ))
            .await;
        }

        if cancelled > 0 {
            info!(cancelled, "Request sweep expired stale requests");
        }
        Ok(cancelled)
    }

    /// Expire every pending exchange past its horizon
    ///
    /// Unlike explicit cancellation, expiry is a shared failure: both
    /// participants take the symmetric trust penalty. Returns how many
    /// rows this run actually expired.
    pub async fn sweep_exchanges(&self) -> ExchangeResult<usize> {
        let now = Utc::now();
        let expired = self.exchanges.list_expired_pending(now).await?;
        let mut cancelled = 0;

        for exchange in expired {
            let exchange_id = exchange.exchange_id;
            match self.expire_exchange(exchange).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {
                    debug!(exchange = %exchange_id, "Exchange moved on before the sweep claimed it");
                }
                Err(e) => {
                    error!(exchange = %exchange_id, error = %e, "Failed to expire exchange");
                }
            }
        }

        if cancelled > 0 {
            info!(cancelled, "Exchange sweep expired stale exchanges");
        }
        Ok(cancelled)
    }

    async fn expire_exchange(&self, mut exchange: Exchange) -> ExchangeResult<bool> {
        let exchange_id = exchange.exchange_id;

        // Claim the row; an already-cancelled (or completed) row is a no-op
        if !self
            .exchanges
            .transition_status(
                exchange_id,
                ExchangeStatus::Pending,
                ExchangeStatus::Cancelled,
            )
            .await?
        {
            return Ok(false);
        }

        exchange.cancellation = Some(CancellationInfo {
            reason: CancelReason::Expired,
            details: None,
            cancelled_by: None,
            cancelled_at: Utc::now(),
        });
        self.exchanges.update(&exchange).await?;

        self.release_books(&exchange.book_ids()).await;

        for member_id in [exchange.member_a, exchange.member_b] {
            if let Err(e) = self
                .members
                .adjust_trust(member_id, -self.trust.expiry_penalty)
                .await
            {
                warn!(member = %member_id, error = %e, "Failed to apply expiry penalty");
            }
        }

        counter!("exchanges_expired_total").increment(1);
        info!(
            exchange = %exchange_id,
            penalty = self.trust.expiry_penalty,
            "Exchange expired, both participants penalized"
        );

        let payload = json!({
            "exchange_id": exchange_id.to_string(),
            "reason": "Expired",
        });
        let batch = vec![
            Notification {
                recipient: exchange.member_a,
                kind: NotificationKind::ExchangeCancelled,
                payload: payload.clone(),
            },
            Notification {
                recipient: exchange.member_b,
                kind: NotificationKind::ExchangeCancelled,
                payload,
            },
        ];
        if let Err(e) = self.notifications.create_batch(batch).await {
            warn!(error = %e, "Expiry notification delivery failed");
        }
        self.log_activity(ActivityRecord::new(
            exchange.member_a,
            ActivityAction::ExchangeExpired,
            "exchange",
            exchange_id,
        ))
        .await;

        Ok(true)
    }

    async fn release_books(&self, book_ids: &[BookId]) {
        for book_id in book_ids {
            match self
                .books
                .transition_status(*book_id, BookStatus::Exchanging, BookStatus::Available)
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(book = %book_id, "Book was not locked at release time"),
                Err(e) => warn!(book = %book_id, error = %e, "Failed to release book"),
            }
        }
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!(error = %e, "Activity log write failed");
        }
    }
}
