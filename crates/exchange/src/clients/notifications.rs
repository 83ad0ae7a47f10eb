//! Notification client
//!
//! Delivery is owned by an external service; this trait is the narrow
//! fire-and-forget interface the state machines call. Callers must catch
//! and log failures locally: a notification error never rolls back or
//! blocks the transition it accompanies.

use crate::error::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use common::MemberId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Notification types emitted by the exchange lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ExchangeAccepted,
    ExchangeRejected,
    ExchangeCancelled,
    ExchangeCompleted,
    ExchangeConfirmationPending,
    MeetingScheduled,
    MeetingConfirmed,
    MeetingConfirmationPending,
}

/// One notification to deliver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: MemberId,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

/// Notification delivery interface
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Deliver one notification
    async fn create(
        &self,
        recipient: MemberId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> ExchangeResult<()>;

    /// Deliver several notifications at once
    async fn create_batch(&self, notifications: Vec<Notification>) -> ExchangeResult<()>;
}

/// Mock notification client for testing and development
///
/// Records every delivery; can be armed to fail so tests can verify that
/// notification errors never disturb the primary transition.
#[derive(Default)]
pub struct MockNotificationClient {
    sent: RwLock<Vec<Notification>>,
    fail: AtomicBool,
}

impl MockNotificationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail from now on
    pub fn with_failures(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// Everything delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap().clone()
    }

    /// Number of deliveries of one kind
    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent.read().unwrap().iter().filter(|n| n.kind == kind).count()
    }

    /// Kinds delivered to one recipient
    pub fn kinds_for(&self, recipient: MemberId) -> Vec<NotificationKind> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient)
            .map(|n| n.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationClient for MockNotificationClient {
    async fn create(
        &self,
        recipient: MemberId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> ExchangeResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExchangeError::Storage("notification delivery failed".to_string()));
        }
        self.sent.write().unwrap().push(Notification {
            recipient,
            kind,
            payload,
        });
        Ok(())
    }

    async fn create_batch(&self, notifications: Vec<Notification>) -> ExchangeResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExchangeError::Storage("notification delivery failed".to_string()));
        }
        self.sent.write().unwrap().extend(notifications);
        Ok(())
    }
}
