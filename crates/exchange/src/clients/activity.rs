//! Activity log client
//!
//! Same fire-and-forget contract as notifications: persistence and format
//! are an external concern, and failures are caught at the call site.

use crate::error::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use common::MemberId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Auditable lifecycle actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    RequestCreated,
    RequestAccepted,
    RequestRejected,
    RequestCancelled,
    RequestExpired,
    MeetingScheduled,
    MeetingConfirmed,
    MeetingUpdated,
    ExchangeStarted,
    ExchangeConfirmed,
    ExchangeCompleted,
    ExchangeCancelled,
    ExchangeExpired,
}

/// One activity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub member_id: MemberId,
    pub action: ActivityAction,
    /// "request" or "exchange"
    pub entity_kind: String,
    pub entity_id: String,
    pub metadata: serde_json::Value,
}

impl ActivityRecord {
    pub fn new(
        member_id: MemberId,
        action: ActivityAction,
        entity_kind: impl Into<String>,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            member_id,
            action,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Activity log interface
#[async_trait]
pub trait ActivityLogClient: Send + Sync {
    /// Append one record
    async fn record(&self, record: ActivityRecord) -> ExchangeResult<()>;
}

/// Mock activity log for testing and development
#[derive(Default)]
pub struct MockActivityLogClient {
    records: RwLock<Vec<ActivityRecord>>,
    fail: AtomicBool,
}

impl MockActivityLogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail from now on
    pub fn with_failures(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// Everything recorded so far
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().unwrap().clone()
    }

    /// Number of records of one action
    pub fn count_of(&self, action: ActivityAction) -> usize {
        self.records
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.action == action)
            .count()
    }
}

#[async_trait]
impl ActivityLogClient for MockActivityLogClient {
    async fn record(&self, record: ActivityRecord) -> ExchangeResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExchangeError::Storage("activity log unavailable".to_string()));
        }
        self.records.write().unwrap().push(record);
        Ok(())
    }
}
