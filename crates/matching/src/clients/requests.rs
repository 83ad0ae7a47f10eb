//! Pending-request lookup client
//!
//! The matching engine must not suggest a counterpart the member already
//! shares a pending request with. That state is owned by the exchange
//! crate, so it is reached through this narrow client trait; the binary
//! wires an adapter over the real request store.

use crate::error::MatchingResult;
use async_trait::async_trait;
use common::MemberId;

/// Lookup for pending exchange requests between two members
#[async_trait]
pub trait PendingRequestGate: Send + Sync {
    /// Whether a pending request exists between the two members, in
    /// either direction
    async fn has_pending_between(&self, a: MemberId, b: MemberId) -> MatchingResult<bool>;
}

/// Mock gate for testing and development
#[derive(Default)]
pub struct MockPendingRequestGate {
    pairs: std::sync::RwLock<Vec<(MemberId, MemberId)>>,
}

impl MockPendingRequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the mock with a pending pair
    pub fn with_pending(self, a: MemberId, b: MemberId) -> Self {
        self.pairs.write().unwrap().push((a, b));
        self
    }
}

#[async_trait]
impl PendingRequestGate for MockPendingRequestGate {
    async fn has_pending_between(&self, a: MemberId, b: MemberId) -> MatchingResult<bool> {
        let pairs = self.pairs.read().unwrap();
        Ok(pairs
            .iter()
            .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a)))
    }
}
