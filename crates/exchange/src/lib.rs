//! Exchange lifecycle for BookSwap
//!
//! This crate owns the two state machines at the heart of the platform:
//! the request negotiation (propose, accept, reject, cancel) and the
//! accepted exchange (meet, mutually confirm, complete or cancel), plus
//! the scheduled sweeps that expire whatever is left pending too long.
//!
//! # Features
//!
//! - Request validation, trust floor, contention guards
//! - Acceptance locks books via conditional status updates
//! - Meeting coordination with per-side confirmation
//! - Completion with ownership transfer and trust rewards
//! - Reason-tiered cancellation penalties
//! - Idempotent expiry sweeps

pub mod clients;
pub mod error;
pub mod exchanges;
pub mod requests;
pub mod store;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use error::{ExchangeError, ExchangeResult};
pub use exchanges::{ExchangeManager, MeetingDetails};
pub use requests::{RequestAction, RequestManager, RequestOutcome};
pub use types::{
    BookRole, CancelReason, CancellationInfo, Exchange, ExchangeBook, ExchangeRequest,
    ExchangeRole, ExchangeStatus, MeetingInfo, RequestBook, RequestStatus,
};
pub use worker::ExpirySweeper;

// Store exports
pub use store::memory::{InMemoryExchangeStore, InMemoryRequestStore};
pub use store::traits::{ExchangeStore, RequestStore};

// Client exports
pub use clients::activity::{
    ActivityAction, ActivityLogClient, ActivityRecord, MockActivityLogClient,
};
pub use clients::notifications::{
    MockNotificationClient, Notification, NotificationClient, NotificationKind,
};
