//! Exchange lifecycle domain types
//!
//! An [`ExchangeRequest`] is a proposal: requester offers some of their own
//! books and asks for some of the receiver's. Acceptance locks the tied
//! books and spawns an [`Exchange`], which tracks meeting coordination,
//! mutual confirmation, and completion or cancellation.

use chrono::{DateTime, Utc};
use common::{BookId, ExchangeId, MemberId, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status of an exchange request; terminal once non-pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Accepted => write!(f, "accepted"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Which side of a request a tied book belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookRole {
    /// The requester's book, offered to the receiver
    Offered,
    /// The receiver's book, asked for by the requester
    Requested,
}

/// A book tied to a request, tagged with its side
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RequestBook {
    pub book_id: BookId,
    pub role: BookRole,
}

/// A proposed trade between two members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub request_id: RequestId,
    pub requester_id: MemberId,
    pub receiver_id: MemberId,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub rejection_reason: Option<String>,
    pub books: Vec<RequestBook>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ExchangeRequest {
    /// Create a pending request
    pub fn new(
        requester_id: MemberId,
        receiver_id: MemberId,
        books: Vec<RequestBook>,
        message: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: RequestId::new(),
            requester_id,
            receiver_id,
            status: RequestStatus::Pending,
            message,
            rejection_reason: None,
            books,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// Ids of every book tied to the request, both sides
    pub fn book_ids(&self) -> Vec<BookId> {
        self.books.iter().map(|b| b.book_id).collect()
    }

    /// Ids of the requester's offered books
    pub fn offered_book_ids(&self) -> Vec<BookId> {
        self.books
            .iter()
            .filter(|b| b.role == BookRole::Offered)
            .map(|b| b.book_id)
            .collect()
    }

    /// Ids of the receiver's requested books
    pub fn requested_book_ids(&self) -> Vec<BookId> {
        self.books
            .iter()
            .filter(|b| b.role == BookRole::Requested)
            .map(|b| b.book_id)
            .collect()
    }

    /// Whether the request's expiry horizon has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Status of an accepted exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Accepted, waiting for meeting coordination
    Pending,
    /// Both sides confirmed the meeting
    MeetingScheduled,
    /// The handover is underway
    InProgress,
    /// Books transferred, trust rewarded
    Completed,
    /// Cancelled by a participant or expired by the sweeper
    Cancelled,
}

impl std::fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeStatus::Pending => write!(f, "pending"),
            ExchangeStatus::MeetingScheduled => write!(f, "meeting_scheduled"),
            ExchangeStatus::InProgress => write!(f, "in_progress"),
            ExchangeStatus::Completed => write!(f, "completed"),
            ExchangeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why an exchange was cancelled; scales the trust penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserCancelled,
    NoShow,
    /// Support/admin action, never penalized
    Administrative,
    /// Set by the expiry sweeper only
    Expired,
    Other,
}

impl CancelReason {
    /// Trust penalty for the cancelling side
    ///
    /// Expiry is handled by the sweeper with its own symmetric penalty and
    /// never reaches this path.
    pub fn penalty(&self, trust: &config::TrustConfig) -> f64 {
        match self {
            CancelReason::UserCancelled => trust.cancellation_penalties.user_cancelled,
            CancelReason::NoShow => trust.cancellation_penalties.no_show,
            CancelReason::Administrative => 0.0,
            CancelReason::Expired => trust.expiry_penalty,
            CancelReason::Other => trust.cancellation_penalties.other,
        }
    }
}

/// A participant's side of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeRole {
    /// The original requester
    SideA,
    /// The original receiver
    SideB,
}

impl ExchangeRole {
    pub fn other(&self) -> ExchangeRole {
        match self {
            ExchangeRole::SideA => ExchangeRole::SideB,
            ExchangeRole::SideB => ExchangeRole::SideA,
        }
    }
}

/// Proposed meeting details with per-side confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub location: String,
    pub time: DateTime<Utc>,
    pub notes: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Who proposed (or last edited) the meeting
    pub scheduled_by: MemberId,
    pub confirmed_by_a: bool,
    pub confirmed_by_b: bool,
}

impl MeetingInfo {
    /// Whether the given side has confirmed the meeting
    pub fn confirmed(&self, role: ExchangeRole) -> bool {
        match role {
            ExchangeRole::SideA => self.confirmed_by_a,
            ExchangeRole::SideB => self.confirmed_by_b,
        }
    }

    /// Mark one side's meeting confirmation
    pub fn set_confirmed(&mut self, role: ExchangeRole) {
        match role {
            ExchangeRole::SideA => self.confirmed_by_a = true,
            ExchangeRole::SideB => self.confirmed_by_b = true,
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.confirmed_by_a && self.confirmed_by_b
    }
}

/// How and by whom an exchange was cancelled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub reason: CancelReason,
    pub details: Option<String>,
    /// None when the expiry sweeper cancelled
    pub cancelled_by: Option<MemberId>,
    pub cancelled_at: DateTime<Utc>,
}

/// One book's transfer direction within an exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExchangeBook {
    pub book_id: BookId,
    pub from_member: MemberId,
    pub to_member: MemberId,
}

/// An accepted trade, tracked through meeting and completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub exchange_id: ExchangeId,
    /// The request this exchange was spawned from
    pub request_id: RequestId,
    /// The original requester
    pub member_a: MemberId,
    /// The original receiver
    pub member_b: MemberId,
    pub status: ExchangeStatus,
    /// Completion confirmation, independent of meeting confirmation
    pub confirmed_by_a: bool,
    pub confirmed_by_b: bool,
    pub meeting: Option<MeetingInfo>,
    pub cancellation: Option<CancellationInfo>,
    pub completed_at: Option<DateTime<Utc>>,
    pub books: Vec<ExchangeBook>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Exchange {
    /// Create a pending exchange between requester (side A) and receiver (side B)
    pub fn new(
        request_id: RequestId,
        member_a: MemberId,
        member_b: MemberId,
        books: Vec<ExchangeBook>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            exchange_id: ExchangeId::new(),
            request_id,
            member_a,
            member_b,
            status: ExchangeStatus::Pending,
            confirmed_by_a: false,
            confirmed_by_b: false,
            meeting: None,
            cancellation: None,
            completed_at: None,
            books,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// Which side an identity set participates as, if any
    pub fn role_of(&self, member_ids: &HashSet<MemberId>) -> Option<ExchangeRole> {
        if member_ids.contains(&self.member_a) {
            Some(ExchangeRole::SideA)
        } else if member_ids.contains(&self.member_b) {
            Some(ExchangeRole::SideB)
        } else {
            None
        }
    }

    /// The member id on the given side
    pub fn member(&self, role: ExchangeRole) -> MemberId {
        match role {
            ExchangeRole::SideA => self.member_a,
            ExchangeRole::SideB => self.member_b,
        }
    }

    /// Whether the given side has confirmed completion
    pub fn confirmed(&self, role: ExchangeRole) -> bool {
        match role {
            ExchangeRole::SideA => self.confirmed_by_a,
            ExchangeRole::SideB => self.confirmed_by_b,
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.confirmed_by_a && self.confirmed_by_b
    }

    /// Ids of every book tied to the exchange
    pub fn book_ids(&self) -> Vec<BookId> {
        self.books.iter().map(|b| b.book_id).collect()
    }

    /// Whether a participant may still cancel
    pub fn can_cancel(&self) -> bool {
        !matches!(
            self.status,
            ExchangeStatus::Completed | ExchangeStatus::Cancelled
        )
    }

    /// Whether completion may still be confirmed from the current status
    pub fn can_confirm(&self) -> bool {
        matches!(
            self.status,
            ExchangeStatus::Pending | ExchangeStatus::MeetingScheduled | ExchangeStatus::InProgress
        )
    }

    /// Whether the exchange's expiry horizon has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
