//! SuggestionStore trait definition

use crate::error::MatchingResult;
use crate::types::ExchangeSuggestion;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MemberId, SuggestionId};

/// Storage for derived suggestions
///
/// Suggestions are keyed by their (member, counterpart) pair: writing a
/// new suggestion for a pair replaces any previous one, which is what
/// makes regeneration idempotent.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    /// Insert the suggestion, replacing any existing row for the same
    /// (member, counterpart) pair
    async fn replace_for_pair(
        &self,
        suggestion: ExchangeSuggestion,
    ) -> MatchingResult<ExchangeSuggestion>;

    /// Unexpired suggestions for a member, best score first
    ///
    /// Expired rows stay in storage but are never returned.
    async fn active_for_member(
        &self,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> MatchingResult<Vec<ExchangeSuggestion>>;

    /// Get a suggestion by id
    async fn get(&self, suggestion_id: SuggestionId) -> MatchingResult<Option<ExchangeSuggestion>>;

    /// Flag a suggestion as seen by its member
    async fn mark_viewed(&self, suggestion_id: SuggestionId) -> MatchingResult<()>;
}
