//! In-memory suggestion store for testing and development

use crate::error::MatchingResult;
use crate::store::traits::SuggestionStore;
use crate::types::ExchangeSuggestion;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MemberId, SuggestionId};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory suggestion store keyed by (member, counterpart)
pub struct InMemorySuggestionStore {
    by_pair: RwLock<HashMap<(MemberId, MemberId), ExchangeSuggestion>>,
}

impl InMemorySuggestionStore {
    /// Create an empty suggestion store
    pub fn new() -> Self {
        Self {
            by_pair: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySuggestionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SuggestionStore for InMemorySuggestionStore {
    async fn replace_for_pair(
        &self,
        suggestion: ExchangeSuggestion,
    ) -> MatchingResult<ExchangeSuggestion> {
        let mut by_pair = self.by_pair.write().unwrap();
        by_pair.insert(
            (suggestion.member_id, suggestion.counterpart_id),
            suggestion.clone(),
        );
        Ok(suggestion)
    }

    async fn active_for_member(
        &self,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> MatchingResult<Vec<ExchangeSuggestion>> {
        let by_pair = self.by_pair.read().unwrap();
        let mut result: Vec<ExchangeSuggestion> = by_pair
            .values()
            .filter(|s| s.member_id == member_id && !s.is_expired(now))
            .cloned()
            .collect();
        result.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.match_score)));
        Ok(result)
    }

    async fn get(&self, suggestion_id: SuggestionId) -> MatchingResult<Option<ExchangeSuggestion>> {
        let by_pair = self.by_pair.read().unwrap();
        Ok(by_pair
            .values()
            .find(|s| s.suggestion_id == suggestion_id)
            .cloned())
    }

    async fn mark_viewed(&self, suggestion_id: SuggestionId) -> MatchingResult<()> {
        let mut by_pair = self.by_pair.write().unwrap();
        if let Some(suggestion) = by_pair
            .values_mut()
            .find(|s| s.suggestion_id == suggestion_id)
        {
            suggestion.viewed = true;
        }
        Ok(())
    }
}
