//! Matching engine
//!
//! Walks a member's want-list in priority order, searches other members'
//! listed books with a priority-ordered strategy chain, scores every
//! qualifying pairing, aggregates per counterpart member, and persists a
//! ranked, expiring suggestion set. Output is advisory only: acting on a
//! suggestion happens through the exchange request state machine.

use crate::clients::requests::PendingRequestGate;
use crate::error::{MatchingError, MatchingResult};
use crate::scoring::score_pair;
use crate::store::traits::SuggestionStore;
use crate::text;
use crate::types::{BookMatchPair, ExchangeSuggestion, MatchDirection, ScoreBreakdown};
use chrono::{Duration, Utc};
use common::{MemberId, SuggestionId, UserId};
use config::{GeographyConfig, MatchingConfig};
use inventory::{
    Book, BookStore, IdentityResolver, InventoryError, Member, MemberIdentity, MemberStore,
    WantListStore, WantedBook,
};
use metrics::counter;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Aggregation state for one counterpart member
#[derive(Default)]
struct CounterpartMatches {
    pairs: Vec<BookMatchPair>,
    breakdown_sum: ScoreBreakdown,
    score_sum: f64,
    two_way: bool,
}

impl CounterpartMatches {
    fn push(&mut self, pair: BookMatchPair, breakdown: &ScoreBreakdown) {
        self.score_sum += pair.score;
        self.breakdown_sum.accumulate(breakdown);
        if pair.direction == MatchDirection::TheyWantMine {
            self.two_way = true;
        }
        self.pairs.push(pair);
    }
}

/// The matching/recommendation engine
pub struct MatchingEngine {
    members: Arc<dyn MemberStore>,
    books: Arc<dyn BookStore>,
    wants: Arc<dyn WantListStore>,
    suggestions: Arc<dyn SuggestionStore>,
    requests: Arc<dyn PendingRequestGate>,
    identity: IdentityResolver,
    matching: MatchingConfig,
    geography: GeographyConfig,
}

impl MatchingEngine {
    /// Create a new MatchingEngine
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        members: Arc<dyn MemberStore>,
        books: Arc<dyn BookStore>,
        wants: Arc<dyn WantListStore>,
        suggestions: Arc<dyn SuggestionStore>,
        requests: Arc<dyn PendingRequestGate>,
        matching: MatchingConfig,
        geography: GeographyConfig,
    ) -> Self {
        let identity = IdentityResolver::new(members.clone());
        Self {
            members,
            books,
            wants,
            suggestions,
            requests,
            identity,
            matching,
            geography,
        }
    }

    /// Generate, persist, and return ranked suggestions for a user
    ///
    /// Regeneration is idempotent: each persisted suggestion replaces any
    /// previous row for the same (member, counterpart) pair.
    pub async fn find_matches(&self, user_id: UserId) -> MatchingResult<Vec<ExchangeSuggestion>> {
        let identity = self.resolve(user_id).await?;
        let me = identity.primary.clone();

        let want_list = self.wants.list_for_member(me.member_id).await?;
        let my_books = self.books.list_available_by_owner(me.member_id).await?;

        debug!(
            member = %me.member_id,
            wants = want_list.len(),
            owned = my_books.len(),
            "Generating suggestions"
        );

        let mut eligible: HashMap<MemberId, Option<Member>> = HashMap::new();
        let mut matches: HashMap<MemberId, CounterpartMatches> = HashMap::new();

        // Forward pass: my wants against everyone else's listed books
        for want in &want_list {
            let (candidates, strategy_reason) = self.search_candidates(want, &identity).await?;

            for book in candidates {
                if !want.accepts(&book) {
                    continue;
                }

                let counterpart =
                    match self.eligible_counterpart(&identity, book.owner_id, &mut eligible).await? {
                        Some(member) => member,
                        None => continue,
                    };

                let scored = score_pair(
                    want,
                    &book,
                    &counterpart,
                    &me.region,
                    &self.matching,
                    &self.geography,
                );
                let mut reasons = scored.reasons;
                reasons.push(strategy_reason.to_string());

                matches.entry(counterpart.member_id).or_default().push(
                    BookMatchPair {
                        book_id: book.book_id,
                        wanted_id: want.wanted_id,
                        direction: MatchDirection::IWantTheirs,
                        score: scored.score,
                        reasons,
                    },
                    &scored.breakdown,
                );
            }
        }

        // Reciprocal pass: does each counterpart want one of my books?
        // Reciprocity is optional; it adds pairs (and therefore rank) but
        // one-way suggestions survive without it.
        let counterpart_ids: Vec<MemberId> = matches.keys().copied().collect();
        for counterpart_id in counterpart_ids {
            let counterpart = match eligible.get(&counterpart_id) {
                Some(Some(member)) => member.clone(),
                _ => continue,
            };

            let their_wants = self.wants.list_for_member(counterpart_id).await?;
            for want in &their_wants {
                for book in match_want_locally(want, &my_books, self.matching.fuzzy_title_overlap) {
                    if !want.accepts(book) {
                        continue;
                    }

                    let scored = score_pair(
                        want,
                        book,
                        &counterpart,
                        &me.region,
                        &self.matching,
                        &self.geography,
                    );
                    let mut reasons = scored.reasons;
                    reasons.push("they want this book of yours".to_string());

                    matches.entry(counterpart_id).or_default().push(
                        BookMatchPair {
                            book_id: book.book_id,
                            wanted_id: want.wanted_id,
                            direction: MatchDirection::TheyWantMine,
                            score: scored.score,
                            reasons,
                        },
                        &scored.breakdown,
                    );
                }
            }
        }

        // Rank, threshold, cap, persist
        let now = Utc::now();
        let expires_at = now + Duration::days(self.matching.suggestion_ttl_days);

        let mut ranked: Vec<ExchangeSuggestion> = matches
            .into_iter()
            .filter(|(_, m)| m.score_sum >= self.matching.score_threshold)
            .map(|(counterpart_id, m)| {
                let pair_count = m.pairs.len();
                ExchangeSuggestion {
                    suggestion_id: SuggestionId::new(),
                    member_id: me.member_id,
                    counterpart_id,
                    match_score: m.score_sum,
                    breakdown: m.breakdown_sum.averaged(pair_count),
                    two_way: m.two_way,
                    viewed: false,
                    pairs: m.pairs,
                    created_at: now,
                    expires_at,
                }
            })
            .collect();

        ranked.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.match_score)));
        ranked.truncate(self.matching.max_suggestions);

        for suggestion in &ranked {
            self.suggestions.replace_for_pair(suggestion.clone()).await?;
        }

        counter!("matching_suggestions_generated_total").increment(ranked.len() as u64);
        info!(
            member = %me.member_id,
            suggestions = ranked.len(),
            "Suggestion set regenerated"
        );

        Ok(ranked)
    }

    /// Currently visible suggestions for a user, best first
    pub async fn active_suggestions(
        &self,
        user_id: UserId,
    ) -> MatchingResult<Vec<ExchangeSuggestion>> {
        let identity = self.resolve(user_id).await?;
        self.suggestions
            .active_for_member(identity.primary_id(), Utc::now())
            .await
    }

    /// Flag a suggestion as seen
    pub async fn mark_viewed(&self, suggestion_id: SuggestionId) -> MatchingResult<()> {
        self.suggestions.mark_viewed(suggestion_id).await
    }

    async fn resolve(&self, user_id: UserId) -> MatchingResult<MemberIdentity> {
        self.identity.resolve(user_id).await.map_err(|e| match e {
            InventoryError::UserNotFound(user) => MatchingError::MemberNotFound(user),
            other => MatchingError::Inventory(other),
        })
    }

    /// Search listed books for one want, trying strategies in priority
    /// order: exact ISBN, exact catalog id, then fuzzy title/author. Only
    /// the first strategy with at least one result is used; the results
    /// still face the want's condition/language filters afterwards.
    async fn search_candidates(
        &self,
        want: &WantedBook,
        identity: &MemberIdentity,
    ) -> MatchingResult<(Vec<Book>, &'static str)> {
        if let Some(ref isbn) = want.isbn {
            let found = exclude_own(self.books.find_available_by_isbn(isbn).await?, identity);
            if !found.is_empty() {
                return Ok((found, "matched by ISBN"));
            }
        }

        if let Some(ref catalog_id) = want.catalog_id {
            let found = exclude_own(
                self.books.find_available_by_catalog_id(catalog_id).await?,
                identity,
            );
            if !found.is_empty() {
                return Ok((found, "matched by catalog id"));
            }
        }

        let found: Vec<Book> = exclude_own(self.books.list_available().await?, identity)
            .into_iter()
            .filter(|b| {
                text::keyword_overlap(&want.title, &b.title) >= self.matching.fuzzy_title_overlap
            })
            .filter(|b| match want.author {
                Some(ref author) => text::contains_normalized(author, &b.author),
                None => true,
            })
            .collect();

        Ok((found, "matched by title keywords"))
    }

    /// Load and vet a counterpart, caching the verdict per member
    ///
    /// Ineligible: blocked in either direction, or sharing a pending
    /// request with any member row of the querying identity.
    async fn eligible_counterpart(
        &self,
        identity: &MemberIdentity,
        counterpart_id: MemberId,
        cache: &mut HashMap<MemberId, Option<Member>>,
    ) -> MatchingResult<Option<Member>> {
        if let Some(cached) = cache.get(&counterpart_id) {
            return Ok(cached.clone());
        }

        let verdict = self.vet_counterpart(identity, counterpart_id).await?;
        cache.insert(counterpart_id, verdict.clone());
        Ok(verdict)
    }

    async fn vet_counterpart(
        &self,
        identity: &MemberIdentity,
        counterpart_id: MemberId,
    ) -> MatchingResult<Option<Member>> {
        for own_id in &identity.member_ids {
            if self.members.are_blocked(*own_id, counterpart_id).await? {
                debug!(counterpart = %counterpart_id, "Skipping blocked counterpart");
                return Ok(None);
            }
            if self
                .requests
                .has_pending_between(*own_id, counterpart_id)
                .await?
            {
                debug!(counterpart = %counterpart_id, "Skipping counterpart with pending request");
                return Ok(None);
            }
        }

        Ok(self.members.get(counterpart_id).await?)
    }
}

fn exclude_own(books: Vec<Book>, identity: &MemberIdentity) -> Vec<Book> {
    books
        .into_iter()
        .filter(|b| !identity.owns(b.owner_id))
        .collect()
}

/// Match one want against an in-memory set of books using the same
/// strategy priority as the store-backed search
fn match_want_locally<'a>(
    want: &WantedBook,
    books: &'a [Book],
    fuzzy_overlap: f64,
) -> Vec<&'a Book> {
    if let Some(ref isbn) = want.isbn {
        let found: Vec<&Book> = books
            .iter()
            .filter(|b| b.isbn.as_deref() == Some(isbn))
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    if let Some(ref catalog_id) = want.catalog_id {
        let found: Vec<&Book> = books
            .iter()
            .filter(|b| b.catalog_id.as_deref() == Some(catalog_id))
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    books
        .iter()
        .filter(|b| text::keyword_overlap(&want.title, &b.title) >= fuzzy_overlap)
        .filter(|b| match want.author {
            Some(ref author) => text::contains_normalized(author, &b.author),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::requests::MockPendingRequestGate;
    use crate::store::memory::InMemorySuggestionStore;
    use assert_matches::assert_matches;
    use inventory::{BookCondition, InMemoryInventory};

    struct Fixture {
        inventory: Arc<InMemoryInventory>,
        gate: Arc<MockPendingRequestGate>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                inventory: Arc::new(InMemoryInventory::new()),
                gate: Arc::new(MockPendingRequestGate::new()),
            }
        }

        fn engine(&self) -> MatchingEngine {
            MatchingEngine::new(
                self.inventory.clone(),
                self.inventory.clone(),
                self.inventory.clone(),
                Arc::new(InMemorySuggestionStore::new()),
                self.gate.clone(),
                MatchingConfig::default(),
                GeographyConfig::default(),
            )
        }

        async fn member(&self, region: &str) -> Member {
            let member = Member::new(UserId::new(), "reader", region);
            MemberStore::upsert(self.inventory.as_ref(), member.clone())
                .await
                .unwrap();
            member
        }

        /// A counterpart with a strong reputation profile
        async fn strong_member(&self, region: &str) -> Member {
            let mut member = Member::new(UserId::new(), "trader", region);
            member.trust_score = 85.0;
            member.completed_exchanges = 25;
            member.average_rating = 4.6;
            member.is_verified = true;
            MemberStore::upsert(self.inventory.as_ref(), member.clone())
                .await
                .unwrap();
            member
        }

        async fn book(&self, owner: MemberId, title: &str, author: &str) -> Book {
            let book = Book::new(owner, title, author, BookCondition::LikeNew);
            BookStore::upsert(self.inventory.as_ref(), book.clone())
                .await
                .unwrap();
            book
        }

        async fn want(&self, member: MemberId, title: &str, priority: u8) -> WantedBook {
            let want = WantedBook::new(member, title, priority);
            WantListStore::upsert(self.inventory.as_ref(), want.clone())
                .await
                .unwrap();
            want
        }
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let fixture = Fixture::new();
        let engine = fixture.engine();

        let result = engine.find_matches(UserId::new()).await;
        assert_matches!(result, Err(MatchingError::MemberNotFound(_)));
    }

    #[tokio::test]
    async fn test_exact_title_match_is_suggested() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.strong_member("london").await;
        fixture.book(other.member_id, "Dune", "Frank Herbert").await;
        fixture.want(me.member_id, "Dune", 9).await;

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();

        assert_eq!(suggestions.len(), 1);
        let suggestion = &suggestions[0];
        assert_eq!(suggestion.counterpart_id, other.member_id);
        assert!(!suggestion.two_way);
        assert_eq!(suggestion.pairs.len(), 1);
        assert_eq!(suggestion.pairs[0].direction, MatchDirection::IWantTheirs);
        assert!(suggestion.match_score >= 0.3);
    }

    #[tokio::test]
    async fn test_weak_match_is_below_threshold() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.member("nowhere").await;
        // Keyword overlap passes the fuzzy strategy but the text factor
        // finds no substring match, leaving the aggregate under 0.3
        fixture
            .book(other.member_id, "Earthsea Chronicles", "Ursula K. Le Guin")
            .await;
        fixture.want(me.member_id, "Wizard Earthsea", 0).await;

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_counterpart_excluded() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.strong_member("london").await;
        fixture.book(other.member_id, "Dune", "Frank Herbert").await;
        fixture.want(me.member_id, "Dune", 9).await;

        // Counterpart blocked me; exclusion is bidirectional
        fixture
            .inventory
            .set_blocked(other.member_id, me.member_id, true)
            .await
            .unwrap();

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_pending_request_counterpart_excluded() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.strong_member("london").await;
        fixture.book(other.member_id, "Dune", "Frank Herbert").await;
        fixture.want(me.member_id, "Dune", 9).await;

        let gate = Arc::new(
            MockPendingRequestGate::new().with_pending(other.member_id, me.member_id),
        );
        let engine = MatchingEngine::new(
            fixture.inventory.clone(),
            fixture.inventory.clone(),
            fixture.inventory.clone(),
            Arc::new(InMemorySuggestionStore::new()),
            gate,
            MatchingConfig::default(),
            GeographyConfig::default(),
        );

        let suggestions = engine.find_matches(me.user_id).await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_two_way_ranks_above_one_way() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let my_book = fixture.book(me.member_id, "Neuromancer", "William Gibson").await;

        let reciprocal = fixture.strong_member("london").await;
        fixture
            .book(reciprocal.member_id, "Dune", "Frank Herbert")
            .await;
        fixture
            .want(reciprocal.member_id, "Neuromancer", 8)
            .await;

        let one_way = fixture.strong_member("london").await;
        fixture.book(one_way.member_id, "Hyperion", "Dan Simmons").await;

        fixture.want(me.member_id, "Dune", 9).await;
        fixture.want(me.member_id, "Hyperion", 9).await;

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].counterpart_id, reciprocal.member_id);
        assert!(suggestions[0].two_way);
        assert!(suggestions[0].match_score > suggestions[1].match_score);
        assert!(suggestions[0]
            .pairs
            .iter()
            .any(|p| p.direction == MatchDirection::TheyWantMine && p.book_id == my_book.book_id));
    }

    #[tokio::test]
    async fn test_results_sorted_and_regeneration_idempotent() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;

        let near = fixture.strong_member("london").await;
        fixture.book(near.member_id, "Dune", "Frank Herbert").await;
        let far = fixture.strong_member("elsewhere").await;
        fixture.book(far.member_id, "Dune", "Frank Herbert").await;

        fixture.want(me.member_id, "Dune", 9).await;

        let suggestions_store = Arc::new(InMemorySuggestionStore::new());
        let engine = MatchingEngine::new(
            fixture.inventory.clone(),
            fixture.inventory.clone(),
            fixture.inventory.clone(),
            suggestions_store.clone(),
            fixture.gate.clone(),
            MatchingConfig::default(),
            GeographyConfig::default(),
        );

        let first = engine.find_matches(me.user_id).await.unwrap();
        let second = engine.find_matches(me.user_id).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(second[0].match_score >= second[1].match_score);
        assert_eq!(second[0].counterpart_id, near.member_id);

        // Two runs, still exactly one row per counterpart pair
        let stored = suggestions_store
            .active_for_member(me.member_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_isbn_strategy_beats_fuzzy() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.strong_member("london").await;

        // Same title, only one carries the wanted ISBN
        let mut with_isbn = Book::new(
            other.member_id,
            "Dune",
            "Frank Herbert",
            BookCondition::Good,
        );
        with_isbn.isbn = Some("9780441013593".to_string());
        BookStore::upsert(fixture.inventory.as_ref(), with_isbn.clone())
            .await
            .unwrap();
        fixture.book(other.member_id, "Dune", "Frank Herbert").await;

        let mut want = WantedBook::new(me.member_id, "Dune", 9);
        want.isbn = Some("9780441013593".to_string());
        WantListStore::upsert(fixture.inventory.as_ref(), want)
            .await
            .unwrap();

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();

        assert_eq!(suggestions.len(), 1);
        let forward: Vec<_> = suggestions[0]
            .pairs
            .iter()
            .filter(|p| p.direction == MatchDirection::IWantTheirs)
            .collect();
        assert_eq!(forward.len(), 1, "only the ISBN strategy's result is used");
        assert_eq!(forward[0].book_id, with_isbn.book_id);
    }

    #[tokio::test]
    async fn test_min_condition_filters_candidates() {
        let fixture = Fixture::new();
        let me = fixture.member("london").await;
        let other = fixture.strong_member("london").await;

        let mut shabby = Book::new(
            other.member_id,
            "Dune",
            "Frank Herbert",
            BookCondition::Poor,
        );
        shabby.isbn = Some("9780441013593".to_string());
        BookStore::upsert(fixture.inventory.as_ref(), shabby)
            .await
            .unwrap();

        let mut want = WantedBook::new(me.member_id, "Dune", 9);
        want.min_condition = Some(BookCondition::Good);
        WantListStore::upsert(fixture.inventory.as_ref(), want)
            .await
            .unwrap();

        let engine = fixture.engine();
        let suggestions = engine.find_matches(me.user_id).await.unwrap();
        assert!(suggestions.is_empty());
    }
}
