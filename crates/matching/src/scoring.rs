//! Pair scoring
//!
//! A pairing's score is the sum of independent factor contributions, each
//! bounded by its own weight or cap, with the overall result clamped to
//! 1.0. Every weight comes from [`MatchingConfig`]; this module contains
//! no literal policy constants.

use crate::text;
use crate::types::ScoreBreakdown;
use config::{GeographyConfig, MatchingConfig, ScoreTier};
use inventory::{Book, BookCondition, Member, WantedBook};

/// A scored pairing plus its display metadata
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
}

/// Bonus of the first tier whose `min` the value reaches
///
/// Tier tables are validated to be sorted by `min` descending, so the
/// first hit is the best applicable tier.
pub fn tier_bonus(tiers: &[ScoreTier], value: f64) -> f64 {
    tiers
        .iter()
        .find(|t| value >= t.min)
        .map(|t| t.bonus)
        .unwrap_or(0.0)
}

/// Score one want/book pairing against a counterpart member
///
/// `viewer_region` is the querying member's region; all counterpart
/// reputation factors (trust, history, rating, verification) describe the
/// other member regardless of the pairing's direction.
pub fn score_pair(
    want: &WantedBook,
    book: &Book,
    counterpart: &Member,
    viewer_region: &str,
    matching: &MatchingConfig,
    geography: &GeographyConfig,
) -> ScoredPair {
    let mut breakdown = ScoreBreakdown::default();
    let mut reasons = Vec::new();

    let (text_score, text_reason) = text_factor(want, book, matching);
    breakdown.text = text_score.min(matching.text.cap);
    if let Some(reason) = text_reason {
        reasons.push(reason);
    }

    breakdown.trust = if counterpart.trust_score < matching.trust_penalty.below {
        reasons.push("below-average trust score".to_string());
        -matching.trust_penalty.penalty
    } else {
        let bonus = tier_bonus(&matching.trust_tiers, counterpart.trust_score);
        if bonus > 0.0 {
            reasons.push("trusted member".to_string());
        }
        bonus
    };

    breakdown.history = tier_bonus(
        &matching.history_tiers,
        counterpart.completed_exchanges as f64,
    );
    if breakdown.history > 0.0 {
        reasons.push(format!(
            "{} completed exchanges",
            counterpart.completed_exchanges
        ));
    }

    breakdown.rating = tier_bonus(&matching.rating_tiers, counterpart.average_rating);
    if breakdown.rating > 0.0 {
        reasons.push("highly rated".to_string());
    }

    let (proximity, proximity_reason) =
        proximity_factor(viewer_region, &counterpart.region, matching, geography);
    breakdown.proximity = proximity;
    if let Some(reason) = proximity_reason {
        reasons.push(reason);
    }

    if counterpart.is_verified {
        breakdown.verified = matching.verified_bonus;
        reasons.push("verified member".to_string());
    }

    breakdown.priority = tier_bonus(&matching.priority_tiers, want.priority as f64);

    breakdown.condition = condition_bonus(book.condition, matching);
    if breakdown.condition > 0.0 {
        reasons.push(format!("good condition ({:?})", book.condition));
    }

    ScoredPair {
        score: breakdown.total().clamp(0.0, 1.0),
        breakdown,
        reasons,
    }
}

/// Best applicable text-match level, by precedence:
/// title exact > title substring > author exact > author substring > category
fn text_factor(want: &WantedBook, book: &Book, matching: &MatchingConfig) -> (f64, Option<String>) {
    let weights = &matching.text;

    if text::eq_normalized(&want.title, &book.title) {
        return (weights.title_exact, Some("title matches exactly".to_string()));
    }

    if text::contains_normalized(&want.title, &book.title) {
        return (weights.title_partial, Some("title partially matches".to_string()));
    }

    if let Some(ref author) = want.author {
        if text::eq_normalized(author, &book.author) {
            return (weights.author_exact, Some("author matches exactly".to_string()));
        }
        if text::contains_normalized(author, &book.author) {
            return (weights.author_partial, Some("author partially matches".to_string()));
        }
    }

    if let (Some(want_category), Some(book_category)) = (&want.category, &book.category) {
        if text::eq_normalized(want_category, book_category) {
            return (weights.category, Some("same category".to_string()));
        }
    }

    (0.0, None)
}

/// Geographic proximity: exact region > shared metro area > both in a
/// recognized major city; only the best tier applies.
fn proximity_factor(
    region_a: &str,
    region_b: &str,
    matching: &MatchingConfig,
    geography: &GeographyConfig,
) -> (f64, Option<String>) {
    let a = text::normalize(region_a);
    let b = text::normalize(region_b);

    if a.is_empty() || b.is_empty() {
        return (0.0, None);
    }

    if a == b {
        return (
            matching.proximity.same_region,
            Some("same region".to_string()),
        );
    }

    for metro in &geography.metro_areas {
        let has_a = metro.localities.iter().any(|l| text::normalize(l) == a);
        let has_b = metro.localities.iter().any(|l| text::normalize(l) == b);
        if has_a && has_b {
            return (
                matching.proximity.same_metro,
                Some(format!("same metro area ({})", metro.name)),
            );
        }
    }

    let major_a = geography.major_cities.iter().any(|c| text::normalize(c) == a);
    let major_b = geography.major_cities.iter().any(|c| text::normalize(c) == b);
    if major_a && major_b {
        return (
            matching.proximity.major_city,
            Some("both in major cities".to_string()),
        );
    }

    (0.0, None)
}

fn condition_bonus(condition: BookCondition, matching: &MatchingConfig) -> f64 {
    let bonuses = &matching.condition_bonuses;
    match condition {
        BookCondition::LikeNew => bonuses.like_new,
        BookCondition::VeryGood => bonuses.very_good,
        BookCondition::Good => bonuses.good,
        BookCondition::Fair => bonuses.fair,
        BookCondition::Poor => bonuses.poor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MemberId, UserId};

    fn counterpart() -> Member {
        let mut member = Member::new(UserId::new(), "other", "london");
        member.trust_score = 85.0;
        member.completed_exchanges = 25;
        member.average_rating = 4.6;
        member.is_verified = true;
        member
    }

    fn pair_inputs() -> (WantedBook, Book) {
        let mut want = WantedBook::new(MemberId::new(), "Dune", 9);
        want.author = Some("Frank Herbert".to_string());
        let book = Book::new(MemberId::new(), "Dune", "Frank Herbert", BookCondition::LikeNew);
        (want, book)
    }

    #[test]
    fn test_tier_bonus_picks_best_applicable() {
        let tiers = vec![
            ScoreTier { min: 80.0, bonus: 0.10 },
            ScoreTier { min: 60.0, bonus: 0.07 },
        ];
        assert_eq!(tier_bonus(&tiers, 90.0), 0.10);
        assert_eq!(tier_bonus(&tiers, 70.0), 0.07);
        assert_eq!(tier_bonus(&tiers, 10.0), 0.0);
    }

    #[test]
    fn test_full_match_scores_high_and_clamps() {
        let (want, book) = pair_inputs();
        let scored = score_pair(
            &want,
            &book,
            &counterpart(),
            "london",
            &MatchingConfig::default(),
            &GeographyConfig::default(),
        );

        assert!(scored.score > 0.7, "score was {}", scored.score);
        assert!(scored.score <= 1.0);
        assert_eq!(scored.breakdown.text, MatchingConfig::default().text.title_exact);
        assert!(scored.reasons.iter().any(|r| r.contains("title matches")));
    }

    #[test]
    fn test_below_average_trust_subtracts() {
        let (want, book) = pair_inputs();
        let mut low_trust = counterpart();
        low_trust.trust_score = 10.0;

        let config = MatchingConfig::default();
        let scored = score_pair(
            &want,
            &book,
            &low_trust,
            "london",
            &config,
            &GeographyConfig::default(),
        );

        assert_eq!(scored.breakdown.trust, -config.trust_penalty.penalty);
    }

    #[test]
    fn test_text_precedence_title_over_author() {
        let config = MatchingConfig::default();
        let (mut want, mut book) = pair_inputs();

        // Only the author matches
        want.title = "Children of Dune".to_string();
        book.title = "Neuromancer".to_string();
        let scored = score_pair(
            &want,
            &book,
            &counterpart(),
            "berlin",
            &config,
            &GeographyConfig::default(),
        );
        assert_eq!(scored.breakdown.text, config.text.author_exact);
    }

    #[test]
    fn test_metro_area_aliasing() {
        let (want, book) = pair_inputs();
        let mut other = counterpart();
        other.region = "Oakland".to_string();

        let config = MatchingConfig::default();
        let scored = score_pair(
            &want,
            &book,
            &other,
            "San Francisco",
            &config,
            &GeographyConfig::default(),
        );

        assert_eq!(scored.breakdown.proximity, config.proximity.same_metro);
    }

    #[test]
    fn test_major_city_fallback() {
        let (want, book) = pair_inputs();
        let mut other = counterpart();
        other.region = "Tokyo".to_string();

        let config = MatchingConfig::default();
        let scored = score_pair(
            &want,
            &book,
            &other,
            "Berlin",
            &config,
            &GeographyConfig::default(),
        );

        assert_eq!(scored.breakdown.proximity, config.proximity.major_city);
    }
}
