//! Matching engine domain types
//!
//! Suggestions are derived, disposable rows: they are recomputed on demand
//! and become invisible (not deleted) once past their expiry timestamp.

use chrono::{DateTime, Utc};
use common::{BookId, MemberId, SuggestionId, WantedBookId};
use serde::{Deserialize, Serialize};

/// Which side of the trade a scored pairing belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDirection {
    /// The querying member wants the counterpart's book
    IWantTheirs,
    /// The counterpart wants one of the querying member's books
    TheyWantMine,
}

/// One scored book-to-want pairing underlying a suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMatchPair {
    pub book_id: BookId,
    pub wanted_id: WantedBookId,
    pub direction: MatchDirection,
    pub score: f64,
    /// Human-readable explanations for display ("title matches exactly", ...)
    pub reasons: Vec<String>,
}

/// Per-factor score contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub text: f64,
    pub trust: f64,
    pub history: f64,
    pub rating: f64,
    pub proximity: f64,
    pub verified: f64,
    pub priority: f64,
    pub condition: f64,
}

impl ScoreBreakdown {
    /// Accumulate another breakdown into this one
    pub fn accumulate(&mut self, other: &ScoreBreakdown) {
        self.text += other.text;
        self.trust += other.trust;
        self.history += other.history;
        self.rating += other.rating;
        self.proximity += other.proximity;
        self.verified += other.verified;
        self.priority += other.priority;
        self.condition += other.condition;
    }

    /// Average over `n` accumulated pairings, for display
    pub fn averaged(&self, n: usize) -> ScoreBreakdown {
        if n == 0 {
            return ScoreBreakdown::default();
        }
        let n = n as f64;
        ScoreBreakdown {
            text: self.text / n,
            trust: self.trust / n,
            history: self.history / n,
            rating: self.rating / n,
            proximity: self.proximity / n,
            verified: self.verified / n,
            priority: self.priority / n,
            condition: self.condition / n,
        }
    }

    /// Sum of all factor contributions
    pub fn total(&self) -> f64 {
        self.text
            + self.trust
            + self.history
            + self.rating
            + self.proximity
            + self.verified
            + self.priority
            + self.condition
    }
}

/// A ranked, expiring recommendation pairing two members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSuggestion {
    pub suggestion_id: SuggestionId,
    /// The member the suggestion was computed for
    pub member_id: MemberId,
    pub counterpart_id: MemberId,
    /// Aggregate ranking score: sum over all qualifying pairings, so more
    /// matching pairs always rank higher
    pub match_score: f64,
    /// Averaged per-factor contributions, for display
    pub breakdown: ScoreBreakdown,
    /// Whether any pairing runs in the reciprocal direction
    pub two_way: bool,
    pub viewed: bool,
    pub pairs: Vec<BookMatchPair>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ExchangeSuggestion {
    /// Whether the suggestion is past its visibility window
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_accumulate_and_average() {
        let mut acc = ScoreBreakdown::default();
        acc.accumulate(&ScoreBreakdown {
            text: 0.3,
            proximity: 0.1,
            ..Default::default()
        });
        acc.accumulate(&ScoreBreakdown {
            text: 0.1,
            proximity: 0.1,
            ..Default::default()
        });

        let avg = acc.averaged(2);
        assert!((avg.text - 0.2).abs() < 1e-9);
        assert!((avg.proximity - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_averaged_zero_is_empty() {
        let acc = ScoreBreakdown {
            text: 0.5,
            ..Default::default()
        };
        assert_eq!(acc.averaged(0), ScoreBreakdown::default());
    }

    #[test]
    fn test_suggestion_expiry() {
        let now = Utc::now();
        let suggestion = ExchangeSuggestion {
            suggestion_id: SuggestionId::new(),
            member_id: MemberId::new(),
            counterpart_id: MemberId::new(),
            match_score: 0.5,
            breakdown: ScoreBreakdown::default(),
            two_way: false,
            viewed: false,
            pairs: vec![],
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
        };

        assert!(!suggestion.is_expired(now));
        assert!(suggestion.is_expired(now + chrono::Duration::days(8)));
    }
}
