//! Configuration parsing and validation for BookSwap
//!
//! All tunable policy of the platform lives here: matching weights and
//! tiers, trust-score economics, lifecycle expiry horizons, and sweeper
//! intervals. The engines and state machines receive these structures by
//! injection and carry no literal policy constants of their own.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level platform configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    pub platform: PlatformInfo,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub geography: GeographyConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Platform metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Matching engine weights, tiers, and limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Suggestions scoring below this are discarded
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// At most this many counterpart members are kept per run
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    /// Persisted suggestions become invisible after this many days
    #[serde(default = "default_suggestion_ttl_days")]
    pub suggestion_ttl_days: i64,
    /// Minimum share of want-title keywords a candidate title must contain
    /// for the fuzzy strategy to accept it
    #[serde(default = "default_fuzzy_title_overlap")]
    pub fuzzy_title_overlap: f64,
    #[serde(default)]
    pub text: TextMatchWeights,
    /// Counterpart trust-score tiers, sorted by `min` descending
    #[serde(default = "default_trust_tiers")]
    pub trust_tiers: Vec<ScoreTier>,
    /// Penalty applied when the counterpart's trust score is below average
    #[serde(default)]
    pub trust_penalty: BelowAveragePenalty,
    /// Completed-exchange-count tiers, sorted by `min` descending
    #[serde(default = "default_history_tiers")]
    pub history_tiers: Vec<ScoreTier>,
    /// Average-rating tiers, sorted by `min` descending
    #[serde(default = "default_rating_tiers")]
    pub rating_tiers: Vec<ScoreTier>,
    /// Want-priority tiers, sorted by `min` descending
    #[serde(default = "default_priority_tiers")]
    pub priority_tiers: Vec<ScoreTier>,
    #[serde(default)]
    pub proximity: ProximityWeights,
    /// Flat bonus for verified counterpart members
    #[serde(default = "default_verified_bonus")]
    pub verified_bonus: f64,
    #[serde(default)]
    pub condition_bonuses: ConditionBonuses,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            max_suggestions: default_max_suggestions(),
            suggestion_ttl_days: default_suggestion_ttl_days(),
            fuzzy_title_overlap: default_fuzzy_title_overlap(),
            text: TextMatchWeights::default(),
            trust_tiers: default_trust_tiers(),
            trust_penalty: BelowAveragePenalty::default(),
            history_tiers: default_history_tiers(),
            rating_tiers: default_rating_tiers(),
            priority_tiers: default_priority_tiers(),
            proximity: ProximityWeights::default(),
            verified_bonus: default_verified_bonus(),
            condition_bonuses: ConditionBonuses::default(),
        }
    }
}

/// One scoring tier: applies when the measured value is at least `min`
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ScoreTier {
    pub min: f64,
    pub bonus: f64,
}

/// Text-match factor weights; `cap` bounds the whole factor
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TextMatchWeights {
    pub title_exact: f64,
    pub title_partial: f64,
    pub author_exact: f64,
    pub author_partial: f64,
    pub category: f64,
    pub cap: f64,
}

impl Default for TextMatchWeights {
    fn default() -> Self {
        Self {
            title_exact: 0.30,
            title_partial: 0.20,
            author_exact: 0.15,
            author_partial: 0.10,
            category: 0.05,
            cap: 0.30,
        }
    }
}

/// Subtractive adjustment for counterparts below the trust average
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BelowAveragePenalty {
    /// Trust scores strictly below this attract the penalty
    pub below: f64,
    pub penalty: f64,
}

impl Default for BelowAveragePenalty {
    fn default() -> Self {
        Self {
            below: 30.0,
            penalty: 0.02,
        }
    }
}

/// Geographic proximity bonuses, best single match applies
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ProximityWeights {
    pub same_region: f64,
    pub same_metro: f64,
    pub major_city: f64,
}

impl Default for ProximityWeights {
    fn default() -> Self {
        Self {
            same_region: 0.15,
            same_metro: 0.10,
            major_city: 0.05,
        }
    }
}

/// Per-condition-tier bonuses for the offered book
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ConditionBonuses {
    pub like_new: f64,
    pub very_good: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for ConditionBonuses {
    fn default() -> Self {
        Self {
            like_new: 0.08,
            very_good: 0.06,
            good: 0.04,
            fair: 0.02,
            poor: 0.0,
        }
    }
}

/// Region aliasing used by the proximity factor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeographyConfig {
    /// Groups of localities treated as one metro area
    #[serde(default = "default_metro_areas")]
    pub metro_areas: Vec<MetroArea>,
    /// Recognized major cities; two members both in this list get a small bonus
    #[serde(default = "default_major_cities")]
    pub major_cities: Vec<String>,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            metro_areas: default_metro_areas(),
            major_cities: default_major_cities(),
        }
    }
}

/// A named metro area and the locality strings it aliases
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetroArea {
    pub name: String,
    pub localities: Vec<String>,
}

/// Trust-score economics
///
/// All values are product policy, not derived from any formula; they are
/// defaults here precisely so deployments can tune them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrustConfig {
    /// Members below this score cannot initiate requests
    #[serde(default = "default_trust_floor")]
    pub floor: f64,
    /// Symmetric reward on exchange completion
    #[serde(default = "default_completion_reward")]
    pub completion_reward: f64,
    /// Symmetric penalty when an exchange expires unresolved
    #[serde(default = "default_expiry_penalty")]
    pub expiry_penalty: f64,
    #[serde(default)]
    pub cancellation_penalties: CancellationPenalties,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            floor: default_trust_floor(),
            completion_reward: default_completion_reward(),
            expiry_penalty: default_expiry_penalty(),
            cancellation_penalties: CancellationPenalties::default(),
        }
    }
}

/// Penalty applied to the cancelling side, scaled by reason
///
/// Administrative cancellations always carry a zero penalty.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CancellationPenalties {
    pub user_cancelled: f64,
    pub no_show: f64,
    pub other: f64,
}

impl Default for CancellationPenalties {
    fn default() -> Self {
        Self {
            user_cancelled: 2.0,
            no_show: 5.0,
            other: 3.0,
        }
    }
}

/// Request/exchange lifecycle limits and horizons
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Pending requests expire this many days after creation
    #[serde(default = "default_request_expiry_days")]
    pub request_expiry_days: i64,
    /// Pending exchanges expire this many days after acceptance
    #[serde(default = "default_exchange_expiry_days")]
    pub exchange_expiry_days: i64,
    /// A book may be named as requested by at most this many pending requests
    #[serde(default = "default_max_pending_per_book")]
    pub max_pending_per_book: usize,
    /// Upper bound on offered + requested books in one request
    #[serde(default = "default_max_books_per_request")]
    pub max_books_per_request: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            request_expiry_days: default_request_expiry_days(),
            exchange_expiry_days: default_exchange_expiry_days(),
            max_pending_per_book: default_max_pending_per_book(),
            max_books_per_request: default_max_books_per_request(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Expiration sweep scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
    #[serde(default = "default_request_sweep_interval_secs")]
    pub request_sweep_interval_secs: u64,
    #[serde(default = "default_exchange_sweep_interval_secs")]
    pub exchange_sweep_interval_secs: u64,
    /// Run both sweeps once at startup before settling into the intervals
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            request_sweep_interval_secs: default_request_sweep_interval_secs(),
            exchange_sweep_interval_secs: default_exchange_sweep_interval_secs(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// One of: pretty, json, compact
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Prometheus exporter port; metrics are disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}
