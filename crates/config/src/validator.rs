use crate::*;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Platform name is required")]
    MissingPlatformName,

    #[error("Platform description is required")]
    MissingPlatformDescription,

    #[error("Invalid version format: {0}. Must be in format X.Y.Z (e.g., 1.0.0)")]
    InvalidVersionFormat(String),

    #[error("matching.score_threshold must be between 0 and 1, got {0}")]
    InvalidScoreThreshold(f64),

    #[error("matching.max_suggestions must be a positive integer")]
    InvalidMaxSuggestions,

    #[error("matching.suggestion_ttl_days must be a positive integer, got {0}")]
    InvalidSuggestionTtl(i64),

    #[error("matching.fuzzy_title_overlap must be in (0, 1], got {0}")]
    InvalidFuzzyOverlap(f64),

    #[error("matching.{table}: tier table must not be empty")]
    EmptyTierTable { table: String },

    #[error("matching.{table}: tiers must be sorted by min descending")]
    UnsortedTierTable { table: String },

    #[error("matching.{table}: tier bonus must not be negative")]
    NegativeTierBonus { table: String },

    #[error("geography.metro_areas[{name}]: metro area needs at least two localities")]
    UndersizedMetroArea { name: String },

    #[error("trust.floor must be between 0 and 100, got {0}")]
    InvalidTrustFloor(f64),

    #[error("trust.{field} must not be negative, got {value}")]
    NegativeTrustAmount { field: String, value: f64 },

    #[error("lifecycle.{field} must be a positive integer")]
    InvalidLifecycleValue { field: String },

    #[error("sweeper.{field} must be a positive integer")]
    InvalidSweepInterval { field: String },

    #[error("observability.log_format must be one of: pretty, json, compact; got {0}")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &PlatformConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_platform(&config.platform, &mut report);
    validate_matching(&config.matching, &mut report);
    validate_geography(&config.geography, &mut report);
    validate_trust(&config.trust, &mut report);
    validate_lifecycle(&config.lifecycle, &mut report);
    validate_sweeper(&config.sweeper, &mut report);
    validate_observability(&config.observability, &mut report);

    report
}

fn validate_platform(platform: &PlatformInfo, report: &mut ValidationReport) {
    if platform.name.is_empty() {
        report.add_error(ValidationError::MissingPlatformName);
    }

    if platform.description.is_empty() {
        report.add_error(ValidationError::MissingPlatformDescription);
    }

    let version_regex = Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex");
    if !version_regex.is_match(&platform.version) {
        report.add_error(ValidationError::InvalidVersionFormat(
            platform.version.clone(),
        ));
    }
}

fn validate_matching(matching: &MatchingConfig, report: &mut ValidationReport) {
    if !(0.0..=1.0).contains(&matching.score_threshold) {
        report.add_error(ValidationError::InvalidScoreThreshold(
            matching.score_threshold,
        ));
    } else if matching.score_threshold > 0.9 {
        report.add_warning(
            "matching.score_threshold",
            "Thresholds above 0.9 will suppress nearly all suggestions",
        );
    }

    if matching.max_suggestions == 0 {
        report.add_error(ValidationError::InvalidMaxSuggestions);
    }

    if matching.suggestion_ttl_days <= 0 {
        report.add_error(ValidationError::InvalidSuggestionTtl(
            matching.suggestion_ttl_days,
        ));
    }

    if !(0.0..=1.0).contains(&matching.fuzzy_title_overlap) || matching.fuzzy_title_overlap == 0.0 {
        report.add_error(ValidationError::InvalidFuzzyOverlap(
            matching.fuzzy_title_overlap,
        ));
    }

    for (name, table) in [
        ("trust_tiers", &matching.trust_tiers),
        ("history_tiers", &matching.history_tiers),
        ("rating_tiers", &matching.rating_tiers),
        ("priority_tiers", &matching.priority_tiers),
    ] {
        validate_tier_table(name, table, report);
    }

    if matching.text.cap <= 0.0 {
        report.add_warning(
            "matching.text.cap",
            "A non-positive text cap disables the dominant scoring factor",
        );
    }
}

fn validate_tier_table(name: &str, table: &[ScoreTier], report: &mut ValidationReport) {
    if table.is_empty() {
        report.add_error(ValidationError::EmptyTierTable {
            table: name.to_string(),
        });
        return;
    }

    if table.windows(2).any(|w| w[0].min < w[1].min) {
        report.add_error(ValidationError::UnsortedTierTable {
            table: name.to_string(),
        });
    }

    if table.iter().any(|t| t.bonus < 0.0) {
        report.add_error(ValidationError::NegativeTierBonus {
            table: name.to_string(),
        });
    }
}

fn validate_geography(geography: &GeographyConfig, report: &mut ValidationReport) {
    for metro in &geography.metro_areas {
        if metro.localities.len() < 2 {
            report.add_error(ValidationError::UndersizedMetroArea {
                name: metro.name.clone(),
            });
        }
    }

    if geography.major_cities.is_empty() {
        report.add_warning(
            "geography.major_cities",
            "Empty major-city list disables the major-city proximity bonus",
        );
    }
}

fn validate_trust(trust: &TrustConfig, report: &mut ValidationReport) {
    if !(0.0..=100.0).contains(&trust.floor) {
        report.add_error(ValidationError::InvalidTrustFloor(trust.floor));
    }

    for (field, value) in [
        ("completion_reward", trust.completion_reward),
        ("expiry_penalty", trust.expiry_penalty),
        (
            "cancellation_penalties.user_cancelled",
            trust.cancellation_penalties.user_cancelled,
        ),
        (
            "cancellation_penalties.no_show",
            trust.cancellation_penalties.no_show,
        ),
        ("cancellation_penalties.other", trust.cancellation_penalties.other),
    ] {
        if value < 0.0 {
            report.add_error(ValidationError::NegativeTrustAmount {
                field: field.to_string(),
                value,
            });
        }
    }
}

fn validate_lifecycle(lifecycle: &LifecycleConfig, report: &mut ValidationReport) {
    if lifecycle.request_expiry_days <= 0 {
        report.add_error(ValidationError::InvalidLifecycleValue {
            field: "request_expiry_days".to_string(),
        });
    }

    if lifecycle.exchange_expiry_days <= 0 {
        report.add_error(ValidationError::InvalidLifecycleValue {
            field: "exchange_expiry_days".to_string(),
        });
    }

    if lifecycle.max_pending_per_book == 0 {
        report.add_error(ValidationError::InvalidLifecycleValue {
            field: "max_pending_per_book".to_string(),
        });
    }

    if lifecycle.max_books_per_request == 0 {
        report.add_error(ValidationError::InvalidLifecycleValue {
            field: "max_books_per_request".to_string(),
        });
    }

    if lifecycle.max_page_size == 0 || lifecycle.default_page_size == 0 {
        report.add_error(ValidationError::InvalidLifecycleValue {
            field: "page sizes".to_string(),
        });
    } else if lifecycle.default_page_size > lifecycle.max_page_size {
        report.add_warning(
            "lifecycle.default_page_size",
            "default_page_size exceeds max_page_size and will be clamped",
        );
    }
}

fn validate_sweeper(sweeper: &SweeperConfig, report: &mut ValidationReport) {
    if sweeper.request_sweep_interval_secs == 0 {
        report.add_error(ValidationError::InvalidSweepInterval {
            field: "request_sweep_interval_secs".to_string(),
        });
    }

    if sweeper.exchange_sweep_interval_secs == 0 {
        report.add_error(ValidationError::InvalidSweepInterval {
            field: "exchange_sweep_interval_secs".to_string(),
        });
    }
}

fn validate_observability(observability: &ObservabilityConfig, report: &mut ValidationReport) {
    let valid = ["pretty", "json", "compact"];
    if !valid.contains(&observability.log_format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(
            observability.log_format.clone(),
        ));
    }
}
