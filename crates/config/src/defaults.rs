use crate::{MetroArea, ScoreTier};

pub fn default_score_threshold() -> f64 {
    0.3
}

pub fn default_max_suggestions() -> usize {
    10
}

pub fn default_suggestion_ttl_days() -> i64 {
    7
}

pub fn default_fuzzy_title_overlap() -> f64 {
    0.5
}

pub fn default_trust_tiers() -> Vec<ScoreTier> {
    vec![
        ScoreTier { min: 80.0, bonus: 0.10 },
        ScoreTier { min: 60.0, bonus: 0.07 },
        ScoreTier { min: 40.0, bonus: 0.04 },
    ]
}

pub fn default_history_tiers() -> Vec<ScoreTier> {
    vec![
        ScoreTier { min: 50.0, bonus: 0.10 },
        ScoreTier { min: 20.0, bonus: 0.07 },
        ScoreTier { min: 5.0, bonus: 0.04 },
        ScoreTier { min: 1.0, bonus: 0.02 },
    ]
}

pub fn default_rating_tiers() -> Vec<ScoreTier> {
    vec![
        ScoreTier { min: 4.5, bonus: 0.08 },
        ScoreTier { min: 4.0, bonus: 0.05 },
        ScoreTier { min: 3.0, bonus: 0.02 },
    ]
}

pub fn default_priority_tiers() -> Vec<ScoreTier> {
    vec![
        ScoreTier { min: 8.0, bonus: 0.10 },
        ScoreTier { min: 5.0, bonus: 0.06 },
        ScoreTier { min: 3.0, bonus: 0.03 },
        ScoreTier { min: 0.0, bonus: 0.01 },
    ]
}

pub fn default_verified_bonus() -> f64 {
    0.05
}

pub fn default_metro_areas() -> Vec<MetroArea> {
    vec![
        MetroArea {
            name: "bay-area".to_string(),
            localities: vec![
                "san francisco".to_string(),
                "oakland".to_string(),
                "berkeley".to_string(),
                "san jose".to_string(),
            ],
        },
        MetroArea {
            name: "greater-london".to_string(),
            localities: vec![
                "london".to_string(),
                "croydon".to_string(),
                "wembley".to_string(),
            ],
        },
        MetroArea {
            name: "nyc-metro".to_string(),
            localities: vec![
                "new york".to_string(),
                "brooklyn".to_string(),
                "queens".to_string(),
                "jersey city".to_string(),
            ],
        },
    ]
}

pub fn default_major_cities() -> Vec<String> {
    [
        "london", "new york", "san francisco", "chicago", "toronto", "berlin",
        "paris", "madrid", "amsterdam", "sydney", "singapore", "tokyo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_trust_floor() -> f64 {
    20.0
}

pub fn default_completion_reward() -> f64 {
    2.0
}

pub fn default_expiry_penalty() -> f64 {
    5.0
}

pub fn default_request_expiry_days() -> i64 {
    14
}

pub fn default_exchange_expiry_days() -> i64 {
    30
}

pub fn default_max_pending_per_book() -> usize {
    3
}

pub fn default_max_books_per_request() -> usize {
    10
}

pub fn default_page_size() -> u32 {
    20
}

pub fn default_max_page_size() -> u32 {
    100
}

pub fn default_request_sweep_interval_secs() -> u64 {
    3600
}

pub fn default_exchange_sweep_interval_secs() -> u64 {
    21600
}

pub fn default_run_on_startup() -> bool {
    true
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
