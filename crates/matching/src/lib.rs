//! Matching and recommendation engine for BookSwap
//!
//! This crate scores and ranks candidate trade partners from want/offer
//! inventories and persists the result as expiring suggestions.
//!
//! # Features
//!
//! - Priority-ordered candidate search (ISBN, catalog id, fuzzy text)
//! - Weighted, capped, configurable factor scoring
//! - Reciprocal (two-way) match detection
//! - Idempotent suggestion regeneration

pub mod clients;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod store;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use engine::MatchingEngine;
pub use error::{MatchingError, MatchingResult};
pub use types::{BookMatchPair, ExchangeSuggestion, MatchDirection, ScoreBreakdown};

// Store exports
pub use store::memory::InMemorySuggestionStore;
pub use store::traits::SuggestionStore;

// Client exports
pub use clients::requests::{MockPendingRequestGate, PendingRequestGate};
