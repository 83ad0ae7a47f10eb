//! Scheduled expiration sweeps

pub mod service;

pub use service::ExpirySweeper;
