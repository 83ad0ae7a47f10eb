//! Clients for state owned by other services

pub mod requests;

pub use requests::{MockPendingRequestGate, PendingRequestGate};
