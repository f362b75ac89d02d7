//! EBMS Common Library
//!
//! The article review core shared by the EBMS services:
//! - Domain types for articles, topics, states, queues and packets
//! - The state store seam with in-memory and Postgres implementations
//! - The review state machine, review queues and reviewer packets
//! - Error types, configuration, authentication and metrics

pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod reference;
pub mod review;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use review::{ReviewContext, ReviewServices};
pub use store::{MemoryStore, ReviewStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
