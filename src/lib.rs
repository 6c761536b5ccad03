//! ZAI-Search-RS: A resilient client for the Z.AI web search API
//!
//! Provides a request pipeline with credential validation, token-bucket
//! admission control, failure classification and retry, plus bounded
//! concurrency for batch and fan-out workloads.

pub mod auth;
pub mod batch;
pub mod client;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod models;

pub use auth::Authenticator;
pub use batch::{BatchItem, BatchOutcome, BatchProcessor};
pub use client::SearchClient;
pub use concurrent::ConcurrentClient;
pub use config::Settings;
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use models::{SafeSearch, SearchRequest, SearchResponse, SearchResult, SearchType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Default maximum retry attempts for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;
