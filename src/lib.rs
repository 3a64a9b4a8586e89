//! scraperank: scrape-and-score enrichment worker.
//!
//! This library consumes scrape targets from a Redis queue, resolves each
//! target into an article, scores the attached subjects against the article
//! text with TF-IDF cosine similarity, and publishes the enriched result on
//! an outbound queue.

// Core modules
pub mod config;
pub mod consumer;
pub mod error;
pub mod heartbeat;
pub mod models;
pub mod publish;
pub mod queue;
pub mod scoring;
pub mod scrape;
pub mod worker;

// Re-export commonly used error types
pub use config::ConfigError;
pub use error::{PipelineError, ScoreError, ScrapeError};
pub use queue::QueueError;
