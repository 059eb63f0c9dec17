//! Autogram - automated Instagram publishing
//!
//! This library provides the core functionality for generating, scheduling,
//! and publishing Instagram posts through the Graph API two-phase publish
//! protocol.

pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod generator;
pub mod logging;
pub mod orchestrator;
pub mod publisher;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::{Database, QueueStats};
pub use error::{AutogramError, PublishError, Result};
pub use orchestrator::{Orchestrator, PublishOutcome};
pub use scheduler::{Scheduler, TickSummary};
pub use types::{Credential, GeneratedContent, Post, PostStatus, Schedule};
