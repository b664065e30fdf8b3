//! Toolmate generation backend.
//!
//! A thin, non-streaming HTTP client for hosted and local language models.
//! [`LlmClient`] implements [`toolmate_planner::Generator`], so it plugs
//! straight into the planning orchestrator.

pub mod client;
pub mod error;

pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use error::{LlmError, Result};
