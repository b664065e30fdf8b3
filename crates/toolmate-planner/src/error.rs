//! Planner error types.
//!
//! All planner subsystems surface errors through [`PlannerError`].  Each
//! variant carries enough context for callers to decide how to handle the
//! failure.
//!
//! Note that the outcome of a planning request (no candidate tools, an
//! unparsable backend response, an empty plan) is *not* reported through this
//! type: those are terminal states of the orchestrator, see
//! [`crate::orchestrator::Outcome`].

use uuid::Uuid;

/// Unified error type for the planning engine.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    // -- Catalog errors ------------------------------------------------------
    /// The tool catalog could not be loaded or contains a malformed entry.
    #[error("failed to load tool catalog: {reason}")]
    CatalogLoad { reason: String },

    /// Two catalog entries share the same name.
    #[error("duplicate tool name in catalog: {name}")]
    DuplicateTool { name: String },

    // -- Planning errors -----------------------------------------------------
    /// Retrieval found no tool relevant to the query.
    #[error("no relevant tools found for query: {query}")]
    NoCandidateTools { query: String },

    /// The generation backend failed (transport, status, or empty output).
    #[error("generation backend failed: {reason}")]
    BackendFailure { reason: String },

    /// No valid plan could be recovered from the backend's text.
    #[error("unparsable plan: {reason}")]
    UnparsablePlan { reason: String, raw: String },

    /// The plan references functions outside the candidate set.
    #[error("plan references unknown tools: {}", names.join(", "))]
    UnknownTools { names: Vec<String> },

    // -- Version store errors ------------------------------------------------
    /// A version index outside `[0, len - 1]` was requested.
    #[error("version index {index} out of range (thread has {len} versions)")]
    OutOfRangeVersion { index: usize, len: usize },

    /// The referenced conversation thread does not exist.
    #[error("conversation thread not found: {thread_id}")]
    ThreadNotFound { thread_id: Uuid },

    // -- Configuration -------------------------------------------------------
    /// Configuration could not be read or decoded.
    #[error("config error: {reason}")]
    Config { reason: String },

    // -- I/O and serialization -----------------------------------------------
    /// Reading the catalog file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog is not a JSON array of tool descriptors.
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the planner crate.
pub type Result<T> = std::result::Result<T, PlannerError>;
