//! Toolmate workflow planning engine.
//!
//! Turns a free-text request into an ordered plan of tool invocations, lets
//! the user revise it in natural language, and keeps a navigable version
//! history per conversation.
//!
//! The pipeline, leaves first:
//!
//! - [`catalog`]: the immutable list of [`ToolDescriptor`]s.
//! - [`retriever`]: TF-IDF ranking of tools against a query.
//! - [`prompt`]: deterministic prompt assembly for initial and update requests.
//! - [`parser`]: recovery and validation of a [`Plan`] from backend text.
//! - [`store`]: conversation threads with append-only, revertible history.
//! - [`orchestrator`]: drives one request through all of the above.
//!
//! The text-generation backend sits behind the [`Generator`] trait; this
//! crate performs no network I/O.

pub mod catalog;
pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod parser;
pub mod plan;
pub mod prompt;
pub mod retriever;
pub mod store;

pub use catalog::{ParamMap, ParamSpec, ToolCatalog, ToolDescriptor};
pub use config::{PlannerConfig, UnknownToolPolicy, DEFAULT_TOP_N};
pub use error::{PlannerError, Result};
pub use generator::Generator;
pub use orchestrator::{Created, FailureCause, Orchestrator, Outcome, PlanningState};
pub use parser::{ParseFailure, ParsedPlan};
pub use plan::{InputValue, Plan, PlanStep, StepInputs, PLACEHOLDER};
pub use retriever::ScoredTool;
pub use store::{ConversationThread, PlanVersion, ThreadStore};
