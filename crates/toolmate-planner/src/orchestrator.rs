//! Planning orchestrator: drives one request through retrieval, prompt
//! assembly, generation and parsing, and records the result in a thread.
//!
//! Every request ends in exactly one terminal [`PlanningState`], reported as
//! an [`Outcome`].  Failures of the backend or of its output are outcomes, not
//! errors: the caller decides whether to retry, rephrase or give up.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::config::{PlannerConfig, UnknownToolPolicy};
use crate::error::{PlannerError, Result};
use crate::generator::Generator;
use crate::parser::{self, ParsedPlan};
use crate::prompt;
use crate::retriever;
use crate::store::{ConversationThread, PlanVersion};

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Every state a planning request passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanningState {
    Start,
    Retrieving,
    Assembling,
    AwaitingBackend,
    Parsing,
    Applied,
    RejectedNoTools,
    RejectedParseFailure,
    RejectedEmptyPlan,
}

impl PlanningState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Applied
                | Self::RejectedNoTools
                | Self::RejectedParseFailure
                | Self::RejectedEmptyPlan
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Retrieving => "RETRIEVING",
            Self::Assembling => "ASSEMBLING",
            Self::AwaitingBackend => "AWAITING_BACKEND",
            Self::Parsing => "PARSING",
            Self::Applied => "APPLIED",
            Self::RejectedNoTools => "REJECTED_NO_TOOLS",
            Self::RejectedParseFailure => "REJECTED_PARSE_FAILURE",
            Self::RejectedEmptyPlan => "REJECTED_EMPTY_PLAN",
        }
    }
}

impl fmt::Display for PlanningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request ended in [`PlanningState::RejectedParseFailure`].
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// The backend call itself failed.
    Backend { reason: String },
    /// The backend answered, but no valid plan could be recovered.
    Unparsable { reason: String, raw: String },
    /// The plan names tools outside the candidate set and the policy rejects
    /// such plans.
    UnknownTools { names: Vec<String>, raw: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { reason } => write!(f, "generation backend failed: {reason}"),
            Self::Unparsable { reason, .. } => write!(f, "unparsable plan: {reason}"),
            Self::UnknownTools { names, .. } => {
                write!(f, "plan references unknown tools: {}", names.join(", "))
            }
        }
    }
}

/// The terminal result of a planning request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A non-empty plan was appended to the thread.
    Applied(PlanVersion),
    /// The backend judged the request infeasible; the empty plan was still
    /// appended.
    RejectedEmptyPlan(PlanVersion),
    /// Retrieval found no relevant tool; the backend was not called.
    RejectedNoTools,
    /// The backend failed or its answer was rejected; nothing was recorded.
    RejectedParseFailure(FailureCause),
}

impl Outcome {
    pub fn state(&self) -> PlanningState {
        match self {
            Self::Applied(_) => PlanningState::Applied,
            Self::RejectedEmptyPlan(_) => PlanningState::RejectedEmptyPlan,
            Self::RejectedNoTools => PlanningState::RejectedNoTools,
            Self::RejectedParseFailure(_) => PlanningState::RejectedParseFailure,
        }
    }

    /// The recorded version, if the request produced one.
    pub fn version(&self) -> Option<&PlanVersion> {
        match self {
            Self::Applied(v) | Self::RejectedEmptyPlan(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to a `Result` for callers that treat rejections as errors.
    ///
    /// An empty plan is a successful answer and converts to `Ok`.
    pub fn into_result(self, query: &str) -> Result<PlanVersion> {
        match self {
            Self::Applied(v) | Self::RejectedEmptyPlan(v) => Ok(v),
            Self::RejectedNoTools => Err(PlannerError::NoCandidateTools {
                query: query.to_owned(),
            }),
            Self::RejectedParseFailure(FailureCause::Backend { reason }) => {
                Err(PlannerError::BackendFailure { reason })
            }
            Self::RejectedParseFailure(FailureCause::Unparsable { reason, raw }) => {
                Err(PlannerError::UnparsablePlan { reason, raw })
            }
            Self::RejectedParseFailure(FailureCause::UnknownTools { names, .. }) => {
                Err(PlannerError::UnknownTools { names })
            }
        }
    }
}

/// Result of [`Orchestrator::create_thread`].
///
/// `thread` is present exactly when the outcome recorded a version.
#[derive(Debug)]
pub struct Created {
    pub outcome: Outcome,
    pub thread: Option<ConversationThread>,
}

/// A parsed plan and the candidates it was generated from.
enum Draft {
    Ready {
        parsed: ParsedPlan,
        tools: Vec<ToolDescriptor>,
    },
    Rejected(Outcome),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes retrieval, assembly, generation, parsing and version recording.
///
/// Holds no per-thread state: threads are passed in by the caller, so one
/// orchestrator can serve any number of independent conversations.
pub struct Orchestrator<G> {
    catalog: Arc<ToolCatalog>,
    generator: G,
    config: PlannerConfig,
}

impl<G: Generator> Orchestrator<G> {
    pub fn new(catalog: Arc<ToolCatalog>, generator: G, config: PlannerConfig) -> Self {
        Self {
            catalog,
            generator,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Plan a fresh request, creating a thread when a version is recorded.
    pub async fn create_thread(&self, query: &str) -> Created {
        let query = query.trim();
        transition(PlanningState::Start, PlanningState::Retrieving);
        if query.is_empty() {
            return Created {
                outcome: reject_empty_input("query"),
                thread: None,
            };
        }

        let example = self.config.example.as_deref();
        let draft = self
            .draft(query, |tools| prompt::build_initial(query, tools, example))
            .await;

        match draft {
            Draft::Rejected(outcome) => Created {
                outcome,
                thread: None,
            },
            Draft::Ready { parsed, tools } => {
                let thread =
                    ConversationThread::new(query, parsed.plan, parsed.reasoning, tools);
                let outcome = settle(thread.current().clone());
                info!(
                    thread_id = %thread.id(),
                    state = %outcome.state(),
                    "planning request finished"
                );
                Created {
                    outcome,
                    thread: Some(thread),
                }
            }
        }
    }

    /// Revise the active version of `thread` according to `instruction`.
    ///
    /// On success the new version is appended and becomes active; on any
    /// rejection the thread is left untouched.
    pub async fn update_thread(
        &self,
        thread: &mut ConversationThread,
        instruction: &str,
    ) -> Outcome {
        let instruction = instruction.trim();
        transition(PlanningState::Start, PlanningState::Retrieving);
        if instruction.is_empty() {
            return reject_empty_input("update instruction");
        }

        let retrieval_query = format!("{} {}", thread.original_query(), instruction);
        let original_query = thread.original_query().to_owned();
        let current_plan = thread.current().plan.clone();
        let draft = self
            .draft(&retrieval_query, |tools| {
                prompt::build_update(&original_query, &current_plan, instruction, tools)
            })
            .await;

        let outcome = match draft {
            Draft::Rejected(outcome) => outcome,
            Draft::Ready { parsed, tools } => {
                settle(thread.append(parsed.plan, parsed.reasoning, tools).clone())
            }
        };
        info!(
            thread_id = %thread.id(),
            state = %outcome.state(),
            versions = thread.len(),
            "planning request finished"
        );
        outcome
    }

    /// Run retrieval through parsing; nothing is recorded here.
    async fn draft<F>(&self, retrieval_query: &str, assemble: F) -> Draft
    where
        F: FnOnce(&[ToolDescriptor]) -> String,
    {
        let tools = retriever::rank(retrieval_query, self.catalog.tools(), self.config.top_n);
        if tools.is_empty() {
            warn!(query = retrieval_query, "no relevant tools for request");
            transition(PlanningState::Retrieving, PlanningState::RejectedNoTools);
            return Draft::Rejected(Outcome::RejectedNoTools);
        }

        transition(PlanningState::Retrieving, PlanningState::Assembling);
        let prompt_text = assemble(&tools);
        debug!(
            candidates = tools.len(),
            prompt_chars = prompt_text.len(),
            "prompt assembled"
        );

        transition(PlanningState::Assembling, PlanningState::AwaitingBackend);
        let raw = match self.generator.generate(&prompt_text).await {
            Ok(raw) => raw,
            Err(e) => {
                let reason = match e {
                    PlannerError::BackendFailure { reason } => reason,
                    other => other.to_string(),
                };
                warn!(%reason, "generation backend failed");
                transition(
                    PlanningState::AwaitingBackend,
                    PlanningState::RejectedParseFailure,
                );
                return Draft::Rejected(Outcome::RejectedParseFailure(FailureCause::Backend {
                    reason,
                }));
            }
        };

        transition(PlanningState::AwaitingBackend, PlanningState::Parsing);
        let parsed = match parser::parse(&raw) {
            Ok(parsed) => parsed,
            Err(failure) => {
                warn!(reason = %failure.reason, "backend response rejected");
                transition(PlanningState::Parsing, PlanningState::RejectedParseFailure);
                return Draft::Rejected(Outcome::RejectedParseFailure(
                    FailureCause::Unparsable {
                        reason: failure.reason,
                        raw: failure.raw,
                    },
                ));
            }
        };

        let unknown = parsed.plan.unknown_functions(&tools);
        if !unknown.is_empty() {
            match self.config.unknown_tool_policy {
                UnknownToolPolicy::Reject => {
                    warn!(names = ?unknown, "plan rejected: unknown tools");
                    transition(PlanningState::Parsing, PlanningState::RejectedParseFailure);
                    return Draft::Rejected(Outcome::RejectedParseFailure(
                        FailureCause::UnknownTools {
                            names: unknown,
                            raw,
                        },
                    ));
                }
                UnknownToolPolicy::Flag => {
                    warn!(names = ?unknown, "plan accepted with unknown tools flagged");
                }
            }
        }

        Draft::Ready { parsed, tools }
    }
}

/// Map a freshly recorded version to its terminal outcome.
fn settle(version: PlanVersion) -> Outcome {
    if version.plan.is_empty() {
        transition(PlanningState::Parsing, PlanningState::RejectedEmptyPlan);
        Outcome::RejectedEmptyPlan(version)
    } else {
        transition(PlanningState::Parsing, PlanningState::Applied);
        Outcome::Applied(version)
    }
}

fn reject_empty_input(what: &str) -> Outcome {
    warn!("empty {what}; nothing to plan");
    transition(PlanningState::Retrieving, PlanningState::RejectedNoTools);
    Outcome::RejectedNoTools
}

fn transition(from: PlanningState, to: PlanningState) {
    debug!(%from, %to, "planning state transition");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
