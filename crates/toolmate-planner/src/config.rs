//! Planner configuration.
//!
//! Usually embedded as the `[planner]` table of the application config file,
//! but can also be decoded on its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

/// Number of candidate tools handed to the prompt by default.
pub const DEFAULT_TOP_N: usize = 12;

/// What to do with a plan step naming a tool outside the candidate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownToolPolicy {
    /// Reject the whole response as a parse failure.
    Reject,
    /// Accept the plan and list the names on the version for display.
    #[default]
    Flag,
}

impl fmt::Display for UnknownToolPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => f.write_str("reject"),
            Self::Flag => f.write_str("flag"),
        }
    }
}

impl FromStr for UnknownToolPolicy {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "flag" => Ok(Self::Flag),
            other => Err(PlannerError::Config {
                reason: format!("unknown tool policy `{other}` (expected `reject` or `flag`)"),
            }),
        }
    }
}

/// Tunables of the planning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of candidate tools per request.
    pub top_n: usize,

    pub unknown_tool_policy: UnknownToolPolicy,

    /// Worked example for initial prompts; the built-in one when unset.
    pub example: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            unknown_tool_policy: UnknownToolPolicy::default(),
            example: None,
        }
    }
}

impl PlannerConfig {
    /// Decode from a TOML document holding the planner fields at top level.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| PlannerError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(PlannerError::Config {
                reason: "`top_n` must be at least 1".into(),
            });
        }
        Ok(())
    }
}
