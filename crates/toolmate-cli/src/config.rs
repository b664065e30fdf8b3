//! Application configuration (`config/default.toml`).
//!
//! Every section and field is optional; whatever the file leaves out falls
//! back to the defaults below.  Environment overrides for the model provider
//! are applied later, in [`crate::helpers::resolve_llm_config`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use toolmate_planner::PlannerConfig;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const DEFAULT_CATALOG_PATH: &str = "data/function_tools.json";
const DEFAULT_SAMPLES_PATH: &str = "data/sample_prompts.txt";

/// The full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub planner: PlannerConfig,
    pub llm: LlmSection,
    pub catalog: CatalogSection,
    pub logging: LoggingSection,
}

/// `[llm]`: which model backend to call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Provider name; auto-detected from available API keys when unset.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
}

/// `[catalog]`: where the tool catalog and sample requests live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub path: PathBuf,
    pub samples: PathBuf,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_PATH),
            samples: PathBuf::from(DEFAULT_SAMPLES_PATH),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
        }
    }
}

/// A loaded configuration and the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("invalid configuration")?;
        config
            .planner
            .validate()
            .context("invalid [planner] section")?;
        Ok(config)
    }

    /// Load `explicit`, or the default path if it exists.
    ///
    /// An explicitly named file must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(LoadedConfig {
                        config: Self::default(),
                        source: None,
                    });
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        Ok(LoadedConfig {
            config,
            source: Some(path),
        })
    }
}
