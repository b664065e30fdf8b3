//! Multi-provider completion client.
//!
//! Speaks the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API**.  Google Gemini, OpenRouter and Ollama are reached through their
//! OpenAI-compatible endpoints.  Requests are single-turn and non-streaming:
//! one user message in, the concatenated text content out.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use toolmate_planner::Generator;

use crate::error::{LlmError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Which provider the client targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAI,
    Google,
    OpenRouter,
    Ollama,
    /// Any other endpoint speaking the OpenAI Chat Completions API.
    OpenAICompatible,
}

impl LlmProvider {
    pub fn name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Google => "google",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai-compatible",
        }
    }

    /// Whether requests go to the Anthropic Messages API.
    pub fn is_anthropic(self) -> bool {
        matches!(self, Self::Anthropic)
    }

    /// Local Ollama servers accept unauthenticated requests.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Model used when configuration names none.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAI | Self::OpenAICompatible => "gpt-4o-mini",
            Self::Google => "gemini-2.0-flash",
            Self::OpenRouter => "google/gemini-2.0-flash-001",
            Self::Ollama => "llama3.1",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            "google" | "gemini" => Ok(Self::Google),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            "openai-compatible" | "compatible" => Ok(Self::OpenAICompatible),
            other => Err(LlmError::UnknownProvider {
                name: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Sampling temperature; the provider default when unset.
    pub temperature: Option<f32>,
    /// Whole-request timeout of the HTTP client.
    pub timeout: Duration,
}

impl LlmClientConfig {
    fn with_base(
        provider: LlmProvider,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base(LlmProvider::Anthropic, api_key, model, ANTHROPIC_BASE_URL)
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base(LlmProvider::OpenAI, api_key, model, OPENAI_BASE_URL)
    }

    /// Any OpenAI-compatible API (Together, vLLM, LM Studio, ...).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::with_base(LlmProvider::OpenAICompatible, api_key, model, base_url)
    }

    /// Google Gemini through its OpenAI-compatible endpoint.
    pub fn google(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base(LlmProvider::Google, api_key, model, GOOGLE_BASE_URL)
    }

    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base(LlmProvider::OpenRouter, api_key, model, OPENROUTER_BASE_URL)
    }

    /// A local Ollama server; `base_url` defaults to `localhost:11434`.
    pub fn ollama(model: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| OLLAMA_BASE_URL.to_owned());
        Self::with_base(LlmProvider::Ollama, "", model, base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A completion client for one provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: Arc<LlmClientConfig>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client, rejecting a missing API key.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.provider.requires_api_key() && config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: config.provider.name().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send `prompt` as a single user message and return the text answer.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let (url, headers, body) = if self.config.provider.is_anthropic() {
            (
                format!("{}/v1/messages", self.base()),
                self.anthropic_headers()?,
                self.build_anthropic_request_body(prompt),
            )
        } else {
            (
                format!("{}/chat/completions", self.base()),
                self.openai_headers()?,
                self.build_openai_request_body(prompt),
            )
        };

        tracing::debug!(
            url = %url,
            model = %self.config.model,
            provider = self.config.provider.name(),
            prompt_chars = prompt.len(),
            "sending completion request"
        );

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| LlmError::ResponseParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        let content = if self.config.provider.is_anthropic() {
            parse_anthropic_response(&v)?
        } else {
            parse_openai_response(&v)?
        };

        if content.trim().is_empty() {
            return Err(LlmError::EmptyCompletion {
                provider: self.config.provider.name().into(),
            });
        }

        tracing::debug!(
            status = %status,
            response_chars = content.len(),
            "completion received"
        );
        Ok(content)
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    // -- Anthropic -----------------------------------------------------------

    fn build_anthropic_request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn anthropic_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| LlmError::RequestFailed {
                reason: format!("invalid API key header: {e}"),
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // -- OpenAI and compatible -----------------------------------------------

    fn build_openai_request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !self.config.api_key.is_empty() {
            let auth_value = format!("Bearer {}", self.config.api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value).map_err(|e| LlmError::RequestFailed {
                    reason: format!("invalid authorization header: {e}"),
                })?,
            );
        }
        if self.config.provider == LlmProvider::OpenRouter {
            headers.insert("X-Title", HeaderValue::from_static("Toolmate"));
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, prompt: &str) -> toolmate_planner::Result<String> {
        self.complete(prompt).await.map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Concatenate the `text` blocks of an Anthropic Messages response.
pub fn parse_anthropic_response(v: &Value) -> Result<String> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    Ok(content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect())
}

/// Extract `choices[0].message.content` from a Chat Completions response.
pub fn parse_openai_response(v: &Value) -> Result<String> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        return Err(LlmError::ResponseParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    match &message["content"] {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        // Some compatible servers return content as a list of parts.
        Value::Array(parts) => Ok(parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect()),
        other => Err(LlmError::ResponseParseFailed {
            reason: format!("unexpected `content` type in response: {other}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_returns_error() {
        let result = LlmClient::new(LlmClientConfig::anthropic("", "claude"));
        assert!(matches!(
            result,
            Err(LlmError::MissingApiKey { provider }) if provider == "anthropic"
        ));
        assert!(LlmClient::new(LlmClientConfig::google("  ", "gemini-2.0-flash")).is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let client = LlmClient::new(LlmClientConfig::ollama("llama3.1", None)).unwrap();
        assert_eq!(client.provider(), LlmProvider::Ollama);
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn constructors_set_base_urls() {
        assert_eq!(
            LlmClientConfig::google("k", "m").base_url,
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(
            LlmClientConfig::openrouter("k", "m").base_url,
            "https://openrouter.ai/api/v1"
        );
        let custom = LlmClientConfig::openai_compatible("k", "m", "http://localhost:8000/v1");
        assert_eq!(custom.provider, LlmProvider::OpenAICompatible);
        assert_eq!(custom.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn anthropic_request_body() {
        let client = LlmClient::new(
            LlmClientConfig::anthropic("sk-test", "claude-sonnet-4-20250514")
                .with_max_tokens(512)
                .with_temperature(0.0),
        )
        .unwrap();
        let body = client.build_anthropic_request_body("plan this");
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "plan this");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn openai_request_body_omits_unset_temperature() {
        let client = LlmClient::new(LlmClientConfig::openai("sk-test", "gpt-4o-mini")).unwrap();
        let body = client.build_openai_request_body("plan this");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("temperature").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn headers_per_provider() {
        let anthropic = LlmClient::new(LlmClientConfig::anthropic("sk-a", "m")).unwrap();
        let headers = anthropic.anthropic_headers().unwrap();
        assert_eq!(headers["x-api-key"], "sk-a");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);

        let openrouter = LlmClient::new(LlmClientConfig::openrouter("sk-o", "m")).unwrap();
        let headers = openrouter.openai_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-o");
        assert_eq!(headers["X-Title"], "Toolmate");

        let ollama = LlmClient::new(LlmClientConfig::ollama("m", None)).unwrap();
        assert!(ollama.openai_headers().unwrap().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn parse_anthropic_text_blocks() {
        let v = json!({
            "content": [
                {"type": "text", "text": "[{\"function\":"},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "\"a\"}]"}
            ]
        });
        assert_eq!(parse_anthropic_response(&v).unwrap(), r#"[{"function":"a"}]"#);
        assert!(parse_anthropic_response(&json!({"id": "msg"})).is_err());
    }

    #[test]
    fn parse_openai_content_shapes() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "[]"}}]});
        assert_eq!(parse_openai_response(&v).unwrap(), "[]");

        let parts = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "[{\"function\":\"a\"}"},
            {"type": "text", "text": "]"}
        ]}}]});
        assert_eq!(parse_openai_response(&parts).unwrap(), r#"[{"function":"a"}]"#);

        let null = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(parse_openai_response(&null).unwrap(), "");

        assert!(parse_openai_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn provider_names_round_trip() {
        for provider in [
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Google,
            LlmProvider::OpenRouter,
            LlmProvider::Ollama,
            LlmProvider::OpenAICompatible,
        ] {
            assert_eq!(provider.name().parse::<LlmProvider>().unwrap(), provider);
        }
        assert_eq!("Gemini".parse::<LlmProvider>().unwrap(), LlmProvider::Google);
        assert!(matches!(
            "watson".parse::<LlmProvider>(),
            Err(LlmError::UnknownProvider { .. })
        ));
    }
}
