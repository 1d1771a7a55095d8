//! Anthropic Messages API adapter.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CancellationToken, GenerateOptions, Reasoner, ReasonerError};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Value of the `anthropic-version` request header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Largest `max_tokens` the adapter forwards.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Substituted when a call asks for zero or more than [`MAX_OUTPUT_TOKENS`].
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

const ERROR_BODY_LIMIT: usize = 320;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for [`AnthropicReasoner`].
///
/// The API key is not part of this table; it is passed to
/// [`AnthropicReasoner::new`] separately so that configuration files never
/// carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL; `/v1/messages` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// AnthropicReasoner
// ---------------------------------------------------------------------------

/// [`Reasoner`] backed by the Anthropic Messages API.
///
/// Each call is a single non-streaming request. No retries are attempted;
/// failures are classified into [`ReasonerError`] variants so callers can
/// consult [`ReasonerError::retry_policy`]. A call races the cancellation
/// token and returns [`ReasonerError::Cancelled`] if it fires first.
pub struct AnthropicReasoner {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for AnthropicReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicReasoner")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AnthropicReasoner {
    /// Builds the HTTP client.
    ///
    /// A missing or blank `api_key` is accepted here; every call then fails
    /// with [`ReasonerError::NotConfigured`].
    pub fn new(config: &AnthropicConfig, api_key: Option<String>) -> Result<Self, ReasonerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReasonerError::NotConfigured {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Returns `true` when an API key is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        api_key: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ReasonerError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: clamp_max_tokens(options.max_output_tokens),
            temperature: options.temperature,
            system: &options.system_prompt,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasonerError::Unavailable {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(response).await);
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ReasonerError::InvalidResponse {
                    message: e.to_string(),
                })?;
        debug!(stop_reason = ?parsed.stop_reason, blocks = parsed.content.len(), "response received");

        parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(ReasonerError::EmptyResponse)
    }
}

#[async_trait]
impl Reasoner for AnthropicReasoner {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = options.max_output_tokens))]
    async fn generate(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ReasonerError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ReasonerError::NotConfigured {
                message: "missing ANTHROPIC_API_KEY".to_string(),
            })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("call abandoned on cancellation");
                Err(ReasonerError::Cancelled)
            }
            result = self.send(api_key, prompt, options) => result,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clamp_max_tokens(requested: u32) -> u32 {
    if requested == 0 || requested > MAX_OUTPUT_TOKENS {
        DEFAULT_MAX_TOKENS
    } else {
        requested
    }
}

async fn classify_failure(response: reqwest::Response) -> ReasonerError {
    let status = response.status();
    let retry_after = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    let message = truncate(&body, ERROR_BODY_LIMIT);
    warn!(status = status.as_u16(), body = %message, "provider returned an error");

    if status == StatusCode::TOO_MANY_REQUESTS {
        ReasonerError::RateLimited { retry_after }
    } else if status.is_server_error() {
        ReasonerError::Unavailable {
            message: format!("status {}: {message}", status.as_u16()),
        }
    } else {
        ReasonerError::Provider {
            status: status.as_u16(),
            message,
        }
    }
}

/// Parses a `retry-after` header given in (possibly fractional) seconds.
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tokens_within_range_pass_through() {
        assert_eq!(clamp_max_tokens(150), 150);
        assert_eq!(clamp_max_tokens(MAX_OUTPUT_TOKENS), MAX_OUTPUT_TOKENS);
    }

    #[test]
    fn out_of_range_max_tokens_fall_back_to_default() {
        assert_eq!(clamp_max_tokens(0), DEFAULT_MAX_TOKENS);
        assert_eq!(clamp_max_tokens(MAX_OUTPUT_TOKENS + 1), DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn retry_after_accepts_whole_and_fractional_seconds() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("0.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(500)));

        headers.insert(
            header::RETRY_AFTER,
            header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn config_defaults_fill_missing_keys() {
        let config: AnthropicConfig = toml::from_str(r#"model = "custom""#).unwrap();
        assert_eq!(config.model, "custom");
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let reasoner =
            AnthropicReasoner::new(&AnthropicConfig::default(), Some("sk-secret".into())).unwrap();
        let rendered = format!("{reasoner:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let reasoner =
            AnthropicReasoner::new(&AnthropicConfig::default(), Some("  ".into())).unwrap();
        assert!(!reasoner.is_configured());
    }
}
