//! File configuration for the `fanfold` binary.
//!
//! ```toml
//! [processor]
//! max_in_flight = 8
//!
//! [reasoner]
//! kind = "anthropic"
//! model = "claude-3-5-sonnet-20241022"
//!
//! [clock]
//! tick_ms = 250
//!
//! [telemetry]
//! format = "json"
//! otlp_endpoint = "http://localhost:4317"
//! ```
//!
//! Every table and key is optional. The Anthropic API key is read from
//! `ANTHROPIC_API_KEY` only.

use std::path::Path;

use anyhow::Context;
use llm::AnthropicConfig;
use processor::ProcessorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub reasoner: ReasonerSettings,
    #[serde(default)]
    pub clock: ClockSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl CliConfig {
    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.processor.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// [reasoner]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerKind {
    /// Offline, deterministic replies.
    #[default]
    Echo,
    /// Anthropic Messages API.
    Anthropic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonerSettings {
    #[serde(default)]
    pub kind: ReasonerKind,

    /// Artificial delay for the echo reasoner, in milliseconds.
    #[serde(default)]
    pub echo_latency_ms: u64,

    #[serde(flatten)]
    pub anthropic: AnthropicConfig,
}

// ---------------------------------------------------------------------------
// [clock]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Interval between step advances.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 {
    100
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// [telemetry]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub format: LogFormat,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// OTLP gRPC endpoint. Spans are exported only when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "fanfold".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}
