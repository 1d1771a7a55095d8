//! Fanfold CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration** from an optional TOML file, then apply
//!    command-line overrides.
//! 2. **Wire observability**: `tracing-subscriber` (human or JSON) with an
//!    optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: the Reasoner adapter and the step clock,
//!    injected into a [`processor::PayloadProcessor`].
//! 4. **Run**: each stdin line becomes a submission; every emitted envelope
//!    is written to stdout as one JSON line. Final metrics go to stderr.
//!
//! A stdin line starting with `{` is parsed as a complete envelope (which is
//! how graphs and batches are submitted); any other line becomes a token.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use config::{CliConfig, LogFormat, ReasonerKind};
use llm::{AnthropicReasoner, EchoReasoner};
use pipeline::{CancellationSource, Envelope, ProcessorError, Reasoner, TokenKind};
use processor::{PayloadProcessor, StepClock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const SUBMIT_RETRY: Duration = Duration::from_millis(20);

#[derive(Debug, Parser)]
#[command(name = "fanfold", version, about = "Fan-out/fold payload pipeline")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "FANFOLD_CONFIG")]
    config: Option<PathBuf>,

    /// Reasoner backend.
    #[arg(long, value_enum)]
    reasoner: Option<ReasonerKind>,

    /// Token kind assigned to plain-text lines.
    #[arg(long, default_value = "thought", value_parser = parse_token_kind)]
    token_kind: TokenKind,

    /// Source label recorded on submitted tokens.
    #[arg(long, default_value = "stdin")]
    source: String,

    /// Envelope priority for plain-text lines.
    #[arg(long, default_value_t = 0)]
    priority: i32,

    /// Clock step period in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Maximum envelopes processed concurrently.
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// OTLP gRPC endpoint for span export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,
}

fn parse_token_kind(raw: &str) -> Result<TokenKind, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| format!("unknown token kind '{raw}'"))
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<CliConfig> {
        let mut config = match &self.config {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };
        if let Some(kind) = self.reasoner {
            config.reasoner.kind = kind;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.clock.tick_ms = tick_ms;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.processor.max_in_flight = max_in_flight;
        }
        if let Some(format) = self.log_format {
            config.telemetry.format = format;
        }
        if self.otlp_endpoint.is_some() {
            config.telemetry.otlp_endpoint = self.otlp_endpoint.clone();
        }
        if config.clock.tick_ms == 0 {
            bail!("tick_ms must be greater than zero");
        }
        config.processor.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let _telemetry = telemetry::init(&config.telemetry)?;

    let reasoner = build_reasoner(&cli, &config)?;
    let clock = Arc::new(StepClock::new());
    let ticker_cancel = CancellationSource::new();
    let ticker = Arc::clone(&clock).spawn_ticker(
        Duration::from_millis(config.clock.tick_ms),
        ticker_cancel.token(),
    );

    let processor = PayloadProcessor::new(config.processor.clone(), reasoner, clock)
        .context("failed to create processor")?;
    let output = processor
        .take_output()
        .context("output receiver already taken")?;
    let printer = tokio::spawn(print_envelopes(output));
    processor.start()?;

    let submitted = tokio::select! {
        result = submit_lines(&processor, &cli) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted while reading input");
            0
        }
    };
    info!(submitted, "input exhausted; waiting for results");

    tokio::select! {
        _ = drain(&processor, submitted) => {}
        _ = tokio::signal::ctrl_c() => warn!("interrupted while waiting for results"),
    }

    let metrics = processor.metrics();
    if let Err(err) = processor.stop() {
        warn!(error = %err, "processor did not stop cleanly");
    }
    ticker_cancel.cancel();
    // Dropping the processor closes the output queue, which ends the printer.
    drop(processor);
    let printed = printer.await.context("output printer panicked")??;
    let _ = ticker.await;

    eprintln!("{}", serde_json::to_string_pretty(&metrics)?);
    info!(submitted, printed, dropped = metrics.outputs_dropped, "done");
    Ok(())
}

fn build_reasoner(cli: &Cli, config: &CliConfig) -> anyhow::Result<Arc<dyn Reasoner>> {
    let reasoner: Arc<dyn Reasoner> = match config.reasoner.kind {
        ReasonerKind::Echo => Arc::new(EchoReasoner::with_latency(Duration::from_millis(
            config.reasoner.echo_latency_ms,
        ))),
        ReasonerKind::Anthropic => {
            let reasoner =
                AnthropicReasoner::new(&config.reasoner.anthropic, cli.anthropic_api_key.clone())?;
            if !reasoner.is_configured() {
                bail!("the anthropic reasoner requires ANTHROPIC_API_KEY");
            }
            info!(model = reasoner.model(), "using anthropic reasoner");
            Arc::new(reasoner)
        }
    };
    Ok(reasoner)
}

/// Submits every stdin line and returns how many envelopes were accepted.
async fn submit_lines(processor: &PayloadProcessor, cli: &Cli) -> anyhow::Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope = if line.starts_with('{') {
            match Envelope::from_json(line) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, "skipping malformed envelope line");
                    continue;
                }
            }
        } else {
            let factory = processor.factory();
            let token = factory.create_token(line, cli.token_kind, cli.source.as_str());
            factory.create_envelope(token, cli.priority)
        };

        submit_with_backpressure(processor, envelope).await?;
        submitted += 1;
    }
    Ok(submitted)
}

async fn submit_with_backpressure(
    processor: &PayloadProcessor,
    envelope: Envelope,
) -> Result<(), ProcessorError> {
    loop {
        match processor.submit(envelope.clone()) {
            Err(ProcessorError::QueueFull) => tokio::time::sleep(SUBMIT_RETRY).await,
            other => return other,
        }
    }
}

/// Waits until every submitted envelope has left the pipeline.
async fn drain(processor: &PayloadProcessor, submitted: u64) {
    while processor.metrics().total_processed() < submitted {
        tokio::time::sleep(SUBMIT_RETRY).await;
    }
}

async fn print_envelopes(mut output: mpsc::Receiver<Envelope>) -> anyhow::Result<u64> {
    let mut stdout = tokio::io::stdout();
    let mut printed = 0;
    while let Some(envelope) = output.recv().await {
        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        printed += 1;
    }
    stdout.flush().await?;
    Ok(printed)
}
