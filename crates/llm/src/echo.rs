//! Deterministic offline reasoner.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CancellationToken, GenerateOptions, Reasoner, ReasonerError};

const EXCERPT_CHARS: usize = 80;

/// [`Reasoner`] that answers without a network.
///
/// The reply is the first line of the system prompt followed by an excerpt
/// of the prompt's first non-empty line, so runs are reproducible and the
/// output still shows which descriptor produced it.
#[derive(Debug, Clone, Default)]
pub struct EchoReasoner {
    latency: Duration,
}

impl EchoReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every reply by `latency`, abandoning the wait on cancellation.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    fn reply(prompt: &str, options: &GenerateOptions) -> String {
        let head = options.system_prompt.lines().next().unwrap_or_default();
        let excerpt: String = prompt
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .chars()
            .take(EXCERPT_CHARS)
            .collect();
        format!("[{head}] {excerpt}")
    }
}

#[async_trait]
impl Reasoner for EchoReasoner {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ReasonerError> {
        if cancel.is_cancelled() {
            return Err(ReasonerError::Cancelled);
        }
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReasonerError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }
        Ok(Self::reply(prompt, options))
    }
}
