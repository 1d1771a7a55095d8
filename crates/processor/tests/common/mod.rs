//! Test doubles for the Reasoner and Clock ports.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{
    prompts::DESCRIPTOR_LINE_PREFIX, CancellationToken, Clock, ClockReading, ClockStep, Envelope,
    GatingState, GenerateOptions, Reasoner, ReasonerError,
};
use processor::{PayloadProcessor, ProcessorConfig};
use tokio::sync::{mpsc, watch};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// One recorded Reasoner call.
#[derive(Debug, Clone)]
pub struct Call {
    pub system_prompt: String,
    pub prompt: String,
    pub max_output_tokens: u32,
}

impl Call {
    pub fn is_integration(&self) -> bool {
        !self.system_prompt.starts_with(DESCRIPTOR_LINE_PREFIX)
    }
}

/// Answers branch calls with `<descriptor>:<content>` and Integration calls
/// with `integrated`. Optionally fails any call whose prompt contains
/// `fail_marker`, panics on Integration calls when `panic_on_integration`
/// is set, and waits for `gate` to open before answering.
pub struct EchoReasoner {
    calls: Mutex<Vec<Call>>,
    fail_marker: Option<String>,
    fail_integration_only: bool,
    panic_on_integration: bool,
    gate: Option<watch::Receiver<bool>>,
}

impl EchoReasoner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None, false, None))
    }

    /// Fails every call whose prompt contains `marker`.
    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(marker.to_owned()), false, None))
    }

    /// Fails only Integration calls whose prompt contains `marker`.
    pub fn failing_integration_on(marker: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(marker.to_owned()), true, None))
    }

    /// Holds every call until the returned sender publishes `true`.
    pub fn gated() -> (Arc<Self>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Arc::new(Self::build(None, false, Some(rx))), tx)
    }

    /// Answers branch calls normally and panics on every Integration call.
    pub fn panicking_on_integration() -> Arc<Self> {
        let mut reasoner = Self::build(None, false, None);
        reasoner.panic_on_integration = true;
        Arc::new(reasoner)
    }

    fn build(
        fail_marker: Option<String>,
        fail_integration_only: bool,
        gate: Option<watch::Receiver<bool>>,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker,
            fail_integration_only,
            panic_on_integration: false,
            gate,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn integration_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_integration)
            .collect()
    }
}

#[async_trait]
impl Reasoner for EchoReasoner {
    async fn generate(
        &self,
        _cancel: &CancellationToken,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ReasonerError> {
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }

        let call = Call {
            system_prompt: options.system_prompt.clone(),
            prompt: prompt.to_owned(),
            max_output_tokens: options.max_output_tokens,
        };
        let integration = call.is_integration();
        self.calls.lock().push(call);

        if integration && self.panic_on_integration {
            panic!("integration reasoner crashed");
        }

        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) && (integration || !self.fail_integration_only) {
                return Err(ReasonerError::failed(format!("prompt contained {marker}")));
            }
        }

        if integration {
            return Ok("integrated".to_owned());
        }
        let descriptor = options
            .system_prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(DESCRIPTOR_LINE_PREFIX))
            .unwrap_or_default();
        let content = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Content: "))
            .unwrap_or(prompt);
        Ok(format!("{descriptor}:{content}"))
    }
}

/// Returns a fixed reading and counts how often each method is called.
pub struct CountingClock {
    reading: ClockReading,
    state_reads: AtomicUsize,
    step_reads: AtomicUsize,
}

impl CountingClock {
    pub fn new(step: u32, hold_a: bool, hold_b: bool) -> Arc<Self> {
        Arc::new(Self {
            reading: ClockReading {
                step: ClockStep::new(step),
                gating: GatingState::new(hold_a, hold_b),
            },
            state_reads: AtomicUsize::new(0),
            step_reads: AtomicUsize::new(0),
        })
    }

    pub fn state_reads(&self) -> usize {
        self.state_reads.load(Ordering::SeqCst)
    }

    pub fn step_reads(&self) -> usize {
        self.step_reads.load(Ordering::SeqCst)
    }
}

impl Clock for CountingClock {
    fn current_state(&self) -> ClockReading {
        self.state_reads.fetch_add(1, Ordering::SeqCst);
        self.reading
    }

    fn current_step(&self) -> ClockStep {
        self.step_reads.fetch_add(1, Ordering::SeqCst);
        self.reading.step
    }
}

/// Builds a processor over the given doubles.
pub fn build_processor(
    config: ProcessorConfig,
    reasoner: Arc<EchoReasoner>,
    clock: Arc<CountingClock>,
) -> PayloadProcessor {
    PayloadProcessor::new(config, reasoner, clock).expect("valid config")
}

/// Waits for the next emitted envelope.
pub async fn next_output(output: &mut mpsc::Receiver<Envelope>) -> Envelope {
    tokio::time::timeout(TIMEOUT, output.recv())
        .await
        .expect("timed out waiting for output")
        .expect("output queue closed")
}

/// Polls `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
