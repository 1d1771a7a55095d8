//! Pipeline controller: bounded queues, dispatch loop, and lifecycle.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use pipeline::{
    BranchKind, CancellationSource, CancellationToken, Clock, Envelope, EnvelopeFactory,
    EnvelopeId, Graph, MetricsSnapshot, ProcessingError, ProcessorError, Reasoner, Token,
    TokenKind,
};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    registry::InFlightRegistry,
    stages::StageRunner,
    workers::{self, BranchJob, BranchOutcome, BranchQueues, PendingWorkers},
    MetricsAggregator, ProcessorConfig,
};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

enum Lifecycle {
    /// Created; queues accept work but nothing drains them yet.
    Idle {
        input: mpsc::Receiver<Envelope>,
        workers: PendingWorkers,
    },
    Running {
        tasks: Vec<JoinHandle<()>>,
    },
    /// Cancellation has fired. Terminal.
    Stopped,
}

/// State shared with every envelope task.
struct Shared {
    clock: Arc<dyn Clock>,
    runner: StageRunner,
    metrics: MetricsAggregator,
    registry: InFlightRegistry,
    limiter: Arc<Semaphore>,
    output: mpsc::Sender<Envelope>,
}

// ---------------------------------------------------------------------------
// PayloadProcessor
// ---------------------------------------------------------------------------

/// The pipeline controller.
///
/// Accepts envelopes on a bounded input queue, processes up to
/// `max_in_flight` of them concurrently, and emits each one, enriched, on a
/// bounded output queue. Output order is not submission order.
///
/// # Lifecycle
///
/// `new` → [`start`](Self::start) → [`stop`](Self::stop). Once stopped, a
/// processor cannot be restarted. [`stop`](Self::stop) does not wait for
/// in-flight envelopes; their branch tasks run to completion and the
/// envelopes are still emitted if the output receiver is alive.
///
/// [`start`](Self::start) must be called from within a Tokio runtime.
pub struct PayloadProcessor {
    config: ProcessorConfig,
    shared: Arc<Shared>,
    reasoner: Arc<dyn Reasoner>,
    factory: EnvelopeFactory,
    input: mpsc::Sender<Envelope>,
    output: Mutex<Option<mpsc::Receiver<Envelope>>>,
    branch_queues: BranchQueues,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationSource,
}

impl PayloadProcessor {
    /// Creates a processor. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: ProcessorConfig,
        reasoner: Arc<dyn Reasoner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;

        let cancel = CancellationSource::new();
        let (input_tx, input_rx) = mpsc::channel(config.input_capacity);
        let (output_tx, output_rx) = mpsc::channel(config.output_capacity);
        let (branch_queues, workers) = workers::queues(config.branch_queue_capacity);

        let shared = Arc::new(Shared {
            clock,
            runner: StageRunner::new(Arc::clone(&reasoner), cancel.token(), config.batch_policy),
            metrics: MetricsAggregator::new(),
            registry: InFlightRegistry::new(),
            limiter: Arc::new(Semaphore::new(config.max_in_flight)),
            output: output_tx,
        });

        Ok(Self {
            config,
            shared,
            reasoner,
            factory: EnvelopeFactory::new(),
            input: input_tx,
            output: Mutex::new(Some(output_rx)),
            branch_queues,
            lifecycle: Mutex::new(Lifecycle::Idle {
                input: input_rx,
                workers,
            }),
            cancel,
        })
    }

    /// Launches the dispatch loop and the stage workers.
    pub fn start(&self) -> Result<(), ProcessorError> {
        let mut lifecycle = self.lifecycle.lock();
        let (input, workers) = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle { input, workers } => (input, workers),
            running @ Lifecycle::Running { .. } => {
                *lifecycle = running;
                return Err(ProcessorError::AlreadyRunning);
            }
            Lifecycle::Stopped => return Err(ProcessorError::Stopped),
        };

        let token = self.cancel.token();
        let mut tasks = workers.spawn(&self.reasoner, &token);
        tasks.push(tokio::spawn(dispatch_loop(
            Arc::clone(&self.shared),
            input,
            token,
        )));
        *lifecycle = Lifecycle::Running { tasks };

        info!(
            input_capacity = self.config.input_capacity,
            output_capacity = self.config.output_capacity,
            max_in_flight = self.config.max_in_flight,
            batch_policy = ?self.config.batch_policy,
            "payload processor started"
        );
        Ok(())
    }

    /// Signals cancellation and returns without waiting for in-flight work.
    pub fn stop(&self) -> Result<(), ProcessorError> {
        let mut lifecycle = self.lifecycle.lock();
        let tasks = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { tasks } => tasks,
            other => {
                *lifecycle = other;
                return Err(ProcessorError::NotRunning);
            }
        };
        self.cancel.cancel();
        // Dropping the handles detaches the loops; each exits on the signal.
        debug!(tasks = tasks.len(), "detaching background loops");
        drop(tasks);
        info!(in_flight = self.shared.registry.len(), "payload processor stopped");
        Ok(())
    }

    /// Returns `true` between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Queues `envelope` without blocking.
    pub fn submit(&self, envelope: Envelope) -> Result<(), ProcessorError> {
        if self.cancel.is_cancelled() {
            return Err(ProcessorError::Stopped);
        }
        self.input.try_send(envelope).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ProcessorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ProcessorError::Stopped,
        })?;
        debug!("envelope queued");
        Ok(())
    }

    /// Wraps a new token in an envelope and submits it.
    ///
    /// Returns a copy of the envelope as submitted.
    pub fn submit_token(
        &self,
        text: impl Into<String>,
        kind: TokenKind,
        source: impl Into<String>,
        priority: i32,
    ) -> Result<Envelope, ProcessorError> {
        let token = self.factory.create_token(text, kind, source);
        let envelope = self.factory.create_envelope(token, priority);
        self.submit(envelope.clone())?;
        Ok(envelope)
    }

    /// Wraps `graph` in an envelope and submits it.
    ///
    /// Returns a copy of the envelope as submitted.
    pub fn submit_graph(&self, graph: Graph, priority: i32) -> Result<Envelope, ProcessorError> {
        let envelope = self.factory.create_envelope(graph, priority);
        self.submit(envelope.clone())?;
        Ok(envelope)
    }

    /// Runs branch `index` of `stage` for `token` on its stage worker.
    ///
    /// Non-blocking; the outcome arrives on the returned receiver once the
    /// processor is running. The receiver errors if the processor stops
    /// before the job runs.
    pub fn submit_branch(
        &self,
        stage: BranchKind,
        index: usize,
        token: Token,
    ) -> Result<oneshot::Receiver<BranchOutcome>, ProcessorError> {
        let sender = self.branch_queues.sender(stage, index)?;
        if self.cancel.is_cancelled() {
            return Err(ProcessorError::Stopped);
        }
        let (reply, outcome) = oneshot::channel();
        sender
            .try_send(BranchJob { token, reply })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => ProcessorError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ProcessorError::Stopped,
            })?;
        Ok(outcome)
    }

    /// Takes the read side of the output queue. Returns `None` after the
    /// first call.
    pub fn take_output(&self) -> Option<mpsc::Receiver<Envelope>> {
        self.output.lock().take()
    }

    /// Copy of the aggregate metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Number of envelopes currently being processed.
    pub fn in_flight_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns `true` while an envelope with `id` is being processed.
    pub fn is_in_flight(&self, id: &EnvelopeId) -> bool {
        self.shared.registry.contains(id)
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The factory used by [`submit_token`](Self::submit_token) and
    /// [`submit_graph`](Self::submit_graph).
    pub fn factory(&self) -> &EnvelopeFactory {
        &self.factory
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch_loop(
    shared: Arc<Shared>,
    mut input: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = input.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(envelope_id = %envelope.id(), "discarding envelope queued before stop");
                break;
            }
            permit = Arc::clone(&shared.limiter).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        tokio::spawn(Arc::clone(&shared).process(envelope, permit));
    }
    debug!("dispatch loop stopped");
}

impl Shared {
    #[instrument(skip_all, fields(envelope_id = %envelope.id(), kind = %envelope.kind()))]
    async fn process(self: Arc<Self>, mut envelope: Envelope, _permit: OwnedSemaphorePermit) {
        let started = Instant::now();
        let reading = self.clock.current_state();

        match self.registry.register(envelope.id()) {
            Some(guard) => {
                self.runner.process_envelope(&mut envelope, reading).await;
                envelope.exit(self.clock.current_step());
                drop(guard);
            }
            None => {
                warn!("envelope already in flight");
                envelope.enter(reading);
                envelope.record_error(
                    "controller",
                    ProcessingError::DuplicateEnvelope {
                        id: envelope.id().clone(),
                    },
                );
                envelope.exit(self.clock.current_step());
            }
        }

        let failed = !envelope.errors().is_empty();
        self.metrics
            .record_processed(envelope.kind(), started.elapsed(), failed);
        debug!(failed, integrated = envelope.is_integrated(), "envelope processed");
        self.emit(envelope);
    }

    fn emit(&self, envelope: Envelope) {
        match self.output.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                warn!(envelope_id = %envelope.id(), "output queue full; envelope dropped");
                self.metrics.record_dropped();
            }
            Err(mpsc::error::TrySendError::Closed(envelope)) => {
                debug!(envelope_id = %envelope.id(), "output receiver gone; envelope dropped");
                self.metrics.record_dropped();
            }
        }
    }
}
