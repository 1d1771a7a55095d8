//! Per-envelope orchestration: stage routing, the two fan-out stages,
//! Integration, and batch handling.

use std::sync::Arc;

use pipeline::{
    determine_stage, BranchKind, CancellationToken, ClockReading, Envelope, Payload, PayloadState,
    ProcessingError, Reasoner, StagePhase, Transformation, WorkItem,
};
use tracing::{debug, warn};

use crate::{fanout, integration, BatchPolicy};

/// What happened to one item.
#[derive(Debug)]
pub(crate) struct ItemReport {
    pub branch_a_failed: bool,
    /// `None` when Branch-B never ran.
    pub branch_b_failed: Option<bool>,
    pub result: Result<(), ProcessingError>,
}

/// Runs envelopes through the stages. Cheap to clone.
#[derive(Clone)]
pub(crate) struct StageRunner {
    reasoner: Arc<dyn Reasoner>,
    cancel: CancellationToken,
    batch_policy: BatchPolicy,
}

impl StageRunner {
    pub(crate) fn new(
        reasoner: Arc<dyn Reasoner>,
        cancel: CancellationToken,
        batch_policy: BatchPolicy,
    ) -> Self {
        Self {
            reasoner,
            cancel,
            batch_policy,
        }
    }

    /// Processes `envelope` against the clock reading taken at entry.
    ///
    /// Never fails: every per-item failure ends up in the envelope's error
    /// list.
    pub(crate) async fn process_envelope(&self, envelope: &mut Envelope, reading: ClockReading) {
        match envelope.payload_mut() {
            Payload::TokenBatch(tokens) => {
                let tokens = std::mem::take(tokens);
                let tokens = self
                    .process_batch(envelope, tokens, reading, |p| match p {
                        Payload::Token(t) => Some(t),
                        _ => None,
                    })
                    .await;
                *envelope.payload_mut() = Payload::TokenBatch(tokens);
            }
            Payload::GraphBatch(graphs) => {
                let graphs = std::mem::take(graphs);
                let graphs = self
                    .process_batch(envelope, graphs, reading, |p| match p {
                        Payload::Graph(g) => Some(g),
                        _ => None,
                    })
                    .await;
                *envelope.payload_mut() = Payload::GraphBatch(graphs);
            }
            Payload::Token(_) | Payload::Graph(_) => {
                self.process_single(envelope, reading).await;
            }
        }
    }

    /// Processes a single-item envelope and returns the first error it
    /// recorded, if any.
    async fn process_single(
        &self,
        envelope: &mut Envelope,
        reading: ClockReading,
    ) -> Option<ProcessingError> {
        envelope.enter(reading);
        envelope
            .route_mut()
            .push(format!("stage:{}", determine_stage(reading.step)));

        let report = match envelope.payload_mut() {
            Payload::Token(token) => self.process_item(token, reading).await,
            Payload::Graph(graph) => self.process_item(graph, reading).await,
            Payload::TokenBatch(_) | Payload::GraphBatch(_) => return None,
        };

        let route = envelope.route_mut();
        route.push(stage_entry(BranchKind::A, report.branch_a_failed));
        if let Some(failed) = report.branch_b_failed {
            route.push(stage_entry(BranchKind::B, failed));
        }
        match report.result {
            Ok(()) => {
                route.push("integration:complete");
                None
            }
            Err(err) => {
                let component = match &err {
                    ProcessingError::SlotOccupied { stage, .. }
                    | ProcessingError::SlotOutOfRange { stage, .. } => stage.label(),
                    _ => {
                        route.push("integration:failed");
                        "integration"
                    }
                };
                envelope.record_error(component, err.clone());
                Some(err)
            }
        }
    }

    /// Processes batch items one at a time, each in its own sub-envelope
    /// sharing the parent's priority and clock reading.
    ///
    /// Returns the items in their original order, processed or not.
    async fn process_batch<W>(
        &self,
        parent: &mut Envelope,
        items: Vec<W>,
        reading: ClockReading,
        unwrap: fn(Payload) -> Option<W>,
    ) -> Vec<W>
    where
        W: WorkItem + Into<Payload>,
    {
        parent.enter(reading);
        parent
            .route_mut()
            .push(format!("stage:{}", determine_stage(reading.step)));

        let total = items.len();
        let mut processed = Vec::with_capacity(total);
        let mut pending = items.into_iter().enumerate();

        for (index, item) in pending.by_ref() {
            let mut sub = Envelope::new(parent.id().batch_item(index), item.into(), parent.priority);
            let failure = self.process_single(&mut sub, reading).await;

            for entry in sub.route().entries() {
                parent.route_mut().push(format!("item{index}:{entry}"));
            }
            processed.extend(unwrap(sub.into_payload()));

            if let Some(err) = failure {
                warn!(index, total, error = %err, "batch item failed");
                parent.record_error(
                    "batch",
                    ProcessingError::BatchItem {
                        index,
                        source: Box::new(err),
                    },
                );
                if self.batch_policy == BatchPolicy::FailFast {
                    debug!(index, skipped = total - index - 1, "batch aborted");
                    break;
                }
            }
        }

        processed.extend(pending.map(|(_, item)| item));
        processed
    }

    /// Runs one item through Branch-A, Branch-B, and Integration.
    pub(crate) async fn process_item<W: WorkItem>(
        &self,
        item: &mut W,
        reading: ClockReading,
    ) -> ItemReport {
        let progress = item.progress_mut();
        progress.stage = Some(determine_stage(reading.step).to_owned());
        progress.state = PayloadState::StageDetermined;

        let branch_a = self.run_stage(item, BranchKind::A).await;
        let branch_b = match &branch_a {
            Ok(_) => Some(self.run_stage(item, BranchKind::B).await),
            Err(_) => None,
        };

        let result = match (&branch_a, &branch_b) {
            (Err(err), _) | (_, Some(Err(err))) => {
                item.progress_mut().state = PayloadState::Failed;
                Err(err.clone())
            }
            _ => integration::integrate(&self.reasoner, &self.cancel, item, reading).await,
        };

        ItemReport {
            branch_a_failed: !matches!(branch_a, Ok(false)),
            branch_b_failed: branch_b.map(|b| !matches!(b, Ok(false))),
            result,
        }
    }

    /// Runs one fan-out stage. Returns whether any branch failed, or the
    /// slot conflict that makes the item unprocessable.
    async fn run_stage<W: WorkItem>(
        &self,
        item: &mut W,
        stage: BranchKind,
    ) -> Result<bool, ProcessingError> {
        item.progress_mut().state = stage_state(stage, StagePhase::Running);

        let requests = fanout::stage_requests(stage, item.subject());
        let outputs = fanout::fan_out(&self.reasoner, &self.cancel, requests).await;

        let progress = item.progress_mut();
        let (recorded, filled, failed) = match stage {
            BranchKind::A => {
                let recorded =
                    fanout::record_outputs(&mut progress.branch_a, outputs, fanout::branch_a_outcome);
                (recorded, progress.branch_a.filled(), progress.branch_a.has_failures())
            }
            BranchKind::B => {
                let recorded =
                    fanout::record_outputs(&mut progress.branch_b, outputs, fanout::branch_b_outcome);
                (recorded, progress.branch_b.filled(), progress.branch_b.has_failures())
            }
        };

        let phase = if failed || recorded.is_err() {
            StagePhase::Failed
        } else {
            StagePhase::Done
        };
        progress.state = stage_state(stage, phase);
        progress.transformations.push(Transformation::now(
            stage.label(),
            "fan_out",
            format!("{filled} of {} branches produced a result", stage.width()),
        ));

        recorded.map(|()| failed)
    }
}

fn stage_state(stage: BranchKind, phase: StagePhase) -> PayloadState {
    match stage {
        BranchKind::A => PayloadState::BranchA(phase),
        BranchKind::B => PayloadState::BranchB(phase),
    }
}

fn stage_entry(stage: BranchKind, failed: bool) -> String {
    let outcome = if failed { "failed" } else { "complete" };
    format!("{}:{outcome}", stage.label())
}
