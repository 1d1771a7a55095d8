//! Per-branch stage workers.
//!
//! One long-lived loop per descriptor (8 for Branch-A, 9 for Branch-B), each
//! reading its own bounded queue. They serve one-off branch requests through
//! [`crate::PayloadProcessor::submit_branch`]; envelope processing does not
//! go through them.

use std::sync::Arc;

use pipeline::{
    BranchAResult, BranchBResult, BranchFailure, BranchFailureReason, BranchKind,
    CancellationToken, ProcessorError, Reasoner, Subject, Token,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::fanout;

/// Result of a single branch run by a stage worker.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOutcome {
    A(Result<BranchAResult, BranchFailure>),
    B(Result<BranchBResult, BranchFailure>),
}

impl BranchOutcome {
    /// The produced text, if the branch succeeded.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::A(Ok(result)) => Some(&result.output),
            Self::B(Ok(result)) => Some(&result.output),
            Self::A(Err(_)) | Self::B(Err(_)) => None,
        }
    }
}

pub(crate) struct BranchJob {
    pub token: Token,
    pub reply: oneshot::Sender<BranchOutcome>,
}

/// Sending side of every worker queue.
#[derive(Debug)]
pub(crate) struct BranchQueues {
    branch_a: Vec<mpsc::Sender<BranchJob>>,
    branch_b: Vec<mpsc::Sender<BranchJob>>,
}

/// Receiving side of every worker queue, held until the processor starts.
pub(crate) struct PendingWorkers {
    branch_a: Vec<mpsc::Receiver<BranchJob>>,
    branch_b: Vec<mpsc::Receiver<BranchJob>>,
}

impl std::fmt::Debug for BranchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchJob").field("token", &self.token.id).finish()
    }
}

/// Creates one bounded queue per branch.
pub(crate) fn queues(capacity: usize) -> (BranchQueues, PendingWorkers) {
    let (a_tx, a_rx): (Vec<_>, Vec<_>) = (0..BranchKind::A.width())
        .map(|_| mpsc::channel(capacity))
        .unzip();
    let (b_tx, b_rx): (Vec<_>, Vec<_>) = (0..BranchKind::B.width())
        .map(|_| mpsc::channel(capacity))
        .unzip();
    (
        BranchQueues {
            branch_a: a_tx,
            branch_b: b_tx,
        },
        PendingWorkers {
            branch_a: a_rx,
            branch_b: b_rx,
        },
    )
}

impl BranchQueues {
    /// Queue feeding branch `index` of `stage`.
    pub(crate) fn sender(
        &self,
        stage: BranchKind,
        index: usize,
    ) -> Result<&mpsc::Sender<BranchJob>, ProcessorError> {
        let senders = match stage {
            BranchKind::A => &self.branch_a,
            BranchKind::B => &self.branch_b,
        };
        senders
            .get(index)
            .ok_or(ProcessorError::InvalidBranchIndex {
                stage,
                index,
                width: stage.width(),
            })
    }
}

impl PendingWorkers {
    /// Spawns every worker loop.
    pub(crate) fn spawn(
        self,
        reasoner: &Arc<dyn Reasoner>,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let a = self
            .branch_a
            .into_iter()
            .enumerate()
            .map(|(index, rx)| (BranchKind::A, index, rx));
        let b = self
            .branch_b
            .into_iter()
            .enumerate()
            .map(|(index, rx)| (BranchKind::B, index, rx));

        a.chain(b)
            .map(|(stage, index, rx)| {
                tokio::spawn(worker_loop(
                    stage,
                    index,
                    rx,
                    Arc::clone(reasoner),
                    cancel.clone(),
                ))
            })
            .collect()
    }
}

#[instrument(skip(rx, reasoner, cancel))]
async fn worker_loop(
    stage: BranchKind,
    index: usize,
    mut rx: mpsc::Receiver<BranchJob>,
    reasoner: Arc<dyn Reasoner>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let request = fanout::branch_request(stage, index, Subject::Token(&job.token));
        let output = reasoner
            .generate(&cancel, &request.prompt, &request.options)
            .await
            .map_err(BranchFailureReason::Reasoner);
        let outcome = match stage {
            BranchKind::A => BranchOutcome::A(fanout::branch_a_outcome(index, output)),
            BranchKind::B => BranchOutcome::B(fanout::branch_b_outcome(index, output)),
        };

        if job.reply.send(outcome).is_err() {
            debug!(token = %job.token.id, "branch reply receiver dropped");
        }
    }
    debug!("stage worker stopped");
}
