//! Branch-A and Branch-B fan-out.
//!
//! A stage spawns one task per descriptor, each owning its prompt, and then
//! awaits the handles in index order. The joining task is the only writer of
//! the stage's slots, so every slot is written exactly once and a failing
//! branch never affects another branch's slot.

use std::sync::Arc;

use pipeline::{
    prompts, BranchAResult, BranchBResult, BranchFailure, BranchFailureReason, BranchKind,
    BranchSlots, CancellationToken, ProcessingError, PromptRequest, Reasoner, Subject,
    BRANCH_A_CONFIDENCE, BRANCH_A_DESCRIPTORS, BRANCH_B_DESCRIPTORS, BRANCH_B_WEIGHT,
};
use tracing::{debug, warn};

type BranchOutput = Result<String, BranchFailureReason>;

/// Builds the request for branch `index` of `stage`.
///
/// # Panics
///
/// Panics if `index` is not below the stage's width.
pub(crate) fn branch_request(stage: BranchKind, index: usize, subject: Subject<'_>) -> PromptRequest {
    match stage {
        BranchKind::A => prompts::branch_a_prompt(subject, &BRANCH_A_DESCRIPTORS[index]),
        BranchKind::B => prompts::branch_b_prompt(subject, &BRANCH_B_DESCRIPTORS[index]),
    }
}

/// Builds one request per descriptor of `stage`, in index order.
pub(crate) fn stage_requests(stage: BranchKind, subject: Subject<'_>) -> Vec<PromptRequest> {
    (0..stage.width())
        .map(|index| branch_request(stage, index, subject))
        .collect()
}

/// Runs one Reasoner call per request concurrently and returns the outputs
/// in request order.
///
/// A task that panics or is aborted reports
/// [`BranchFailureReason::TaskAborted`] for its own index only.
pub(crate) async fn fan_out(
    reasoner: &Arc<dyn Reasoner>,
    cancel: &CancellationToken,
    requests: Vec<PromptRequest>,
) -> Vec<BranchOutput> {
    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        let reasoner = Arc::clone(reasoner);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            reasoner
                .generate(&cancel, &request.prompt, &request.options)
                .await
        }));
    }

    let mut outputs = Vec::with_capacity(handles.len());
    for handle in handles {
        let output = match handle.await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(BranchFailureReason::Reasoner(err)),
            Err(join_err) => Err(BranchFailureReason::TaskAborted(join_err.to_string())),
        };
        outputs.push(output);
    }
    outputs
}

/// Turns the output of Branch-A task `index` into its slot value.
pub(crate) fn branch_a_outcome(index: usize, output: BranchOutput) -> Result<BranchAResult, BranchFailure> {
    let descriptor = &BRANCH_A_DESCRIPTORS[index];
    match output {
        Ok(text) => Ok(BranchAResult {
            index,
            descriptor: descriptor.name.to_owned(),
            code: descriptor.code.to_owned(),
            output: text,
            confidence: BRANCH_A_CONFIDENCE,
        }),
        Err(reason) => Err(BranchFailure {
            index,
            descriptor: descriptor.name.to_owned(),
            reason,
        }),
    }
}

/// Turns the output of Branch-B task `index` into its slot value.
pub(crate) fn branch_b_outcome(index: usize, output: BranchOutput) -> Result<BranchBResult, BranchFailure> {
    let descriptor = &BRANCH_B_DESCRIPTORS[index];
    match output {
        Ok(text) => Ok(BranchBResult {
            index,
            descriptor: descriptor.name.to_owned(),
            grid: (descriptor.row, descriptor.col),
            temporal: descriptor.temporal,
            scope: descriptor.scope,
            output: text,
            weight: BRANCH_B_WEIGHT,
        }),
        Err(reason) => Err(BranchFailure {
            index,
            descriptor: descriptor.name.to_owned(),
            reason,
        }),
    }
}

/// Writes every output into `slots`.
///
/// Returns the first slot error, if any; remaining outputs are still
/// written.
pub(crate) fn record_outputs<T>(
    slots: &mut BranchSlots<T>,
    outputs: Vec<BranchOutput>,
    to_slot: fn(usize, BranchOutput) -> Result<T, BranchFailure>,
) -> Result<(), ProcessingError> {
    let stage = slots.kind();
    let mut conflict = None;
    for (index, output) in outputs.into_iter().enumerate() {
        let outcome = to_slot(index, output);
        if let Err(failure) = &outcome {
            warn!(%stage, index, descriptor = %failure.descriptor, error = %failure, "branch failed");
        }
        if let Err(err) = slots.record(index, outcome) {
            warn!(%stage, index, error = %err, "branch slot rejected");
            conflict.get_or_insert(err);
        }
    }
    debug!(%stage, filled = slots.filled(), width = slots.width(), "stage joined");
    conflict.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pipeline::{EnvelopeFactory, GenerateOptions, ReasonerError, TokenKind};

    use super::*;

    /// Echoes the descriptor line; fails or panics on chosen descriptors.
    struct ScriptedReasoner {
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn generate(
            &self,
            _cancel: &CancellationToken,
            _prompt: &str,
            options: &GenerateOptions,
        ) -> Result<String, ReasonerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = options
                .system_prompt
                .lines()
                .next()
                .and_then(|l| l.strip_prefix(prompts::DESCRIPTOR_LINE_PREFIX))
                .unwrap_or_default()
                .to_owned();
            if Some(name.as_str()) == self.panic_on {
                panic!("scripted panic");
            }
            if Some(name.as_str()) == self.fail_on {
                return Err(ReasonerError::failed("scripted"));
            }
            Ok(name)
        }
    }

    fn reasoner(fail_on: Option<&'static str>, panic_on: Option<&'static str>) -> Arc<ScriptedReasoner> {
        Arc::new(ScriptedReasoner {
            fail_on,
            panic_on,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn branch_a_fills_all_eight_slots_in_descriptor_order() {
        let scripted = reasoner(None, None);
        let dyn_reasoner: Arc<dyn Reasoner> = scripted.clone();
        let token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "test");

        let requests = stage_requests(BranchKind::A, Subject::Token(&token));
        let outputs = fan_out(&dyn_reasoner, &CancellationToken::never(), requests).await;
        let mut slots = BranchSlots::new(BranchKind::A);
        record_outputs(&mut slots, outputs, branch_a_outcome).unwrap();

        assert_eq!(scripted.calls.load(Ordering::SeqCst), 8);
        assert_eq!(slots.filled(), 8);
        for (index, result) in slots.results() {
            assert_eq!(result.descriptor, BRANCH_A_DESCRIPTORS[index].name);
            assert_eq!(result.output, BRANCH_A_DESCRIPTORS[index].name);
            assert_eq!(result.confidence, 0.7);
        }
    }

    #[tokio::test]
    async fn one_failing_branch_only_fills_its_own_error_slot() {
        let failing = BRANCH_B_DESCRIPTORS[4].name;
        let dyn_reasoner: Arc<dyn Reasoner> = reasoner(Some(failing), None);
        let token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "test");

        let requests = stage_requests(BranchKind::B, Subject::Token(&token));
        let outputs = fan_out(&dyn_reasoner, &CancellationToken::never(), requests).await;
        let mut slots = BranchSlots::new(BranchKind::B);
        record_outputs(&mut slots, outputs, branch_b_outcome).unwrap();

        assert_eq!(slots.filled(), 8);
        assert!(slots.get(4).is_none());
        let failure = slots.failure(4).unwrap();
        assert_eq!(failure.descriptor, failing);
        assert_eq!(slots.failures().count(), 1);
        for (_, result) in slots.results() {
            assert!((result.weight - 1.0 / 9.0).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn panicking_branch_is_reported_as_aborted() {
        let dyn_reasoner: Arc<dyn Reasoner> = reasoner(None, Some(BRANCH_A_DESCRIPTORS[0].name));
        let token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "test");

        let requests = stage_requests(BranchKind::A, Subject::Token(&token));
        let outputs = fan_out(&dyn_reasoner, &CancellationToken::never(), requests).await;

        assert!(matches!(outputs[0], Err(BranchFailureReason::TaskAborted(_))));
        assert!(outputs[1..].iter().all(Result::is_ok));
    }

    #[test]
    fn writing_into_used_slots_reports_the_first_conflict() {
        let mut slots = BranchSlots::new(BranchKind::A);
        let outputs = || (0..8).map(|i| Ok(format!("out{i}"))).collect::<Vec<_>>();
        record_outputs(&mut slots, outputs(), branch_a_outcome).unwrap();

        let err = record_outputs(&mut slots, outputs(), branch_a_outcome).unwrap_err();
        assert_eq!(
            err,
            ProcessingError::SlotOccupied {
                stage: BranchKind::A,
                index: 0
            }
        );
        assert_eq!(slots.get(7).map(|r| r.output.as_str()), Some("out7"));
    }
}
