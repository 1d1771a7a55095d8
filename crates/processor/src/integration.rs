//! Integration stage: folds both branch stages into one result.

use std::sync::Arc;

use pipeline::{
    prompts, CancellationToken, ClockReading, IntegratedResult, PayloadState, ProcessingError,
    Reasoner, ReasonerError, Transformation, WorkItem,
};
use tracing::{debug, instrument, warn};

/// Runs the Integration call for one item and writes its result.
///
/// Works on whatever branch results are present; unset slots are skipped.
/// The weighting comes from the gating snapshot in `reading`, which was
/// captured at envelope entry.
///
/// On success the item is `Completed` with `integrated` set. On failure it is
/// `Failed`, `integrated` stays unset, and the Reasoner error is returned.
/// A Reasoner call that panics is reported as [`ReasonerError::Failed`].
#[instrument(skip_all, fields(step = %reading.step, hold_a = reading.gating.hold_a, hold_b = reading.gating.hold_b))]
pub(crate) async fn integrate<W: WorkItem>(
    reasoner: &Arc<dyn Reasoner>,
    cancel: &CancellationToken,
    item: &mut W,
    reading: ClockReading,
) -> Result<(), ProcessingError> {
    item.progress_mut().state = PayloadState::Integrating;

    let request = {
        let progress = item.progress();
        prompts::integration_prompt(
            item.subject(),
            reading.step,
            reading.gating,
            &progress.branch_a,
            &progress.branch_b,
        )
    };
    let focus = reading.gating.integration_focus();
    debug!(?focus, "integrating");

    let call = {
        let reasoner = Arc::clone(reasoner);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            reasoner
                .generate(&cancel, &request.prompt, &request.options)
                .await
        })
    };
    let generated = match call.await {
        Ok(generated) => generated,
        Err(join_err) => Err(ReasonerError::failed(format!(
            "integration task aborted: {join_err}"
        ))),
    };

    let progress = item.progress_mut();
    match generated {
        Ok(text) => {
            progress.integrated = Some(IntegratedResult {
                step: reading.step,
                gating: reading.gating,
                focus,
                branch_a_inputs: progress.branch_a.filled(),
                branch_b_inputs: progress.branch_b.filled(),
                text,
            });
            progress.state = PayloadState::Completed;
            progress.transformations.push(Transformation::now(
                "integration",
                "fold",
                format!(
                    "Integrated at step {} (holdA {}, holdB {})",
                    reading.step, reading.gating.hold_a, reading.gating.hold_b
                ),
            ));
            Ok(())
        }
        Err(source) => {
            warn!(error = %source, "integration failed");
            progress.state = PayloadState::Failed;
            Err(ProcessingError::Integration { source })
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pipeline::{
        BranchAResult, ClockStep, EnvelopeFactory, GatingState, GenerateOptions, IntegrationFocus,
        TokenKind, BRANCH_A_DESCRIPTORS,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingReasoner {
        prompts: Mutex<Vec<(String, String)>>,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl Reasoner for RecordingReasoner {
        async fn generate(
            &self,
            _cancel: &CancellationToken,
            prompt: &str,
            options: &GenerateOptions,
        ) -> Result<String, ReasonerError> {
            self.prompts
                .lock()
                .push((options.system_prompt.clone(), prompt.to_owned()));
            if self.panic {
                panic!("reasoner crashed");
            }
            if self.fail {
                Err(ReasonerError::Unavailable {
                    message: "down".into(),
                })
            } else {
                Ok("synthesis".into())
            }
        }
    }

    fn reading(hold_a: bool, hold_b: bool) -> ClockReading {
        ClockReading {
            step: ClockStep::new(9),
            gating: GatingState::new(hold_a, hold_b),
        }
    }

    #[tokio::test]
    async fn tolerates_empty_slots_and_completes() {
        let recording = Arc::new(RecordingReasoner::default());
        let reasoner: Arc<dyn Reasoner> = recording.clone();
        let mut token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "t");
        token
            .progress
            .branch_a
            .record(
                5,
                Ok(BranchAResult {
                    index: 5,
                    descriptor: BRANCH_A_DESCRIPTORS[5].name.into(),
                    code: BRANCH_A_DESCRIPTORS[5].code.into(),
                    output: "five".into(),
                    confidence: 0.7,
                }),
            )
            .unwrap();

        integrate(&reasoner, &CancellationToken::never(), &mut token, reading(false, false))
            .await
            .unwrap();

        let integrated = token.progress.integrated.as_ref().unwrap();
        assert_eq!(integrated.text, "synthesis");
        assert_eq!(integrated.branch_a_inputs, 1);
        assert_eq!(integrated.branch_b_inputs, 0);
        assert_eq!(integrated.focus, IntegrationFocus::Balanced);
        assert!(token.progress.is_completed());
        assert_eq!(token.progress.transformations.len(), 1);
    }

    #[tokio::test]
    async fn both_holds_take_the_hold_a_path() {
        let recording = Arc::new(RecordingReasoner::default());
        let reasoner: Arc<dyn Reasoner> = recording.clone();
        let mut token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "t");

        integrate(&reasoner, &CancellationToken::never(), &mut token, reading(true, true))
            .await
            .unwrap();

        let prompts = recording.prompts.lock();
        let (system, _) = &prompts[0];
        assert!(system.contains(IntegrationFocus::BranchBOnly.instruction()));
        assert!(!system.contains(IntegrationFocus::BranchAOnly.instruction()));
        assert_eq!(
            token.progress.integrated.as_ref().unwrap().focus,
            IntegrationFocus::BranchBOnly
        );
    }

    #[tokio::test]
    async fn reasoner_failure_leaves_the_item_unintegrated() {
        let reasoner: Arc<dyn Reasoner> = Arc::new(RecordingReasoner {
            fail: true,
            ..Default::default()
        });
        let mut token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "t");

        let err = integrate(&reasoner, &CancellationToken::never(), &mut token, reading(false, true))
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Integration { .. }));
        assert!(token.progress.integrated.is_none());
        assert_eq!(token.progress.state, PayloadState::Failed);
    }

    #[tokio::test]
    async fn panicking_reasoner_fails_the_item_instead_of_the_caller() {
        let reasoner: Arc<dyn Reasoner> = Arc::new(RecordingReasoner {
            panic: true,
            ..Default::default()
        });
        let mut token = EnvelopeFactory::new().create_token("hi", TokenKind::Thought, "t");

        let err = integrate(&reasoner, &CancellationToken::never(), &mut token, reading(false, false))
            .await
            .unwrap_err();

        match err {
            ProcessingError::Integration {
                source: ReasonerError::Failed { message },
            } => assert!(message.contains("integration task aborted")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(token.progress.integrated.is_none());
        assert_eq!(token.progress.state, PayloadState::Failed);
    }
}
