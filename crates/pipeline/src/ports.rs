//! Port traits for the pipeline's external collaborators.
//!
//! Infrastructure crates implement these; the processor only ever sees the
//! traits.
//!
//! | Port | Consumed for |
//! |------|--------------|
//! | [`Reasoner`] | every branch task and the Integration stage |
//! | [`Clock`] | the entry step and gating snapshot of each envelope |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CancellationToken, ClockReading, ClockStep, ReasonerError};

/// Generation parameters for one Reasoner call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Instruction framing the call.
    pub system_prompt: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Text-generation service consumed by the branch stages and Integration.
///
/// Treated as an opaque, possibly slow, possibly failing black box. The
/// pipeline enforces no timeout on calls and performs no retries.
///
/// The `cancel` token fires when the owning processor is stopped. Whether an
/// in-flight call honours it is up to the implementation; a call that does
/// should return [`ReasonerError::Cancelled`].
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Generates text for `prompt`.
    async fn generate(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ReasonerError>;
}

/// Source of the current step and hold flags.
pub trait Clock: Send + Sync {
    /// Full reading including the gating flags.
    ///
    /// The processor calls this exactly once per envelope, at entry.
    fn current_state(&self) -> ClockReading;

    /// Current step only, used to stamp an envelope's exit step.
    ///
    /// Implementations should override this when sampling the gating flags
    /// has side effects or cost.
    fn current_step(&self) -> ClockStep {
        self.current_state().step
    }
}
