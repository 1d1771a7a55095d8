//! Processor configuration.

use pipeline::ProcessorError;
use serde::{Deserialize, Serialize};

/// How a batch reacts when one of its items fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Stop at the first failing item; later items are left unprocessed.
    #[default]
    FailFast,
    /// Record the failure and keep going with the next item.
    ContinueOnError,
}

/// Capacities and policies for a [`crate::PayloadProcessor`].
///
/// Every field has a default, so an empty `[processor]` table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Capacity of the bounded input queue.
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,

    /// Capacity of the bounded output queue.
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,

    /// Maximum number of envelopes processed at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Capacity of each per-branch stage worker queue.
    #[serde(default = "default_branch_queue_capacity")]
    pub branch_queue_capacity: usize,

    /// Batch failure handling.
    #[serde(default)]
    pub batch_policy: BatchPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_capacity: default_input_capacity(),
            output_capacity: default_output_capacity(),
            max_in_flight: default_max_in_flight(),
            branch_queue_capacity: default_branch_queue_capacity(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    /// Rejects configurations the processor cannot run with.
    pub fn validate(&self) -> Result<(), ProcessorError> {
        let fields = [
            ("input_capacity", self.input_capacity),
            ("output_capacity", self.output_capacity),
            ("max_in_flight", self.max_in_flight),
            ("branch_queue_capacity", self.branch_queue_capacity),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ProcessorError::Configuration {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}

fn default_input_capacity() -> usize {
    100
}

fn default_output_capacity() -> usize {
    100
}

fn default_max_in_flight() -> usize {
    16
}

fn default_branch_queue_capacity() -> usize {
    10
}
