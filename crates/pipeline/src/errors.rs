//! Error and retry-policy types for the payload pipeline.
//!
//! Errors are split by how they reach the caller:
//!
//! - [`ProcessorError`] is returned synchronously from the controller's
//!   lifecycle and submit paths.
//! - [`ProcessingError`] is never returned; it is recorded inside the
//!   [`crate::Envelope`] error list and the envelope is still emitted.
//! - [`ReasonerError`] is what a [`crate::Reasoner`] implementation reports.
//!   Inside a branch stage it becomes a [`crate::BranchFailure`] in that
//!   branch's own slot; inside the Integration stage it becomes
//!   [`ProcessingError::Integration`].
//!
//! [`RetryPolicy`] is advisory. Nothing in the pipeline retries; callers and
//! Reasoner adapters may.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BranchKind, EnvelopeId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: rate limits, transient provider unavailability.
/// - `NonRetryable` errors: cancellation, missing configuration, malformed
///   responses, client-side request errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

/// Errors returned synchronously by the pipeline controller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProcessorError {
    /// `start` was called on a processor that is already running.
    #[error("processor already running")]
    AlreadyRunning,

    /// `stop` was called on a processor that is not running.
    #[error("processor not running")]
    NotRunning,

    /// The bounded queue had no free capacity. Transient; the caller may
    /// retry or drop the item.
    #[error("input queue full")]
    QueueFull,

    /// Cancellation has fired; the processor no longer accepts work and
    /// cannot be restarted.
    #[error("processor stopped")]
    Stopped,

    /// A branch index outside the stage's fan-out width was requested.
    #[error("branch index {index} out of range for {stage} (width {width})")]
    InvalidBranchIndex {
        /// The stage the index was meant for.
        stage: BranchKind,
        /// The rejected index.
        index: usize,
        /// Fan-out width of the stage.
        width: usize,
    },

    /// The processor configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Reasoner errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`crate::Reasoner`] implementation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ReasonerError {
    /// The call observed the cancellation signal and gave up.
    #[error("reasoner call cancelled")]
    Cancelled,

    /// The reasoner cannot serve requests (e.g. missing credentials).
    #[error("reasoner not configured: {message}")]
    NotConfigured {
        /// What is missing.
        message: String,
    },

    /// The provider asked the caller to slow down.
    #[error("reasoner rate limited")]
    RateLimited {
        /// Provider-suggested back-off, when one was supplied.
        retry_after: Option<Duration>,
    },

    /// The provider could not be reached or reported a server-side failure.
    #[error("reasoner unavailable: {message}")]
    Unavailable {
        /// Transport or server error description.
        message: String,
    },

    /// The provider rejected the request.
    #[error("reasoner provider error (status {status}): {message}")]
    Provider {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body or provider error message.
        message: String,
    },

    /// The provider response could not be interpreted.
    #[error("invalid reasoner response: {message}")]
    InvalidResponse {
        /// Parse failure description.
        message: String,
    },

    /// The provider returned no text.
    #[error("reasoner returned no content")]
    EmptyResponse,

    /// Any other failure.
    #[error("reasoner failed: {message}")]
    Failed {
        /// Failure description.
        message: String,
    },
}

impl ReasonerError {
    /// Builds a [`ReasonerError::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Classifies this error for callers that implement their own retries.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Unavailable { .. } => RetryPolicy::Retryable { after: None },
            Self::Provider { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Cancelled
            | Self::NotConfigured { .. }
            | Self::Provider { .. }
            | Self::InvalidResponse { .. }
            | Self::EmptyResponse
            | Self::Failed { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-item processing errors
// ---------------------------------------------------------------------------

/// A failure recorded on an envelope while processing it.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProcessingError {
    /// The Integration stage's Reasoner call failed. The payload is emitted
    /// without an integrated result.
    #[error("integration failed: {source}")]
    Integration {
        /// The underlying Reasoner failure.
        source: ReasonerError,
    },

    /// An item inside a batch failed.
    #[error("batch item {index} failed: {source}")]
    BatchItem {
        /// Zero-based index of the failing item.
        index: usize,
        /// The item's own failure.
        source: Box<ProcessingError>,
    },

    /// Another envelope with the same ID is still in flight.
    #[error("envelope {id} is already in flight")]
    DuplicateEnvelope {
        /// The duplicated identifier.
        id: EnvelopeId,
    },

    /// A branch result slot was written twice.
    #[error("{stage} slot {index} already written")]
    SlotOccupied {
        /// Stage owning the slot.
        stage: BranchKind,
        /// Slot index.
        index: usize,
    },

    /// A branch result named a slot past the stage's width.
    #[error("{stage} slot {index} out of range (width {width})")]
    SlotOutOfRange {
        /// Stage owning the slots.
        stage: BranchKind,
        /// Requested index.
        index: usize,
        /// Number of slots in the stage.
        width: usize,
    },
}
