//! Domain model for the Fanfold payload pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, port trait, and error type used by the pipeline. The processor crate
//! orchestrates these; infrastructure crates implement the ports. Nothing here
//! adds scheduling or I/O.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** No network or file I/O. `tokio` is
//! used only for its `watch` channel in [`cancellation`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EnvelopeId`, `TokenId`, `GraphId`, ...) |
//! | [`types`] | Shared value types (`ClockStep`, `Timestamp`) |
//! | [`errors`] | Controller, Reasoner, and per-item error types; `RetryPolicy` |
//! | [`payload`] | Tokens, graphs, batches, and the `WorkItem` view |
//! | [`envelope`] | `Envelope`, route log, error records |
//! | [`factory`] | `EnvelopeFactory` and identifier minting |
//! | [`progress`] | Branch slots, results, per-payload state machine |
//! | [`descriptors`] | Static Branch-A and Branch-B descriptor tables |
//! | [`router`] | Stage table and `determine_stage` |
//! | [`gating`] | Hold flags and the Integration weighting rule |
//! | [`prompts`] | Reasoner prompt construction |
//! | [`ports`] | `Reasoner` and `Clock` traits |
//! | [`cancellation`] | Shared cancellation signal |
//! | [`metrics`] | `MetricsSnapshot` |

pub mod cancellation;
pub mod descriptors;
pub mod envelope;
pub mod errors;
pub mod factory;
pub mod gating;
pub mod identifiers;
pub mod metrics;
pub mod payload;
pub mod ports;
pub mod progress;
pub mod prompts;
pub mod router;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use cancellation::{CancellationSource, CancellationToken};
pub use descriptors::{
    BranchADescriptor, BranchBDescriptor, Scope, Temporal, BRANCH_A_CONFIDENCE,
    BRANCH_A_DESCRIPTORS, BRANCH_A_WIDTH, BRANCH_B_DESCRIPTORS, BRANCH_B_WEIGHT, BRANCH_B_WIDTH,
};
pub use envelope::{Envelope, ErrorRecord, RouteLog};
pub use errors::{ProcessingError, ProcessorError, ReasonerError, RetryPolicy};
pub use factory::EnvelopeFactory;
pub use gating::{ClockReading, GatingState, IntegrationFocus};
pub use identifiers::{EdgeId, EnvelopeId, GraphId, NodeId, TokenId};
pub use metrics::MetricsSnapshot;
pub use payload::{
    EdgeKind, Graph, GraphEdge, GraphKind, GraphNode, NodeKind, Payload, PayloadKind, Subject,
    Token, TokenContent, TokenKind, WorkItem,
};
pub use ports::{Clock, GenerateOptions, Reasoner};
pub use progress::{
    BranchAResult, BranchBResult, BranchFailure, BranchFailureReason, BranchKind, BranchSlots,
    IntegratedResult, PayloadState, Progress, StagePhase, Transformation,
};
pub use prompts::PromptRequest;
pub use router::{determine_stage, stage_for, StageDefinition, STAGES, UNKNOWN_STAGE};
pub use types::{ClockStep, Timestamp};
