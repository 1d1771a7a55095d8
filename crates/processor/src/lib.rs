//! Fanfold pipeline controller and stage execution.
//!
//! This crate drives envelopes from the [`pipeline`] domain through the
//! stages: stage routing, the 8-wide Branch-A fan-out, the 9-wide Branch-B
//! fan-out, and the Integration fold. It owns the bounded queues, the
//! concurrency limiter, the in-flight registry, and the metrics aggregator.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Sequences calls between the domain rules in
//! [`pipeline`] and the [`pipeline::Reasoner`] / [`pipeline::Clock`] ports.
//! Contains no domain rules of its own and no network I/O.
//!
//! ## Concurrency
//!
//! | Task | Count | Lives until |
//! |------|-------|-------------|
//! | Dispatch loop | 1 | stop |
//! | Envelope task | ≤ `max_in_flight` | envelope emitted |
//! | Branch task | 8, then 9, per item | branch joined |
//! | Stage worker | 17 | stop |
//!
//! Within one item Branch-A is joined before Branch-B starts. Stop is not
//! propagated into a running fan-out; the cancellation token is handed to
//! each Reasoner call, which may or may not honour it.

mod config;
mod controller;
mod fanout;
mod integration;
mod metrics;
mod registry;
mod stages;
mod step_clock;
mod workers;

pub use config::{BatchPolicy, ProcessorConfig};
pub use controller::PayloadProcessor;
pub use metrics::MetricsAggregator;
pub use registry::{InFlightGuard, InFlightRegistry};
pub use step_clock::{StepClock, CYCLE_LENGTH, HOLD_PATTERN_LENGTH};
pub use workers::BranchOutcome;
