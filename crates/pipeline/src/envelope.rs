//! The unit of work travelling through the pipeline.

use serde::{Deserialize, Serialize};

use crate::{
    ClockReading, ClockStep, EnvelopeId, GatingState, Payload, PayloadKind, ProcessingError,
    Timestamp,
};

/// Ordered, append-only log of the stages an envelope passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteLog(Vec<String>);

impl RouteLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.0.push(entry.into());
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if any entry equals `entry`.
    pub fn contains(&self, entry: &str) -> bool {
        self.0.iter().any(|e| e == entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A processing failure recorded on an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// When the failure was recorded.
    pub timestamp: Timestamp,
    /// Component that recorded it.
    pub component: String,
    /// Entry step of the envelope.
    pub step: Option<ClockStep>,
    /// The failure itself.
    pub error: ProcessingError,
    /// Whether processing recovered from it. Always `false` today.
    pub recovered: bool,
}

/// Immutable-identity wrapper around a payload.
///
/// Created at submit time, mutated only by the task processing it, then
/// owned by whoever drains the output queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    id: EnvelopeId,
    created_at: Timestamp,
    /// Higher is more urgent. Carried through batches; not used for ordering.
    pub priority: i32,
    payload: Payload,
    route: RouteLog,
    entry_step: Option<ClockStep>,
    exit_step: Option<ClockStep>,
    gating: Option<GatingState>,
    entered_at: Option<Timestamp>,
    exited_at: Option<Timestamp>,
    errors: Vec<ErrorRecord>,
}

impl Envelope {
    /// Wraps `payload`. Prefer [`crate::EnvelopeFactory::create_envelope`],
    /// which also mints a unique ID.
    pub fn new(id: EnvelopeId, payload: Payload, priority: i32) -> Self {
        Self {
            id,
            created_at: Timestamp::now(),
            priority,
            payload,
            route: RouteLog::new(),
            entry_step: None,
            exit_step: None,
            gating: None,
            entered_at: None,
            exited_at: None,
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> &EnvelopeId {
        &self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Consumes the envelope, returning its payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn route(&self) -> &RouteLog {
        &self.route
    }

    pub fn route_mut(&mut self) -> &mut RouteLog {
        &mut self.route
    }

    pub fn entry_step(&self) -> Option<ClockStep> {
        self.entry_step
    }

    pub fn exit_step(&self) -> Option<ClockStep> {
        self.exit_step
    }

    /// Gating snapshot captured at entry.
    pub fn gating(&self) -> Option<GatingState> {
        self.gating
    }

    pub fn entered_at(&self) -> Option<Timestamp> {
        self.entered_at
    }

    pub fn exited_at(&self) -> Option<Timestamp> {
        self.exited_at
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Captures the clock reading taken when processing starts.
    pub fn enter(&mut self, reading: ClockReading) {
        self.entry_step = Some(reading.step);
        self.gating = Some(reading.gating);
        self.entered_at = Some(Timestamp::now());
    }

    /// Stamps the exit step and time.
    pub fn exit(&mut self, step: ClockStep) {
        self.exit_step = Some(step);
        self.exited_at = Some(Timestamp::now());
    }

    /// Records a processing failure against the entry step.
    pub fn record_error(&mut self, component: impl Into<String>, error: ProcessingError) {
        self.errors.push(ErrorRecord {
            timestamp: Timestamp::now(),
            component: component.into(),
            step: self.entry_step,
            error,
            recovered: false,
        });
    }

    /// Returns `true` if every item carried has an integrated result.
    ///
    /// An empty batch is trivially integrated.
    pub fn is_integrated(&self) -> bool {
        self.payload
            .items()
            .iter()
            .all(|item| item.progress().integrated.is_some())
    }

    /// Serialises the envelope as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses an envelope previously produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnvelopeFactory, GatingState, ReasonerError, TokenKind};

    #[test]
    fn route_log_preserves_append_order() {
        let mut route = RouteLog::new();
        route.push("stage:Perception");
        route.push("branchA:complete");
        assert_eq!(route.entries(), ["stage:Perception", "branchA:complete"]);
        assert!(route.contains("branchA:complete"));
        assert!(!route.contains("branchB:complete"));
    }

    #[test]
    fn enter_captures_step_and_gating_once() {
        let factory = EnvelopeFactory::new();
        let token = factory.create_token("hi", TokenKind::Thought, "test");
        let mut env = factory.create_envelope(token, 1);

        env.enter(ClockReading {
            step: ClockStep::new(8),
            gating: GatingState::new(true, false),
        });

        assert_eq!(env.entry_step(), Some(ClockStep::new(8)));
        assert_eq!(env.gating(), Some(GatingState::new(true, false)));
        assert!(env.entered_at().is_some());
    }

    #[test]
    fn recorded_errors_carry_the_entry_step() {
        let factory = EnvelopeFactory::new();
        let token = factory.create_token("hi", TokenKind::Thought, "test");
        let mut env = factory.create_envelope(token, 1);
        env.enter(ClockReading {
            step: ClockStep::new(3),
            gating: GatingState::default(),
        });

        env.record_error(
            "integration",
            ProcessingError::Integration {
                source: ReasonerError::failed("x"),
            },
        );

        assert_eq!(env.errors().len(), 1);
        assert_eq!(env.errors()[0].step, Some(ClockStep::new(3)));
        assert!(!env.errors()[0].recovered);
    }

    #[test]
    fn json_round_trip_keeps_payload_and_route() {
        let factory = EnvelopeFactory::new();
        let token = factory.create_token("hello", TokenKind::Percept, "sensor");
        let mut env = factory.create_envelope(token, 5);
        env.route_mut().push("stage:Perception");

        let json = env.to_json().unwrap();
        assert!(json.contains("\"payload_type\": \"token\""));

        let parsed = Envelope::from_json(&json).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn empty_batch_counts_as_integrated() {
        let factory = EnvelopeFactory::new();
        let env = factory.create_envelope(Vec::<crate::Token>::new(), 0);
        assert!(env.is_integrated());
    }
}
