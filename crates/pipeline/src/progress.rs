//! Per-payload pipeline progress: branch result slots, the integrated
//! result, the state machine, and the transformation log.
//!
//! Every [`crate::Token`] and [`crate::Graph`] owns one [`Progress`]. It is
//! mutated only by the task processing that payload.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ClockStep, GatingState, IntegrationFocus, ProcessingError, ReasonerError, Scope, Temporal,
    Timestamp, BRANCH_A_WIDTH, BRANCH_B_WIDTH,
};

// ---------------------------------------------------------------------------
// Stage identity
// ---------------------------------------------------------------------------

/// Which fan-out stage a slot, result, or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    /// The 8-wide stage.
    #[serde(rename = "branchA")]
    A,
    /// The 9-wide stage.
    #[serde(rename = "branchB")]
    B,
}

impl BranchKind {
    /// Fan-out width of the stage.
    pub fn width(self) -> usize {
        match self {
            Self::A => BRANCH_A_WIDTH,
            Self::B => BRANCH_B_WIDTH,
        }
    }

    /// Label used in route logs and transformation records.
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "branchA",
            Self::B => "branchB",
        }
    }
}

impl std::fmt::Display for BranchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Branch results
// ---------------------------------------------------------------------------

/// Output of one Branch-A task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchAResult {
    /// Branch index, `0..8`.
    pub index: usize,
    /// Descriptor name.
    pub descriptor: String,
    /// Descriptor's three-bit code.
    pub code: String,
    /// Text produced by the Reasoner.
    pub output: String,
    /// Fixed confidence assigned to Branch-A results.
    pub confidence: f64,
}

/// Output of one Branch-B task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchBResult {
    /// Branch index, `0..9`.
    pub index: usize,
    /// Descriptor name.
    pub descriptor: String,
    /// `(row, col)` position in the temporal × scope grid.
    pub grid: (usize, usize),
    /// Temporal axis value.
    pub temporal: Temporal,
    /// Scope axis value.
    pub scope: Scope,
    /// Text produced by the Reasoner.
    pub output: String,
    /// Fixed weight, `1/9`.
    pub weight: f64,
}

/// A result type stored in [`BranchSlots`], tied to the stage producing it.
pub trait SlotResult {
    /// Stage whose slots hold this result.
    const KIND: BranchKind;
}

impl SlotResult for BranchAResult {
    const KIND: BranchKind = BranchKind::A;
}

impl SlotResult for BranchBResult {
    const KIND: BranchKind = BranchKind::B;
}

/// Why one branch task produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFailure {
    /// Branch index.
    pub index: usize,
    /// Descriptor name.
    pub descriptor: String,
    /// What went wrong.
    pub reason: BranchFailureReason,
}

/// Cause of a [`BranchFailure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchFailureReason {
    /// The Reasoner call failed.
    Reasoner(ReasonerError),
    /// The branch task panicked or was aborted before reporting.
    TaskAborted(String),
}

impl std::fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            BranchFailureReason::Reasoner(err) => {
                write!(f, "[{}] {}: {}", self.index, self.descriptor, err)
            }
            BranchFailureReason::TaskAborted(why) => {
                write!(f, "[{}] {}: task aborted: {}", self.index, self.descriptor, why)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Fixed-width, write-once result slots for one fan-out stage.
///
/// Each index has its own result cell and its own failure cell. A slot that
/// was never recorded (e.g. the task never reported) stays empty in both.
///
/// Deserialization rejects slots whose stage does not match `T` or whose
/// cell vectors are not exactly the stage's width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawSlots<T>",
    bound(deserialize = "T: SlotResult + Deserialize<'de>")
)]
pub struct BranchSlots<T> {
    kind: BranchKind,
    results: Vec<Option<T>>,
    failures: Vec<Option<BranchFailure>>,
}

/// Unchecked wire form of [`BranchSlots`].
#[derive(Deserialize)]
struct RawSlots<T> {
    kind: BranchKind,
    results: Vec<Option<T>>,
    failures: Vec<Option<BranchFailure>>,
}

impl<T: SlotResult> TryFrom<RawSlots<T>> for BranchSlots<T> {
    type Error = String;

    fn try_from(raw: RawSlots<T>) -> Result<Self, Self::Error> {
        if raw.kind != T::KIND {
            return Err(format!("expected {} slots, found {}", T::KIND, raw.kind));
        }
        let width = raw.kind.width();
        if raw.results.len() != width || raw.failures.len() != width {
            return Err(format!(
                "{} slots must hold {width} results and {width} failures, found {} and {}",
                raw.kind,
                raw.results.len(),
                raw.failures.len()
            ));
        }
        Ok(Self {
            kind: raw.kind,
            results: raw.results,
            failures: raw.failures,
        })
    }
}

impl<T> BranchSlots<T> {
    /// Creates empty slots sized to the stage's fan-out width.
    pub fn new(kind: BranchKind) -> Self {
        let width = kind.width();
        Self {
            kind,
            results: std::iter::repeat_with(|| None).take(width).collect(),
            failures: std::iter::repeat_with(|| None).take(width).collect(),
        }
    }

    /// The stage these slots belong to.
    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    /// Number of slots.
    pub fn width(&self) -> usize {
        self.results.len()
    }

    /// Records the outcome of branch `index`.
    ///
    /// Fails with [`ProcessingError::SlotOccupied`] if the slot already holds
    /// a result or failure (the existing value is kept), and with
    /// [`ProcessingError::SlotOutOfRange`] if `index` is not below
    /// [`width`](Self::width).
    pub fn record(
        &mut self,
        index: usize,
        outcome: Result<T, BranchFailure>,
    ) -> Result<(), ProcessingError> {
        let width = self.width();
        let (Some(result), Some(failure)) =
            (self.results.get_mut(index), self.failures.get_mut(index))
        else {
            debug!(stage = %self.kind, index, width, "slot index out of range");
            return Err(ProcessingError::SlotOutOfRange {
                stage: self.kind,
                index,
                width,
            });
        };
        if result.is_some() || failure.is_some() {
            debug!(stage = %self.kind, index, "slot already written");
            return Err(ProcessingError::SlotOccupied {
                stage: self.kind,
                index,
            });
        }
        match outcome {
            Ok(value) => *result = Some(value),
            Err(reason) => *failure = Some(reason),
        }
        Ok(())
    }

    /// Result at `index`, if one was recorded.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.results.get(index).and_then(Option::as_ref)
    }

    /// Failure at `index`, if one was recorded.
    pub fn failure(&self, index: usize) -> Option<&BranchFailure> {
        self.failures.get(index).and_then(Option::as_ref)
    }

    /// Present results with their indices, in index order.
    pub fn results(&self) -> impl Iterator<Item = (usize, &T)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (i, r)))
    }

    /// Recorded failures, in index order.
    pub fn failures(&self) -> impl Iterator<Item = &BranchFailure> {
        self.failures.iter().flatten()
    }

    /// Number of filled result slots.
    pub fn filled(&self) -> usize {
        self.results.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if any branch recorded a failure.
    pub fn has_failures(&self) -> bool {
        self.failures.iter().any(Option::is_some)
    }
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Output of the Integration stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedResult {
    /// Step captured at envelope entry.
    pub step: ClockStep,
    /// Gating snapshot the fold was conditioned on.
    pub gating: GatingState,
    /// Weighting derived from `gating`.
    pub focus: IntegrationFocus,
    /// Number of Branch-A results folded in.
    pub branch_a_inputs: usize,
    /// Number of Branch-B results folded in.
    pub branch_b_inputs: usize,
    /// Text produced by the Reasoner.
    pub text: String,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Progress of a fan-out stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// Branch tasks are running.
    Running,
    /// Every branch produced a result.
    Done,
    /// At least one branch recorded a failure.
    Failed,
}

/// Where a payload is in the pipeline.
///
/// `Queued → StageDetermined → BranchA(..) → BranchB(..) → Integrating →
/// {Completed | Failed}`. Branch failures do not short-circuit: Integration
/// still runs on whatever results exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum PayloadState {
    Queued,
    StageDetermined,
    BranchA(StagePhase),
    BranchB(StagePhase),
    Integrating,
    Completed,
    Failed,
}

impl PayloadState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A stage's entry in a payload's transformation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// When the stage finished.
    pub timestamp: Timestamp,
    /// Stage label (`branchA`, `branchB`, `integration`).
    pub component: String,
    /// Operation performed.
    pub operation: String,
    /// Human-readable summary.
    pub description: String,
}

impl Transformation {
    /// Creates a log entry stamped with the current time.
    pub fn now(
        component: impl Into<String>,
        operation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Timestamp::now(),
            component: component.into(),
            operation: operation.into(),
            description: description.into(),
        }
    }
}

// ---------------------------------------------------------------------------

/// Everything the pipeline writes onto a single token or graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Current state.
    pub state: PayloadState,
    /// Stage label assigned by the router.
    pub stage: Option<String>,
    /// Branch-A slots (8).
    pub branch_a: BranchSlots<BranchAResult>,
    /// Branch-B slots (9).
    pub branch_b: BranchSlots<BranchBResult>,
    /// Set only after both branch stages have finished.
    pub integrated: Option<IntegratedResult>,
    /// Append-only stage log.
    pub transformations: Vec<Transformation>,
}

impl Progress {
    /// Fresh progress in the `Queued` state.
    pub fn new() -> Self {
        Self {
            state: PayloadState::Queued,
            stage: None,
            branch_a: BranchSlots::new(BranchKind::A),
            branch_b: BranchSlots::new(BranchKind::B),
            integrated: None,
            transformations: Vec::new(),
        }
    }

    /// Returns `true` once the payload reached `Completed`.
    pub fn is_completed(&self) -> bool {
        self.state == PayloadState::Completed
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize) -> BranchAResult {
        BranchAResult {
            index,
            descriptor: format!("d{index}"),
            code: "000".into(),
            output: "out".into(),
            confidence: 0.7,
        }
    }

    fn failure(index: usize) -> BranchFailure {
        BranchFailure {
            index,
            descriptor: format!("d{index}"),
            reason: BranchFailureReason::Reasoner(ReasonerError::failed("nope")),
        }
    }

    #[test]
    fn slots_are_sized_to_the_stage_width() {
        assert_eq!(BranchSlots::<BranchAResult>::new(BranchKind::A).width(), 8);
        assert_eq!(BranchSlots::<BranchBResult>::new(BranchKind::B).width(), 9);
    }

    #[test]
    fn a_slot_is_written_at_most_once() {
        let mut slots = BranchSlots::new(BranchKind::A);
        slots.record(3, Ok(result(3))).unwrap();

        let err = slots.record(3, Ok(result(3))).unwrap_err();
        assert_eq!(
            err,
            ProcessingError::SlotOccupied {
                stage: BranchKind::A,
                index: 3
            }
        );

        let err = slots.record(3, Err(failure(3))).unwrap_err();
        assert!(matches!(err, ProcessingError::SlotOccupied { index: 3, .. }));
        assert!(slots.failure(3).is_none());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut slots = BranchSlots::new(BranchKind::A);
        let err = slots.record(8, Ok(result(8))).unwrap_err();
        assert_eq!(
            err,
            ProcessingError::SlotOutOfRange {
                stage: BranchKind::A,
                index: 8,
                width: 8
            }
        );
        assert_eq!(slots.filled(), 0);
    }

    #[test]
    fn deserializing_rejects_mis_sized_slots() {
        let mut json = serde_json::to_value(BranchSlots::<BranchAResult>::new(BranchKind::A)).unwrap();
        json["results"] = serde_json::json!([]);
        let err = serde_json::from_value::<BranchSlots<BranchAResult>>(json).unwrap_err();
        assert!(err.to_string().contains("must hold 8 results"));

        let mut json = serde_json::to_value(BranchSlots::<BranchBResult>::new(BranchKind::B)).unwrap();
        json["failures"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::Value::Null);
        assert!(serde_json::from_value::<BranchSlots<BranchBResult>>(json).is_err());
    }

    #[test]
    fn deserializing_rejects_slots_of_the_other_stage() {
        let json = serde_json::to_value(BranchSlots::<BranchAResult>::new(BranchKind::B)).unwrap();
        let err = serde_json::from_value::<BranchSlots<BranchAResult>>(json).unwrap_err();
        assert!(err.to_string().contains("expected branchA slots"));
    }

    #[test]
    fn well_formed_slots_survive_json() {
        let mut slots = BranchSlots::new(BranchKind::A);
        slots.record(2, Ok(result(2))).unwrap();
        slots.record(5, Err(failure(5))).unwrap();
        let json = serde_json::to_string(&slots).unwrap();
        assert_eq!(serde_json::from_str::<BranchSlots<BranchAResult>>(&json).unwrap(), slots);
    }

    #[test]
    fn failures_and_results_live_in_separate_cells() {
        let mut slots = BranchSlots::new(BranchKind::A);
        slots.record(0, Ok(result(0))).unwrap();
        slots.record(1, Err(failure(1))).unwrap();

        assert_eq!(slots.filled(), 1);
        assert!(slots.has_failures());
        assert!(slots.get(1).is_none());
        assert_eq!(slots.failure(1).map(|f| f.index), Some(1));
        assert_eq!(slots.results().map(|(i, _)| i).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(PayloadState::Completed.is_terminal());
        assert!(PayloadState::Failed.is_terminal());
        assert!(!PayloadState::Integrating.is_terminal());
        assert!(!PayloadState::BranchA(StagePhase::Failed).is_terminal());
    }
}
