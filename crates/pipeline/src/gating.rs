//! Gating flags and the Integration stage's weighting rule.

use serde::{Deserialize, Serialize};

use crate::ClockStep;

/// The two hold flags sampled from the [`crate::Clock`] when an envelope
/// enters the pipeline.
///
/// Captured exactly once per envelope and stored on it; the Integration stage
/// reads this snapshot and never consults the clock again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatingState {
    /// Branch-A output is held back.
    pub hold_a: bool,
    /// Branch-B output is held back.
    pub hold_b: bool,
}

impl GatingState {
    /// Creates a gating snapshot.
    pub fn new(hold_a: bool, hold_b: bool) -> Self {
        Self { hold_a, hold_b }
    }

    /// Chooses how the Integration stage weights the two branch stages.
    ///
    /// `hold_a` is checked before `hold_b`: with both set, the result is
    /// [`IntegrationFocus::BranchBOnly`].
    pub fn integration_focus(self) -> IntegrationFocus {
        if self.hold_a {
            IntegrationFocus::BranchBOnly
        } else if self.hold_b {
            IntegrationFocus::BranchAOnly
        } else {
            IntegrationFocus::Balanced
        }
    }
}

/// Weighting applied by the Integration stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationFocus {
    /// Weight Branch-B results only (Branch-A is held).
    BranchBOnly,
    /// Weight Branch-A results only (Branch-B is held).
    BranchAOnly,
    /// Weight both branch stages equally.
    Balanced,
}

impl IntegrationFocus {
    /// The instruction handed to the Reasoner for this weighting.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::BranchBOnly => {
                "Focus on the Branch-B (temporal-scope) insights, as the Branch-A stream is held."
            }
            Self::BranchAOnly => {
                "Focus on the Branch-A (perspective) insights, as the Branch-B stream is held."
            }
            Self::Balanced => "Integrate the Branch-A and Branch-B streams equally.",
        }
    }
}

/// One reading of the external clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReading {
    /// Current step.
    pub step: ClockStep,
    /// Current hold flags.
    pub gating: GatingState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_holds_weights_both_streams() {
        assert_eq!(
            GatingState::new(false, false).integration_focus(),
            IntegrationFocus::Balanced
        );
    }

    #[test]
    fn single_hold_weights_the_other_stream() {
        assert_eq!(
            GatingState::new(true, false).integration_focus(),
            IntegrationFocus::BranchBOnly
        );
        assert_eq!(
            GatingState::new(false, true).integration_focus(),
            IntegrationFocus::BranchAOnly
        );
    }

    #[test]
    fn hold_a_wins_when_both_are_held() {
        assert_eq!(
            GatingState::new(true, true).integration_focus(),
            IntegrationFocus::BranchBOnly
        );
    }
}
