//! Stage router: maps a captured clock step to a phase label.

use serde::Serialize;

use crate::{ClockStep, GraphKind, TokenKind};

/// Label returned for steps outside the stage table.
pub const UNKNOWN_STAGE: &str = "unknown";

/// One row of the stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    /// One-based stage number.
    pub id: u32,
    /// Label recorded in the envelope route log.
    pub name: &'static str,
    /// Steps belonging to this stage.
    pub steps: [u32; 6],
    /// What happens during the stage.
    pub description: &'static str,
    /// Token kinds the stage is primarily concerned with.
    pub token_focus: &'static [TokenKind],
    /// Graph kinds the stage is primarily concerned with.
    pub graph_focus: &'static [GraphKind],
}

/// Five stages of six steps over a 30-step cycle.
pub const STAGES: [StageDefinition; 5] = [
    StageDefinition {
        id: 1,
        name: "Perception",
        steps: [1, 2, 3, 4, 5, 6],
        description: "Gather and process sensory input from environment",
        token_focus: &[TokenKind::Percept, TokenKind::Query],
        graph_focus: &[GraphKind::Semantic, GraphKind::Spatial],
    },
    StageDefinition {
        id: 2,
        name: "Analysis",
        steps: [7, 8, 9, 10, 11, 12],
        description: "Analyze perceptions and identify patterns",
        token_focus: &[TokenKind::Thought, TokenKind::Memory],
        graph_focus: &[GraphKind::Causal, GraphKind::Inferential],
    },
    StageDefinition {
        id: 3,
        name: "Planning",
        steps: [13, 14, 15, 16, 17, 18],
        description: "Generate and evaluate action plans",
        token_focus: &[TokenKind::Goal, TokenKind::Affordance],
        graph_focus: &[GraphKind::GoalTree, GraphKind::Temporal],
    },
    StageDefinition {
        id: 4,
        name: "Execution",
        steps: [19, 20, 21, 22, 23, 24],
        description: "Execute selected actions",
        token_focus: &[TokenKind::Action, TokenKind::Response],
        graph_focus: &[GraphKind::Causal, GraphKind::Temporal],
    },
    StageDefinition {
        id: 5,
        name: "Integration",
        steps: [25, 26, 27, 28, 29, 30],
        description: "Integrate results and update knowledge",
        token_focus: &[TokenKind::Insight, TokenKind::Memory],
        graph_focus: &[GraphKind::Hierarchical, GraphKind::Associative],
    },
];

/// Returns the stage definition owning `step`, if any.
pub fn stage_for(step: ClockStep) -> Option<&'static StageDefinition> {
    STAGES
        .iter()
        .find(|stage| stage.steps.contains(&step.as_u32()))
}

/// Returns the stage label for `step`, or [`UNKNOWN_STAGE`].
///
/// Pure table lookup: the same step always yields the same label.
pub fn determine_stage(step: ClockStep) -> &'static str {
    stage_for(step).map_or(UNKNOWN_STAGE, |stage| stage.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_step_in_the_cycle_has_exactly_one_stage() {
        for step in 1..=30 {
            let owners = STAGES
                .iter()
                .filter(|s| s.steps.contains(&step))
                .count();
            assert_eq!(owners, 1, "step {step}");
        }
    }

    #[test]
    fn stage_boundaries() {
        assert_eq!(determine_stage(ClockStep::new(1)), "Perception");
        assert_eq!(determine_stage(ClockStep::new(6)), "Perception");
        assert_eq!(determine_stage(ClockStep::new(7)), "Analysis");
        assert_eq!(determine_stage(ClockStep::new(18)), "Planning");
        assert_eq!(determine_stage(ClockStep::new(19)), "Execution");
        assert_eq!(determine_stage(ClockStep::new(30)), "Integration");
    }

    #[test]
    fn out_of_table_step_is_unknown() {
        assert_eq!(determine_stage(ClockStep::new(0)), UNKNOWN_STAGE);
        assert_eq!(determine_stage(ClockStep::new(31)), UNKNOWN_STAGE);
        assert_eq!(determine_stage(ClockStep::new(u32::MAX)), UNKNOWN_STAGE);
    }

    #[test]
    fn lookup_is_deterministic() {
        for step in 0..40 {
            let step = ClockStep::new(step);
            assert_eq!(determine_stage(step), determine_stage(step));
        }
    }
}
