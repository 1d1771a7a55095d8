//! Static descriptor tables for the two fan-out stages.
//!
//! Branch-A fans out over the 8 corners of a three-axis binary cube;
//! Branch-B fans out over a 3×3 grid of a temporal axis and a scope axis.
//! Each branch task is parameterised by exactly one descriptor, identified by
//! its index in the table.

use serde::{Deserialize, Serialize};

/// Fan-out width of Branch-A.
pub const BRANCH_A_WIDTH: usize = 8;

/// Fan-out width of Branch-B.
pub const BRANCH_B_WIDTH: usize = 9;

// ---------------------------------------------------------------------------
// Branch-A
// ---------------------------------------------------------------------------

/// One Branch-A descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchADescriptor {
    /// Index in [`BRANCH_A_DESCRIPTORS`].
    pub index: usize,
    /// Three-bit code: orientation, mode, outcome.
    pub code: &'static str,
    /// Display name; also used as the result's descriptor name.
    pub name: &'static str,
    /// One-line description handed to the Reasoner.
    pub description: &'static str,
}

/// The 8 Branch-A descriptors, ordered by code.
pub const BRANCH_A_DESCRIPTORS: [BranchADescriptor; BRANCH_A_WIDTH] = [
    BranchADescriptor {
        index: 0,
        code: "000",
        name: "Perception-Action-Learning",
        description: "Direct sensory processing with immediate action and learning",
    },
    BranchADescriptor {
        index: 1,
        code: "001",
        name: "Perception-Action-Integration",
        description: "Direct sensory processing with immediate action and knowledge integration",
    },
    BranchADescriptor {
        index: 2,
        code: "010",
        name: "Perception-Reflection-Learning",
        description: "Direct sensory processing with reflective analysis and learning",
    },
    BranchADescriptor {
        index: 3,
        code: "011",
        name: "Perception-Reflection-Integration",
        description: "Direct sensory processing with reflective analysis and integration",
    },
    BranchADescriptor {
        index: 4,
        code: "100",
        name: "Expression-Action-Learning",
        description: "Generative output with immediate action and learning",
    },
    BranchADescriptor {
        index: 5,
        code: "101",
        name: "Expression-Action-Integration",
        description: "Generative output with immediate action and integration",
    },
    BranchADescriptor {
        index: 6,
        code: "110",
        name: "Expression-Reflection-Learning",
        description: "Generative output with reflective analysis and learning",
    },
    BranchADescriptor {
        index: 7,
        code: "111",
        name: "Expression-Reflection-Integration",
        description: "Generative output with reflective analysis and integration",
    },
];

// ---------------------------------------------------------------------------
// Branch-B
// ---------------------------------------------------------------------------

/// Temporal axis of the Branch-B grid (rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temporal {
    Past,
    Present,
    Future,
}

impl Temporal {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Past => "past",
            Self::Present => "present",
            Self::Future => "future",
        }
    }

    /// Question the Reasoner is asked along this axis.
    pub fn guiding_question(self) -> &'static str {
        match self {
            Self::Past => "What historical patterns or precedents are relevant?",
            Self::Present => "What is the current state and immediate context?",
            Self::Future => "What potential outcomes or trajectories exist?",
        }
    }
}

/// Scope axis of the Branch-B grid (columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Universal,
    Particular,
    Relational,
}

impl Scope {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Universal => "universal",
            Self::Particular => "particular",
            Self::Relational => "relational",
        }
    }

    /// Question the Reasoner is asked along this axis.
    pub fn guiding_question(self) -> &'static str {
        match self {
            Self::Universal => "What general principles or laws apply?",
            Self::Particular => "What specific details or instances are relevant?",
            Self::Relational => "What connections or relationships are important?",
        }
    }
}

/// One Branch-B descriptor: a cell of the temporal × scope grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchBDescriptor {
    /// Index in [`BRANCH_B_DESCRIPTORS`]; equals `row * 3 + col`.
    pub index: usize,
    /// Grid row (temporal axis).
    pub row: usize,
    /// Grid column (scope axis).
    pub col: usize,
    /// Temporal value.
    pub temporal: Temporal,
    /// Scope value.
    pub scope: Scope,
    /// Display name; also used as the result's descriptor name.
    pub name: &'static str,
    /// One-line description handed to the Reasoner.
    pub description: &'static str,
}

/// Fixed weight of every Branch-B result.
pub const BRANCH_B_WEIGHT: f64 = 1.0 / BRANCH_B_WIDTH as f64;

/// Fixed confidence of every Branch-A result.
pub const BRANCH_A_CONFIDENCE: f64 = 0.7;

macro_rules! grid_cell {
    ($index:expr, $row:expr, $col:expr, $temporal:ident, $scope:ident, $name:expr, $description:expr) => {
        BranchBDescriptor {
            index: $index,
            row: $row,
            col: $col,
            temporal: Temporal::$temporal,
            scope: Scope::$scope,
            name: $name,
            description: $description,
        }
    };
}

/// The 9 Branch-B descriptors in row-major order.
pub const BRANCH_B_DESCRIPTORS: [BranchBDescriptor; BRANCH_B_WIDTH] = [
    grid_cell!(0, 0, 0, Past, Universal, "Past-Universal", "Historical patterns and universal principles"),
    grid_cell!(1, 0, 1, Past, Particular, "Past-Particular", "Specific memories and experiences"),
    grid_cell!(2, 0, 2, Past, Relational, "Past-Relational", "Historical connections and relationships"),
    grid_cell!(3, 1, 0, Present, Universal, "Present-Universal", "Current universal truths and laws"),
    grid_cell!(4, 1, 1, Present, Particular, "Present-Particular", "Current specific situation and context"),
    grid_cell!(5, 1, 2, Present, Relational, "Present-Relational", "Current relationships and dynamics"),
    grid_cell!(6, 2, 0, Future, Universal, "Future-Universal", "Potential universal outcomes and trends"),
    grid_cell!(7, 2, 1, Future, Particular, "Future-Particular", "Specific anticipated results"),
    grid_cell!(8, 2, 2, Future, Relational, "Future-Relational", "Anticipated relationship changes"),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn branch_a_codes_cover_every_three_bit_value_in_order() {
        for (i, d) in BRANCH_A_DESCRIPTORS.iter().enumerate() {
            assert_eq!(d.index, i);
            assert_eq!(usize::from_str_radix(d.code, 2).unwrap(), i);
        }
    }

    #[test]
    fn branch_b_grid_covers_all_nine_combinations() {
        let cells: HashSet<_> = BRANCH_B_DESCRIPTORS
            .iter()
            .map(|d| (d.temporal, d.scope))
            .collect();
        assert_eq!(cells.len(), BRANCH_B_WIDTH);

        for d in &BRANCH_B_DESCRIPTORS {
            assert_eq!(d.index, d.row * 3 + d.col);
        }
    }

    #[test]
    fn descriptor_names_are_unique() {
        let names: HashSet<_> = BRANCH_A_DESCRIPTORS
            .iter()
            .map(|d| d.name)
            .chain(BRANCH_B_DESCRIPTORS.iter().map(|d| d.name))
            .collect();
        assert_eq!(names.len(), BRANCH_A_WIDTH + BRANCH_B_WIDTH);
    }
}
