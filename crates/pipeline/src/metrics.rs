//! Point-in-time metrics snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PayloadKind, BRANCH_A_WIDTH, BRANCH_B_WIDTH};

/// Copy of the processor's aggregate counters.
///
/// Returned by value; later processing never changes a snapshot already
/// handed out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tokens_processed: u64,
    pub graphs_processed: u64,
    pub token_batches_processed: u64,
    pub graph_batches_processed: u64,
    /// Envelopes emitted with a non-empty error list.
    pub error_count: u64,
    /// Finished envelopes discarded because the output queue was full.
    pub outputs_dropped: u64,
    /// Sum of per-envelope processing latency.
    pub total_latency: Duration,
    /// Arithmetic mean of per-envelope processing latency.
    pub average_latency: Duration,
    /// Reserved. Always zero.
    pub branch_a_utilization: [f64; BRANCH_A_WIDTH],
    /// Reserved. Always zero.
    pub branch_b_utilization: [f64; BRANCH_B_WIDTH],
}

impl MetricsSnapshot {
    /// Envelopes processed, across all payload kinds.
    pub fn total_processed(&self) -> u64 {
        self.tokens_processed
            + self.graphs_processed
            + self.token_batches_processed
            + self.graph_batches_processed
    }

    /// Envelopes processed for one payload kind.
    pub fn processed(&self, kind: PayloadKind) -> u64 {
        match kind {
            PayloadKind::Token => self.tokens_processed,
            PayloadKind::TokenBatch => self.token_batches_processed,
            PayloadKind::Graph => self.graphs_processed,
            PayloadKind::GraphBatch => self.graph_batches_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_every_kind() {
        let snapshot = MetricsSnapshot {
            tokens_processed: 2,
            graphs_processed: 1,
            token_batches_processed: 3,
            ..Default::default()
        };
        assert_eq!(snapshot.total_processed(), 6);
        assert_eq!(snapshot.processed(PayloadKind::TokenBatch), 3);
        assert_eq!(snapshot.processed(PayloadKind::GraphBatch), 0);
    }

    #[test]
    fn default_snapshot_has_zeroed_reserved_arrays() {
        let snapshot = MetricsSnapshot::default();
        assert!(snapshot.branch_a_utilization.iter().all(|u| *u == 0.0));
        assert_eq!(snapshot.branch_b_utilization.len(), 9);
    }
}
