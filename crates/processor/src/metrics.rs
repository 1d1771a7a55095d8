//! Metrics aggregator shared by every envelope task.

use std::time::Duration;

use parking_lot::Mutex;
use pipeline::{MetricsSnapshot, PayloadKind};

/// Lock-guarded aggregate counters.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished envelope.
    pub fn record_processed(&self, kind: PayloadKind, latency: Duration, failed: bool) {
        let mut m = self.inner.lock();
        match kind {
            PayloadKind::Token => m.tokens_processed += 1,
            PayloadKind::TokenBatch => m.token_batches_processed += 1,
            PayloadKind::Graph => m.graphs_processed += 1,
            PayloadKind::GraphBatch => m.graph_batches_processed += 1,
        }
        if failed {
            m.error_count += 1;
        }
        m.total_latency += latency;
        let processed = m.total_processed();
        m.average_latency = average(m.total_latency, processed);
    }

    /// Records a finished envelope that could not be placed on the output
    /// queue.
    pub fn record_dropped(&self) {
        self.inner.lock().outputs_dropped += 1;
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}
