use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counters kept by the ingest loop.
pub struct IngestMetrics {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub readings: usize,
    pub discarded: usize,
    pub errors: usize,
    pub events: usize,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_reading(&self, events: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.readings += 1;
            metrics.events += events;
        }
    }

    pub fn record_discarded(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.discarded += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = IngestMetrics::new();
        metrics.record_reading(0);
        metrics.record_reading(2);
        metrics.record_discarded();
        metrics.record_error();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                readings: 2,
                discarded: 1,
                errors: 1,
                events: 2,
            }
        );
    }
}
