pub mod metrics;

pub use metrics::{IngestMetrics, MetricsSnapshot};
