pub mod metrics;
pub mod sink;

pub use metrics::OpsCounters;
pub use sink::{CacheTier, MetricsEvent, MetricsSink, StatementKind, record, with_metrics_sink};
