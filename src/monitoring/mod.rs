//! Monitoring for the consumer
//!
//! The poll loop publishes [`ProcessingEvent`]s on a bounded channel when
//! monitoring is enabled; [`MetricsAggregator`] turns them into per-shard
//! counters and logs them periodically.

mod metrics;
mod types;

pub use metrics::{MetricsAggregator, ShardMetrics};
pub use types::{
    IteratorEventType, MonitoringConfig, ProcessingEvent, ProcessingEventType, ShardEventType,
};
