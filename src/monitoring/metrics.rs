use super::types::{IteratorEventType, ProcessingEvent, ProcessingEventType, ShardEventType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, trace, warn};

/// Holds aggregated metrics for a single shard
#[derive(Debug, Clone)]
pub struct ShardMetrics {
    // Fetch metrics
    pub fetches: u64,
    pub empty_fetches: u64,
    pub fetch_failures: u64,
    pub fetch_time: Duration,
    pub max_millis_behind_latest: Option<i64>,

    // Record metrics
    pub records_processed: u64,
    pub records_failed: u64,

    // Iterator metrics
    pub iterator_renewals: u64,
    pub iterator_failures: u64,

    pub closed: bool,
    pub last_updated: Instant,
}

impl Default for ShardMetrics {
    fn default() -> Self {
        Self {
            fetches: 0,
            empty_fetches: 0,
            fetch_failures: 0,
            fetch_time: Duration::default(),
            max_millis_behind_latest: None,
            records_processed: 0,
            records_failed: 0,
            iterator_renewals: 0,
            iterator_failures: 0,
            closed: false,
            last_updated: Instant::now(),
        }
    }
}

/// Aggregates monitoring events into metrics
pub struct MetricsAggregator {
    metrics: Arc<RwLock<HashMap<String, ShardMetrics>>>,
    window_duration: Duration,
    monitoring_rx: tokio::sync::mpsc::Receiver<ProcessingEvent>,
}

impl MetricsAggregator {
    /// Create a new metrics aggregator
    pub fn new(
        window_duration: Duration,
        monitoring_rx: tokio::sync::mpsc::Receiver<ProcessingEvent>,
    ) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
            window_duration,
            monitoring_rx,
        }
    }

    /// Process events and emit metrics until the channel closes
    pub async fn run(mut self) {
        let mut interval = interval(self.window_duration);

        loop {
            tokio::select! {
                event = self.monitoring_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
                _ = interval.tick() => {
                    self.emit_metrics().await;
                }
            }
        }

        self.emit_metrics().await;
        debug!("Monitoring channel closed, metrics aggregator stopped");
    }

    pub async fn process_event(&self, event: ProcessingEvent) {
        let mut metrics = self.metrics.write().await;
        let shard_metrics = metrics.entry(event.shard_id.clone()).or_default();

        match event.event_type {
            ProcessingEventType::FetchComplete {
                record_count,
                millis_behind_latest,
                duration,
                ..
            } => {
                shard_metrics.fetches += 1;
                if record_count == 0 {
                    shard_metrics.empty_fetches += 1;
                }
                shard_metrics.fetch_time += duration;
                if let Some(behind) = millis_behind_latest {
                    shard_metrics.max_millis_behind_latest = Some(
                        shard_metrics
                            .max_millis_behind_latest
                            .map_or(behind, |max| max.max(behind)),
                    );
                }
            }
            ProcessingEventType::FetchFailed { error } => {
                shard_metrics.fetch_failures += 1;
                trace!(shard_id = %event.shard_id, error = %error, "Fetch failure recorded");
            }
            ProcessingEventType::RecordProcessed { .. } => {
                shard_metrics.records_processed += 1;
            }
            ProcessingEventType::RecordFailed { .. } => {
                shard_metrics.records_failed += 1;
            }
            ProcessingEventType::ShardEvent { event_type, .. } => {
                if event_type == ShardEventType::Closed {
                    shard_metrics.closed = true;
                }
            }
            ProcessingEventType::Iterator { event_type, .. } => match event_type {
                IteratorEventType::Expired => {}
                IteratorEventType::Renewed => shard_metrics.iterator_renewals += 1,
                IteratorEventType::Failed => shard_metrics.iterator_failures += 1,
            },
        }

        shard_metrics.last_updated = Instant::now();
    }

    async fn emit_metrics(&self) {
        let metrics = self.metrics.read().await;

        for (shard_id, metrics) in metrics.iter() {
            info!(
                shard_id = %shard_id,
                fetches = metrics.fetches,
                empty_fetches = metrics.empty_fetches,
                fetch_failures = metrics.fetch_failures,
                fetch_time_ms = %metrics.fetch_time.as_millis(),
                max_millis_behind_latest = ?metrics.max_millis_behind_latest,
                records_processed = metrics.records_processed,
                records_failed = metrics.records_failed,
                iterator_renewals = metrics.iterator_renewals,
                closed = metrics.closed,
                "Shard metrics"
            );

            if metrics.fetch_failures > 0 || metrics.iterator_failures > 0 {
                warn!(
                    shard_id = %shard_id,
                    fetch_failures = metrics.fetch_failures,
                    iterator_failures = metrics.iterator_failures,
                    "Shard had failed service calls"
                );
            }
        }
    }

    /// Get current metrics for all shards
    pub async fn get_metrics(&self) -> HashMap<String, ShardMetrics> {
        self.metrics.read().await.clone()
    }

    /// Get metrics for a specific shard
    pub async fn get_shard_metrics(&self, shard_id: &str) -> Option<ShardMetrics> {
        self.metrics.read().await.get(shard_id).cloned()
    }
}
