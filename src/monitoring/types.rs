use std::time::{Duration, SystemTime};

/// Configuration for the monitoring system
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Whether monitoring is enabled
    pub enabled: bool,
    /// Size of the monitoring channel buffer
    pub channel_size: usize,
    /// How often to emit aggregated metrics
    pub metrics_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_size: 1000,
            metrics_interval: Duration::from_secs(60),
        }
    }
}

/// Represents a monitoring event from the consumer
#[derive(Debug, Clone)]
pub struct ProcessingEvent {
    /// When the event occurred
    pub timestamp: SystemTime,
    /// ID of the shard this event relates to
    pub shard_id: String,
    /// The type of event and its details
    pub event_type: ProcessingEventType,
}

/// The different types of events that can occur while consuming
#[derive(Debug, Clone)]
pub enum ProcessingEventType {
    FetchComplete {
        record_count: usize,
        millis_behind_latest: Option<i64>,
        cursor_advanced: bool,
        duration: Duration,
    },
    FetchFailed {
        error: String,
    },
    RecordProcessed {
        sequence_number: String,
    },
    RecordFailed {
        sequence_number: String,
        error: String,
    },
    ShardEvent {
        event_type: ShardEventType,
        details: Option<String>,
    },
    Iterator {
        event_type: IteratorEventType,
        error: Option<String>,
    },
}

/// Types of shard-level events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEventType {
    /// Shard found during enumeration and given an initial cursor
    Discovered,
    /// Service returned no next cursor; the shard is drained
    Closed,
}

/// Types of iterator events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorEventType {
    /// Iterator expired
    Expired,
    /// Replacement iterator acquired
    Renewed,
    /// Failed to get a replacement iterator
    Failed,
}

impl ProcessingEvent {
    fn new(shard_id: String, event_type: ProcessingEventType) -> Self {
        Self {
            timestamp: SystemTime::now(),
            shard_id,
            event_type,
        }
    }

    pub fn fetch_complete(
        shard_id: String,
        record_count: usize,
        millis_behind_latest: Option<i64>,
        cursor_advanced: bool,
        duration: Duration,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::FetchComplete {
                record_count,
                millis_behind_latest,
                cursor_advanced,
                duration,
            },
        )
    }

    pub fn fetch_failed(shard_id: String, error: String) -> Self {
        Self::new(shard_id, ProcessingEventType::FetchFailed { error })
    }

    pub fn record_processed(shard_id: String, sequence_number: String) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::RecordProcessed { sequence_number },
        )
    }

    pub fn record_failed(shard_id: String, sequence_number: String, error: String) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::RecordFailed {
                sequence_number,
                error,
            },
        )
    }

    /// Create a new shard event
    pub fn shard_event(
        shard_id: String,
        event_type: ShardEventType,
        details: Option<String>,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::ShardEvent {
                event_type,
                details,
            },
        )
    }

    /// Create a new iterator event
    pub fn iterator(
        shard_id: String,
        event_type: IteratorEventType,
        error: Option<String>,
    ) -> Self {
        Self::new(
            shard_id,
            ProcessingEventType::Iterator { event_type, error },
        )
    }
}
