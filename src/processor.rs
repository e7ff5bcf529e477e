//! Consumer wiring
//!
//! This module ties the two halves of the consumer together:
//!
//! - Shard enumeration, run once, where any failure is fatal
//! - The poll loop, which owns the resulting cursors until shutdown

use chrono::{DateTime, Utc};

use crate::client::{FetchedRecord, KinesisClientTrait};
use crate::error::{ConsumerError, ProcessingError, Result};
use crate::monitoring::{MonitoringConfig, ProcessingEvent};
use crate::poller::PollLoop;
use crate::schedule::PollSchedule;
use crate::shards::ShardEnumerator;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, trace, warn};

/// Largest `Limit` accepted by `GetRecords`
pub const MAX_BATCH_SIZE: i32 = 10_000;

/// Trait for implementing record handling logic
///
/// Errors are reported back to the poll loop, which logs them and carries on
/// with the next record. A failing record is never retried.
///
/// # Examples
///
/// ```rust
/// use kinesis_getrecords::{FetchedRecord, ProcessingError, RecordProcessor};
///
/// struct PrintLength;
///
/// #[async_trait::async_trait]
/// impl RecordProcessor for PrintLength {
///     async fn process_record(
///         &self,
///         shard_id: &str,
///         record: &FetchedRecord,
///     ) -> Result<(), ProcessingError> {
///         println!("{} {} bytes", shard_id, record.payload.len());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Handle a single record fetched from `shard_id`
    async fn process_record(
        &self,
        shard_id: &str,
        record: &FetchedRecord,
    ) -> std::result::Result<(), ProcessingError>;
}

/// Specifies where to start reading from in each shard
#[derive(Debug, Clone, PartialEq)]
pub enum InitialPosition {
    /// Start from the oldest available record
    TrimHorizon,
    /// Start from the newest record
    Latest,
    /// Start from a specific timestamp
    AtTimestamp(DateTime<Utc>),
}

/// Configuration for the consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Name of the Kinesis stream to consume
    pub stream_name: String,
    /// Maximum number of records to request per GetRecords call
    pub batch_size: i32,
    /// Where each shard's cursor starts
    pub initial_position: InitialPosition,
    /// Wait between poll passes
    pub poll_schedule: PollSchedule,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream_name: String::new(),
            batch_size: 200,
            initial_position: InitialPosition::TrimHorizon,
            poll_schedule: PollSchedule::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_name.trim().is_empty() {
            return Err(ConsumerError::ConfigError(
                "stream name must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConsumerError::ConfigError(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.monitoring.enabled && self.monitoring.channel_size == 0 {
            return Err(ConsumerError::ConfigError(
                "monitoring channel size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared state handed from the consumer to the poll loop
pub(crate) struct ProcessingContext<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    pub(crate) processor: Arc<P>,
    pub(crate) client: Arc<C>,
    pub(crate) config: ConsumerConfig,
    monitoring_tx: Option<mpsc::Sender<ProcessingEvent>>,
}

impl<P, C> Clone for ProcessingContext<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            monitoring_tx: self.monitoring_tx.clone(),
        }
    }
}

impl<P, C> ProcessingContext<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    /// Sends a monitoring event if monitoring is enabled
    pub(crate) async fn send_monitoring_event(&self, event: ProcessingEvent) {
        if let Some(tx) = &self.monitoring_tx {
            if let Err(e) = tx.send(event).await {
                warn!(error = %e, "Failed to send monitoring event");
            } else {
                trace!("Sent monitoring event successfully");
            }
        }
    }

    pub(crate) fn monitoring_tx(&self) -> Option<&mpsc::Sender<ProcessingEvent>> {
        self.monitoring_tx.as_ref()
    }
}

/// Kinesis consumer: enumerate once, then poll forever
///
/// # Examples
///
/// ```rust,no_run
/// use kinesis_getrecords::{ConsumerConfig, GetRecordsConsumer, OrderProcessor};
///
/// async fn consume(client: aws_sdk_kinesis::Client) -> kinesis_getrecords::Result<()> {
///     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
///     let (consumer, _monitoring_rx) = GetRecordsConsumer::new(
///         ConsumerConfig::new("orders"),
///         OrderProcessor::new(),
///         client,
///     )?;
///     consumer.run(shutdown_rx).await
/// }
/// ```
pub struct GetRecordsConsumer<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    context: ProcessingContext<P, C>,
}

impl<P, C> GetRecordsConsumer<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    /// Creates a new consumer
    ///
    /// Returns the consumer and, when monitoring is enabled, the receiving end
    /// of the monitoring channel. Fails with [`ConsumerError::ConfigError`]
    /// if `config` does not validate.
    pub fn new(
        config: ConsumerConfig,
        processor: P,
        client: C,
    ) -> Result<(Self, Option<mpsc::Receiver<ProcessingEvent>>)> {
        config.validate()?;

        let (monitoring_tx, monitoring_rx) = if config.monitoring.enabled {
            let (tx, rx) = mpsc::channel(config.monitoring.channel_size);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let context = ProcessingContext {
            processor: Arc::new(processor),
            client: Arc::new(client),
            config,
            monitoring_tx,
        };

        Ok((Self { context }, monitoring_rx))
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.context.config
    }

    /// Discover every shard and position its cursor
    ///
    /// Returns a poll loop that owns the discovered cursors.
    pub async fn enumerate_shards(&self) -> Result<PollLoop<P, C>> {
        let enumerator = ShardEnumerator::new(
            self.context.client.as_ref(),
            &self.context.config.stream_name,
            &self.context.config.initial_position,
        )
        .with_monitoring(self.context.monitoring_tx());

        let cursors = enumerator.enumerate().await?;
        Ok(PollLoop::new(self.context.clone(), cursors))
    }

    /// Starts consuming the stream
    ///
    /// Returns `Ok(())` once shutdown has been requested, or the fatal error
    /// that stopped shard enumeration.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(stream = %self.context.config.stream_name, "Starting GetRecords consumer");
        info!("Fetching shards and iterators");

        let poll_loop = self.enumerate_shards().await?;

        if *shutdown.borrow() {
            info!("Shutdown signal received before polling started");
            return Ok(());
        }

        poll_loop.run(shutdown).await?;

        info!("Consumer shutdown complete");
        Ok(())
    }
}
