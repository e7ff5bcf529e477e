// tests/common/mod.rs
#![allow(dead_code)]

use kinesis_getrecords::monitoring::MonitoringConfig;
use kinesis_getrecords::test::mocks::{MockKinesisClient, MockRecordProcessor};
use kinesis_getrecords::{
    ConsumerConfig, GetRecordsConsumer, InitialPosition, PollLoop, PollSchedule,
};

use std::sync::Once;
use std::time::Duration;

pub const STREAM: &str = "orders";

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("kinesis_getrecords=debug".parse().unwrap()),
            )
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .ok();
    });
}

pub fn create_test_config() -> ConsumerConfig {
    ConsumerConfig {
        stream_name: STREAM.to_string(),
        batch_size: 200,
        initial_position: InitialPosition::TrimHorizon,
        poll_schedule: PollSchedule::Fixed(Duration::from_millis(10)),
        monitoring: MonitoringConfig::default(),
    }
}

pub struct TestContext {
    pub config: ConsumerConfig,
    pub client: MockKinesisClient,
    pub processor: MockRecordProcessor,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging();
        Self {
            config: create_test_config(),
            client: MockKinesisClient::new(),
            processor: MockRecordProcessor::new(),
        }
    }

    pub fn consumer(&self) -> GetRecordsConsumer<MockRecordProcessor, MockKinesisClient> {
        let (consumer, _monitoring_rx) = GetRecordsConsumer::new(
            self.config.clone(),
            self.processor.clone(),
            self.client.clone(),
        )
        .expect("test config should be valid");
        consumer
    }

    pub async fn poll_loop(&self) -> PollLoop<MockRecordProcessor, MockKinesisClient> {
        self.consumer()
            .enumerate_shards()
            .await
            .expect("shard enumeration should succeed")
    }
}

/// Wait until the processor has seen `expected_records` records
pub async fn verify_processing_complete(
    processor: &MockRecordProcessor,
    expected_records: usize,
    timeout: Duration,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    while processor.get_process_count().await < expected_records {
        if start.elapsed() > timeout {
            anyhow::bail!(
                "Timeout waiting for {} records to be processed, got {}",
                expected_records,
                processor.get_process_count().await
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
