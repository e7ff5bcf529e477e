//! Kinesis GetRecords - a minimal AWS Kinesis stream consumer
//!
//! This crate discovers the shards of a stream, positions a cursor on each
//! one (the trim horizon by default) and polls every shard in turn with
//! `GetRecords`, handing each record to a [`RecordProcessor`].

pub mod client;
pub mod error;
pub mod monitoring;
pub mod order;
pub mod poller;
pub mod processor;
pub mod schedule;
pub mod shards;

// Make test utilities available for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use client::{FetchedBatch, FetchedRecord, KinesisClientError, KinesisClientTrait};
pub use error::{ConsumerError, DecodeError, ProcessingError, Result};
pub use order::{JsonRecordProcessor, Order, OrderProcessor};
pub use poller::{PassSummary, PollLoop};
pub use processor::{ConsumerConfig, GetRecordsConsumer, InitialPosition, RecordProcessor};
pub use schedule::{Backoff, ExponentialBackoff, FixedBackoff, PollSchedule};
pub use shards::{ShardCursor, ShardEnumerator};
