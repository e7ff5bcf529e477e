use async_trait::async_trait;
use aws_sdk_kinesis::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{Record, ShardIteratorType},
    Client,
};
use aws_smithy_types_convert::date_time::DateTimeExt;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::SystemTime;
use thiserror::Error;
use tracing::trace;

/// Failures returned by the stream service, classified by error code
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinesisClientError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Iterator expired")]
    ExpiredIterator,

    #[error("Throughput exceeded")]
    ThroughputExceeded,

    #[error("Access denied")]
    AccessDenied,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("KMS error: {0}")]
    KmsError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("{0}")]
    Other(String),
}

impl KinesisClientError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match &err {
            SdkError::TimeoutError(_) => {
                return KinesisClientError::Timeout(DisplayErrorContext(&err).to_string())
            }
            SdkError::DispatchFailure(_) => {
                return KinesisClientError::ConnectionError(DisplayErrorContext(&err).to_string())
            }
            _ => {}
        }

        let message = err.message().unwrap_or_default().to_string();
        match err.code() {
            Some("ResourceNotFoundException") => KinesisClientError::ResourceNotFound(message),
            Some("ExpiredIteratorException") => KinesisClientError::ExpiredIterator,
            Some("ProvisionedThroughputExceededException") | Some("LimitExceededException") => {
                KinesisClientError::ThroughputExceeded
            }
            Some("AccessDeniedException") => KinesisClientError::AccessDenied,
            Some("InvalidArgumentException") => KinesisClientError::InvalidArgument(message),
            Some(code) if code.starts_with("KMS") => KinesisClientError::KmsError(message),
            _ => KinesisClientError::Other(DisplayErrorContext(&err).to_string()),
        }
    }
}

/// One page of a stream description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDescriptionPage {
    pub shard_ids: Vec<String>,
    pub has_more_shards: bool,
}

/// A record as returned by `GetRecords`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRecord {
    pub sequence_number: String,
    pub partition_key: String,
    pub payload: Bytes,
    pub approximate_arrival: Option<DateTime<Utc>>,
}

impl FetchedRecord {
    fn from_sdk(record: &Record) -> Self {
        Self {
            sequence_number: record.sequence_number().to_string(),
            partition_key: record.partition_key().to_string(),
            payload: Bytes::copy_from_slice(record.data().as_ref()),
            approximate_arrival: record
                .approximate_arrival_timestamp()
                .and_then(|ts| ts.to_chrono_utc().ok()),
        }
    }
}

/// Result of a single `GetRecords` call
///
/// `next_cursor` is `None` once the shard has been closed and every record
/// in it has been returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBatch {
    pub records: Vec<FetchedRecord>,
    pub next_cursor: Option<String>,
    pub millis_behind_latest: Option<i64>,
}

#[async_trait]
pub trait KinesisClientTrait: Send + Sync {
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescriptionPage, KinesisClientError>;

    async fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
        sequence_number: Option<&str>,
        timestamp: Option<&DateTime<Utc>>,
    ) -> Result<String, KinesisClientError>;

    async fn get_records(
        &self,
        iterator: &str,
        limit: i32,
    ) -> Result<FetchedBatch, KinesisClientError>;
}

#[async_trait]
impl KinesisClientTrait for Client {
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescriptionPage, KinesisClientError> {
        let response = self
            .describe_stream()
            .stream_name(stream_name)
            .set_exclusive_start_shard_id(exclusive_start_shard_id.map(String::from))
            .send()
            .await
            .map_err(KinesisClientError::from_sdk)?;

        let description = response.stream_description().ok_or_else(|| {
            KinesisClientError::Other("DescribeStream returned no stream description".to_string())
        })?;

        Ok(StreamDescriptionPage {
            shard_ids: description
                .shards()
                .iter()
                .map(|shard| shard.shard_id().to_string())
                .collect(),
            has_more_shards: description.has_more_shards(),
        })
    }

    async fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
        sequence_number: Option<&str>,
        timestamp: Option<&DateTime<Utc>>,
    ) -> Result<String, KinesisClientError> {
        let mut req = self
            .get_shard_iterator()
            .stream_name(stream_name)
            .shard_id(shard_id)
            .shard_iterator_type(iterator_type);

        if let Some(seq) = sequence_number {
            req = req.starting_sequence_number(seq);
        }

        if let Some(ts) = timestamp {
            let system_time: SystemTime = (*ts).into();
            req = req.timestamp(aws_smithy_types::DateTime::from(system_time));
        }

        let response = req.send().await.map_err(KinesisClientError::from_sdk)?;
        response
            .shard_iterator()
            .map(String::from)
            .ok_or_else(|| {
                KinesisClientError::Other(format!("No shard iterator returned for {}", shard_id))
            })
    }

    async fn get_records(
        &self,
        iterator: &str,
        limit: i32,
    ) -> Result<FetchedBatch, KinesisClientError> {
        let response = self
            .get_records()
            .shard_iterator(iterator)
            .limit(limit)
            .send()
            .await
            .map_err(KinesisClientError::from_sdk)?;

        trace!(
            records = response.records().len(),
            millis_behind_latest = ?response.millis_behind_latest(),
            "GetRecords returned"
        );

        Ok(FetchedBatch {
            records: response.records().iter().map(FetchedRecord::from_sdk).collect(),
            next_cursor: response.next_shard_iterator().map(String::from),
            millis_behind_latest: response.millis_behind_latest(),
        })
    }
}
