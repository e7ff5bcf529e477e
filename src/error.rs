//! Error types for the Kinesis consumer

use crate::client::KinesisClientError;
use thiserror::Error;

/// Main error type for consumer operations
///
/// Everything here is fatal to [`crate::GetRecordsConsumer::run`]. Failures
/// that only affect one record or one fetch are logged by the poll loop and
/// never surface as a `ConsumerError`.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Failed to describe stream {stream}: {source}")]
    DescribeStreamFailed {
        stream: String,
        #[source]
        source: KinesisClientError,
    },

    #[error("Failed to get iterator for shard {shard_id}: {source}")]
    GetIteratorFailed {
        shard_id: String,
        #[source]
        source: KinesisClientError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConsumerError {
    pub(crate) fn describe_failed(stream: &str, err: KinesisClientError) -> Self {
        match err {
            KinesisClientError::ResourceNotFound(_) => {
                ConsumerError::StreamNotFound(stream.to_string())
            }
            source => ConsumerError::DescribeStreamFailed {
                stream: stream.to_string(),
                source,
            },
        }
    }
}

/// Result type for consumer operations
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Payload could not be turned into the domain type
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Payload is not valid JSON for the expected schema: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Per-record failure reported by a [`crate::RecordProcessor`]
///
/// Always recoverable: the poll loop logs it and moves on to the next record.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to deserialize record: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to process record: {0}")]
    Failed(#[source] anyhow::Error),
}

impl ProcessingError {
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        ProcessingError::Failed(err.into())
    }
}
