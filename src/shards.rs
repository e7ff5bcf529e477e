//! Shard discovery
//!
//! Walks the paginated stream description once and positions a cursor on
//! every shard it finds.

use crate::client::{KinesisClientError, KinesisClientTrait};
use crate::error::{ConsumerError, Result};
use crate::monitoring::{ProcessingEvent, ShardEventType};
use crate::processor::InitialPosition;
use aws_sdk_kinesis::types::ShardIteratorType;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A shard and the cursor the poll loop will read it with next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCursor {
    pub shard_id: String,
    /// `None` once the service reports the shard closed and drained
    pub cursor: Option<String>,
    /// Sequence number of the last record delivered from this shard
    pub last_sequence_number: Option<String>,
}

impl ShardCursor {
    pub fn new(shard_id: impl Into<String>, cursor: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
            cursor: Some(cursor.into()),
            last_sequence_number: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Where a new iterator should point
#[derive(Clone, Copy)]
pub(crate) enum IteratorStart<'a> {
    Initial(&'a InitialPosition),
    AfterSequenceNumber(&'a str),
}

impl<'a> IteratorStart<'a> {
    fn request(self) -> (ShardIteratorType, Option<&'a str>, Option<&'a DateTime<Utc>>) {
        match self {
            IteratorStart::Initial(position) => match position {
                InitialPosition::TrimHorizon => (ShardIteratorType::TrimHorizon, None, None),
                InitialPosition::Latest => (ShardIteratorType::Latest, None, None),
                InitialPosition::AtTimestamp(ts) => (ShardIteratorType::AtTimestamp, None, Some(ts)),
            },
            IteratorStart::AfterSequenceNumber(seq) => {
                (ShardIteratorType::AfterSequenceNumber, Some(seq), None)
            }
        }
    }
}

/// Request a fresh iterator for one shard
pub(crate) async fn acquire_iterator<C>(
    client: &C,
    stream_name: &str,
    shard_id: &str,
    start: IteratorStart<'_>,
) -> std::result::Result<String, KinesisClientError>
where
    C: KinesisClientTrait + ?Sized,
{
    let (iterator_type, sequence_number, timestamp) = start.request();
    debug!(
        shard_id = %shard_id,
        iterator_type = ?iterator_type,
        sequence = ?sequence_number,
        "Requesting shard iterator"
    );
    client
        .get_shard_iterator(stream_name, shard_id, iterator_type, sequence_number, timestamp)
        .await
}

/// Builds the list of shard cursors for a stream
pub struct ShardEnumerator<'a, C: KinesisClientTrait + ?Sized> {
    client: &'a C,
    stream_name: &'a str,
    initial_position: &'a InitialPosition,
    monitoring_tx: Option<&'a mpsc::Sender<ProcessingEvent>>,
}

impl<'a, C: KinesisClientTrait + ?Sized> ShardEnumerator<'a, C> {
    pub fn new(
        client: &'a C,
        stream_name: &'a str,
        initial_position: &'a InitialPosition,
    ) -> Self {
        Self {
            client,
            stream_name,
            initial_position,
            monitoring_tx: None,
        }
    }

    pub fn with_monitoring(mut self, tx: Option<&'a mpsc::Sender<ProcessingEvent>>) -> Self {
        self.monitoring_tx = tx;
        self
    }

    /// Collect every shard id of the stream, following description pages
    ///
    /// Ids keep the order the service returned them in; repeats are dropped.
    pub async fn list_shard_ids(&self) -> Result<Vec<String>> {
        let mut shard_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut exclusive_start: Option<String> = None;

        loop {
            let page = self
                .client
                .describe_stream(self.stream_name, exclusive_start.as_deref())
                .await
                .map_err(|e| {
                    error!(stream = %self.stream_name, error = %e, "Failed to describe stream");
                    ConsumerError::describe_failed(self.stream_name, e)
                })?;

            debug!(
                stream = %self.stream_name,
                shards = page.shard_ids.len(),
                has_more_shards = page.has_more_shards,
                "Received stream description page"
            );

            let last_on_page = page.shard_ids.last().cloned();
            for shard_id in page.shard_ids {
                if seen.insert(shard_id.clone()) {
                    shard_ids.push(shard_id);
                } else {
                    debug!(shard_id = %shard_id, "Skipping duplicate shard id");
                }
            }

            if !page.has_more_shards {
                break;
            }

            match last_on_page {
                Some(last) if exclusive_start.as_deref() != Some(last.as_str()) => {
                    exclusive_start = Some(last);
                }
                _ => {
                    warn!(
                        stream = %self.stream_name,
                        "Stream description reported more shards without advancing, stopping"
                    );
                    break;
                }
            }
        }

        Ok(shard_ids)
    }

    /// Discover all shards and acquire an initial cursor for each
    pub async fn enumerate(&self) -> Result<Vec<ShardCursor>> {
        let shard_ids = self.list_shard_ids().await?;
        let mut cursors = Vec::with_capacity(shard_ids.len());

        for shard_id in shard_ids {
            let cursor = acquire_iterator(
                self.client,
                self.stream_name,
                &shard_id,
                IteratorStart::Initial(self.initial_position),
            )
            .await
            .map_err(|source| {
                error!(shard_id = %shard_id, error = %source, "Failed to get initial iterator");
                ConsumerError::GetIteratorFailed {
                    shard_id: shard_id.clone(),
                    source,
                }
            })?;

            if let Some(tx) = self.monitoring_tx {
                let event = ProcessingEvent::shard_event(
                    shard_id.clone(),
                    ShardEventType::Discovered,
                    Some(format!("{:?}", self.initial_position)),
                );
                if let Err(e) = tx.send(event).await {
                    warn!(error = %e, "Failed to send monitoring event");
                }
            }

            cursors.push(ShardCursor::new(shard_id, cursor));
        }

        info!(
            stream = %self.stream_name,
            shard_count = cursors.len(),
            initial_position = ?self.initial_position,
            "Acquired shard iterators"
        );

        Ok(cursors)
    }
}
