use crate::client::{
    FetchedBatch, FetchedRecord, KinesisClientError, KinesisClientTrait, StreamDescriptionPage,
};
use crate::error::ProcessingError;
use crate::order::{decode_payload, Order};
use crate::processor::RecordProcessor;
use crate::test::TestUtils;
use async_trait::async_trait;
use aws_sdk_kinesis::types::ShardIteratorType;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::debug;

/// A `GetShardIterator` call as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct IteratorRequest {
    pub stream_name: String,
    pub shard_id: String,
    pub iterator_type: ShardIteratorType,
    pub sequence_number: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MockShard {
    /// Every record ever put, including trimmed ones
    records: Vec<FetchedRecord>,
    /// Number of leading records no longer retained
    trimmed: usize,
    closed: bool,
}

#[derive(Debug, Default)]
struct MockStream {
    /// Shard ids in description order; may repeat to simulate overlapping pages
    listing: Vec<String>,
    shards: HashMap<String, MockShard>,
}

#[derive(Debug, Clone)]
struct IssuedIterator {
    stream_name: String,
    shard_id: String,
    position: usize,
}

#[derive(Debug)]
struct MockState {
    streams: HashMap<String, MockStream>,
    iterators: HashMap<String, IssuedIterator>,
    next_iterator: u64,
    next_sequence: u64,
    describe_page_size: usize,
    advance_on_empty: bool,
    describe_errors: VecDeque<KinesisClientError>,
    iterator_errors: VecDeque<KinesisClientError>,
    get_records_errors: HashMap<String, VecDeque<KinesisClientError>>,
    describe_calls: usize,
    iterator_requests: Vec<IteratorRequest>,
    get_records_calls: Vec<String>,
    last_responses: HashMap<String, FetchedBatch>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
            iterators: HashMap::new(),
            next_iterator: 0,
            next_sequence: 0,
            describe_page_size: 100,
            advance_on_empty: false,
            describe_errors: VecDeque::new(),
            iterator_errors: VecDeque::new(),
            get_records_errors: HashMap::new(),
            describe_calls: 0,
            iterator_requests: Vec::new(),
            get_records_calls: Vec::new(),
            last_responses: HashMap::new(),
        }
    }
}

impl MockState {
    fn issue_iterator(&mut self, stream_name: &str, shard_id: &str, position: usize) -> String {
        self.next_iterator += 1;
        let token = format!("iterator-{}-{}", shard_id, self.next_iterator);
        self.iterators.insert(
            token.clone(),
            IssuedIterator {
                stream_name: stream_name.to_string(),
                shard_id: shard_id.to_string(),
                position,
            },
        );
        token
    }

    fn shard_mut(&mut self, stream_name: &str, shard_id: &str) -> &mut MockShard {
        self.streams
            .get_mut(stream_name)
            .and_then(|s| s.shards.get_mut(shard_id))
            .unwrap_or_else(|| panic!("unknown shard {}/{}", stream_name, shard_id))
    }
}

/// In-memory stand-in for the Kinesis service
///
/// Streams hold real records; iterators are opaque tokens mapped to a
/// position, so cursor bookkeeping behaves like the real service. Errors can
/// be queued per call type to exercise failure paths.
#[derive(Debug, Default, Clone)]
pub struct MockKinesisClient {
    state: Arc<Mutex<MockState>>,
}

impl MockKinesisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_stream(&self, stream_name: &str, shard_ids: &[&str]) {
        let mut stream = MockStream::default();
        for shard_id in shard_ids {
            stream.listing.push(shard_id.to_string());
            stream.shards.entry(shard_id.to_string()).or_default();
        }
        self.state
            .lock()
            .streams
            .insert(stream_name.to_string(), stream);
    }

    /// Append a record and return its sequence number
    pub async fn put_record(&self, stream_name: &str, shard_id: &str, data: Vec<u8>) -> String {
        self.put_record_at(stream_name, shard_id, data, Utc::now())
            .await
    }

    pub async fn put_record_at(
        &self,
        stream_name: &str,
        shard_id: &str,
        data: Vec<u8>,
        arrival: DateTime<Utc>,
    ) -> String {
        let mut state = self.state.lock();
        state.next_sequence += 1;
        let sequence_number = format!("4959{:020}", state.next_sequence);
        let shard = state.shard_mut(stream_name, shard_id);
        assert!(!shard.closed, "cannot put into closed shard {}", shard_id);
        shard.records.push(FetchedRecord {
            sequence_number: sequence_number.clone(),
            partition_key: format!("pk-{}", shard_id),
            payload: Bytes::from(data),
            approximate_arrival: Some(arrival),
        });
        sequence_number
    }

    /// Append `count` well-formed order records
    pub async fn put_records(&self, stream_name: &str, shard_id: &str, count: usize) -> Vec<String> {
        let mut sequences = Vec::with_capacity(count);
        for i in 0..count {
            let order = TestUtils::create_test_order(&format!("{}-order-{}", shard_id, i), 1);
            sequences.push(
                self.put_record(stream_name, shard_id, TestUtils::order_payload(&order))
                    .await,
            );
        }
        sequences
    }

    /// Drop the oldest `count` records from retention
    pub async fn trim_shard(&self, stream_name: &str, shard_id: &str, count: usize) {
        let mut state = self.state.lock();
        let shard = state.shard_mut(stream_name, shard_id);
        shard.trimmed = (shard.trimmed + count).min(shard.records.len());
    }

    pub async fn close_shard(&self, stream_name: &str, shard_id: &str) {
        self.state.lock().shard_mut(stream_name, shard_id).closed = true;
    }

    pub async fn set_describe_page_size(&self, size: usize) {
        self.state.lock().describe_page_size = size.max(1);
    }

    /// Whether an empty fetch hands out a fresh iterator token
    pub async fn set_advance_on_empty(&self, advance: bool) {
        self.state.lock().advance_on_empty = advance;
    }

    pub async fn fail_next_describe(&self, error: KinesisClientError) {
        self.state.lock().describe_errors.push_back(error);
    }

    pub async fn fail_next_get_iterator(&self, error: KinesisClientError) {
        self.state.lock().iterator_errors.push_back(error);
    }

    pub async fn fail_next_get_records(&self, shard_id: &str, error: KinesisClientError) {
        self.state
            .lock()
            .get_records_errors
            .entry(shard_id.to_string())
            .or_default()
            .push_back(error);
    }

    pub async fn describe_call_count(&self) -> usize {
        self.state.lock().describe_calls
    }

    pub async fn iterator_requests(&self) -> Vec<IteratorRequest> {
        self.state.lock().iterator_requests.clone()
    }

    /// Shard ids of every `GetRecords` call, in call order
    pub async fn get_records_calls(&self) -> Vec<String> {
        self.state.lock().get_records_calls.clone()
    }

    pub async fn get_records_call_count(&self) -> usize {
        self.state.lock().get_records_calls.len()
    }

    pub async fn last_get_records_response(&self, shard_id: &str) -> Option<FetchedBatch> {
        self.state.lock().last_responses.get(shard_id).cloned()
    }
}

#[async_trait]
impl KinesisClientTrait for MockKinesisClient {
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescriptionPage, KinesisClientError> {
        let mut state = self.state.lock();
        state.describe_calls += 1;

        if let Some(error) = state.describe_errors.pop_front() {
            return Err(error);
        }

        let page_size = state.describe_page_size;
        let stream = state.streams.get(stream_name).ok_or_else(|| {
            KinesisClientError::ResourceNotFound(format!(
                "Stream {} under account 000000000000 not found.",
                stream_name
            ))
        })?;

        let start = match exclusive_start_shard_id {
            Some(id) => match stream.listing.iter().position(|s| s == id) {
                Some(pos) => pos + 1,
                None => stream.listing.len(),
            },
            None => 0,
        };
        let end = (start + page_size).min(stream.listing.len());

        Ok(StreamDescriptionPage {
            shard_ids: stream.listing[start..end].to_vec(),
            has_more_shards: end < stream.listing.len(),
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
        let mut state = self.state.lock();
        state.iterator_requests.push(IteratorRequest {
            stream_name: stream_name.to_string(),
            shard_id: shard_id.to_string(),
            iterator_type: iterator_type.clone(),
            sequence_number: sequence_number.map(String::from),
            timestamp: timestamp.copied(),
        });

        if let Some(error) = state.iterator_errors.pop_front() {
            return Err(error);
        }

        let shard = state
            .streams
            .get(stream_name)
            .and_then(|s| s.shards.get(shard_id))
            .ok_or_else(|| {
                KinesisClientError::ResourceNotFound(format!("Shard {} not found", shard_id))
            })?;

        let find_sequence = |seq: Option<&str>| {
            let seq = seq.ok_or_else(|| {
                KinesisClientError::InvalidArgument("StartingSequenceNumber missing".to_string())
            })?;
            shard
                .records
                .iter()
                .position(|r| r.sequence_number == seq)
                .ok_or_else(|| {
                    KinesisClientError::InvalidArgument(format!("Unknown sequence number {}", seq))
                })
        };

        let position = match iterator_type {
            ShardIteratorType::TrimHorizon => shard.trimmed,
            ShardIteratorType::Latest => shard.records.len(),
            ShardIteratorType::AtSequenceNumber => find_sequence(sequence_number)?,
            ShardIteratorType::AfterSequenceNumber => find_sequence(sequence_number)? + 1,
            ShardIteratorType::AtTimestamp => {
                let ts = timestamp.ok_or_else(|| {
                    KinesisClientError::InvalidArgument("Timestamp missing".to_string())
                })?;
                shard
                    .records
                    .iter()
                    .enumerate()
                    .skip(shard.trimmed)
                    .find(|(_, r)| r.approximate_arrival.is_some_and(|at| at >= *ts))
                    .map_or(shard.records.len(), |(i, _)| i)
            }
            other => {
                return Err(KinesisClientError::InvalidArgument(format!(
                    "Unsupported iterator type {:?}",
                    other
                )))
            }
        };

        debug!(shard_id = %shard_id, position, "Mock issued iterator");
        Ok(state.issue_iterator(stream_name, shard_id, position))
    }

    async fn get_records(
        &self,
        iterator: &str,
        limit: i32,
    ) -> Result<FetchedBatch, KinesisClientError> {
        let mut state = self.state.lock();

        let issued = state.iterators.get(iterator).cloned().ok_or_else(|| {
            KinesisClientError::InvalidArgument(format!("Unknown shard iterator {}", iterator))
        })?;
        state.get_records_calls.push(issued.shard_id.clone());

        if let Some(error) = state
            .get_records_errors
            .get_mut(&issued.shard_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let advance_on_empty = state.advance_on_empty;
        let shard = state.shard_mut(&issued.stream_name, &issued.shard_id);
        let start = issued.position.max(shard.trimmed);
        let end = (start + limit.max(0) as usize).min(shard.records.len());
        let records = shard.records[start..end].to_vec();
        let drained = shard.closed && end == shard.records.len();

        let next_cursor = if drained {
            None
        } else if records.is_empty() && !advance_on_empty {
            Some(iterator.to_string())
        } else {
            Some(state.issue_iterator(&issued.stream_name, &issued.shard_id, end))
        };

        let batch = FetchedBatch {
            records,
            next_cursor,
            millis_behind_latest: Some(0),
        };
        state
            .last_responses
            .insert(issued.shard_id.clone(), batch.clone());
        Ok(batch)
    }
}

/// Record processor that remembers what it was given
#[derive(Debug, Clone, Default)]
pub struct MockRecordProcessor {
    processed_records: Arc<RwLock<Vec<(String, FetchedRecord)>>>,
    decoded_orders: Arc<RwLock<Vec<Order>>>,
    attempted: Arc<RwLock<Vec<String>>>,
    error_count: Arc<RwLock<usize>>,
    failure_sequences: Arc<RwLock<HashSet<String>>>,
    decode_orders: Arc<RwLock<bool>>,
}

impl MockRecordProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode payloads as orders and fail records that do not decode
    pub async fn set_decode_orders(&self, decode: bool) {
        *self.decode_orders.write().await = decode;
    }

    pub async fn set_failure_sequences(&self, sequences: Vec<String>) {
        debug!(sequences = ?sequences, "Setting failure sequences");
        self.failure_sequences.write().await.extend(sequences);
    }

    pub async fn get_process_count(&self) -> usize {
        self.processed_records.read().await.len()
    }

    pub async fn get_error_count(&self) -> usize {
        *self.error_count.read().await
    }

    pub async fn get_processed_records(&self) -> Vec<(String, FetchedRecord)> {
        self.processed_records.read().await.clone()
    }

    pub async fn get_processed_sequences(&self) -> Vec<String> {
        self.processed_records
            .read()
            .await
            .iter()
            .map(|(_, r)| r.sequence_number.clone())
            .collect()
    }

    /// Every sequence number handed to the processor, failed ones included
    pub async fn get_attempted_sequences(&self) -> Vec<String> {
        self.attempted.read().await.clone()
    }

    pub async fn get_decoded_orders(&self) -> Vec<Order> {
        self.decoded_orders.read().await.clone()
    }
}

#[async_trait]
impl RecordProcessor for MockRecordProcessor {
    async fn process_record(
        &self,
        shard_id: &str,
        record: &FetchedRecord,
    ) -> Result<(), ProcessingError> {
        self.attempted
            .write()
            .await
            .push(record.sequence_number.clone());

        if self
            .failure_sequences
            .read()
            .await
            .contains(&record.sequence_number)
        {
            *self.error_count.write().await += 1;
            return Err(ProcessingError::failed(anyhow::anyhow!(
                "Simulated failure for {}",
                record.sequence_number
            )));
        }

        if *self.decode_orders.read().await {
            match decode_payload::<Order>(&record.payload) {
                Ok(order) => self.decoded_orders.write().await.push(order),
                Err(e) => {
                    *self.error_count.write().await += 1;
                    return Err(e.into());
                }
            }
        }

        self.processed_records
            .write()
            .await
            .push((shard_id.to_string(), record.clone()));
        Ok(())
    }
}
