//! The poll loop
//!
//! Owns the shard cursors produced by enumeration. Every pass visits the
//! shards in order, fetches one bounded batch per shard, replaces the
//! shard's cursor with the one returned and hands each record to the
//! [`RecordProcessor`](crate::RecordProcessor).
//!
//! Failures never stop the loop: a record that cannot be processed is logged
//! and skipped, and a shard whose fetch fails is skipped for the pass with
//! its cursor left untouched.

use crate::client::{FetchedBatch, KinesisClientError, KinesisClientTrait};
use crate::error::Result;
use crate::monitoring::{IteratorEventType, ProcessingEvent, ShardEventType};
use crate::processor::{ProcessingContext, RecordProcessor};
use crate::schedule::{PollScheduler, WaitOutcome};
use crate::shards::{acquire_iterator, IteratorStart, ShardCursor};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// What happened during one pass over all shards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    /// Shards a fetch was attempted on
    pub shards_polled: usize,
    /// Closed shards skipped without a service call
    pub closed_shards: usize,
    pub records_fetched: usize,
    pub records_processed: usize,
    pub records_failed: usize,
    pub fetch_failures: usize,
    pub duration: Duration,
}

/// Polls every shard in turn until shutdown
pub struct PollLoop<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    ctx: ProcessingContext<P, C>,
    cursors: Vec<ShardCursor>,
    scheduler: PollScheduler,
    passes: u64,
}

impl<P, C> PollLoop<P, C>
where
    P: RecordProcessor + 'static,
    C: KinesisClientTrait + 'static,
{
    pub(crate) fn new(ctx: ProcessingContext<P, C>, cursors: Vec<ShardCursor>) -> Self {
        let scheduler = PollScheduler::new(&ctx.config.poll_schedule);
        Self {
            ctx,
            cursors,
            scheduler,
            passes: 0,
        }
    }

    /// Current cursor of every shard, in polling order
    pub fn cursors(&self) -> &[ShardCursor] {
        &self.cursors
    }

    /// Number of completed passes
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run passes until `shutdown` turns true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(shard_count = self.cursors.len(), "Polling shards");

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received");
                break;
            }

            let summary = self.poll_once().await;
            let delay = self.scheduler.next_delay(summary.records_fetched);
            trace!(
                pass = self.passes,
                delay_ms = %delay.as_millis(),
                "Waiting before next pass"
            );

            if self.scheduler.wait(delay, &mut shutdown).await == WaitOutcome::Shutdown {
                info!("Shutdown signal received");
                break;
            }
        }

        info!(passes = self.passes, "Poll loop stopped");
        Ok(())
    }

    /// Visit every shard once
    pub async fn poll_once(&mut self) -> PassSummary {
        let start = Instant::now();
        let mut summary = PassSummary::default();

        for cursor in self.cursors.iter_mut() {
            Self::poll_shard(&self.ctx, cursor, &mut summary).await;
        }

        self.passes += 1;
        summary.duration = start.elapsed();

        debug!(
            pass = self.passes,
            shards_polled = summary.shards_polled,
            closed_shards = summary.closed_shards,
            records_fetched = summary.records_fetched,
            records_failed = summary.records_failed,
            fetch_failures = summary.fetch_failures,
            duration_ms = %summary.duration.as_millis(),
            "Pass complete"
        );

        summary
    }

    async fn poll_shard(
        ctx: &ProcessingContext<P, C>,
        shard: &mut ShardCursor,
        summary: &mut PassSummary,
    ) {
        let Some(iterator) = shard.cursor.clone() else {
            trace!(shard_id = %shard.shard_id, "Shard closed, skipping");
            summary.closed_shards += 1;
            return;
        };

        summary.shards_polled += 1;
        let fetch_start = Instant::now();

        match ctx.client.get_records(&iterator, ctx.config.batch_size).await {
            Ok(batch) => {
                Self::handle_batch(ctx, shard, &iterator, batch, fetch_start.elapsed(), summary)
                    .await;
            }
            Err(KinesisClientError::ExpiredIterator) => {
                summary.fetch_failures += 1;
                warn!(shard_id = %shard.shard_id, "Iterator expired");
                ctx.send_monitoring_event(ProcessingEvent::iterator(
                    shard.shard_id.clone(),
                    IteratorEventType::Expired,
                    None,
                ))
                .await;
                Self::renew_cursor(ctx, shard).await;
            }
            Err(e) => {
                summary.fetch_failures += 1;
                warn!(
                    shard_id = %shard.shard_id,
                    error = %e,
                    "Failed to get records, skipping shard for this pass"
                );
                ctx.send_monitoring_event(ProcessingEvent::fetch_failed(
                    shard.shard_id.clone(),
                    e.to_string(),
                ))
                .await;
            }
        }
    }

    async fn handle_batch(
        ctx: &ProcessingContext<P, C>,
        shard: &mut ShardCursor,
        iterator: &str,
        batch: FetchedBatch,
        fetch_duration: Duration,
        summary: &mut PassSummary,
    ) {
        let cursor_advanced = batch.next_cursor.as_deref() != Some(iterator);
        // Always take the returned cursor, even when the batch is empty
        shard.cursor = batch.next_cursor;
        summary.records_fetched += batch.records.len();

        trace!(
            shard_id = %shard.shard_id,
            records = batch.records.len(),
            cursor_advanced,
            millis_behind_latest = ?batch.millis_behind_latest,
            "Fetched batch"
        );

        ctx.send_monitoring_event(ProcessingEvent::fetch_complete(
            shard.shard_id.clone(),
            batch.records.len(),
            batch.millis_behind_latest,
            cursor_advanced,
            fetch_duration,
        ))
        .await;

        for record in &batch.records {
            shard.last_sequence_number = Some(record.sequence_number.clone());

            match ctx.processor.process_record(&shard.shard_id, record).await {
                Ok(()) => {
                    summary.records_processed += 1;
                    ctx.send_monitoring_event(ProcessingEvent::record_processed(
                        shard.shard_id.clone(),
                        record.sequence_number.clone(),
                    ))
                    .await;
                }
                Err(e) => {
                    summary.records_failed += 1;
                    error!(
                        shard_id = %shard.shard_id,
                        sequence = %record.sequence_number,
                        error = %e,
                        "Failed to process record"
                    );
                    ctx.send_monitoring_event(ProcessingEvent::record_failed(
                        shard.shard_id.clone(),
                        record.sequence_number.clone(),
                        e.to_string(),
                    ))
                    .await;
                }
            }
        }

        if shard.is_closed() {
            info!(
                shard_id = %shard.shard_id,
                last_sequence = ?shard.last_sequence_number,
                "Shard closed and fully read"
            );
            ctx.send_monitoring_event(ProcessingEvent::shard_event(
                shard.shard_id.clone(),
                ShardEventType::Closed,
                shard.last_sequence_number.clone(),
            ))
            .await;
        }
    }

    /// Replace an expired cursor
    ///
    /// Resumes after the last delivered record, or at the initial position
    /// when nothing has been delivered yet. On failure the old cursor stays
    /// and renewal is attempted again on the next pass.
    async fn renew_cursor(ctx: &ProcessingContext<P, C>, shard: &mut ShardCursor) {
        let start = match shard.last_sequence_number.as_deref() {
            Some(seq) => IteratorStart::AfterSequenceNumber(seq),
            None => IteratorStart::Initial(&ctx.config.initial_position),
        };

        match acquire_iterator(
            ctx.client.as_ref(),
            &ctx.config.stream_name,
            &shard.shard_id,
            start,
        )
        .await
        {
            Ok(iterator) => {
                info!(
                    shard_id = %shard.shard_id,
                    after_sequence = ?shard.last_sequence_number,
                    "Renewed shard iterator"
                );
                shard.cursor = Some(iterator);
                ctx.send_monitoring_event(ProcessingEvent::iterator(
                    shard.shard_id.clone(),
                    IteratorEventType::Renewed,
                    None,
                ))
                .await;
            }
            Err(e) => {
                warn!(
                    shard_id = %shard.shard_id,
                    error = %e,
                    "Failed to renew shard iterator"
                );
                ctx.send_monitoring_event(ProcessingEvent::iterator(
                    shard.shard_id.clone(),
                    IteratorEventType::Failed,
                    Some(e.to_string()),
                ))
                .await;
            }
        }
    }
}
