//! # Status Client
//!
//! Lets any number of concurrent pipeline workers report progress against a
//! shared job record.
//!
//! Counters that cannot complete a job are plain store-side adds. Everything
//! else runs the same loop: load the record and its version, apply the merge
//! rule to a copy, write it back only if the stored version is unchanged, and
//! retry from a fresh load on conflict after an exponential, fully jittered
//! wait. Status changes go through the priority gate inside that loop, so an
//! out-of-order stage signal is discarded without a write.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{StatusError, StatusResult};
use super::models::{SourceStatus, SourceUpdateStatus, StatusCounter, StatusTotals};
use super::store::StatusStore;
use crate::config::StatusConfig;
use crate::logging::log_status_operation;

pub struct StatusClient {
    store: Arc<dyn StatusStore>,
    table_name: String,
    config: StatusConfig,
}

impl fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusClient")
            .field("store", &self.store.store_name())
            .field("table_name", &self.table_name)
            .field("config", &self.config)
            .finish()
    }
}

impl StatusClient {
    /// Fails if no status table is configured
    pub fn new(store: Arc<dyn StatusStore>, config: &StatusConfig) -> StatusResult<Self> {
        let table_name = config
            .table_name()
            .map_err(|e| StatusError::configuration(e.to_string()))?
            .to_string();

        Ok(Self {
            store,
            table_name,
            config: config.clone(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Start tracking a new job and return its id
    pub async fn create(&self, source_id: &str) -> StatusResult<String> {
        let record = self
            .create_with_id(&Uuid::new_v4().to_string(), source_id)
            .await?;
        Ok(record.id)
    }

    pub async fn create_with_id(
        &self,
        job_id: &str,
        source_id: &str,
    ) -> StatusResult<SourceUpdateStatus> {
        let record = SourceUpdateStatus::new(job_id, source_id, Utc::now());
        self.store.insert(&record).await?;

        log_status_operation("create", job_id, record.status.as_str(), 1, Some(source_id));
        Ok(record)
    }

    pub async fn get(&self, job_id: &str) -> StatusResult<SourceUpdateStatus> {
        self.store
            .load(job_id)
            .await?
            .ok_or_else(|| StatusError::not_found(job_id))
    }

    /// Overwrite the expected totals that are provided
    pub async fn set_totals(
        &self,
        job_id: &str,
        totals: StatusTotals,
    ) -> StatusResult<SourceUpdateStatus> {
        let (record, _) = self
            .update("set_totals", job_id, move |record, now| {
                record.apply_totals(totals, now);
                true
            })
            .await?;
        Ok(record)
    }

    pub async fn update_status_totals(
        &self,
        job_id: &str,
        total_words: i64,
        total_chunks: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        self.set_totals(
            job_id,
            StatusTotals::new().words(total_words).chunks(total_chunks),
        )
        .await
    }

    /// Add `delta` to one counter
    pub async fn increment(
        &self,
        job_id: &str,
        counter: StatusCounter,
        delta: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        if !counter.affects_completion() {
            let record = self
                .store
                .atomic_increment(job_id, counter, delta, Utc::now())
                .await?;
            log_status_operation(
                counter.field_name(),
                job_id,
                record.status.as_str(),
                1,
                None,
            );
            return Ok(record);
        }

        let (record, _) = self
            .update(counter.field_name(), job_id, move |record, now| {
                record.apply_increment(counter, delta, now);
                true
            })
            .await?;
        Ok(record)
    }

    pub async fn increase_processed_words(
        &self,
        job_id: &str,
        delta: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        self.increment(job_id, StatusCounter::ProcessedWords, delta)
            .await
    }

    pub async fn increase_processed_chunks(
        &self,
        job_id: &str,
        delta: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        self.increment(job_id, StatusCounter::ProcessedChunks, delta)
            .await
    }

    pub async fn increase_processed_batches(
        &self,
        job_id: &str,
        delta: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        self.increment(job_id, StatusCounter::ProcessedBatches, delta)
            .await
    }

    pub async fn increase_retried_words(
        &self,
        job_id: &str,
        delta: i64,
    ) -> StatusResult<SourceUpdateStatus> {
        self.increment(job_id, StatusCounter::RetriedWords, delta)
            .await
    }

    /// Move the job to `candidate` if it outranks the stored status
    ///
    /// Returns whether the status changed.
    pub async fn advance_status(&self, job_id: &str, candidate: SourceStatus) -> StatusResult<bool> {
        let (record, applied) = self
            .update("advance_status", job_id, move |record, now| {
                record.advance_status(candidate, now)
            })
            .await?;

        if !applied {
            debug!(
                job_id = %job_id,
                candidate = %candidate,
                current = %record.status,
                "Ignoring status that does not outrank the current one"
            );
        }
        Ok(applied)
    }

    pub async fn mark_failed(&self, job_id: &str) -> StatusResult<bool> {
        self.advance_status(job_id, SourceStatus::Failed).await
    }

    /// Optimistic read-modify-write loop
    ///
    /// `mutate` returns false when it left the record untouched, in which case
    /// nothing is written.
    async fn update<F>(
        &self,
        operation: &str,
        job_id: &str,
        mutate: F,
    ) -> StatusResult<(SourceUpdateStatus, bool)>
    where
        F: Fn(&mut SourceUpdateStatus, DateTime<Utc>) -> bool + Send + Sync,
    {
        let max_attempts = self.config.max_write_attempts.max(1);

        for attempt in 1..=max_attempts {
            let current = self.get(job_id).await?;
            let expected_version = current.version;

            let mut next = current.clone();
            let now = Utc::now();
            if !mutate(&mut next, now) {
                return Ok((current, false));
            }
            next.last_updated = now;
            next.version = expected_version + 1;

            if self.store.save_if_version(&next, expected_version).await? {
                log_status_operation(operation, job_id, next.status.as_str(), attempt, None);
                return Ok((next, true));
            }

            debug!(
                job_id = %job_id,
                operation = %operation,
                attempt = attempt,
                "Status record changed concurrently, retrying"
            );

            if attempt < max_attempts {
                let ceiling = self.config.conflict_backoff_ceiling(attempt);
                let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
                tokio::time::sleep(Duration::from_millis(fastrand::u64(0..=ceiling_ms))).await;
            }
        }

        warn!(
            job_id = %job_id,
            operation = %operation,
            attempts = max_attempts,
            "Gave up updating contended status record"
        );
        Err(StatusError::write_conflict(job_id, max_attempts))
    }
}
