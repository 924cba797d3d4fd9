//! # Status Store Boundary
//!
//! The persistent key-value store that holds status records. Writers never
//! overwrite blindly: every update is a conditional write against the
//! version the writer read, so concurrent workers cannot lose each other's
//! increments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::errors::{StatusError, StatusResult};
use super::models::{SourceUpdateStatus, StatusCounter};

#[async_trait]
pub trait StatusStore: Send + Sync + 'static {
    /// Store a new record; fails with `AlreadyExists` if the id is taken
    async fn insert(&self, record: &SourceUpdateStatus) -> StatusResult<()>;

    async fn load(&self, id: &str) -> StatusResult<Option<SourceUpdateStatus>>;

    /// Replace the stored record only if its version is still `expected_version`
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn save_if_version(
        &self,
        record: &SourceUpdateStatus,
        expected_version: u64,
    ) -> StatusResult<bool>;

    /// Add `delta` to one counter in a single store-side operation
    ///
    /// Never conflicts. Only used for counters whose change cannot complete
    /// the job; the result is floored at zero and the version is bumped.
    async fn atomic_increment(
        &self,
        id: &str,
        counter: StatusCounter,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StatusResult<SourceUpdateStatus>;

    fn store_name(&self) -> &'static str;
}

/// In-memory store with per-key atomic conditional writes
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: DashMap<String, SourceUpdateStatus>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn insert(&self, record: &SourceUpdateStatus) -> StatusResult<()> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StatusError::already_exists(&record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn load(&self, id: &str) -> StatusResult<Option<SourceUpdateStatus>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn save_if_version(
        &self,
        record: &SourceUpdateStatus,
        expected_version: u64,
    ) -> StatusResult<bool> {
        let mut stored = self
            .records
            .get_mut(&record.id)
            .ok_or_else(|| StatusError::not_found(&record.id))?;

        if stored.version != expected_version {
            return Ok(false);
        }

        *stored = record.clone();
        Ok(true)
    }

    async fn atomic_increment(
        &self,
        id: &str,
        counter: StatusCounter,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StatusResult<SourceUpdateStatus> {
        let mut stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| StatusError::not_found(id))?;

        stored.apply_increment(counter, delta, now);
        stored.version += 1;
        Ok(stored.clone())
    }

    fn store_name(&self) -> &'static str {
        "in_memory"
    }
}
