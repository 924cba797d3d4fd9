//! Test doubles for the queue transport, the codec and the status store

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use wordlist_core::messaging::{
    BatchEntry, BatchSendResponse, FailedEntry, JsonCodec, MessageCodec, MessagingError,
    MessagingResult, QueueTransport,
};
use wordlist_core::status::{
    InMemoryStatusStore, SourceUpdateStatus, StatusCounter, StatusResult, StatusStore,
};

type Script =
    dyn Fn(usize, &[BatchEntry]) -> MessagingResult<BatchSendResponse> + Send + Sync + 'static;

/// Transport whose answer to each call is decided by a closure
///
/// The closure gets the 1-based call number and the entries of that call.
/// Every call's message bodies are recorded.
pub struct ScriptedTransport {
    script: Box<Script>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, &[BatchEntry]) -> MessagingResult<BatchSendResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Acknowledge everything on every call
    pub fn accepting() -> Arc<Self> {
        Self::new(|_, entries| Ok(BatchSendResponse::all_successful(entries)))
    }

    /// Never acknowledge anything
    pub fn silent() -> Arc<Self> {
        Self::new(|_, _| Ok(BatchSendResponse::default()))
    }

    /// Reject every entry as a transient service failure
    pub fn rejecting() -> Arc<Self> {
        Self::new(|_, entries| {
            Ok(BatchSendResponse {
                successful: Vec::new(),
                failed: entries
                    .iter()
                    .map(|e| FailedEntry {
                        id: e.id.clone(),
                        code: "ServiceUnavailable".to_string(),
                        message: "try again".to_string(),
                        sender_fault: false,
                    })
                    .collect(),
            })
        })
    }

    /// Fail the whole call every time
    pub fn erroring() -> Arc<Self> {
        Self::new(|_, _| Err(MessagingError::transport("stub", "connection reset")))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Every body that reached the transport, in call order
    pub fn sent_bodies(&self) -> Vec<String> {
        self.calls.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl QueueTransport for ScriptedTransport {
    async fn send_batch(
        &self,
        _target: &str,
        entries: &[BatchEntry],
    ) -> MessagingResult<BatchSendResponse> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(entries.iter().map(|e| e.body.clone()).collect());
            calls.len()
        };
        (self.script)(call, entries)
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// Accepting transport that tracks how many calls overlap
pub struct ConcurrencyTrackingTransport {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyTrackingTransport {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for ConcurrencyTrackingTransport {
    async fn send_batch(
        &self,
        _target: &str,
        entries: &[BatchEntry],
    ) -> MessagingResult<BatchSendResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(BatchSendResponse::all_successful(entries))
    }

    fn transport_name(&self) -> &'static str {
        "concurrency_tracking"
    }
}

/// JSON codec that refuses to encode one specific word
pub struct PoisonCodec {
    poison: String,
    inner: JsonCodec<String>,
}

impl PoisonCodec {
    pub fn new(poison: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            poison: poison.into(),
            inner: JsonCodec::new(),
        })
    }
}

impl MessageCodec<String> for PoisonCodec {
    fn encode(&self, message: &String) -> MessagingResult<String> {
        if *message == self.poison {
            return Err(MessagingError::message_serialization(format!(
                "refusing to encode {message}"
            )));
        }
        self.inner.encode(message)
    }

    fn decode(&self, body: &str) -> MessagingResult<String> {
        self.inner.decode(body)
    }
}

/// Store that reports a conflict on the first `conflicts` conditional writes
pub struct ConflictingStatusStore {
    inner: InMemoryStatusStore,
    conflicts_left: AtomicU64,
    save_calls: AtomicU64,
}

impl ConflictingStatusStore {
    pub fn new(conflicts: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStatusStore::new(),
            conflicts_left: AtomicU64::new(conflicts),
            save_calls: AtomicU64::new(0),
        })
    }

    /// Conflicts on every write
    pub fn always() -> Arc<Self> {
        Self::new(u64::MAX)
    }

    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for ConflictingStatusStore {
    async fn insert(&self, record: &SourceUpdateStatus) -> StatusResult<()> {
        self.inner.insert(record).await
    }

    async fn load(&self, id: &str) -> StatusResult<Option<SourceUpdateStatus>> {
        self.inner.load(id).await
    }

    async fn save_if_version(
        &self,
        record: &SourceUpdateStatus,
        expected_version: u64,
    ) -> StatusResult<bool> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        let conflict = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if conflict {
            return Ok(false);
        }

        self.inner.save_if_version(record, expected_version).await
    }

    async fn atomic_increment(
        &self,
        id: &str,
        counter: StatusCounter,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StatusResult<SourceUpdateStatus> {
        self.inner.atomic_increment(id, counter, delta, now).await
    }

    fn store_name(&self) -> &'static str {
        "conflicting"
    }
}

/// In-memory store where every call takes `latency`, like a remote table
pub struct SlowStatusStore {
    inner: InMemoryStatusStore,
    latency: Duration,
    conflicts: AtomicU64,
}

impl SlowStatusStore {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStatusStore::new(),
            latency,
            conflicts: AtomicU64::new(0),
        })
    }

    /// Conditional writes rejected so far
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for SlowStatusStore {
    async fn insert(&self, record: &SourceUpdateStatus) -> StatusResult<()> {
        self.inner.insert(record).await
    }

    async fn load(&self, id: &str) -> StatusResult<Option<SourceUpdateStatus>> {
        tokio::time::sleep(self.latency).await;
        self.inner.load(id).await
    }

    async fn save_if_version(
        &self,
        record: &SourceUpdateStatus,
        expected_version: u64,
    ) -> StatusResult<bool> {
        tokio::time::sleep(self.latency).await;
        let saved = self.inner.save_if_version(record, expected_version).await?;
        if !saved {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(saved)
    }

    async fn atomic_increment(
        &self,
        id: &str,
        counter: StatusCounter,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StatusResult<SourceUpdateStatus> {
        tokio::time::sleep(self.latency).await;
        self.inner.atomic_increment(id, counter, delta, now).await
    }

    fn store_name(&self) -> &'static str {
        "slow"
    }
}
