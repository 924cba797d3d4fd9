//! # In-Memory Queue Transport
//!
//! Thread-safe in-memory queue backend for testing and local development.
//!
//! - **Batch limit**: rejects calls with more entries than the transport limit
//! - **Partial acknowledgment**: duplicate entry ids within one call are
//!   reported as failed entries, the rest are accepted
//! - **Receive**: drains queued bodies into the same `RawQueueEvent` shape a
//!   consumer gets from the runtime

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::errors::{MessagingError, MessagingResult};
use super::transport::{
    BatchEntry, BatchSendResponse, FailedEntry, QueueTransport, RawQueueEvent, RawQueueRecord,
    TRANSPORT_BATCH_LIMIT,
};

#[derive(Debug, Clone)]
struct InMemoryQueuedMessage {
    id: u64,
    body: String,
    enqueued_at: DateTime<Utc>,
}

#[derive(Debug)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryQueuedMessage>,
    next_id: AtomicU64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            next_id: AtomicU64::new(1),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
        }
    }
}

/// Snapshot of one in-memory queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryQueueStats {
    pub message_count: u64,
    pub total_sent: u64,
    pub total_received: u64,
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
}

/// In-memory transport keyed by target (queue URL)
#[derive(Debug)]
pub struct InMemoryQueueTransport {
    queues: RwLock<HashMap<String, InMemoryQueue>>,
    batch_calls: AtomicU64,
}

impl Default for InMemoryQueueTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueTransport {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            batch_calls: AtomicU64::new(0),
        }
    }

    /// Create with pre-initialized queues
    pub fn with_queues(targets: &[&str]) -> Self {
        let transport = Self::new();
        for target in targets {
            transport.ensure_queue(target);
        }
        transport
    }

    /// Create a queue if it doesn't exist (idempotent)
    pub fn ensure_queue(&self, target: &str) {
        self.queues
            .write()
            .entry(target.to_string())
            .or_insert_with(InMemoryQueue::new);
    }

    /// Number of messages waiting in a queue
    pub fn queue_length(&self, target: &str) -> usize {
        self.queues
            .read()
            .get(target)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Number of `send_batch` calls that reached a queue
    pub fn batch_calls(&self) -> u64 {
        self.batch_calls.load(Ordering::Relaxed)
    }

    pub fn stats(&self, target: &str) -> MessagingResult<InMemoryQueueStats> {
        let queues = self.queues.read();
        let queue = queues
            .get(target)
            .ok_or_else(|| MessagingError::queue_not_found(target))?;

        Ok(InMemoryQueueStats {
            message_count: queue.messages.len() as u64,
            total_sent: queue.total_sent.load(Ordering::Relaxed),
            total_received: queue.total_received.load(Ordering::Relaxed),
            oldest_enqueued_at: queue.messages.front().map(|m| m.enqueued_at),
        })
    }

    /// Remove up to `max_messages` from the front of a queue
    pub fn receive(&self, target: &str, max_messages: usize) -> MessagingResult<RawQueueEvent> {
        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(target)
            .ok_or_else(|| MessagingError::queue_not_found(target))?;

        let take = max_messages.min(queue.messages.len());
        let records: Vec<RawQueueRecord> = queue
            .messages
            .drain(..take)
            .map(|m| RawQueueRecord {
                message_id: m.id.to_string(),
                body: m.body,
            })
            .collect();

        queue
            .total_received
            .fetch_add(records.len() as u64, Ordering::Relaxed);

        Ok(RawQueueEvent::new(records))
    }

    /// Clear all messages from a queue
    pub fn clear_queue(&self, target: &str) {
        if let Some(queue) = self.queues.write().get_mut(target) {
            queue.messages.clear();
        }
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueueTransport {
    async fn send_batch(
        &self,
        target: &str,
        entries: &[BatchEntry],
    ) -> MessagingResult<BatchSendResponse> {
        if entries.len() > TRANSPORT_BATCH_LIMIT {
            return Err(MessagingError::BatchTooLarge {
                size: entries.len(),
                limit: TRANSPORT_BATCH_LIMIT,
            });
        }

        let mut queues = self.queues.write();
        let queue = queues
            .get_mut(target)
            .ok_or_else(|| MessagingError::queue_not_found(target))?;

        self.batch_calls.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        let mut seen = HashSet::with_capacity(entries.len());
        let mut response = BatchSendResponse::default();

        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                response.failed.push(FailedEntry {
                    id: entry.id.clone(),
                    code: "BatchEntryIdsNotDistinct".to_string(),
                    message: format!("entry id {} appears more than once", entry.id),
                    sender_fault: true,
                });
                continue;
            }

            let id = queue.next_id.fetch_add(1, Ordering::Relaxed);
            queue.total_sent.fetch_add(1, Ordering::Relaxed);
            queue.messages.push_back(InMemoryQueuedMessage {
                id,
                body: entry.body.clone(),
                enqueued_at: now,
            });
            response.successful.push(entry.id.clone());
        }

        Ok(response)
    }

    fn transport_name(&self) -> &'static str {
        "in_memory"
    }
}
