//! # Batched Message Sender
//!
//! Accumulates typed payloads and delivers them to a queue transport in
//! fixed-size groups on an explicit `flush()`.
//!
//! ## Delivery model
//!
//! - Payloads are encoded one by one; a payload that fails to encode is
//!   dropped and logged, and never reaches the transport
//! - Groups are sent concurrently, bounded by a semaphore shared by every
//!   group of one flush
//! - Each group gets up to `max_attempts` rounds. Acknowledged entries leave
//!   the working set after every round, so a retry only resends the remainder.
//!   A transport error that is not transient ends the group's rounds early
//! - A group that is still partially unacknowledged after its last round is
//!   reported in the `DispatchReport` and logged; it never fails the flush
//!
//! Delivery is at-least-once. A transport call that errors after the backend
//! accepted some entries will have those entries sent again next round.
//!
//! ## Dispose guard
//!
//! Dropping a sender that still holds pending payloads panics. Callers must
//! either `flush()` or `discard()` first.

use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::codec::MessageCodec;
use super::transport::{BatchEntry, QueueTransport};
use crate::config::{DispatchConfig, MAX_CONCURRENT_BATCHES};
use crate::logging::{log_dispatch_operation, log_error};

/// Terminal state of one payload after a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    Sent,
    /// Dropped before any send attempt, never retried
    FailedSerialization,
    /// Still unacknowledged when the group ran out of rounds or was cancelled
    FailedTransport,
}

/// Result of dispatching one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub index: usize,
    pub correlation_id: String,
    /// Payloads that went into the group, including ones that failed to encode
    pub size: usize,
    pub serialization_failures: usize,
    pub sent: usize,
    pub unacknowledged: usize,
    /// Rounds that reached the transport
    pub rounds: u32,
    pub cancelled: bool,
}

impl GroupOutcome {
    fn new(index: usize, correlation_id: String, size: usize, serialization_failures: usize) -> Self {
        Self {
            index,
            correlation_id,
            size,
            serialization_failures,
            sent: 0,
            unacknowledged: 0,
            rounds: 0,
            cancelled: false,
        }
    }

    pub fn is_fully_sent(&self) -> bool {
        self.unacknowledged == 0 && self.serialization_failures == 0
    }
}

/// Aggregate result of one `flush()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub queue_name: String,
    pub total: usize,
    pub groups: Vec<GroupOutcome>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.groups.iter().map(|g| g.sent).sum()
    }

    pub fn serialization_failures(&self) -> usize {
        self.groups.iter().map(|g| g.serialization_failures).sum()
    }

    pub fn transport_failures(&self) -> usize {
        self.groups.iter().map(|g| g.unacknowledged).sum()
    }

    pub fn failed(&self) -> usize {
        self.serialization_failures() + self.transport_failures()
    }

    pub fn count(&self, outcome: DeliveryOutcome) -> usize {
        match outcome {
            DeliveryOutcome::Sent => self.sent(),
            DeliveryOutcome::FailedSerialization => self.serialization_failures(),
            DeliveryOutcome::FailedTransport => self.transport_failures(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.groups.iter().any(|g| g.cancelled)
    }

    /// Groups that left at least one payload undelivered
    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups.iter().filter(|g| !g.is_fully_sent())
    }
}

/// A group after encoding, ready for the transport
struct PreparedGroup {
    index: usize,
    correlation_id: String,
    size: usize,
    serialization_failures: usize,
    entries: Vec<BatchEntry>,
}

/// Everything the per-group tasks share for one flush
struct GroupDispatch {
    queue_name: String,
    target: String,
    transport: Arc<dyn QueueTransport>,
    config: DispatchConfig,
    limiter: Arc<Semaphore>,
    cancellation: CancellationToken,
}

/// Typed, batching, retrying sender bound to one queue target
pub struct BatchedMessageSender<T> {
    queue_name: String,
    target: String,
    transport: Arc<dyn QueueTransport>,
    codec: Arc<dyn MessageCodec<T>>,
    config: DispatchConfig,
    cancellation: CancellationToken,
    pending: Vec<T>,
}

impl<T> fmt::Debug for BatchedMessageSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedMessageSender")
            .field("queue_name", &self.queue_name)
            .field("target", &self.target)
            .field("transport", &self.transport.transport_name())
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T: 'static> BatchedMessageSender<T> {
    pub fn new(
        queue_name: impl Into<String>,
        target: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
        codec: Arc<dyn MessageCodec<T>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            target: target.into(),
            transport,
            codec,
            config,
            cancellation: CancellationToken::new(),
            pending: Vec::new(),
        }
    }

    /// Stop issuing rounds once `token` is cancelled
    ///
    /// In-flight transport calls are always allowed to finish. Payloads that
    /// had not been acknowledged when the token fired are reported as
    /// transport failures.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn enqueue(&mut self, message: T) {
        self.pending.push(message);
    }

    pub fn enqueue_all<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.pending.extend(messages);
    }

    /// Drop pending payloads without sending them
    pub fn discard(&mut self) -> usize {
        let discarded = self.pending.len();
        if discarded > 0 {
            warn!(
                queue = %self.queue_name,
                discarded = discarded,
                "Discarding unsent messages"
            );
        }
        self.pending.clear();
        discarded
    }

    /// Release the sender, enforcing the dispose guard
    pub fn close(self) {
        drop(self);
    }

    fn effective_batch_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.transport.max_batch_size())
            .max(1)
    }

    /// Partition and encode the pending payloads
    fn prepare_groups(&mut self) -> (usize, Vec<PreparedGroup>) {
        let pending = mem::take(&mut self.pending);
        let total = pending.len();
        let batch_size = self.effective_batch_size();

        let groups = pending
            .chunks(batch_size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut entries = Vec::with_capacity(chunk.len());
                let mut serialization_failures = 0;

                for message in chunk {
                    match self.codec.encode(message) {
                        Ok(body) => entries.push(BatchEntry::new(Uuid::new_v4().to_string(), body)),
                        Err(e) => {
                            serialization_failures += 1;
                            error!(
                                queue = %self.queue_name,
                                group = index,
                                error = %e,
                                "Failed to serialize message, dropping it"
                            );
                        }
                    }
                }

                PreparedGroup {
                    index,
                    correlation_id: Uuid::new_v4().to_string(),
                    size: chunk.len(),
                    serialization_failures,
                    entries,
                }
            })
            .collect();

        (total, groups)
    }

    /// Send every pending payload and wait until each one has an outcome
    pub async fn flush(&mut self) -> DispatchReport {
        let (total, groups) = self.prepare_groups();

        let mut report = DispatchReport {
            queue_name: self.queue_name.clone(),
            total,
            groups: Vec::with_capacity(groups.len()),
        };

        if groups.is_empty() {
            return report;
        }

        let dispatch = Arc::new(GroupDispatch {
            queue_name: self.queue_name.clone(),
            target: self.target.clone(),
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            limiter: Arc::new(Semaphore::new(
                self.config
                    .max_concurrent_batches
                    .clamp(1, MAX_CONCURRENT_BATCHES),
            )),
            cancellation: self.cancellation.clone(),
        });

        info!(
            queue = %self.queue_name,
            messages = total,
            groups = groups.len(),
            "Waiting for message batches to send"
        );

        // Kept so a panicked task can still be reported as a whole-group failure
        let fallbacks: Vec<GroupOutcome> = groups
            .iter()
            .map(|g| {
                let mut outcome = GroupOutcome::new(
                    g.index,
                    g.correlation_id.clone(),
                    g.size,
                    g.serialization_failures,
                );
                outcome.unacknowledged = g.entries.len();
                outcome
            })
            .collect();

        let handles: Vec<_> = groups
            .into_iter()
            .map(|group| {
                let span = info_span!(
                    "dispatch_group",
                    queue = %dispatch.queue_name,
                    correlation_id = %group.correlation_id,
                    group = group.index,
                );
                tokio::spawn(send_group(Arc::clone(&dispatch), group).instrument(span))
            })
            .collect();

        for (result, fallback) in join_all(handles).await.into_iter().zip(fallbacks) {
            match result {
                Ok(outcome) => report.groups.push(outcome),
                Err(e) => {
                    log_error(
                        "batched_message_sender",
                        "send_group",
                        &e.to_string(),
                        Some(fallback.correlation_id.as_str()),
                    );
                    report.groups.push(fallback);
                }
            }
        }

        let status = if report.is_success() { "complete" } else { "partial" };
        log_dispatch_operation(
            "flush",
            &report.queue_name,
            report.groups.len(),
            report.sent(),
            report.failed(),
            status,
        );

        if report.failed() > 0 {
            error!(
                queue = %report.queue_name,
                failed = report.failed(),
                serialization_failures = report.serialization_failures(),
                transport_failures = report.transport_failures(),
                failed_groups = report.failed_groups().count(),
                cancelled = report.was_cancelled(),
                "Finished sending message batches with failures"
            );
        } else {
            info!(
                queue = %report.queue_name,
                sent = report.sent(),
                groups = report.groups.len(),
                "Finished sending message batches"
            );
        }

        report
    }
}

impl<T> Drop for BatchedMessageSender<T> {
    fn drop(&mut self) {
        if !self.pending.is_empty() && !std::thread::panicking() {
            panic!(
                "BatchedMessageSender for queue {} dropped with {} unsent message(s); \
                 flush() or discard() must be called first",
                self.queue_name,
                self.pending.len()
            );
        }
    }
}

async fn send_group(dispatch: Arc<GroupDispatch>, group: PreparedGroup) -> GroupOutcome {
    let PreparedGroup {
        index,
        correlation_id,
        size,
        serialization_failures,
        entries,
    } = group;

    let mut outcome = GroupOutcome::new(index, correlation_id, size, serialization_failures);
    let mut remaining = entries;

    if remaining.is_empty() {
        return outcome;
    }

    debug!(messages = remaining.len(), "Waiting for a send slot");

    let permit = tokio::select! {
        biased;
        _ = dispatch.cancellation.cancelled() => None,
        permit = Arc::clone(&dispatch.limiter).acquire_owned() => permit.ok(),
    };

    let Some(_permit) = permit else {
        warn!(
            messages = remaining.len(),
            "Batch dispatch cancelled before a send slot was free"
        );
        outcome.cancelled = true;
        outcome.unacknowledged = remaining.len();
        return outcome;
    };

    for round in 1..=dispatch.config.max_attempts {
        if remaining.is_empty() {
            break;
        }

        if dispatch.cancellation.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        if round > 1 {
            let delay = dispatch.config.retry_delay_for(round);
            let cancelled = tokio::select! {
                biased;
                _ = dispatch.cancellation.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                outcome.cancelled = true;
                break;
            }
        }

        outcome.rounds = round;
        info!(
            round = round,
            messages = remaining.len(),
            "Sending message batch"
        );

        match dispatch
            .transport
            .send_batch(&dispatch.target, &remaining)
            .await
        {
            Ok(response) => {
                let acknowledged: HashSet<&str> =
                    response.successful.iter().map(String::as_str).collect();
                let before = remaining.len();
                remaining.retain(|entry| !acknowledged.contains(entry.id.as_str()));
                outcome.sent += before - remaining.len();

                if !response.failed.is_empty() {
                    warn!(
                        round = round,
                        rejected = response.failed.len(),
                        first_code = %response.failed[0].code,
                        "Transport rejected part of the batch"
                    );
                }
            }
            Err(e) if e.is_transient() => {
                error!(
                    round = round,
                    messages = remaining.len(),
                    error = %e,
                    "Failed to send message batch"
                );
            }
            Err(e) => {
                error!(
                    round = round,
                    messages = remaining.len(),
                    error = %e,
                    "Message batch can never be delivered, not retrying"
                );
                break;
            }
        }
    }

    outcome.unacknowledged = remaining.len();

    if outcome.unacknowledged > 0 {
        error!(
            unacknowledged = outcome.unacknowledged,
            rounds = outcome.rounds,
            cancelled = outcome.cancelled,
            "Failed to send message batch after {} attempt(s)",
            outcome.rounds
        );
    }

    outcome
}
