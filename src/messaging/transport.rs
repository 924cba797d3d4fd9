//! # Queue Transport Boundary
//!
//! The transport is the external queueing backend. The core only needs two
//! things from it: a batch enqueue that reports which entries were accepted,
//! and the raw shape of inbound events so consumers can decode them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::MessagingResult;

/// Maximum number of entries a transport accepts in one batch call
pub const TRANSPORT_BATCH_LIMIT: usize = 10;

/// One encoded message inside a batch send
///
/// The id is only unique within the group it was created for. It is assigned
/// once when the group is formed and reused across retry rounds so that
/// acknowledgments from any round can be matched back to the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    pub body: String,
}

impl BatchEntry {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// An entry the transport refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub id: String,
    pub code: String,
    pub message: String,
    /// True when the transport blames the request rather than itself
    pub sender_fault: bool,
}

/// Per-entry acknowledgment for one batch call
///
/// Batch transports commonly accept a subset of what they were given. Any
/// entry id that appears in neither list counts as unacknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendResponse {
    pub successful: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

impl BatchSendResponse {
    /// Acknowledge every entry in the batch
    pub fn all_successful(entries: &[BatchEntry]) -> Self {
        Self {
            successful: entries.iter().map(|e| e.id.clone()).collect(),
            failed: Vec::new(),
        }
    }
}

/// Batch enqueue contract for a queueing backend
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Send up to `max_batch_size()` encoded entries to `target`
    ///
    /// An `Err` means the call itself failed and nothing is known to have
    /// been accepted.
    async fn send_batch(
        &self,
        target: &str,
        entries: &[BatchEntry],
    ) -> MessagingResult<BatchSendResponse>;

    /// Largest batch the backend accepts
    fn max_batch_size(&self) -> usize {
        TRANSPORT_BATCH_LIMIT
    }

    /// Transport name for logging
    fn transport_name(&self) -> &'static str;
}

/// A single raw record from an inbound queue event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueueRecord {
    pub message_id: String,
    pub body: String,
}

/// Inbound event delivered to a consumer, as handed over by the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<RawQueueRecord>,
}

impl RawQueueEvent {
    pub fn new(records: Vec<RawQueueRecord>) -> Self {
        Self { records }
    }

    /// Build an event from bare bodies, numbering message ids from 1
    pub fn from_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| RawQueueRecord {
                message_id: (i + 1).to_string(),
                body: body.into(),
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.body.as_str())
    }
}
