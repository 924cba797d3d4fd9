//! # Message Queue Handle
//!
//! Binds a logical queue to its transport target, payload type and codec.
//! Producers get senders from it; consumers decode inbound events through it.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::codec::MessageCodec;
use super::errors::MessagingResult;
use super::sender::BatchedMessageSender;
use super::transport::{QueueTransport, RawQueueEvent};
use crate::config::DispatchConfig;

/// Typed handle on one queue
pub struct MessageQueue<T> {
    name: String,
    target: String,
    transport: Arc<dyn QueueTransport>,
    codec: Arc<dyn MessageCodec<T>>,
    dispatch: DispatchConfig,
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target: self.target.clone(),
            transport: Arc::clone(&self.transport),
            codec: Arc::clone(&self.codec),
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("transport", &self.transport.transport_name())
            .finish()
    }
}

impl<T: 'static> MessageQueue<T> {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        transport: Arc<dyn QueueTransport>,
        codec: Arc<dyn MessageCodec<T>>,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            transport,
            codec,
            dispatch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// New sender for this queue with an empty pending list
    pub fn sender(&self) -> BatchedMessageSender<T> {
        BatchedMessageSender::new(
            self.name.clone(),
            self.target.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.codec),
            self.dispatch.clone(),
        )
    }

    /// Decode every record, keeping the per-record result
    pub fn decode_each(&self, event: &RawQueueEvent) -> Vec<MessagingResult<T>> {
        event
            .records
            .iter()
            .map(|record| self.codec.decode(&record.body))
            .collect()
    }

    /// Decode an inbound event, skipping records that fail to decode
    pub fn decode_batch(&self, event: &RawQueueEvent) -> Vec<T> {
        event
            .records
            .iter()
            .filter_map(|record| match self.codec.decode(&record.body) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(
                        queue = %self.name,
                        message_id = %record.message_id,
                        error = %e,
                        "Skipping message that failed to decode"
                    );
                    None
                }
            })
            .collect()
    }
}
