//! # Queue Registry
//!
//! Composition-root mapping from logical queue names to typed queue handles.
//! Built once at startup from configuration and passed by reference to the
//! stages that need it. A queue with no configured target fails when it is
//! first resolved, which for `WordListQueues` means at startup.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::codec::{JsonCodec, MessageCodec};
use super::errors::{MessagingError, MessagingResult};
use super::messages::{
    ProcessSourceChunkMessage, QueryWordMessage, UpdateBatchMessage, UpdateWordMessage,
    UploadSourceChunksMessage,
};
use super::queue::MessageQueue;
use super::transport::QueueTransport;
use crate::config::{queue_names, DispatchConfig, PipelineConfig, QueuesConfig};

#[derive(Clone)]
pub struct QueueRegistry {
    transport: Arc<dyn QueueTransport>,
    queues: QueuesConfig,
    dispatch: DispatchConfig,
}

impl fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("transport", &self.transport.transport_name())
            .field("queues", &self.queues)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl QueueRegistry {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        queues: QueuesConfig,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            transport,
            queues,
            dispatch,
        }
    }

    pub fn from_config(config: &PipelineConfig, transport: Arc<dyn QueueTransport>) -> Self {
        Self::new(transport, config.queues.clone(), config.dispatch.clone())
    }

    /// Target configured for a logical queue
    pub fn target(&self, queue_name: &str) -> MessagingResult<&str> {
        self.queues
            .target(queue_name)
            .ok_or_else(|| MessagingError::queue_not_configured(queue_name))
    }

    /// JSON-encoded queue handle
    pub fn queue<T>(&self, queue_name: &str) -> MessagingResult<MessageQueue<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.queue_with_codec(queue_name, Arc::new(JsonCodec::<T>::new()))
    }

    pub fn queue_with_codec<T: 'static>(
        &self,
        queue_name: &str,
        codec: Arc<dyn MessageCodec<T>>,
    ) -> MessagingResult<MessageQueue<T>> {
        let target = self.target(queue_name)?;
        debug!(queue = queue_name, queue_target = target, "Resolved queue target");

        Ok(MessageQueue::new(
            queue_name,
            target,
            Arc::clone(&self.transport),
            codec,
            self.dispatch.clone(),
        ))
    }
}

/// The pipeline's queues, resolved together so a missing one fails startup
#[derive(Debug, Clone)]
pub struct WordListQueues {
    pub upload_source_chunks: MessageQueue<UploadSourceChunksMessage>,
    pub process_source_chunk: MessageQueue<ProcessSourceChunkMessage>,
    pub query_words: MessageQueue<QueryWordMessage>,
    pub update_batch: MessageQueue<UpdateBatchMessage>,
    pub update_words: MessageQueue<UpdateWordMessage>,
}

impl WordListQueues {
    pub fn from_registry(registry: &QueueRegistry) -> MessagingResult<Self> {
        Ok(Self {
            upload_source_chunks: registry.queue(queue_names::UPLOAD_SOURCE_CHUNKS)?,
            process_source_chunk: registry.queue(queue_names::PROCESS_SOURCE_CHUNK)?,
            query_words: registry.queue(queue_names::QUERY_WORDS)?,
            update_batch: registry.queue(queue_names::UPDATE_BATCH)?,
            update_words: registry.queue(queue_names::UPDATE_WORDS)?,
        })
    }
}
