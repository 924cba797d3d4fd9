//! # Messaging Module
//!
//! Typed batch dispatch to a queueing backend and decoding of inbound queue
//! events.
//!
//! ```text
//! QueueRegistry                 <- logical name -> target, built at startup
//!   └── MessageQueue<T>         <- target + codec for one payload type
//!         ├── sender()          -> BatchedMessageSender<T> (enqueue / flush)
//!         └── decode_batch()    <- RawQueueEvent from the runtime
//!
//! QueueTransport (trait)        <- external backend boundary
//!   └── InMemoryQueueTransport  <- tests and local development
//! ```

pub mod codec;
pub mod errors;
pub mod in_memory;
pub mod messages;
pub mod queue;
pub mod registry;
pub mod sender;
pub mod transport;

pub use codec::{JsonCodec, MessageCodec};
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::{InMemoryQueueStats, InMemoryQueueTransport};
pub use messages::{
    ProcessSourceChunkMessage, QueryWordMessage, UpdateBatchMessage, UpdateWordMessage,
    UploadSourceChunksMessage,
};
pub use queue::MessageQueue;
pub use registry::{QueueRegistry, WordListQueues};
pub use sender::{BatchedMessageSender, DeliveryOutcome, DispatchReport, GroupOutcome};
pub use transport::{
    BatchEntry, BatchSendResponse, FailedEntry, QueueTransport, RawQueueEvent, RawQueueRecord,
    TRANSPORT_BATCH_LIMIT,
};
