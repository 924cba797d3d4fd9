#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Word List Core
//!
//! Shared plumbing for the word-list enrichment pipeline.
//!
//! ## Overview
//!
//! A source word list is split into chunks, each chunk is expanded into
//! words, words are sent off for enrichment, and enriched words are written
//! back in batches. Every stage runs as an independent queue consumer; this
//! crate gives those stages two things:
//!
//! - **Batched dispatch**: collect typed messages, send them to a queue in
//!   groups no larger than the transport's batch limit, retry only the
//!   entries that were not acknowledged, and report exactly what was lost.
//! - **Status protocol**: a per-job progress record that many workers update
//!   concurrently without losing increments, with a status that only ever
//!   moves forward.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Message types, queue handles and the batch dispatch engine
//! - [`status`] - Job status records and the concurrent update protocol
//! - [`config`] - Configuration loading from files and the environment
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wordlist_core::config::PipelineConfig;
//! use wordlist_core::messaging::{InMemoryQueueTransport, QueryWordMessage, QueueRegistry};
//! use wordlist_core::messaging::registry::WordListQueues;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_env()?;
//! let transport = Arc::new(InMemoryQueueTransport::new());
//! let queues = WordListQueues::from_registry(&QueueRegistry::from_config(&config, transport))?;
//!
//! let mut sender = queues.query_words.sender();
//! sender.enqueue(QueryWordMessage {
//!     source_id: "source-1".to_string(),
//!     correlation_id: "job-1".to_string(),
//!     words: vec!["apple".to_string()],
//! });
//! let report = sender.flush().await;
//! if !report.is_success() {
//!     eprintln!("{} message(s) were not delivered", report.failed());
//! }
//! sender.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod status;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use messaging::{BatchedMessageSender, DispatchReport, MessageQueue, MessagingError};
pub use status::{SourceStatus, SourceUpdateStatus, StatusClient, StatusError};
