//! # Status Module
//!
//! Per-job progress tracking shared by every pipeline stage.
//!
//! - [`models`] - the record, the ordered status and the merge rules
//! - [`store`] - the persistent store boundary and an in-memory store
//! - [`client`] - the protocol workers call to report progress

pub mod client;
pub mod errors;
pub mod models;
pub mod store;

pub use client::StatusClient;
pub use errors::{StatusError, StatusResult};
pub use models::{SourceStatus, SourceUpdateStatus, StatusCounter, StatusTotals};
pub use store::{InMemoryStatusStore, StatusStore};
