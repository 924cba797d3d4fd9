//! # Pipeline Messages
//!
//! Payloads carried between pipeline stages. Field names are camelCase on
//! the wire and shared by every stage, so renaming one is a breaking change.

use serde::{Deserialize, Serialize};

/// Ask the chunking stage to split a source into chunks and upload them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSourceChunksMessage {
    pub source_id: String,
    #[serde(default)]
    pub replace_existing_words: bool,
}

/// One uploaded chunk ready for processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSourceChunkMessage {
    pub source_id: String,
    /// Status record of the job the chunk belongs to
    pub correlation_id: String,
    pub chunk_id: String,
    /// Object key of the chunk contents
    pub key: String,
}

/// Words to look up and submit for enrichment
///
/// This field set is defined here, not inherited from an upstream schema.
/// Producers and consumers of `query_words` must agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryWordMessage {
    pub source_id: String,
    pub correlation_id: String,
    pub words: Vec<String>,
}

/// A submitted enrichment batch whose results should be collected
///
/// This field set is defined here, not inherited from an upstream schema.
/// Producers and consumers of `update_batch` must agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchMessage {
    pub source_id: String,
    pub correlation_id: String,
    pub batch_id: String,
}

/// Enriched attributes for a single word
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateWordMessage {
    pub word: String,
    pub offensiveness: i32,
    pub commonness: i32,
    pub sentiment: i32,
    pub word_types: Vec<String>,
    pub formality: i32,
    pub cultural_sensitivity: i32,
    pub figurativeness: i32,
    pub complexity: i32,
    pub political: i32,
}

impl UpdateWordMessage {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Self::default()
        }
    }
}
