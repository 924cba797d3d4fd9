//! # Status Models
//!
//! The per-job progress record and the merge rules every writer applies to
//! it. The rules live here as plain functions on the record so they can be
//! checked without a store; `StatusClient` runs them inside its conditional
//! write loop.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pipeline stage of a job, ordered by priority
///
/// A record's status only ever moves to a higher priority. `Failed` outranks
/// everything, so a late stage signal can never un-fail a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceStatus {
    #[default]
    Unknown,
    Chunking,
    Processing,
    Querying,
    Updating,
    Complete,
    Failed,
}

impl SourceStatus {
    pub const ALL: [SourceStatus; 7] = [
        Self::Unknown,
        Self::Chunking,
        Self::Processing,
        Self::Querying,
        Self::Updating,
        Self::Complete,
        Self::Failed,
    ];

    pub fn priority(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Chunking => 10,
            Self::Processing => 20,
            Self::Querying => 30,
            Self::Updating => 40,
            Self::Complete => 50,
            Self::Failed => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Chunking => "Chunking",
            Self::Processing => "Processing",
            Self::Querying => "Querying",
            Self::Updating => "Updating",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Parse a stored status name; anything unrecognised reads as `Unknown`
    pub fn from_text(text: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(text.trim()))
            .unwrap_or(Self::Unknown)
    }

    /// Terminal: no stage will move the job forward again
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn outranks(&self, other: SourceStatus) -> bool {
        self.priority() > other.priority()
    }
}

impl PartialOrd for SourceStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::from_text(&text))
    }
}

/// Counters that accumulate through deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCounter {
    TotalWords,
    ProcessedWords,
    ProcessedChunks,
    TotalBatches,
    ProcessedBatches,
    RetriedWords,
}

impl StatusCounter {
    /// Stored field name
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::TotalWords => "totalWords",
            Self::ProcessedWords => "processedWords",
            Self::ProcessedChunks => "processedChunks",
            Self::TotalBatches => "totalBatches",
            Self::ProcessedBatches => "processedBatches",
            Self::RetriedWords => "retriedWords",
        }
    }

    /// Whether changing this counter can complete the job
    ///
    /// These need the whole record to apply, the rest are plain adds.
    pub fn affects_completion(&self) -> bool {
        matches!(self, Self::TotalWords | Self::ProcessedWords)
    }
}

impl fmt::Display for StatusCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Expected totals, known once a source has been chunked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub total_words: Option<i64>,
    pub total_chunks: Option<i64>,
    pub total_batches: Option<i64>,
}

impl StatusTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn words(mut self, total: i64) -> Self {
        self.total_words = Some(total);
        self
    }

    pub fn chunks(mut self, total: i64) -> Self {
        self.total_chunks = Some(total);
        self
    }

    pub fn batches(mut self, total: i64) -> Self {
        self.total_batches = Some(total);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.total_words.is_none() && self.total_chunks.is_none() && self.total_batches.is_none()
    }
}

/// Progress record for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUpdateStatus {
    pub id: String,
    pub source_id: String,
    #[serde(default)]
    pub status: SourceStatus,
    #[serde(default)]
    pub total_words: i64,
    #[serde(default)]
    pub processed_words: i64,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub processed_chunks: i64,
    #[serde(default)]
    pub retried_words: i64,
    pub started: DateTime<Utc>,
    #[serde(default)]
    pub total_batches: i64,
    #[serde(default)]
    pub processed_batches: i64,
    pub last_updated: DateTime<Utc>,
    /// Incremented on every successful write; conditional writes compare it
    #[serde(default)]
    pub version: u64,
}

impl SourceUpdateStatus {
    /// Fresh record for a job that is about to be chunked
    pub fn new(id: impl Into<String>, source_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            status: SourceStatus::Chunking,
            total_words: 0,
            processed_words: 0,
            total_chunks: 0,
            processed_chunks: 0,
            retried_words: 0,
            started: now,
            total_batches: 0,
            processed_batches: 0,
            last_updated: now,
            version: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    pub fn counter(&self, counter: StatusCounter) -> i64 {
        match counter {
            StatusCounter::TotalWords => self.total_words,
            StatusCounter::ProcessedWords => self.processed_words,
            StatusCounter::ProcessedChunks => self.processed_chunks,
            StatusCounter::TotalBatches => self.total_batches,
            StatusCounter::ProcessedBatches => self.processed_batches,
            StatusCounter::RetriedWords => self.retried_words,
        }
    }

    fn counter_mut(&mut self, counter: StatusCounter) -> &mut i64 {
        match counter {
            StatusCounter::TotalWords => &mut self.total_words,
            StatusCounter::ProcessedWords => &mut self.processed_words,
            StatusCounter::ProcessedChunks => &mut self.processed_chunks,
            StatusCounter::TotalBatches => &mut self.total_batches,
            StatusCounter::ProcessedBatches => &mut self.processed_batches,
            StatusCounter::RetriedWords => &mut self.retried_words,
        }
    }

    /// Move to `candidate` only if it strictly outranks the current status
    pub fn advance_status(&mut self, candidate: SourceStatus, now: DateTime<Utc>) -> bool {
        if !candidate.outranks(self.status) {
            return false;
        }
        self.status = candidate;
        self.last_updated = now;
        true
    }

    /// Add `delta` to a counter, flooring at zero
    ///
    /// Processed words reaching the expected total completes the job.
    pub fn apply_increment(&mut self, counter: StatusCounter, delta: i64, now: DateTime<Utc>) {
        let value = self.counter_mut(counter);
        *value = value.saturating_add(delta).max(0);
        self.last_updated = now;

        if counter.affects_completion() {
            self.enforce_completion(now);
        }
    }

    /// Overwrite the expected totals that were provided
    pub fn apply_totals(&mut self, totals: StatusTotals, now: DateTime<Utc>) {
        if let Some(total) = totals.total_words {
            self.total_words = total.max(0);
        }
        if let Some(total) = totals.total_chunks {
            self.total_chunks = total.max(0);
        }
        if let Some(total) = totals.total_batches {
            self.total_batches = total.max(0);
        }
        self.last_updated = now;

        self.enforce_completion(now);
    }

    /// Clamp processed words to the total and complete the job once reached
    ///
    /// A total of zero means the total is not known yet, so nothing happens.
    pub fn enforce_completion(&mut self, now: DateTime<Utc>) -> bool {
        if self.total_words <= 0 || self.processed_words < self.total_words {
            return false;
        }
        self.processed_words = self.total_words;
        self.advance_status(SourceStatus::Complete, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SourceUpdateStatus {
        SourceUpdateStatus::new("job-1", "source-1", Utc::now())
    }

    #[test]
    fn test_priorities_are_ordered() {
        let priorities: Vec<u32> = SourceStatus::ALL.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![0, 10, 20, 30, 40, 50, 100]);
        assert!(SourceStatus::Failed > SourceStatus::Complete);
        assert!(SourceStatus::Updating < SourceStatus::Complete);
    }

    #[test]
    fn test_from_text_is_case_insensitive_with_unknown_fallback() {
        assert_eq!(SourceStatus::from_text("querying"), SourceStatus::Querying);
        assert_eq!(SourceStatus::from_text("COMPLETE"), SourceStatus::Complete);
        assert_eq!(SourceStatus::from_text("paused"), SourceStatus::Unknown);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SourceStatus::Complete.is_complete());
        assert!(SourceStatus::Failed.is_complete());
        assert!(!SourceStatus::Updating.is_complete());
    }

    #[test]
    fn test_new_record_starts_chunking() {
        let record = record();
        assert_eq!(record.status, SourceStatus::Chunking);
        assert_eq!(record.processed_words, 0);
        assert_eq!(record.started, record.last_updated);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_advance_status_never_regresses() {
        let mut record = record();
        assert!(record.advance_status(SourceStatus::Updating, Utc::now()));
        assert!(!record.advance_status(SourceStatus::Querying, Utc::now()));
        assert!(!record.advance_status(SourceStatus::Updating, Utc::now()));
        assert_eq!(record.status, SourceStatus::Updating);
    }

    #[test]
    fn test_processed_words_clamp_and_complete() {
        let mut record = record();
        record.apply_totals(StatusTotals::new().words(50), Utc::now());

        record.apply_increment(StatusCounter::ProcessedWords, 30, Utc::now());
        assert_eq!(record.status, SourceStatus::Chunking);

        record.apply_increment(StatusCounter::ProcessedWords, 30, Utc::now());
        assert_eq!(record.processed_words, 50);
        assert_eq!(record.status, SourceStatus::Complete);
    }

    #[test]
    fn test_completion_does_not_override_failure() {
        let mut record = record();
        record.apply_totals(StatusTotals::new().words(5), Utc::now());
        record.advance_status(SourceStatus::Failed, Utc::now());

        record.apply_increment(StatusCounter::ProcessedWords, 5, Utc::now());
        assert_eq!(record.status, SourceStatus::Failed);
        assert_eq!(record.processed_words, 5);
    }

    #[test]
    fn test_unknown_total_does_not_complete() {
        let mut record = record();
        record.apply_increment(StatusCounter::ProcessedWords, 10, Utc::now());
        assert_eq!(record.processed_words, 10);
        assert_eq!(record.status, SourceStatus::Chunking);

        // Totals arriving late still settle the record
        record.apply_totals(StatusTotals::new().words(8), Utc::now());
        assert_eq!(record.processed_words, 8);
        assert_eq!(record.status, SourceStatus::Complete);
    }

    #[test]
    fn test_negative_delta_floors_at_zero() {
        let mut record = record();
        record.apply_increment(StatusCounter::RetriedWords, 3, Utc::now());
        record.apply_increment(StatusCounter::RetriedWords, -5, Utc::now());
        assert_eq!(record.retried_words, 0);
    }

    #[test]
    fn test_lowering_total_words_completes_job() {
        let mut record = record();
        record.apply_increment(StatusCounter::TotalWords, 40, Utc::now());
        record.apply_increment(StatusCounter::ProcessedWords, 30, Utc::now());
        assert_eq!(record.status, SourceStatus::Chunking);

        record.apply_increment(StatusCounter::TotalWords, -15, Utc::now());
        assert_eq!(record.processed_words, 25);
        assert_eq!(record.status, SourceStatus::Complete);

        assert!(StatusCounter::TotalWords.affects_completion());
        assert!(!StatusCounter::ProcessedChunks.affects_completion());
    }

    #[test]
    fn test_wire_format() {
        let mut record = record();
        record.status = SourceStatus::Querying;
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "Querying");
        assert_eq!(value["sourceId"], "source-1");
        assert!(value.get("processedBatches").is_some());
        assert!(value.get("lastUpdated").is_some());

        let parsed: SourceUpdateStatus = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }
}
