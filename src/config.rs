//! # Configuration
//!
//! Layered configuration for the pipeline core, loaded with the `config` crate:
//!
//! 1. compiled-in defaults
//! 2. an optional file (format picked from its extension)
//! 3. `WORDLIST__`-prefixed environment variables, `__` between path segments
//!    (e.g. `WORDLIST__DISPATCH__BATCH_SIZE=5`)
//! 4. the per-queue and status-table variables the deployed stages already
//!    export (`UPDATE_WORDS_QUEUE_URL`, `SOURCE_UPDATE_STATUS_TABLE_NAME`, ...),
//!    which only fill entries still unset
//!
//! ```toml
//! [dispatch]
//! batch_size = 10
//! max_concurrent_batches = 4
//! max_attempts = 3
//! retry_delay_ms = 150
//! retry_backoff_ms = 100
//!
//! [queues.targets]
//! update_words = "https://queue.example/update-words"
//!
//! [status]
//! table_name = "source-update-status"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::messaging::transport::TRANSPORT_BATCH_LIMIT;

pub const ENV_PREFIX: &str = "WORDLIST";
pub const ENV_SEPARATOR: &str = "__";
pub const STATUS_TABLE_ENV: &str = "SOURCE_UPDATE_STATUS_TABLE_NAME";

/// Upper bound for `dispatch.max_concurrent_batches`
pub const MAX_CONCURRENT_BATCHES: usize = 256;

/// Logical queue names used across the pipeline
pub mod queue_names {
    pub const UPDATE_WORDS: &str = "update_words";
    pub const UPDATE_BATCH: &str = "update_batch";
    pub const PROCESS_SOURCE_CHUNK: &str = "process_source_chunk";
    pub const QUERY_WORDS: &str = "query_words";
    pub const UPLOAD_SOURCE_CHUNKS: &str = "upload_source_chunks";

    pub const ALL: [&str; 5] = [
        UPDATE_WORDS,
        UPDATE_BATCH,
        PROCESS_SOURCE_CHUNK,
        QUERY_WORDS,
        UPLOAD_SOURCE_CHUNKS,
    ];

    /// Environment variable each stage exports for a queue's URL
    pub fn legacy_env_var(queue_name: &str) -> String {
        format!("{}_QUEUE_URL", queue_name.to_ascii_uppercase())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Dispatch engine tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Payloads per transport call
    pub batch_size: usize,
    /// Group sends allowed in flight at once per flush
    pub max_concurrent_batches: usize,
    /// Rounds per group, including the first send
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: TRANSPORT_BATCH_LIMIT,
            max_concurrent_batches: 4,
            max_attempts: 3,
            retry_delay_ms: 150,
            retry_backoff_ms: 100,
        }
    }
}

impl DispatchConfig {
    /// Wait before `round` (1-based); the first round never waits
    pub fn retry_delay_for(&self, round: u32) -> Duration {
        if round <= 1 {
            return Duration::ZERO;
        }
        Duration::from_millis(
            self.retry_delay_ms
                .saturating_add(self.retry_backoff_ms.saturating_mul(u64::from(round))),
        )
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 || self.batch_size > TRANSPORT_BATCH_LIMIT {
            return Err(ConfigError::invalid(
                "dispatch.batch_size",
                format!("must be between 1 and {TRANSPORT_BATCH_LIMIT}"),
            ));
        }
        if self.max_concurrent_batches == 0
            || self.max_concurrent_batches > MAX_CONCURRENT_BATCHES
        {
            return Err(ConfigError::invalid(
                "dispatch.max_concurrent_batches",
                format!("must be between 1 and {MAX_CONCURRENT_BATCHES}"),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "dispatch.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Logical queue name to transport target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesConfig {
    pub targets: HashMap<String, String>,
}

impl QueuesConfig {
    pub fn with_target(mut self, queue_name: impl Into<String>, target: impl Into<String>) -> Self {
        self.targets.insert(queue_name.into(), target.into());
        self
    }

    pub fn target(&self, queue_name: &str) -> Option<&str> {
        self.targets.get(queue_name).map(String::as_str)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, target) in &self.targets {
            if target.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("queues.targets.{name}"),
                    "target must not be blank",
                ));
            }
        }
        Ok(())
    }
}

/// Status store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub table_name: Option<String>,
    /// Optimistic write attempts before giving up on a contended record
    pub max_write_attempts: u32,
    /// Backoff ceiling after the first conflict; doubles per attempt
    pub conflict_backoff_ms: u64,
    pub max_conflict_backoff_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            table_name: None,
            max_write_attempts: 64,
            conflict_backoff_ms: 2,
            max_conflict_backoff_ms: 250,
        }
    }
}

impl StatusConfig {
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// The status table, which every status operation requires
    pub fn table_name(&self) -> ConfigResult<&str> {
        match self.table_name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(ConfigError::missing(STATUS_TABLE_ENV)),
        }
    }

    /// Upper bound of the jittered wait after conflict number `attempt` (1-based)
    pub fn conflict_backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.conflict_backoff_ms
                .saturating_mul(factor)
                .min(self.max_conflict_backoff_ms),
        )
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.table_name {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("status.table_name", "must not be blank"));
            }
        }
        if self.max_write_attempts == 0 {
            return Err(ConfigError::invalid(
                "status.max_write_attempts",
                "must be at least 1",
            ));
        }
        if self.max_conflict_backoff_ms < self.conflict_backoff_ms {
            return Err(ConfigError::invalid(
                "status.max_conflict_backoff_ms",
                "must not be below status.conflict_backoff_ms",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dispatch: DispatchConfig,
    pub queues: QueuesConfig,
    pub status: StatusConfig,
}

impl PipelineConfig {
    /// Load from the environment only
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(None)
    }

    /// Load from a file layered under the environment
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading pipeline configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let mut loaded: PipelineConfig = builder.build()?.try_deserialize()?;
        loaded.apply_legacy_env(|key| std::env::var(key).ok());
        loaded.validate()?;

        debug!(
            queues = loaded.queues.targets.len(),
            status_table = loaded.status.table_name.as_deref().unwrap_or("<unset>"),
            batch_size = loaded.dispatch.batch_size,
            "Pipeline configuration loaded"
        );

        Ok(loaded)
    }

    /// Fill unset queue targets and the status table from per-stage variables
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in queue_names::ALL {
            if self.queues.targets.contains_key(name) {
                continue;
            }
            if let Some(target) = lookup(&queue_names::legacy_env_var(name)) {
                self.queues.targets.insert(name.to_string(), target);
            }
        }

        if self.status.table_name.is_none() {
            self.status.table_name = lookup(STATUS_TABLE_ENV);
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.dispatch.validate()?;
        self.queues.validate()?;
        self.status.validate()
    }
}
