#![allow(dead_code)]

pub mod stubs;
pub mod strategies;

use wordlist_core::config::DispatchConfig;

/// Dispatch settings with millisecond delays so retry tests stay fast
pub fn fast_dispatch_config() -> DispatchConfig {
    DispatchConfig {
        retry_delay_ms: 1,
        retry_backoff_ms: 1,
        ..DispatchConfig::default()
    }
}
