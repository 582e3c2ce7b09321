//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the runtime and the
//! application defaults.
//!
//! ## Environment Variables
//!
//! ### `BRRTR_STACK_SIZE`
//!
//! Stack size for may coroutines (one per connection). Decimal (`16384`) or
//! hexadecimal (`0x4000`). Default: `0x4000` (16 KB).
//!
//! ### `BRRTR_CONTEXT_POOL_SIZE`
//!
//! Maximum number of idle request contexts kept for reuse. Default: `1024`.
//!
//! ### `BRRTR_REQUEST_ID_HEADER`
//!
//! Where inbound correlation ids are read from: `standard` (`X-Request-Id`),
//! `appengine` (`X-AppEngine-Request-Log-Id`), `none`, or any header name.
//! Default: `standard`.
//!
//! ### `BRRTR_LOG_LEVEL`
//!
//! Level for the tracing subscriber (see [`crate::otel`]). Default: `info`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtchain::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

use crate::context::DEFAULT_POOL_CAPACITY;
use crate::ids::RequestIdSource;

/// Default coroutine stack size (16 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
    /// Idle contexts kept by the context pool
    pub context_pool_size: usize,
    pub request_id_source: RequestIdSource,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            context_pool_size: DEFAULT_POOL_CAPACITY,
            request_id_source: RequestIdSource::Standard,
            log_level: "info".to_string(),
        }
    }
}

/// Parse a size as hexadecimal (`0x` prefix) or decimal.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Invalid values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let stack_size = lookup("BRRTR_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(defaults.stack_size);
        let context_pool_size = lookup("BRRTR_CONTEXT_POOL_SIZE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(defaults.context_pool_size);
        let request_id_source = lookup("BRRTR_REQUEST_ID_HEADER")
            .map(|v| RequestIdSource::parse(&v))
            .unwrap_or(defaults.request_id_source);
        let log_level = lookup("BRRTR_LOG_LEVEL").unwrap_or(defaults.log_level);
        RuntimeConfig {
            stack_size,
            context_pool_size,
            request_id_source,
            log_level,
        }
    }

    /// Apply the coroutine settings to the may runtime.
    ///
    /// Must run before the first coroutine is spawned.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
        tracing::info!(stack_size = self.stack_size, "May runtime configured");
    }
}
