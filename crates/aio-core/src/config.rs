//! Process-wide configuration.
//!
//! A plain builder struct, populated from defaults or from the
//! environment, validated once before the runtime starts. Mirrors the
//! shape of a typical scheduler config: defaults -> env overrides ->
//! explicit builder calls -> `validate()`.

use crate::env::env_get;
use std::fmt;

/// How results are delivered to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Every operation returns `(rc, errno, ...)`.
    ReturnCodes,
    /// Operations return `Result<T, AioError>`.
    Exceptions,
}

/// What happens when a runtime object is used from a thread other than
/// the one that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultithreadPolicy {
    Silent,
    Warn,
    Fatal,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub error_policy: ErrorPolicy,
    pub read_cache_size: usize,
    pub multithread_policy: MultithreadPolicy,
    pub short_timeout_ms: u64,
    pub max_events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroMaxEvents,
    ZeroShortTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMaxEvents => write!(f, "max_events must be >= 1"),
            ConfigError::ZeroShortTimeout => {
                write!(f, "short_timeout_ms must be >= 1 (0 would busy-spin the poller)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    /// Pure defaults, no environment lookups.
    pub fn new() -> Self {
        Self {
            error_policy: ErrorPolicy::ReturnCodes,
            read_cache_size: 0,
            multithread_policy: MultithreadPolicy::Warn,
            short_timeout_ms: 1000,
            max_events: 10,
        }
    }

    /// Defaults with `AIO_*` environment overrides applied on top.
    pub fn from_env() -> Self {
        let mut cfg = Self::new();

        if let Ok(val) = std::env::var("AIO_ERROR_POLICY") {
            cfg.error_policy = match val.to_lowercase().as_str() {
                "exceptions" => ErrorPolicy::Exceptions,
                _ => ErrorPolicy::ReturnCodes,
            };
        }
        if let Ok(val) = std::env::var("AIO_MULTITHREAD_POLICY") {
            cfg.multithread_policy = match val.to_lowercase().as_str() {
                "silent" => MultithreadPolicy::Silent,
                "fatal" => MultithreadPolicy::Fatal,
                _ => MultithreadPolicy::Warn,
            };
        }
        cfg.read_cache_size = env_get("AIO_READ_CACHE_SIZE", cfg.read_cache_size);
        cfg.short_timeout_ms = env_get("AIO_SHORT_TIMEOUT_MS", cfg.short_timeout_ms);
        cfg.max_events = env_get("AIO_MAX_EVENTS", cfg.max_events);
        cfg
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_read_cache_size(mut self, bytes: usize) -> Self {
        self.read_cache_size = bytes;
        self
    }

    pub fn with_multithread_policy(mut self, policy: MultithreadPolicy) -> Self {
        self.multithread_policy = policy;
        self
    }

    pub fn with_short_timeout_ms(mut self, ms: u64) -> Self {
        self.short_timeout_ms = ms;
        self
    }

    pub fn with_max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::ZeroMaxEvents);
        }
        if self.short_timeout_ms == 0 {
            return Err(ConfigError::ZeroShortTimeout);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RuntimeConfig::new().validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_events() {
        let cfg = RuntimeConfig::new().with_max_events(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroMaxEvents));
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = RuntimeConfig::new().with_short_timeout_ms(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroShortTimeout));
    }

    #[test]
    fn builder_chains() {
        let cfg = RuntimeConfig::new()
            .with_error_policy(ErrorPolicy::Exceptions)
            .with_read_cache_size(4096)
            .with_multithread_policy(MultithreadPolicy::Fatal);
        assert_eq!(cfg.error_policy, ErrorPolicy::Exceptions);
        assert_eq!(cfg.read_cache_size, 4096);
        assert_eq!(cfg.multithread_policy, MultithreadPolicy::Fatal);
    }
}
