//! RPC configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use graphwire::domain::{RegistryScope, RpcConfigBuilder};
//! use std::time::Duration;
//!
//! let config = RpcConfigBuilder::new()
//!     .default_timeout(Duration::from_secs(5))
//!     .registry_scope(RegistryScope::PerCall)
//!     .build()
//!     .expect("Valid config");
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::graph::{CodecLimits, DEFAULT_MAX_VALUE_DEPTH};
use super::wire::DEFAULT_MAX_COLLECTION_LEN;
use crate::error::ConfigError;

/// Lifetime of the visited registry while writing call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryScope {
    /// A fresh registry per argument. Objects shared between arguments
    /// arrive as distinct copies.
    #[default]
    PerArgument,
    /// One registry for the whole argument list.
    PerCall,
}

impl FromStr for RegistryScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_argument" | "per-argument" | "argument" => Ok(RegistryScope::PerArgument),
            "per_call" | "per-call" | "call" => Ok(RegistryScope::PerCall),
            _ => Err(ConfigError::InvalidValue {
                key: "registry_scope".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Caller/callee configuration shared by one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Deadline for calls that do not pass their own
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Visited-registry scope for argument lists
    pub registry_scope: RegistryScope,
    /// Maximum nesting of an inbound type signature
    pub max_type_depth: usize,
    /// Maximum nesting of a serialized value
    pub max_value_depth: usize,
    /// Maximum string/array length accepted on decode
    pub max_collection_len: usize,
    /// Interval of the expired-call sweeper
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            registry_scope: RegistryScope::PerArgument,
            max_type_depth: 64,
            max_value_depth: DEFAULT_MAX_VALUE_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl RpcConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GW_CALL_TIMEOUT_MS`: Default call timeout (default: 30000)
    /// - `GW_REGISTRY_SCOPE`: `per_argument` or `per_call` (default: per_argument)
    /// - `GW_MAX_TYPE_DEPTH`: Type signature nesting limit (default: 64)
    /// - `GW_MAX_VALUE_DEPTH`: Value nesting limit (default: 256)
    /// - `GW_MAX_COLLECTION_LEN`: Length limit for strings and arrays (default: 1048576)
    /// - `GW_SWEEP_INTERVAL_MS`: Expired-call sweep interval (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`RpcConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, "GW_CALL_TIMEOUT_MS")? {
            config.default_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("GW_REGISTRY_SCOPE") {
            config.registry_scope = raw.parse()?;
        }
        if let Some(depth) = parse_var(&lookup, "GW_MAX_TYPE_DEPTH")? {
            config.max_type_depth = depth;
        }
        if let Some(depth) = parse_var(&lookup, "GW_MAX_VALUE_DEPTH")? {
            config.max_value_depth = depth;
        }
        if let Some(len) = parse_var(&lookup, "GW_MAX_COLLECTION_LEN")? {
            config.max_collection_len = len;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "GW_SWEEP_INTERVAL_MS")? {
            config.sweep_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "default_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "sweep_interval",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_type_depth == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_type_depth",
                reason: "cannot be 0".into(),
            });
        }
        if self.max_value_depth == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_value_depth",
                reason: "cannot be 0".into(),
            });
        }
        // Lengths travel as i32.
        if self.max_collection_len == 0 || self.max_collection_len > i32::MAX as usize {
            return Err(ConfigError::OutOfRange {
                field: "max_collection_len",
                reason: format!("must be within 1..={}", i32::MAX),
            });
        }
        Ok(())
    }

    /// Codec limits derived from this configuration.
    pub fn limits(&self) -> CodecLimits {
        CodecLimits {
            max_type_depth: self.max_type_depth,
            max_value_depth: self.max_value_depth,
            max_collection_len: self.max_collection_len,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Builder for [`RpcConfig`]
#[derive(Debug, Default)]
pub struct RpcConfigBuilder {
    config: RpcConfig,
}

impl RpcConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn registry_scope(mut self, scope: RegistryScope) -> Self {
        self.config.registry_scope = scope;
        self
    }

    pub fn max_type_depth(mut self, depth: usize) -> Self {
        self.config.max_type_depth = depth;
        self
    }

    pub fn max_value_depth(mut self, depth: usize) -> Self {
        self.config.max_value_depth = depth;
        self
    }

    pub fn max_collection_len(mut self, len: usize) -> Self {
        self.config.max_collection_len = len;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Build, rejecting invalid settings
    pub fn build(self) -> Result<RpcConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
