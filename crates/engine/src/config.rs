//! Registry configuration via `ctxmock.toml`
//!
//! Every field has a default, so an empty file (or no file) yields a usable
//! configuration. Values can also be changed at runtime through
//! `MockRegistry::update_config`; the sweeper picks them up on its next
//! cycle.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use ctxmock_core::{MockError, Result};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "ctxmock.toml";

/// Registry configuration.
///
/// # Example
///
/// ```toml
/// max_records_per_partition = 10000
/// max_record_age_ms = 300000
/// cleanup_interval_ms = 60000
/// auto_cleanup = true
/// require_context = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Oldest records beyond this count are trimmed per (mock, context).
    #[serde(default = "default_max_records")]
    pub max_records_per_partition: usize,
    /// Records older than this are evicted by the sweeper.
    #[serde(default = "default_max_record_age_ms")]
    pub max_record_age_ms: u64,
    /// Interval between background sweeps.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// Run the background sweeper.
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,
    /// Reject intercepted calls made with no current context.
    #[serde(default)]
    pub require_context: bool,
}

fn default_max_records() -> usize {
    10_000
}

fn default_max_record_age_ms() -> u64 {
    5 * 60 * 1000
}

fn default_cleanup_interval_ms() -> u64 {
    60 * 1000
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_records_per_partition: default_max_records(),
            max_record_age_ms: default_max_record_age_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            auto_cleanup: true,
            require_context: false,
        }
    }
}

impl RegistryConfig {
    /// Default configuration with the background sweeper off.
    ///
    /// Suited to tests that drive sweeps by hand.
    pub fn manual_cleanup() -> Self {
        Self {
            auto_cleanup: false,
            ..Self::default()
        }
    }

    /// Maximum record age
    pub fn max_record_age(&self) -> Duration {
        Duration::from_millis(self.max_record_age_ms)
    }

    /// Sweep interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Check the values are usable.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidConfig` for a zero quota, age or interval.
    pub fn validate(&self) -> Result<()> {
        if self.max_records_per_partition == 0 {
            return Err(MockError::InvalidConfig(
                "max_records_per_partition must be at least 1".to_string(),
            ));
        }
        if self.max_record_age_ms == 0 {
            return Err(MockError::InvalidConfig(
                "max_record_age_ms must be positive".to_string(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(MockError::InvalidConfig(
                "cleanup_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# ctxmock registry configuration
#
# Oldest invocation records beyond this count are trimmed, per mock and context.
max_records_per_partition = 10000

# Invocation records older than this (milliseconds) are evicted by the sweeper.
max_record_age_ms = 300000

# Interval between background sweeps (milliseconds).
cleanup_interval_ms = 60000

# Run the background sweeper thread.
auto_cleanup = true

# Reject intercepted calls made with no current context.
require_context = false
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(content)
            .map_err(|e| MockError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MockError::InvalidConfig(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            MockError::InvalidConfig(msg) => {
                MockError::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                MockError::InvalidConfig(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MockError::InvalidConfig(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            MockError::InvalidConfig(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
