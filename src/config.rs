//! YAML configuration for packet I/O.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```yaml
//! storage_directory: /var/ssds/logs
//! sql:
//!   table_delimiter: "`"
//!   page_size: 50
//! stream:
//!   poll_interval_ms: 1000
//!   poll_attempts: 20
//!   payload_backoff_ms: 0
//!   channel_capacity: 64
//! ```

use crate::io::ReadAheadPolicy;
use crate::sql::{DEFAULT_PAGE_SIZE, SqlDialect};
use crate::{PacketError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoConfig {
    /// Directory of local log copies, checked before opening a remote stream,
    /// and the root of a [`PacketLogStore`](crate::log::PacketLogStore).
    pub storage_directory: Option<PathBuf>,
    pub sql: SqlConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlConfig {
    pub table_delimiter: String,
    pub last_n_preamble: Option<String>,
    pub last_n_postamble: Option<String>,
    /// Rows held in memory per page.
    pub page_size: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        let dialect = SqlDialect::default();
        Self {
            table_delimiter: dialect.table_delimiter,
            last_n_preamble: dialect.last_n_preamble,
            last_n_postamble: dialect.last_n_postamble,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SqlConfig {
    pub fn dialect(&self) -> SqlDialect {
        SqlDialect {
            table_delimiter: self.table_delimiter.clone(),
            last_n_preamble: self.last_n_preamble.clone(),
            last_n_postamble: self.last_n_postamble.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub payload_backoff_ms: u64,
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let policy = ReadAheadPolicy::default();
        Self {
            poll_interval_ms: policy.poll_interval.as_millis() as u64,
            poll_attempts: policy.poll_attempts,
            payload_backoff_ms: policy.payload_backoff.as_millis() as u64,
            channel_capacity: policy.channel_capacity,
        }
    }
}

impl StreamConfig {
    pub fn read_ahead_policy(&self) -> ReadAheadPolicy {
        ReadAheadPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_attempts: self.poll_attempts,
            payload_backoff: Duration::from_millis(self.payload_backoff_ms),
            channel_capacity: self.channel_capacity,
        }
    }
}

impl IoConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: IoConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| PacketError::Config { details: format!("YAML parsing failed: {}", e) })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| PacketError::file_error(path, e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sql.page_size == 0 {
            return Err(PacketError::Config {
                details: "sql.page_size must be at least 1".to_string(),
            });
        }
        if self.stream.channel_capacity == 0 {
            return Err(PacketError::Config {
                details: "stream.channel_capacity must be at least 1".to_string(),
            });
        }
        self.sql.dialect().validate()
    }
}
