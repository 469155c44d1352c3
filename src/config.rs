//! Ingest configuration, read from YAML
//!
//! ```yaml
//! block_capacity: 5242880
//! print_records: false
//! stats_format: json
//! sources:
//!   - ident: edge
//!     address: 192.0.2.1
//!     capture: /var/spool/flowrec/edge.pcapd
//!     output: /var/lib/flowrec/edge.blocks
//! ```

use crate::error::{FlowrecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BLOCK_CAPACITY: usize = 5 * 1024 * 1024;
/// A block must hold the largest record a 16 bit size field allows
pub const MIN_BLOCK_CAPACITY: usize = u16::MAX as usize;

/// How per-source statistics are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatsFormat {
    #[default]
    Json,
    Prometheus,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Capacity of each output block in bytes
    #[serde(default = "default_block_capacity")]
    pub block_capacity: usize,

    /// Log every forwarded record
    #[serde(default)]
    pub print_records: bool,

    #[serde(default)]
    pub stats_format: StatsFormat,

    pub sources: Vec<SourceConfig>,
}

/// One exporter capture to ingest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub ident: String,
    /// Address the capture was received from
    pub address: IpAddr,
    /// Concatenated pcapd packets
    pub capture: PathBuf,
    /// Block file to write
    pub output: PathBuf,
}

fn default_block_capacity() -> usize {
    DEFAULT_BLOCK_CAPACITY
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: IngestConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_capacity < MIN_BLOCK_CAPACITY {
            return Err(FlowrecError::ConfigError(format!(
                "block_capacity {} is below the minimum of {} bytes",
                self.block_capacity, MIN_BLOCK_CAPACITY
            )));
        }
        if self.sources.is_empty() {
            return Err(FlowrecError::ConfigError(
                "at least one source is required".to_string(),
            ));
        }

        let mut idents = HashSet::new();
        for source in &self.sources {
            if source.ident.is_empty() {
                return Err(FlowrecError::ConfigError(
                    "source ident must not be empty".to_string(),
                ));
            }
            if !idents.insert(source.ident.as_str()) {
                return Err(FlowrecError::ConfigError(format!(
                    "duplicate source ident '{}'",
                    source.ident
                )));
            }
        }
        Ok(())
    }
}
