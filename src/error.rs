use thiserror::Error;

/// Per-packet fatal conditions of the ingest pipeline.
///
/// `appended` counts records of the failing packet that were already committed to the
/// output block; they are not rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Short packet: {len} bytes, need at least {needed}")]
    ShortPacket { len: usize, needed: usize },

    #[error("Record of {size} bytes overruns the {remaining} bytes left in the packet")]
    RecordOverrun {
        size: usize,
        remaining: usize,
        appended: u32,
    },

    #[error("Output block full: need {needed} bytes")]
    OutputFull { needed: usize, appended: u32 },

    #[error("Invalid record: {reason}")]
    InvalidRecord {
        reason: &'static str,
        appended: u32,
    },
}

impl IngestError {
    /// Whether the caller may flush the output block and retry
    pub fn is_output_full(&self) -> bool {
        matches!(self, IngestError::OutputFull { .. })
    }

    /// Records of the failing packet that remain in the output block
    pub fn appended(&self) -> u32 {
        match self {
            IngestError::ShortPacket { .. } => 0,
            IngestError::RecordOverrun { appended, .. }
            | IngestError::OutputFull { appended, .. }
            | IngestError::InvalidRecord { appended, .. } => *appended,
        }
    }

    pub(crate) fn with_appended(self, count: u32) -> Self {
        match self {
            IngestError::ShortPacket { .. } => self,
            IngestError::RecordOverrun {
                size, remaining, ..
            } => IngestError::RecordOverrun {
                size,
                remaining,
                appended: count,
            },
            IngestError::OutputFull { needed, .. } => IngestError::OutputFull {
                needed,
                appended: count,
            },
            IngestError::InvalidRecord { reason, .. } => IngestError::InvalidRecord {
                reason,
                appended: count,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum FlowrecError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Decode error: {0}")]
    Decode(#[from] flowrec_common::DecodeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Capture error at offset {offset}: {reason}")]
    Capture { offset: usize, reason: String },

    #[error("Block file error: {0}")]
    BlockFile(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, FlowrecError>;
