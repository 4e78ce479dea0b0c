/// Failures that stop an analysis run. Per-record coordinate problems are not
/// errors; they surface as [`crate::models::RecordIssue`] on the result.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("row {row}: {reason}")]
    Validation { row: usize, reason: String },

    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("cluster {0} does not exist in this analysis")]
    UnknownCluster(usize),

    #[error("failed to read CSV input")]
    Csv(#[from] csv::Error),

    #[error("I/O failure")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
