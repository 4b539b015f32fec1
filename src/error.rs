use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Row {row} has {found} cells but the table has {expected} columns")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' has {found} values but the table has {expected} rows")]
    ColumnShape {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid study document: {0}")]
    InvalidDocument(String),

    #[error("Report task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
