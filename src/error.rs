use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    /// The upload lacks one or more columns its schema requires.
    #[error("CSV missing columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no data loaded; load a CSV file first")]
    NoData,
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("could not parse {what} from '{input}'")]
    Parse { what: &'static str, input: String },
}

pub type Result<T> = std::result::Result<T, ProgressError>;
