use thiserror::Error;

#[derive(Error, Debug)]
pub enum SieError {
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid fiscal year range: start {start} is after end {end}")]
    InvalidFiscalYear { start: String, end: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SieError>;
