use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to resolve token cache path: {0}")]
    PathResolution(String),

    #[error("No cached token at {0:?}")]
    TokenNotFound(PathBuf),

    #[error("Malformed token cache {path:?}: {source}")]
    TokenDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Unable to retrieve token from web: {0}")]
    AuthExchange(String),

    #[error("Google Sheets API error: {0}")]
    Sheets(String),

    #[error("Spreadsheet or range not found: {0}")]
    NotFound(String),

    #[error("No data found in range {0}")]
    EmptyResult(String),

    #[error("Unsupported cell value at row {row}, column {column}: {value}")]
    TypeMismatch {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
