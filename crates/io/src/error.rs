use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: writing '{key}' needs {needed} bytes, {available} available")]
    QuotaExceeded { key: String, needed: usize, available: usize },
    #[error("no saved document with key '{0}'")]
    NotFound(String),
    #[error("saved document '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
