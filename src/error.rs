use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("invalid dataset identifier: {0:?}")]
    InvalidDatasetId(String),

    #[error("column {column:?} not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("failed to read CSV {path}: {message}")]
    CsvRead { path: PathBuf, message: String },

    #[error("failed to write CSV: {0}")]
    CsvWrite(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned malformed JSON: {0}")]
    CatalogPayload(String),

    #[error("download failed: {0}")]
    DownloadHttp(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
