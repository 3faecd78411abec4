//! Error types for each stage of a retrieval run.
//!
//! Only [`ConfigError`] is fatal. Everything else is recovered where it occurs:
//! extraction errors fall back to the heuristic backend, source and download errors
//! are recorded on the attempt and the next handler is tried, and citation errors
//! mark a single citation as `error`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid contact email '{0}': a real address is required for API courtesy headers")]
    InvalidContactEmail(String),
    #[error("Invalid setting {name}: {reason}")]
    InvalidThreshold { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid PDF path: {}", .0.display())]
    InvalidPdf(PathBuf),
    #[error("Structured extraction service unavailable at {0}")]
    ServiceUnavailable(String),
    #[error("Structured extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Structured extraction service returned status {0}")]
    Status(u16),
    #[error("Malformed citation markup: {0}")]
    Markup(String),
    #[error("PDF text extraction failed: {0}")]
    PdfText(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ExtractionError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractionError::Markup(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no {0} available")]
    MissingInput(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("not open access")]
    NotOpenAccess,
    #[error("no PDF link found")]
    NoPdfLink,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download returned status {0}")]
    Status(u16),
    #[error("downloaded file too small: {size} bytes (minimum {min})")]
    TooSmall { size: u64, min: u64 },
    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CitationError {
    #[error("failed to inspect output path: {0}")]
    Io(#[from] std::io::Error),
    #[error("processing panicked: {0}")]
    Panicked(String),
}
