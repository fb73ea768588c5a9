// src/scan/error.rs
//! Errors raised while ingesting and reconciling scans.

use thiserror::Error;

pub type ScanResult<T> = Result<T, ScanError>;

/// Every scan failure the station can report to the operator.
///
/// Parse, extraction, format, validation and duplicate errors are recovered by
/// the station and never mutate counters. `Network` wraps remote-store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Unrecognised barcode '{raw}': {reason}")]
    Parse { raw: String, reason: String },

    #[error("No part number found in '{raw}'")]
    Extraction { raw: String },

    #[error("Invalid barcode length: expected {expected} characters, got {actual} (example: '{example}')")]
    Format {
        expected: usize,
        actual: usize,
        example: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Duplicate scan: serial {serial} for part {part_number} was already counted")]
    Duplicate { serial: String, part_number: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl ScanError {
    pub fn validation(message: impl Into<String>) -> Self {
        ScanError::Validation(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        ScanError::Network(message.into())
    }

    /// Stable short name used in logs and scan-progress mismatch reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Parse { .. } => "parse",
            ScanError::Extraction { .. } => "extraction",
            ScanError::Format { .. } => "format",
            ScanError::Validation(_) => "validation",
            ScanError::Duplicate { .. } => "duplicate",
            ScanError::Network(_) => "network",
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Network(err.to_string())
    }
}
