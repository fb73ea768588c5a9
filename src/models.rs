// src/models.rs
//! Data models shared by the backend handlers and the scan station.
//!
//! Wire bodies use camelCase, matching what the dispatch screen sends.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::scan::session::{BinStatus, InvoiceStatus, RestoredProgress};

lazy_static! {
    static ref BIN_NO_REGEX: Regex = Regex::new(r"^\d{13}$").unwrap();
    static ref PART_NUMBER_REGEX: Regex = Regex::new(r"^[A-Z0-9]{11}$").unwrap();
    static ref INVOICE_NUMBER_REGEX: Regex = Regex::new(r"^[A-Z0-9]{10}$").unwrap();
}

// ==================== PARTS ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    pub part_number: String,
    pub part_name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartRequest {
    #[validate(custom(function = "validate_part_number"))]
    pub part_number: String,

    #[validate(length(min = 1, max = 255, message = "Part name must be between 1 and 255 characters"))]
    pub part_name: String,

    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

// ==================== INVOICES ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub part_number: String,
    pub part_name: String,
    pub quantity: u32,
    pub customer: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[validate(custom(function = "validate_invoice_number"))]
    pub invoice_number: String,

    #[validate(custom(function = "validate_part_number"))]
    pub part_number: String,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,

    #[validate(length(max = 255, message = "Customer cannot exceed 255 characters"))]
    pub customer: Option<String>,
}

// ==================== BIN DATA ====================

/// A bin as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BinRecord {
    pub id: String,
    pub bin_no: String,
    pub invoice_number: String,
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: u32,
    pub scanned_quantity: u32,
    pub status: BinStatus,
    pub qr_code_data: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBinRequest {
    #[validate(length(max = 4000, message = "QR payload cannot exceed 4000 characters"))]
    pub qr_code_data: String,

    #[validate(custom(function = "validate_invoice_number"))]
    pub invoice_number: String,

    #[validate(custom(function = "validate_bin_no"))]
    pub bin_number: String,

    #[validate(custom(function = "validate_part_number"))]
    pub part_number: String,

    #[validate(range(min = 1, message = "Bin quantity must be at least 1"))]
    pub total_quantity: u32,

    pub description: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgressUpdate {
    #[validate(custom(function = "validate_bin_no"))]
    pub bin_no: String,
    pub scanned_quantity: u32,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_reason: Option<String>,
    pub session_id: String,
}

// ==================== STATISTICS ====================

/// Counter snapshot pushed by a scan station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    #[validate(length(min = 1, message = "Invoice number is required"))]
    pub invoice_number: String,
    #[validate(length(min = 1, message = "Session id is required"))]
    pub session_id: String,
    pub part_number: String,
    pub original_quantity: u32,
    pub scanned_parts_count: u32,
    pub remaining_quantity: u32,
    pub total_bin_count: u32,
    pub completed_bin_count: u32,
    pub current_bin_no: Option<String>,
    pub current_bin_scanned: u32,
    pub current_bin_total: u32,
    pub timestamp: DateTime<Utc>,
}

impl From<&StatisticsSnapshot> for RestoredProgress {
    fn from(snapshot: &StatisticsSnapshot) -> Self {
        RestoredProgress {
            scanned_quantity: snapshot.scanned_parts_count,
            completed_bins: snapshot.completed_bin_count,
            total_bins: snapshot.total_bin_count,
        }
    }
}

// ==================== INVOICE PROGRESS ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceProgress {
    #[validate(length(min = 1, message = "Invoice number is required"))]
    pub invoice_number: String,
    pub scanned_quantity: u32,
    pub completed_bins: u32,
    pub total_bins: u32,
    pub remaining_quantity: u32,
    pub status: InvoiceStatus,
    pub session_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&InvoiceProgress> for RestoredProgress {
    fn from(progress: &InvoiceProgress) -> Self {
        RestoredProgress {
            scanned_quantity: progress.scanned_quantity,
            completed_bins: progress.completed_bins,
            total_bins: progress.total_bins,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub session_id: Option<String>,
}

// ==================== VALIDATORS ====================

fn validate_bin_no(value: &str) -> Result<(), validator::ValidationError> {
    if BIN_NO_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_bin_no");
        error.message = Some("Bin number must be 13 digits".into());
        Err(error)
    }
}

fn validate_part_number(value: &str) -> Result<(), validator::ValidationError> {
    if PART_NUMBER_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_part_number");
        error.message = Some("Part number must be 11 uppercase letters or digits".into());
        Err(error)
    }
}

fn validate_invoice_number(value: &str) -> Result<(), validator::ValidationError> {
    if INVOICE_NUMBER_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_invoice_number");
        error.message = Some("Invoice number must be 10 uppercase letters or digits".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bin_request_wire_format() {
        let body = serde_json::json!({
            "qrCodeData": "1000000000001\n31100M55T04\n4\nBracket",
            "invoiceNumber": "INV2600123",
            "binNumber": "1000000000001",
            "partNumber": "31100M55T04",
            "totalQuantity": 4,
            "description": "Bracket",
            "sessionId": "s-1",
            "timestamp": "2026-10-18T08:00:00Z"
        });
        let request: CreateBinRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.total_quantity, 4);
    }

    #[test]
    fn test_create_bin_request_rejects_short_bin_no() {
        let request = CreateBinRequest {
            qr_code_data: String::new(),
            invoice_number: "INV2600123".to_string(),
            bin_number: "12345".to_string(),
            part_number: "31100M55T04".to_string(),
            total_quantity: 4,
            description: None,
            session_id: "s-1".to_string(),
            timestamp: Utc::now(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("bin_number"));
    }

    #[test]
    fn test_scan_progress_omits_missing_reason() {
        let update = ScanProgressUpdate {
            bin_no: "1000000000001".to_string(),
            scanned_quantity: 2,
            is_valid: true,
            mismatch_reason: None,
            session_id: "s-1".to_string(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["binNo"], "1000000000001");
        assert_eq!(json["isValid"], true);
        assert!(json.get("mismatchReason").is_none());
    }

    #[test]
    fn test_invoice_progress_status_is_snake_case() {
        let progress = InvoiceProgress {
            invoice_number: "INV2600123".to_string(),
            scanned_quantity: 8,
            completed_bins: 2,
            total_bins: 2,
            remaining_quantity: 0,
            status: InvoiceStatus::Complete,
            session_id: None,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["completedBins"], 2);
    }
}
