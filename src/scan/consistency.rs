// src/scan/consistency.rs
//! Three-way part/bin/invoice matching.

use strum::{AsRefStr, Display};

use super::barcode::SPACED_EXAMPLE;
use super::error::{ScanError, ScanResult};
use super::qr::BinLabel;
use super::session::{BinContext, InvoiceContext};

/// Context that must exist before part scanning is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Precondition {
    NoInvoice,
    InvoicePartMissing,
    NoBin,
}

impl Precondition {
    pub fn message(&self) -> &'static str {
        match self {
            Precondition::NoInvoice => "Select an invoice before scanning parts",
            Precondition::InvoicePartMissing => "The selected invoice has no part number loaded",
            Precondition::NoBin => "Scan a bin label before scanning parts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Precondition),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Whether the part-scan input should be enabled, and if not, why.
pub fn part_scan_eligibility(
    invoice: Option<&InvoiceContext>,
    bin: Option<&BinContext>,
) -> Eligibility {
    let Some(invoice) = invoice else {
        return Eligibility::Ineligible(Precondition::NoInvoice);
    };
    if invoice.part_number.trim().is_empty() {
        return Eligibility::Ineligible(Precondition::InvoicePartMissing);
    }
    if bin.is_none() {
        return Eligibility::Ineligible(Precondition::NoBin);
    }
    Eligibility::Eligible
}

/// A bin label must belong to the selected invoice and carry its part.
pub fn check_bin_load(invoice: &InvoiceContext, label: &BinLabel) -> ScanResult<()> {
    if label.invoice_number != invoice.invoice_number {
        return Err(ScanError::validation(format!(
            "Invoice mismatch: selected {} but bin {} is labelled for {}",
            invoice.invoice_number, label.bin_no, label.invoice_number
        )));
    }
    if label.part_number != invoice.part_number {
        return Err(ScanError::validation(format!(
            "Part mismatch: invoice {} expects {} but bin {} holds {}",
            invoice.invoice_number, invoice.part_number, label.bin_no, label.part_number
        )));
    }
    Ok(())
}

/// Invoice part, bin part and scanned part must be pairwise equal.
pub fn check_part_scan(
    invoice: &InvoiceContext,
    bin: &BinContext,
    scanned_part: &str,
) -> ScanResult<()> {
    if invoice.part_number != bin.part_number {
        return Err(ScanError::validation(format!(
            "Invoice/bin mismatch: invoice {} expects {} but bin {} holds {}",
            invoice.invoice_number, invoice.part_number, bin.bin_no, bin.part_number
        )));
    }
    if scanned_part != bin.part_number {
        return Err(ScanError::validation(format!(
            "Bin/part mismatch: bin {} holds {} but scanned part is {}",
            bin.bin_no, bin.part_number, scanned_part
        )));
    }
    if scanned_part != invoice.part_number {
        return Err(ScanError::validation(format!(
            "Invoice/part mismatch: invoice {} expects {} but scanned part is {}",
            invoice.invoice_number, invoice.part_number, scanned_part
        )));
    }
    Ok(())
}

/// Spaced machine barcodes must be exactly `expected_len` characters. Input
/// without a space is left to the parser.
pub fn check_machine_barcode_format(raw: &str, expected_len: usize) -> ScanResult<()> {
    let text = raw.trim_end_matches(['\r', '\n']);
    if !text.contains(' ') {
        return Ok(());
    }
    let actual = text.chars().count();
    if actual != expected_len {
        return Err(ScanError::Format {
            expected: expected_len,
            actual,
            example: SPACED_EXAMPLE.to_string(),
        });
    }
    Ok(())
}
