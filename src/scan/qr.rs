// src/scan/qr.rs
//! Bin label (QR code) parsing.
//!
//! A bin label carries the 13 digit bin number, the part number, the bin
//! quantity, a description, a date and usually the invoice number. Scanners
//! deliver it either line by line, squashed onto one line, or mangled; the
//! three tiers below handle those cases in that order.

use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::barcode::{find_part_number, SourceFormat};
use super::error::{ScanError, ScanResult};
use super::{first_success, Strategy};

pub const BIN_NO_LEN: usize = 13;
pub const INVOICE_NO_LEN: usize = 10;
const MIN_LABEL_LINES: usize = 4;

lazy_static! {
    static ref BIN_NO_SHAPE: Regex = Regex::new(r"^\d{13}$").unwrap();
    static ref DATE_SHAPE: Regex = Regex::new(r"^\d{2}/\d{2}/(\d{2}|\d{4})$").unwrap();
    static ref QUANTITY_SHAPE: Regex = Regex::new(r"^\d{1,6}$").unwrap();
    static ref PART_SHAPE: Regex = Regex::new(r"^[A-Z0-9]{11}$").unwrap();
    static ref INVOICE_SHAPE: Regex = Regex::new(r"^[A-Z0-9]{10}$").unwrap();
    static ref FIELD_LABEL: Regex = Regex::new(r"^[A-Za-z][A-Za-z .#_-]*$").unwrap();

    static ref BIN_NO_ANYWHERE: Regex = Regex::new(r"(?:^|\D)(\d{13})(?:\D|$)").unwrap();
    static ref QUANTITY_LABELLED: Regex = Regex::new(r"(?:QTY|QUANTITY)\W*(\d{1,6})").unwrap();
    static ref STANDALONE_NUMBER: Regex = Regex::new(r"(?:^|[^\d/])(\d{1,6})(?:[^\d/]|$)").unwrap();
    static ref DATE_ANYWHERE: Regex = Regex::new(r"(\d{2}/\d{2}/(?:\d{4}|\d{2}))").unwrap();
    static ref INVOICE_LABELLED: Regex = Regex::new(r"INV(?:OICE)?(?:\s*NO)?\W*([A-Z0-9]{10})\b").unwrap();
    static ref INVOICE_ANYWHERE: Regex = Regex::new(r"\b([A-Z0-9]{10})\b").unwrap();
}

/// A parsed bin label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinLabel {
    pub bin_no: String,
    pub part_number: String,
    pub quantity: u32,
    pub description: String,
    pub date: String,
    pub invoice_number: String,
    pub raw_text: String,
    pub source_format: SourceFormat,
}

/// Values used when the label itself does not carry them.
#[derive(Debug, Clone, Default)]
pub struct LabelDefaults {
    pub invoice_number: Option<String>,
}

const TIERS: [Strategy<LabelDefaults, BinLabel>; 3] = [
    ("qr-lines", parse_lines),
    ("qr-compressed", parse_compressed),
    ("regex-fallback", parse_with_patterns),
];

/// Parse a bin label, falling back to the currently selected invoice when the
/// label carries none.
pub fn parse_bin_label(raw: &str, default_invoice: Option<&str>) -> ScanResult<BinLabel> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ScanError::Parse {
            raw: raw.to_string(),
            reason: "empty QR payload".to_string(),
        });
    }

    let defaults = LabelDefaults {
        invoice_number: default_invoice.map(str::to_string),
    };

    match first_success(text, &defaults, &TIERS) {
        Ok((tier, label)) => {
            log::debug!(
                "Parsed bin label via {}: bin={} part={} qty={}",
                tier, label.bin_no, label.part_number, label.quantity
            );
            Ok(label)
        }
        Err(failures) => Err(ScanError::Parse {
            raw: text.to_string(),
            reason: failures.join("; "),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    BinNo,
    Date,
    Quantity,
    PartNumber,
    Invoice,
    Text,
}

fn classify(value: &str) -> Field {
    let upper = value.to_uppercase();
    if BIN_NO_SHAPE.is_match(&upper) {
        Field::BinNo
    } else if DATE_SHAPE.is_match(&upper) {
        Field::Date
    } else if QUANTITY_SHAPE.is_match(&upper) {
        Field::Quantity
    } else if PART_SHAPE.is_match(&upper) && has_letter_and_digit(&upper) {
        Field::PartNumber
    } else if INVOICE_SHAPE.is_match(&upper) && has_letter_and_digit(&upper) {
        Field::Invoice
    } else {
        Field::Text
    }
}

fn has_letter_and_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_alphabetic()) && value.chars().any(|c| c.is_ascii_digit())
}

/// `"Part No: 31100M55T04"` -> `"31100M55T04"`; anything else is returned as is.
fn strip_field_label(value: &str) -> &str {
    match value.split_once(':') {
        Some((label, rest)) if FIELD_LABEL.is_match(label.trim()) && !rest.trim().is_empty() => {
            rest.trim()
        }
        _ => value.trim(),
    }
}

/// Accumulates classified values; the first value of each kind wins.
#[derive(Default)]
struct LabelFields {
    bin_no: Option<String>,
    part_number: Option<String>,
    quantity: Option<u32>,
    date: Option<String>,
    invoice_number: Option<String>,
    description: Vec<String>,
}

impl LabelFields {
    fn offer(&mut self, value: &str) {
        let value = strip_field_label(value);
        if value.is_empty() {
            return;
        }
        let upper = value.to_uppercase();
        match classify(value) {
            Field::BinNo if self.bin_no.is_none() => self.bin_no = Some(upper),
            Field::Date if self.date.is_none() => self.date = Some(upper),
            Field::Quantity if self.quantity.is_none() => {
                self.quantity = upper.parse::<u32>().ok().filter(|q| *q > 0)
            }
            Field::PartNumber if self.part_number.is_none() => self.part_number = Some(upper),
            Field::Invoice if self.invoice_number.is_none() => self.invoice_number = Some(upper),
            Field::Text => self.description.push(value.to_string()),
            _ => {}
        }
    }

    fn finish(
        self,
        raw: &str,
        defaults: &LabelDefaults,
        source_format: SourceFormat,
    ) -> Result<BinLabel, String> {
        let bin_no = self.bin_no.ok_or("no 13 digit bin number")?;
        let part_number = self.part_number.ok_or("no part number")?;
        let quantity = self.quantity.ok_or("no positive quantity")?;
        let invoice_number = self
            .invoice_number
            .or_else(|| defaults.invoice_number.clone())
            .ok_or("no invoice number and no invoice selected")?;

        Ok(BinLabel {
            bin_no,
            part_number,
            quantity,
            description: self.description.join(" "),
            date: self.date.unwrap_or_else(today),
            invoice_number,
            raw_text: raw.to_string(),
            source_format,
        })
    }
}

fn today() -> String {
    Local::now().format("%d/%m/%y").to_string()
}

// ==================== TIERS ====================

fn parse_lines(text: &str, defaults: &LabelDefaults) -> Result<BinLabel, String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() < MIN_LABEL_LINES {
        return Err(format!(
            "expected at least {} lines, found {}",
            MIN_LABEL_LINES,
            lines.len()
        ));
    }

    let mut fields = LabelFields::default();
    for line in lines {
        fields.offer(line);
    }
    fields.finish(text, defaults, SourceFormat::QrLines)
}

fn parse_compressed(text: &str, defaults: &LabelDefaults) -> Result<BinLabel, String> {
    let mut fields = LabelFields::default();
    for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '|') {
        fields.offer(token);
    }
    fields.finish(text, defaults, SourceFormat::QrCompressed)
}

fn parse_with_patterns(text: &str, defaults: &LabelDefaults) -> Result<BinLabel, String> {
    let upper = text.to_uppercase();

    let bin_no = BIN_NO_ANYWHERE
        .captures(&upper)
        .map(|caps| caps[1].to_string())
        .ok_or("no 13 digit bin number")?;
    let without_bin = upper.replacen(&bin_no, " ", 1);

    let (part_number, _) = find_part_number(&without_bin).ok_or("no part number")?;
    let remainder = without_bin.replacen(&part_number, " ", 1);

    let date = DATE_ANYWHERE
        .captures(&remainder)
        .map(|caps| caps[1].to_string());

    let quantity = QUANTITY_LABELLED
        .captures(&remainder)
        .or_else(|| STANDALONE_NUMBER.captures(&remainder))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|q| *q > 0)
        .ok_or("no positive quantity")?;

    let invoice_number = find_invoice_number(&remainder)
        .or_else(|| defaults.invoice_number.clone())
        .ok_or("no invoice number and no invoice selected")?;

    Ok(BinLabel {
        bin_no,
        part_number,
        quantity,
        description: String::new(),
        date: date.unwrap_or_else(today),
        invoice_number,
        raw_text: text.to_string(),
        source_format: SourceFormat::RegexFallback,
    })
}

/// Labelled invoice first, then any bare token of invoice shape. Plain
/// words of the right length are descriptions, not invoices.
fn find_invoice_number(text: &str) -> Option<String> {
    [&*INVOICE_LABELLED, &*INVOICE_ANYWHERE]
        .into_iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .map(|caps| caps[1].to_string())
        .find(|candidate| has_letter_and_digit(candidate))
}
