// src/scan/barcode.rs
//! Machine (part) barcode parsing.
//!
//! Physical labels come in a few shapes. The strategies are tried in a fixed
//! order and the first one that accepts the text wins:
//!
//! 1. concatenated fixed-width: `L012131100M55T042907251004231`
//! 2. spaced: `L0121 31100M55T04290725 100 4231` or `L012 1 31100M55T04 290725 100 4231`
//! 3. pattern fallback over whatever the scanner produced

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::error::{ScanError, ScanResult};
use super::{first_success, Strategy};

pub const PART_NUMBER_LEN: usize = 11;
pub const SERIAL_LEN: usize = 4;
pub const DATE_LEN: usize = 6;
const VENDOR_LEN: usize = 4;
const CONCATENATED_MIN_LEN: usize = 25;

/// A well-formed 32 character spaced label, quoted in format errors.
pub const SPACED_EXAMPLE: &str = "L0121 31100M55T04290725 100 4231";

lazy_static! {
    static ref VENDOR_REGEX: Regex = Regex::new(r"^[A-Z]\d{3}$").unwrap();
    static ref CONCATENATED_PREFIX: Regex = Regex::new(r"^[A-Z]\d{3}").unwrap();
    static ref DIGITS_REGEX: Regex = Regex::new(r"^\d+$").unwrap();

    /// Part-number shapes, most specific first.
    static ref PART_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b(\d{5}[A-Z]\d{2}[A-Z]\d{2})\b").unwrap(),
        Regex::new(r"(\d{5}[A-Z]\d{2}[A-Z]\d{2})").unwrap(),
        Regex::new(r"\b([A-Z0-9]{11})\b").unwrap(),
        Regex::new(r"([A-Z0-9]{11})").unwrap(),
    ];

    static ref TRAILING_SERIAL: Regex = Regex::new(r"(\d{4})\s*$").unwrap();
    static ref VENDOR_WITH_SHIFT: Regex = Regex::new(r"^([A-Z]\d{3})(\d)").unwrap();
    static ref VENDOR_PREFIX: Regex = Regex::new(r"^([A-Z]\d{2,4})").unwrap();
    static ref SIX_DIGITS: Regex = Regex::new(r"(\d{6})").unwrap();
}

static SERIAL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Which strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    Spaced,
    Concatenated,
    QrLines,
    QrCompressed,
    RegexFallback,
}

/// One parsed machine barcode read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub vendor_code: String,
    pub shift: String,
    pub part_number: String,
    pub date: String,
    pub quantity: u32,
    pub serial_number: String,
    pub raw_text: String,
    pub source_format: SourceFormat,
    /// Canonical label layout rebuilt from the parsed fields.
    pub spaced_format: String,
}

impl ScanRecord {
    fn build(
        vendor_code: &str,
        shift: &str,
        part_number: &str,
        date: &str,
        quantity: u32,
        serial_number: &str,
        raw_text: &str,
        source_format: SourceFormat,
    ) -> Self {
        let spaced_format = format!(
            "{}{} {}{} {} {}",
            vendor_code, shift, part_number, date, quantity, serial_number
        );
        Self {
            vendor_code: vendor_code.to_string(),
            shift: shift.to_string(),
            part_number: part_number.to_string(),
            date: date.to_string(),
            quantity,
            serial_number: serial_number.to_string(),
            raw_text: raw_text.to_string(),
            source_format,
            spaced_format,
        }
    }
}

const STRATEGIES: [Strategy<(), ScanRecord>; 3] = [
    ("concatenated", parse_concatenated),
    ("spaced", parse_spaced),
    ("regex-fallback", parse_with_patterns),
];

/// Parse one raw machine barcode read.
pub fn parse(raw: &str) -> ScanResult<ScanRecord> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ScanError::Parse {
            raw: raw.to_string(),
            reason: "empty scan".to_string(),
        });
    }

    match first_success(text, &(), &STRATEGIES) {
        Ok((strategy, record)) => {
            log::debug!(
                "Parsed barcode via {}: part={} serial={}",
                strategy, record.part_number, record.serial_number
            );
            Ok(record)
        }
        Err(failures) => Err(ScanError::Parse {
            raw: text.to_string(),
            reason: failures.join("; "),
        }),
    }
}

/// Isolate only the 11 character part number, using the same strategy chain.
pub fn extract_part_number(raw: &str) -> ScanResult<String> {
    parse(raw)
        .map(|record| record.part_number)
        .map_err(|_| ScanError::Extraction {
            raw: raw.trim().to_string(),
        })
}

// ==================== STRATEGIES ====================

pub(crate) fn parse_concatenated(text: &str, _: &()) -> Result<ScanRecord, String> {
    if text.chars().any(char::is_whitespace) {
        return Err("contains whitespace".to_string());
    }
    if !text.is_ascii() {
        return Err("contains non-ASCII characters".to_string());
    }
    if text.len() < CONCATENATED_MIN_LEN {
        return Err(format!(
            "too short ({} < {})",
            text.len(),
            CONCATENATED_MIN_LEN
        ));
    }
    if !CONCATENATED_PREFIX.is_match(text) {
        return Err("does not start with a vendor code".to_string());
    }

    let vendor_code = &text[0..VENDOR_LEN];
    let shift = &text[4..5];
    let part_number = &text[5..16];
    let date = &text[16..22];
    let remainder = &text[22..];

    if remainder.len() < SERIAL_LEN {
        return Err("missing serial number".to_string());
    }
    let (quantity_text, serial_number) = remainder.split_at(remainder.len() - SERIAL_LEN);

    if !VENDOR_REGEX.is_match(vendor_code) {
        return Err(format!("invalid vendor code '{}'", vendor_code));
    }
    if !is_digits(shift) || shift.len() != 1 {
        return Err(format!("invalid shift '{}'", shift));
    }
    if part_number.len() != PART_NUMBER_LEN
        || !part_number.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(format!("invalid part number '{}'", part_number));
    }
    if date.len() != DATE_LEN || !is_digits(date) {
        return Err(format!("invalid date '{}'", date));
    }
    if serial_number.len() != SERIAL_LEN || !is_digits(serial_number) {
        return Err(format!("invalid serial '{}'", serial_number));
    }
    let quantity = parse_quantity(if quantity_text.is_empty() { "1" } else { quantity_text })?;

    Ok(ScanRecord::build(
        vendor_code,
        shift,
        part_number,
        date,
        quantity,
        serial_number,
        text,
        SourceFormat::Concatenated,
    ))
}

pub(crate) fn parse_spaced(text: &str, _: &()) -> Result<ScanRecord, String> {
    let tokens = spaced_tokens(text)?;

    let vendor_code = tokens[0];
    let shift = tokens[1];
    let part_number = tokens[2];
    let date = tokens[3];
    let quantity = parse_quantity(tokens[4])?;
    let serial_number: String = tokens[5..].concat();

    if part_number.chars().count() != PART_NUMBER_LEN {
        return Err(format!(
            "part number '{}' is not {} characters",
            part_number, PART_NUMBER_LEN
        ));
    }
    if serial_number.is_empty() {
        return Err("missing serial number".to_string());
    }

    Ok(ScanRecord::build(
        vendor_code,
        shift,
        part_number,
        date,
        quantity,
        &serial_number,
        text,
        SourceFormat::Spaced,
    ))
}

/// Split a spaced label into `[vendor, shift, part, date, quantity, serial...]`.
///
/// The printed 32 character layout fuses vendor+shift and part+date into
/// single tokens (`L0121 31100M55T04290725 100 4231`); those are split back
/// into the six-field form.
fn spaced_tokens(text: &str) -> Result<Vec<&str>, String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let fused = tokens.len() >= 4
        && tokens[0].is_ascii()
        && tokens[1].is_ascii()
        && tokens[0].len() == VENDOR_LEN + 1
        && tokens[1].len() == PART_NUMBER_LEN + DATE_LEN;
    if fused {
        let (vendor, shift) = tokens[0].split_at(VENDOR_LEN);
        let (part, date) = tokens[1].split_at(PART_NUMBER_LEN);
        let mut expanded = vec![vendor, shift, part, date];
        expanded.extend_from_slice(&tokens[2..]);
        if expanded.len() >= 6 {
            return Ok(expanded);
        }
    }

    if tokens.len() < 6 {
        return Err(format!("expected at least 6 fields, found {}", tokens.len()));
    }
    Ok(tokens)
}

pub(crate) fn parse_with_patterns(text: &str, _: &()) -> Result<ScanRecord, String> {
    let upper = text.to_uppercase();

    let (part_number, part_end) =
        find_part_number(&upper).ok_or_else(|| "no part number pattern matched".to_string())?;

    let serial_number = TRAILING_SERIAL
        .captures(&upper[part_end..])
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(synthesize_serial);

    let (vendor_code, shift) = if let Some(caps) = VENDOR_WITH_SHIFT.captures(&upper) {
        (caps[1].to_string(), caps[2].to_string())
    } else if let Some(caps) = VENDOR_PREFIX.captures(&upper) {
        let vendor = caps[1].to_string();
        let shift = upper[vendor.len()..]
            .chars()
            .next()
            .filter(char::is_ascii_digit)
            .map(String::from)
            .unwrap_or_default();
        (vendor, shift)
    } else {
        (String::new(), String::new())
    };

    let date = SIX_DIGITS
        .captures(&upper[part_end..])
        .or_else(|| SIX_DIGITS.captures(&upper))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| Local::now().format("%d%m%y").to_string());

    Ok(ScanRecord::build(
        &vendor_code,
        &shift,
        &part_number,
        &date,
        1,
        &serial_number,
        text,
        SourceFormat::RegexFallback,
    ))
}

/// Find the first part-number-shaped token, returning it with the byte offset
/// just past the match.
pub(crate) fn find_part_number(text: &str) -> Option<(String, usize)> {
    for pattern in PART_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let found = caps.get(1)?;
            let candidate = found.as_str();
            let has_letter = candidate.chars().any(|c| c.is_ascii_alphabetic());
            let has_digit = candidate.chars().any(|c| c.is_ascii_digit());
            if has_letter && has_digit {
                return Some((candidate.to_string(), found.end()));
            }
        }
    }
    None
}

/// A serial for labels that carry none: unique within the process.
fn synthesize_serial() -> String {
    let sequence = SERIAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}{:04}", Utc::now().timestamp_millis(), sequence % 10_000)
}

fn parse_quantity(text: &str) -> Result<u32, String> {
    match text.parse::<u32>() {
        Ok(quantity) if quantity >= 1 => Ok(quantity),
        _ => Err(format!("invalid quantity '{}'", text)),
    }
}

fn is_digits(text: &str) -> bool {
    DIGITS_REGEX.is_match(text)
}
