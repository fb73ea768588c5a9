// src/scan/console.rs
//! Routing of raw scanner input on a console station.
//!
//! Handheld scanners type like a keyboard: one line per barcode, several
//! lines in a quick burst for a multi-line QR label. Lines starting with `:`
//! are operator commands.

use super::session::ScanSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectInvoice(String),
    LoadBin(String),
    Reset,
    Status,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationInput {
    Command(Command),
    BinLabel(String),
    PartScan(String),
    Ignored,
}

pub const HELP: &str = "\
:invoice <number>  select the invoice to dispatch
:bin <label>       force the text to be read as a bin label
:status            show invoice and bin counters
:reset             clear all counters
:quit              leave the station";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let body = line.trim().trim_start_matches(':');
    let (name, arg) = match body.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (body, ""),
    };

    match (name.to_ascii_lowercase().as_str(), arg) {
        ("invoice" | "i", "") => Err("Usage: :invoice <number>".to_string()),
        ("invoice" | "i", number) => Ok(Command::SelectInvoice(number.to_string())),
        ("bin" | "b", "") => Err("Usage: :bin <label>".to_string()),
        ("bin" | "b", label) => Ok(Command::LoadBin(label.to_string())),
        ("reset", _) => Ok(Command::Reset),
        ("status" | "s", _) => Ok(Command::Status),
        ("quit" | "q" | "exit", _) => Ok(Command::Quit),
        ("help" | "h" | "?", _) => Ok(Command::Help),
        (other, _) => Err(format!("Unknown command ':{}' (try :help)", other)),
    }
}

/// Decide what a burst of scanner lines is. Multi-line bursts are always bin
/// labels; a single line is a bin label until a bin is on the bench.
pub fn classify_burst(lines: &[String], bin_loaded: bool) -> Result<StationInput, String> {
    let lines: Vec<&str> = lines
        .iter()
        .map(|l| l.trim_end_matches(['\r', '\n']))
        .filter(|l| !l.trim().is_empty())
        .collect();

    match lines.as_slice() {
        [] => Ok(StationInput::Ignored),
        [first, ..] if first.trim_start().starts_with(':') => {
            parse_command(first).map(StationInput::Command)
        }
        [single] if bin_loaded => Ok(StationInput::PartScan(single.to_string())),
        [single] => Ok(StationInput::BinLabel(single.to_string())),
        many => Ok(StationInput::BinLabel(many.join("\n"))),
    }
}

/// One-paragraph summary of the session counters.
pub fn status_report(session: &ScanSession) -> String {
    let Some(invoice) = session.invoice() else {
        return "No invoice selected".to_string();
    };

    let mut report = format!(
        "Invoice {} ({}): {}/{} scanned, {} remaining, bins {}/{}",
        invoice.invoice_number,
        invoice.part_number,
        invoice.scanned_quantity,
        invoice.original_quantity,
        invoice.remaining_quantity(),
        invoice.completed_bins,
        invoice.total_bins,
    );
    match session.bin() {
        Some(bin) => report.push_str(&format!(
            "; bin {} {}/{} ({}%)",
            bin.bin_no,
            bin.scanned_quantity,
            bin.total_quantity,
            bin.progress_percent()
        )),
        None => report.push_str("; no bin loaded"),
    }
    report
}
