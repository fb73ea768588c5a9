// src/scan/station.rs
//! One operator's scanning bench: invoice selection, bin labels, part scans.
//!
//! Every public operation returns a [`ScanFeedback`] instead of an error. Parse,
//! format, validation and duplicate failures never leave the station and never
//! touch the counters; remote writes are spawned and never awaited here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use super::barcode;
use super::consistency::{
    check_bin_load, check_machine_barcode_format, check_part_scan, Eligibility,
};
use super::error::ScanError;
use super::qr;
use super::remote::{BinCreation, RemoteStore};
use super::reporter::StatisticsReporter;
use super::session::{
    AcceptedScan, BinContext, BinLoad, BinSizePolicy, BinStatus, InvoiceContext, ScanSession,
};
use crate::config::ScannerConfig;
use crate::models::{CreateBinRequest, ScanProgressUpdate};

#[derive(Debug, Clone)]
pub struct StationSettings {
    pub machine_barcode_len: usize,
    pub statistics_debounce: Duration,
    pub bin_size_policy: BinSizePolicy,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

impl From<&ScannerConfig> for StationSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            machine_barcode_len: config.machine_barcode_length,
            statistics_debounce: Duration::from_millis(config.statistics_debounce_ms),
            bin_size_policy: config.bin_size_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pass,
    Fail,
    Info,
    /// Scanning is disabled until some context is loaded.
    Ineligible,
}

/// What the operator sees after an input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFeedback {
    pub status: FeedbackStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<AcceptedScan>,
}

impl ScanFeedback {
    fn pass(message: impl Into<String>, accepted: Option<AcceptedScan>) -> Self {
        Self {
            status: FeedbackStatus::Pass,
            message: message.into(),
            error_kind: None,
            accepted,
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Info,
            message: message.into(),
            error_kind: None,
            accepted: None,
        }
    }

    fn ineligible(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Ineligible,
            message: message.into(),
            error_kind: None,
            accepted: None,
        }
    }

    fn fail(err: &ScanError) -> Self {
        log::warn!("Scan rejected ({}): {}", err.kind(), err);
        Self {
            status: FeedbackStatus::Fail,
            message: err.to_string(),
            error_kind: Some(err.kind()),
            accepted: None,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == FeedbackStatus::Pass
    }
}

pub struct ScanStation {
    session_id: String,
    session: ScanSession,
    remote: Arc<dyn RemoteStore>,
    reporter: StatisticsReporter,
    settings: StationSettings,
}

impl ScanStation {
    pub fn new(remote: Arc<dyn RemoteStore>, settings: StationSettings) -> Self {
        let session_id = Uuid::new_v4().to_string();
        log::info!("Scan station session {} started", session_id);
        Self {
            session_id,
            session: ScanSession::new(settings.bin_size_policy),
            reporter: StatisticsReporter::new(remote.clone(), settings.statistics_debounce),
            remote,
            settings,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn part_scan_eligibility(&self) -> Eligibility {
        self.session.eligibility()
    }

    // ==================== INVOICE ====================

    pub async fn select_invoice(&mut self, invoice_number: &str) -> ScanFeedback {
        let invoice_number = invoice_number.trim().to_uppercase();
        let invoice = match self.remote.find_invoice(&invoice_number).await {
            Ok(Some(invoice)) => invoice,
            Ok(None) => {
                return ScanFeedback::fail(&ScanError::validation(format!(
                    "Invoice {} not found",
                    invoice_number
                )))
            }
            Err(e) => return ScanFeedback::fail(&e),
        };

        let mut context = InvoiceContext::new(
            invoice.invoice_number,
            invoice.part_number,
            invoice.part_name,
            invoice.quantity,
        );
        if let Some(prior) = self
            .reporter
            .restore(&context.invoice_number, &self.session_id)
            .await
        {
            context.restore(prior);
        }

        let message = format!(
            "Invoice {} loaded: part {}, {}/{} scanned, {}/{} bins",
            context.invoice_number,
            context.part_number,
            context.scanned_quantity,
            context.original_quantity,
            context.completed_bins,
            context.total_bins
        );
        self.session.select_invoice(context);
        self.report_now();
        ScanFeedback::info(message)
    }

    // ==================== BIN LABEL ====================

    pub async fn scan_bin_label(&mut self, raw: &str) -> ScanFeedback {
        let Some(invoice) = self.session.invoice() else {
            return ScanFeedback::ineligible("Select an invoice before scanning a bin label");
        };

        let label = match qr::parse_bin_label(raw, Some(&invoice.invoice_number)) {
            Ok(label) => label,
            Err(e) => return ScanFeedback::fail(&e),
        };
        if let Err(e) = check_bin_load(invoice, &label) {
            return ScanFeedback::fail(&e);
        }
        let part_name = invoice.part_name.clone();

        if let Some(current) = self.session.bin() {
            if current.bin_no == label.bin_no {
                return ScanFeedback::info(format!(
                    "Bin {} is already loaded ({}/{})",
                    current.bin_no, current.scanned_quantity, current.total_quantity
                ));
            }
        }

        let context = match self.remote.find_bin(&label.bin_no).await {
            Err(e) => return ScanFeedback::fail(&e),
            Ok(Some(record)) => {
                if record.status == BinStatus::Completed || record.scanned_quantity >= record.quantity {
                    return ScanFeedback::info(format!(
                        "Bin {} was already completed ({}/{})",
                        record.bin_no, record.scanned_quantity, record.quantity
                    ));
                }
                log::info!(
                    "Resuming bin {} at {}/{}",
                    record.bin_no, record.scanned_quantity, record.quantity
                );
                BinContext::new(&label.bin_no, &label.part_number, &part_name, record.quantity)
                    .with_scanned(record.scanned_quantity)
            }
            Ok(None) => {
                let request = CreateBinRequest {
                    qr_code_data: label.raw_text.clone(),
                    invoice_number: label.invoice_number.clone(),
                    bin_number: label.bin_no.clone(),
                    part_number: label.part_number.clone(),
                    total_quantity: label.quantity,
                    description: Some(label.description.clone()).filter(|d| !d.is_empty()),
                    session_id: self.session_id.clone(),
                    timestamp: Utc::now(),
                };
                match self.remote.create_bin(&request).await {
                    Ok(BinCreation::Created(_)) => {}
                    Ok(BinCreation::AlreadyExists) => {
                        log::debug!("Bin {} was created concurrently", label.bin_no)
                    }
                    Err(e) => return ScanFeedback::fail(&e),
                }
                BinContext::new(&label.bin_no, &label.part_number, &part_name, label.quantity)
            }
        };

        match self.session.load_bin(context) {
            Err(e) => ScanFeedback::fail(&e),
            Ok(BinLoad::AlreadyLoaded) => {
                ScanFeedback::info(format!("Bin {} is already loaded", label.bin_no))
            }
            Ok(BinLoad::Loaded { total_bins_computed }) => {
                if total_bins_computed {
                    self.persist_invoice_progress();
                }
                self.schedule_report();
                let (scanned, total) = self
                    .session
                    .bin()
                    .map_or((0, 0), |b| (b.scanned_quantity, b.total_quantity));
                ScanFeedback::pass(
                    format!("Bin {} loaded: {}/{} scanned", label.bin_no, scanned, total),
                    None,
                )
            }
        }
    }

    // ==================== PART SCAN ====================

    /// Count one machine barcode. Never waits on the network.
    pub fn scan_part(&mut self, raw: &str) -> ScanFeedback {
        if let Eligibility::Ineligible(reason) = self.session.eligibility() {
            return ScanFeedback::ineligible(reason.message());
        }
        if let Err(e) = check_machine_barcode_format(raw, self.settings.machine_barcode_len) {
            return ScanFeedback::fail(&e);
        }
        let part_number = match barcode::extract_part_number(raw) {
            Ok(part_number) => part_number,
            Err(e) => return ScanFeedback::fail(&e),
        };
        if let (Some(invoice), Some(bin)) = (self.session.invoice(), self.session.bin()) {
            if let Err(e) = check_part_scan(invoice, bin, &part_number) {
                return ScanFeedback::fail(&e);
            }
        }
        let record = match barcode::parse(raw) {
            Ok(record) => record,
            Err(e) => return ScanFeedback::fail(&e),
        };

        let accepted = match self.session.accept_scan(&record) {
            Ok(accepted) => accepted,
            Err(e) => return ScanFeedback::fail(&e),
        };

        self.reporter.record_scan_progress(ScanProgressUpdate {
            bin_no: accepted.bin_no.clone(),
            scanned_quantity: accepted.bin_scanned,
            is_valid: true,
            mismatch_reason: None,
            session_id: self.session_id.clone(),
        });

        let message = if accepted.invoice_complete {
            format!(
                "Invoice complete: all {} bins dispatched",
                accepted.total_bins
            )
        } else if accepted.bin_completed {
            format!(
                "Bin {} completed ({}/{} bins, {} parts remaining)",
                accepted.bin_no, accepted.completed_bins, accepted.total_bins, accepted.remaining_quantity
            )
        } else {
            format!(
                "Serial {} accepted: {}/{} ({}%)",
                accepted.serial_number, accepted.bin_scanned, accepted.bin_total, accepted.progress_percent
            )
        };

        if accepted.bin_completed {
            self.persist_invoice_progress();
            self.report_now();
        } else {
            self.schedule_report();
        }
        ScanFeedback::pass(message, Some(accepted))
    }

    // ==================== RESET ====================

    pub fn reset_all(&mut self) -> ScanFeedback {
        if self.session.invoice().is_none() {
            return ScanFeedback::ineligible("No invoice selected");
        }
        self.session.reset_all();
        self.persist_invoice_progress();
        self.report_now();
        ScanFeedback::info("All counts reset")
    }

    /// Send any debounced snapshot right away, for shutdown.
    pub fn flush(&mut self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.reporter.is_pending() {
            return None;
        }
        let snapshot = self.session.snapshot(&self.session_id)?;
        Some(self.reporter.report_now(snapshot))
    }

    fn schedule_report(&mut self) {
        if let Some(snapshot) = self.session.snapshot(&self.session_id) {
            self.reporter.schedule(snapshot);
        }
    }

    fn report_now(&mut self) {
        if let Some(snapshot) = self.session.snapshot(&self.session_id) {
            self.reporter.report_now(snapshot);
        }
    }

    fn persist_invoice_progress(&self) {
        if let Some(progress) = self.session.invoice_progress(&self.session_id) {
            self.reporter.persist_invoice_progress(progress);
        }
    }
}
