// src/scan/session.rs
//! Running counters for one operator session.
//!
//! Bin lifecycle: `Empty -> Processing -> Completed -> Empty`. The invoice moves
//! `NotStarted -> InProgress -> Complete` as bins complete. All mutation goes
//! through [`ScanSession`], which only touches counters after every check for a
//! scan has passed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::barcode::ScanRecord;
use super::consistency::{check_part_scan, part_scan_eligibility, Eligibility};
use super::error::{ScanError, ScanResult};
use super::serial_guard::SerialGuard;
use crate::models::{InvoiceProgress, StatisticsSnapshot};

/// What to do when a bin of a different size turns up after the invoice's
/// bin count was computed from the first bin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BinSizePolicy {
    /// Keep the bin count from the first bin; reconcile at completion.
    #[default]
    KeepFirst,
    /// `total_bins = completed_bins + ceil(remaining / new_size)`.
    Recompute,
    /// Refuse to load the bin.
    Reject,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BinStatus {
    Processing,
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    NotStarted,
    InProgress,
    Complete,
}

/// The bin currently on the scanning bench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinContext {
    pub bin_no: String,
    pub part_number: String,
    pub part_name: String,
    pub total_quantity: u32,
    pub scanned_quantity: u32,
    pub status: BinStatus,
}

impl BinContext {
    pub fn new(
        bin_no: impl Into<String>,
        part_number: impl Into<String>,
        part_name: impl Into<String>,
        total_quantity: u32,
    ) -> Self {
        Self {
            bin_no: bin_no.into(),
            part_number: part_number.into(),
            part_name: part_name.into(),
            total_quantity,
            scanned_quantity: 0,
            status: BinStatus::Processing,
        }
    }

    /// Resume a bin that was partially scanned in an earlier session.
    pub fn with_scanned(mut self, scanned_quantity: u32) -> Self {
        self.scanned_quantity = scanned_quantity.min(self.total_quantity);
        if self.total_quantity > 0 && self.scanned_quantity == self.total_quantity {
            self.status = BinStatus::Completed;
        }
        self
    }

    pub fn progress_percent(&self) -> u32 {
        if self.total_quantity == 0 {
            return 0;
        }
        (self.scanned_quantity as f64 / self.total_quantity as f64 * 100.0).round() as u32
    }

    pub fn remaining(&self) -> u32 {
        self.total_quantity.saturating_sub(self.scanned_quantity)
    }
}

/// Previously persisted invoice counters, adopted verbatim on invoice load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoredProgress {
    pub scanned_quantity: u32,
    pub completed_bins: u32,
    pub total_bins: u32,
}

/// The invoice being fulfilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceContext {
    pub invoice_number: String,
    pub part_number: String,
    pub part_name: String,
    pub original_quantity: u32,
    pub scanned_quantity: u32,
    pub total_bins: u32,
    pub completed_bins: u32,
    /// Size of the first bin seen for this invoice.
    pub bin_size: Option<u32>,
}

impl InvoiceContext {
    pub fn new(
        invoice_number: impl Into<String>,
        part_number: impl Into<String>,
        part_name: impl Into<String>,
        original_quantity: u32,
    ) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            part_number: part_number.into(),
            part_name: part_name.into(),
            original_quantity,
            scanned_quantity: 0,
            total_bins: 0,
            completed_bins: 0,
            bin_size: None,
        }
    }

    pub fn restore(&mut self, progress: RestoredProgress) {
        self.scanned_quantity = progress.scanned_quantity.min(self.original_quantity);
        self.total_bins = progress.total_bins;
        self.completed_bins = if progress.total_bins > 0 {
            progress.completed_bins.min(progress.total_bins)
        } else {
            progress.completed_bins
        };
        if self.completed_bins > self.total_bins {
            self.total_bins = self.completed_bins;
        }
        if self.scanned_quantity != progress.scanned_quantity
            || self.completed_bins != progress.completed_bins
        {
            log::warn!(
                "Restored progress for invoice {} was out of range and has been clamped",
                self.invoice_number
            );
        }
    }

    pub fn remaining_quantity(&self) -> u32 {
        self.original_quantity.saturating_sub(self.scanned_quantity)
    }

    pub fn status(&self) -> InvoiceStatus {
        if self.total_bins > 0 && self.completed_bins == self.total_bins {
            InvoiceStatus::Complete
        } else if self.scanned_quantity > 0 || self.completed_bins > 0 {
            InvoiceStatus::InProgress
        } else {
            InvoiceStatus::NotStarted
        }
    }
}

/// Result of offering a bin to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinLoad {
    /// The same bin is already on the bench; nothing changed.
    AlreadyLoaded,
    /// The bin replaced whatever was loaded before.
    Loaded { total_bins_computed: bool },
}

/// Counters right after an accepted scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedScan {
    pub bin_no: String,
    pub part_number: String,
    pub serial_number: String,
    pub bin_scanned: u32,
    pub bin_total: u32,
    pub progress_percent: u32,
    pub invoice_scanned: u32,
    pub remaining_quantity: u32,
    pub completed_bins: u32,
    pub total_bins: u32,
    pub bin_completed: bool,
    pub invoice_complete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    invoice: Option<InvoiceContext>,
    bin: Option<BinContext>,
    guard: SerialGuard,
    policy: BinSizePolicy,
}

impl ScanSession {
    pub fn new(policy: BinSizePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn invoice(&self) -> Option<&InvoiceContext> {
        self.invoice.as_ref()
    }

    pub fn bin(&self) -> Option<&BinContext> {
        self.bin.as_ref()
    }

    pub fn guard(&self) -> &SerialGuard {
        &self.guard
    }

    pub fn eligibility(&self) -> Eligibility {
        part_scan_eligibility(self.invoice.as_ref(), self.bin.as_ref())
    }

    /// Switch invoice. Drops the loaded bin and every remembered serial.
    pub fn select_invoice(&mut self, invoice: InvoiceContext) {
        log::info!(
            "Invoice {} selected: part {} x{} ({} scanned, {}/{} bins)",
            invoice.invoice_number,
            invoice.part_number,
            invoice.original_quantity,
            invoice.scanned_quantity,
            invoice.completed_bins,
            invoice.total_bins
        );
        self.invoice = Some(invoice);
        self.bin = None;
        self.guard.clear();
    }

    pub fn load_bin(&mut self, bin: BinContext) -> ScanResult<BinLoad> {
        let invoice = self
            .invoice
            .as_mut()
            .ok_or_else(|| ScanError::validation("Select an invoice before loading a bin"))?;

        if let Some(current) = &self.bin {
            if current.bin_no == bin.bin_no {
                return Ok(BinLoad::AlreadyLoaded);
            }
        }

        if bin.total_quantity == 0 {
            return Err(ScanError::validation(format!(
                "Bin {} has no quantity",
                bin.bin_no
            )));
        }
        if bin.part_number != invoice.part_number {
            return Err(ScanError::validation(format!(
                "Bin {} holds part {} but invoice {} is for part {}",
                bin.bin_no, bin.part_number, invoice.invoice_number, invoice.part_number
            )));
        }
        if bin.status == BinStatus::Completed {
            return Err(ScanError::validation(format!(
                "Bin {} is already completed",
                bin.bin_no
            )));
        }

        let size = bin.total_quantity;
        let mut total_bins_computed = false;
        match invoice.bin_size {
            None => {
                invoice.bin_size = Some(size);
                if invoice.total_bins == 0 {
                    invoice.total_bins = invoice.original_quantity.div_ceil(size);
                    total_bins_computed = true;
                }
            }
            Some(first) if first != size => match self.policy {
                BinSizePolicy::KeepFirst => {
                    log::warn!(
                        "Bin {} holds {} parts but invoice {} bins were sized {}; keeping {} bins",
                        bin.bin_no, size, invoice.invoice_number, first, invoice.total_bins
                    );
                }
                BinSizePolicy::Recompute => {
                    invoice.total_bins =
                        invoice.completed_bins + invoice.remaining_quantity().div_ceil(size);
                    invoice.bin_size = Some(size);
                    total_bins_computed = true;
                    log::info!(
                        "Invoice {} bin count recomputed to {} for bin size {}",
                        invoice.invoice_number, invoice.total_bins, size
                    );
                }
                BinSizePolicy::Reject => {
                    return Err(ScanError::validation(format!(
                        "Bin {} holds {} parts but bins for invoice {} hold {}",
                        bin.bin_no, size, invoice.invoice_number, first
                    )));
                }
            },
            Some(_) => {}
        }

        log::info!(
            "Bin {} loaded: {}/{} scanned",
            bin.bin_no, bin.scanned_quantity, bin.total_quantity
        );
        self.bin = Some(bin);
        self.guard.clear();
        Ok(BinLoad::Loaded { total_bins_computed })
    }

    /// Count one scanned unit. On any error nothing is changed.
    pub fn accept_scan(&mut self, record: &ScanRecord) -> ScanResult<AcceptedScan> {
        if let Eligibility::Ineligible(reason) = self.eligibility() {
            return Err(ScanError::validation(reason.message()));
        }
        let (Some(invoice), Some(bin)) = (self.invoice.as_mut(), self.bin.as_mut()) else {
            return Err(ScanError::validation("No invoice or bin loaded"));
        };

        check_part_scan(invoice, bin, &record.part_number)?;
        self.guard
            .ensure_new(&record.serial_number, &record.part_number)?;

        if invoice.scanned_quantity >= invoice.original_quantity {
            return Err(ScanError::validation(format!(
                "Invoice {} is already fulfilled ({}/{})",
                invoice.invoice_number, invoice.scanned_quantity, invoice.original_quantity
            )));
        }
        if bin.scanned_quantity >= bin.total_quantity {
            return Err(ScanError::validation(format!(
                "Bin {} is already full ({}/{})",
                bin.bin_no, bin.scanned_quantity, bin.total_quantity
            )));
        }

        bin.scanned_quantity += 1;
        invoice.scanned_quantity += 1;
        self.guard.record(&record.serial_number, &record.part_number);

        let invoice_fulfilled = invoice.remaining_quantity() == 0;
        let bin_completed = bin.scanned_quantity == bin.total_quantity || invoice_fulfilled;
        if bin_completed {
            if bin.scanned_quantity < bin.total_quantity {
                log::info!(
                    "Invoice {} fulfilled; closing bin {} short at {}/{}",
                    invoice.invoice_number, bin.bin_no, bin.scanned_quantity, bin.total_quantity
                );
            }
            bin.status = BinStatus::Completed;
            invoice.completed_bins += 1;
            if invoice.completed_bins > invoice.total_bins {
                log::warn!(
                    "Invoice {} completed more bins than planned ({} > {})",
                    invoice.invoice_number, invoice.completed_bins, invoice.total_bins
                );
                invoice.total_bins = invoice.completed_bins;
            }
            if invoice_fulfilled && invoice.completed_bins < invoice.total_bins {
                invoice.total_bins = invoice.completed_bins;
            }
        }

        let accepted = AcceptedScan {
            bin_no: bin.bin_no.clone(),
            part_number: record.part_number.clone(),
            serial_number: record.serial_number.clone(),
            bin_scanned: bin.scanned_quantity,
            bin_total: bin.total_quantity,
            progress_percent: bin.progress_percent(),
            invoice_scanned: invoice.scanned_quantity,
            remaining_quantity: invoice.remaining_quantity(),
            completed_bins: invoice.completed_bins,
            total_bins: invoice.total_bins,
            bin_completed,
            invoice_complete: bin_completed && invoice.status() == InvoiceStatus::Complete,
        };

        if bin_completed {
            log::info!(
                "Bin {} completed; invoice {} at {}/{} bins",
                accepted.bin_no, invoice.invoice_number, accepted.completed_bins, accepted.total_bins
            );
            self.bin = None;
            self.guard.clear();
        }

        Ok(accepted)
    }

    /// Zero every counter and forget every serial. The invoice stays selected.
    pub fn reset_all(&mut self) {
        if let Some(invoice) = self.invoice.as_mut() {
            invoice.scanned_quantity = 0;
            invoice.completed_bins = 0;
            invoice.total_bins = 0;
            invoice.bin_size = None;
        }
        self.bin = None;
        self.guard.clear();
        log::info!("All scan counters reset");
    }

    pub fn snapshot(&self, session_id: &str) -> Option<StatisticsSnapshot> {
        let invoice = self.invoice.as_ref()?;
        Some(StatisticsSnapshot {
            invoice_number: invoice.invoice_number.clone(),
            session_id: session_id.to_string(),
            part_number: invoice.part_number.clone(),
            original_quantity: invoice.original_quantity,
            scanned_parts_count: invoice.scanned_quantity,
            remaining_quantity: invoice.remaining_quantity(),
            total_bin_count: invoice.total_bins,
            completed_bin_count: invoice.completed_bins,
            current_bin_no: self.bin.as_ref().map(|b| b.bin_no.clone()),
            current_bin_scanned: self.bin.as_ref().map_or(0, |b| b.scanned_quantity),
            current_bin_total: self.bin.as_ref().map_or(0, |b| b.total_quantity),
            timestamp: Utc::now(),
        })
    }

    pub fn invoice_progress(&self, session_id: &str) -> Option<InvoiceProgress> {
        let invoice = self.invoice.as_ref()?;
        Some(InvoiceProgress {
            invoice_number: invoice.invoice_number.clone(),
            scanned_quantity: invoice.scanned_quantity,
            completed_bins: invoice.completed_bins,
            total_bins: invoice.total_bins,
            remaining_quantity: invoice.remaining_quantity(),
            status: invoice.status(),
            session_id: Some(session_id.to_string()),
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::barcode;

    const PART: &str = "31100M55T04";

    fn part_scan(serial: u32) -> ScanRecord {
        barcode::parse(&format!("L0121{}2907251{:04}", PART, serial)).unwrap()
    }

    fn session_with_invoice(quantity: u32) -> ScanSession {
        let mut session = ScanSession::new(BinSizePolicy::KeepFirst);
        session.select_invoice(InvoiceContext::new("INV2600123", PART, "Bracket", quantity));
        session
    }

    fn bin(bin_no: &str, quantity: u32) -> BinContext {
        BinContext::new(bin_no, PART, "Bracket", quantity)
    }

    #[test]
    fn test_two_bin_invoice_scenario() {
        let mut session = session_with_invoice(8);
        let load = session.load_bin(bin("1000000000001", 4)).unwrap();
        assert_eq!(load, BinLoad::Loaded { total_bins_computed: true });
        assert_eq!(session.invoice().unwrap().total_bins, 2);

        for serial in 1..=3 {
            let accepted = session.accept_scan(&part_scan(serial)).unwrap();
            assert!(!accepted.bin_completed);
        }
        let fourth = session.accept_scan(&part_scan(4)).unwrap();
        assert!(fourth.bin_completed);
        assert!(!fourth.invoice_complete);
        assert_eq!(fourth.completed_bins, 1);
        assert_eq!(fourth.remaining_quantity, 4);
        assert!(session.bin().is_none());
        assert!(session.guard().is_empty());
        assert_eq!(session.invoice().unwrap().status(), InvoiceStatus::InProgress);

        let load = session.load_bin(bin("1000000000002", 4)).unwrap();
        assert_eq!(load, BinLoad::Loaded { total_bins_computed: false });
        for serial in 5..=8 {
            session.accept_scan(&part_scan(serial)).unwrap();
        }
        let invoice = session.invoice().unwrap();
        assert_eq!(invoice.completed_bins, 2);
        assert_eq!(invoice.total_bins, 2);
        assert_eq!(invoice.status(), InvoiceStatus::Complete);
    }

    #[test]
    fn test_short_last_bin_completes_invoice() {
        let mut session = session_with_invoice(6);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        for serial in 1..=4 {
            session.accept_scan(&part_scan(serial)).unwrap();
        }

        session.load_bin(bin("1000000000002", 4)).unwrap();
        session.accept_scan(&part_scan(5)).unwrap();
        let last = session.accept_scan(&part_scan(6)).unwrap();
        assert!(last.bin_completed);
        assert!(last.invoice_complete);
        assert_eq!(last.bin_scanned, 2);
        assert_eq!(last.remaining_quantity, 0);
        assert_eq!(last.completed_bins, 2);
        assert_eq!(last.total_bins, 2);
        assert!(session.bin().is_none());

        let invoice = session.invoice().unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Complete);
        assert!(!session.eligibility().is_eligible());
    }

    #[test]
    fn test_remaining_plus_scanned_is_original() {
        let mut session = session_with_invoice(10);
        session.load_bin(bin("1000000000001", 5)).unwrap();
        for serial in 1..=5 {
            let accepted = session.accept_scan(&part_scan(serial)).unwrap();
            assert_eq!(accepted.remaining_quantity + accepted.invoice_scanned, 10);
            assert!(accepted.bin_scanned <= accepted.bin_total);
            assert!(accepted.completed_bins <= accepted.total_bins);
        }
    }

    #[test]
    fn test_progress_percent_rounds() {
        let mut session = session_with_invoice(3);
        session.load_bin(bin("1000000000001", 3)).unwrap();
        let accepted = session.accept_scan(&part_scan(1)).unwrap();
        assert_eq!(accepted.progress_percent, 33);
        let accepted = session.accept_scan(&part_scan(2)).unwrap();
        assert_eq!(accepted.progress_percent, 67);
    }

    #[test]
    fn test_part_mismatch_leaves_counters_untouched() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        let foreign = barcode::parse("L012131100M55T05290725100042").unwrap();
        let err = session.accept_scan(&foreign).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(session.bin().unwrap().scanned_quantity, 0);
        assert_eq!(session.invoice().unwrap().scanned_quantity, 0);
        assert!(session.guard().is_empty());
    }

    #[test]
    fn test_duplicate_serial_rejected() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        session.accept_scan(&part_scan(7)).unwrap();
        let guard_size = session.guard().len();

        let err = session.accept_scan(&part_scan(7)).unwrap_err();
        assert!(matches!(err, ScanError::Duplicate { .. }));
        assert_eq!(session.guard().len(), guard_size);
        assert_eq!(session.bin().unwrap().scanned_quantity, 1);
        assert_eq!(session.invoice().unwrap().scanned_quantity, 1);
    }

    #[test]
    fn test_bin_completes_exactly_once() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 2)).unwrap();
        session.accept_scan(&part_scan(1)).unwrap();
        let last = session.accept_scan(&part_scan(2)).unwrap();
        assert!(last.bin_completed);

        // a late duplicate event at the boundary finds no bin loaded
        let err = session.accept_scan(&part_scan(2)).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(session.invoice().unwrap().completed_bins, 1);
    }

    #[test]
    fn test_reloading_current_bin_is_noop() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        session.accept_scan(&part_scan(1)).unwrap();
        let load = session.load_bin(bin("1000000000001", 4)).unwrap();
        assert_eq!(load, BinLoad::AlreadyLoaded);
        assert_eq!(session.bin().unwrap().scanned_quantity, 1);
        assert_eq!(session.guard().len(), 1);
    }

    #[test]
    fn test_restored_bin_keeps_scanned_quantity() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 4).with_scanned(3)).unwrap();
        let accepted = session.accept_scan(&part_scan(9)).unwrap();
        assert!(accepted.bin_completed);
    }

    #[test]
    fn test_invoice_fulfilled_rejects_extra_scans() {
        let mut session = session_with_invoice(3);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        for serial in 1..=3 {
            session.accept_scan(&part_scan(serial)).unwrap();
        }
        assert!(session.bin().is_none());
        assert_eq!(session.invoice().unwrap().status(), InvoiceStatus::Complete);

        let err = session.accept_scan(&part_scan(4)).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(session.invoice().unwrap().scanned_quantity, 3);
    }

    #[test]
    fn test_bin_size_policies() {
        let mut keep = session_with_invoice(8);
        keep.load_bin(bin("1000000000001", 4)).unwrap();
        keep.load_bin(bin("1000000000002", 2)).unwrap();
        assert_eq!(keep.invoice().unwrap().total_bins, 2);

        let mut recompute = ScanSession::new(BinSizePolicy::Recompute);
        recompute.select_invoice(InvoiceContext::new("INV2600123", PART, "Bracket", 8));
        recompute.load_bin(bin("1000000000001", 4)).unwrap();
        let load = recompute.load_bin(bin("1000000000002", 2)).unwrap();
        assert_eq!(load, BinLoad::Loaded { total_bins_computed: true });
        assert_eq!(recompute.invoice().unwrap().total_bins, 4);

        let mut reject = ScanSession::new(BinSizePolicy::Reject);
        reject.select_invoice(InvoiceContext::new("INV2600123", PART, "Bracket", 8));
        reject.load_bin(bin("1000000000001", 4)).unwrap();
        assert!(reject.load_bin(bin("1000000000002", 2)).is_err());
        assert_eq!(reject.bin().unwrap().bin_no, "1000000000001");
    }

    #[test]
    fn test_keep_first_reconciles_when_all_parts_scanned() {
        let mut session = session_with_invoice(6);
        session.load_bin(bin("1000000000001", 2)).unwrap();
        assert_eq!(session.invoice().unwrap().total_bins, 3);
        session.accept_scan(&part_scan(1)).unwrap();
        session.accept_scan(&part_scan(2)).unwrap();

        session.load_bin(bin("1000000000002", 4)).unwrap();
        let mut last = None;
        for serial in 3..=6 {
            last = Some(session.accept_scan(&part_scan(serial)).unwrap());
        }
        let last = last.unwrap();
        assert!(last.invoice_complete);
        assert_eq!(last.completed_bins, 2);
        assert_eq!(last.total_bins, 2);
    }

    #[test]
    fn test_reset_all_zeroes_counters() {
        let mut session = session_with_invoice(8);
        session.load_bin(bin("1000000000001", 4)).unwrap();
        session.accept_scan(&part_scan(1)).unwrap();
        session.reset_all();

        let invoice = session.invoice().unwrap();
        assert_eq!(invoice.scanned_quantity, 0);
        assert_eq!(invoice.completed_bins, 0);
        assert_eq!(invoice.total_bins, 0);
        assert!(session.bin().is_none());
        assert!(session.guard().is_empty());

        let snapshot = session.snapshot("session-1").unwrap();
        assert_eq!(snapshot.scanned_parts_count, 0);
        assert_eq!(snapshot.remaining_quantity, 8);
    }

    #[test]
    fn test_restore_adopts_prior_progress() {
        let mut invoice = InvoiceContext::new("INV2600123", PART, "Bracket", 8);
        invoice.restore(RestoredProgress {
            scanned_quantity: 4,
            completed_bins: 1,
            total_bins: 2,
        });
        assert_eq!(invoice.remaining_quantity(), 4);
        assert_eq!(invoice.status(), InvoiceStatus::InProgress);

        let mut session = ScanSession::new(BinSizePolicy::KeepFirst);
        session.select_invoice(invoice);
        let load = session.load_bin(bin("1000000000002", 4)).unwrap();
        assert_eq!(load, BinLoad::Loaded { total_bins_computed: false });
        for serial in 1..=4 {
            session.accept_scan(&part_scan(serial)).unwrap();
        }
        assert_eq!(session.invoice().unwrap().status(), InvoiceStatus::Complete);
    }
}
