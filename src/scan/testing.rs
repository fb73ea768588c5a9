// src/scan/testing.rs
//! In-memory [`RemoteStore`] for station and reporter tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::error::{ScanError, ScanResult};
use super::remote::{BinCreation, RemoteStore};
use super::session::BinStatus;
use crate::models::{
    BinRecord, CreateBinRequest, Invoice, InvoiceProgress, ScanProgressUpdate, StatisticsSnapshot,
};

#[derive(Default)]
pub(crate) struct MemoryState {
    pub invoices: HashMap<String, Invoice>,
    pub bins: HashMap<String, BinRecord>,
    pub scan_progress: Vec<ScanProgressUpdate>,
    pub statistics: Vec<StatisticsSnapshot>,
    pub invoice_progress: Vec<InvoiceProgress>,
    pub fail_bin_lookup: bool,
    pub fail_writes: bool,
}

#[derive(Default)]
pub(crate) struct MemoryRemote {
    pub state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn with_invoice(invoice_number: &str, part_number: &str, quantity: u32) -> Self {
        let remote = Self::default();
        let now = Utc::now();
        remote.state.lock().unwrap().invoices.insert(
            invoice_number.to_string(),
            Invoice {
                id: format!("inv-{}", invoice_number),
                invoice_number: invoice_number.to_string(),
                part_number: part_number.to_string(),
                part_name: "Bracket".to_string(),
                quantity,
                customer: None,
                created_by: None,
                created_at: now,
                updated_at: now,
            },
        );
        remote
    }

    pub fn insert_bin(&self, bin_no: &str, invoice_number: &str, part_number: &str, quantity: u32, scanned: u32) {
        let now = Utc::now();
        let status = if scanned >= quantity {
            BinStatus::Completed
        } else {
            BinStatus::Processing
        };
        self.state.lock().unwrap().bins.insert(
            bin_no.to_string(),
            BinRecord {
                id: format!("bin-{}", bin_no),
                bin_no: bin_no.to_string(),
                invoice_number: invoice_number.to_string(),
                part_number: part_number.to_string(),
                description: None,
                quantity,
                scanned_quantity: scanned,
                status,
                qr_code_data: None,
                session_id: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn statistics(&self) -> Vec<StatisticsSnapshot> {
        self.state.lock().unwrap().statistics.clone()
    }

    pub fn invoice_progress(&self) -> Vec<InvoiceProgress> {
        self.state.lock().unwrap().invoice_progress.clone()
    }

    pub fn scan_progress(&self) -> Vec<ScanProgressUpdate> {
        self.state.lock().unwrap().scan_progress.clone()
    }

    fn check_writes(state: &MemoryState) -> ScanResult<()> {
        if state.fail_writes {
            return Err(ScanError::network("backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn find_invoice(&self, invoice_number: &str) -> ScanResult<Option<Invoice>> {
        Ok(self.state.lock().unwrap().invoices.get(invoice_number).cloned())
    }

    async fn find_bin(&self, bin_no: &str) -> ScanResult<Option<BinRecord>> {
        let state = self.state.lock().unwrap();
        if state.fail_bin_lookup {
            return Err(ScanError::network("bin lookup timed out"));
        }
        Ok(state.bins.get(bin_no).cloned())
    }

    async fn create_bin(&self, request: &CreateBinRequest) -> ScanResult<BinCreation> {
        let mut state = self.state.lock().unwrap();
        Self::check_writes(&state)?;
        if state.bins.contains_key(&request.bin_number) {
            return Ok(BinCreation::AlreadyExists);
        }
        let now = Utc::now();
        let record = BinRecord {
            id: format!("bin-{}", request.bin_number),
            bin_no: request.bin_number.clone(),
            invoice_number: request.invoice_number.clone(),
            part_number: request.part_number.clone(),
            description: request.description.clone(),
            quantity: request.total_quantity,
            scanned_quantity: 0,
            status: BinStatus::Processing,
            qr_code_data: Some(request.qr_code_data.clone()),
            session_id: Some(request.session_id.clone()),
            created_at: now,
            updated_at: now,
        };
        state.bins.insert(record.bin_no.clone(), record.clone());
        Ok(BinCreation::Created(record))
    }

    async fn record_scan_progress(&self, update: &ScanProgressUpdate) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writes(&state)?;
        if update.is_valid {
            if let Some(bin) = state.bins.get_mut(&update.bin_no) {
                bin.scanned_quantity = update.scanned_quantity;
                if bin.scanned_quantity >= bin.quantity {
                    bin.status = BinStatus::Completed;
                }
            }
        }
        state.scan_progress.push(update.clone());
        Ok(())
    }

    async fn save_statistics(&self, snapshot: &StatisticsSnapshot) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writes(&state)?;
        state.statistics.push(snapshot.clone());
        Ok(())
    }

    async fn load_statistics(
        &self,
        invoice_number: &str,
        session_id: Option<&str>,
    ) -> ScanResult<Option<StatisticsSnapshot>> {
        let state = self.state.lock().unwrap();
        let for_invoice = || {
            state
                .statistics
                .iter()
                .rev()
                .filter(|s| s.invoice_number == invoice_number)
        };
        let same_session = session_id.and_then(|id| for_invoice().find(|s| s.session_id == id));
        Ok(same_session.or_else(|| for_invoice().next()).cloned())
    }

    async fn save_invoice_progress(&self, progress: &InvoiceProgress) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writes(&state)?;
        state.invoice_progress.push(progress.clone());
        Ok(())
    }

    async fn load_invoice_progress(
        &self,
        invoice_number: &str,
    ) -> ScanResult<Option<InvoiceProgress>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .invoice_progress
            .iter()
            .rev()
            .find(|p| p.invoice_number == invoice_number)
            .cloned())
    }
}
