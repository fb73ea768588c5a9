// src/scan/reporter.rs
//! Fire-and-forget persistence of session counters.
//!
//! Nothing here blocks scanning and no failure rolls back local counters:
//! every send is spawned, and errors are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::debounce::Debouncer;
use super::remote::RemoteStore;
use super::session::RestoredProgress;
use crate::models::{InvoiceProgress, ScanProgressUpdate, StatisticsSnapshot};

pub struct StatisticsReporter {
    remote: Arc<dyn RemoteStore>,
    debouncer: Debouncer,
}

impl StatisticsReporter {
    pub fn new(remote: Arc<dyn RemoteStore>, debounce: Duration) -> Self {
        Self {
            remote,
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Debounced send; during a burst only the last snapshot goes out.
    pub fn schedule(&mut self, snapshot: StatisticsSnapshot) {
        let remote = self.remote.clone();
        self.debouncer.call(send_statistics(remote, snapshot));
    }

    /// Immediate send. A pending debounced snapshot is older and is dropped.
    pub fn report_now(&mut self, snapshot: StatisticsSnapshot) -> JoinHandle<()> {
        self.debouncer.cancel();
        tokio::spawn(send_statistics(self.remote.clone(), snapshot))
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn persist_invoice_progress(&self, progress: InvoiceProgress) -> JoinHandle<()> {
        let remote = self.remote.clone();
        tokio::spawn(async move {
            if let Err(e) = remote.save_invoice_progress(&progress).await {
                log::warn!(
                    "Failed to persist progress for invoice {}: {}",
                    progress.invoice_number, e
                );
            }
        })
    }

    pub fn record_scan_progress(&self, update: ScanProgressUpdate) -> JoinHandle<()> {
        let remote = self.remote.clone();
        tokio::spawn(async move {
            if let Err(e) = remote.record_scan_progress(&update).await {
                log::warn!("Failed to record scan progress for bin {}: {}", update.bin_no, e);
            }
        })
    }

    /// Prior progress for an invoice, from whichever record was written last.
    pub async fn restore(&self, invoice_number: &str, session_id: &str) -> Option<RestoredProgress> {
        let statistics = match self
            .remote
            .load_statistics(invoice_number, Some(session_id))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Could not load statistics for invoice {}: {}", invoice_number, e);
                None
            }
        };
        let progress = match self.remote.load_invoice_progress(invoice_number).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Could not load progress for invoice {}: {}", invoice_number, e);
                None
            }
        };

        let restored = match (statistics, progress) {
            (Some(s), Some(p)) if p.updated_at > s.timestamp => Some(RestoredProgress::from(&p)),
            (Some(s), _) => Some(RestoredProgress::from(&s)),
            (None, Some(p)) => Some(RestoredProgress::from(&p)),
            (None, None) => None,
        };
        if let Some(progress) = &restored {
            log::info!(
                "Restored invoice {}: {} scanned, {}/{} bins",
                invoice_number, progress.scanned_quantity, progress.completed_bins, progress.total_bins
            );
        }
        restored
    }
}

async fn send_statistics(remote: Arc<dyn RemoteStore>, snapshot: StatisticsSnapshot) {
    match remote.save_statistics(&snapshot).await {
        Ok(()) => log::debug!(
            "Statistics sent for invoice {}: {}/{}",
            snapshot.invoice_number, snapshot.scanned_parts_count, snapshot.original_quantity
        ),
        Err(e) => log::warn!(
            "Failed to send statistics for invoice {}: {}",
            snapshot.invoice_number, e
        ),
    }
}
