// src/scan/debounce.rs
//! Timer helpers for coalescing bursts of scanner input.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trailing-edge debouncer.
///
/// Each [`Debouncer::call`] restarts the timer and replaces the pending work.
/// Once the timer fires, the work runs as its own task and is no longer
/// cancellable, so a slow send always finishes with the value it captured.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn call<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(work);
        }));
    }

    /// Drop the pending work if its timer has not fired yet.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

/// Wait for the next burst of lines: the first line, plus every line that
/// follows the previous one within `window`. Returns `None` once the sender
/// is gone and nothing is buffered.
pub async fn next_burst(rx: &mut mpsc::Receiver<String>, window: Duration) -> Option<Vec<String>> {
    let first = rx.recv().await?;
    let mut lines = vec![first];
    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(line)) => lines.push(line),
            Ok(None) | Err(_) => break,
        }
    }
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_runs_only_last_call() {
        let hits = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(2000));

        for value in 1..=3 {
            let hits = hits.clone();
            let last = last.clone();
            debouncer.call(async move {
                hits.fetch_add(1, Ordering::SeqCst);
                last.store(value, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(1600)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_work() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = hits.clone();
        debouncer.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_burst_groups_close_lines() {
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for line in ["1000000000001", "31100M55T04", "4"] {
                tx.send(line.to_string()).await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            tokio::time::sleep(Duration::from_millis(1000)).await;
            tx.send("L012131100M55T042907251004231".to_string()).await.unwrap();
        });

        let burst = next_burst(&mut rx, Duration::from_millis(150)).await.unwrap();
        assert_eq!(burst, vec!["1000000000001", "31100M55T04", "4"]);

        let single = next_burst(&mut rx, Duration::from_millis(150)).await.unwrap();
        assert_eq!(single.len(), 1);

        assert!(next_burst(&mut rx, Duration::from_millis(150)).await.is_none());
    }
}
