// src/scan/mod.rs
//! Barcode/QR ingestion and scan reconciliation for the dispatch workflow.
//!
//! Raw scanner text flows through [`barcode`] / [`qr`] parsing, the
//! [`consistency`] checks, the [`serial_guard`] and finally mutates the
//! [`session`] counters. [`station::ScanStation`] wires these together with a
//! [`remote::RemoteStore`] and the debounced [`reporter`]; [`console`] routes
//! raw keyboard-wedge input on a terminal station.

pub mod barcode;
pub mod consistency;
pub mod console;
pub mod debounce;
pub mod error;
pub mod qr;
pub mod remote;
pub mod reporter;
pub mod serial_guard;
pub mod session;
pub mod station;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ScanError, ScanResult};

/// A named parsing strategy. Strategies are pure and report why they rejected
/// the input so the coordinator can explain a total failure.
pub(crate) type Strategy<C, T> = (&'static str, fn(&str, &C) -> Result<T, String>);

/// Try each strategy in order and return the first success, or every
/// strategy's rejection reason.
pub(crate) fn first_success<C, T>(
    text: &str,
    context: &C,
    strategies: &[Strategy<C, T>],
) -> Result<(&'static str, T), Vec<String>> {
    let mut failures = Vec::with_capacity(strategies.len());
    for (name, strategy) in strategies {
        match strategy(text, context) {
            Ok(value) => return Ok((*name, value)),
            Err(reason) => failures.push(format!("{}: {}", name, reason)),
        }
    }
    Err(failures)
}
