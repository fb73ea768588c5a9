// src/scan/serial_guard.rs
//! Duplicate serial protection for one scanning session.

use std::collections::HashSet;

use super::error::{ScanError, ScanResult};

/// Remembers every `(part, serial)` pair counted since the last clear.
#[derive(Debug, Default, Clone)]
pub struct SerialGuard {
    seen: HashSet<String>,
}

impl SerialGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(serial: &str, part_number: &str) -> String {
        format!("{}_{}", part_number, serial)
    }

    pub fn is_duplicate(&self, serial: &str, part_number: &str) -> bool {
        self.seen.contains(&Self::key(serial, part_number))
    }

    /// Idempotent.
    pub fn record(&mut self, serial: &str, part_number: &str) {
        self.seen.insert(Self::key(serial, part_number));
    }

    /// Fails with [`ScanError::Duplicate`] when the pair was already counted.
    pub fn ensure_new(&self, serial: &str, part_number: &str) -> ScanResult<()> {
        if self.is_duplicate(serial, part_number) {
            return Err(ScanError::Duplicate {
                serial: serial.to_string(),
                part_number: part_number.to_string(),
            });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_idempotent() {
        let mut guard = SerialGuard::new();
        guard.record("4231", "31100M55T04");
        guard.record("4231", "31100M55T04");
        assert!(guard.is_duplicate("4231", "31100M55T04"));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_clear_forgets_pairs() {
        let mut guard = SerialGuard::new();
        guard.record("4231", "31100M55T04");
        guard.clear();
        assert!(!guard.is_duplicate("4231", "31100M55T04"));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_same_serial_different_part_is_not_duplicate() {
        let mut guard = SerialGuard::new();
        guard.record("4231", "31100M55T04");
        assert!(!guard.is_duplicate("4231", "31100M55T05"));
        assert!(guard.ensure_new("4231", "31100M55T05").is_ok());
    }

    #[test]
    fn test_ensure_new_names_serial_and_part() {
        let mut guard = SerialGuard::new();
        guard.record("4231", "31100M55T04");
        let err = guard.ensure_new("4231", "31100M55T04").unwrap_err();
        assert_eq!(
            err,
            ScanError::Duplicate {
                serial: "4231".to_string(),
                part_number: "31100M55T04".to_string(),
            }
        );
        assert!(err.to_string().contains("4231"));
    }
}
