//! Operator-facing reporting of scrape failures.
//!
//! The collector turns a failed read into a counter increment; the underlying
//! error goes to a [`DiagnosticSink`] so it is not lost.

use crate::reader::DeviceError;

/// Receives the cause of every failed scrape.
pub trait DiagnosticSink: Send + Sync {
    /// Called once per failed scrape, while the scrape lock is held.
    /// `failures` is the cumulative failure count including this one.
    fn scrape_failed(&self, device_path: &str, error: &DeviceError, failures: u64);
}

/// Default sink: a `warn` record through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn scrape_failed(&self, device_path: &str, error: &DeviceError, failures: u64) {
        log::warn!("{}", failure_message(device_path, error, failures));
    }
}

/// One-line operator summary of a failed scrape.
pub fn failure_message(device_path: &str, error: &DeviceError, failures: u64) -> String {
    format!(
        "scrape of {device_path} failed ({} error, {failures} total): {error}",
        error.kind()
    )
}
