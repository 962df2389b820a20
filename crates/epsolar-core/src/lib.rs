//! # epsolar-core
//!
//! Reads EPSolar solar charge controllers over a serial link and republishes
//! their status as Prometheus metrics.
//!
//! ## Quick Start
//!
//! ```no_run
//! use epsolar_core::{SerialReader, SolarCollector};
//!
//! let collector = SolarCollector::new(SerialReader::default(), "/dev/ttyXRUSB0")
//!     .expect("static metric definitions are valid");
//!
//! let registry = prometheus::Registry::new();
//! registry.register(Box::new(collector)).expect("first registration");
//!
//! // Each gather performs exactly one device read.
//! let families = registry.gather();
//! println!("{} metric families", families.len());
//! ```
//!
//! ## Architecture
//!
//! Serial port → [`modbus::RtuClient`] → [`StatusRecord`] → [`SolarCollector`] → Registry
//!
//! The collector never fails a scrape. A read error increments
//! `epsolar_scrape_failures_total`, which is then the only metric published for
//! that scrape; the error itself goes to a [`DiagnosticSink`].

pub mod collector;
pub mod diagnostics;
pub mod modbus;
pub mod reader;
pub mod status;

pub use collector::{
    CollectorError, MetricDescriptor, MetricId, MetricKind, Observation, SCRAPE_FAILURES_NAME,
    SolarCollector, describe_all,
};
pub use diagnostics::{DiagnosticSink, LogSink};
pub use reader::{
    DEFAULT_DEVICE_PATH, DeviceError, FailureKind, SerialReader, SerialSettings, StatusReader,
};
pub use status::{GAUGE_COUNT, StatusField, StatusRecord};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
