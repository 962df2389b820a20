//! Telemetry collector: one device read per scrape, published as Prometheus
//! metrics.
//!
//! Architecture:
//! 1. A scrape acquires the scrape lock (one scrape in flight per collector)
//! 2. The reader is called once with the configured device path
//! 3. Success: every status field becomes one gauge observation, in order
//! 4. Failure: the failure counter is incremented and is the only observation
//! 5. The lock guard drops on every exit path
//!
//! [`SolarCollector`] also implements [`prometheus::core::Collector`], so it is
//! registered with an explicitly constructed `Registry` and scraped whenever
//! that registry is gathered.

use std::sync::{Mutex, MutexGuard, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, IntCounter, Opts};
use thiserror::Error;

use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::reader::StatusReader;
use crate::status::{GAUGE_COUNT, StatusField};

/// Name of the cumulative scrape failure counter.
pub const SCRAPE_FAILURES_NAME: &str = "epsolar_scrape_failures_total";
const SCRAPE_FAILURES_HELP: &str = "Number of scrapes that failed to read the charge controller";

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid metric definition: {0}")]
    Metric(#[from] prometheus::Error),
}

/// Exposition type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Identifies one metric the collector can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricId {
    Gauge(StatusField),
    ScrapeFailures,
}

impl MetricId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gauge(field) => field.metric_name(),
            Self::ScrapeFailures => SCRAPE_FAILURES_NAME,
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Self::Gauge(field) => field.help(),
            Self::ScrapeFailures => SCRAPE_FAILURES_HELP,
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::ScrapeFailures => MetricKind::Counter,
        }
    }
}

/// Static description of a metric, independent of device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

impl From<MetricId> for MetricDescriptor {
    fn from(id: MetricId) -> Self {
        Self {
            name: id.name(),
            help: id.help(),
            kind: id.kind(),
        }
    }
}

/// One named value produced by a scrape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub metric: MetricId,
    pub value: f64,
}

impl Observation {
    pub fn name(&self) -> &'static str {
        self.metric.name()
    }
}

/// Scrapes one charge controller per call.
///
/// A hung reader blocks the scrape, and every scrape queued behind it,
/// until the transport gives up.
pub struct SolarCollector<R> {
    reader: R,
    device_path: String,
    gauges: Vec<Gauge>,
    failures: IntCounter,
    scrape_lock: Mutex<()>,
    sink: Box<dyn DiagnosticSink>,
}

impl<R: StatusReader> SolarCollector<R> {
    /// Create a collector that reads `device_path` through `reader` on every
    /// scrape. Failures are reported to [`LogSink`].
    pub fn new(reader: R, device_path: impl Into<String>) -> Result<Self, CollectorError> {
        let gauges = StatusField::ALL
            .iter()
            .map(|field| Gauge::with_opts(Opts::new(field.metric_name(), field.help())))
            .collect::<Result<Vec<_>, _>>()?;
        let failures = IntCounter::with_opts(Opts::new(SCRAPE_FAILURES_NAME, SCRAPE_FAILURES_HELP))?;

        Ok(Self {
            reader,
            device_path: device_path.into(),
            gauges,
            failures,
            scrape_lock: Mutex::new(()),
            sink: Box::new(LogSink),
        })
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Cumulative number of failed scrapes since this collector was created.
    pub fn failure_count(&self) -> u64 {
        self.failures.get()
    }

    /// Every metric this collector can ever publish: all gauges in
    /// publication order, then the failure counter.
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        describe_all()
    }

    /// Perform one scrape.
    ///
    /// Never fails: a read error yields a single observation carrying the
    /// updated failure count, and no gauges.
    pub fn collect(&self) -> Vec<Observation> {
        let _scrape = self.lock_scrape();
        self.scrape()
    }

    fn lock_scrape(&self) -> MutexGuard<'_, ()> {
        // A reader that panicked mid-scrape leaves nothing half-written behind
        // the lock, so a poisoned guard is still usable.
        self.scrape_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller must hold the scrape lock.
    fn scrape(&self) -> Vec<Observation> {
        match self.reader.read(&self.device_path) {
            Ok(record) => StatusField::ALL
                .iter()
                .map(|&field| {
                    let value = field.value(&record);
                    self.gauges[field.index()].set(value);
                    Observation {
                        metric: MetricId::Gauge(field),
                        value,
                    }
                })
                .collect(),
            Err(err) => {
                self.failures.inc();
                let failures = self.failures.get();
                self.sink.scrape_failed(&self.device_path, &err, failures);
                vec![Observation {
                    metric: MetricId::ScrapeFailures,
                    value: failures as f64,
                }]
            }
        }
    }

    fn family(&self, metric: MetricId) -> Vec<MetricFamily> {
        match metric {
            MetricId::Gauge(field) => self.gauges[field.index()].collect(),
            MetricId::ScrapeFailures => self.failures.collect(),
        }
    }
}

/// Descriptors for every metric, in publication order.
pub fn describe_all() -> Vec<MetricDescriptor> {
    let mut descriptors = Vec::with_capacity(GAUGE_COUNT + 1);
    descriptors.extend(
        StatusField::ALL
            .iter()
            .map(|&field| MetricDescriptor::from(MetricId::Gauge(field))),
    );
    descriptors.push(MetricId::ScrapeFailures.into());
    descriptors
}

impl<R: StatusReader> Collector for SolarCollector<R> {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges
            .iter()
            .flat_map(|gauge| gauge.desc())
            .chain(self.failures.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _scrape = self.lock_scrape();
        self.scrape()
            .into_iter()
            .flat_map(|observation| self.family(observation.metric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{DeviceError, FailureKind};
    use crate::status::StatusRecord;
    use prometheus::Registry;
    use prometheus::proto::MetricType;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Reader that replays a fixed script, then fails with a timeout.
    struct ScriptedReader {
        script: Mutex<VecDeque<Result<StatusRecord, DeviceError>>>,
        paths: Mutex<Vec<String>>,
    }

    impl ScriptedReader {
        fn new(script: Vec<Result<StatusRecord, DeviceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                paths: Mutex::new(Vec::new()),
            }
        }
    }

    impl StatusReader for ScriptedReader {
        fn read(&self, device_path: &str) -> Result<StatusRecord, DeviceError> {
            self.paths.lock().unwrap().push(device_path.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(timeout()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<(String, FailureKind, u64)>>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn scrape_failed(&self, device_path: &str, error: &DeviceError, failures: u64) {
            self.events
                .lock()
                .unwrap()
                .push((device_path.to_string(), error.kind(), failures));
        }
    }

    fn timeout() -> DeviceError {
        DeviceError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no reply",
        ))
    }

    fn sample_record() -> StatusRecord {
        StatusRecord {
            array_voltage: 18.3,
            battery_voltage: 12.8,
            battery_soc: 87.0,
            load: true,
            load_power: 4.2,
            ..Default::default()
        }
    }

    fn value_of(observations: &[Observation], name: &str) -> Option<f64> {
        observations
            .iter()
            .find(|o| o.name() == name)
            .map(|o| o.value)
    }

    // -----------------------------------------------------------------------
    // describe()
    // -----------------------------------------------------------------------

    #[test]
    fn test_describe_lists_every_gauge_then_counter() {
        let collector = SolarCollector::new(ScriptedReader::new(vec![]), "/dev/null").unwrap();
        let descriptors = collector.describe();
        assert_eq!(descriptors.len(), GAUGE_COUNT + 1);
        assert!(
            descriptors[..GAUGE_COUNT]
                .iter()
                .all(|d| d.kind == MetricKind::Gauge)
        );
        let last = descriptors.last().unwrap();
        assert_eq!(last.name, SCRAPE_FAILURES_NAME);
        assert_eq!(last.kind, MetricKind::Counter);
    }

    #[test]
    fn test_describe_unaffected_by_history() {
        let reader = ScriptedReader::new(vec![Ok(sample_record()), Err(timeout())]);
        let collector = SolarCollector::new(reader, "/dev/null").unwrap();
        let before = collector.describe();
        collector.collect();
        collector.collect();
        assert_eq!(collector.describe(), before);
    }

    // -----------------------------------------------------------------------
    // collect()
    // -----------------------------------------------------------------------

    #[test]
    fn test_success_emits_every_gauge_in_order() {
        let collector =
            SolarCollector::new(ScriptedReader::new(vec![Ok(sample_record())]), "/dev/null")
                .unwrap();
        let observations = collector.collect();

        assert_eq!(observations.len(), GAUGE_COUNT);
        for (observation, field) in observations.iter().zip(StatusField::ALL) {
            assert_eq!(observation.metric, MetricId::Gauge(field));
        }
        assert_eq!(value_of(&observations, "epsolar_panel_voltage"), Some(18.3));
        assert_eq!(value_of(&observations, "epsolar_battery_soc"), Some(87.0));
        assert_eq!(value_of(&observations, "epsolar_load_active"), Some(1.0));
        assert_eq!(value_of(&observations, "epsolar_load_power"), Some(4.2));
        assert_eq!(value_of(&observations, SCRAPE_FAILURES_NAME), None);
    }

    #[test]
    fn test_failure_emits_only_counter() {
        let sink = RecordingSink::default();
        let collector = SolarCollector::new(ScriptedReader::new(vec![]), "/dev/ttyXRUSB0")
            .unwrap()
            .with_sink(Box::new(sink.clone()));

        let observations = collector.collect();
        assert_eq!(
            observations,
            vec![Observation {
                metric: MetricId::ScrapeFailures,
                value: 1.0
            }]
        );
        assert_eq!(
            *sink.events.lock().unwrap(),
            vec![("/dev/ttyXRUSB0".to_string(), FailureKind::Transport, 1)]
        );
    }

    #[test]
    fn test_failure_counter_survives_success() {
        let reader = ScriptedReader::new(vec![Err(timeout()), Ok(sample_record()), Err(timeout())]);
        let collector = SolarCollector::new(reader, "/dev/null")
            .unwrap()
            .with_sink(Box::new(RecordingSink::default()));

        assert_eq!(collector.collect()[0].value, 1.0);
        assert_eq!(collector.collect().len(), GAUGE_COUNT);
        assert_eq!(collector.failure_count(), 1);
        assert_eq!(collector.collect()[0].value, 2.0);
        assert_eq!(collector.failure_count(), 2);
    }

    #[test]
    fn test_reader_receives_configured_path() {
        let reader = ScriptedReader::new(vec![Ok(sample_record())]);
        let collector = SolarCollector::new(reader, "/dev/ttyUSB3").unwrap();
        collector.collect();
        collector.collect();
        assert_eq!(
            *collector.reader.paths.lock().unwrap(),
            vec!["/dev/ttyUSB3".to_string(), "/dev/ttyUSB3".to_string()]
        );
    }

    // -----------------------------------------------------------------------
    // prometheus::core::Collector
    // -----------------------------------------------------------------------

    #[test]
    fn test_registers_with_registry() {
        let collector = SolarCollector::new(ScriptedReader::new(vec![]), "/dev/null").unwrap();
        assert_eq!(Collector::desc(&collector).len(), GAUGE_COUNT + 1);
        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();
    }

    #[test]
    fn test_gather_success_yields_gauge_families() {
        let collector =
            SolarCollector::new(ScriptedReader::new(vec![Ok(sample_record())]), "/dev/null")
                .unwrap();
        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();

        let families = registry.gather();
        assert_eq!(families.len(), GAUGE_COUNT);
        assert!(
            families
                .iter()
                .all(|f| f.get_field_type() == MetricType::GAUGE)
        );
        let soc = families
            .iter()
            .find(|f| f.get_name() == "epsolar_battery_soc")
            .unwrap();
        assert_eq!(soc.get_metric()[0].get_gauge().get_value(), 87.0);
    }

    #[test]
    fn test_gather_failure_yields_counter_only() {
        let collector = SolarCollector::new(ScriptedReader::new(vec![]), "/dev/null")
            .unwrap()
            .with_sink(Box::new(RecordingSink::default()));
        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();

        registry.gather();
        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), SCRAPE_FAILURES_NAME);
        assert_eq!(families[0].get_field_type(), MetricType::COUNTER);
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 2.0);
    }

    #[test]
    fn test_gather_after_outage_drops_last_good_gauges() {
        let reader = ScriptedReader::new(vec![Ok(sample_record()), Err(timeout())]);
        let collector = SolarCollector::new(reader, "/dev/null")
            .unwrap()
            .with_sink(Box::new(RecordingSink::default()));
        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();

        assert_eq!(registry.gather().len(), GAUGE_COUNT);

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), SCRAPE_FAILURES_NAME);
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 1.0);
        assert!(
            families
                .iter()
                .all(|f| f.get_field_type() != MetricType::GAUGE)
        );
    }
}
