use epsolar_core::{MetricKind, describe_all};

use super::CommandResult;

pub fn run() -> CommandResult {
    for descriptor in describe_all() {
        let kind = match descriptor.kind {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        };
        println!("{:<36} {:<8} {}", descriptor.name, kind, descriptor.help);
    }
    Ok(())
}
