use epsolar_core::{SerialReader, SolarCollector};
use epsolar_server::ServerConfig;
use prometheus::Registry;

use super::{CommandResult, ServeArgs};

pub fn run(args: &ServeArgs) -> CommandResult {
    let reader = SerialReader::new(args.device.settings());
    let collector = SolarCollector::new(reader, args.device.device.clone())?;

    let registry = Registry::new();
    registry.register(Box::new(collector))?;

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        device_path: args.device.device.clone(),
    };

    log::info!("Starting epsolar_exporter v{}", epsolar_core::VERSION);
    log::info!(
        "Reading {} at {} baud (slave {})",
        config.device_path,
        args.device.baud,
        args.device.slave
    );
    log::info!("Metrics at http://{}:{}/metrics", config.host, config.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(epsolar_server::run_server(registry, &config))?;
    Ok(())
}
