//! CLI for epsolar-exporter: serve charge-controller telemetry to Prometheus.

mod commands;

use clap::{Parser, Subcommand};

use commands::{DeviceArgs, ServeArgs};

#[derive(Parser)]
#[command(name = "epsolar_exporter")]
#[command(about = "Prometheus exporter for EPSolar solar charge controllers")]
#[command(version = epsolar_core::VERSION)]
struct Cli {
    /// Defaults to `serve` with default settings.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve controller telemetry on an HTTP /metrics endpoint
    Serve(ServeArgs),

    /// Read the controller once and print its status as JSON
    Read {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// List every metric the exporter can publish
    Metrics,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => commands::serve::run(&ServeArgs::default()),
        Some(Commands::Serve(args)) => commands::serve::run(&args),
        Some(Commands::Read { device }) => commands::read::run(&device),
        Some(Commands::Metrics) => commands::metrics::run(),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
