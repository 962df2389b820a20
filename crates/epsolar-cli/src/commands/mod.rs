pub mod metrics;
pub mod read;
pub mod serve;

use std::time::Duration;

use clap::Args;
use epsolar_core::{DEFAULT_DEVICE_PATH, SerialSettings};
use epsolar_server::{DEFAULT_HOST, DEFAULT_PORT};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Serial connection to the charge controller.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeviceArgs {
    /// Serial device the controller is attached to
    #[arg(long, default_value = DEFAULT_DEVICE_PATH)]
    pub device: String,

    /// Serial baud rate
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,

    /// Modbus slave id of the controller
    #[arg(long, default_value_t = 1)]
    pub slave: u8,

    /// Per-transaction I/O timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,
}

impl Default for DeviceArgs {
    fn default() -> Self {
        let settings = SerialSettings::default();
        Self {
            device: DEFAULT_DEVICE_PATH.to_string(),
            baud: settings.baud_rate,
            slave: settings.slave_id,
            timeout_ms: settings.timeout.as_millis() as u64,
        }
    }
}

impl DeviceArgs {
    pub fn settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud,
            slave_id: self.slave,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub device: DeviceArgs,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            device: DeviceArgs::default(),
        }
    }
}
