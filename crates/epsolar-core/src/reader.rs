//! Device status reader: one request/response exchange per call.
//!
//! [`StatusReader`] is the seam the collector depends on. [`SerialReader`]
//! is the production implementation: it opens the serial port, reads the
//! controller's register map over Modbus RTU, and closes the port again.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use thiserror::Error;

use crate::modbus::{FrameError, ModbusError, RtuClient};
use crate::status::StatusRecord;

/// Default serial device for the EPSolar USB-RS485 adapter.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyXRUSB0";

/// Why a status read failed.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reply: {0}")]
    Frame(#[from] FrameError),
    #[error("device exception {code:#04x} for function {function:#04x}")]
    Exception { function: u8, code: u8 },
}

/// Coarse failure class: could not talk to the device, or could not
/// understand what it said.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Decode,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Decode => write!(f, "decode"),
        }
    }
}

impl DeviceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Open { .. } | Self::Io(_) => FailureKind::Transport,
            Self::Frame(_) | Self::Exception { .. } => FailureKind::Decode,
        }
    }
}

impl From<ModbusError> for DeviceError {
    fn from(err: ModbusError) -> Self {
        match err {
            ModbusError::Io(e) => Self::Io(e),
            ModbusError::Frame(e) => Self::Frame(e),
            ModbusError::Exception { function, code } => Self::Exception { function, code },
        }
    }
}

/// Reads one status record from the device at `device_path`.
///
/// Implementations hold no state across calls and make a single attempt.
pub trait StatusReader: Send + Sync {
    fn read(&self, device_path: &str) -> Result<StatusRecord, DeviceError>;
}

/// Serial line parameters. The controller speaks 8N1 with no flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub slave_id: u8,
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            slave_id: 1,
            timeout: Duration::from_millis(1000),
        }
    }
}

/// [`StatusReader`] over a local serial port.
#[derive(Debug, Clone, Default)]
pub struct SerialReader {
    settings: SerialSettings,
}

impl SerialReader {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl StatusReader for SerialReader {
    fn read(&self, device_path: &str) -> Result<StatusRecord, DeviceError> {
        log::debug!(
            "opening {device_path} at {} baud, slave {}",
            self.settings.baud_rate,
            self.settings.slave_id
        );
        let port = serialport::new(device_path, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.settings.timeout)
            .open()
            .map_err(|source| DeviceError::Open {
                path: device_path.to_string(),
                source,
            })?;

        let mut client = RtuClient::new(port, self.settings.slave_id);
        read_status(&mut client)
    }
}

// Register map (input registers unless noted).
const REALTIME_BLOCK: u16 = 0x3100;
const REALTIME_LEN: u16 = 0x12;
const BATTERY_SOC: u16 = 0x311A;
const BATTERY_BLOCK: u16 = 0x331A;
const BATTERY_LEN: u16 = 3;
const STATISTICS_BLOCK: u16 = 0x3302;
const STATISTICS_LEN: u16 = 0x12;
/// Coil: load output on/off.
const LOAD_COIL: u16 = 0x0002;

fn scaled(raw: u16) -> f64 {
    raw as f64 / 100.0
}

fn scaled_signed(raw: u16) -> f64 {
    raw as i16 as f64 / 100.0
}

/// 32-bit value split across a low and a high register.
fn scaled_wide(low: u16, high: u16) -> f64 {
    (((high as u32) << 16) | low as u32) as f64 / 100.0
}

fn scaled_wide_signed(low: u16, high: u16) -> f64 {
    ((((high as u32) << 16) | low as u32) as i32) as f64 / 100.0
}

/// Read a full status record through an RTU client.
pub fn read_status<T: Read + Write>(client: &mut RtuClient<T>) -> Result<StatusRecord, DeviceError> {
    let rt = client.read_input_registers(REALTIME_BLOCK, REALTIME_LEN)?;
    let soc = client.read_input_registers(BATTERY_SOC, 1)?;
    let battery = client.read_input_registers(BATTERY_BLOCK, BATTERY_LEN)?;
    let stats = client.read_input_registers(STATISTICS_BLOCK, STATISTICS_LEN)?;
    let load = client.read_coils(LOAD_COIL, 1)?;

    Ok(StatusRecord {
        array_voltage: scaled(rt[0x00]),
        array_current: scaled(rt[0x01]),
        array_power: scaled_wide(rt[0x02], rt[0x03]),
        load_voltage: scaled(rt[0x0C]),
        load_current: scaled(rt[0x0D]),
        load_power: scaled_wide(rt[0x0E], rt[0x0F]),
        battery_temp: scaled_signed(rt[0x10]),
        device_temp: scaled_signed(rt[0x11]),
        battery_soc: soc[0] as f64,
        battery_voltage: scaled(battery[0]),
        battery_current: scaled_wide_signed(battery[1], battery[2]),
        battery_max_voltage: scaled(stats[0x00]),
        battery_min_voltage: scaled(stats[0x01]),
        energy_consumed_daily: scaled_wide(stats[0x02], stats[0x03]),
        energy_consumed_monthly: scaled_wide(stats[0x04], stats[0x05]),
        energy_consumed_annual: scaled_wide(stats[0x06], stats[0x07]),
        energy_consumed_total: scaled_wide(stats[0x08], stats[0x09]),
        energy_generated_daily: scaled_wide(stats[0x0A], stats[0x0B]),
        energy_generated_monthly: scaled_wide(stats[0x0C], stats[0x0D]),
        energy_generated_annual: scaled_wide(stats[0x0E], stats[0x0F]),
        energy_generated_total: scaled_wide(stats[0x10], stats[0x11]),
        load: load[0],
    })
}
