//! Charge-controller status record and its fixed field table.
//!
//! A [`StatusRecord`] is one snapshot of everything the controller reports in a
//! single read. [`StatusField`] enumerates those fields in publication order and
//! carries the metric name, help text, and value extraction for each one.

use serde::{Deserialize, Serialize};

/// One status snapshot read from the charge controller.
///
/// Electrical quantities are in volts, amps, and watts; temperatures in degrees
/// Celsius; energies in kWh; state of charge in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub array_voltage: f64,
    pub array_current: f64,
    pub array_power: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub battery_soc: f64,
    pub battery_temp: f64,
    pub battery_min_voltage: f64,
    pub battery_max_voltage: f64,
    pub device_temp: f64,
    /// Whether the load output is switched on.
    pub load: bool,
    pub load_voltage: f64,
    pub load_current: f64,
    pub load_power: f64,
    pub energy_consumed_daily: f64,
    pub energy_consumed_monthly: f64,
    pub energy_consumed_annual: f64,
    pub energy_consumed_total: f64,
    pub energy_generated_daily: f64,
    pub energy_generated_monthly: f64,
    pub energy_generated_annual: f64,
    pub energy_generated_total: f64,
}

/// A single published field of a [`StatusRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    PanelVoltage,
    PanelCurrent,
    PanelPower,
    BatteryVoltage,
    BatteryCurrent,
    BatterySoc,
    BatteryTemperature,
    BatteryMinVoltage,
    BatteryMaxVoltage,
    LoadActive,
    LoadVoltage,
    LoadCurrent,
    LoadPower,
    DeviceTemperature,
    EnergyConsumedDaily,
    EnergyConsumedMonthly,
    EnergyConsumedAnnual,
    EnergyConsumedTotal,
    EnergyGeneratedDaily,
    EnergyGeneratedMonthly,
    EnergyGeneratedAnnual,
    EnergyGeneratedTotal,
}

/// Number of gauges a successful scrape publishes.
pub const GAUGE_COUNT: usize = StatusField::ALL.len();

impl StatusField {
    /// Every field, in publication order: panel, battery, load, device
    /// temperature, consumed energy, generated energy.
    pub const ALL: [StatusField; 22] = [
        Self::PanelVoltage,
        Self::PanelCurrent,
        Self::PanelPower,
        Self::BatteryVoltage,
        Self::BatteryCurrent,
        Self::BatterySoc,
        Self::BatteryTemperature,
        Self::BatteryMinVoltage,
        Self::BatteryMaxVoltage,
        Self::LoadActive,
        Self::LoadVoltage,
        Self::LoadCurrent,
        Self::LoadPower,
        Self::DeviceTemperature,
        Self::EnergyConsumedDaily,
        Self::EnergyConsumedMonthly,
        Self::EnergyConsumedAnnual,
        Self::EnergyConsumedTotal,
        Self::EnergyGeneratedDaily,
        Self::EnergyGeneratedMonthly,
        Self::EnergyGeneratedAnnual,
        Self::EnergyGeneratedTotal,
    ];

    /// Position of this field in [`StatusField::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Fully qualified metric name.
    pub fn metric_name(self) -> &'static str {
        match self {
            Self::PanelVoltage => "epsolar_panel_voltage",
            Self::PanelCurrent => "epsolar_panel_current",
            Self::PanelPower => "epsolar_panel_power",
            Self::BatteryVoltage => "epsolar_battery_voltage",
            Self::BatteryCurrent => "epsolar_battery_current",
            Self::BatterySoc => "epsolar_battery_soc",
            Self::BatteryTemperature => "epsolar_battery_temperature",
            Self::BatteryMinVoltage => "epsolar_battery_min_voltage",
            Self::BatteryMaxVoltage => "epsolar_battery_max_voltage",
            Self::LoadActive => "epsolar_load_active",
            Self::LoadVoltage => "epsolar_load_voltage",
            Self::LoadCurrent => "epsolar_load_current",
            Self::LoadPower => "epsolar_load_power",
            Self::DeviceTemperature => "epsolar_device_temperature",
            Self::EnergyConsumedDaily => "epsolar_energy_consumed_daily",
            Self::EnergyConsumedMonthly => "epsolar_energy_consumed_monthly",
            Self::EnergyConsumedAnnual => "epsolar_energy_consumed_annual",
            Self::EnergyConsumedTotal => "epsolar_energy_consumed_total",
            Self::EnergyGeneratedDaily => "epsolar_energy_generated_daily",
            Self::EnergyGeneratedMonthly => "epsolar_energy_generated_monthly",
            Self::EnergyGeneratedAnnual => "epsolar_energy_generated_annual",
            Self::EnergyGeneratedTotal => "epsolar_energy_generated_total",
        }
    }

    /// Help text shown next to the metric in the exposition output.
    pub fn help(self) -> &'static str {
        match self {
            Self::PanelVoltage => "Solar panel array voltage (V)",
            Self::PanelCurrent => "Solar panel array current (A)",
            Self::PanelPower => "Solar panel array power (W)",
            Self::BatteryVoltage => "Battery voltage (V)",
            Self::BatteryCurrent => "Battery net current, negative when discharging (A)",
            Self::BatterySoc => "Battery state of charge (%)",
            Self::BatteryTemperature => "Battery temperature (C)",
            Self::BatteryMinVoltage => "Minimum battery voltage today (V)",
            Self::BatteryMaxVoltage => "Maximum battery voltage today (V)",
            Self::LoadActive => "Load output switched on (1) or off (0)",
            Self::LoadVoltage => "Load voltage (V)",
            Self::LoadCurrent => "Load current (A)",
            Self::LoadPower => "Load power (W)",
            Self::DeviceTemperature => "Charge controller temperature (C)",
            Self::EnergyConsumedDaily => "Energy consumed today (kWh)",
            Self::EnergyConsumedMonthly => "Energy consumed this month (kWh)",
            Self::EnergyConsumedAnnual => "Energy consumed this year (kWh)",
            Self::EnergyConsumedTotal => "Energy consumed since the controller counter reset (kWh)",
            Self::EnergyGeneratedDaily => "Energy generated today (kWh)",
            Self::EnergyGeneratedMonthly => "Energy generated this month (kWh)",
            Self::EnergyGeneratedAnnual => "Energy generated this year (kWh)",
            Self::EnergyGeneratedTotal => "Energy generated since the controller counter reset (kWh)",
        }
    }

    /// Extract this field's published value from a record.
    pub fn value(self, record: &StatusRecord) -> f64 {
        match self {
            Self::PanelVoltage => record.array_voltage,
            Self::PanelCurrent => record.array_current,
            Self::PanelPower => record.array_power,
            Self::BatteryVoltage => record.battery_voltage,
            Self::BatteryCurrent => record.battery_current,
            Self::BatterySoc => record.battery_soc,
            Self::BatteryTemperature => record.battery_temp,
            Self::BatteryMinVoltage => record.battery_min_voltage,
            Self::BatteryMaxVoltage => record.battery_max_voltage,
            Self::LoadActive => {
                if record.load {
                    1.0
                } else {
                    0.0
                }
            }
            Self::LoadVoltage => record.load_voltage,
            Self::LoadCurrent => record.load_current,
            Self::LoadPower => record.load_power,
            Self::DeviceTemperature => record.device_temp,
            Self::EnergyConsumedDaily => record.energy_consumed_daily,
            Self::EnergyConsumedMonthly => record.energy_consumed_monthly,
            Self::EnergyConsumedAnnual => record.energy_consumed_annual,
            Self::EnergyConsumedTotal => record.energy_consumed_total,
            Self::EnergyGeneratedDaily => record.energy_generated_daily,
            Self::EnergyGeneratedMonthly => record.energy_generated_monthly,
            Self::EnergyGeneratedAnnual => record.energy_generated_annual,
            Self::EnergyGeneratedTotal => record.energy_generated_total,
        }
    }
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.metric_name())
    }
}
