//! Brewery configuration parameters
//!
//! All tunable parameters for the controller.  A validated
//! [`BrewConfig`] is wrapped in a versioned [`ConfigSnapshot`] and handed
//! explicitly to the process and the vessel controllers; reloading swaps
//! the snapshot instead of mutating shared state.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

/// Pump transfer speed per direction, in seconds per liter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpRates {
    pub mash_to_temp: f64,
    pub temp_to_boil: f64,
    /// Reserved: no stage pumps from the boiler back to the temporary
    /// vessel.  Validated so a hand-edited file stays consistent.
    pub boil_to_temp: f64,
    pub boil_to_mash: f64,
}

/// Work/idle cycle of the mash pump while distributing over the grain bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub work_secs: u32,
    pub idle_secs: u32,
}

impl Distribution {
    /// Share of the cycle during which the pump actually runs.
    pub fn work_fraction(&self) -> f64 {
        let total = self.work_secs + self.idle_secs;
        if total == 0 {
            return 1.0;
        }
        f64::from(self.work_secs) / f64::from(total)
    }
}

/// PID gains shared by both vessel controllers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Who moves liquid between vessels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransferMode {
    /// Pumps run on timers.
    #[default]
    Automatic,
    /// A human does the transfer and confirms with `skip_to_next`.
    Manual,
}

/// Core brewery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewConfig {
    // --- Pumps ---
    pub pump_rates: PumpRates,
    pub mash_distribution: Distribution,
    pub sparge_distribution: Distribution,

    // --- Process ---
    /// Sparge water temperature (Celsius)
    pub sparging_temperature: f32,
    /// In-mash circulation time per sparge cycle (seconds)
    pub sparging_circulate_secs: u32,
    /// Added to the first mash temperature while pre-heating (Celsius)
    pub mash_preheat_offset: f32,
    /// Delay before heating sparge water once mashing starts (seconds)
    pub sparge_heat_delay_secs: u32,
    /// Operator pauses between mashing and sparge cycles
    pub pause_enabled: bool,
    pub transfer_mode: TransferMode,

    // --- Estimates ---
    /// Heating time per degree used for remaining-time estimates
    pub heating_secs_per_degree: f64,
    /// Starting water temperature (Celsius)
    pub ambient_temperature: f32,

    // --- PID ---
    pub pid: PidGains,

    // --- Valves ---
    /// Valve settle time, honoured by the valve driver only
    pub valve_settle_secs: u32,

    // --- Timing ---
    /// Vessel control loop period (seconds)
    pub control_period_secs: f64,
    /// Wall-clock multiplier for process timers (1.0 = real time)
    pub time_scale: f64,
}

impl Default for BrewConfig {
    fn default() -> Self {
        Self {
            // Pumps
            pump_rates: PumpRates {
                mash_to_temp: 12.0,
                temp_to_boil: 10.0,
                boil_to_temp: 10.0,
                boil_to_mash: 11.0,
            },
            mash_distribution: Distribution {
                work_secs: 20,
                idle_secs: 40,
            },
            sparge_distribution: Distribution {
                work_secs: 10,
                idle_secs: 5,
            },

            // Process
            sparging_temperature: 78.0,
            sparging_circulate_secs: 600,
            mash_preheat_offset: 5.0,
            sparge_heat_delay_secs: 0,
            pause_enabled: false,
            transfer_mode: TransferMode::Automatic,

            // Estimates
            heating_secs_per_degree: 30.0,
            ambient_temperature: 20.0,

            // PID
            pid: PidGains {
                kp: 10.0,
                ki: 0.05,
                kd: 2.0,
            },

            // Valves
            valve_settle_secs: 2,

            // Timing
            control_period_secs: 1.0,
            time_scale: 1.0,
        }
    }
}

impl BrewConfig {
    /// Reject values that would make durations or control meaningless.
    pub fn validate(&self) -> Result<()> {
        let rates = &self.pump_rates;
        for rate in [
            rates.mash_to_temp,
            rates.temp_to_boil,
            rates.boil_to_temp,
            rates.boil_to_mash,
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(invalid("pump rates must be positive"));
            }
        }
        if self.mash_distribution.work_secs == 0 || self.sparge_distribution.work_secs == 0 {
            return Err(invalid("pump distribution work time must be positive"));
        }
        if !(self.sparging_temperature > 0.0 && self.sparging_temperature < 100.0) {
            return Err(invalid("sparging temperature must be between 0 and 100"));
        }
        if self.mash_preheat_offset < 0.0 {
            return Err(invalid("mash preheat offset must not be negative"));
        }
        if !(self.heating_secs_per_degree.is_finite() && self.heating_secs_per_degree >= 0.0) {
            return Err(invalid("heating rate must not be negative"));
        }
        if !(self.control_period_secs.is_finite() && self.control_period_secs > 0.0) {
            return Err(invalid("control period must be positive"));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(invalid("time scale must be positive"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            warn!("Configuration JSON rejected: {e}");
            invalid("malformed configuration JSON")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|_| invalid("configuration file could not be read"))?;
        Self::from_json_str(&json)
    }
}

fn invalid(msg: &'static str) -> crate::error::Error {
    ConfigurationError::InvalidConfig(msg).into()
}

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Immutable, versioned view of a validated configuration.
///
/// Cheap to clone; every holder sees the same values until it is handed
/// a newer snapshot.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    version: u64,
    config: Arc<BrewConfig>,
}

impl ConfigSnapshot {
    pub fn new(config: BrewConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            config: Arc::new(config),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &BrewConfig {
        &self.config
    }
}

impl core::ops::Deref for ConfigSnapshot {
    type Target = BrewConfig;

    fn deref(&self) -> &BrewConfig {
        &self.config
    }
}
