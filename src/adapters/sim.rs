//! Simulated hardware for development and tests.
//!
//! [`SimPin`] stands in for a relay GPIO; clones share one level so a test
//! can hand one clone to a driver and watch the other.  [`SimKettle`] is a
//! first-order thermal model that heats while its heater pin is high.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::adapters::brewery::BreweryPins;
use crate::app::ports::TemperatureProbe;
use crate::config::BrewConfig;
use crate::control::vessel::BOILING_CELSIUS;

// ───────────────────────────────────────────────────────────────
// Relay pin
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::Release);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Kettle model
// ───────────────────────────────────────────────────────────────

/// Heat lost per second, as a fraction of the excess over ambient.
const LOSS_PER_SEC: f32 = 1.0e-4;

/// Kettle whose temperature follows its heater relay.
///
/// Each read advances the model by `dt_secs`: full power adds
/// `dt_secs / secs_per_degree` degrees, and the water always loses a little
/// heat towards ambient.  Water never exceeds boiling.
pub struct SimKettle {
    heater: SimPin,
    temperature: f32,
    ambient: f32,
    degrees_per_read: f32,
    loss_per_read: f32,
}

impl SimKettle {
    pub fn new(heater: SimPin, ambient: f32, secs_per_degree: f64, dt_secs: f32) -> Self {
        let secs_per_degree = secs_per_degree.max(f64::EPSILON) as f32;
        Self {
            heater,
            temperature: ambient,
            ambient,
            degrees_per_read: dt_secs / secs_per_degree,
            loss_per_read: LOSS_PER_SEC * dt_secs,
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl TemperatureProbe for SimKettle {
    fn read_celsius(&mut self) -> f32 {
        let mut t = self.temperature;
        t -= (t - self.ambient) * self.loss_per_read;
        if self.heater.is_high() {
            t += self.degrees_per_read;
        }
        self.temperature = t.min(BOILING_CELSIUS);
        self.temperature
    }
}

// ───────────────────────────────────────────────────────────────
// Rig
// ───────────────────────────────────────────────────────────────

/// A complete simulated brewery: relay pins plus a kettle per heated
/// vessel, each kettle wired to its vessel's heater pin.
pub struct SimRig {
    pub pins: BreweryPins<SimPin>,
    pub mash_kettle: SimKettle,
    pub boil_kettle: SimKettle,
}

impl SimRig {
    pub fn new(config: &BrewConfig) -> Self {
        let mash_heater = SimPin::new();
        let boil_heater = SimPin::new();
        let dt = config.control_period_secs as f32;
        let kettle = |pin: &SimPin| {
            SimKettle::new(
                pin.clone(),
                config.ambient_temperature,
                config.heating_secs_per_degree,
                dt,
            )
        };
        Self {
            mash_kettle: kettle(&mash_heater),
            boil_kettle: kettle(&boil_heater),
            pins: BreweryPins {
                mash_pump: SimPin::new(),
                temp_pump: SimPin::new(),
                boil_pump: SimPin::new(),
                mash_valve: SimPin::new(),
                boil_valve: SimPin::new(),
                mash_heater,
                boil_heater,
            },
        }
    }
}
