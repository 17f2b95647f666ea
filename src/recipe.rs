//! Beer recipe: mash schedule, boil time and water volumes.
//!
//! A recipe is immutable once handed to a [`BrewProcess`](crate::process::BrewProcess).
//! The stage graph has four mash stages, so the schedule lives in a
//! fixed-capacity vector of the same size.

use std::path::Path;

use heapless::Vec;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Error, Result};

/// Number of mash stages in the stage graph.
pub const MAX_MASH_STEPS: usize = 4;

/// Capacity of the (unused) hop schedule.
pub const MAX_HOP_ADDITIONS: usize = 4;

/// One rest of the mash schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MashStep {
    /// Rest temperature (Celsius).
    pub temperature: f32,
    /// Rest duration once the temperature is reached (minutes).
    pub minutes: u32,
}

impl MashStep {
    pub const fn new(temperature: f32, minutes: u32) -> Self {
        Self {
            temperature,
            minutes,
        }
    }
}

/// Hop arm release time after the start of the boil.  Carried, not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopAddition {
    /// Arm number, starting from 1.
    pub arm: u8,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    mash_steps: Vec<MashStep, MAX_MASH_STEPS>,
    boiling_minutes: u32,
    mash_water_liters: f64,
    sparge_water_liters: f64,
    #[serde(default)]
    hop_schedule: Vec<HopAddition, MAX_HOP_ADDITIONS>,
}

impl Recipe {
    pub fn new(
        mash_steps: &[MashStep],
        boiling_minutes: u32,
        mash_water_liters: f64,
        sparge_water_liters: f64,
    ) -> Result<Self> {
        let steps = Vec::from_slice(mash_steps)
            .map_err(|()| invalid("more mash steps than mash stages"))?;
        let recipe = Self {
            mash_steps: steps,
            boiling_minutes,
            mash_water_liters,
            sparge_water_liters,
            hop_schedule: Vec::new(),
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Attach a hop schedule.  Stored for completeness only.
    pub fn with_hops(mut self, hops: &[HopAddition]) -> Result<Self> {
        self.hop_schedule =
            Vec::from_slice(hops).map_err(|()| invalid("too many hop additions"))?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mash_steps.is_empty() {
            return Err(invalid("at least one mash step is required"));
        }
        for step in &self.mash_steps {
            if !(step.temperature > 0.0 && step.temperature < 100.0) {
                return Err(invalid("mash temperature must be between 0 and 100"));
            }
            if step.minutes == 0 {
                return Err(invalid("mash step duration must be positive"));
            }
        }
        if self.boiling_minutes == 0 {
            return Err(invalid("boiling time must be positive"));
        }
        if !(self.mash_water_liters.is_finite() && self.mash_water_liters > 0.0) {
            return Err(invalid("mash water volume must be positive"));
        }
        if !(self.sparge_water_liters.is_finite() && self.sparge_water_liters > 0.0) {
            return Err(invalid("sparge water volume must be positive"));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let recipe: Self = serde_json::from_str(json).map_err(|e| {
            warn!("Recipe JSON rejected: {e}");
            invalid("malformed recipe JSON")
        })?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|_| invalid("recipe file could not be read"))?;
        Self::from_json_str(&json)
    }

    pub fn mash_steps(&self) -> &[MashStep] {
        &self.mash_steps
    }

    pub fn mash_step_count(&self) -> usize {
        self.mash_steps.len()
    }

    /// Mash step by its 1-based stage number.
    pub fn mash_step(&self, step: u8) -> Result<&MashStep> {
        let idx = usize::from(step);
        if idx == 0 || idx > self.mash_steps.len() {
            return Err(ConfigurationError::MashStepOutOfRange {
                step,
                defined: self.mash_steps.len(),
            }
            .into());
        }
        Ok(&self.mash_steps[idx - 1])
    }

    pub fn first_mash_temperature(&self) -> f32 {
        self.mash_steps[0].temperature
    }

    pub fn boiling_minutes(&self) -> u32 {
        self.boiling_minutes
    }

    pub fn mash_water_liters(&self) -> f64 {
        self.mash_water_liters
    }

    pub fn sparge_water_liters(&self) -> f64 {
        self.sparge_water_liters
    }

    pub fn hop_schedule(&self) -> &[HopAddition] {
        &self.hop_schedule
    }
}

impl Default for Recipe {
    /// Single-infusion pale ale.
    fn default() -> Self {
        let mut mash_steps = Vec::new();
        // Capacity is MAX_MASH_STEPS, one push always fits.
        let _ = mash_steps.push(MashStep::new(64.0, 90));
        Self {
            mash_steps,
            boiling_minutes: 60,
            mash_water_liters: 15.0,
            sparge_water_liters: 20.0,
            hop_schedule: Vec::new(),
        }
    }
}

impl core::fmt::Display for Recipe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Recipe[mash stages: ")?;
        for (i, step) in self.mash_steps.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}C/{}min", step.temperature, step.minutes)?;
        }
        write!(
            f,
            ", boiling time: {}min, mash water: {}L, sparge water: {}L]",
            self.boiling_minutes, self.mash_water_liters, self.sparge_water_liters
        )
    }
}

fn invalid(msg: &'static str) -> Error {
    ConfigurationError::InvalidRecipe(msg).into()
}
