//! Planned stage durations.
//!
//! Pump transfers take `liters × seconds-per-liter` for their direction;
//! heating phases are estimated at `heating_secs_per_degree` per degree.
//! The same numbers size the transfer timers and feed the remaining-time
//! estimates in [`ProcessStatus`](super::ProcessStatus).

use crate::config::BrewConfig;
use crate::fsm::{chain_from, StageId};
use crate::recipe::Recipe;

/// Planned duration of `stage` in recipe seconds.
pub fn planned_secs(stage: StageId, recipe: &Recipe, config: &BrewConfig) -> f64 {
    let rates = &config.pump_rates;
    let heating = |from: f32, to: f32| f64::from(to - from) * config.heating_secs_per_degree;
    let mash_l = recipe.mash_water_liters();
    let sparge_l = recipe.sparge_water_liters();
    let sparge_share = config.sparge_distribution.work_fraction();

    match stage {
        StageId::MashingPrepare => heating(
            config.ambient_temperature,
            recipe.first_mash_temperature() + config.mash_preheat_offset,
        )
        .max(0.0),
        StageId::MashingBoilToMash => mash_l * rates.boil_to_mash,
        StageId::MashingTempToBoil => sparge_l * rates.temp_to_boil,
        StageId::Mashing1 | StageId::Mashing2 | StageId::Mashing3 | StageId::Mashing4 => {
            mash_secs(stage.mash_step(), recipe, config)
        }
        StageId::SpargeMashToTemp1 => mash_l * rates.mash_to_temp * sparge_share,
        StageId::SpargeBoilToMash1 | StageId::SpargeBoilToMash2 => sparge_l / 2.0 * rates.boil_to_mash,
        StageId::SpargeCirculateInMash1 | StageId::SpargeCirculateInMash2 => {
            f64::from(config.sparging_circulate_secs)
        }
        StageId::SpargeMashToTemp2 | StageId::SpargeMashToTemp3 => {
            sparge_l / 2.0 * rates.mash_to_temp * sparge_share
        }
        StageId::SpargeTempToBoil => (mash_l + sparge_l) * rates.temp_to_boil,
        StageId::Boil => {
            heating(config.sparging_temperature, 100.0).max(0.0)
                + f64::from(recipe.boiling_minutes()) * 60.0
        }
        StageId::Initial
        | StageId::PostMashPause
        | StageId::WaitForSpargingWater
        | StageId::SpargePause1
        | StageId::SpargePause2 => 0.0,
    }
}

/// Heat-up from the previous rest plus the rest itself.  Zero for steps
/// the recipe does not define.
fn mash_secs(step: u8, recipe: &Recipe, config: &BrewConfig) -> f64 {
    let Ok(current) = recipe.mash_step(step) else {
        return 0.0;
    };
    let rest = f64::from(current.minutes) * 60.0;
    if step <= 1 {
        // Mash water arrives pre-heated.
        return rest;
    }
    let previous = recipe
        .mash_step(step - 1)
        .map_or(current.temperature, |p| p.temperature);
    f64::from(current.temperature - previous).max(0.0) * config.heating_secs_per_degree + rest
}

/// Per-stage duration table, recomputed on reload and corrected when a
/// rest or the boil actually starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDurations {
    secs: [f64; StageId::COUNT],
}

impl StageDurations {
    pub fn compute(recipe: &Recipe, config: &BrewConfig) -> Self {
        let mut secs = [0.0; StageId::COUNT];
        for stage in StageId::all() {
            secs[stage.index()] = planned_secs(stage, recipe, config);
        }
        Self { secs }
    }

    pub fn get(&self, stage: StageId) -> f64 {
        self.secs[stage.index()]
    }

    pub fn set(&mut self, stage: StageId, secs: f64) {
        self.secs[stage.index()] = secs;
    }

    /// Sum of every stage after `stage` down the chain.
    pub fn after(&self, stage: StageId) -> f64 {
        chain_from(stage).skip(1).map(|s| self.get(s)).sum()
    }
}
