//! Concrete stage handlers and the static stage table.
//!
//! ```text
//!  INITIAL ─▶ PREPARE ─[boiler at mash temp]─▶ BOIL→MASH ─▶ TEMP→BOIL
//!                                                              │
//!      ┌───────────────────────────────────────────────────────┘
//!      ▼
//!  MASH I ─▶ MASH II ─▶ MASH III ─▶ MASH IV ─▶ (pause) ─▶ WAIT FOR WATER
//!    each: [mash at temp] then rest timer          │
//!      ┌───────────────────────────────────────────┘
//!      ▼
//!  MASH→TEMP I ─▶ BOIL→MASH I ─▶ CIRCULATE I ─▶ (pause)
//!  MASH→TEMP II ─▶ BOIL→MASH II ─▶ CIRCULATE II ─▶ (pause)
//!  MASH→TEMP III ─▶ TEMP→BOIL ─▶ BOIL ─[boiling + boil time]─▶ reset
//! ```
//!
//! Mash stages beyond the recipe and disabled pauses are skipped by
//! [`next_stage`](super::next_stage), never by the handlers.

use crate::app::commands::{ActorCommand, Flow, PumpMode, ValveTarget};
use crate::error::{ConfigurationError, Result};

use super::context::{StageContext, TimerPurpose};
use super::{StageDescriptor, StageId};

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

const fn stage(
    id: StageId,
    key: &'static str,
    name: &'static str,
    next: Option<StageId>,
    on_enter: super::StageEnterFn,
) -> StageDescriptor {
    StageDescriptor {
        id,
        key,
        name,
        mash_step: 0,
        next,
        pause: false,
        manual_transfer: false,
        on_enter,
    }
}

const fn mash(id: StageId, step: u8, key: &'static str, name: &'static str, next: StageId) -> StageDescriptor {
    StageDescriptor {
        mash_step: step,
        ..stage(id, key, name, Some(next), mash_enter)
    }
}

const fn pause(id: StageId, key: &'static str, name: &'static str, next: StageId) -> StageDescriptor {
    StageDescriptor {
        pause: true,
        ..stage(id, key, name, Some(next), pause_enter)
    }
}

const fn transfer(
    id: StageId,
    key: &'static str,
    name: &'static str,
    next: StageId,
    on_enter: super::StageEnterFn,
) -> StageDescriptor {
    StageDescriptor {
        manual_transfer: true,
        ..stage(id, key, name, Some(next), on_enter)
    }
}

use StageId as S;

/// The stage graph, indexed by `StageId as usize`.
pub static STAGE_TABLE: [StageDescriptor; StageId::COUNT] = [
    stage(S::Initial, "initial", "Initial stage", Some(S::MashingPrepare), initial_enter),
    stage(
        S::MashingPrepare,
        "mashing_prepare",
        "Prepare for mashing - heat up for first step",
        Some(S::MashingBoilToMash),
        prepare_enter,
    ),
    transfer(
        S::MashingBoilToMash,
        "mashing_boil_to_mash",
        "Prepare for mashing - transferring from boil to mash",
        S::MashingTempToBoil,
        boil_to_mash_enter,
    ),
    transfer(
        S::MashingTempToBoil,
        "mashing_temp_to_boil",
        "Prepare for mashing - transferring from temp to boil",
        S::Mashing1,
        temp_to_boil_enter,
    ),
    mash(S::Mashing1, 1, "mashing_1", "Mashing - step I.", S::Mashing2),
    mash(S::Mashing2, 2, "mashing_2", "Mashing - step II.", S::Mashing3),
    mash(S::Mashing3, 3, "mashing_3", "Mashing - step III.", S::Mashing4),
    mash(S::Mashing4, 4, "mashing_4", "Mashing - step IV.", S::PostMashPause),
    pause(
        S::PostMashPause,
        "post_mash_pause",
        "Mashing finished - paused",
        S::WaitForSpargingWater,
    ),
    stage(
        S::WaitForSpargingWater,
        "wait_for_sparging_water",
        "Waiting for the sparging water to heat up",
        Some(S::SpargeMashToTemp1),
        wait_for_water_enter,
    ),
    transfer(
        S::SpargeMashToTemp1,
        "sparge_mash_to_temp_1",
        "Sparging - transferring wort to temporary I.",
        S::SpargeBoilToMash1,
        mash_to_temp_enter,
    ),
    transfer(
        S::SpargeBoilToMash1,
        "sparge_boil_to_mash_1",
        "Sparging - transferring water to mashing tun I.",
        S::SpargeCirculateInMash1,
        sparge_boil_to_mash_enter,
    ),
    stage(
        S::SpargeCirculateInMash1,
        "sparge_circulate_in_mash_1",
        "Sparging - circulating in mash tun I.",
        Some(S::SpargePause1),
        circulate_enter,
    ),
    pause(S::SpargePause1, "sparge_pause_1", "Sparging - paused I.", S::SpargeMashToTemp2),
    transfer(
        S::SpargeMashToTemp2,
        "sparge_mash_to_temp_2",
        "Sparging - transferring wort to temporary II.",
        S::SpargeBoilToMash2,
        mash_to_temp_enter,
    ),
    transfer(
        S::SpargeBoilToMash2,
        "sparge_boil_to_mash_2",
        "Sparging - transferring water to mashing tun II.",
        S::SpargeCirculateInMash2,
        sparge_boil_to_mash_enter,
    ),
    stage(
        S::SpargeCirculateInMash2,
        "sparge_circulate_in_mash_2",
        "Sparging - circulating in mash tun II.",
        Some(S::SpargePause2),
        last_circulate_enter,
    ),
    pause(S::SpargePause2, "sparge_pause_2", "Sparging - paused II.", S::SpargeMashToTemp3),
    transfer(
        S::SpargeMashToTemp3,
        "sparge_mash_to_temp_3",
        "Sparging - transferring wort to temporary III.",
        S::SpargeTempToBoil,
        last_mash_to_temp_enter,
    ),
    transfer(
        S::SpargeTempToBoil,
        "sparge_temp_to_boil",
        "Transferring wort to boiling kettle",
        S::Boil,
        sparge_temp_to_boil_enter,
    ),
    stage(S::Boil, "boil", "Boiling wort", None, boil_enter),
];

// ═══════════════════════════════════════════════════════════════════════════
//  Preparation
// ═══════════════════════════════════════════════════════════════════════════

fn initial_enter(_ctx: &mut StageContext<'_>) -> Result<()> {
    Err(ConfigurationError::InitialStageEntered.into())
}

fn prepare_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    // The boiler heats the mash water a little above the first rest to
    // cover the loss while it is pumped over.
    let target = ctx.recipe.first_mash_temperature() + ctx.config.mash_preheat_offset;
    ctx.set_flow(Flow::default());
    ctx.issue(ActorCommand::BoilTargetTemp(target));
    Ok(())
}

fn boil_to_mash_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(TimerPurpose::PreboilCycle, Flow::boil_pump(ValveTarget::Mash));
    Ok(())
}

fn temp_to_boil_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(TimerPurpose::PreboilCycle, Flow::temp_pump());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  Mashing: waits for the mash vessel, then the rest timer runs
// ═══════════════════════════════════════════════════════════════════════════

fn mash_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    let step = ctx.stage.mash_step();
    let target = ctx.recipe.mash_step(step)?.temperature;

    if step == 1 {
        let delay = ctx.config.sparge_heat_delay_secs;
        if delay == 0 {
            ctx.issue(ActorCommand::BoilTargetTemp(ctx.config.sparging_temperature));
        } else {
            ctx.start_timer(TimerPurpose::SpargeHeatStart, f64::from(delay));
        }
    }
    ctx.issue(ActorCommand::MashTargetTemp(target));
    ctx.set_flow(Flow::mash_pump(PumpMode::MashDistribution, ValveTarget::Mash));
    Ok(())
}

fn pause_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.set_flow(Flow::default());
    Ok(())
}

fn wait_for_water_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    // The boiler may have reached sparging temperature long before.
    if ctx.sparge_ready {
        ctx.fall_through();
    } else {
        // Nothing else would ever heat it after an override.
        ctx.issue(ActorCommand::BoilTargetTemp(ctx.config.sparging_temperature));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  Sparging: three mash↔temp cycles
// ═══════════════════════════════════════════════════════════════════════════

fn mash_to_temp_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(
        TimerPurpose::SpargeStepDone,
        Flow::mash_pump(PumpMode::SpargeDistribution, ValveTarget::Temp),
    );
    Ok(())
}

fn sparge_boil_to_mash_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(TimerPurpose::SpargeStepDone, Flow::boil_pump(ValveTarget::Mash));
    Ok(())
}

fn circulate_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(
        TimerPurpose::SpargeStepDone,
        Flow::mash_pump(PumpMode::SpargeDistribution, ValveTarget::Mash),
    );
    Ok(())
}

fn last_circulate_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    // All sparge water is out of the boiler.
    ctx.issue(ActorCommand::StopBoilVessel);
    circulate_enter(ctx)
}

fn last_mash_to_temp_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    // Mash tun is being emptied.
    ctx.issue(ActorCommand::StopMashVessel);
    mash_to_temp_enter(ctx)
}

fn sparge_temp_to_boil_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.run_timed(TimerPurpose::SpargeStepDone, Flow::temp_pump());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  Boiling: timer starts once the kettle boils
// ═══════════════════════════════════════════════════════════════════════════

fn boil_enter(ctx: &mut StageContext<'_>) -> Result<()> {
    ctx.stop_all();
    ctx.issue(ActorCommand::BoilTargetTemp(100.0));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrewConfig, TransferMode};
    use crate::fsm::context::TimerRequest;
    use crate::recipe::{MashStep, Recipe};

    fn scenario() -> Recipe {
        Recipe::new(
            &[
                MashStep::new(50.0, 1),
                MashStep::new(64.0, 1),
                MashStep::new(68.0, 1),
                MashStep::new(74.0, 1),
            ],
            1,
            1.0,
            1.0,
        )
        .unwrap()
    }

    fn enter(stage: StageId, recipe: &Recipe, config: &BrewConfig, ready: bool) -> Result<StageContext<'static>> {
        // Leak for a 'static context; tests only.
        let recipe: &'static Recipe = Box::leak(Box::new(recipe.clone()));
        let config: &'static BrewConfig = Box::leak(Box::new(config.clone()));
        let mut ctx = StageContext::new(stage, recipe, config, ready);
        (stage.descriptor().on_enter)(&mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn entering_initial_is_an_error() {
        let err = enter(StageId::Initial, &scenario(), &BrewConfig::default(), false);
        assert!(matches!(
            err,
            Err(crate::error::Error::Configuration(
                ConfigurationError::InitialStageEntered
            ))
        ));
    }

    #[test]
    fn prepare_heats_boiler_above_first_rest() {
        let ctx = enter(StageId::MashingPrepare, &scenario(), &BrewConfig::default(), false).unwrap();
        let cmds = &ctx.plan.commands;
        assert_eq!(cmds[0], ActorCommand::StopMashPump);
        assert_eq!(cmds[3], ActorCommand::SetMashValve(ValveTarget::Mash));
        assert_eq!(*cmds.last().unwrap(), ActorCommand::BoilTargetTemp(55.0));
        assert!(ctx.plan.timers.is_empty());
    }

    #[test]
    fn first_mash_step_starts_sparge_water() {
        let ctx = enter(StageId::Mashing1, &scenario(), &BrewConfig::default(), false).unwrap();
        let cmds = &ctx.plan.commands;
        assert_eq!(cmds[0], ActorCommand::BoilTargetTemp(78.0));
        assert_eq!(cmds[1], ActorCommand::MashTargetTemp(50.0));
        assert_eq!(
            *cmds.last().unwrap(),
            ActorCommand::StopBoilPump
        );
        assert!(cmds.contains(&ActorCommand::StartMashPump(PumpMode::MashDistribution)));
        assert!(ctx.plan.timers.is_empty());
    }

    #[test]
    fn delayed_sparge_heat_uses_a_timer() {
        let config = BrewConfig {
            sparge_heat_delay_secs: 1800,
            ..BrewConfig::default()
        };
        let ctx = enter(StageId::Mashing1, &scenario(), &config, false).unwrap();
        assert!(!ctx
            .plan
            .commands
            .iter()
            .any(|c| matches!(c, ActorCommand::BoilTargetTemp(_))));
        assert_eq!(
            ctx.plan.timers,
            vec![TimerRequest {
                purpose: TimerPurpose::SpargeHeatStart,
                secs: 1800.0
            }]
        );
    }

    #[test]
    fn later_mash_steps_leave_boiler_alone() {
        let ctx = enter(StageId::Mashing3, &scenario(), &BrewConfig::default(), false).unwrap();
        assert_eq!(ctx.plan.commands[0], ActorCommand::MashTargetTemp(68.0));
    }

    #[test]
    fn undefined_mash_step_fails_fast() {
        let recipe = Recipe::new(&[MashStep::new(64.0, 60)], 60, 15.0, 20.0).unwrap();
        let err = enter(StageId::Mashing2, &recipe, &BrewConfig::default(), false);
        assert!(matches!(
            err,
            Err(crate::error::Error::Configuration(
                ConfigurationError::MashStepOutOfRange { step: 2, defined: 1 }
            ))
        ));
    }

    #[test]
    fn wait_falls_through_when_water_ready() {
        let waiting = enter(StageId::WaitForSpargingWater, &scenario(), &BrewConfig::default(), false).unwrap();
        assert!(!waiting.plan.fall_through);
        assert_eq!(waiting.plan.commands, vec![ActorCommand::BoilTargetTemp(78.0)]);
        let ready = enter(StageId::WaitForSpargingWater, &scenario(), &BrewConfig::default(), true).unwrap();
        assert!(ready.plan.fall_through);
        assert!(ready.plan.commands.is_empty());
    }

    #[test]
    fn circulation_runs_for_configured_time() {
        let ctx = enter(StageId::SpargeCirculateInMash1, &scenario(), &BrewConfig::default(), false).unwrap();
        assert_eq!(
            ctx.plan.timers,
            vec![TimerRequest {
                purpose: TimerPurpose::SpargeStepDone,
                secs: 600.0
            }]
        );
        assert!(ctx
            .plan
            .commands
            .contains(&ActorCommand::StartMashPump(PumpMode::SpargeDistribution)));
    }

    #[test]
    fn last_cycles_switch_heaters_off_first() {
        let c2 = enter(StageId::SpargeCirculateInMash2, &scenario(), &BrewConfig::default(), false).unwrap();
        assert_eq!(c2.plan.commands[0], ActorCommand::StopBoilVessel);
        let m3 = enter(StageId::SpargeMashToTemp3, &scenario(), &BrewConfig::default(), false).unwrap();
        assert_eq!(m3.plan.commands[0], ActorCommand::StopMashVessel);
        assert!(m3
            .plan
            .commands
            .contains(&ActorCommand::SetMashValve(ValveTarget::Temp)));
    }

    #[test]
    fn manual_transfer_waits_for_operator() {
        let config = BrewConfig {
            transfer_mode: TransferMode::Manual,
            ..BrewConfig::default()
        };
        let transfer = enter(StageId::SpargeBoilToMash1, &scenario(), &config, false).unwrap();
        assert!(transfer.plan.timers.is_empty());
        assert_eq!(transfer.plan.commands, Flow::default().commands().to_vec());

        // Circulation is not a transfer and keeps its timer.
        let circulate = enter(StageId::SpargeCirculateInMash1, &scenario(), &config, false).unwrap();
        assert_eq!(circulate.plan.timers.len(), 1);
    }

    #[test]
    fn boil_shuts_down_then_boils() {
        let ctx = enter(StageId::Boil, &scenario(), &BrewConfig::default(), false).unwrap();
        assert_eq!(ctx.plan.commands[0], ActorCommand::DisengageCooling);
        assert_eq!(
            *ctx.plan.commands.last().unwrap(),
            ActorCommand::BoilTargetTemp(100.0)
        );
        assert!(ctx.plan.timers.is_empty());
    }

    #[test]
    fn pause_stages_stop_pumps() {
        for id in [S::PostMashPause, S::SpargePause1, S::SpargePause2] {
            let ctx = enter(id, &scenario(), &BrewConfig::default(), false).unwrap();
            assert_eq!(ctx.plan.commands, Flow::default().commands().to_vec());
        }
    }
}
