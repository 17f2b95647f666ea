//! End-to-end brew process tests against the recording actor.
//!
//! Timer-driven tests shrink recipe time with `time_scale`; temperature
//! events are injected the way the vessel loops would deliver them.

use std::thread;
use std::time::Duration;

use mashline::app::commands::{shutdown_sequence, ActorCommand, Flow, PumpMode, ValveTarget};
use mashline::error::StaleEvent;
use mashline::{BrewConfig, Error, RunState, StageId};

use crate::mock_actor::{in_order, process_with, wait_for_stage};

const WAIT: Duration = Duration::from_secs(5);

fn fast(time_scale: f64) -> BrewConfig {
    BrewConfig {
        time_scale,
        ..BrewConfig::default()
    }
}

// ── Mashing scenario ──────────────────────────────────────────

#[test]
fn mashing_walks_every_rest_in_order() {
    let (process, actor) = process_with(fast(0.0001));
    process.start().unwrap();

    let mut expected = Flow::default().commands().to_vec();
    expected.push(ActorCommand::BoilTargetTemp(55.0));
    assert_eq!(actor.calls(), expected);

    process.boil_target_reached(55.0);
    assert!(wait_for_stage(&process, StageId::Mashing1, WAIT));
    assert!(in_order(
        &actor.calls(),
        &[
            ActorCommand::BoilTargetTemp(78.0),
            ActorCommand::MashTargetTemp(50.0),
            ActorCommand::StartMashPump(PumpMode::MashDistribution),
        ]
    ));

    let rests = [
        (StageId::Mashing1, 50.0, StageId::Mashing2),
        (StageId::Mashing2, 64.0, StageId::Mashing3),
        (StageId::Mashing3, 68.0, StageId::Mashing4),
        (StageId::Mashing4, 74.0, StageId::WaitForSpargingWater),
    ];
    for (stage, temp, next) in rests {
        assert_eq!(process.stage(), stage);
        assert!(actor.calls().contains(&ActorCommand::MashTargetTemp(temp)));
        process.mash_target_reached(temp);
        assert!(wait_for_stage(&process, next, WAIT), "stuck after {stage}");
    }

    // Boiler has not reached sparging temperature yet.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(process.stage(), StageId::WaitForSpargingWater);
    process.stop();
}

#[test]
fn full_brew_ends_in_reset() {
    let (process, actor) = process_with(fast(0.0001));
    process.start().unwrap();
    process.boil_target_reached(55.0);
    for (stage, temp) in [
        (StageId::Mashing1, 50.0),
        (StageId::Mashing2, 64.0),
        (StageId::Mashing3, 68.0),
        (StageId::Mashing4, 74.0),
    ] {
        assert!(wait_for_stage(&process, stage, WAIT));
        process.mash_target_reached(temp);
    }
    process.boil_target_reached(78.0);
    assert!(wait_for_stage(&process, StageId::Boil, WAIT));
    assert!(actor.calls().contains(&ActorCommand::StopBoilVessel));
    assert!(actor.calls().contains(&ActorCommand::StopMashVessel));

    actor.take();
    process.boil_target_reached(100.0);
    assert!(wait_for_stage(&process, StageId::Initial, WAIT));
    assert_eq!(process.live_timers(), 0);
    assert_eq!(process.status().run_state, RunState::Stopped);
    assert_eq!(actor.take(), shutdown_sequence().collect::<Vec<_>>());
}

#[test]
fn early_sparge_water_skips_the_wait() {
    let (process, _) = process_with(fast(0.001));
    process.advance_to(StageId::Mashing4).unwrap();
    process.boil_target_reached(78.0);
    assert_eq!(process.stage(), StageId::Mashing4);
    process.mash_target_reached(74.0);
    // Circulation lasts 600 ms of wall time at this scale.
    assert!(wait_for_stage(&process, StageId::SpargeCirculateInMash1, WAIT));
    process.stop();
}

// ── Operator commands ─────────────────────────────────────────

#[test]
fn stop_twice_issues_same_shutdown() {
    let (process, actor) = process_with(fast(1.0));
    process.start().unwrap();
    actor.take();
    process.stop();
    let first = actor.take();
    process.stop();
    assert_eq!(first, actor.take());
    assert_eq!(process.stage(), StageId::Initial);
}

#[test]
fn skip_cancels_live_circulation_timer() {
    let (process, actor) = process_with(fast(1.0));
    process.advance_to(StageId::SpargeCirculateInMash1).unwrap();
    assert_eq!(process.live_timers(), 1);
    actor.take();

    process.skip_to_next().unwrap();
    assert_eq!(process.stage(), StageId::SpargeMashToTemp2);
    assert_eq!(
        actor.take(),
        Flow::mash_pump(PumpMode::SpargeDistribution, ValveTarget::Temp)
            .commands()
            .to_vec()
    );
    // Only the new stage's transfer timer remains.
    assert_eq!(process.live_timers(), 1);
    process.stop();
    assert_eq!(process.live_timers(), 0);
}

#[test]
fn skip_while_idle_is_rejected() {
    let (process, actor) = process_with(fast(1.0));
    assert_eq!(
        process.skip_to_next(),
        Err(Error::Stale(StaleEvent::ProcessIdle))
    );
    assert!(actor.calls().is_empty());
}

#[test]
fn pause_holds_the_rest_timer() {
    let (process, _) = process_with(fast(0.001));
    process.advance_to(StageId::Mashing1).unwrap();
    process.mash_target_reached(50.0);
    process.pause();
    assert_eq!(process.status().run_state, RunState::Paused);

    // The 60 s rest is 60 ms of wall time.
    thread::sleep(Duration::from_millis(150));
    assert_eq!(process.stage(), StageId::Mashing1);

    process.resume();
    assert!(wait_for_stage(&process, StageId::Mashing2, WAIT));
    process.stop();
}

#[test]
fn pause_stages_wait_for_operator() {
    let (process, actor) = process_with(BrewConfig {
        pause_enabled: true,
        ..fast(0.0001)
    });
    process.advance_to(StageId::Mashing4).unwrap();
    process.mash_target_reached(74.0);
    assert!(wait_for_stage(&process, StageId::PostMashPause, WAIT));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(process.stage(), StageId::PostMashPause);
    assert!(actor.calls().ends_with(&Flow::default().commands()));

    process.skip_to_next().unwrap();
    assert_eq!(process.stage(), StageId::WaitForSpargingWater);
    process.stop();
}

#[test]
fn advance_by_name_uses_stage_keys() {
    let (process, actor) = process_with(fast(1.0));
    process.advance_to_by_name("boil").unwrap();
    assert_eq!(process.stage(), StageId::Boil);
    assert!(actor.calls().ends_with(&[ActorCommand::BoilTargetTemp(100.0)]));
    process.stop();
}

#[test]
fn late_mash_event_after_stop_is_ignored() {
    let (process, actor) = process_with(fast(1.0));
    process.advance_to(StageId::Mashing2).unwrap();
    process.stop();
    actor.take();
    process.mash_target_reached(64.0);
    assert_eq!(process.live_timers(), 0);
    assert!(actor.calls().is_empty());
}

// ── Sparge water heating ──────────────────────────────────────

fn delayed_heat(time_scale: f64) -> BrewConfig {
    BrewConfig {
        sparge_heat_delay_secs: 60,
        ..fast(time_scale)
    }
}

#[test]
fn delayed_sparge_heat_fires_without_transition() {
    // 60 s delay is 60 ms of wall time; the rest never starts.
    let (process, actor) = process_with(delayed_heat(0.001));
    process.advance_to(StageId::Mashing1).unwrap();
    assert_eq!(process.live_timers(), 1);
    assert_eq!(actor.count(ActorCommand::BoilTargetTemp(78.0)), 0);

    thread::sleep(Duration::from_millis(200));
    assert_eq!(actor.count(ActorCommand::BoilTargetTemp(78.0)), 1);
    assert_eq!(process.stage(), StageId::Mashing1);
    assert_eq!(process.live_timers(), 0);

    // The rest still waits for the mash vessel.
    process.mash_target_reached(50.0);
    assert_eq!(process.live_timers(), 1);
    process.stop();
}

#[test]
fn skip_keeps_pending_sparge_heat() {
    let (process, actor) = process_with(delayed_heat(0.001));
    process.advance_to(StageId::Mashing1).unwrap();
    process.skip_to_next().unwrap();
    assert_eq!(process.stage(), StageId::Mashing2);
    assert_eq!(process.live_timers(), 1);

    thread::sleep(Duration::from_millis(200));
    assert_eq!(actor.count(ActorCommand::BoilTargetTemp(78.0)), 1);
    assert_eq!(process.stage(), StageId::Mashing2);
    process.stop();
}

#[test]
fn advancing_past_first_rest_requests_sparge_water() {
    for stage in [StageId::Mashing2, StageId::Mashing4, StageId::WaitForSpargingWater] {
        let (process, actor) = process_with(fast(1.0));
        process.advance_to(stage).unwrap();
        let calls = actor.take();
        let shutdown: Vec<_> = shutdown_sequence().collect();
        assert!(calls.starts_with(&shutdown));
        assert_eq!(
            calls.iter().filter(|c| **c == ActorCommand::BoilTargetTemp(78.0)).count(),
            1,
            "{stage}: {calls:?}"
        );
        process.stop();
    }
}

#[test]
fn forced_wait_moves_on_once_water_is_hot() {
    let (process, actor) = process_with(fast(1.0));
    process.advance_to(StageId::WaitForSpargingWater).unwrap();
    assert!(actor.calls().ends_with(&[ActorCommand::BoilTargetTemp(78.0)]));
    process.boil_target_reached(78.0);
    assert_eq!(process.stage(), StageId::SpargeMashToTemp1);
    process.stop();
}

#[test]
fn late_sparge_heat_leaves_the_boil_alone() {
    let (process, actor) = process_with(delayed_heat(0.001));
    process.advance_to(StageId::Mashing1).unwrap();
    // Mashing2, 3, 4, the wait, then the first sparge transfer.
    for _ in 0..5 {
        process.skip_to_next().unwrap();
    }
    // Skipped past the wait into sparging; the pending heat start is stale.
    assert!(process.stage() > StageId::WaitForSpargingWater);
    actor.take();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(actor.count(ActorCommand::BoilTargetTemp(78.0)), 0);
    process.stop();
}
