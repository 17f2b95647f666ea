//! Process driving the simulated brewery: commands flow to relays and
//! vessel loops feed target-reached events back.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mashline::adapters::brewery::Brewery;
use mashline::adapters::sim::SimRig;
use mashline::control::vessel::VesselMode;
use mashline::{BrewConfig, BrewProcess, ConfigSnapshot, StageId};

use crate::mock_actor::scenario_recipe;

fn sim_config() -> ConfigSnapshot {
    ConfigSnapshot::new(BrewConfig {
        time_scale: 0.001,
        valve_settle_secs: 0,
        ..BrewConfig::default()
    })
    .unwrap()
}

fn wait_until(within: Duration, what: impl Fn() -> bool) -> bool {
    let until = Instant::now() + within;
    while Instant::now() < until {
        if what() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    what()
}

#[test]
fn simulated_kettles_carry_the_brew_into_mashing() {
    let config = sim_config();
    let rig = SimRig::new(&config);
    let boil_heater = rig.pins.boil_heater.clone();
    let mash_pump = rig.pins.mash_pump.clone();
    let brewery = Arc::new(
        Brewery::new(rig.pins, rig.mash_kettle, rig.boil_kettle, config.clone()).unwrap(),
    );
    let process = BrewProcess::new(scenario_recipe(), config, Arc::clone(&brewery)).unwrap();
    brewery.attach(process.handle());

    process.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || boil_heater.is_high()));
    assert!(wait_until(Duration::from_secs(2), || brewery.boil_vessel().target == 55.0));

    // Boiler heats 35 degrees, then two short transfers.
    assert!(wait_until(Duration::from_secs(20), || process.stage() == StageId::Mashing1));
    assert!(wait_until(Duration::from_secs(2), || {
        let mash = brewery.mash_vessel();
        mash.mode == VesselMode::Controlled && mash.target == 50.0
    }));
    assert_eq!(brewery.boil_vessel().target, 78.0);

    // Distribution cycles the mash pump while the mash tun heats.
    assert!(wait_until(Duration::from_secs(2), || mash_pump.is_high()));

    // Mash kettle reaches 50 C, then the one-minute rest runs.
    assert!(wait_until(Duration::from_secs(20), || process.stage() == StageId::Mashing2));
    process.stop();
    assert!(wait_until(Duration::from_secs(2), || {
        brewery.mash_vessel().mode == VesselMode::ManualOff
            && brewery.boil_vessel().mode == VesselMode::ManualOff
    }));
}

#[test]
fn reload_reaches_process_and_brewery() {
    let config = sim_config();
    let rig = SimRig::new(&config);
    let brewery = Arc::new(
        Brewery::new(rig.pins, rig.mash_kettle, rig.boil_kettle, config.clone()).unwrap(),
    );
    let process = BrewProcess::new(scenario_recipe(), config, Arc::clone(&brewery)).unwrap();
    let before = process.status().process_remaining_secs;

    let updated = ConfigSnapshot::new(BrewConfig {
        sparging_circulate_secs: 300,
        ..sim_config().config().clone()
    })
    .unwrap();
    brewery.reload(updated.clone());
    process.reload(updated.clone());
    assert_eq!(process.config().version(), updated.version());
    assert!((before - process.status().process_remaining_secs - 600.0).abs() < 1e-6);
}
