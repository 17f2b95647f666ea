//! Brewery adapter: the [`Actor`] behind a real (or simulated) brewery.
//!
//! ```text
//!   BrewProcess ──issue──▶ Brewery ──mpsc──▶ dispatcher thread
//!                                              ├─ pumps (mash / temp / boil)
//!                                              ├─ valves (mash / boil, settle delay)
//!                                              └─ vessel setpoints
//!   vessel loops ──reached──▶ ProcessHandle ──▶ BrewProcess
//! ```
//!
//! `issue` only enqueues, so the process never waits for a valve to settle
//! while holding its lock.  Commands are applied strictly in issue order.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::app::commands::{ActorCommand, PumpMode, ValveTarget};
use crate::app::ports::{Actor, TemperatureProbe};
use crate::config::ConfigSnapshot;
use crate::control::heater::DutyCycleHeater;
use crate::control::vessel::{VesselController, VesselSnapshot};
use crate::control::{lock_vessel, spawn_vessel_loop, SharedVessel, VesselLoop};
use crate::drivers::pump::Pump;
use crate::drivers::valve::TwoWayValve;
use crate::process::ProcessHandle;

/// Valve direction towards the mash tun (relay off).
pub const MASHTUN: &str = "mashtun";
/// Valve direction towards the temporary vessel (relay on).
pub const TEMPORARY: &str = "temporary";

/// Relay outputs of one brewery.
pub struct BreweryPins<P> {
    pub mash_pump: P,
    pub temp_pump: P,
    pub boil_pump: P,
    pub mash_valve: P,
    pub boil_valve: P,
    pub mash_heater: P,
    pub boil_heater: P,
}

enum DispatchMsg {
    Command(ActorCommand),
    Reload(ConfigSnapshot),
}

pub struct Brewery {
    tx: Option<Sender<DispatchMsg>>,
    mash_vessel: SharedVessel,
    boil_vessel: SharedVessel,
    process: Arc<OnceLock<ProcessHandle>>,
    loops: Vec<VesselLoop>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Brewery {
    /// Wire up the devices and start both vessel loops and the dispatcher.
    pub fn new<P, M, B>(
        pins: BreweryPins<P>,
        mash_probe: M,
        boil_probe: B,
        config: ConfigSnapshot,
    ) -> std::io::Result<Self>
    where
        P: OutputPin + Send + 'static,
        M: TemperatureProbe + 'static,
        B: TemperatureProbe + 'static,
    {
        let mash_vessel: SharedVessel = Arc::new(Mutex::new(VesselController::new("mash", config.pid)));
        let boil_vessel: SharedVessel = Arc::new(Mutex::new(VesselController::new("boil", config.pid)));
        let process: Arc<OnceLock<ProcessHandle>> = Arc::new(OnceLock::new());

        let period = scaled(config.control_period_secs, config.time_scale);
        let dt = config.control_period_secs as f32;

        let mash_events = Arc::clone(&process);
        let mash_loop = spawn_vessel_loop(
            Arc::clone(&mash_vessel),
            mash_probe,
            DutyCycleHeater::new(pins.mash_heater),
            period,
            dt,
            move |t| {
                if let Some(process) = mash_events.get() {
                    process.mash_target_reached(t);
                }
            },
        )?;
        let boil_events = Arc::clone(&process);
        let boil_loop = spawn_vessel_loop(
            Arc::clone(&boil_vessel),
            boil_probe,
            DutyCycleHeater::new(pins.boil_heater),
            period,
            dt,
            move |t| {
                if let Some(process) = boil_events.get() {
                    process.boil_target_reached(t);
                }
            },
        )?;

        let settle = scaled(f64::from(config.valve_settle_secs), config.time_scale);
        let devices = Devices {
            mash_pump: Pump::new("mash", pins.mash_pump),
            temp_pump: Pump::new("temp", pins.temp_pump),
            boil_pump: Pump::new("boil", pins.boil_pump),
            mash_valve: TwoWayValve::new("mash", pins.mash_valve, MASHTUN, TEMPORARY, settle),
            boil_valve: TwoWayValve::new("boil", pins.boil_valve, MASHTUN, TEMPORARY, settle),
            mash_vessel: Arc::clone(&mash_vessel),
            boil_vessel: Arc::clone(&boil_vessel),
            config,
        };
        let (tx, rx) = mpsc::channel();
        let dispatcher = thread::Builder::new()
            .name("brewery".into())
            .spawn(move || dispatch(devices, rx))?;

        Ok(Self {
            tx: Some(tx),
            mash_vessel,
            boil_vessel,
            process,
            loops: vec![mash_loop, boil_loop],
            dispatcher: Some(dispatcher),
        })
    }

    /// Route vessel events to `process`.  Only the first handle sticks.
    pub fn attach(&self, process: ProcessHandle) {
        if self.process.set(process).is_err() {
            warn!("Brewery already attached to a process");
        }
    }

    /// Apply new PID gains, settle time and pump timing.  The vessel loop
    /// period is fixed at construction.
    pub fn reload(&self, config: ConfigSnapshot) {
        lock_vessel(&self.mash_vessel).set_gains(config.pid);
        lock_vessel(&self.boil_vessel).set_gains(config.pid);
        self.send(DispatchMsg::Reload(config));
    }

    pub fn mash_vessel(&self) -> VesselSnapshot {
        lock_vessel(&self.mash_vessel).snapshot()
    }

    pub fn boil_vessel(&self) -> VesselSnapshot {
        lock_vessel(&self.boil_vessel).snapshot()
    }

    fn send(&self, msg: DispatchMsg) {
        let sent = self.tx.as_ref().map(|tx| tx.send(msg).is_ok());
        if sent != Some(true) {
            warn!("Brewery dispatcher gone, dropping message");
        }
    }
}

impl Actor for Brewery {
    fn issue(&self, command: ActorCommand) {
        self.send(DispatchMsg::Command(command));
    }
}

impl Drop for Brewery {
    fn drop(&mut self) {
        // Closing the channel lets the dispatcher drain and exit.
        self.tx.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
        for vessel_loop in self.loops.drain(..) {
            debug!("Stopping vessel loop {}", vessel_loop.name());
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

struct Devices<P: OutputPin> {
    mash_pump: Pump<P>,
    temp_pump: Pump<P>,
    boil_pump: Pump<P>,
    mash_valve: TwoWayValve<P>,
    boil_valve: TwoWayValve<P>,
    mash_vessel: SharedVessel,
    boil_vessel: SharedVessel,
    config: ConfigSnapshot,
}

fn dispatch<P: OutputPin + Send + 'static>(mut devices: Devices<P>, rx: Receiver<DispatchMsg>) {
    debug!("Brewery dispatcher started");
    while let Ok(msg) = rx.recv() {
        match msg {
            DispatchMsg::Command(command) => devices.apply(command),
            DispatchMsg::Reload(config) => devices.reload(config),
        }
    }
    devices.mash_pump.stop();
    devices.temp_pump.stop();
    devices.boil_pump.stop();
    debug!("Brewery dispatcher stopped");
}

fn direction_name(target: ValveTarget) -> &'static str {
    match target {
        ValveTarget::Mash => MASHTUN,
        ValveTarget::Temp => TEMPORARY,
    }
}

fn scaled(secs: f64, time_scale: f64) -> Duration {
    Duration::try_from_secs_f64(secs * time_scale).unwrap_or(Duration::ZERO)
}

impl<P: OutputPin + Send + 'static> Devices<P> {
    fn apply(&mut self, command: ActorCommand) {
        debug!("Brewery: {command}");
        match command {
            ActorCommand::StopMashPump => self.mash_pump.stop(),
            ActorCommand::StartMashPump(mode) => {
                let distribution = match mode {
                    PumpMode::Continuous => {
                        self.mash_pump.start();
                        return;
                    }
                    PumpMode::MashDistribution => self.config.mash_distribution,
                    PumpMode::SpargeDistribution => self.config.sparge_distribution,
                };
                self.mash_pump
                    .start_distributing(distribution, self.config.time_scale);
            }
            ActorCommand::StopTempPump => self.temp_pump.stop(),
            ActorCommand::StartTempPump => self.temp_pump.start(),
            ActorCommand::StopBoilPump => self.boil_pump.stop(),
            ActorCommand::StartBoilPump => self.boil_pump.start(),
            ActorCommand::SetMashValve(target) => {
                if let Err(e) = self.mash_valve.set_direction_by_name(direction_name(target)) {
                    warn!("Mash valve: {e}");
                }
            }
            ActorCommand::SetBoilValve(target) => {
                if let Err(e) = self.boil_valve.set_direction_by_name(direction_name(target)) {
                    warn!("Boil valve: {e}");
                }
            }
            ActorCommand::MashTargetTemp(t) => lock_vessel(&self.mash_vessel).set_temperature(t),
            ActorCommand::BoilTargetTemp(t) => lock_vessel(&self.boil_vessel).set_temperature(t),
            ActorCommand::StopMashVessel => lock_vessel(&self.mash_vessel).off(),
            ActorCommand::StopBoilVessel => lock_vessel(&self.boil_vessel).off(),
            ActorCommand::EngageCooling => info!("Cooling engaged"),
            ActorCommand::DisengageCooling => info!("Cooling disengaged"),
            ActorCommand::ReleaseHopArm(arm) => info!("Releasing hop arm {arm}"),
        }
    }

    fn reload(&mut self, config: ConfigSnapshot) {
        let settle = scaled(f64::from(config.valve_settle_secs), config.time_scale);
        self.mash_valve.set_settle_time(settle);
        self.boil_valve.set_settle_time(settle);
        info!("Brewery reloaded configuration version {}", config.version());
        self.config = config;
    }
}
