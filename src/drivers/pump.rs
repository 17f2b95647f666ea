//! Relay-switched transfer pump.
//!
//! A pump either runs continuously or cycles work/idle to distribute
//! liquid gently over the grain bed.  Cycling runs on its own thread;
//! every start/stop bumps a generation counter so an older cycler exits
//! instead of fighting the new state.
//!
//! ## Failure contract
//!
//! Relay write errors are logged and otherwise ignored.  The brewing
//! process never sees a pump error.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use log::{debug, error, warn};

use crate::config::Distribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
    Distributing(Distribution),
}

struct PumpCore<P> {
    pin: P,
    state: PumpState,
    relay: bool,
    generation: u64,
}

impl<P: OutputPin> PumpCore<P> {
    fn drive(&mut self, name: &str, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.relay = on,
            Err(e) => warn!("Pump {name}: relay write failed: {e:?}"),
        }
    }
}

struct Shared<P> {
    name: &'static str,
    core: Mutex<PumpCore<P>>,
    wake: Condvar,
}

pub struct Pump<P> {
    shared: Arc<Shared<P>>,
}

impl<P: OutputPin + Send + 'static> Pump<P> {
    pub fn new(name: &'static str, pin: P) -> Self {
        let pump = Self {
            shared: Arc::new(Shared {
                name,
                core: Mutex::new(PumpCore {
                    pin,
                    state: PumpState::Stopped,
                    relay: false,
                    generation: 0,
                }),
                wake: Condvar::new(),
            }),
        };
        pump.lock().drive(name, false);
        pump
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Run until stopped.
    pub fn start(&self) {
        let mut core = self.lock();
        if core.state == PumpState::Running {
            return;
        }
        core.generation += 1;
        core.state = PumpState::Running;
        core.drive(self.shared.name, true);
        self.shared.wake.notify_all();
        debug!("Pump {} started", self.shared.name);
    }

    /// Cycle work/idle.  `time_scale` shortens the cycle in simulation.
    pub fn start_distributing(&self, distribution: Distribution, time_scale: f64) {
        let mut core = self.lock();
        if core.state == PumpState::Distributing(distribution) {
            return;
        }
        core.generation += 1;
        core.state = PumpState::Distributing(distribution);
        let generation = core.generation;
        self.shared.wake.notify_all();
        drop(core);

        let scaled = |secs: u32| {
            Duration::try_from_secs_f64(f64::from(secs) * time_scale).unwrap_or(Duration::ZERO)
        };
        let work = scaled(distribution.work_secs);
        let idle = scaled(distribution.idle_secs);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("pump-{}", self.shared.name))
            .spawn(move || cycle(&shared, generation, work, idle));
        if let Err(e) = spawned {
            error!("Pump {}: cannot start cycling ({e}), running continuously", self.shared.name);
            let mut core = self.lock();
            if core.generation == generation {
                core.drive(self.shared.name, true);
            }
        }
        debug!(
            "Pump {} distributing {}s work / {}s idle",
            self.shared.name, distribution.work_secs, distribution.idle_secs
        );
    }

    /// Stop.  Stopping a stopped pump is a no-op.
    pub fn stop(&self) {
        let mut core = self.lock();
        if core.state == PumpState::Stopped && !core.relay {
            return;
        }
        core.generation += 1;
        core.state = PumpState::Stopped;
        core.drive(self.shared.name, false);
        self.shared.wake.notify_all();
        debug!("Pump {} stopped", self.shared.name);
    }

    pub fn state(&self) -> PumpState {
        self.lock().state
    }

    /// Whether the relay is currently closed.
    pub fn is_pumping(&self) -> bool {
        self.lock().relay
    }

    fn lock(&self) -> MutexGuard<'_, PumpCore<P>> {
        self.shared.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Drop for Pump<P> {
    fn drop(&mut self) {
        // Retire any cycler; the relay is left as is.
        let mut core = self.shared.core.lock().unwrap_or_else(PoisonError::into_inner);
        core.generation += 1;
        self.shared.wake.notify_all();
    }
}

fn cycle<P: OutputPin>(shared: &Shared<P>, generation: u64, work: Duration, idle: Duration) {
    let mut core = shared.core.lock().unwrap_or_else(PoisonError::into_inner);
    let mut on = true;
    loop {
        if core.generation != generation {
            return;
        }
        core.drive(shared.name, on);
        let phase = if on { work } else { idle };
        let deadline = Instant::now() + phase;
        loop {
            let now = Instant::now();
            if core.generation != generation || now >= deadline {
                break;
            }
            core = shared
                .wake
                .wait_timeout(core, deadline - now)
                .map_or_else(|e| e.into_inner().0, |(guard, _)| guard);
        }
        if idle.is_zero() {
            // Nothing to alternate with.
            on = true;
        } else {
            on = !on;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::SimPin;

    #[test]
    fn start_and_stop() {
        let pin = SimPin::new();
        let pump = Pump::new("temp", pin.clone());
        assert!(!pin.is_high());
        pump.start();
        assert!(pin.is_high());
        assert_eq!(pump.state(), PumpState::Running);
        pump.stop();
        pump.stop();
        assert!(!pin.is_high());
        assert_eq!(pump.state(), PumpState::Stopped);
    }

    #[test]
    fn distribution_alternates_relay() {
        let pin = SimPin::new();
        let pump = Pump::new("mash", pin.clone());
        let d = Distribution {
            work_secs: 2,
            idle_secs: 2,
        };
        pump.start_distributing(d, 0.02);
        let mut seen_on = false;
        let mut seen_off = false;
        let until = Instant::now() + Duration::from_millis(500);
        while Instant::now() < until && !(seen_on && seen_off) {
            if pin.is_high() {
                seen_on = true;
            } else {
                seen_off = true;
            }
            thread::sleep(Duration::from_millis(3));
        }
        assert!(seen_on && seen_off);
        pump.stop();
        thread::sleep(Duration::from_millis(100));
        assert!(!pin.is_high());
    }

    #[test]
    fn stop_retires_cycler() {
        let pin = SimPin::new();
        let pump = Pump::new("mash", pin.clone());
        pump.start_distributing(
            Distribution {
                work_secs: 1,
                idle_secs: 1,
            },
            0.01,
        );
        pump.stop();
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(5));
            assert!(!pin.is_high());
        }
    }
}
