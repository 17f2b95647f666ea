//! Closed-loop vessel temperature control.
//!
//! Each heated vessel runs its own loop thread:
//!
//! ```text
//!   every period:  probe ─▶ VesselController::update ─▶ DutyCycleHeater::tick
//!                                  │
//!                                  └─ reached? ─▶ listener(target)   (vessel lock released)
//! ```
//!
//! The controller sits behind an `Arc<Mutex<_>>` so the brewery can change
//! setpoints from its command thread while the loop runs.

pub mod heater;
pub mod pid;
pub mod vessel;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::app::ports::TemperatureProbe;

use heater::DutyCycleHeater;
use vessel::VesselController;

pub type SharedVessel = Arc<Mutex<VesselController>>;

pub fn lock_vessel(vessel: &SharedVessel) -> MutexGuard<'_, VesselController> {
    vessel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running vessel loop.  Dropping it stops the thread and switches the
/// heater off.
pub struct VesselLoop {
    name: &'static str,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl VesselLoop {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for VesselLoop {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                // Dropped from our own listener: the loop sees the flag
                // after the listener returns and exits on its own.
                return;
            }
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

/// Start the control loop for `vessel`.
///
/// `period` is the wall-clock tick; `dt_secs` is the time one tick
/// represents to the PID (they differ under simulation time scaling).
pub fn spawn_vessel_loop<T, P, L>(
    vessel: SharedVessel,
    mut probe: T,
    mut heater: DutyCycleHeater<P>,
    period: Duration,
    dt_secs: f32,
    listener: L,
) -> std::io::Result<VesselLoop>
where
    T: TemperatureProbe + 'static,
    P: OutputPin + Send + 'static,
    L: Fn(f32) + Send + 'static,
{
    let name = lock_vessel(&vessel).name();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name(format!("vessel-{name}"))
        .spawn(move || {
            info!("Vessel loop {name} started, period {:.3}s", period.as_secs_f64());
            let mut next_tick = Instant::now();
            while !stop_flag.load(Ordering::Acquire) {
                let current = probe.read_celsius();
                let (reached, duty) = {
                    let mut v = lock_vessel(&vessel);
                    let reached = v.update(current, dt_secs);
                    (reached, v.duty())
                };
                heater.set_duty(duty);
                heater.tick();

                if let Some(target) = reached {
                    info!("Vessel {name} reached {target:.1}C (reading {current:.1}C)");
                    listener(target);
                }

                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::park_timeout(next_tick - now);
                } else {
                    // Fell behind; do not try to catch up with a burst.
                    next_tick = now;
                }
            }
            heater.off();
            debug!("Vessel loop {name} stopped");
        })?;

    Ok(VesselLoop {
        name,
        stop,
        thread: Some(thread),
    })
}
