//! Two-way valve on a single relay.
//!
//! The relay de-energised sends liquid one way, energised the other.  Each
//! direction carries a name from the brewery wiring (e.g. `"mashtun"` and
//! `"temporary"`); callers address directions by variant or by name.
//!
//! Switching blocks the calling thread for the settle time.  Only the
//! brewery's command thread calls this, never the process.

use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::error::{ConfigurationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveDirection {
    /// Relay off.
    Released,
    /// Relay on.
    Energised,
}

pub struct TwoWayValve<P: OutputPin> {
    name: &'static str,
    pin: P,
    /// Direction names, indexed by `[Released, Energised]`.
    names: [&'static str; 2],
    direction: Option<ValveDirection>,
    settle: Duration,
}

impl<P: OutputPin> TwoWayValve<P> {
    pub fn new(
        name: &'static str,
        pin: P,
        released: &'static str,
        energised: &'static str,
        settle: Duration,
    ) -> Self {
        Self {
            name,
            pin,
            names: [released, energised],
            direction: None,
            settle,
        }
    }

    pub fn set_settle_time(&mut self, settle: Duration) {
        self.settle = settle;
    }

    /// Look up a direction by its wiring name.
    pub fn direction_named(&self, name: &str) -> Result<ValveDirection> {
        if name == self.names[0] {
            Ok(ValveDirection::Released)
        } else if name == self.names[1] {
            Ok(ValveDirection::Energised)
        } else {
            Err(ConfigurationError::UnknownValveDirection.into())
        }
    }

    pub fn direction_name(&self) -> Option<&'static str> {
        self.direction.map(|d| match d {
            ValveDirection::Released => self.names[0],
            ValveDirection::Energised => self.names[1],
        })
    }

    pub fn direction(&self) -> Option<ValveDirection> {
        self.direction
    }

    /// Move the valve and wait for it to settle.  Returns whether it moved;
    /// asking for the current direction is a no-op.
    pub fn set_direction(&mut self, direction: ValveDirection) -> bool {
        if self.direction == Some(direction) {
            return false;
        }
        let result = match direction {
            ValveDirection::Released => self.pin.set_low(),
            ValveDirection::Energised => self.pin.set_high(),
        };
        if let Err(e) = result {
            warn!("Valve {}: relay write failed: {e:?}", self.name);
            return false;
        }
        self.direction = Some(direction);
        debug!(
            "Valve {} -> {}, settling {:.3}s",
            self.name,
            self.direction_name().unwrap_or("?"),
            self.settle.as_secs_f64()
        );
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        true
    }

    pub fn set_direction_by_name(&mut self, name: &str) -> Result<bool> {
        let direction = self.direction_named(name)?;
        Ok(self.set_direction(direction))
    }
}
