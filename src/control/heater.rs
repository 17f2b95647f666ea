//! Relay heater with a ten-step duty cycle.
//!
//! A relay cannot dim, so power is approximated over a repeating window of
//! ten ticks: at 30% the relay is on for the first three ticks and off for
//! the remaining seven.
//!
//! ```text
//!   duty 30%   ███░░░░░░░ ███░░░░░░░ ███░░░░░░░
//!   tick        1........10 1........10
//! ```

use embedded_hal::digital::OutputPin;
use log::warn;

/// Ticks in one duty window.
pub const DUTY_WINDOW_TICKS: u8 = 10;

/// Round a percentage to the nearest of the ten duty levels.
pub fn quantize_duty(percent: f32) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    let clamped = percent.clamp(0.0, 100.0);
    ((clamped / 10.0).round() as u8) * 10
}

/// Whether the relay is on at `cycle` (1-based position in the window).
pub fn relay_on(duty: u8, cycle: u8) -> bool {
    cycle <= duty.min(100) / DUTY_WINDOW_TICKS
}

pub struct DutyCycleHeater<P: OutputPin> {
    pin: P,
    duty: u8,
    cycle: u8,
    relay: bool,
}

impl<P: OutputPin> DutyCycleHeater<P> {
    pub fn new(pin: P) -> Self {
        let mut heater = Self {
            pin,
            duty: 0,
            cycle: 0,
            relay: true,
        };
        heater.drive(false);
        heater
    }

    /// Set power in percent, rounded down to a multiple of ten.
    pub fn set_duty(&mut self, percent: u8) {
        self.duty = (percent.min(100) / DUTY_WINDOW_TICKS) * DUTY_WINDOW_TICKS;
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Advance one tick and drive the relay.  Returns the relay state.
    pub fn tick(&mut self) -> bool {
        self.cycle = if self.cycle >= DUTY_WINDOW_TICKS {
            1
        } else {
            self.cycle + 1
        };
        let on = relay_on(self.duty, self.cycle);
        self.drive(on);
        on
    }

    pub fn off(&mut self) {
        self.duty = 0;
        self.drive(false);
    }

    pub fn is_on(&self) -> bool {
        self.relay
    }

    fn drive(&mut self, on: bool) {
        if on == self.relay {
            return;
        }
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.relay = on,
            Err(e) => warn!("Heater relay write failed: {e:?}"),
        }
    }
}
