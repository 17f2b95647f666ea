//! Temperature controller for one heated vessel.
//!
//! ```text
//!  ManualOff ◀── off() ───┐
//!  ManualOn  ◀── on()  ───┼── set_temperature(t) ──▶ Controlled
//!                         │                            │
//!                         │        Heating ──[reached]──▶ Holding
//!                         │           ▲                    │
//!                         └───────────┴─ set_temperature ──┘
//! ```
//!
//! The Heating→Holding edge produces exactly one "target reached" event per
//! setpoint.  `update` returns the event instead of calling a listener, so
//! the caller can notify the process after releasing the vessel lock.

use serde::Serialize;

use crate::config::PidGains;

use super::heater::quantize_duty;
use super::pid::PidController;

/// Setpoint at or above which the vessel is boiling rather than holding.
pub const BOILING_CELSIUS: f32 = 100.0;

/// Overshoot past the setpoint that counts as "reached".
pub const REACHED_MARGIN: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VesselMode {
    ManualOn,
    ManualOff,
    Controlled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeatStatus {
    Heating,
    Holding,
}

/// Point-in-time view of a vessel for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VesselSnapshot {
    pub mode: VesselMode,
    pub status: HeatStatus,
    pub target: f32,
    pub temperature: f32,
    pub duty: u8,
}

pub struct VesselController {
    name: &'static str,
    mode: VesselMode,
    status: HeatStatus,
    target: f32,
    temperature: f32,
    duty: u8,
    pid: PidController,
}

impl VesselController {
    pub fn new(name: &'static str, gains: PidGains) -> Self {
        let mut pid = PidController::new(gains, 0.0);
        pid.set_limits(0.0, 100.0);
        Self {
            name,
            mode: VesselMode::ManualOff,
            status: HeatStatus::Heating,
            target: 0.0,
            temperature: 0.0,
            duty: 0,
            pid,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hold `target`.  Re-arms the reached event.
    pub fn set_temperature(&mut self, target: f32) {
        self.target = target;
        self.status = HeatStatus::Heating;
        self.mode = VesselMode::Controlled;
        self.pid.set_target(target);
    }

    /// Heater forced to full power.
    pub fn on(&mut self) {
        self.mode = VesselMode::ManualOn;
        self.duty = 100;
    }

    /// Heater forced off.
    pub fn off(&mut self) {
        self.mode = VesselMode::ManualOff;
        self.duty = 0;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.pid.set_gains(gains);
    }

    /// One control tick with a fresh reading taken `dt` seconds after the
    /// previous one.  Returns the setpoint when it has just been reached.
    pub fn update(&mut self, current: f32, dt: f32) -> Option<f32> {
        self.temperature = current;
        match self.mode {
            VesselMode::ManualOn => {
                self.duty = 100;
                return None;
            }
            VesselMode::ManualOff => {
                self.duty = 0;
                return None;
            }
            VesselMode::Controlled => {}
        }

        if self.target >= BOILING_CELSIUS {
            // Boiling is sustained at full power, never regulated.
            self.duty = 100;
            if self.status == HeatStatus::Heating && current >= BOILING_CELSIUS {
                self.status = HeatStatus::Holding;
                return Some(self.target);
            }
            return None;
        }

        let mut reached = None;
        if self.status == HeatStatus::Heating && current >= self.target + REACHED_MARGIN {
            self.status = HeatStatus::Holding;
            reached = Some(self.target);
        }
        self.duty = quantize_duty(self.pid.compute(current, dt));
        reached
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn mode(&self) -> VesselMode {
        self.mode
    }

    pub fn status(&self) -> HeatStatus {
        self.status
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn snapshot(&self) -> VesselSnapshot {
        VesselSnapshot {
            mode: self.mode,
            status: self.status,
            target: self.target,
            temperature: self.temperature,
            duty: self.duty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vessel() -> VesselController {
        VesselController::new(
            "mash",
            PidGains {
                kp: 10.0,
                ki: 0.05,
                kd: 2.0,
            },
        )
    }

    #[test]
    fn reached_fires_once_per_setpoint() {
        let mut v = vessel();
        v.set_temperature(70.0);
        assert_eq!(v.update(70.6, 1.0), Some(70.0));
        assert_eq!(v.status(), HeatStatus::Holding);
        assert_eq!(v.update(70.6, 1.0), None);
        assert_eq!(v.update(71.0, 1.0), None);
    }

    #[test]
    fn just_below_margin_keeps_heating() {
        let mut v = vessel();
        v.set_temperature(70.0);
        assert_eq!(v.update(70.4, 1.0), None);
        assert_eq!(v.status(), HeatStatus::Heating);
    }

    #[test]
    fn new_setpoint_rearms() {
        let mut v = vessel();
        v.set_temperature(50.0);
        assert_eq!(v.update(51.0, 1.0), Some(50.0));
        v.set_temperature(64.0);
        assert_eq!(v.status(), HeatStatus::Heating);
        assert_eq!(v.update(60.0, 1.0), None);
        assert_eq!(v.update(64.5, 1.0), Some(64.0));
    }

    #[test]
    fn boiling_always_full_power() {
        let mut v = vessel();
        v.set_temperature(100.0);
        assert_eq!(v.update(20.0, 1.0), None);
        assert_eq!(v.duty(), 100);
        assert_eq!(v.update(100.0, 1.0), Some(100.0));
        assert_eq!(v.update(101.0, 1.0), None);
        assert_eq!(v.duty(), 100);
    }

    #[test]
    fn cold_vessel_heats_at_full_power() {
        let mut v = vessel();
        v.set_temperature(64.0);
        v.update(20.0, 1.0);
        assert_eq!(v.duty(), 100);
    }

    #[test]
    fn hot_vessel_heater_off() {
        let mut v = vessel();
        v.set_temperature(64.0);
        v.update(80.0, 1.0);
        assert_eq!(v.duty(), 0);
    }

    #[test]
    fn manual_modes_bypass_pid() {
        let mut v = vessel();
        v.on();
        assert_eq!(v.update(99.0, 1.0), None);
        assert_eq!(v.duty(), 100);
        v.off();
        assert_eq!(v.update(10.0, 1.0), None);
        assert_eq!(v.duty(), 0);
        assert_eq!(v.mode(), VesselMode::ManualOff);
    }
}
