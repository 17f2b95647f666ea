//! PID controller for vessel heater power.
//!
//! Output is heater duty in percent.  The integral term stops winding up
//! while the output is saturated, which matters for a kettle that spends
//! most of a heat-up pinned at 100%.

use crate::config::PidGains;

pub struct PidController {
    gains: PidGains,
    setpoint: f32,
    integral: f32,
    prev_error: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(gains: PidGains, setpoint: f32) -> Self {
        Self {
            gains,
            setpoint,
            integral: 0.0,
            prev_error: None,
            output_min: 0.0,
            output_max: 100.0,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    /// Change the setpoint and forget accumulated state.
    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
        self.reset();
    }

    pub fn target(&self) -> f32 {
        self.setpoint
    }

    /// Compute the clamped output for `measurement` after `dt` seconds.
    pub fn compute(&mut self, measurement: f32, dt: f32) -> f32 {
        let error = self.setpoint - measurement;

        let p = self.gains.kp * error;

        self.integral += error * dt;
        let i = self.gains.ki * self.integral;

        // No derivative kick on the first sample after a reset.
        let d = match self.prev_error {
            Some(prev) if dt > 0.0 => self.gains.kd * (error - prev) / dt,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        let raw = p + i + d;
        let output = if raw.is_nan() {
            self.output_min
        } else {
            raw.clamp(self.output_min, self.output_max)
        };

        // Anti-windup: undo this step's integration while saturated.
        if output >= self.output_max || output <= self.output_min {
            self.integral -= error * dt;
        }

        output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> PidGains {
        PidGains {
            kp: 10.0,
            ki: 0.05,
            kd: 2.0,
        }
    }

    #[test]
    fn cold_vessel_saturates_high() {
        let mut pid = PidController::new(gains(), 70.0);
        assert_eq!(pid.compute(20.0, 1.0), 100.0);
    }

    #[test]
    fn overshoot_saturates_low() {
        let mut pid = PidController::new(gains(), 70.0);
        assert_eq!(pid.compute(80.0, 1.0), 0.0);
    }

    #[test]
    fn near_target_is_proportional() {
        let mut pid = PidController::new(
            PidGains {
                kp: 10.0,
                ki: 0.0,
                kd: 0.0,
            },
            70.0,
        );
        let out = pid.compute(67.0, 1.0);
        assert!((out - 30.0).abs() < 1e-4);
    }

    #[test]
    fn integral_does_not_wind_up_while_saturated() {
        let mut pid = PidController::new(gains(), 70.0);
        for _ in 0..1000 {
            pid.compute(20.0, 1.0);
        }
        // At the setpoint the output must not stay pinned by a huge integral.
        let out = pid.compute(70.0, 1.0);
        assert!(out < 100.0);
    }

    #[test]
    fn set_target_resets_state() {
        let mut pid = PidController::new(gains(), 70.0);
        pid.compute(69.0, 1.0);
        pid.set_target(50.0);
        assert_eq!(pid.target(), 50.0);
        assert_eq!(pid.compute(80.0, 1.0), 0.0);
    }
}
