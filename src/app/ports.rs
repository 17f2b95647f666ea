//! Port traits: the boundary between the brewing core and the hardware.
//!
//! ```text
//!   BrewProcess ──▶ Actor ──▶ pumps · valves · vessel setpoints
//!   vessel loop ◀── TemperatureProbe
//! ```
//!
//! The process owns no hardware.  Adapters implement these traits; tests
//! implement them with recorders and fixed readings.

use super::commands::ActorCommand;

// ───────────────────────────────────────────────────────────────
// Actor port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the process issues every physical change through here.
///
/// Called with the process lock held, from the caller's thread or a timer
/// thread.  Implementations must not call back into the process and must
/// not block on settle delays; a failing device degrades to a logged
/// warning instead of an error.
pub trait Actor: Send + Sync {
    fn issue(&self, command: ActorCommand);
}

impl<A: Actor + ?Sized> Actor for std::sync::Arc<A> {
    fn issue(&self, command: ActorCommand) {
        (**self).issue(command);
    }
}

// ───────────────────────────────────────────────────────────────
// Temperature probe (hardware → vessel loop)
// ───────────────────────────────────────────────────────────────

/// Read-side port for one vessel thermometer.
pub trait TemperatureProbe: Send {
    /// Current temperature in Celsius.
    fn read_celsius(&mut self) -> f32;
}
