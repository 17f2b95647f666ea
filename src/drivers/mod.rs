//! Relay-backed actuator drivers.
//!
//! Drivers are generic over an `embedded-hal` [`OutputPin`](embedded_hal::digital::OutputPin)
//! so the same code runs against GPIO relays and the simulation pins.

pub mod pump;
pub mod valve;
