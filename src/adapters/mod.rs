//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter   | Implements         | Connects to                         |
//! |-----------|--------------------|-------------------------------------|
//! | `brewery` | Actor              | relay pumps, valves, vessel loops   |
//! | `sim`     | OutputPin          | in-memory relay level               |
//! |           | TemperatureProbe   | first-order kettle model            |

pub mod brewery;
pub mod sim;
