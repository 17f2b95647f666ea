//! Application boundary: the vocabulary between process and hardware.
//!
//! [`commands`] lists what the process may ask of the brewery; [`ports`]
//! holds the traits adapters implement.  Nothing here performs I/O.

pub mod commands;
pub mod ports;
