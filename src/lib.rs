//! Mashline brewery controller library.
//!
//! Sequences a three-vessel brew (mash tun, temporary vessel, boiler)
//! through mashing, sparging and boiling.  The process core is pure logic
//! behind the [`app::ports::Actor`] port; the adapters wire it to relays,
//! thermometers and PID-controlled heaters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod process;
pub mod recipe;
pub mod timer;

pub use config::{BrewConfig, ConfigSnapshot};
pub use error::{Error, Result};
pub use fsm::StageId;
pub use process::{BrewProcess, ProcessHandle, ProcessStatus, RunState};
pub use recipe::{MashStep, Recipe};
