//! Outbound commands from the brewing process to the hardware.
//!
//! The process never touches a pump or a heater directly.  It issues
//! [`ActorCommand`]s through the [`Actor`](super::ports::Actor) port and
//! the hardware-facing adapter decides how to carry them out.

use core::fmt;

/// How the mash pump should run once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    /// Run until stopped.
    Continuous,
    /// Work/idle cycling while circulating over the mash.
    MashDistribution,
    /// Work/idle cycling while sparging.
    SpargeDistribution,
}

/// Where a directional valve sends the liquid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveTarget {
    Mash,
    Temp,
}

/// Every physical change the process can request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActorCommand {
    StopMashPump,
    StartMashPump(PumpMode),
    StopTempPump,
    StartTempPump,
    StopBoilPump,
    StartBoilPump,
    SetMashValve(ValveTarget),
    SetBoilValve(ValveTarget),
    /// Mash vessel setpoint (Celsius).
    MashTargetTemp(f32),
    /// Boil vessel setpoint (Celsius).  100 or more means boiling.
    BoilTargetTemp(f32),
    StopMashVessel,
    StopBoilVessel,
    EngageCooling,
    DisengageCooling,
    /// Release a hop arm, numbered from 1.
    ReleaseHopArm(u8),
}

impl fmt::Display for ActorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopMashPump => write!(f, "STOP_MASH_PUMP"),
            Self::StartMashPump(mode) => write!(f, "START_MASH_PUMP({mode:?})"),
            Self::StopTempPump => write!(f, "STOP_TEMP_PUMP"),
            Self::StartTempPump => write!(f, "START_TEMP_PUMP"),
            Self::StopBoilPump => write!(f, "STOP_BOIL_PUMP"),
            Self::StartBoilPump => write!(f, "START_BOIL_PUMP"),
            Self::SetMashValve(t) => write!(f, "SET_MASH_VALVE({t:?})"),
            Self::SetBoilValve(t) => write!(f, "SET_BOIL_VALVE({t:?})"),
            Self::MashTargetTemp(c) => write!(f, "MASH_TARGET_TEMP({c:.1})"),
            Self::BoilTargetTemp(c) => write!(f, "BOIL_TARGET_TEMP({c:.1})"),
            Self::StopMashVessel => write!(f, "STOP_MASH_VESSEL"),
            Self::StopBoilVessel => write!(f, "STOP_BOIL_VESSEL"),
            Self::EngageCooling => write!(f, "ENGAGE_COOLING"),
            Self::DisengageCooling => write!(f, "DISENGAGE_COOLING"),
            Self::ReleaseHopArm(arm) => write!(f, "RELEASE_HOP_ARM({arm})"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Flow: the pump/valve layout of a stage
// ───────────────────────────────────────────────────────────────

/// Pump and valve arrangement requested by a stage.
///
/// The default is the safe layout: every pump off, both valves toward
/// the mash vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub mash_pump: Option<PumpMode>,
    pub temp_pump: bool,
    pub boil_pump: bool,
    pub mash_valve: ValveTarget,
    pub boil_valve: ValveTarget,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            mash_pump: None,
            temp_pump: false,
            boil_pump: false,
            mash_valve: ValveTarget::Mash,
            boil_valve: ValveTarget::Mash,
        }
    }
}

impl Flow {
    /// Number of commands emitted by [`Flow::commands`].
    pub const COMMAND_COUNT: usize = 8;

    /// Mash pump running in `mode`, everything else at rest.
    pub fn mash_pump(mode: PumpMode, valve: ValveTarget) -> Self {
        Self {
            mash_pump: Some(mode),
            mash_valve: valve,
            ..Self::default()
        }
    }

    pub fn temp_pump() -> Self {
        Self {
            temp_pump: true,
            ..Self::default()
        }
    }

    pub fn boil_pump(valve: ValveTarget) -> Self {
        Self {
            boil_pump: true,
            boil_valve: valve,
            ..Self::default()
        }
    }

    /// Command sequence realising this layout.
    ///
    /// Always: all three pumps off, then both valves, then each pump
    /// started or stopped.  Valves never move under a running pump.
    pub fn commands(&self) -> [ActorCommand; Self::COMMAND_COUNT] {
        [
            ActorCommand::StopMashPump,
            ActorCommand::StopTempPump,
            ActorCommand::StopBoilPump,
            ActorCommand::SetMashValve(self.mash_valve),
            ActorCommand::SetBoilValve(self.boil_valve),
            match self.mash_pump {
                Some(mode) => ActorCommand::StartMashPump(mode),
                None => ActorCommand::StopMashPump,
            },
            if self.temp_pump {
                ActorCommand::StartTempPump
            } else {
                ActorCommand::StopTempPump
            },
            if self.boil_pump {
                ActorCommand::StartBoilPump
            } else {
                ActorCommand::StopBoilPump
            },
        ]
    }
}

/// Everything off: cooling, both heaters, then the idle flow.
pub fn shutdown_sequence() -> impl Iterator<Item = ActorCommand> {
    [
        ActorCommand::DisengageCooling,
        ActorCommand::StopMashVessel,
        ActorCommand::StopBoilVessel,
    ]
    .into_iter()
    .chain(Flow::default().commands())
}
