//! Unified error types for the brewery controller.
//!
//! Two categories matter to the process core and must never be mixed:
//!
//! - [`ConfigurationError`]: a defect in the stage graph, recipe or
//!   configuration.  Propagated to the caller; inside callbacks it halts
//!   the process.
//! - [`StaleEvent`]: a timer or temperature event that lost a race with a
//!   transition.  Logged and ignored at the callback entry points.
//!
//! All variants are `Copy` so they can be passed across the timer and
//! vessel threads without allocation.

use core::fmt;

use crate::fsm::StageId;
use crate::timer::TimerState;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Defect in the recipe, configuration or stage graph.
    Configuration(ConfigurationError),
    /// Event arrived after the process moved past the relevant stage.
    Stale(StaleEvent),
    /// A timer was driven through an illegal lifecycle transition.
    Timer(TimerError),
    /// A process control operation was rejected.
    Process(ProcessError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::Stale(e) => write!(f, "stale event: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Process(e) => write!(f, "process: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for the benign race category that callers may swallow.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigurationError {
    /// The initial stage is not a valid target for `enter_stage`.
    InitialStageEntered,
    /// A mash stage was entered for a step the recipe does not define.
    MashStepOutOfRange { step: u8, defined: usize },
    /// No stage is registered under the requested name.
    UnknownStage,
    /// A valve was asked to point at a direction it does not know.
    UnknownValveDirection,
    /// Recipe failed validation.
    InvalidRecipe(&'static str),
    /// Configuration failed validation.
    InvalidConfig(&'static str),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialStageEntered => write!(f, "initial stage is not a valid stage to enter"),
            Self::MashStepOutOfRange { step, defined } => {
                write!(f, "mash step {step} is not defined in recipe ({defined} steps)")
            }
            Self::UnknownStage => write!(f, "unknown stage name"),
            Self::UnknownValveDirection => write!(f, "unknown valve direction"),
            Self::InvalidRecipe(msg) => write!(f, "invalid recipe: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

// ---------------------------------------------------------------------------
// Stale events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleEvent {
    /// Process sits in the initial stage.
    ProcessIdle,
    /// Timer was cancelled or already removed from the live set.
    TimerNotLive,
    /// Event was meant for a stage the process already left.
    StageMismatch { expected: StageId, actual: StageId },
    /// The current stage does not wait for this event.
    NotAwaited(StageId),
    /// An equivalent timer is already running for this stage.
    Duplicate,
}

impl fmt::Display for StaleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessIdle => write!(f, "process is idle"),
            Self::TimerNotLive => write!(f, "timer is no longer live"),
            Self::StageMismatch { expected, actual } => {
                write!(f, "expected stage {expected:?}, process is in {actual:?}")
            }
            Self::NotAwaited(stage) => write!(f, "stage {stage:?} is not waiting for this event"),
            Self::Duplicate => write!(f, "duplicate event"),
        }
    }
}

impl From<StaleEvent> for Error {
    fn from(e: StaleEvent) -> Self {
        Self::Stale(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// `start()` is only legal from `Created`.
    NotCreated(TimerState),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCreated(state) => write!(f, "cannot start timer in state {state:?}"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Process errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// `start()` requires the process to be in the initial stage.
    AlreadyRunning(StageId),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning(stage) => write!(f, "process already running in {stage:?}"),
        }
    }
}

impl From<ProcessError> for Error {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
