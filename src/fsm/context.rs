//! Inputs and outputs of a stage `on_enter` handler.
//!
//! A handler reads the recipe, the configuration and the sticky
//! sparge-water flag from [`StageContext`] and writes what should happen
//! into its [`StagePlan`]: actor commands in issue order, timers to arm,
//! and whether to fall straight through to the next stage.

use crate::app::commands::{shutdown_sequence, ActorCommand, Flow};
use crate::config::{BrewConfig, TransferMode};
use crate::process::durations::planned_secs;
use crate::recipe::Recipe;

use super::StageId;

// ---------------------------------------------------------------------------
// Timer payloads
// ---------------------------------------------------------------------------

/// Why a process timer was armed; decides what its expiry does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    /// Preparation transfer finished.
    PreboilCycle,
    /// Mash rest finished.
    MashStepDone,
    /// Sparge transfer or circulation finished.
    SpargeStepDone,
    /// Boil finished.
    BoilDone,
    /// Delayed start of sparge-water heating.  Does not transition.
    SpargeHeatStart,
}

impl TimerPurpose {
    /// True if expiry moves the process to another stage.
    pub fn transitions(self) -> bool {
        !matches!(self, Self::SpargeHeatStart)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PreboilCycle => "preboil",
            Self::MashStepDone => "mash",
            Self::SpargeStepDone => "sparge",
            Self::BoilDone => "boil",
            Self::SpargeHeatStart => "sparge-heat",
        }
    }
}

/// A timer the process should arm after the stage is entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerRequest {
    pub purpose: TimerPurpose,
    /// Duration in recipe seconds (before time scaling).
    pub secs: f64,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Side effects requested by a stage handler.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StagePlan {
    pub commands: Vec<ActorCommand>,
    pub timers: Vec<TimerRequest>,
    /// Enter the next stage right away.
    pub fall_through: bool,
}

// ---------------------------------------------------------------------------
// StageContext
// ---------------------------------------------------------------------------

pub struct StageContext<'a> {
    pub stage: StageId,
    pub recipe: &'a Recipe,
    pub config: &'a BrewConfig,
    /// Boiler already reported the sparging temperature.
    pub sparge_ready: bool,
    pub plan: StagePlan,
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: StageId,
        recipe: &'a Recipe,
        config: &'a BrewConfig,
        sparge_ready: bool,
    ) -> Self {
        Self {
            stage,
            recipe,
            config,
            sparge_ready,
            plan: StagePlan::default(),
        }
    }

    pub fn issue(&mut self, command: ActorCommand) {
        self.plan.commands.push(command);
    }

    pub fn set_flow(&mut self, flow: Flow) {
        self.plan.commands.extend(flow.commands());
    }

    /// Heaters, cooling and pumps off.
    pub fn stop_all(&mut self) {
        self.plan.commands.extend(shutdown_sequence());
    }

    pub fn start_timer(&mut self, purpose: TimerPurpose, secs: f64) {
        self.plan.timers.push(TimerRequest { purpose, secs });
    }

    pub fn fall_through(&mut self) {
        self.plan.fall_through = true;
    }

    /// Whether a human performs this stage's transfer.
    pub fn manual_transfer(&self) -> bool {
        self.stage.descriptor().manual_transfer
            && self.config.transfer_mode == TransferMode::Manual
    }

    /// Run `flow` for the stage's planned duration, then expire with
    /// `purpose`.  A manual transfer stops the pumps and waits for the
    /// operator instead.
    pub fn run_timed(&mut self, purpose: TimerPurpose, flow: Flow) {
        if self.manual_transfer() {
            self.set_flow(Flow::default());
            return;
        }
        self.set_flow(flow);
        let secs = planned_secs(self.stage, self.recipe, self.config);
        self.start_timer(purpose, secs);
    }
}
