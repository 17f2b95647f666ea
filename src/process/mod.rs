//! Brew process state machine.
//!
//! [`BrewProcess`] owns the current stage, the live timer set and the
//! configuration snapshot, all behind one mutex.  Three kinds of event
//! drive it, from any thread:
//!
//! ```text
//!   operator ── start/stop/pause/resume/advance_to/skip_to_next ──┐
//!   timers   ── expiry (PreboilCycle, MashStepDone, …) ───────────┼─▶ lock ─▶ enter_stage ─▶ Actor
//!   vessels  ── mash_target_reached / boil_target_reached ────────┘
//! ```
//!
//! Every event is checked against the current stage under the lock.  An
//! event that lost a race with a transition is a [`StaleEvent`]: logged
//! and dropped.  A [`ConfigurationError`] raised inside a callback halts
//! the process (full stop/reset).
//!
//! Lock order is always process lock, then a timer's own lock.  Timer
//! callbacks run without their timer lock held, so a callback may take the
//! process lock and cancel other timers freely.

pub mod durations;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::app::commands::{shutdown_sequence, ActorCommand};
use crate::app::ports::Actor;
use crate::config::ConfigSnapshot;
use crate::error::{ConfigurationError, Error, ProcessError, Result, StaleEvent};
use crate::fsm::context::{StageContext, TimerPurpose, TimerRequest};
use crate::fsm::{next_stage, StageId};
use crate::recipe::Recipe;
use crate::timer::{PausableTimer, TimerId};

use durations::StageDurations;

/// Tolerance when matching a reached boiler temperature to the sparging
/// temperature.
const SPARGE_TEMP_TOLERANCE: f32 = 0.01;

// ───────────────────────────────────────────────────────────────
// Status
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Snapshot returned by [`BrewProcess::status`].
///
/// Remaining times are in recipe seconds and stay frozen while paused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStatus {
    pub run_state: RunState,
    pub stage: StageId,
    pub stage_name: &'static str,
    pub stage_remaining_secs: f64,
    pub process_remaining_secs: f64,
}

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

struct LiveTimer {
    timer: PausableTimer,
    purpose: TimerPurpose,
    /// Stage that armed the timer.
    stage: StageId,
}

struct ProcessState {
    stage: StageId,
    stage_started_at: Option<Instant>,
    paused_at: Option<Instant>,
    sparge_ready: bool,
    durations: StageDurations,
    timers: Vec<LiveTimer>,
    config: ConfigSnapshot,
}

struct ProcessInner {
    recipe: Recipe,
    actor: Box<dyn Actor>,
    state: Mutex<ProcessState>,
}

/// One brew.  Cheap to clone; clones drive the same process.
#[derive(Clone)]
pub struct BrewProcess {
    inner: Arc<ProcessInner>,
}

/// Non-owning handle for the vessel loops.  Events sent after the process
/// is dropped are ignored.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Weak<ProcessInner>,
}

impl ProcessHandle {
    pub fn mash_target_reached(&self, temp: f32) {
        if let Some(inner) = self.inner.upgrade() {
            BrewProcess { inner }.mash_target_reached(temp);
        }
    }

    pub fn boil_target_reached(&self, temp: f32) {
        if let Some(inner) = self.inner.upgrade() {
            BrewProcess { inner }.boil_target_reached(temp);
        }
    }
}

impl BrewProcess {
    pub fn new<A: Actor + 'static>(recipe: Recipe, config: ConfigSnapshot, actor: A) -> Result<Self> {
        recipe.validate()?;
        let durations = StageDurations::compute(&recipe, &config);
        info!("New brew process: {recipe}");
        Ok(Self {
            inner: Arc::new(ProcessInner {
                recipe,
                actor: Box::new(actor),
                state: Mutex::new(ProcessState {
                    stage: StageId::Initial,
                    stage_started_at: None,
                    paused_at: None,
                    sparge_ready: false,
                    durations,
                    timers: Vec::new(),
                    config,
                }),
            }),
        })
    }

    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.inner.recipe
    }

    pub fn stage(&self) -> StageId {
        self.lock().stage
    }

    pub fn config(&self) -> ConfigSnapshot {
        self.lock().config.clone()
    }

    /// Number of timers that may still fire.
    pub fn live_timers(&self) -> usize {
        self.lock().timers.len()
    }

    // ── Operator commands ─────────────────────────────────────

    /// Enter the first real stage.  Fails unless the process is idle.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        if state.stage != StageId::Initial {
            return Err(ProcessError::AlreadyRunning(state.stage).into());
        }
        info!("Starting brew");
        let result = self.advance(&mut state);
        self.halt_on_error(&mut state, result)
    }

    /// All actuators off, every timer cancelled, back to the initial stage.
    pub fn stop(&self) {
        let mut state = self.lock();
        info!("Stopping brew in stage: {}", state.stage);
        self.reset(&mut state);
    }

    /// Pause every live timer.  Remaining-time estimates freeze until
    /// [`resume`](Self::resume).
    pub fn pause(&self) {
        let mut state = self.lock();
        if state.stage == StageId::Initial || state.paused_at.is_some() {
            return;
        }
        for live in &state.timers {
            live.timer.pause();
        }
        state.paused_at = Some(Instant::now());
        info!("Brew paused in stage: {}", state.stage);
    }

    pub fn resume(&self) {
        let mut state = self.lock();
        let Some(paused_at) = state.paused_at.take() else {
            return;
        };
        for live in &state.timers {
            live.timer.resume();
        }
        if let Some(started) = state.stage_started_at {
            state.stage_started_at = Some(started + paused_at.elapsed());
        }
        info!("Brew resumed in stage: {}", state.stage);
    }

    /// Force the process into `stage`: timers cancelled, actuators off,
    /// then the stage is entered.  Clears a pause.
    pub fn advance_to(&self, stage: StageId) -> Result<()> {
        if stage == StageId::Initial {
            return Err(ConfigurationError::InitialStageEntered.into());
        }
        let mut state = self.lock();
        info!("Advancing from {} to {}", state.stage, stage);
        Self::cancel_timers(&mut state);
        self.issue_all(shutdown_sequence());
        state.paused_at = None;
        // Sparge water is requested on entering the first rest; a jump past
        // it must request the water itself.
        if stage > StageId::Mashing1
            && stage < StageId::WaitForSpargingWater
            && !state.sparge_ready
        {
            self.issue(ActorCommand::BoilTargetTemp(state.config.sparging_temperature));
        }
        let result = self.enter_stage(&mut state, stage);
        self.halt_on_error(&mut state, result)
    }

    pub fn advance_to_by_name(&self, name: &str) -> Result<()> {
        self.advance_to(StageId::from_name(name)?)
    }

    /// Cancel the stage's timers and move on right away; used when an operator
    /// finished a transfer by hand or ends a pause.  Clears a pause.
    pub fn skip_to_next(&self) -> Result<()> {
        let mut state = self.lock();
        if state.stage == StageId::Initial {
            return Err(StaleEvent::ProcessIdle.into());
        }
        info!("Skipping stage: {}", state.stage);
        Self::cancel_stage_timers(&mut state);
        state.paused_at = None;
        let result = self.advance(&mut state);
        self.halt_on_error(&mut state, result)
    }

    pub fn status(&self) -> ProcessStatus {
        let state = self.lock();
        let run_state = if state.stage == StageId::Initial {
            RunState::Stopped
        } else if state.paused_at.is_some() {
            RunState::Paused
        } else {
            RunState::Running
        };
        let elapsed = state.stage_started_at.map_or(0.0, |started| {
            let until = state.paused_at.unwrap_or_else(Instant::now);
            until.saturating_duration_since(started).as_secs_f64() / state.config.time_scale
        });
        let stage_remaining = (state.durations.get(state.stage) - elapsed).max(0.0);
        ProcessStatus {
            run_state,
            stage: state.stage,
            stage_name: state.stage.name(),
            stage_remaining_secs: stage_remaining,
            process_remaining_secs: stage_remaining + state.durations.after(state.stage),
        }
    }

    /// Swap in a new configuration and recompute every planned duration.
    /// Live timers keep running with the durations they were armed with.
    pub fn reload(&self, config: ConfigSnapshot) {
        let mut state = self.lock();
        info!("Reloading configuration (version {})", config.version());
        let mut durations = StageDurations::compute(&self.inner.recipe, &config);
        // Keep the corrected duration of a rest or boil already timing.
        if state
            .timers
            .iter()
            .any(|t| t.stage == state.stage && matches!(t.purpose, TimerPurpose::MashStepDone | TimerPurpose::BoilDone))
        {
            durations.set(state.stage, state.durations.get(state.stage));
        }
        state.durations = durations;
        state.config = config;
    }

    // ── Vessel callbacks ──────────────────────────────────────

    /// The mash vessel reached its target: start the rest timer.
    pub fn mash_target_reached(&self, temp: f32) {
        let mut state = self.lock();
        info!("Mash vessel target reached: {temp:.1}C in stage: {}", state.stage);
        let result = self.on_mash_reached(&mut state);
        self.absorb(&mut state, "mash target event", result);
    }

    /// The boil vessel reached its target.
    pub fn boil_target_reached(&self, temp: f32) {
        let mut state = self.lock();
        info!("Boil vessel target reached: {temp:.1}C in stage: {}", state.stage);
        let result = self.on_boil_reached(&mut state, temp);
        self.absorb(&mut state, "boil target event", result);
    }

    fn on_mash_reached(&self, state: &mut ProcessState) -> Result<()> {
        let stage = state.stage;
        if stage == StageId::Initial {
            return Err(StaleEvent::ProcessIdle.into());
        }
        if !stage.is_mash() {
            return Err(StaleEvent::NotAwaited(stage).into());
        }
        if Self::has_timer(state, TimerPurpose::MashStepDone) {
            return Err(StaleEvent::Duplicate.into());
        }
        let minutes = self.inner.recipe.mash_step(stage.mash_step())?.minutes;
        let secs = f64::from(minutes) * 60.0;
        self.arm_timer(state, TimerRequest {
            purpose: TimerPurpose::MashStepDone,
            secs,
        })?;
        state.durations.set(stage, secs);
        state.stage_started_at = Some(state.paused_at.unwrap_or_else(Instant::now));
        Ok(())
    }

    fn on_boil_reached(&self, state: &mut ProcessState, temp: f32) -> Result<()> {
        let stage = state.stage;
        if stage == StageId::Initial {
            return Err(StaleEvent::ProcessIdle.into());
        }
        // The boiler heats sparge water from the first mash step on; before
        // that it heats mash water, whatever its temperature.
        if stage >= StageId::Mashing1
            && (temp - state.config.sparging_temperature).abs() < SPARGE_TEMP_TOLERANCE
            && !state.sparge_ready
        {
            info!("Sparging water ready");
            state.sparge_ready = true;
        }
        match stage {
            StageId::MashingPrepare | StageId::WaitForSpargingWater => self.advance(state),
            StageId::Boil => {
                if Self::has_timer(state, TimerPurpose::BoilDone) {
                    return Err(StaleEvent::Duplicate.into());
                }
                let secs = f64::from(self.inner.recipe.boiling_minutes()) * 60.0;
                self.arm_timer(state, TimerRequest {
                    purpose: TimerPurpose::BoilDone,
                    secs,
                })?;
                state.durations.set(stage, secs);
                state.stage_started_at = Some(state.paused_at.unwrap_or_else(Instant::now));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ── Timers ────────────────────────────────────────────────

    fn timer_expired(&self, id: TimerId, purpose: TimerPurpose) {
        let mut state = self.lock();
        let result = self.on_timer(&mut state, id, purpose);
        self.absorb(&mut state, "timer", result);
    }

    fn on_timer(&self, state: &mut ProcessState, id: TimerId, purpose: TimerPurpose) -> Result<()> {
        let pos = state
            .timers
            .iter()
            .position(|t| t.timer.id() == id)
            .ok_or(StaleEvent::TimerNotLive)?;
        let live = state.timers.remove(pos);
        if state.stage == StageId::Initial {
            return Err(StaleEvent::ProcessIdle.into());
        }
        debug!("Timer {} expired in stage: {}", purpose.name(), state.stage);

        if !purpose.transitions() {
            // The boiler belongs to the wort once sparging is under way.
            if state.stage > StageId::WaitForSpargingWater {
                return Err(StaleEvent::NotAwaited(state.stage).into());
            }
            self.issue(ActorCommand::BoilTargetTemp(state.config.sparging_temperature));
            return Ok(());
        }
        if live.stage != state.stage {
            return Err(StaleEvent::StageMismatch {
                expected: live.stage,
                actual: state.stage,
            }
            .into());
        }
        if purpose == TimerPurpose::BoilDone {
            info!("Boiling finished");
            self.reset(state);
            self.start_cooling();
            return Ok(());
        }
        self.advance(state)
    }

    fn arm_timer(&self, state: &mut ProcessState, request: TimerRequest) -> Result<()> {
        let wall = Duration::try_from_secs_f64((request.secs * state.config.time_scale).max(0.0))
            .unwrap_or(Duration::ZERO);
        let purpose = request.purpose;
        let process = Arc::downgrade(&self.inner);
        let timer = PausableTimer::named(purpose.name(), wall, move |timer| {
            if let Some(inner) = process.upgrade() {
                BrewProcess { inner }.timer_expired(timer.id(), purpose);
            }
        });
        state.timers.push(LiveTimer {
            timer: timer.clone(),
            purpose,
            stage: state.stage,
        });
        timer.start()?;
        if state.paused_at.is_some() {
            timer.pause();
        }
        Ok(())
    }

    fn has_timer(state: &ProcessState, purpose: TimerPurpose) -> bool {
        state
            .timers
            .iter()
            .any(|t| t.purpose == purpose && t.stage == state.stage)
    }

    fn cancel_timers(state: &mut ProcessState) {
        for live in state.timers.drain(..) {
            live.timer.cancel();
        }
    }

    /// Cancel the timers that belong to the current stage.  A pending
    /// sparge-heat start outlives the stage that armed it.
    fn cancel_stage_timers(state: &mut ProcessState) {
        state.timers.retain(|live| {
            let stage_bound = live.purpose.transitions();
            if stage_bound {
                live.timer.cancel();
            }
            !stage_bound
        });
    }

    // ── Transitions ───────────────────────────────────────────

    /// Enter the successor of the current stage, or reset after the last.
    fn advance(&self, state: &mut ProcessState) -> Result<()> {
        match next_stage(
            state.stage,
            self.inner.recipe.mash_step_count(),
            state.config.pause_enabled,
        ) {
            Some(next) => self.enter_stage(state, next),
            None => {
                self.reset(state);
                Ok(())
            }
        }
    }

    fn enter_stage(&self, state: &mut ProcessState, mut stage: StageId) -> Result<()> {
        loop {
            let plan = {
                let mut ctx =
                    StageContext::new(stage, &self.inner.recipe, &state.config, state.sparge_ready);
                (stage.descriptor().on_enter)(&mut ctx)?;
                ctx.plan
            };
            info!("Entering stage: {stage}");
            self.issue_all(plan.commands);
            state.stage = stage;
            state.stage_started_at = Some(state.paused_at.unwrap_or_else(Instant::now));
            for request in plan.timers {
                self.arm_timer(state, request)?;
            }
            if !plan.fall_through {
                return Ok(());
            }
            match next_stage(
                stage,
                self.inner.recipe.mash_step_count(),
                state.config.pause_enabled,
            ) {
                Some(next) => stage = next,
                None => return Ok(()),
            }
        }
    }

    fn reset(&self, state: &mut ProcessState) {
        Self::cancel_timers(state);
        self.issue_all(shutdown_sequence());
        state.durations = StageDurations::compute(&self.inner.recipe, &state.config);
        state.stage = StageId::Initial;
        state.stage_started_at = None;
        state.paused_at = None;
        state.sparge_ready = false;
    }

    /// Hook for wort cooling after the boil.  The brewery has no cooling
    /// circuit yet.
    fn start_cooling(&self) {
        debug!("Cooling not available, wort stays in the kettle");
    }

    // ── Error policy ──────────────────────────────────────────

    /// Callback entry points: stale events are dropped, anything else halts.
    fn absorb(&self, state: &mut ProcessState, what: &str, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(Error::Stale(StaleEvent::ProcessIdle)) => {
                debug!("Ignoring {what}: process is idle");
            }
            Err(e) if e.is_stale() => warn!("Ignoring {what}: {e}"),
            Err(e) => {
                error!("{what} failed: {e}; halting process");
                self.reset(state);
            }
        }
    }

    /// Operator commands: a configuration error halts the process and is
    /// returned to the caller.
    fn halt_on_error(&self, state: &mut ProcessState, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            if !e.is_stale() {
                error!("Stage entry failed: {e}; halting process");
                self.reset(state);
            }
        }
        result
    }

    fn issue(&self, command: ActorCommand) {
        debug!("Actor command: {command}");
        self.inner.actor.issue(command);
    }

    fn issue_all(&self, commands: impl IntoIterator<Item = ActorCommand>) {
        for command in commands {
            self.issue(command);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProcessInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for live in state.timers.drain(..) {
            live.timer.cancel();
        }
    }
}
