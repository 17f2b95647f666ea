//! Recording actor for integration tests.
//!
//! Stores every command the process issues so tests can assert on the
//! full command history without any pumps or relays.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mashline::app::commands::ActorCommand;
use mashline::app::ports::Actor;
use mashline::{BrewConfig, BrewProcess, ConfigSnapshot, MashStep, Recipe, StageId};

// ── RecordingActor ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingActor {
    calls: Mutex<Vec<ActorCommand>>,
}

#[allow(dead_code)]
impl RecordingActor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every command so far, oldest first.
    pub fn calls(&self) -> Vec<ActorCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Drain the history.
    pub fn take(&self) -> Vec<ActorCommand> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn count(&self, command: ActorCommand) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == command).count()
    }
}

impl Actor for RecordingActor {
    fn issue(&self, command: ActorCommand) {
        self.calls.lock().unwrap().push(command);
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// Four one-minute rests, one-minute boil, one liter each way.
pub fn scenario_recipe() -> Recipe {
    Recipe::new(
        &[
            MashStep::new(50.0, 1),
            MashStep::new(64.0, 1),
            MashStep::new(68.0, 1),
            MashStep::new(74.0, 1),
        ],
        1,
        1.0,
        1.0,
    )
    .unwrap()
}

pub fn process_with(config: BrewConfig) -> (BrewProcess, Arc<RecordingActor>) {
    let actor = RecordingActor::new();
    let process = BrewProcess::new(
        scenario_recipe(),
        ConfigSnapshot::new(config).unwrap(),
        Arc::clone(&actor),
    )
    .unwrap();
    (process, actor)
}

/// Poll until the process sits in `stage`.
pub fn wait_for_stage(process: &BrewProcess, stage: StageId, within: Duration) -> bool {
    let until = Instant::now() + within;
    while Instant::now() < until {
        if process.stage() == stage {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    process.stage() == stage
}

/// `needle` appears in `haystack` in order, not necessarily adjacent.
pub fn in_order(haystack: &[ActorCommand], needle: &[ActorCommand]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|n| rest.any(|h| h == n))
}
