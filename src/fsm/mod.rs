//! Stage graph of the brewing process.
//!
//! The graph is a static table of [`StageDescriptor`]s indexed by
//! [`StageId`], the same way a firmware FSM keeps its state table:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  STAGE_TABLE                                                     │
//! │  ┌─────────────────┬──────┬─────────────────┬───────┬──────────┐ │
//! │  │ StageId         │ mash │ next            │ flags │ on_enter │ │
//! │  ├─────────────────┼──────┼─────────────────┼───────┼──────────┤ │
//! │  │ Initial         │  0   │ MashingPrepare  │       │ fn(ctx)  │ │
//! │  │ ...             │      │                 │       │          │ │
//! │  │ Mashing2        │  2   │ Mashing3        │       │ fn(ctx)  │ │
//! │  │ ...             │      │                 │       │          │ │
//! │  │ Boil            │  0   │ -               │       │ fn(ctx)  │ │
//! │  └─────────────────┴──────┴─────────────────┴───────┴──────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entering a stage runs its `on_enter` handler against a
//! [`StageContext`](context::StageContext).  Handlers are pure: they only
//! describe actor commands and timers in a [`StagePlan`](context::StagePlan),
//! which the process then carries out under its lock.
//!
//! The chain itself is recipe-independent.  [`next_stage`] applies the
//! two recipe/configuration rules on top of it: undefined mash steps are
//! skipped, and pause stages are skipped while pausing is disabled.

pub mod context;
pub mod stages;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use context::StageContext;

// ---------------------------------------------------------------------------
// Stage identity
// ---------------------------------------------------------------------------

/// Every stage of the process, in chain order.
/// Must stay in sync with [`stages::STAGE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StageId {
    Initial = 0,
    MashingPrepare = 1,
    MashingBoilToMash = 2,
    MashingTempToBoil = 3,
    Mashing1 = 4,
    Mashing2 = 5,
    Mashing3 = 6,
    Mashing4 = 7,
    PostMashPause = 8,
    WaitForSpargingWater = 9,
    SpargeMashToTemp1 = 10,
    SpargeBoilToMash1 = 11,
    SpargeCirculateInMash1 = 12,
    SpargePause1 = 13,
    SpargeMashToTemp2 = 14,
    SpargeBoilToMash2 = 15,
    SpargeCirculateInMash2 = 16,
    SpargePause2 = 17,
    SpargeMashToTemp3 = 18,
    SpargeTempToBoil = 19,
    Boil = 20,
}

impl StageId {
    /// Total number of stages, used to size tables.
    pub const COUNT: usize = 21;

    /// Convert an index back to `StageId`.  Out-of-range indices map to
    /// `Initial` (and trip a debug assertion).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Initial,
            1 => Self::MashingPrepare,
            2 => Self::MashingBoilToMash,
            3 => Self::MashingTempToBoil,
            4 => Self::Mashing1,
            5 => Self::Mashing2,
            6 => Self::Mashing3,
            7 => Self::Mashing4,
            8 => Self::PostMashPause,
            9 => Self::WaitForSpargingWater,
            10 => Self::SpargeMashToTemp1,
            11 => Self::SpargeBoilToMash1,
            12 => Self::SpargeCirculateInMash1,
            13 => Self::SpargePause1,
            14 => Self::SpargeMashToTemp2,
            15 => Self::SpargeBoilToMash2,
            16 => Self::SpargeCirculateInMash2,
            17 => Self::SpargePause2,
            18 => Self::SpargeMashToTemp3,
            19 => Self::SpargeTempToBoil,
            20 => Self::Boil,
            _ => {
                debug_assert!(false, "invalid stage index: {idx}");
                Self::Initial
            }
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Iterate every stage in chain order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self::from_index)
    }

    pub fn descriptor(self) -> &'static StageDescriptor {
        &stages::STAGE_TABLE[self.index()]
    }

    /// Human-readable stage name.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Machine key used by the control surface, e.g. `"sparge_pause_1"`.
    pub fn key(self) -> &'static str {
        self.descriptor().key
    }

    /// Recipe mash step served by this stage, or 0.
    pub fn mash_step(self) -> u8 {
        self.descriptor().mash_step
    }

    pub fn is_mash(self) -> bool {
        self.mash_step() > 0
    }

    pub fn is_pause(self) -> bool {
        self.descriptor().pause
    }

    /// Resolve a stage by key (case-insensitive) or by display name.
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        Self::all()
            .find(|s| s.key().eq_ignore_ascii_case(name) || s.name() == name)
            .ok_or_else(|| ConfigurationError::UnknownStage.into())
    }
}

impl core::fmt::Display for StageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Stage descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Handler run when a stage is entered.
pub type StageEnterFn = fn(&mut StageContext<'_>) -> Result<()>;

/// Static descriptor for a single stage.
pub struct StageDescriptor {
    pub id: StageId,
    pub key: &'static str,
    pub name: &'static str,
    /// 1-based recipe mash step, 0 for non-mash stages.
    pub mash_step: u8,
    /// `None` only for the terminal stage.
    pub next: Option<StageId>,
    /// Operator pause; skipped while pausing is disabled.
    pub pause: bool,
    /// Pump transfer that an operator may perform by hand.
    pub manual_transfer: bool,
    pub on_enter: StageEnterFn,
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// Successor of `current` for a recipe with `mash_steps` mash steps.
///
/// A mash stage beyond the recipe is never returned: the chain jumps to
/// the successor of the last mash stage instead.  Pause stages are passed
/// over while `pause_enabled` is false.  `None` at the terminal stage.
pub fn next_stage(current: StageId, mash_steps: usize, pause_enabled: bool) -> Option<StageId> {
    let mut next = current.descriptor().next?;
    if usize::from(next.mash_step()) > mash_steps {
        next = StageId::Mashing4.descriptor().next?;
    }
    while next.is_pause() && !pause_enabled {
        next = next.descriptor().next?;
    }
    Some(next)
}

/// `stage` followed by every stage down the raw chain to the terminal node.
pub fn chain_from(stage: StageId) -> impl Iterator<Item = StageId> {
    core::iter::successors(Some(stage), |s| s.descriptor().next)
}
