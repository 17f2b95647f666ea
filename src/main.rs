//! Mashline host binary: runs one brew against simulated hardware.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SimRig (pins + kettles)                                     │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  Brewery (Actor) ◀──commands── BrewProcess                   │
//! │        │                            ▲                        │
//! │        └── vessel loops ──reached───┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `mashline [config.json] [recipe.json]`.  Without a config the
//! brew runs at one hundredth of real time.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use mashline::adapters::brewery::Brewery;
use mashline::adapters::sim::SimRig;
use mashline::{BrewConfig, BrewProcess, ConfigSnapshot, MashStep, Recipe, RunState, StageId};

/// Wall-clock multiplier used when no configuration file is given.
const DEMO_TIME_SCALE: f64 = 0.01;

/// How often the brew status is logged (wall clock).
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

fn demo_recipe() -> mashline::Result<Recipe> {
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
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt::init();
    info!("Mashline v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config and recipe ──────────────────────────────────
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => BrewConfig::load_json(Path::new(&path))
            .with_context(|| format!("loading config {path}"))?,
        None => BrewConfig {
            time_scale: DEMO_TIME_SCALE,
            ..BrewConfig::default()
        },
    };
    let recipe = match args.next() {
        Some(path) => Recipe::load_json(Path::new(&path))
            .with_context(|| format!("loading recipe {path}"))?,
        None => demo_recipe()?,
    };
    let config = ConfigSnapshot::new(config)?;
    info!("Recipe: {recipe}");

    // ── 3. Simulated brewery ──────────────────────────────────
    let rig = SimRig::new(&config);
    let brewery = Arc::new(
        Brewery::new(rig.pins, rig.mash_kettle, rig.boil_kettle, config.clone())
            .context("starting brewery threads")?,
    );

    // ── 4. Process ────────────────────────────────────────────
    let process = BrewProcess::new(recipe, config, Arc::clone(&brewery))?;
    brewery.attach(process.handle());
    process.start()?;

    // ── 5. Watch until the brew resets ────────────────────────
    loop {
        thread::sleep(STATUS_INTERVAL);
        let status = process.status();
        let mash = brewery.mash_vessel();
        let boil = brewery.boil_vessel();
        info!(
            "[{:?}] {} | stage {:.0}s left, brew {:.0}s left | mash {:.1}C -> {:.1}C ({}%) | boil {:.1}C -> {:.1}C ({}%)",
            status.run_state,
            status.stage_name,
            status.stage_remaining_secs,
            status.process_remaining_secs,
            mash.temperature,
            mash.target,
            mash.duty,
            boil.temperature,
            boil.target,
            boil.duty,
        );
        if status.stage == StageId::Initial && status.run_state == RunState::Stopped {
            break;
        }
    }

    info!("Brew finished");
    Ok(())
}
