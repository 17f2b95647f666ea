//! Pausable single-shot countdown timer.
//!
//! ```text
//!             start()            expiry
//!   Created ─────────▶ Started ─────────▶ Finished ──▶ callback(&timer)
//!                       │   ▲
//!               pause() │   │ resume()
//!                       ▼   │
//!                      Paused
//!
//!   any state except Finished ──cancel()──▶ Cancelled
//! ```
//!
//! Each run segment is served by a short-lived waiter thread parked on a
//! condition variable.  Every lifecycle change bumps a generation counter,
//! so a waiter from an older segment wakes up, sees a newer generation and
//! exits without firing.  The `Started → Finished` step happens under the
//! timer's own lock, which is what makes delivery exactly-once against a
//! concurrent `pause()` or `cancel()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};

use crate::error::{Result, TimerError};

/// Lifecycle of a [`PausableTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    Created,
    Started,
    Paused,
    Cancelled,
    Finished,
}

/// Process-unique timer identity, used to find a timer in a live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type Callback = Box<dyn FnOnce(&PausableTimer) + Send>;

struct Core {
    state: TimerState,
    generation: u64,
    /// Start of the current run segment (only while `Started`).
    segment_start: Option<Instant>,
    /// Run time accumulated by earlier segments.
    consumed: Duration,
}

impl Core {
    fn elapsed(&self) -> Duration {
        self.consumed + self.segment_start.map_or(Duration::ZERO, |t| t.elapsed())
    }
}

struct Shared {
    id: TimerId,
    name: Option<&'static str>,
    duration: Duration,
    core: Mutex<Core>,
    wake: Condvar,
    callback: Mutex<Option<Callback>>,
}

/// Cancellable, pausable, resumable single-shot timer.
///
/// Clones share the same underlying timer.  The callback receives the
/// timer itself so the owner can identify it and drop it from its live
/// set; any further arguments are captured by the closure.
#[derive(Clone)]
pub struct PausableTimer {
    shared: Arc<Shared>,
}

impl PausableTimer {
    pub fn new<F>(duration: Duration, callback: F) -> Self
    where
        F: FnOnce(&PausableTimer) + Send + 'static,
    {
        Self::build(duration, None, Box::new(callback))
    }

    /// Same as [`new`](Self::new) with a diagnostic name.
    pub fn named<F>(name: &'static str, duration: Duration, callback: F) -> Self
    where
        F: FnOnce(&PausableTimer) + Send + 'static,
    {
        Self::build(duration, Some(name), Box::new(callback))
    }

    fn build(duration: Duration, name: Option<&'static str>, callback: Callback) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: TimerId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
                name,
                duration,
                core: Mutex::new(Core {
                    state: TimerState::Created,
                    generation: 0,
                    segment_start: None,
                    consumed: Duration::ZERO,
                }),
                wake: Condvar::new(),
                callback: Mutex::new(Some(callback)),
            }),
        }
    }

    pub fn id(&self) -> TimerId {
        self.shared.id
    }

    pub fn name(&self) -> Option<&'static str> {
        self.shared.name
    }

    pub fn duration(&self) -> Duration {
        self.shared.duration
    }

    pub fn state(&self) -> TimerState {
        lock(&self.shared.core).state
    }

    /// Time left before delivery, or `None` once the timer can no longer fire
    /// (or has not been started).
    pub fn remaining(&self) -> Option<Duration> {
        let core = lock(&self.shared.core);
        match core.state {
            TimerState::Started | TimerState::Paused => {
                Some(self.shared.duration.saturating_sub(core.elapsed()))
            }
            _ => None,
        }
    }

    /// Arm the timer.  Only legal from `Created`.
    pub fn start(&self) -> Result<()> {
        let mut core = lock(&self.shared.core);
        if core.state != TimerState::Created {
            return Err(TimerError::NotCreated(core.state).into());
        }
        let now = Instant::now();
        core.state = TimerState::Started;
        core.segment_start = Some(now);
        core.generation += 1;
        let generation = core.generation;
        drop(core);

        debug!(
            "Timer {} ({:?}) with timeout {:.3}s started",
            self.label(),
            self.shared.id,
            self.shared.duration.as_secs_f64()
        );
        self.spawn_waiter(generation, now + self.shared.duration);
        Ok(())
    }

    /// Suspend a running timer.  No-op unless `Started` and not yet due.
    pub fn pause(&self) {
        let mut core = lock(&self.shared.core);
        if core.state != TimerState::Started {
            return;
        }
        let elapsed = core.elapsed();
        if elapsed >= self.shared.duration {
            // About to fire anyway.
            return;
        }
        core.consumed = elapsed;
        core.segment_start = None;
        core.state = TimerState::Paused;
        core.generation += 1;
        self.shared.wake.notify_all();
        debug!(
            "Timer {} paused after {:.3}s",
            self.label(),
            elapsed.as_secs_f64()
        );
    }

    /// Continue a paused timer for the remaining duration.  No-op unless `Paused`.
    pub fn resume(&self) {
        let mut core = lock(&self.shared.core);
        if core.state != TimerState::Paused {
            return;
        }
        let now = Instant::now();
        let remaining = self.shared.duration.saturating_sub(core.consumed);
        core.state = TimerState::Started;
        core.segment_start = Some(now);
        core.generation += 1;
        let generation = core.generation;
        drop(core);

        debug!(
            "Timer {} resumed, {:.3}s remaining",
            self.label(),
            remaining.as_secs_f64()
        );
        self.spawn_waiter(generation, now + remaining);
    }

    /// Suppress delivery.  Idempotent; a finished timer stays finished.
    pub fn cancel(&self) {
        let mut core = lock(&self.shared.core);
        if matches!(core.state, TimerState::Finished | TimerState::Cancelled) {
            return;
        }
        core.state = TimerState::Cancelled;
        core.generation += 1;
        core.segment_start = None;
        self.shared.wake.notify_all();
        drop(core);

        // Release whatever the closure captured.
        drop(lock(&self.shared.callback).take());
        debug!("Timer {} cancelled", self.label());
    }

    fn label(&self) -> &'static str {
        self.shared.name.unwrap_or("<unnamed>")
    }

    fn spawn_waiter(&self, generation: u64, deadline: Instant) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("timer-{}", self.label()))
            .spawn(move || wait_and_fire(shared, generation, deadline));
        if let Err(e) = spawned {
            error!("Timer {}: failed to spawn waiter: {e}", self.label());
        }
    }
}

impl core::fmt::Debug for PausableTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PausableTimer")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("duration", &self.shared.duration)
            .field("state", &self.state())
            .finish()
    }
}

fn wait_and_fire(shared: Arc<Shared>, generation: u64, deadline: Instant) {
    let mut core = lock(&shared.core);
    loop {
        if core.generation != generation || core.state != TimerState::Started {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        core = shared
            .wake
            .wait_timeout(core, deadline - now)
            .map_or_else(|e| e.into_inner().0, |(guard, _)| guard);
    }
    core.state = TimerState::Finished;
    core.consumed = shared.duration;
    core.segment_start = None;
    drop(core);

    let callback = lock(&shared.callback).take();
    if let Some(callback) = callback {
        callback(&PausableTimer { shared });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
