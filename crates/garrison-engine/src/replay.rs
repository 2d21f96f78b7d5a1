//! Deterministic replay with input recording and checkpoint verification.
//!
//! During a run, a [`ReplayRecorder`] captures every non-empty
//! [`InputFrame`] and a periodic state-hash checkpoint, producing a
//! [`ReplayLog`]. [`replay`] feeds the recorded inputs to a fresh
//! [`TickLoop`] built the same way and compares hashes at each checkpoint.
//!
//! # Recording
//!
//! ```
//! use garrison_engine::prelude::*;
//! use garrison_engine::replay::ReplayRecorder;
//!
//! let mut tick_loop = TickLoop::new(World::new(), Resources::default(), TickConfig::default());
//! let mut recorder = ReplayRecorder::start(&tick_loop, 10).unwrap();
//!
//! for _ in 0..100 {
//!     recorder.record(&tick_loop).unwrap();
//!     tick_loop.tick().unwrap();
//! }
//!
//! let log = recorder.finish();
//! assert_eq!(log.total_ticks, 100);
//! assert_eq!(log.entries.len(), 10);
//! ```

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::input::InputFrame;
use crate::tick::TickLoop;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A recorded run: where it started, and the ordered inputs and checkpoints.
///
/// Serializable to JSON for storage or regression fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Fingerprint of the game config the run used. Informational: replay
    /// does not enforce it, the caller must build the loop from the same
    /// config.
    pub config_fingerprint: Option<String>,

    /// Tick counter when recording started.
    pub start_tick: u64,

    /// [`TickLoop::state_hash`] when recording started. Replay refuses to
    /// start from any other state.
    pub initial_state_hash: String,

    /// Number of ticks recorded. Replay executes exactly this many.
    pub total_ticks: u64,

    pub entries: Vec<ReplayEntry>,
}

// ---------------------------------------------------------------------------
// ReplayEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Input active during `tick`.
    Input { tick: u64, input: InputFrame },
    /// State hash taken after the tick's input was set, before it ran.
    Checkpoint { tick: u64, state_hash: String },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every recorded tick was replayed without divergence.
    pub completed: bool,
    pub ticks_replayed: u64,
    /// The first checkpoint whose hash did not match, if any.
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a run of one [`TickLoop`] into a [`ReplayLog`].
///
/// Call [`record`](Self::record) once per tick, after the tick's input is
/// set and before [`TickLoop::tick`] runs. The recorder reads the pending
/// input straight from the loop and hashes it every `checkpoint_interval`
/// ticks, counted from the tick recording started at.
pub struct ReplayRecorder {
    log: ReplayLog,
    /// 0 disables checkpoints.
    checkpoint_interval: u64,
    next_tick: u64,
}

impl ReplayRecorder {
    /// Start recording `tick_loop` from its current tick and state.
    pub fn start(tick_loop: &TickLoop, checkpoint_interval: u64) -> Result<Self, EngineError> {
        let start_tick = tick_loop.tick_count();
        Ok(Self {
            log: ReplayLog {
                config_fingerprint: None,
                start_tick,
                initial_state_hash: tick_loop.state_hash()?,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            next_tick: start_tick,
        })
    }

    pub fn set_config_fingerprint(&mut self, fingerprint: String) {
        self.log.config_fingerprint = Some(fingerprint);
    }

    /// Capture the tick `tick_loop` is about to run.
    ///
    /// # Errors
    ///
    /// [`EngineError::RecordingGap`] unless the loop sits exactly one tick
    /// past the previously recorded one. A failed tick does not advance the
    /// counter, so running it again must not be recorded twice.
    pub fn record(&mut self, tick_loop: &TickLoop) -> Result<(), EngineError> {
        let tick = tick_loop.tick_count();
        if tick != self.next_tick {
            return Err(EngineError::RecordingGap {
                expected: self.next_tick,
                actual: tick,
            });
        }

        let input = tick_loop.current_input();
        if !input.is_empty() {
            self.log.entries.push(ReplayEntry::Input {
                tick,
                input: input.clone(),
            });
        }

        let elapsed = tick - self.log.start_tick;
        if self.checkpoint_interval > 0 && elapsed % self.checkpoint_interval == 0 {
            self.log.entries.push(ReplayEntry::Checkpoint {
                tick,
                state_hash: tick_loop.state_hash()?,
            });
        }

        self.next_tick += 1;
        self.log.total_ticks += 1;
        Ok(())
    }

    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on `tick_loop`, stopping at the first checkpoint mismatch.
///
/// The dirty set is drained and discarded after every replayed tick.
///
/// `tick_loop` must be freshly built the way the recorded one was (same
/// config, systems and initial entities) and sit at `log.start_tick`.
///
/// # Errors
///
/// Fails without touching `tick_loop` if the log has duplicate entries, its
/// tick range overflows, or the loop is not at the recorded starting state.
/// Fails mid-run if a tick returns an error.
pub fn replay(tick_loop: &mut TickLoop, log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let mut input_map: BTreeMap<u64, &InputFrame> = BTreeMap::new();
    let mut checkpoint_map: BTreeMap<u64, &str> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if input_map.insert(*tick, input).is_some() {
                    anyhow::bail!("replay log contains duplicate Input entry at tick {tick}");
                }
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoint_map.insert(*tick, state_hash).is_some() {
                    anyhow::bail!("replay log contains duplicate Checkpoint entry at tick {tick}");
                }
            }
        }
    }

    let start_tick = log.start_tick;
    let end_tick = start_tick.checked_add(log.total_ticks).ok_or_else(|| {
        anyhow::anyhow!(
            "tick range overflow: start_tick ({start_tick}) + total_ticks ({}) exceeds u64::MAX",
            log.total_ticks
        )
    })?;

    if tick_loop.tick_count() != start_tick {
        anyhow::bail!(
            "tick loop is at tick {}, replay log starts at tick {start_tick}",
            tick_loop.tick_count()
        );
    }
    let initial = tick_loop
        .state_hash()
        .context("failed to hash initial state")?;
    if initial != log.initial_state_hash {
        anyhow::bail!(
            "initial state does not match the recording (expected {}, got {initial})",
            log.initial_state_hash
        );
    }

    let mut ticks_replayed: u64 = 0;
    for tick in start_tick..end_tick {
        let input = input_map.get(&tick).map(|i| (*i).clone()).unwrap_or_default();
        tick_loop.set_input(input);

        if let Some(&expected_hash) = checkpoint_map.get(&tick) {
            let actual_hash = tick_loop
                .state_hash()
                .with_context(|| format!("failed to hash state at tick {tick}"))?;
            if actual_hash != expected_hash {
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: expected_hash.to_owned(),
                        actual_hash,
                    }),
                });
            }
        }

        tick_loop
            .tick()
            .with_context(|| format!("tick {tick} failed during replay"))?;
        tick_loop.drain_dirty();
        ticks_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}
