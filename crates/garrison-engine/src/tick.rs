//! Fixed-timestep tick loop.
//!
//! The [`TickLoop`] owns the [`World`] and the shared [`Resources`] and
//! drives the simulation forward. Each tick:
//!
//! 1. Every registered system runs once, in registration order, with a
//!    [`SystemContext`] giving it the world, the time step and the resources.
//! 2. After *each* system the world's command buffer is flushed, so
//!    structural changes a system requested are visible to the systems after
//!    it in the same tick.
//! 3. The tick counter advances, the input frame is cleared and the events
//!    emitted during the tick are returned in a [`TickReport`].
//!
//! A system that returns an error aborts the tick: later systems do not run
//! and the counter does not advance. Changes already applied stay applied.
//!
//! The dirty set is *not* cleared by the loop; the replication layer drains
//! it once per tick with [`TickLoop::drain_dirty`] or
//! [`TickLoop::drain_delta`].
//!
//! # Example
//!
//! ```
//! use garrison_engine::prelude::*;
//!
//! let world = World::new();
//! let mut tick_loop = TickLoop::new(world, Resources::default(), TickConfig::default());
//!
//! tick_loop.add_system("noop", |_ctx| Ok(()));
//! tick_loop.run_ticks(10).unwrap();
//!
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use garrison_ecs::change::DirtyEntry;
use garrison_ecs::command::{ApplyReport, SystemId};
use garrison_ecs::world::World;
use tracing::{debug, error, warn};

use crate::error::EngineError;
use crate::events::GameEvent;
use crate::input::InputFrame;
use crate::replication::{self, StateDelta};
use crate::resources::Resources;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// Defaults to 10 Hz.
    fn default() -> Self {
        Self { fixed_dt: 1.0 / 10.0 }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics / TickReport
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the tick (systems + command flushes).
    pub total_time: Duration,
    /// Time spent flushing command buffers, summed over all systems.
    pub command_apply_time: Duration,
}

/// Outcome of one successful tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// The tick that ran (the counter value before it advanced).
    pub tick: u64,
    /// Events emitted by systems, in emission order.
    pub events: Vec<GameEvent>,
    /// Flush report after each system, by system name.
    pub apply_reports: Vec<(String, ApplyReport)>,
    /// Size of the dirty set at the end of the tick.
    pub dirty_count: usize,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// What a system sees during its turn.
pub struct SystemContext<'a> {
    pub world: &'a mut World,
    /// Seconds per tick.
    pub dt: f64,
    /// The tick being executed.
    pub tick: u64,
    pub resources: &'a mut Resources,
}

/// A unit of per-tick game logic.
///
/// Systems hold no simulation state of their own: anything that must
/// persist between ticks lives in components. Pure configuration is fine.
pub trait System {
    /// Unique name, used for logging and diagnostics.
    fn name(&self) -> &str;

    /// Run once per tick.
    ///
    /// Return `Err` only for broken invariants (missing singleton, unknown
    /// unit type, exhausted id space). Expected gameplay outcomes are
    /// events, not errors.
    fn update(&self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError>;
}

/// A system function, for systems that need no configuration.
pub type SystemFn = fn(&mut SystemContext<'_>) -> Result<(), EngineError>;

struct FnSystem {
    name: String,
    func: SystemFn,
}

impl System for FnSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        (self.func)(ctx)
    }
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep tick loop.
///
/// # Determinism
///
/// Given the same world, resources, systems (in the same order) and input,
/// a tick produces the same world and the same dirty set:
///
/// - systems run in registration order, one at a time;
/// - command buffers apply in FIFO order;
/// - queries visit entities in ascending id order;
/// - simulation time is `tick_count * fixed_dt`, never accumulated.
pub struct TickLoop {
    world: World,
    resources: Resources,
    /// Ordered list of systems to run each tick.
    systems: Vec<Box<dyn System>>,
    tick_counter: u64,
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop. The counter starts at 0.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(world: World, resources: Resources, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            world,
            resources,
            systems: Vec::new(),
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Append a system to the execution order.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn register(&mut self, system: Box<dyn System>) {
        assert!(
            !self.systems.iter().any(|s| s.name() == system.name()),
            "duplicate system name: {:?}",
            system.name()
        );
        self.systems.push(system);
    }

    /// Append a plain function as a system.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        self.register(Box::new(FnSystem {
            name: name.to_owned(),
            func,
        }));
    }

    /// Execute one tick.
    ///
    /// On `Err` the failing system's requests have been flushed, later
    /// systems have not run and the tick counter is unchanged. Events emitted
    /// before the failure are discarded; the changes behind them stay in the
    /// dirty set.
    pub fn tick(&mut self) -> Result<TickReport, EngineError> {
        let tick_start = Instant::now();
        let tick = self.tick_counter;

        if tick > 0 && !self.world.dirty().is_empty() {
            warn!(
                tick,
                pending = self.world.dirty().len(),
                "dirty set from the previous tick was not drained"
            );
        }

        let mut system_times = Vec::with_capacity(self.systems.len());
        let mut apply_reports = Vec::with_capacity(self.systems.len());
        let mut command_apply_time = Duration::ZERO;

        for (index, system) in self.systems.iter().enumerate() {
            self.world.set_issuer(SystemId(index as u32));

            let sys_start = Instant::now();
            let mut ctx = SystemContext {
                world: &mut self.world,
                dt: self.fixed_dt,
                tick,
                resources: &mut self.resources,
            };
            let result = system.update(&mut ctx);
            system_times.push((system.name().to_owned(), sys_start.elapsed()));

            let apply_start = Instant::now();
            let report = self.world.flush();
            command_apply_time += apply_start.elapsed();
            apply_reports.push((system.name().to_owned(), report));

            if let Err(source) = result {
                self.world.set_issuer(SystemId::EXTERNAL);
                let discarded = self.resources.take_events().len();
                error!(tick, system = system.name(), error = %source, discarded_events = discarded, "system failed, tick aborted");
                return Err(EngineError::SystemFailed {
                    system: system.name().to_owned(),
                    source: Box::new(source),
                });
            }
        }
        self.world.set_issuer(SystemId::EXTERNAL);

        let leftover = self.resources.input.take_orders();
        if !leftover.is_empty() {
            debug!(tick, dropped = leftover.len(), "unconsumed orders dropped");
        }
        let events = self.resources.take_events();
        self.tick_counter += 1;

        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            command_apply_time,
        };

        let dirty_count = self.world.dirty().len();
        debug!(
            tick,
            events = events.len(),
            dirty = dirty_count,
            entities = self.world.entity_count(),
            "tick complete"
        );

        Ok(TickReport {
            tick,
            events,
            apply_reports,
            dirty_count,
        })
    }

    /// Run `count` ticks, stopping at the first error.
    pub fn run_ticks(&mut self, count: u64) -> Result<Vec<TickReport>, EngineError> {
        (0..count).map(|_| self.tick()).collect()
    }

    // -- replication --------------------------------------------------------

    /// Take every change recorded since the last drain.
    pub fn drain_dirty(&mut self) -> Vec<DirtyEntry> {
        self.world.drain_dirty()
    }

    /// Drain the dirty set and build the client-facing delta from it.
    pub fn drain_delta(&mut self) -> Result<StateDelta, EngineError> {
        let entries = self.world.drain_dirty();
        replication::build_delta(&self.world, self.tick_counter, &entries)
    }

    // -- hashing ------------------------------------------------------------

    /// BLAKE3 digest of the tick counter, the pending input and the world.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        let world_hash = self.world.state_hash()?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.tick_counter.to_le_bytes());
        for order in &self.resources.input.orders {
            hasher.update(format!("{order:?}").as_bytes());
        }
        hasher.update(world_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for setup and tests. Systems get theirs through
    /// the [`SystemContext`].
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Set the input frame for the next tick.
    pub fn set_input(&mut self, input: InputFrame) {
        self.resources.input = input;
    }

    pub fn current_input(&self) -> &InputFrame {
        &self.resources.input
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
