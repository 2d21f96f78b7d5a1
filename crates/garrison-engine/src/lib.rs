//! Garrison Engine -- tick-based simulation kernel for an RTS game server.
//!
//! This crate builds on [`garrison_ecs`] to provide the simulation driver: a
//! fixed-timestep [`TickLoop`](tick::TickLoop) that runs systems in a fixed
//! order and flushes their deferred commands after each one, the shared
//! resource bundle, the game components and prefabs, the unit production
//! system, and the replication and replay layers on top.
//!
//! # Quick Start
//!
//! ```
//! use garrison_engine::prelude::*;
//!
//! let config = GameConfig::default();
//! let mut tick_loop = garrison_engine::build_tick_loop(&config).unwrap();
//!
//! let map_info = *tick_loop.world().singleton::<MapInfo>().unwrap().1;
//! let base = spawn_base(tick_loop.world_mut(), &map_info, Position { x: 2, y: 2 }, 1, 100).unwrap();
//!
//! tick_loop.set_input(InputFrame::new().with_order(build(1, "scout")));
//! let reports = tick_loop.run_ticks(2).unwrap();
//!
//! assert!(matches!(reports[1].events[0], GameEvent::UnitProduced { .. }));
//! assert_eq!(tick_loop.world().get::<Base>(base), Some(&Base { resource: 70 }));
//! ```

#![deny(unsafe_code)]

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod logging;
pub mod prefab;
pub mod replay;
pub mod replication;
pub mod resources;
pub mod systems;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use garrison_ecs;

pub use error::EngineError;

/// Build a tick loop from `config`: a world with the map singleton, the
/// catalog in the resources, and the standard systems registered in order
/// (build-order intake, then production).
pub fn build_tick_loop(config: &config::GameConfig) -> Result<tick::TickLoop, EngineError> {
    let world = prefab::new_world(&config.map)?;
    let resources = resources::Resources::from_config(config);
    let mut tick_loop = tick::TickLoop::new(world, resources, config.tick_config());
    tick_loop.register(Box::new(systems::BuildOrderSystem));
    tick_loop.register(Box::new(systems::ProductionSystem));
    Ok(tick_loop)
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use garrison_ecs::prelude::*;

    pub use crate::components::{
        register_all, Base, CreateCommand, Health, Label, MapInfo, PlayerOwned, Position, Unit,
        UnitKind, UnitStatus,
    };
    pub use crate::config::{ConfigError, GameConfig, MapSettings, TickSettings, UnitSpec};
    pub use crate::error::EngineError;
    pub use crate::events::{GameEvent, RejectReason};
    pub use crate::input::{build, InputFrame, PlayerOrder};
    pub use crate::prefab::{new_world, spawn_base, spawn_unit, unit_bundle};
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::replication::{build_delta, EntityUpdate, StateDelta};
    pub use crate::resources::{Resources, UnitCatalog};
    pub use crate::systems::{BuildOrderSystem, ProductionSystem};
    pub use crate::tick::{
        System, SystemContext, SystemFn, TickConfig, TickDiagnostics, TickLoop, TickReport,
    };
}
