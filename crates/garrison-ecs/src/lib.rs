//! Garrison ECS -- sparse-set Entity Component System for a tick-based game
//! server.
//!
//! Entities are generational ids; each component kind lives in its own
//! sparse column. Queries pick candidates from the rarest requested column
//! and visit matches in ascending id order. Structural changes requested
//! during a query are deferred to a FIFO command buffer, and every
//! structural change is recorded in a dirty set for replication.
//!
//! # Quick Start
//!
//! ```
//! use garrison_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Position { x: i32, y: i32 }
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Velocity { dx: i32, dy: i32 }
//!
//! let mut world = World::new();
//! world.register_component::<Position>("position");
//! world.register_component::<Velocity>("velocity");
//!
//! let entity = world
//!     .spawn(
//!         ComponentBundle::new()
//!             .with(Position { x: 0, y: 0 })
//!             .with(Velocity { dx: 1, dy: 0 }),
//!     )
//!     .unwrap();
//!
//! world
//!     .each::<(&mut Position, &Velocity), _>(|_, (pos, vel), _| {
//!         pos.x += vel.dx;
//!     })
//!     .unwrap();
//!
//! assert_eq!(world.get::<Position>(entity), Some(&Position { x: 1, y: 0 }));
//! ```

#![deny(unsafe_code)]

pub mod change;
pub mod command;
pub mod component;
pub mod entity;
pub mod query;
pub mod storage;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// Deserialization of a component value failed.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserializationError { component: String, details: String },

    /// Serialization of a component value failed.
    #[error("failed to serialize component '{component}': {details}")]
    ComponentSerializationError { component: String, details: String },

    /// A value did not match the Rust type registered for its kind.
    #[error("value does not match the type registered for component '{component}'")]
    ComponentTypeMismatch { component: String },

    /// A query named the same component kind more than once.
    #[error("query requests component '{component}' more than once")]
    AliasedQuery { component: String },

    /// No more entities can be allocated.
    #[error("entity space exhausted (limit {limit} live entities)")]
    EntitySpaceExhausted { limit: usize },

    /// A component expected on exactly one well-known entity is absent.
    #[error("singleton component '{component}' is missing")]
    MissingSingleton { component: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::change::{ChangeKind, DirtyEntry, DirtySet};
    pub use crate::command::{ApplyReport, Command, CommandBuffer, CommandKind, Commands, SystemId};
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::query::{Query, QueryItem, ReadOnlyQuery};
    pub use crate::world::{ComponentBundle, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    // -- test component types -----------------------------------------------

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health(u32);

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Poisoned {
        ticks_left: u32,
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Health>("health");
        world.register_component::<Poisoned>("poisoned");
        world
    }

    // -- a system-shaped pass: mutate, then request removal ------------------

    fn poison_pass(world: &mut World) -> usize {
        world
            .each::<(&mut Health, &mut Poisoned), _>(|e, (hp, poison), cmds| {
                hp.0 = hp.0.saturating_sub(1);
                poison.ticks_left -= 1;
                cmds.mark_changed::<Health>(e);
                if poison.ticks_left == 0 {
                    cmds.detach::<Poisoned>(e);
                }
                if hp.0 == 0 {
                    cmds.destroy(e);
                }
            })
            .unwrap()
    }

    #[test]
    fn transient_component_drives_state_until_removed() {
        let mut world = setup_world();
        let e = world
            .spawn(
                ComponentBundle::new()
                    .with(Health(10))
                    .with(Poisoned { ticks_left: 2 }),
            )
            .unwrap();

        assert_eq!(poison_pass(&mut world), 1);
        world.flush();
        assert_eq!(poison_pass(&mut world), 1);
        world.flush();
        assert!(!world.has::<Poisoned>(e));

        // Idle entity: nothing matches any more.
        assert_eq!(poison_pass(&mut world), 0);
        world.flush();
        assert_eq!(world.get::<Health>(e), Some(&Health(8)));
    }

    #[test]
    fn destroy_request_wins_over_detach_in_same_pass() {
        let mut world = setup_world();
        let e = world
            .spawn(
                ComponentBundle::new()
                    .with(Health(1))
                    .with(Poisoned { ticks_left: 1 }),
            )
            .unwrap();

        poison_pass(&mut world);
        let report = world.flush();
        assert!(!world.is_alive(e));
        assert_eq!(report.discarded, 1);
        assert_eq!(report.applied, 1);
    }

    #[test]
    fn dirty_set_reports_pass_changes_once() {
        let mut world = setup_world();
        let e = world
            .spawn(
                ComponentBundle::new()
                    .with(Health(5))
                    .with(Poisoned { ticks_left: 3 }),
            )
            .unwrap();
        world.drain_dirty();

        poison_pass(&mut world);
        world.flush();
        let health = world.registry().lookup::<Health>().unwrap();
        let drained = world.drain_dirty();
        assert_eq!(
            drained,
            vec![DirtyEntry {
                entity: e,
                component: health,
                change: ChangeKind::Modified,
            }]
        );
        assert!(world.drain_dirty().is_empty());
    }

    #[test]
    fn scale_10k_entities() {
        let mut world = setup_world();
        let mut entities = Vec::with_capacity(10_000);
        for i in 0..10_000 {
            let mut b = ComponentBundle::new();
            b.add(Position { x: i, y: 0 });
            if i % 2 == 0 {
                b.add(Health(3));
            }
            entities.push(world.spawn(b).unwrap());
        }

        let count = world.query::<(&Position, &Health)>().unwrap().len();
        assert_eq!(count, 5_000);

        for e in entities.iter().take(2_500) {
            world.commands().destroy(*e);
        }
        world.flush();
        assert_eq!(world.entity_count(), 7_500);
        assert_eq!(world.query::<(&Position, &Health)>().unwrap().len(), 3_750);
    }
}
