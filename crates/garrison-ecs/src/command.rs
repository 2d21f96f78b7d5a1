//! Deferred structural mutations.
//!
//! While a query is in flight the world's columns are borrowed, so systems
//! request structural changes (attach, detach, destroy, create) through a
//! [`Commands`] handle instead. The requests land in the world's
//! [`CommandBuffer`] and take effect at the next [`World::flush`], in strict
//! FIFO order. Nothing a visitor requests is visible to the pass that
//! requested it.
//!
//! Two rules apply at flush time:
//!
//! - A destroy wins over every other request aimed at the same entity in the
//!   same flush. Those requests are discarded, not applied.
//! - Multiple requests for the same `(entity, component)` pair are applied in
//!   order (last write wins) and reported as conflicts.
//!
//! # Example
//!
//! ```
//! use garrison_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Health(u32);
//!
//! let mut world = World::new();
//! world.register_component::<Health>("health");
//! let entity = world.spawn_with(Health(100)).unwrap();
//!
//! world.commands().attach(entity, Health(50));
//! assert_eq!(world.get::<Health>(entity), Some(&Health(100)));
//!
//! let report = world.flush();
//! assert_eq!(report.applied, 1);
//! assert_eq!(world.get::<Health>(entity), Some(&Health(50)));
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::change::{ChangeKind, DirtySet};
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::world::{ComponentBundle, World};
use crate::EcsError;

// ---------------------------------------------------------------------------
// SystemId
// ---------------------------------------------------------------------------

/// Numeric ID of the system that issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Mutations made outside any system: world setup, tests, tools.
    pub const EXTERNAL: SystemId = SystemId(u32::MAX);
}

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What mutation to perform.
pub enum CommandKind {
    /// Fill a reserved entity with its initial components.
    Create { components: ComponentBundle },
    /// Attach (or replace) a typed component.
    Attach {
        type_id: TypeId,
        type_name: &'static str,
        value: Box<dyn Any + Send>,
    },
    /// Attach (or replace) a component given as JSON, by registered name.
    AttachJson {
        component_name: String,
        value: serde_json::Value,
    },
    /// Detach a component if present.
    Detach {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Destroy the entity and all its components.
    Destroy,
}

impl CommandKind {
    fn label(&self) -> &'static str {
        match self {
            CommandKind::Create { .. } => "create",
            CommandKind::Attach { .. } => "attach",
            CommandKind::AttachJson { .. } => "attach_json",
            CommandKind::Detach { .. } => "detach",
            CommandKind::Destroy => "destroy",
        }
    }

    /// The single component kind this command targets, if any.
    fn component(&self, registry: &ComponentRegistry) -> Option<ComponentTypeId> {
        match self {
            CommandKind::Attach { type_id, .. } | CommandKind::Detach { type_id, .. } => {
                registry.lookup_type_id(*type_id)
            }
            CommandKind::AttachJson { component_name, .. } => {
                registry.lookup_by_name(component_name)
            }
            CommandKind::Create { .. } | CommandKind::Destroy => None,
        }
    }
}

impl fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Create { components } => {
                f.debug_struct("Create").field("components", components).finish()
            }
            CommandKind::Attach { type_name, .. } => {
                f.debug_struct("Attach").field("component", type_name).finish()
            }
            CommandKind::AttachJson {
                component_name,
                value,
            } => f
                .debug_struct("AttachJson")
                .field("component", component_name)
                .field("value", value)
                .finish(),
            CommandKind::Detach { type_name, .. } => {
                f.debug_struct("Detach").field("component", type_name).finish()
            }
            CommandKind::Destroy => f.write_str("Destroy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single deferred mutation.
#[derive(Debug)]
pub struct Command {
    /// Which entity this command targets. For `Create` it is the reserved id.
    pub target: EntityId,
    /// What mutation to perform.
    pub kind: CommandKind,
    /// Which system issued this command.
    pub issued_by: SystemId,
    /// Sequential index within the buffer (set on insertion).
    pub command_index: u32,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Commands that took effect (including no-op detaches and destroys).
    pub applied: usize,
    /// Commands that could not be applied (stale entity, unknown kind, bad
    /// JSON). Logged at `warn`.
    pub failed: usize,
    /// Commands dropped because their target is destroyed in the same flush.
    pub discarded: usize,
    /// `(entity, component)` pairs targeted by more than one command.
    pub conflicts: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// FIFO queue of deferred mutations.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl CommandBuffer {
    /// Create a new, empty command buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command.
    pub fn push(&mut self, target: EntityId, kind: CommandKind, issued_by: SystemId) {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            issued_by,
            command_index: index,
        });
    }

    /// All queued commands in insertion order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the last [`apply`](Self::apply) call.
    pub fn last_apply_report(&self) -> ApplyReport {
        self.last_apply_report
    }

    /// Drop every queued command without applying it.
    ///
    /// Entities reserved by pending `Create` commands stay allocated (and
    /// empty) in the world.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    /// Apply all queued commands to `world` in insertion order and clear the
    /// buffer.
    ///
    /// Failures are logged and counted, never propagated: a bad request from
    /// one system must not block the rest of the flush.
    pub fn apply(&mut self, world: &mut World) -> ApplyReport {
        let commands = std::mem::take(&mut self.commands);
        self.next_index = 0;

        // --- Destroy pre-scan ---
        let doomed: BTreeSet<EntityId> = commands
            .iter()
            .filter(|c| matches!(c.kind, CommandKind::Destroy))
            .map(|c| c.target)
            .collect();

        // --- Conflict detection ---
        let mut seen: BTreeMap<(EntityId, ComponentTypeId), Vec<u32>> = BTreeMap::new();
        for cmd in &commands {
            if doomed.contains(&cmd.target) {
                continue;
            }
            if let Some(kind) = cmd.kind.component(world.registry()) {
                seen.entry((cmd.target, kind))
                    .or_default()
                    .push(cmd.command_index);
            }
        }
        let mut conflicts = 0;
        for ((entity, component), indices) in &seen {
            if indices.len() > 1 {
                conflicts += 1;
                warn!(
                    entity = ?entity,
                    component = world.registry().name_of(*component),
                    command_indices = ?indices,
                    "conflict: {} commands target the same entity+component in this flush (last-write-wins)",
                    indices.len()
                );
            }
        }

        // --- Apply loop ---
        let mut report = ApplyReport {
            conflicts,
            ..ApplyReport::default()
        };

        for cmd in commands {
            let Command {
                target,
                kind,
                issued_by,
                command_index,
            } = cmd;
            let label = kind.label();

            if doomed.contains(&target) && !matches!(kind, CommandKind::Destroy) {
                report.discarded += 1;
                debug!(
                    command_index,
                    target = ?target,
                    command = label,
                    "discarded: target is destroyed in the same flush"
                );
                continue;
            }

            let result = match kind {
                CommandKind::Destroy => {
                    world.destroy(target);
                    Ok(())
                }
                CommandKind::Detach { type_id, .. } => {
                    world.detach_erased(target, type_id);
                    Ok(())
                }
                CommandKind::Attach {
                    type_id,
                    type_name,
                    value,
                } => world.attach_erased(target, type_id, type_name, value),
                CommandKind::AttachJson {
                    component_name,
                    value,
                } => world.attach_json(target, &component_name, &value),
                CommandKind::Create { components } => {
                    let result = world.insert_bundle(target, components);
                    if result.is_err() {
                        // Never leave an empty reserved entity behind.
                        world.destroy(target);
                    }
                    result
                }
            };

            match result {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        command_index,
                        target = ?target,
                        system_id = issued_by.0,
                        command = label,
                        error = %e,
                        "command application failed"
                    );
                }
            }
        }

        self.last_apply_report = report;
        report
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("commands", &self.commands)
            .field("last_apply_report", &self.last_apply_report)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Handle systems use to request structural changes.
///
/// Obtained from [`World::commands`] or passed to the visitor of
/// [`World::each`]. Every request is tagged with the issuing [`SystemId`].
pub struct Commands<'a> {
    buffer: &'a mut CommandBuffer,
    allocator: &'a mut EntityAllocator,
    registry: &'a ComponentRegistry,
    dirty: &'a mut DirtySet,
    issuer: SystemId,
}

impl<'a> Commands<'a> {
    pub(crate) fn new(
        buffer: &'a mut CommandBuffer,
        allocator: &'a mut EntityAllocator,
        registry: &'a ComponentRegistry,
        dirty: &'a mut DirtySet,
        issuer: SystemId,
    ) -> Self {
        Self {
            buffer,
            allocator,
            registry,
            dirty,
            issuer,
        }
    }

    /// The system these requests are attributed to.
    pub fn issuer(&self) -> SystemId {
        self.issuer
    }

    /// Request attaching (or replacing) `value` on `entity`.
    pub fn attach<T: Component>(&mut self, entity: EntityId, value: T) {
        self.buffer.push(
            entity,
            CommandKind::Attach {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                value: Box::new(value),
            },
            self.issuer,
        );
    }

    /// Request attaching a component given as JSON under its registered name.
    pub fn attach_json(&mut self, entity: EntityId, component_name: &str, value: serde_json::Value) {
        self.buffer.push(
            entity,
            CommandKind::AttachJson {
                component_name: component_name.to_owned(),
                value,
            },
            self.issuer,
        );
    }

    /// Request detaching `T` from `entity`. A no-op at flush if absent.
    pub fn detach<T: Component>(&mut self, entity: EntityId) {
        self.buffer.push(
            entity,
            CommandKind::Detach {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
            },
            self.issuer,
        );
    }

    /// Request destroying `entity`. A no-op at flush if already gone.
    pub fn destroy(&mut self, entity: EntityId) {
        self.buffer.push(entity, CommandKind::Destroy, self.issuer);
    }

    /// Reserve a new entity now and fill it with `components` at flush.
    ///
    /// The returned id is live immediately (so it can be referenced by other
    /// requests) but carries no components until the flush.
    pub fn create(&mut self, components: ComponentBundle) -> Result<EntityId, EcsError> {
        let entity = self.allocator.allocate()?;
        self.buffer
            .push(entity, CommandKind::Create { components }, self.issuer);
        Ok(entity)
    }

    /// Flag `T` on `entity` as modified for replication.
    ///
    /// Takes effect immediately. The caller must hold the component (as a
    /// visitor does for the components it was handed). Returns `false` if
    /// `T` is unregistered or `entity` is dead.
    pub fn mark_changed<T: Component>(&mut self, entity: EntityId) -> bool {
        match self.registry.lookup::<T>() {
            Some(kind) if self.allocator.is_alive(entity) => {
                self.dirty.record(entity, kind, ChangeKind::Modified);
                true
            }
            _ => false,
        }
    }

    /// Number of requests waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
