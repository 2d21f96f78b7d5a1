//! State deltas for clients.
//!
//! [`build_delta`] turns a drained dirty set into the `unit_updates` payload
//! of the client protocol: one [`EntityUpdate`] per touched entity, holding
//! the current JSON value of every added or modified component, the names
//! of removed components, or just a `destroyed` flag. Transport is someone
//! else's job.

use std::collections::BTreeMap;

use garrison_ecs::change::{ChangeKind, DirtyEntry};
use garrison_ecs::entity::EntityId;
use garrison_ecs::world::World;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Changes to one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    /// Raw entity id, as clients address entities.
    pub id: u64,
    /// Current value of each added or modified component, by kind name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changed: BTreeMap<String, serde_json::Value>,
    /// Kind names of detached components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    /// The entity no longer exists; `changed` and `removed` are empty.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub destroyed: bool,
}

/// Everything clients need to catch up with one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub tick: u64,
    /// Updates in ascending entity order.
    #[serde(rename = "unit_updates")]
    pub updates: Vec<EntityUpdate>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Build the delta for `entries` (as returned by `World::drain_dirty`)
/// against the current state of `world`.
pub fn build_delta(
    world: &World,
    tick: u64,
    entries: &[DirtyEntry],
) -> Result<StateDelta, EngineError> {
    let mut updates: BTreeMap<EntityId, EntityUpdate> = BTreeMap::new();

    for entry in entries {
        let update = updates.entry(entry.entity).or_insert_with(|| EntityUpdate {
            id: entry.entity.to_raw(),
            ..EntityUpdate::default()
        });
        if !world.is_alive(entry.entity) {
            update.destroyed = true;
            continue;
        }

        let name = world.registry().name_of(entry.component).to_owned();
        match entry.change {
            ChangeKind::Added | ChangeKind::Modified => {
                match world.component_json_by_kind(entry.entity, entry.component)? {
                    Some(value) => {
                        update.changed.insert(name, value);
                    }
                    None => update.removed.push(name),
                }
            }
            ChangeKind::Removed => update.removed.push(name),
        }
    }

    Ok(StateDelta {
        tick,
        updates: updates.into_values().collect(),
    })
}
