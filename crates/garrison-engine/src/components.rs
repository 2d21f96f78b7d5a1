//! Game component kinds.
//!
//! Plain data only. Every kind is registered under a snake_case wire name by
//! [`register_all`]; those names are what clients see in state deltas.

use garrison_ecs::world::World;
use serde::{Deserialize, Serialize};

/// Tile coordinates on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Activity of a unit or production facility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Idle,
    Building,
}

/// Anything that can act: spawned units and bases alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub status: UnitStatus,
}

/// A production facility and the resource stockpile it spends from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    pub resource: u32,
}

/// Text displayed over an entity. Bases show their resource count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
}

/// Owning player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOwned {
    pub id: u32,
}

/// An in-progress build order.
///
/// Present only while a build is active; its absence means the facility is
/// idle. `build_time` counts the ticks left before the build resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommand {
    pub unit_type: String,
    pub build_time: u32,
}

/// Map metadata. Lives on a single entity created with the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub width: u32,
    pub height: u32,
}

impl MapInfo {
    pub fn contains(&self, position: &Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
    }
}

/// Catalog type a unit was produced as (`"type"` in the client protocol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitKind {
    #[serde(rename = "type")]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub hp: u32,
}

/// Register every game component kind on `world`.
pub fn register_all(world: &mut World) {
    world.register_component::<Position>("position");
    world.register_component::<Unit>("unit");
    world.register_component::<Base>("base");
    world.register_component::<Label>("label");
    world.register_component::<PlayerOwned>("player_owned");
    world.register_component::<CreateCommand>("create_command");
    world.register_component::<MapInfo>("map_info");
    world.register_component::<UnitKind>("unit_kind");
    world.register_component::<Health>("health");
}
