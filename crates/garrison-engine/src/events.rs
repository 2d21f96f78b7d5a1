//! Gameplay events reported by systems.
//!
//! Events describe expected outcomes (a unit came out, a build could not be
//! paid for, an order was refused). They are collected in
//! [`Resources::events`](crate::resources::Resources) during a tick and
//! handed back in the [`TickReport`](crate::tick::TickReport).

use garrison_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A build order completed and a unit was spawned.
    UnitProduced {
        base: EntityId,
        unit: EntityId,
        owner: u32,
        unit_type: String,
    },
    /// A build order completed but the base could not pay for it. The order
    /// is consumed; nothing is refunded or retried.
    BuildFailed {
        base: EntityId,
        owner: u32,
        unit_type: String,
        cost: u32,
        available: u32,
    },
    /// A build order was refused before it reached a base.
    OrderRejected {
        player_id: u32,
        unit_type: String,
        reason: RejectReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The player owns no base.
    UnknownPlayer,
    /// The catalog has no such unit type.
    UnknownUnitType,
    /// The player's base already has a build in progress.
    BaseBusy,
}
