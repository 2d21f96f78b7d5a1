//! Per-tick player input.
//!
//! Orders use the client protocol's command object shape:
//! `{"command": "BUILD", "player_id": 1, "unit_type": "soldier"}`.

use serde::{Deserialize, Serialize};

/// One player command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerOrder {
    /// Queue production of `unit_type` at the player's base.
    Build { player_id: u32, unit_type: String },
}

/// Everything the players sent for one tick.
///
/// The tick loop clears the frame after each tick, so orders that no system
/// consumed are dropped rather than carried over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    pub orders: Vec<PlayerOrder>,
}

impl InputFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`push`](Self::push).
    pub fn with_order(mut self, order: PlayerOrder) -> Self {
        self.push(order);
        self
    }

    pub fn push(&mut self, order: PlayerOrder) {
        self.orders.push(order);
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Remove and return every queued order, leaving the frame empty.
    ///
    /// Draining is how a system claims orders; exactly one system may drain
    /// each order type per tick.
    pub fn take_orders(&mut self) -> Vec<PlayerOrder> {
        std::mem::take(&mut self.orders)
    }
}

/// Shorthand for a build order.
pub fn build(player_id: u32, unit_type: &str) -> PlayerOrder {
    PlayerOrder::Build {
        player_id,
        unit_type: unit_type.to_owned(),
    }
}
