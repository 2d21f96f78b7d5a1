//! The shared resource bundle handed to every system.

use std::collections::BTreeMap;

use crate::config::{GameConfig, UnitSpec};
use crate::error::EngineError;
use crate::events::GameEvent;
use crate::input::InputFrame;

// ---------------------------------------------------------------------------
// UnitCatalog
// ---------------------------------------------------------------------------

/// Per-unit-type balance data (cost table). Read-only during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitCatalog {
    specs: BTreeMap<String, UnitSpec>,
}

impl UnitCatalog {
    pub fn new(specs: BTreeMap<String, UnitSpec>) -> Self {
        Self { specs }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.units.clone())
    }

    pub fn get(&self, unit_type: &str) -> Option<&UnitSpec> {
        self.specs.get(unit_type)
    }

    /// Like [`get`](Self::get), but an unknown type is an error.
    pub fn spec(&self, unit_type: &str) -> Result<&UnitSpec, EngineError> {
        self.get(unit_type)
            .ok_or_else(|| EngineError::UnknownUnitType {
                unit_type: unit_type.to_owned(),
            })
    }

    pub fn contains(&self, unit_type: &str) -> bool {
        self.specs.contains_key(unit_type)
    }

    /// Unit type names, sorted.
    pub fn unit_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.specs.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Data shared by all systems within a tick.
///
/// Systems treat it as read-only except for two channels: draining `input`
/// (see [`InputFrame::take_orders`]) and appending to `events`. Map metadata
/// is not here; it is the [`MapInfo`](crate::components::MapInfo) singleton
/// in the world.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    pub catalog: UnitCatalog,
    /// Player input for the current tick.
    pub input: InputFrame,
    /// Events emitted so far this tick.
    pub events: Vec<GameEvent>,
}

impl Resources {
    pub fn new(catalog: UnitCatalog) -> Self {
        Self {
            catalog,
            input: InputFrame::default(),
            events: Vec::new(),
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(UnitCatalog::from_config(config))
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
