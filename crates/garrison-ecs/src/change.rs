//! Change tracking for replication.
//!
//! The [`DirtySet`] accumulates one [`ChangeKind`] per `(entity, component)`
//! pair touched since the last drain. Structural changes (attach, detach,
//! destroy) are recorded by the world automatically; in-place data mutation
//! through a query is recorded only when the system calls `mark_changed`.
//!
//! Repeated changes to the same pair within one drain window collapse:
//!
//! | earlier    | later      | result     |
//! |------------|------------|------------|
//! | `Added`    | `Modified` | `Added`    |
//! | `Added`    | `Removed`  | (dropped)  |
//! | `Removed`  | `Added`    | `Modified` |
//! | otherwise  | `x`        | `x`        |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// What happened to a component since the last drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The component was attached where none existed.
    Added,
    /// The component's data changed (or was replaced by a new attach).
    Modified,
    /// The component was detached, or its entity destroyed.
    Removed,
}

impl ChangeKind {
    /// Fold a later change into an earlier one. `None` means the pair no
    /// longer needs replicating.
    fn merge(self, later: ChangeKind) -> Option<ChangeKind> {
        match (self, later) {
            (ChangeKind::Added, ChangeKind::Modified) => Some(ChangeKind::Added),
            (ChangeKind::Added, ChangeKind::Removed) => None,
            (ChangeKind::Removed, ChangeKind::Added) => Some(ChangeKind::Modified),
            (_, later) => Some(later),
        }
    }
}

// ---------------------------------------------------------------------------
// DirtyEntry
// ---------------------------------------------------------------------------

/// One drained change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyEntry {
    pub entity: EntityId,
    pub component: ComponentTypeId,
    pub change: ChangeKind,
}

// ---------------------------------------------------------------------------
// DirtySet
// ---------------------------------------------------------------------------

/// Pending changes keyed by `(entity, component)`, kept sorted so a drain is
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct DirtySet {
    entries: BTreeMap<(EntityId, ComponentTypeId), ChangeKind>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, collapsing it with any pending change for the pair.
    pub fn record(&mut self, entity: EntityId, component: ComponentTypeId, change: ChangeKind) {
        let key = (entity, component);
        match self.entries.get(&key).copied() {
            None => {
                self.entries.insert(key, change);
            }
            Some(earlier) => match earlier.merge(change) {
                Some(merged) => {
                    self.entries.insert(key, merged);
                }
                None => {
                    self.entries.remove(&key);
                }
            },
        }
    }

    /// Pending change for a pair, if any.
    pub fn get(&self, entity: EntityId, component: ComponentTypeId) -> Option<ChangeKind> {
        self.entries.get(&(entity, component)).copied()
    }

    /// Whether anything about `entity` is pending.
    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.entries
            .range((entity, ComponentTypeId(0))..=(entity, ComponentTypeId(u32::MAX)))
            .next()
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every pending change, ordered by entity then component, and
    /// leave the set empty.
    pub fn drain(&mut self) -> Vec<DirtyEntry> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|((entity, component), change)| DirtyEntry {
                entity,
                component,
                change,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const POS: ComponentTypeId = ComponentTypeId(0);
    const UNIT: ComponentTypeId = ComponentTypeId(1);

    fn e(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn added_then_modified_stays_added() {
        let mut set = DirtySet::new();
        set.record(e(1), POS, ChangeKind::Added);
        set.record(e(1), POS, ChangeKind::Modified);
        assert_eq!(set.get(e(1), POS), Some(ChangeKind::Added));
    }

    #[test]
    fn added_then_removed_cancels() {
        let mut set = DirtySet::new();
        set.record(e(1), POS, ChangeKind::Added);
        set.record(e(1), POS, ChangeKind::Removed);
        assert!(set.is_empty());
    }

    #[test]
    fn removed_then_added_is_modified() {
        let mut set = DirtySet::new();
        set.record(e(1), POS, ChangeKind::Removed);
        set.record(e(1), POS, ChangeKind::Added);
        assert_eq!(set.get(e(1), POS), Some(ChangeKind::Modified));
    }

    #[test]
    fn modified_then_removed_is_removed() {
        let mut set = DirtySet::new();
        set.record(e(1), POS, ChangeKind::Modified);
        set.record(e(1), POS, ChangeKind::Removed);
        assert_eq!(set.get(e(1), POS), Some(ChangeKind::Removed));
    }

    #[test]
    fn drain_is_sorted_and_clears() {
        let mut set = DirtySet::new();
        set.record(e(3), UNIT, ChangeKind::Modified);
        set.record(e(1), UNIT, ChangeKind::Modified);
        set.record(e(1), POS, ChangeKind::Added);

        let drained = set.drain();
        let keys: Vec<_> = drained.iter().map(|d| (d.entity, d.component)).collect();
        assert_eq!(keys, vec![(e(1), POS), (e(1), UNIT), (e(3), UNIT)]);
        assert!(set.is_empty());
        assert!(set.drain().is_empty());
    }

    #[test]
    fn contains_entity_checks_all_components() {
        let mut set = DirtySet::new();
        set.record(e(2), UNIT, ChangeKind::Modified);
        assert!(set.contains_entity(e(2)));
        assert!(!set.contains_entity(e(1)));
    }
}
