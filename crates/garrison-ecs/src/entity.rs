//! Entity handles and the slot allocator behind them.
//!
//! Handles are generational: each slot remembers how many times it has been
//! freed, and that count travels in the handle. Once a slot is recycled, a
//! handle minted for its previous occupant no longer matches and every store
//! operation treats it as dead.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Opaque entity handle, `[generation | index]` packed into a `u64`.
///
/// Sorts by slot index and then by generation; this is the visit order of
/// every query.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self(u64::from(generation) << INDEX_BITS | u64::from(index))
    }

    /// Slot number.
    #[inline]
    pub fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// How many times the slot had been freed when this handle was issued.
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }

    /// Packed form used on the wire.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index(), self.generation()).cmp(&(other.index(), other.generation()))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    occupied: bool,
}

/// Hands out [`EntityId`]s and takes them back.
///
/// Freed slots are reused oldest-first, so one slot does not burn through
/// its generations while others sit idle. With a limit set, at most that
/// many handles are live at once.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    /// Freed slot numbers, oldest first.
    vacant: VecDeque<u32>,
    live: usize,
    limit: Option<usize>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator that holds at most `limit` live entities.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Issue a handle, reusing the oldest vacant slot if there is one.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntitySpaceExhausted`] once the live limit (or the 32-bit
    /// slot space) is used up.
    pub fn allocate(&mut self) -> Result<EntityId, EcsError> {
        let capacity = self.limit.unwrap_or(u32::MAX as usize);
        if self.live >= capacity {
            return Err(EcsError::EntitySpaceExhausted { limit: capacity });
        }

        let index = match self.vacant.pop_front() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| EcsError::EntitySpaceExhausted { limit: capacity })?;
                self.slots.push(Slot {
                    generation: 0,
                    occupied: false,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        self.live += 1;
        Ok(EntityId::new(index, slot.generation))
    }

    /// Free `id`'s slot and retire its generation. Returns `false` for a
    /// handle that is already dead or stale.
    ///
    /// A slot whose generation is exhausted is never handed out again, so no
    /// handle can come back to life through wrap-around.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let slot = &mut self.slots[id.index() as usize];
        slot.occupied = false;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.vacant.push_back(id.index());
            }
            None => debug!(slot = id.index(), "slot generations exhausted, retiring it"),
        }
        self.live -= 1;
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index() as usize)
            .is_some_and(|slot| slot.occupied && slot.generation == id.generation())
    }

    pub fn alive_count(&self) -> usize {
        self.live
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Live handles in ascending slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .zip(0u32..)
            .filter(|(slot, _)| slot.occupied)
            .map(|(slot, index)| EntityId::new(index, slot.generation))
    }
}
