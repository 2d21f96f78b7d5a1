//! Sparse-set component storage.
//!
//! Each registered kind owns one [`SparseColumn`]: a sparse array indexed by
//! entity index pointing into a packed dense array of values. Insert, lookup
//! and remove are O(1); removal swaps the last dense slot into the hole.
//!
//! The world holds columns type-erased behind [`ErasedColumn`] so that
//! destroy, JSON access and hashing can walk every kind without knowing the
//! concrete types.

use std::any::Any;

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// SparseColumn
// ---------------------------------------------------------------------------

/// Storage for every instance of one component kind.
#[derive(Debug)]
pub struct SparseColumn<T> {
    /// Entity index -> dense slot.
    sparse: Vec<Option<u32>>,
    /// Owner of each dense slot.
    entities: Vec<EntityId>,
    dense: Vec<T>,
}

impl<T> SparseColumn<T> {
    /// Create an empty column.
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            dense: Vec::new(),
        }
    }

    /// Number of entities holding this kind.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether no entity holds this kind.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Entities holding this kind, in dense (unspecified) order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Dense slot of `entity`, if it holds this kind.
    #[inline]
    pub(crate) fn slot(&self, entity: EntityId) -> Option<usize> {
        let slot = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.entities[slot] == entity).then_some(slot)
    }

    /// Whether `entity` holds this kind.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    /// Shared access to `entity`'s value.
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slot(entity).map(|s| &self.dense[s])
    }

    /// Mutable access to `entity`'s value.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slot(entity).map(move |s| &mut self.dense[s])
    }

    /// Insert or replace `entity`'s value, returning the previous one.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(slot) = self.slot(entity) {
            return Some(std::mem::replace(&mut self.dense[slot], value));
        }

        let idx = entity.index() as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }
        // A leftover slot for an older generation of this index is dropped.
        if let Some(old) = self.sparse[idx] {
            let stale = self.entities[old as usize];
            self.remove(stale);
        }
        self.sparse[idx] = Some(self.dense.len() as u32);
        self.entities.push(entity);
        self.dense.push(value);
        None
    }

    /// Remove `entity`'s value, if present.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.slot(entity)?;
        self.sparse[entity.index() as usize] = None;
        let last = self.dense.len() - 1;
        self.entities.swap_remove(slot);
        let value = self.dense.swap_remove(slot);
        if slot != last {
            let moved = self.entities[slot];
            self.sparse[moved.index() as usize] = Some(slot as u32);
        }
        Some(value)
    }

    /// Iterate `(entity, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Split borrow used by mutable queries.
    pub(crate) fn parts_mut(&mut self) -> (&[Option<u32>], &[EntityId], &mut [T]) {
        (&self.sparse, &self.entities, &mut self.dense)
    }
}

impl<T> Default for SparseColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ErasedColumn
// ---------------------------------------------------------------------------

/// Object-safe view of a [`SparseColumn`] of unknown type.
pub(crate) trait ErasedColumn: Any + Send + Sync {
    fn len(&self) -> usize;
    fn entities(&self) -> &[EntityId];
    fn contains(&self, entity: EntityId) -> bool;
    /// Remove `entity`'s value; `true` if one was present.
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    /// Insert a boxed value; `Ok(true)` if it replaced an existing one.
    fn insert_boxed(&mut self, entity: EntityId, value: Box<dyn Any + Send>)
        -> Result<bool, Box<dyn Any + Send>>;
    /// Deserialize and insert; `Ok(true)` if it replaced an existing one.
    fn insert_json(&mut self, entity: EntityId, value: &serde_json::Value)
        -> Result<bool, serde_json::Error>;
    fn to_json(&self, entity: EntityId) -> Option<Result<serde_json::Value, serde_json::Error>>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for SparseColumn<T> {
    fn len(&self) -> usize {
        SparseColumn::len(self)
    }

    fn entities(&self) -> &[EntityId] {
        SparseColumn::entities(self)
    }

    fn contains(&self, entity: EntityId) -> bool {
        SparseColumn::contains(self, entity)
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn insert_boxed(
        &mut self,
        entity: EntityId,
        value: Box<dyn Any + Send>,
    ) -> Result<bool, Box<dyn Any + Send>> {
        let value = value.downcast::<T>()?;
        Ok(self.insert(entity, *value).is_some())
    }

    fn insert_json(
        &mut self,
        entity: EntityId,
        value: &serde_json::Value,
    ) -> Result<bool, serde_json::Error> {
        let typed: T = serde::Deserialize::deserialize(value)?;
        Ok(self.insert(entity, typed).is_some())
    }

    fn to_json(&self, entity: EntityId) -> Option<Result<serde_json::Value, serde_json::Error>> {
        self.get(entity).map(serde_json::to_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// All component columns of a world, indexed by [`ComponentTypeId`].
#[derive(Default)]
pub struct Columns {
    inner: Vec<Box<dyn ErasedColumn>>,
}

impl Columns {
    pub(crate) fn push<T: Component>(&mut self) {
        self.inner.push(Box::new(SparseColumn::<T>::new()));
    }

    pub(crate) fn erased(&self, kind: ComponentTypeId) -> Option<&dyn ErasedColumn> {
        self.inner.get(kind.index()).map(|c| c.as_ref())
    }

    pub(crate) fn erased_mut(
        &mut self,
        kind: ComponentTypeId,
    ) -> Option<&mut (dyn ErasedColumn + 'static)> {
        self.inner.get_mut(kind.index()).map(|c| c.as_mut())
    }

    pub(crate) fn typed<T: Component>(&self, kind: ComponentTypeId) -> Option<&SparseColumn<T>> {
        self.erased(kind)?.as_any().downcast_ref()
    }

    pub(crate) fn typed_mut<T: Component>(
        &mut self,
        kind: ComponentTypeId,
    ) -> Option<&mut SparseColumn<T>> {
        self.erased_mut(kind)?.as_any_mut().downcast_mut()
    }

    /// Kinds `entity` currently holds, in id order.
    pub(crate) fn kinds_of(&self, entity: EntityId) -> Vec<ComponentTypeId> {
        self.inner
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains(entity))
            .map(|(i, _)| ComponentTypeId(i as u32))
            .collect()
    }

    /// Split into per-kind slots so a query can hold several columns
    /// mutably at once.
    pub(crate) fn split_mut(&mut self) -> ColumnSlots<'_> {
        ColumnSlots {
            slots: self.inner.iter_mut().map(Some).collect(),
        }
    }
}

/// Disjoint mutable borrows of individual columns.
pub(crate) struct ColumnSlots<'w> {
    slots: Vec<Option<&'w mut Box<dyn ErasedColumn>>>,
}

impl<'w> ColumnSlots<'w> {
    /// Take the column for `kind`. A kind can be taken once.
    pub(crate) fn take<T: Component>(
        &mut self,
        kind: ComponentTypeId,
        name: &str,
    ) -> Result<&'w mut SparseColumn<T>, EcsError> {
        let column = self
            .slots
            .get_mut(kind.index())
            .and_then(Option::take)
            .ok_or_else(|| EcsError::AliasedQuery {
                component: name.to_owned(),
            })?;
        (**column)
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| EcsError::ComponentTypeMismatch {
                component: name.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
