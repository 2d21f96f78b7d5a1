//! The [`World`]: entity store, component columns, command buffer and dirty
//! set in one place.
//!
//! Direct methods (`attach`, `detach`, `destroy`, ...) apply immediately and
//! are meant for setup, tests and code running outside a query. Inside a
//! [`World::each`] pass, structural changes go through [`Commands`] and are
//! applied by [`World::flush`].
//!
//! Attaching a kind the entity already holds replaces the old value and
//! returns it. Every structural change is recorded in the dirty set.

use std::any::{Any, TypeId};
use std::fmt;

use crate::change::{ChangeKind, DirtyEntry, DirtySet};
use crate::command::{ApplyReport, CommandBuffer, Commands, SystemId};
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::query::{Query, ReadOnlyQuery};
use crate::storage::{Columns, SparseColumn};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentBundle
// ---------------------------------------------------------------------------

struct BundleEntry {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

/// An owned set of components to place on a new entity in one step.
///
/// Adding a type twice keeps only the last value.
#[derive(Default)]
pub struct ComponentBundle {
    entries: Vec<BundleEntry>,
}

impl ComponentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add`](Self::add).
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.add(value);
        self
    }

    /// Add a component, replacing any value of the same type.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        let type_id = TypeId::of::<T>();
        let entry = BundleEntry {
            type_id,
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        };
        match self.entries.iter_mut().find(|e| e.type_id == type_id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Whether the bundle holds a `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.iter().any(|e| e.type_id == TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ComponentBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.type_name))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Owns every entity and component of a simulation.
pub struct World {
    registry: ComponentRegistry,
    columns: Columns,
    allocator: EntityAllocator,
    commands: CommandBuffer,
    dirty: DirtySet,
    /// System that requests from [`commands`](Self::commands) are attributed to.
    issuer: SystemId,
}

impl World {
    /// Create an empty world with an unbounded entity space.
    pub fn new() -> Self {
        Self::with_allocator(EntityAllocator::new())
    }

    /// Create an empty world that holds at most `limit` live entities.
    pub fn with_entity_limit(limit: usize) -> Self {
        Self::with_allocator(EntityAllocator::with_limit(limit))
    }

    fn with_allocator(allocator: EntityAllocator) -> Self {
        Self {
            registry: ComponentRegistry::new(),
            columns: Columns::default(),
            allocator,
            commands: CommandBuffer::new(),
            dirty: DirtySet::new(),
            issuer: SystemId::EXTERNAL,
        }
    }

    // -- registration -------------------------------------------------------

    /// Register component kind `T` under `name` and create its column.
    ///
    /// Registering the same type again returns the existing id.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let (id, fresh) = self.registry.register::<T>(name);
        if fresh {
            self.columns.push::<T>();
        }
        id
    }

    /// The component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn kind_of<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| self.unknown(std::any::type_name::<T>()))
    }

    fn kind_by_name(&self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup_by_name(name)
            .ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> EcsError {
        EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.registry.registered_list(),
        }
    }

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    fn column<T: Component>(&self) -> Option<&SparseColumn<T>> {
        self.columns.typed(self.registry.lookup::<T>()?)
    }

    fn column_mut<T: Component>(&mut self) -> Option<&mut SparseColumn<T>> {
        let kind = self.registry.lookup::<T>()?;
        self.columns.typed_mut(kind)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with no components.
    pub fn create(&mut self) -> Result<EntityId, EcsError> {
        self.allocator.allocate()
    }

    /// Create an entity carrying every component in `bundle`.
    ///
    /// All kinds are checked before the entity is allocated, so on error
    /// nothing has been created.
    pub fn spawn(&mut self, bundle: ComponentBundle) -> Result<EntityId, EcsError> {
        let resolved = self.resolve_bundle(bundle)?;
        let entity = self.allocator.allocate()?;
        if let Err(e) = self.insert_resolved(entity, resolved) {
            self.destroy(entity);
            return Err(e);
        }
        Ok(entity)
    }

    /// Create an entity carrying a single component.
    pub fn spawn_with<T: Component>(&mut self, value: T) -> Result<EntityId, EcsError> {
        self.spawn(ComponentBundle::new().with(value))
    }

    /// Destroy `entity` and all its components. Returns `false` (and does
    /// nothing) if it was already gone.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        if !self.allocator.is_alive(entity) {
            return false;
        }
        for kind in self.columns.kinds_of(entity) {
            if let Some(column) = self.columns.erased_mut(kind) {
                if column.remove_entity(entity) {
                    self.dirty.record(entity, kind, ChangeKind::Removed);
                }
            }
        }
        self.allocator.deallocate(entity)
    }

    /// Whether `entity` is alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Live entities in ascending id order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.allocator.iter_alive().collect()
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`, replacing and returning any existing `T`.
    pub fn attach<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<Option<T>, EcsError> {
        let kind = self.kind_of::<T>()?;
        self.ensure_alive(entity)?;
        let column = self
            .columns
            .typed_mut::<T>(kind)
            .ok_or_else(|| EcsError::ComponentTypeMismatch {
                component: self.registry.name_of(kind).to_owned(),
            })?;
        let previous = column.insert(entity, value);
        let change = if previous.is_some() {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.dirty.record(entity, kind, change);
        Ok(previous)
    }

    /// Detach and return `entity`'s `T`. No-op (`None`) if absent, if the
    /// entity is dead, or if `T` was never registered.
    pub fn detach<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        let kind = self.registry.lookup::<T>()?;
        let removed = self.columns.typed_mut::<T>(kind)?.remove(entity)?;
        self.dirty.record(entity, kind, ChangeKind::Removed);
        Some(removed)
    }

    /// Whether `entity` holds a `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.column::<T>().is_some_and(|c| c.contains(entity))
    }

    /// Shared access to `entity`'s `T`.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.column::<T>()?.get(entity)
    }

    /// Mutable access to `entity`'s `T`.
    ///
    /// Not tracked: call [`mark_changed`](Self::mark_changed) if the edit
    /// must be replicated.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(entity)
    }

    /// Flag `entity`'s `T` as modified. Returns `false` if it has none.
    pub fn mark_changed<T: Component>(&mut self, entity: EntityId) -> bool {
        match self.registry.lookup::<T>() {
            Some(kind) if self.has::<T>(entity) => {
                self.dirty.record(entity, kind, ChangeKind::Modified);
                true
            }
            _ => false,
        }
    }

    /// Attach a component given as JSON, addressed by registered name.
    pub fn attach_json(
        &mut self,
        entity: EntityId,
        component_name: &str,
        value: &serde_json::Value,
    ) -> Result<(), EcsError> {
        let kind = self.kind_by_name(component_name)?;
        self.ensure_alive(entity)?;
        let column = self
            .columns
            .erased_mut(kind)
            .ok_or_else(|| EcsError::ComponentTypeMismatch {
                component: component_name.to_owned(),
            })?;
        let replaced = column.insert_json(entity, value).map_err(|e| {
            EcsError::ComponentDeserializationError {
                component: component_name.to_owned(),
                details: e.to_string(),
            }
        })?;
        let change = if replaced {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.dirty.record(entity, kind, change);
        Ok(())
    }

    /// Detach a component by registered name. `Ok(false)` if absent.
    pub fn detach_by_name(&mut self, entity: EntityId, component_name: &str) -> Result<bool, EcsError> {
        let kind = self.kind_by_name(component_name)?;
        Ok(self.detach_kind(entity, kind))
    }

    /// Serialize `entity`'s component of the given name.
    pub fn component_json(
        &self,
        entity: EntityId,
        component_name: &str,
    ) -> Result<Option<serde_json::Value>, EcsError> {
        let kind = self.kind_by_name(component_name)?;
        self.component_json_by_kind(entity, kind)
    }

    /// Serialize `entity`'s component of the given kind.
    pub fn component_json_by_kind(
        &self,
        entity: EntityId,
        kind: ComponentTypeId,
    ) -> Result<Option<serde_json::Value>, EcsError> {
        let Some(column) = self.columns.erased(kind) else {
            return Ok(None);
        };
        column.to_json(entity).transpose().map_err(|e| {
            EcsError::ComponentSerializationError {
                component: self.registry.name_of(kind).to_owned(),
                details: e.to_string(),
            }
        })
    }

    /// Registered names of the kinds `entity` holds, in registration order.
    pub fn component_names(&self, entity: EntityId) -> Vec<&str> {
        self.columns
            .kinds_of(entity)
            .into_iter()
            .map(|k| self.registry.name_of(k))
            .collect()
    }

    // -- singletons ---------------------------------------------------------

    /// The lowest-id entity holding a `T`, with its value.
    ///
    /// Deterministic but O(n) in the number of `T` holders; intended for
    /// singleton-like data.
    pub fn first<T: Component>(&self) -> Option<(EntityId, &T)> {
        self.column::<T>()?.iter().min_by_key(|(entity, _)| *entity)
    }

    /// Like [`first`](Self::first), but a missing `T` is an error: use for
    /// data that world setup guarantees (map metadata and the like).
    pub fn singleton<T: Component>(&self) -> Result<(EntityId, &T), EcsError> {
        self.first::<T>().ok_or_else(|| EcsError::MissingSingleton {
            component: self
                .registry
                .lookup::<T>()
                .map(|k| self.registry.name_of(k).to_owned())
                .unwrap_or_else(|| std::any::type_name::<T>().to_owned()),
        })
    }

    // -- queries ------------------------------------------------------------

    /// Visit every live entity holding all kinds in `Q`, in ascending id
    /// order, with mutable or shared references as `Q` requests.
    ///
    /// The set of visited entities is fixed before the first visit. The
    /// visitor may edit the data it is handed and request structural
    /// changes through the [`Commands`] argument; those are applied at the
    /// next [`flush`](Self::flush), never during the pass.
    ///
    /// Cost is proportional to the number of holders of the rarest requested
    /// kind (candidate set, k): one O(1) lookup per other shared kind, and an
    /// O(k log k) split per mutable kind. The size of the other columns does
    /// not matter.
    ///
    /// Returns the number of entities visited.
    pub fn each<'w, Q, F>(&'w mut self, mut visit: F) -> Result<usize, EcsError>
    where
        Q: Query<'w>,
        F: FnMut(EntityId, Q::Item, &mut Commands<'_>),
    {
        let World {
            registry,
            columns,
            allocator,
            commands,
            dirty,
            issuer,
        } = self;
        let rows = Q::fetch_rows(registry, columns)?;
        let visited = rows.len();
        let mut cmds = Commands::new(commands, allocator, registry, dirty, *issuer);
        for (entity, item) in rows {
            visit(entity, item, &mut cmds);
        }
        Ok(visited)
    }

    /// Collect the matches of `Q` with the references it requests.
    pub fn query_mut<'w, Q: Query<'w>>(&'w mut self) -> Result<Vec<(EntityId, Q::Item)>, EcsError> {
        Q::fetch_rows(&self.registry, &mut self.columns)
    }

    /// Collect the matches of a read-only `Q` (tuple of `&T`).
    pub fn query<'w, Q: ReadOnlyQuery<'w>>(&'w self) -> Result<Vec<(EntityId, Q)>, EcsError> {
        Q::fetch_rows(&self.registry, &self.columns)
    }

    // -- deferred commands --------------------------------------------------

    /// Handle for queuing structural changes outside a query.
    pub fn commands(&mut self) -> Commands<'_> {
        Commands::new(
            &mut self.commands,
            &mut self.allocator,
            &self.registry,
            &mut self.dirty,
            self.issuer,
        )
    }

    /// Attribute subsequent requests to `issuer`.
    pub fn set_issuer(&mut self, issuer: SystemId) {
        self.issuer = issuer;
    }

    /// The system requests are currently attributed to.
    pub fn issuer(&self) -> SystemId {
        self.issuer
    }

    /// Apply every queued request in FIFO order.
    pub fn flush(&mut self) -> ApplyReport {
        let mut buffer = std::mem::take(&mut self.commands);
        let report = buffer.apply(self);
        self.commands = buffer;
        report
    }

    /// Number of queued requests.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// The command buffer (read-only).
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.commands
    }

    // -- change tracking ----------------------------------------------------

    /// Take all pending changes, sorted by entity then component.
    pub fn drain_dirty(&mut self) -> Vec<DirtyEntry> {
        self.dirty.drain()
    }

    /// Pending changes (read-only).
    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    // -- hashing ------------------------------------------------------------

    /// BLAKE3 hex digest of every live entity and its components.
    ///
    /// Entities are visited in id order and components in name order, each
    /// serialized as JSON, so equal worlds hash equally regardless of
    /// insertion history. Pending commands and the dirty set are not hashed.
    pub fn state_hash(&self) -> Result<String, EcsError> {
        let mut kinds: Vec<(ComponentTypeId, &str)> = (0..self.registry.len())
            .map(|i| {
                let kind = ComponentTypeId(i as u32);
                (kind, self.registry.name_of(kind))
            })
            .collect();
        kinds.sort_by(|a, b| a.1.cmp(b.1));

        let mut hasher = blake3::Hasher::new();
        for entity in self.allocator.iter_alive() {
            hasher.update(&entity.to_raw().to_le_bytes());
            for (kind, name) in &kinds {
                if let Some(json) = self.component_json_by_kind(entity, *kind)? {
                    hasher.update(name.as_bytes());
                    hasher.update(b"=");
                    hasher.update(json.to_string().as_bytes());
                    hasher.update(b";");
                }
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    // -- crate-internal helpers used by the command buffer ------------------

    fn resolve_bundle(
        &self,
        bundle: ComponentBundle,
    ) -> Result<Vec<(ComponentTypeId, Box<dyn Any + Send>)>, EcsError> {
        bundle
            .entries
            .into_iter()
            .map(|entry| {
                self.registry
                    .lookup_type_id(entry.type_id)
                    .map(|kind| (kind, entry.value))
                    .ok_or_else(|| self.unknown(entry.type_name))
            })
            .collect()
    }

    fn insert_resolved(
        &mut self,
        entity: EntityId,
        resolved: Vec<(ComponentTypeId, Box<dyn Any + Send>)>,
    ) -> Result<(), EcsError> {
        for (kind, value) in resolved {
            self.insert_boxed(entity, kind, value)?;
        }
        Ok(())
    }

    fn insert_boxed(
        &mut self,
        entity: EntityId,
        kind: ComponentTypeId,
        value: Box<dyn Any + Send>,
    ) -> Result<(), EcsError> {
        let mismatch = || EcsError::ComponentTypeMismatch {
            component: self.registry.name_of(kind).to_owned(),
        };
        let column = self.columns.erased_mut(kind).ok_or_else(mismatch)?;
        let replaced = column.insert_boxed(entity, value).map_err(|_| mismatch())?;
        let change = if replaced {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.dirty.record(entity, kind, change);
        Ok(())
    }

    /// Fill an already-allocated entity with `bundle`.
    pub(crate) fn insert_bundle(
        &mut self,
        entity: EntityId,
        bundle: ComponentBundle,
    ) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        let resolved = self.resolve_bundle(bundle)?;
        self.insert_resolved(entity, resolved)
    }

    pub(crate) fn attach_erased(
        &mut self,
        entity: EntityId,
        type_id: TypeId,
        type_name: &'static str,
        value: Box<dyn Any + Send>,
    ) -> Result<(), EcsError> {
        let kind = self
            .registry
            .lookup_type_id(type_id)
            .ok_or_else(|| self.unknown(type_name))?;
        self.ensure_alive(entity)?;
        self.insert_boxed(entity, kind, value)
    }

    pub(crate) fn detach_erased(&mut self, entity: EntityId, type_id: TypeId) -> bool {
        match self.registry.lookup_type_id(type_id) {
            Some(kind) => self.detach_kind(entity, kind),
            None => false,
        }
    }

    fn detach_kind(&mut self, entity: EntityId, kind: ComponentTypeId) -> bool {
        let removed = self
            .columns
            .erased_mut(kind)
            .is_some_and(|c| c.remove_entity(entity));
        if removed {
            self.dirty.record(entity, kind, ChangeKind::Removed);
        }
        removed
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health(u32);

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct MapInfo {
        width: u32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Unregistered;

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Health>("health");
        world.register_component::<MapInfo>("map_info");
        world
    }

    #[test]
    fn attach_replaces_and_returns_previous() {
        let mut world = setup_world();
        let e = world.create().unwrap();
        assert_eq!(world.attach(e, Health(1)).unwrap(), None);
        assert_eq!(world.attach(e, Health(2)).unwrap(), Some(Health(1)));
        assert_eq!(world.get::<Health>(e), Some(&Health(2)));
    }

    #[test]
    fn attach_on_stale_entity_is_an_error() {
        let mut world = setup_world();
        let e = world.create().unwrap();
        world.destroy(e);
        assert!(matches!(
            world.attach(e, Health(1)),
            Err(EcsError::StaleEntity { .. })
        ));
    }

    #[test]
    fn attach_unregistered_kind_is_an_error() {
        let mut world = setup_world();
        let e = world.create().unwrap();
        let err = world.attach(e, Unregistered).unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));
        assert!(err.to_string().contains("health"));
    }

    #[test]
    fn detach_is_noop_when_absent() {
        let mut world = setup_world();
        let e = world.spawn_with(Health(3)).unwrap();
        assert_eq!(world.detach::<Position>(e), None);
        assert_eq!(world.detach::<Unregistered>(e), None);
        assert_eq!(world.detach::<Health>(e), Some(Health(3)));
        assert_eq!(world.detach::<Health>(e), None);
    }

    #[test]
    fn destroy_removes_every_component_and_is_idempotent() {
        let mut world = setup_world();
        let e = world
            .spawn(
                ComponentBundle::new()
                    .with(Position { x: 1, y: 2 })
                    .with(Health(9)),
            )
            .unwrap();
        assert!(world.destroy(e));
        assert!(!world.has::<Position>(e));
        assert!(!world.has::<Health>(e));
        assert!(!world.destroy(e));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn recycled_index_does_not_see_old_components() {
        let mut world = setup_world();
        let old = world.spawn_with(Health(1)).unwrap();
        world.destroy(old);
        let new = world.create().unwrap();
        assert_eq!(new.index(), old.index());
        assert!(!world.has::<Health>(new));
        assert_eq!(world.get::<Health>(old), None);
    }

    #[test]
    fn spawn_with_unknown_kind_creates_nothing() {
        let mut world = setup_world();
        let result = world.spawn(ComponentBundle::new().with(Health(1)).with(Unregistered));
        assert!(result.is_err());
        assert_eq!(world.entity_count(), 0);
        assert!(world.dirty().is_empty());
    }

    #[test]
    fn entity_limit_is_reported() {
        let mut world = World::with_entity_limit(1);
        world.create().unwrap();
        assert!(matches!(
            world.create(),
            Err(EcsError::EntitySpaceExhausted { limit: 1 })
        ));
    }

    #[test]
    fn bundle_keeps_last_value_per_type() {
        let mut world = setup_world();
        let bundle = ComponentBundle::new().with(Health(1)).with(Health(2));
        assert_eq!(bundle.len(), 1);
        let e = world.spawn(bundle).unwrap();
        assert_eq!(world.get::<Health>(e), Some(&Health(2)));
    }

    #[test]
    fn structural_changes_are_tracked() {
        let mut world = setup_world();
        let e = world.spawn_with(Health(1)).unwrap();
        let health = world.registry().lookup::<Health>().unwrap();
        assert_eq!(world.dirty().get(e, health), Some(ChangeKind::Added));

        world.drain_dirty();
        world.attach(e, Health(2)).unwrap();
        assert_eq!(world.dirty().get(e, health), Some(ChangeKind::Modified));

        world.drain_dirty();
        world.destroy(e);
        assert_eq!(world.dirty().get(e, health), Some(ChangeKind::Removed));
    }

    #[test]
    fn mark_changed_requires_the_component() {
        let mut world = setup_world();
        let e = world.spawn_with(Health(1)).unwrap();
        world.drain_dirty();
        assert!(!world.mark_changed::<Position>(e));
        assert!(world.mark_changed::<Health>(e));
        assert_eq!(world.drain_dirty().len(), 1);
    }

    #[test]
    fn first_is_lowest_id_and_singleton_reports_absence() {
        let mut world = setup_world();
        assert!(matches!(
            world.singleton::<MapInfo>(),
            Err(EcsError::MissingSingleton { ref component }) if component == "map_info"
        ));

        let a = world.spawn_with(MapInfo { width: 1 }).unwrap();
        let _b = world.spawn_with(MapInfo { width: 2 }).unwrap();
        // Move `a` to the back of the dense array.
        world.detach::<MapInfo>(a);
        world.attach(a, MapInfo { width: 3 }).unwrap();

        let (found, info) = world.first::<MapInfo>().unwrap();
        assert_eq!(found, a);
        assert_eq!(info.width, 3);
        assert!(world.singleton::<MapInfo>().is_ok());
    }

    #[test]
    fn json_access_by_name() {
        let mut world = setup_world();
        let e = world.create().unwrap();
        world
            .attach_json(e, "position", &serde_json::json!({"x": 5, "y": 6}))
            .unwrap();
        assert_eq!(world.get::<Position>(e), Some(&Position { x: 5, y: 6 }));
        assert_eq!(
            world.component_json(e, "position").unwrap(),
            Some(serde_json::json!({"x": 5, "y": 6}))
        );
        assert_eq!(world.component_names(e), vec!["position"]);

        let bad = world.attach_json(e, "position", &serde_json::json!("nope"));
        assert!(matches!(bad, Err(EcsError::ComponentDeserializationError { .. })));
        assert!(world.attach_json(e, "nothing", &serde_json::json!(1)).is_err());

        assert!(world.detach_by_name(e, "position").unwrap());
        assert!(!world.detach_by_name(e, "position").unwrap());
    }

    #[test]
    fn state_hash_ignores_insertion_order() {
        let build = |flip: bool| {
            let mut world = setup_world();
            let e = world.create().unwrap();
            if flip {
                world.attach(e, Health(4)).unwrap();
                world.attach(e, Position { x: 1, y: 1 }).unwrap();
            } else {
                world.attach(e, Position { x: 1, y: 1 }).unwrap();
                world.attach(e, Health(4)).unwrap();
            }
            world.state_hash().unwrap()
        };
        assert_eq!(build(true), build(false));
    }

    #[test]
    fn state_hash_tracks_data() {
        let mut world = setup_world();
        let e = world.spawn_with(Health(4)).unwrap();
        let before = world.state_hash().unwrap();
        world.get_mut::<Health>(e).unwrap().0 = 5;
        assert_ne!(before, world.state_hash().unwrap());
    }
}
