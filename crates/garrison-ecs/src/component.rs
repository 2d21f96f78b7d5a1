//! Component kinds and their registry.
//!
//! Every component type stored in a [`World`](crate::world::World) must be
//! registered first. Registration assigns a stable [`ComponentTypeId`] (in
//! registration order) and a name, which is what the replication layer and
//! JSON-driven commands use to address the kind.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for data that can live in a component column.
///
/// Blanket-implemented for every plain data type that can be cloned, sent
/// across threads and round-tripped through serde.
pub trait Component: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Component for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this kind's column in the world.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// What the registry knows about one kind.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    /// Name on the wire and in JSON commands.
    pub name: String,
    pub type_id: TypeId,
    /// `std::any::type_name` of the Rust type, for diagnostics only.
    pub type_name: &'static str,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Two-way mapping between Rust types, wire names and [`ComponentTypeId`]s.
///
/// Registering a type a second time is a no-op that returns the original id;
/// the second name is not recorded.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Indexed by [`ComponentTypeId`].
    kinds: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Sorted, so name listings come out in a stable order.
    by_name: BTreeMap<String, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`. The flag is `true` when `T` was not known
    /// before.
    ///
    /// # Panics
    ///
    /// Panics if another type already uses `name`.
    pub(crate) fn register<T: Component>(&mut self, name: &str) -> (ComponentTypeId, bool) {
        if let Some(id) = self.lookup::<T>() {
            return (id, false);
        }
        if self.by_name.contains_key(name) {
            panic!("component name '{name}' is already registered for a different type");
        }

        let id = ComponentTypeId(self.kinds.len() as u32);
        let info = ComponentInfo {
            id,
            name: name.to_owned(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        };
        self.by_type.insert(info.type_id, id);
        self.by_name.insert(info.name.clone(), id);
        self.kinds.push(info);
        (id, true)
    }

    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.lookup_type_id(TypeId::of::<T>())
    }

    pub fn lookup_type_id(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.kinds.get(id.index())
    }

    /// Wire name of `id`, or `"?"` for an id this registry never issued.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id).map_or("?", |info| info.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// All wire names in lexical order.
    pub fn registered_names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    /// `"a, b, c"`, for error messages.
    pub(crate) fn registered_list(&self) -> String {
        self.registered_names().join(", ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Pos {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Label(String);

    #[test]
    fn lookup_by_type_and_name() {
        let mut reg = ComponentRegistry::new();
        let (id, fresh) = reg.register::<Pos>("position");
        assert!(fresh);
        assert_eq!(reg.lookup::<Pos>(), Some(id));
        assert_eq!(reg.lookup_by_name("position"), Some(id));
        assert_eq!(reg.name_of(id), "position");
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let (id1, _) = reg.register::<Pos>("position");
        let (id2, fresh) = reg.register::<Pos>("position_again");
        assert_eq!(id1, id2);
        assert!(!fresh);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup_by_name("position_again"), None);
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut reg = ComponentRegistry::new();
        let (p, _) = reg.register::<Pos>("position");
        let (l, _) = reg.register::<Label>("label");
        assert!(p < l);
        assert_eq!(reg.registered_names(), vec!["label", "position"]);
    }

    #[test]
    #[should_panic(expected = "already registered for a different type")]
    fn name_clash_panics() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("thing");
        reg.register::<Label>("thing");
    }

    #[test]
    fn info_and_unknown_ids() {
        let mut reg = ComponentRegistry::new();
        let (id, _) = reg.register::<Pos>("position");
        let info = reg.get_info(id).unwrap();
        assert_eq!(reg.lookup_type_id(TypeId::of::<Pos>()), Some(info.id));
        assert!(info.type_name.ends_with("Pos"));
        assert_eq!(reg.name_of(ComponentTypeId(9)), "?");
    }
}
