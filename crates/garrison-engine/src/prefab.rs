//! Prefab factory: fully-formed entities in one store operation.
//!
//! Every constructor validates its inputs first and then creates the entity
//! with its complete component set via [`World::spawn`], so a failure never
//! leaves a partial entity behind.

use garrison_ecs::entity::EntityId;
use garrison_ecs::world::{ComponentBundle, World};
use tracing::debug;

use crate::components::{
    register_all, Base, Health, Label, MapInfo, PlayerOwned, Position, Unit, UnitKind,
};
use crate::config::MapSettings;
use crate::error::EngineError;
use crate::resources::UnitCatalog;

/// Create a world with every game component registered and the
/// [`MapInfo`] singleton in place.
pub fn new_world(map: &MapSettings) -> Result<World, EngineError> {
    let mut world = World::new();
    register_all(&mut world);
    world.spawn_with(MapInfo {
        width: map.width,
        height: map.height,
    })?;
    Ok(world)
}

/// Check that `position` lies on the map.
pub fn check_bounds(map_info: &MapInfo, position: &Position) -> Result<(), EngineError> {
    if map_info.contains(position) {
        Ok(())
    } else {
        Err(EngineError::OutOfBounds {
            x: position.x,
            y: position.y,
            width: map_info.width,
            height: map_info.height,
        })
    }
}

/// The full component set of a fresh unit of `unit_type`, validated.
///
/// Used directly by systems that reserve the entity through deferred
/// commands; [`spawn_unit`] wraps it for immediate creation.
///
/// # Errors
///
/// - [`EngineError::UnknownUnitType`] if the catalog has no such type.
/// - [`EngineError::OutOfBounds`] if `position` is off the map.
pub fn unit_bundle(
    catalog: &UnitCatalog,
    map_info: &MapInfo,
    unit_type: &str,
    position: Position,
    owner: u32,
) -> Result<ComponentBundle, EngineError> {
    let spec = catalog.spec(unit_type)?;
    check_bounds(map_info, &position)?;
    Ok(ComponentBundle::new()
        .with(UnitKind {
            name: unit_type.to_owned(),
        })
        .with(Unit::default())
        .with(position)
        .with(PlayerOwned { id: owner })
        .with(Health { hp: spec.health }))
}

/// Spawn a unit of `unit_type` at `position` for `owner`.
///
/// # Errors
///
/// Everything [`unit_bundle`] rejects, plus [`EngineError::Ecs`] if the
/// entity space is exhausted.
pub fn spawn_unit(
    world: &mut World,
    catalog: &UnitCatalog,
    map_info: &MapInfo,
    unit_type: &str,
    position: Position,
    owner: u32,
) -> Result<EntityId, EngineError> {
    let bundle = unit_bundle(catalog, map_info, unit_type, position, owner)?;
    let unit = world.spawn(bundle)?;
    debug!(entity = %unit, unit_type, owner, x = position.x, y = position.y, "unit spawned");
    Ok(unit)
}

/// Spawn an idle base holding `resource` for `owner`.
pub fn spawn_base(
    world: &mut World,
    map_info: &MapInfo,
    position: Position,
    owner: u32,
    resource: u32,
) -> Result<EntityId, EngineError> {
    check_bounds(map_info, &position)?;

    let base = world.spawn(
        ComponentBundle::new()
            .with(Base { resource })
            .with(Unit::default())
            .with(position)
            .with(Label {
                text: resource.to_string(),
            })
            .with(PlayerOwned { id: owner }),
    )?;
    debug!(entity = %base, owner, resource, "base spawned");
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use garrison_ecs::EcsError;

    fn setup_world() -> (World, UnitCatalog, MapInfo) {
        let config = GameConfig::default();
        let world = new_world(&MapSettings {
            width: 10,
            height: 10,
        })
        .unwrap();
        let map_info = *world.singleton::<MapInfo>().unwrap().1;
        (world, UnitCatalog::from_config(&config), map_info)
    }

    #[test]
    fn new_world_has_map_singleton() {
        let (world, _, map_info) = setup_world();
        assert_eq!(map_info.width, 10);
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn unit_gets_full_component_set() {
        let (mut world, catalog, map_info) = setup_world();
        let pos = Position { x: 3, y: 4 };
        let unit = spawn_unit(&mut world, &catalog, &map_info, "scout", pos, 2).unwrap();

        assert_eq!(world.get::<Position>(unit), Some(&pos));
        assert_eq!(world.get::<PlayerOwned>(unit), Some(&PlayerOwned { id: 2 }));
        assert_eq!(world.get::<UnitKind>(unit).unwrap().name, "scout");
        assert_eq!(world.get::<Health>(unit), Some(&Health { hp: 30 }));
        assert_eq!(world.get::<Unit>(unit), Some(&Unit::default()));
        assert!(!world.has::<Base>(unit));
    }

    #[test]
    fn invalid_spawns_create_nothing() {
        let (mut world, catalog, map_info) = setup_world();
        let before = world.entity_count();

        let unknown = spawn_unit(&mut world, &catalog, &map_info, "dragon", Position { x: 0, y: 0 }, 1);
        assert!(matches!(unknown, Err(EngineError::UnknownUnitType { .. })));

        let off_map = spawn_unit(&mut world, &catalog, &map_info, "scout", Position { x: 10, y: 0 }, 1);
        assert!(matches!(off_map, Err(EngineError::OutOfBounds { x: 10, .. })));

        assert_eq!(world.entity_count(), before);
    }

    #[test]
    fn exhausted_store_fails_loudly() {
        let mut world = World::with_entity_limit(1);
        register_all(&mut world);
        let map_info = MapInfo {
            width: 4,
            height: 4,
        };
        world.spawn_with(map_info).unwrap();
        let catalog = UnitCatalog::from_config(&GameConfig::default());

        let result = spawn_unit(&mut world, &catalog, &map_info, "worker", Position { x: 0, y: 0 }, 1);
        assert!(matches!(
            result,
            Err(EngineError::Ecs(EcsError::EntitySpaceExhausted { limit: 1 }))
        ));
    }

    #[test]
    fn base_label_shows_resource() {
        let (mut world, _, map_info) = setup_world();
        let base = spawn_base(&mut world, &map_info, Position { x: 1, y: 1 }, 1, 120).unwrap();
        assert_eq!(world.get::<Label>(base).unwrap().text, "120");
        assert_eq!(world.get::<Base>(base), Some(&Base { resource: 120 }));
    }
}
