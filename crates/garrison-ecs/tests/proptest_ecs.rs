//! Property tests for direct world operations.
//!
//! These tests use `proptest` to generate random sequences of world
//! operations and verify that storage invariants hold after every step.

use std::collections::BTreeMap;

use garrison_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Pos {
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Vel {
    dx: i32,
    dy: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Tag(u32);

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum WorldOp {
    SpawnPos(i32, i32),
    SpawnPosVel(i32, i32, i32, i32),
    Destroy(usize),
    AttachVel(usize, i32, i32),
    DetachVel(usize),
    AttachTag(usize, u32),
    QueryPos,
    QueryPosVel,
}

fn world_op_strategy() -> impl Strategy<Value = WorldOp> {
    prop_oneof![
        (-1000i32..1000, -1000i32..1000).prop_map(|(x, y)| WorldOp::SpawnPos(x, y)),
        (-1000i32..1000, -1000i32..1000, -10i32..10, -10i32..10)
            .prop_map(|(x, y, dx, dy)| WorldOp::SpawnPosVel(x, y, dx, dy)),
        (0..100usize).prop_map(WorldOp::Destroy),
        (0..100usize, -10i32..10, -10i32..10).prop_map(|(i, dx, dy)| WorldOp::AttachVel(i, dx, dy)),
        (0..100usize).prop_map(WorldOp::DetachVel),
        (0..100usize, any::<u32>()).prop_map(|(i, t)| WorldOp::AttachTag(i, t)),
        Just(WorldOp::QueryPos),
        Just(WorldOp::QueryPosVel),
    ]
}

fn setup_world() -> World {
    let mut world = World::new();
    world.register_component::<Pos>("pos");
    world.register_component::<Vel>("vel");
    world.register_component::<Tag>("tag");
    world
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// A shadow model of which entities hold a velocity must always agree
    /// with what queries report.
    #[test]
    fn random_ops_match_shadow_model(ops in prop::collection::vec(world_op_strategy(), 1..60)) {
        let mut world = setup_world();
        let mut alive: Vec<EntityId> = Vec::new();
        let mut vel: BTreeMap<EntityId, Vel> = BTreeMap::new();

        for op in ops {
            match op {
                WorldOp::SpawnPos(x, y) => {
                    alive.push(world.spawn_with(Pos { x, y }).unwrap());
                }
                WorldOp::SpawnPosVel(x, y, dx, dy) => {
                    let e = world
                        .spawn(ComponentBundle::new().with(Pos { x, y }).with(Vel { dx, dy }))
                        .unwrap();
                    vel.insert(e, Vel { dx, dy });
                    alive.push(e);
                }
                WorldOp::Destroy(idx) => {
                    if !alive.is_empty() {
                        let e = alive.remove(idx % alive.len());
                        prop_assert!(world.destroy(e));
                        vel.remove(&e);
                    }
                }
                WorldOp::AttachVel(idx, dx, dy) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        let previous = world.attach(e, Vel { dx, dy }).unwrap();
                        prop_assert_eq!(previous, vel.insert(e, Vel { dx, dy }));
                    }
                }
                WorldOp::DetachVel(idx) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        prop_assert_eq!(world.detach::<Vel>(e), vel.remove(&e));
                    }
                }
                WorldOp::AttachTag(idx, t) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        world.attach(e, Tag(t)).unwrap();
                    }
                }
                WorldOp::QueryPos => {
                    let rows = world.query::<(&Pos,)>().unwrap();
                    prop_assert_eq!(rows.len(), alive.len());
                }
                WorldOp::QueryPosVel => {
                    let rows: Vec<EntityId> = world
                        .query::<(&Pos, &Vel)>()
                        .unwrap()
                        .into_iter()
                        .map(|(e, _)| e)
                        .collect();
                    let expected: Vec<EntityId> = vel.keys().copied().collect();
                    prop_assert_eq!(rows, expected);
                }
            }

            prop_assert_eq!(world.entity_count(), alive.len());
            for &e in &alive {
                prop_assert!(world.is_alive(e));
                prop_assert!(world.has::<Pos>(e));
                prop_assert_eq!(world.get::<Vel>(e), vel.get(&e));
            }
        }
    }

    /// Stale handles stay stale after their index is recycled.
    #[test]
    fn stale_ids_detected_after_destroy_and_recycle(
        spawn_count in 1..20usize,
        destroy_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut world = setup_world();

        let mut entities: Vec<EntityId> = (0..spawn_count)
            .map(|i| world.spawn_with(Pos { x: i as i32, y: 0 }).unwrap())
            .collect();

        let mut stale_ids = Vec::new();
        for &idx in &destroy_indices {
            if !entities.is_empty() {
                let e = entities.remove(idx % entities.len());
                world.destroy(e);
                stale_ids.push(e);
            }
        }

        for _ in 0..stale_ids.len() {
            entities.push(world.spawn_with(Pos { x: 999, y: 999 }).unwrap());
        }

        for &stale in &stale_ids {
            prop_assert!(!world.is_alive(stale));
            prop_assert_eq!(world.get::<Pos>(stale), None);
            let attach_stale = world.attach(stale, Tag(1));
            let is_stale_err = matches!(attach_stale, Err(EcsError::StaleEntity { .. }));
            prop_assert!(is_stale_err);
        }
        for &e in &entities {
            prop_assert!(world.get::<Pos>(e).is_some());
        }
    }

    /// Query visit order is ascending id no matter how columns were filled.
    #[test]
    fn query_rows_are_sorted(order in Just((0..30usize).collect::<Vec<_>>()).prop_shuffle()) {
        let mut world = setup_world();
        let ids: Vec<EntityId> = (0..30).map(|_| world.create().unwrap()).collect();
        for i in order {
            world.attach(ids[i], Pos { x: i as i32, y: 0 }).unwrap();
            world.attach(ids[i], Tag(i as u32)).unwrap();
        }

        let rows: Vec<EntityId> = world
            .query::<(&Tag, &Pos)>()
            .unwrap()
            .into_iter()
            .map(|(e, _)| e)
            .collect();
        prop_assert_eq!(rows, ids);
    }

    /// Equal contents give equal state hashes regardless of build order.
    #[test]
    fn state_hash_depends_only_on_contents(values in prop::collection::vec(any::<u32>(), 1..20)) {
        let mut forward = setup_world();
        let mut backward = setup_world();
        let ids_f: Vec<EntityId> = values.iter().map(|_| forward.create().unwrap()).collect();
        let ids_b: Vec<EntityId> = values.iter().map(|_| backward.create().unwrap()).collect();

        for (i, v) in values.iter().enumerate() {
            forward.attach(ids_f[i], Tag(*v)).unwrap();
        }
        for (i, v) in values.iter().enumerate().rev() {
            backward.attach(ids_b[i], Tag(*v)).unwrap();
        }
        prop_assert_eq!(forward.state_hash().unwrap(), backward.state_hash().unwrap());
    }
}
