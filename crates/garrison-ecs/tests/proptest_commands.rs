//! Property tests for deferred commands.
//!
//! These tests use `proptest` to generate random request sequences issued
//! during a query pass and verify that flushing them leaves the world in the
//! state a sequential model predicts.

use std::collections::BTreeMap;

use garrison_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Hp(u32);

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Score(i64);

#[derive(Debug, Clone)]
enum CmdOp {
    SetHp(usize, u32),
    SetScoreJson(usize, i64),
    RemoveHp(usize),
    Destroy(usize),
    Create(u32),
}

fn cmd_op_strategy() -> impl Strategy<Value = CmdOp> {
    prop_oneof![
        (0..20usize, any::<u32>()).prop_map(|(i, v)| CmdOp::SetHp(i, v)),
        (0..20usize, any::<i64>()).prop_map(|(i, v)| CmdOp::SetScoreJson(i, v)),
        (0..20usize).prop_map(CmdOp::RemoveHp),
        (0..20usize).prop_map(CmdOp::Destroy),
        any::<u32>().prop_map(CmdOp::Create),
    ]
}

/// Fresh world with Hp and Score registered, plus 5 initial entities.
fn setup_world_and_entities() -> (World, Vec<EntityId>) {
    let mut world = World::new();
    world.register_component::<Hp>("hp");
    world.register_component::<Score>("score");

    let entities = (0..5u32)
        .map(|i| world.spawn_with(Hp(100 + i)).unwrap())
        .collect();
    (world, entities)
}

/// Sequential model of one flush: destroys win, everything else is FIFO.
#[derive(Debug, Default)]
struct Model {
    hp: BTreeMap<EntityId, Option<u32>>,
    score: BTreeMap<EntityId, Option<i64>>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn flush_matches_sequential_model(ops in prop::collection::vec(cmd_op_strategy(), 1..40)) {
        let (mut world, entities) = setup_world_and_entities();

        let mut model = Model::default();
        for &e in &entities {
            model.hp.insert(e, world.get::<Hp>(e).map(|h| h.0));
            model.score.insert(e, None);
        }
        let mut doomed = Vec::new();
        let mut created = Vec::new();

        {
            let mut cmds = world.commands();
            for op in &ops {
                match *op {
                    CmdOp::SetHp(idx, v) => {
                        let e = entities[idx % entities.len()];
                        cmds.attach(e, Hp(v));
                        model.hp.insert(e, Some(v));
                    }
                    CmdOp::SetScoreJson(idx, v) => {
                        let e = entities[idx % entities.len()];
                        cmds.attach_json(e, "score", serde_json::json!(v));
                        model.score.insert(e, Some(v));
                    }
                    CmdOp::RemoveHp(idx) => {
                        let e = entities[idx % entities.len()];
                        cmds.detach::<Hp>(e);
                        model.hp.insert(e, None);
                    }
                    CmdOp::Destroy(idx) => {
                        let e = entities[idx % entities.len()];
                        cmds.destroy(e);
                        doomed.push(e);
                    }
                    CmdOp::Create(v) => {
                        let e = cmds.create(ComponentBundle::new().with(Hp(v))).unwrap();
                        created.push((e, v));
                    }
                }
            }
        }

        let report = world.flush();
        prop_assert_eq!(report.failed, 0);
        prop_assert_eq!(world.pending_commands(), 0);

        for &e in &entities {
            if doomed.contains(&e) {
                prop_assert!(!world.is_alive(e));
                continue;
            }
            prop_assert_eq!(world.get::<Hp>(e).map(|h| h.0), model.hp[&e]);
            prop_assert_eq!(world.get::<Score>(e).map(|s| s.0), model.score[&e]);
        }
        for &(e, v) in &created {
            prop_assert_eq!(world.get::<Hp>(e), Some(&Hp(v)));
        }
    }

    /// Requests issued during a pass never change what the pass visits.
    #[test]
    fn requests_during_pass_do_not_affect_the_pass(ops in prop::collection::vec(cmd_op_strategy(), 1..20)) {
        let (mut world, entities) = setup_world_and_entities();

        let mut visited = Vec::new();
        world
            .each::<(&Hp,), _>(|e, _, cmds| {
                visited.push(e);
                for op in &ops {
                    match *op {
                        CmdOp::Destroy(idx) => cmds.destroy(entities[idx % entities.len()]),
                        CmdOp::RemoveHp(idx) => cmds.detach::<Hp>(entities[idx % entities.len()]),
                        CmdOp::Create(v) => {
                            cmds.create(ComponentBundle::new().with(Hp(v))).unwrap();
                        }
                        _ => {}
                    }
                }
            })
            .unwrap();

        prop_assert_eq!(visited, entities);
        world.flush();
        prop_assert_eq!(world.pending_commands(), 0);
    }

    /// Every request on a destroyed entity in the same flush is discarded,
    /// not failed.
    #[test]
    fn destroy_discards_other_requests(extra in 0..10usize) {
        let (mut world, entities) = setup_world_and_entities();
        let target = entities[0];

        {
            let mut cmds = world.commands();
            for i in 0..extra {
                cmds.attach(target, Hp(i as u32));
            }
            cmds.destroy(target);
            cmds.attach(target, Score(1));
        }

        let report = world.flush();
        prop_assert_eq!(report.discarded, extra + 1);
        prop_assert_eq!(report.applied, 1);
        prop_assert_eq!(report.failed, 0);
        prop_assert!(!world.is_alive(target));
    }
}
