//! Build-order intake.
//!
//! **Drains** every build order from the tick's input (no other system may
//! read them) and turns each valid one into a [`CreateCommand`] on the
//! ordering player's idle base, with the catalog's build time. The attach is
//! deferred and lands at this system's flush, so a production system
//! registered after this one starts counting down in the same tick.
//!
//! Orders are refused with a warning and an
//! [`OrderRejected`](GameEvent::OrderRejected) event when the unit type is
//! unknown, the player owns no base, or the base is already building
//! (including a build accepted earlier in the same frame).

use std::collections::{BTreeMap, BTreeSet};

use garrison_ecs::entity::EntityId;
use tracing::{debug, warn};

use crate::components::{Base, CreateCommand, PlayerOwned};
use crate::error::EngineError;
use crate::events::{GameEvent, RejectReason};
use crate::input::PlayerOrder;
use crate::tick::{System, SystemContext};

pub const BUILD_ORDER_SYSTEM_NAME: &str = "build_orders";

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildOrderSystem;

impl System for BuildOrderSystem {
    fn name(&self) -> &str {
        BUILD_ORDER_SYSTEM_NAME
    }

    fn update(&self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let orders = ctx.resources.input.take_orders();
        if orders.is_empty() {
            return Ok(());
        }

        // Each player's base: the lowest-id one if they own several.
        let mut bases: BTreeMap<u32, EntityId> = BTreeMap::new();
        for (entity, (_, owner)) in ctx.world.query::<(&Base, &PlayerOwned)>()? {
            bases.entry(owner.id).or_insert(entity);
        }

        let mut busy: BTreeSet<EntityId> = BTreeSet::new();
        for order in orders {
            let PlayerOrder::Build {
                player_id,
                unit_type,
            } = order;

            let verdict = match (ctx.resources.catalog.get(&unit_type), bases.get(&player_id)) {
                (None, _) => Err(RejectReason::UnknownUnitType),
                (_, None) => Err(RejectReason::UnknownPlayer),
                (Some(spec), Some(&base)) => {
                    if busy.contains(&base) || ctx.world.has::<CreateCommand>(base) {
                        Err(RejectReason::BaseBusy)
                    } else {
                        Ok((base, spec.build_time))
                    }
                }
            };

            match verdict {
                Ok((base, build_time)) => {
                    debug!(player_id, unit_type = %unit_type, base = %base, build_time, "build order accepted");
                    ctx.world.commands().attach(
                        base,
                        CreateCommand {
                            unit_type,
                            build_time,
                        },
                    );
                    busy.insert(base);
                }
                Err(reason) => {
                    warn!(player_id, unit_type = %unit_type, ?reason, "build order rejected");
                    ctx.resources.emit(GameEvent::OrderRejected {
                        player_id,
                        unit_type,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}
