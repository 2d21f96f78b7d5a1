//! Unit production.
//!
//! Runs over every production facility with an active [`CreateCommand`]:
//!
//! - each tick the command's `build_time` drops by one; the first tick that
//!   leaves it above zero flips the facility's status to `Building`;
//! - the tick it reaches zero the build resolves. If the base can pay, the
//!   unit's entity is reserved first, then the cost is deducted and the label
//!   shows the new stockpile; the unit is filled in at the system's flush, at
//!   the base, for its owner. If not, a diagnostic is logged and nothing else
//!   changes. Either way the status returns to `Idle` and the command is
//!   detached (no retry, no refund).
//!
//! A contract violation (unknown unit type, base off the map, no entity
//! space left) is detected before anything is paid. It stops the pass and
//! fails the system; builds resolved earlier in the pass keep their units.
//!
//! Facilities without a command are idle and never matched.

use tracing::{debug, warn};

use crate::components::{Base, CreateCommand, Label, MapInfo, PlayerOwned, Position, Unit, UnitStatus};
use crate::error::EngineError;
use crate::events::GameEvent;
use crate::prefab;
use crate::resources::Resources;
use crate::tick::{System, SystemContext};

pub const PRODUCTION_SYSTEM_NAME: &str = "production";

#[derive(Debug, Default, Clone, Copy)]
pub struct ProductionSystem;

impl System for ProductionSystem {
    fn name(&self) -> &str {
        PRODUCTION_SYSTEM_NAME
    }

    fn update(&self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let map_info = *ctx.world.singleton::<MapInfo>()?.1;
        let Resources {
            catalog, events, ..
        } = &mut *ctx.resources;

        let mut violation: Option<EngineError> = None;

        ctx.world.each::<(
            &mut CreateCommand,
            &mut Base,
            &mut Unit,
            &Position,
            &mut Label,
            &PlayerOwned,
        ), _>(|entity, (order, base, unit, position, label, owner), cmds| {
            if violation.is_some() {
                return;
            }

            order.build_time = order.build_time.saturating_sub(1);

            if order.build_time > 0 {
                if unit.status != UnitStatus::Building {
                    unit.status = UnitStatus::Building;
                    cmds.mark_changed::<Unit>(entity);
                }
                return;
            }

            let spec = match catalog.spec(&order.unit_type) {
                Ok(spec) => spec,
                Err(e) => {
                    violation = Some(e);
                    return;
                }
            };

            if base.resource >= spec.cost {
                // Reserve the unit before paying for it.
                let produced =
                    prefab::unit_bundle(catalog, &map_info, &order.unit_type, *position, owner.id)
                        .and_then(|bundle| cmds.create(bundle).map_err(EngineError::from));
                let produced = match produced {
                    Ok(produced) => produced,
                    Err(e) => {
                        violation = Some(e);
                        return;
                    }
                };

                base.resource -= spec.cost;
                label.text = base.resource.to_string();
                cmds.mark_changed::<Base>(entity);
                cmds.mark_changed::<Label>(entity);
                cmds.mark_changed::<Unit>(entity);
                debug!(base = %entity, unit = %produced, owner = owner.id, unit_type = %order.unit_type, "build complete");
                events.push(GameEvent::UnitProduced {
                    base: entity,
                    unit: produced,
                    owner: owner.id,
                    unit_type: order.unit_type.clone(),
                });
            } else {
                warn!(
                    owner = owner.id,
                    unit_type = %order.unit_type,
                    cost = spec.cost,
                    available = base.resource,
                    "{} tried to create {} without enough resources: {} required, but only has {}",
                    owner.id,
                    order.unit_type,
                    spec.cost,
                    base.resource
                );
                events.push(GameEvent::BuildFailed {
                    base: entity,
                    owner: owner.id,
                    unit_type: order.unit_type.clone(),
                    cost: spec.cost,
                    available: base.resource,
                });
                if unit.status != UnitStatus::Idle {
                    cmds.mark_changed::<Unit>(entity);
                }
            }

            unit.status = UnitStatus::Idle;
            cmds.detach::<CreateCommand>(entity);
        })?;

        match violation {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
