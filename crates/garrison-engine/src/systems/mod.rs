//! Game systems.

pub mod build_orders;
pub mod production;

pub use build_orders::{BuildOrderSystem, BUILD_ORDER_SYSTEM_NAME};
pub use production::{ProductionSystem, PRODUCTION_SYSTEM_NAME};
