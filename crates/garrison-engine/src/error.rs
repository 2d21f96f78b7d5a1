//! Engine error type.

use garrison_ecs::EcsError;

/// Errors that abort a system (and therefore the tick).
///
/// Expected gameplay outcomes such as an unaffordable build are never
/// reported through this type; they surface as
/// [`GameEvent`](crate::events::GameEvent)s.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A store operation failed (stale entity, exhausted id space, missing
    /// singleton, ...).
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A build referenced a unit type the catalog does not define.
    #[error("unknown unit type '{unit_type}'")]
    UnknownUnitType { unit_type: String },

    /// A spawn position lies outside the map.
    #[error("position ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    /// A replay recorder was handed a loop that is not at the next tick it
    /// expects (a tick was skipped, repeated or run on another loop).
    #[error("replay recorder expected tick {expected}, but the loop is at tick {actual}")]
    RecordingGap { expected: u64, actual: u64 },

    /// A system returned an error; the tick was aborted after it.
    #[error("system '{system}' failed: {source}")]
    SystemFailed {
        system: String,
        source: Box<EngineError>,
    },
}
