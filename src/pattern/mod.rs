// Movement patterns
//
// Provides:
// - Pattern model (flat points or composite sequences) and tuning config
// - Limit validation against a servo's safe range
// - Delay transform driven by precision and base speed

mod model;
pub mod transform;
pub mod validate;

pub use model::{
    Motion, MovementPattern, MovementPoint, PatternConfig, PointStyle, RepeatCount, Sequence,
    SequenceStyle,
};
pub(crate) use model::{millis, opt_millis};
pub use transform::apply_config;
pub use validate::{is_within_limits, validate_pattern, violations, LimitViolation};
