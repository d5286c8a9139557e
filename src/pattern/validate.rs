// Limit validation: gate a pattern on the servo's safe angular range
//
// Single-servo semantics: every point is checked against the first servo
// in the list, patterns are never routed per channel.

use tracing::debug;

use super::model::MovementPattern;
use crate::error::ValidationError;
use crate::servo::{ServoConfiguration, ServoLimits};

/// `min <= angle <= max`
pub fn is_within_limits(angle: f64, limits: &ServoLimits) -> bool {
    angle >= limits.min_angle && angle <= limits.max_angle
}

/// Fail fast on the first point outside the first servo's limits
///
/// An empty servo list fails; an empty pattern passes.
pub fn validate_pattern(
    pattern: &MovementPattern,
    servos: &[ServoConfiguration],
) -> Result<(), ValidationError> {
    let servo = servos.first().ok_or(ValidationError::NoServos)?;
    let limits = &servo.limits;
    let first = pattern
        .points_with_origin()
        .into_iter()
        .enumerate()
        .find(|(_, (_, point))| !is_within_limits(point.angle, limits));

    match first {
        Some((index, (sequence, point))) => Err(LimitViolation {
            index,
            angle: point.angle,
            sequence: sequence.map(str::to_string),
        }
        .into_error(limits)),
        None => {
            debug!(
                "Pattern {} within limits of servo {} ({} points)",
                pattern.name,
                servo.channel,
                pattern.point_count()
            );
            Ok(())
        }
    }
}

/// A single out-of-range point
#[derive(Debug, Clone, PartialEq)]
pub struct LimitViolation {
    pub index: usize, // position in the flattened point list
    pub angle: f64,
    pub sequence: Option<String>,
}

impl LimitViolation {
    fn into_error(self, limits: &ServoLimits) -> ValidationError {
        ValidationError::OutOfLimits {
            angle: self.angle,
            index: self.index,
            sequence: self.sequence,
            min: limits.min_angle,
            max: limits.max_angle,
        }
    }
}

/// Every out-of-range point, in flattened order
pub fn violations(pattern: &MovementPattern, limits: &ServoLimits) -> Vec<LimitViolation> {
    pattern
        .points_with_origin()
        .into_iter()
        .enumerate()
        .filter(|(_, (_, point))| !is_within_limits(point.angle, limits))
        .map(|(index, (sequence, point))| LimitViolation {
            index,
            angle: point.angle,
            sequence: sequence.map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{MovementPoint, PointStyle, Sequence, SequenceStyle};

    fn servos() -> Vec<ServoConfiguration> {
        vec![ServoConfiguration::new(0, "base")]
    }

    #[test]
    fn test_within_limits_inclusive() {
        let limits = ServoLimits::default();
        for angle in [-0.5, 0.0, 45.0, 180.0, 180.5, f64::NAN] {
            assert_eq!(
                is_within_limits(angle, &limits),
                angle >= limits.min_angle && angle <= limits.max_angle,
                "angle {}",
                angle
            );
        }
        assert!(is_within_limits(0.0, &limits));
        assert!(is_within_limits(180.0, &limits));
        assert!(!is_within_limits(180.5, &limits));
    }

    #[test]
    fn test_fails_fast_on_first_out_of_range_point() {
        let pattern = MovementPattern::flat(
            "bad",
            PointStyle::Smooth,
            vec![
                MovementPoint::new(45.0, 100),
                MovementPoint::new(200.0, 100),
                MovementPoint::new(-10.0, 100),
            ],
        );
        let err = validate_pattern(&pattern, &servos()).unwrap_err();
        match err {
            ValidationError::OutOfLimits {
                angle,
                index,
                sequence,
                ..
            } => {
                assert_eq!(angle, 200.0);
                assert_eq!(index, 1);
                assert_eq!(sequence, None);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_composite_error_names_sequence() {
        let pattern = MovementPattern::composite(
            "grip",
            vec![
                Sequence::new("Approach", SequenceStyle::Smooth, vec![MovementPoint::new(90.0, 300)]),
                Sequence::new("Grasp", SequenceStyle::Stepped, vec![MovementPoint::new(95.0, 200)]),
            ],
        );
        let mut servos = servos();
        servos[0].limits.max_angle = 90.0;
        let err = validate_pattern(&pattern, &servos).unwrap_err();
        assert!(err.to_string().contains("in sequence Grasp"));
    }

    #[test]
    fn test_only_first_servo_is_used() {
        let pattern =
            MovementPattern::flat("p", PointStyle::Smooth, vec![MovementPoint::new(170.0, 10)]);
        let mut servos = servos();
        let mut gripper = ServoConfiguration::new(1, "gripper");
        gripper.limits.max_angle = 90.0;
        servos.push(gripper);
        assert!(validate_pattern(&pattern, &servos).is_ok());
    }

    #[test]
    fn test_empty_servo_list_fails() {
        let pattern = MovementPattern::flat("p", PointStyle::Smooth, vec![]);
        assert_eq!(validate_pattern(&pattern, &[]), Err(ValidationError::NoServos));
    }

    #[test]
    fn test_empty_pattern_passes() {
        let pattern = MovementPattern::composite("nothing", vec![]);
        assert!(validate_pattern(&pattern, &servos()).is_ok());
    }

    #[test]
    fn test_violations_collects_all() {
        let pattern = MovementPattern::flat(
            "bad",
            PointStyle::Smooth,
            vec![
                MovementPoint::new(200.0, 100),
                MovementPoint::new(90.0, 100),
                MovementPoint::new(-10.0, 100),
            ],
        );
        let found = violations(&pattern, &ServoLimits::default());
        let indices: Vec<_> = found.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
