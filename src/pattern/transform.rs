// Pattern transform: rescale per-point delays by precision and base speed
//
// newDelay = round(delay * (11 - precision) / baseSpeed)
// precision 10 keeps 1x the recorded delay, precision 1 stretches it 10x;
// base speed divides on top of that.

use super::model::{Motion, MovementPattern, MovementPoint, PatternConfig};
use crate::error::ConfigurationError;

/// Scale a single delay; `config` must already be checked
fn scale_delay(delay: u64, config: &PatternConfig) -> u64 {
    let factor = (11 - config.precision) as f64 / config.base_speed;
    (delay as f64 * factor).round() as u64
}

fn scale_points(points: &[MovementPoint], config: &PatternConfig) -> Vec<MovementPoint> {
    points
        .iter()
        .map(|p| MovementPoint::new(p.angle, scale_delay(p.delay, config)))
        .collect()
}

/// Apply `config` to a pattern, returning a new pattern carrying it
///
/// Flat points and every sequence of a composite pattern are rescaled.
/// The config is checked before any point is produced.
pub fn apply_config(
    pattern: &MovementPattern,
    config: &PatternConfig,
) -> Result<MovementPattern, ConfigurationError> {
    config.check()?;

    let motion = match &pattern.motion {
        Motion::Flat { style, points } => Motion::Flat {
            style: *style,
            points: scale_points(points, config),
        },
        Motion::Composite { sequences } => Motion::Composite {
            sequences: sequences
                .iter()
                .map(|s| {
                    let mut sequence = s.clone();
                    sequence.points = scale_points(&s.points, config);
                    sequence
                })
                .collect(),
        },
    };

    Ok(MovementPattern {
        name: pattern.name.clone(),
        motion,
        looping: pattern.looping,
        config: Some(config.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PointStyle, RepeatCount, Sequence, SequenceStyle};

    fn config(precision: u8, base_speed: f64) -> PatternConfig {
        PatternConfig {
            precision,
            base_speed,
            ..PatternConfig::default()
        }
    }

    fn single(delay: u64) -> MovementPattern {
        MovementPattern::flat("p", PointStyle::Smooth, vec![MovementPoint::new(90.0, delay)])
    }

    fn delays(pattern: &MovementPattern) -> Vec<u64> {
        pattern.flatten().iter().map(|p| p.delay).collect()
    }

    #[test]
    fn test_coarsest_unit_speed_scales_by_ten() {
        let pattern = MovementPattern::flat(
            "p",
            PointStyle::Stepped,
            vec![
                MovementPoint::new(0.0, 1),
                MovementPoint::new(45.0, 37),
                MovementPoint::new(90.0, 300),
            ],
        );
        let out = apply_config(&pattern, &config(1, 1.0)).unwrap();
        assert_eq!(delays(&out), vec![10, 370, 3000]);
    }

    #[test]
    fn test_scaling_law() {
        let pattern = single(300);
        // Inverse in base speed, linear in (11 - precision)
        assert_eq!(delays(&apply_config(&pattern, &config(10, 1.0)).unwrap()), vec![300]);
        assert_eq!(delays(&apply_config(&pattern, &config(10, 2.0)).unwrap()), vec![150]);
        assert_eq!(delays(&apply_config(&pattern, &config(9, 2.0)).unwrap()), vec![300]);
        assert_eq!(delays(&apply_config(&pattern, &config(5, 1.0)).unwrap()), vec![1800]);
    }

    #[test]
    fn test_rounds_to_nearest_ms() {
        // 300 * 4 / 0.7 = 1714.28
        assert_eq!(delays(&apply_config(&single(300), &config(7, 0.7)).unwrap()), vec![1714]);
    }

    #[test]
    fn test_is_pure_and_carries_config() {
        let pattern = single(100);
        let cfg = PatternConfig {
            force_level: 8,
            repeat_count: RepeatCount::Times(3),
            ..config(9, 1.0)
        };
        let out = apply_config(&pattern, &cfg).unwrap();
        assert_eq!(delays(&pattern), vec![100]);
        assert_eq!(out.config.as_ref().unwrap().force_level, 8);
        assert_eq!(out.repeat_count(), RepeatCount::Times(3));
        assert_eq!(out.flatten()[0].angle, 90.0);
    }

    #[test]
    fn test_composite_sequences_are_scaled() {
        let pattern = MovementPattern::composite(
            "c",
            vec![
                Sequence::new("A", SequenceStyle::Smooth, vec![MovementPoint::new(10.0, 50)]),
                Sequence::new("B", SequenceStyle::Stepped, vec![MovementPoint::new(20.0, 20)]),
            ],
        );
        let out = apply_config(&pattern, &config(8, 1.5)).unwrap();
        assert_eq!(delays(&out), vec![100, 40]);
        assert!(out.is_composite());
    }

    #[test]
    fn test_non_positive_base_speed_rejected() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                apply_config(&single(100), &config(5, speed)),
                Err(ConfigurationError::InvalidBaseSpeed(_))
            ));
        }
    }

    #[test]
    fn test_precision_out_of_range_rejected() {
        assert_eq!(
            apply_config(&single(100), &config(0, 1.0)),
            Err(ConfigurationError::PrecisionOutOfRange(0))
        );
    }
}
