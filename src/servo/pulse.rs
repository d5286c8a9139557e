// Angle <-> pulse-width conversion for hobby servos
// Maps a logical angle onto the configured PWM high-time range.

use super::model::{ServoCalibration, ServoConfiguration};
use crate::error::ConfigurationError;

/// Convert an angle to a pulse width in whole microseconds
///
/// `pulse = minPulse + angle / (maxAngle - minAngle) * (maxPulse - minPulse)`
///
/// No clamping happens here; callers clamp to the limits first when they need to.
/// Fails when the configured angle range is degenerate instead of producing inf/NaN.
pub fn angle_to_pulse(angle: f64, servo: &ServoConfiguration) -> Result<i64, ConfigurationError> {
    let angle_range = servo.limits.angle_span()?;
    let pulse_range = servo.max_pulse as f64 - servo.min_pulse as f64;
    let pulse = servo.min_pulse as f64 + (angle / angle_range) * pulse_range;
    Ok(pulse.round() as i64)
}

/// Inverse of [`angle_to_pulse`] (before rounding)
pub fn pulse_to_angle(pulse: f64, servo: &ServoConfiguration) -> Result<f64, ConfigurationError> {
    let angle_range = servo.limits.angle_span()?;
    let pulse_range = servo.max_pulse as f64 - servo.min_pulse as f64;
    if pulse_range <= 0.0 {
        return Err(ConfigurationError::DegeneratePulseRange {
            min: servo.min_pulse,
            max: servo.max_pulse,
        });
    }
    Ok((pulse - servo.min_pulse as f64) / pulse_range * angle_range)
}

/// `(angle + centerOffset) * angleMultiplier`
pub fn calibrated_angle(angle: f64, calibration: &ServoCalibration) -> f64 {
    (angle + calibration.center_offset) * calibration.angle_multiplier
}

/// Full chain from a commanded angle to the pulse written to hardware
///
/// Same order the generated controller uses: clamp (soft limits), invert,
/// calibrate, convert, then add the pulse offset.
pub fn commanded_pulse(
    angle: f64,
    servo: &ServoConfiguration,
    soft_limits: bool,
) -> Result<i64, ConfigurationError> {
    let limits = &servo.limits;
    limits.angle_span()?;
    let mut angle = angle;
    if soft_limits {
        angle = angle.clamp(limits.min_angle, limits.max_angle);
    }
    if servo.inverted {
        angle = limits.min_angle + limits.max_angle - angle;
    }
    let angle = calibrated_angle(angle, &servo.calibration);
    let pulse = angle_to_pulse(angle, servo)?;
    Ok(pulse + servo.calibration.pulse_offset.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::ServoLimits;

    fn servo() -> ServoConfiguration {
        ServoConfiguration::new(0, "test")
    }

    #[test]
    fn test_default_range_endpoints() {
        let servo = servo();
        assert_eq!(angle_to_pulse(0.0, &servo).unwrap(), 500);
        assert_eq!(angle_to_pulse(90.0, &servo).unwrap(), 1500);
        assert_eq!(angle_to_pulse(180.0, &servo).unwrap(), 2500);
    }

    #[test]
    fn test_rounds_to_nearest_microsecond() {
        let servo = servo();
        // 500 + 1/180 * 2000 = 511.11
        assert_eq!(angle_to_pulse(1.0, &servo).unwrap(), 511);
        // 500 + 1.5/180 * 2000 = 516.67
        assert_eq!(angle_to_pulse(1.5, &servo).unwrap(), 517);
    }

    #[test]
    fn test_no_clamping() {
        let servo = servo();
        assert_eq!(angle_to_pulse(270.0, &servo).unwrap(), 3500);
        assert_eq!(angle_to_pulse(-90.0, &servo).unwrap(), -500);
    }

    #[test]
    fn test_degenerate_angle_range_is_error() {
        let servo = ServoConfiguration {
            limits: ServoLimits {
                min_angle: 90.0,
                max_angle: 90.0,
                ..ServoLimits::default()
            },
            ..servo()
        };
        assert!(matches!(
            angle_to_pulse(45.0, &servo),
            Err(ConfigurationError::DegenerateAngleRange { .. })
        ));
    }

    #[test]
    fn test_monotonic_over_limits() {
        let servo = ServoConfiguration {
            min_pulse: 600,
            max_pulse: 2400,
            limits: ServoLimits {
                min_angle: 15.0,
                max_angle: 165.0,
                ..ServoLimits::default()
            },
            ..servo()
        };
        let mut previous = i64::MIN;
        let mut angle = servo.limits.min_angle;
        while angle <= servo.limits.max_angle {
            let pulse = angle_to_pulse(angle, &servo).unwrap();
            assert!(pulse >= previous, "pulse decreased at {}°", angle);
            previous = pulse;
            angle += 0.25;
        }
    }

    #[test]
    fn test_pulse_to_angle_inverts() {
        let servo = servo();
        let angle = pulse_to_angle(1500.0, &servo).unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_applied_before_conversion() {
        let calibration = ServoCalibration {
            center_offset: 10.0,
            pulse_offset: 0.0,
            angle_multiplier: 0.5,
        };
        assert_eq!(calibrated_angle(90.0, &calibration), 50.0);
    }

    #[test]
    fn test_commanded_pulse_chain() {
        let mut servo = servo();
        // Soft limits clamp 200° to 180°
        assert_eq!(commanded_pulse(200.0, &servo, true).unwrap(), 2500);
        assert_eq!(commanded_pulse(200.0, &servo, false).unwrap(), 2722);

        servo.inverted = true;
        assert_eq!(commanded_pulse(0.0, &servo, true).unwrap(), 2500);

        servo.inverted = false;
        servo.calibration.pulse_offset = 12.0;
        assert_eq!(commanded_pulse(90.0, &servo, true).unwrap(), 1512);
    }
}
