// Servo configuration types
//
// Every field has a default so partially specified JSON (older saved state,
// hand-written project files) loads with the defaults table filling the gaps.

use serde::{Deserialize, Serialize};

use super::program::ServoProgram;
use crate::config::{
    DEFAULT_ACCELERATION, DEFAULT_INITIAL_POSITION, DEFAULT_MAX_ACCELERATION, DEFAULT_MAX_ANGLE,
    DEFAULT_MAX_PULSE, DEFAULT_MAX_SPEED, DEFAULT_MIN_ANGLE, DEFAULT_MIN_PULSE, DEFAULT_SPEED,
};
use crate::error::ConfigurationError;

/// Safe operating envelope of one servo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoLimits {
    pub min_angle: f64,
    pub max_angle: f64,
    pub min_pulse: u32,
    pub max_pulse: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>, // deg/s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_acceleration: Option<f64>, // deg/s²
}

impl Default for ServoLimits {
    fn default() -> Self {
        Self {
            min_angle: DEFAULT_MIN_ANGLE,
            max_angle: DEFAULT_MAX_ANGLE,
            min_pulse: DEFAULT_MIN_PULSE,
            max_pulse: DEFAULT_MAX_PULSE,
            max_speed: Some(DEFAULT_MAX_SPEED),
            max_acceleration: Some(DEFAULT_MAX_ACCELERATION),
        }
    }
}

impl ServoLimits {
    /// Angular span, rejecting equal, inverted or non-finite bounds
    pub fn angle_span(&self) -> Result<f64, ConfigurationError> {
        let span = self.max_angle - self.min_angle;
        if !span.is_finite() || span <= 0.0 {
            return Err(ConfigurationError::DegenerateAngleRange {
                min: self.min_angle,
                max: self.max_angle,
            });
        }
        Ok(span)
    }

    /// Check `minAngle < maxAngle` and `minPulse < maxPulse`
    pub fn check(&self) -> Result<(), ConfigurationError> {
        self.angle_span()?;
        if self.min_pulse >= self.max_pulse {
            return Err(ConfigurationError::DegeneratePulseRange {
                min: self.min_pulse,
                max: self.max_pulse,
            });
        }
        Ok(())
    }

    pub fn effective_max_speed(&self) -> f64 {
        self.max_speed.unwrap_or(DEFAULT_MAX_SPEED)
    }

    pub fn effective_max_acceleration(&self) -> f64 {
        self.max_acceleration.unwrap_or(DEFAULT_MAX_ACCELERATION)
    }
}

/// Per-servo correction applied before pulse conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoCalibration {
    pub center_offset: f64,   // deg
    pub pulse_offset: f64,    // µs
    pub angle_multiplier: f64,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            center_offset: 0.0,
            pulse_offset: 0.0,
            angle_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub length: f64, // mm
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Torque {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatedSpeed {
    pub value: f64, // seconds per 60°
    pub voltage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Datasheet reference attached to a servo (informational)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoSpecification {
    pub model: String,
    pub manufacturer: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f64, // grams
    pub dimensions: Dimensions,
    pub torque: Torque,
    pub speed: RatedSpeed,
    pub operating_voltage: Range,
    pub rotation_range: Range,
    pub bearing_type: String,
    pub gear_material: String,
    pub waterproof: bool,
    pub analog_feedback: bool,
    pub protocol: String,
}

/// One physical servo channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoConfiguration {
    pub channel: u8,
    pub enabled: bool,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub min_pulse: u32,
    pub max_pulse: u32,
    pub initial_position: f64,
    pub inverted: bool,

    pub speed: f64,        // deg/s
    pub acceleration: f64, // deg/s²

    pub limits: ServoLimits,
    pub calibration: ServoCalibration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specification: Option<ServoSpecification>,

    pub programs: Vec<ServoProgram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_program: Option<String>,
}

impl Default for ServoConfiguration {
    fn default() -> Self {
        Self {
            channel: 0,
            enabled: true,
            name: String::new(),
            description: None,
            min_pulse: DEFAULT_MIN_PULSE,
            max_pulse: DEFAULT_MAX_PULSE,
            initial_position: DEFAULT_INITIAL_POSITION,
            inverted: false,
            speed: DEFAULT_SPEED,
            acceleration: DEFAULT_ACCELERATION,
            limits: ServoLimits::default(),
            calibration: ServoCalibration::default(),
            specification: None,
            programs: Vec::new(),
            active_program: None,
        }
    }
}

impl ServoConfiguration {
    /// New servo on `channel` with the default settings
    pub fn new(channel: u8, name: impl Into<String>) -> Self {
        Self {
            channel,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check pulse and angle ranges
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.min_pulse >= self.max_pulse {
            return Err(ConfigurationError::DegeneratePulseRange {
                min: self.min_pulse,
                max: self.max_pulse,
            });
        }
        self.limits.check()
    }

    /// Replace zeroed or non-finite numeric fields with their defaults
    ///
    /// Applied by the state store on every write, so a servo whose form left
    /// speed or multiplier blank never reaches the generator as zero.
    pub fn normalized(mut self) -> Self {
        if self.speed.is_nan() || self.speed <= 0.0 {
            self.speed = DEFAULT_SPEED;
        }
        if self.acceleration.is_nan() || self.acceleration <= 0.0 {
            self.acceleration = DEFAULT_ACCELERATION;
        }
        if self.calibration.angle_multiplier == 0.0 || !self.calibration.angle_multiplier.is_finite() {
            self.calibration.angle_multiplier = 1.0;
        }
        self
    }
}
