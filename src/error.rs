// Error taxonomy for the pipeline
//
// Configuration: degenerate numeric settings (equal min/max angle, bad base speed)
// Validation: pattern points outside the servo's safe range
// Generation: structurally invalid hardware input to the code generator
// Store: persistence failures (io, json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Angle range is degenerate: min {min}° must be less than max {max}°")]
    DegenerateAngleRange { min: f64, max: f64 },

    #[error("Pulse range is degenerate: min {min}µs must be less than max {max}µs")]
    DegeneratePulseRange { min: u32, max: u32 },

    #[error("Base speed must be a positive finite multiplier, got {0}")]
    InvalidBaseSpeed(f64),

    #[error("Precision must be between 1 and 10, got {0}")]
    PrecisionOutOfRange(u8),

    #[error("Force level must be between 1 and 10, got {0}")]
    ForceLevelOutOfRange(u8),

    #[error("Repeat count must be at least 1")]
    ZeroRepeatCount,

    #[error("Program {0} not found")]
    UnknownProgram(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("No servos configured to validate against")]
    NoServos,

    #[error(
        "Angle {angle}°{} is outside servo limits ({min}-{max}°)",
        sequence_suffix(.sequence)
    )]
    OutOfLimits {
        angle: f64,
        index: usize,
        sequence: Option<String>,
        min: f64,
        max: f64,
    },
}

fn sequence_suffix(sequence: &Option<String>) -> String {
    match sequence {
        Some(name) => format!(" in sequence {}", name),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Hardware configuration is missing controlMethod")]
    MissingControlMethod,

    #[error("Unknown control method: {0}")]
    UnknownControlMethod(String),

    #[error("Malformed hardware configuration: {0}")]
    MalformedHardware(String),

    #[error("PWM frequency must be non-zero")]
    ZeroPwmFrequency,

    #[error("I2C address 0x{0:02X} is outside the 7-bit range")]
    I2cAddressOutOfRange(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Refusing to overwrite unreadable {0}")]
    Unreadable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Type discriminant carried by error events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    Generation,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Generation(_) => ErrorKind::Generation,
            Error::Store(_) => ErrorKind::Storage,
        }
    }

    /// Structured payload for error events, when the error has one
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation(ValidationError::OutOfLimits {
                angle,
                index,
                sequence,
                min,
                max,
            }) => Some(json!({
                "angle": angle,
                "index": index,
                "sequence": sequence,
                "minAngle": min,
                "maxAngle": max,
            })),
            Error::Generation(GenerationError::I2cAddressOutOfRange(address)) => {
                Some(json!({ "i2cAddress": address }))
            }
            _ => None,
        }
    }
}

/// Error surfaced to users: `{type, message, timestamp, details?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorEvent {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            timestamp: Utc::now(),
            details: err.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_limits_message() {
        let err = ValidationError::OutOfLimits {
            angle: 200.0,
            index: 1,
            sequence: None,
            min: 0.0,
            max: 180.0,
        };
        assert_eq!(err.to_string(), "Angle 200° is outside servo limits (0-180°)");
    }

    #[test]
    fn test_out_of_limits_message_names_sequence() {
        let err = ValidationError::OutOfLimits {
            angle: -5.0,
            index: 0,
            sequence: Some("Grasp".to_string()),
            min: 0.0,
            max: 90.0,
        };
        assert!(err.to_string().contains("in sequence Grasp"));
    }

    #[test]
    fn test_error_kind_discriminant() {
        let err: Error = ConfigurationError::InvalidBaseSpeed(0.0).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: Error = ValidationError::NoServos.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: Error = GenerationError::MissingControlMethod.into();
        assert_eq!(err.kind(), ErrorKind::Generation);
    }

    #[test]
    fn test_error_event_carries_details() {
        let err: Error = ValidationError::OutOfLimits {
            angle: 200.0,
            index: 1,
            sequence: None,
            min: 0.0,
            max: 180.0,
        }
        .into();
        let event = ErrorEvent::from(&err);
        assert_eq!(event.kind, ErrorKind::Validation);
        assert_eq!(event.details.unwrap()["angle"], 200.0);

        let json = serde_json::to_value(ErrorEvent::from(&err)).unwrap();
        assert_eq!(json["type"], "validation");
    }
}
