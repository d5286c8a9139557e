// Hardware settings for the generated controller
//
// One instance per session: which PWM back end to drive, its bus/pin
// parameters, and the optional features the generator may emit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{DEFAULT_GPIO_PIN, DEFAULT_I2C_ADDRESS, DEFAULT_I2C_BUS, DEFAULT_PWM_FREQUENCY};
use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMethod {
    #[default]
    I2c,
    #[serde(alias = "pwm")]
    Gpio,
    Uart,
}

impl ControlMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMethod::I2c => "i2c",
            ControlMethod::Gpio => "gpio",
            ControlMethod::Uart => "uart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareConfiguration {
    pub control_method: ControlMethod,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    pub pwm_frequency: u32, // Hz
    pub gpio_pin: u8,       // base pin for direct PWM, servo channel is added
}

impl Default for HardwareConfiguration {
    fn default() -> Self {
        Self {
            control_method: ControlMethod::default(),
            i2c_bus: DEFAULT_I2C_BUS,
            i2c_address: DEFAULT_I2C_ADDRESS,
            pwm_frequency: DEFAULT_PWM_FREQUENCY,
            gpio_pin: DEFAULT_GPIO_PIN,
        }
    }
}

impl HardwareConfiguration {
    /// Structural checks the generator relies on
    pub fn check(&self) -> Result<(), GenerationError> {
        if self.pwm_frequency == 0 {
            return Err(GenerationError::ZeroPwmFrequency);
        }
        if self.control_method == ControlMethod::I2c && self.i2c_address > 0x7F {
            return Err(GenerationError::I2cAddressOutOfRange(self.i2c_address));
        }
        Ok(())
    }
}

/// Parse an untyped hardware block, requiring the `controlMethod` discriminant
///
/// Unlike plain deserialization (which would default the method), a block
/// without a control method is structurally invalid input for generation.
pub fn hardware_from_value(value: &Value) -> Result<HardwareConfiguration, GenerationError> {
    let object = value
        .as_object()
        .ok_or_else(|| GenerationError::MalformedHardware("expected an object".to_string()))?;

    match object.get("controlMethod") {
        None | Some(Value::Null) => return Err(GenerationError::MissingControlMethod),
        Some(Value::String(method)) => {
            if !matches!(method.as_str(), "i2c" | "gpio" | "pwm" | "uart") {
                return Err(GenerationError::UnknownControlMethod(method.clone()));
            }
        }
        Some(other) => return Err(GenerationError::UnknownControlMethod(other.to_string())),
    }

    serde_json::from_value(value.clone()).map_err(|e| GenerationError::MalformedHardware(e.to_string()))
}

/// Optional blocks the code generator may emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedFeatures {
    pub position_feedback: bool,
    pub torque_control: bool,
    pub soft_limits: bool,
    pub emergency_stop: bool,
    pub network_control: bool,
    pub data_logging: bool,
}

impl Default for AdvancedFeatures {
    fn default() -> Self {
        Self {
            position_feedback: false,
            torque_control: false,
            soft_limits: true,
            emergency_stop: true,
            network_control: false,
            data_logging: false,
        }
    }
}

impl AdvancedFeatures {
    /// Feature flags in config-file order, with their snake_case keys
    pub fn flags(&self) -> [(&'static str, bool); 6] {
        [
            ("position_feedback", self.position_feedback),
            ("torque_control", self.torque_control),
            ("soft_limits", self.soft_limits),
            ("emergency_stop", self.emergency_stop),
            ("network_control", self.network_control),
            ("data_logging", self.data_logging),
        ]
    }
}
