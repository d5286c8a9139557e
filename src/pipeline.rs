// Pipeline facade: validate -> transform -> generate / simulate
//
// Each stage publishes its event on the bus. Failures are logged, published
// as error events and returned.

use tracing::{info, warn};

use crate::codegen::{self, GeneratedProject};
use crate::error::{Error, ErrorEvent, Result};
use crate::events::{AppEvent, EventBus};
use crate::hardware::{AdvancedFeatures, HardwareConfiguration};
use crate::pattern::{apply_config, validate_pattern, MovementPattern, PatternConfig};
use crate::servo::ServoConfiguration;
use crate::simulator::{Simulation, Simulator};
use crate::state::AppState;

pub struct Pipeline {
    bus: EventBus,
}

impl Pipeline {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Validate against the first servo, then rescale delays when a config is given
    pub fn prepare(
        &self,
        pattern: &MovementPattern,
        config: Option<&PatternConfig>,
        servos: &[ServoConfiguration],
    ) -> Result<MovementPattern> {
        self.check_servos(servos.iter().take(1))?;
        validate_pattern(pattern, servos).map_err(|e| self.fail(e))?;
        let Some(config) = config else {
            return Ok(pattern.clone());
        };
        let transformed = apply_config(pattern, config).map_err(|e| self.fail(e))?;
        info!(
            "Transformed '{}' at precision {} and speed {}",
            transformed.name, config.precision, config.base_speed
        );
        self.bus.publish(AppEvent::PatternUpdate(transformed.clone()));
        Ok(transformed)
    }

    /// Generate the controller project; every servo and an active pattern are checked first
    pub fn generate(
        &self,
        servos: &[ServoConfiguration],
        hardware: &HardwareConfiguration,
        features: &AdvancedFeatures,
        active_pattern: Option<&MovementPattern>,
    ) -> Result<GeneratedProject> {
        self.check_servos(servos)?;
        if let Some(pattern) = active_pattern {
            validate_pattern(pattern, servos).map_err(|e| self.fail(e))?;
        }
        let project = codegen::generate(servos, hardware, features, active_pattern)
            .map_err(|e| self.fail(e))?;
        self.bus.publish(AppEvent::CodeGenerate);
        Ok(project)
    }

    pub fn generate_from_state(&self, state: &AppState) -> Result<GeneratedProject> {
        self.generate(
            &state.servos,
            &state.hardware_config,
            &state.advanced_features,
            state.active_pattern.as_ref(),
        )
    }

    pub fn simulate(
        &self,
        pattern: &MovementPattern,
        servos: &[ServoConfiguration],
    ) -> Result<Simulation> {
        self.check_servos(servos.iter().take(1))?;
        let simulation = Simulator::start(pattern, servos).map_err(|e| self.fail(e))?;
        self.bus.publish(AppEvent::PatternExecute(pattern.clone()));
        Ok(simulation)
    }

    // Equal or inverted angle/pulse ranges make the pulse mapping divide by zero
    fn check_servos<'a>(&self, servos: impl IntoIterator<Item = &'a ServoConfiguration>) -> Result<()> {
        for servo in servos {
            servo.check().map_err(|e| self.fail(e))?;
        }
        Ok(())
    }

    fn fail(&self, err: impl Into<Error>) -> Error {
        let err = err.into();
        warn!("{:?} error: {}", err.kind(), err);
        self.bus.publish(AppEvent::Error(ErrorEvent::from(&err)));
        err
    }
}
