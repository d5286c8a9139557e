// Code generation for the embedded controller
//
// Provides:
// - Structured IR for generated source (ir)
// - Python serializer (python)
// - Controller back ends, bus-addressed vs direct pin PWM (backend)
// - main.py / config.py / patterns.py builders (project)

pub mod backend;
pub mod ir;
pub mod project;
pub mod python;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{
    CONFIG_FILE, CONTROLLER_FILE, MAIN_FILE, NO_SERVOS_PLACEHOLDER, PATTERNS_FILE,
};
use crate::error::GenerationError;
use crate::hardware::{AdvancedFeatures, HardwareConfiguration};
use crate::pattern::MovementPattern;
use crate::servo::ServoConfiguration;

pub use backend::DriverBackend;
use ir::{Module, Stmt};

/// Rendered project files keyed by file name
#[derive(Debug, Clone)]
pub struct GeneratedProject {
    pub files: BTreeMap<String, String>,
    /// Informational only, never written into a file
    pub generated_at: DateTime<Utc>,
}

impl GeneratedProject {
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }
}

/// Build the module tree for every file, before rendering
pub fn build_modules(
    servos: &[ServoConfiguration],
    hardware: &HardwareConfiguration,
    features: &AdvancedFeatures,
    active_pattern: Option<&MovementPattern>,
) -> Result<BTreeMap<String, Module>, GenerationError> {
    let mut modules = BTreeMap::new();

    if servos.is_empty() {
        modules.insert(
            MAIN_FILE.to_string(),
            Module::new(vec![Stmt::comment(NO_SERVOS_PLACEHOLDER)]),
        );
        return Ok(modules);
    }

    hardware.check()?;
    let backend = DriverBackend::select(hardware);
    debug!("Generating for {} servos with {:?}", servos.len(), backend);

    modules.insert(
        MAIN_FILE.to_string(),
        project::main_module(features, active_pattern.is_some()),
    );
    modules.insert(
        CONTROLLER_FILE.to_string(),
        backend.controller_module(features),
    );
    modules.insert(
        CONFIG_FILE.to_string(),
        project::config_module(servos, hardware, features),
    );
    if let Some(pattern) = active_pattern {
        modules.insert(PATTERNS_FILE.to_string(), project::patterns_module(pattern));
    }
    Ok(modules)
}

/// Generate the controller project as text files
pub fn generate(
    servos: &[ServoConfiguration],
    hardware: &HardwareConfiguration,
    features: &AdvancedFeatures,
    active_pattern: Option<&MovementPattern>,
) -> Result<GeneratedProject, GenerationError> {
    let files: BTreeMap<String, String> = build_modules(servos, hardware, features, active_pattern)?
        .into_iter()
        .map(|(name, module)| (name, python::render(&module)))
        .collect();

    info!("Generated {} files", files.len());
    Ok(GeneratedProject {
        files,
        generated_at: Utc::now(),
    })
}
