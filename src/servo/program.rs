// Per-servo scripted programs
//
// A program is an ordered list of steps attached to one servo. At most one
// program is active per servo, tracked by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::ServoConfiguration;
use crate::error::ConfigurationError;
use crate::pattern::{millis, opt_millis};

/// One step of a servo program, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgramStep {
    Move {
        value: f64, // target angle
        #[serde(
            default,
            deserialize_with = "opt_millis",
            skip_serializing_if = "Option::is_none"
        )]
        duration: Option<u64>,
    },
    Wait {
        #[serde(deserialize_with = "millis")]
        duration: u64,
    },
    /// Steps switched to `repeat` in the editor may carry no count yet
    Repeat {
        #[serde(rename = "repeatCount", default = "single_pass")]
        repeat_count: u32,
    },
    Speed {
        value: f64,
    },
    Acceleration {
        value: f64,
    },
    Home,
}

fn single_pass() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServoProgram {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<ProgramStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServoProgram {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of the explicit move and wait durations (ms)
    pub fn total_duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| match step {
                ProgramStep::Move { duration, .. } => duration.unwrap_or(0),
                ProgramStep::Wait { duration } => *duration,
                _ => 0,
            })
            .sum()
    }
}

impl ServoConfiguration {
    /// Create an empty program and return its id
    pub fn create_program(&mut self, name: impl Into<String>) -> String {
        let now = Utc::now();
        // Millisecond timestamp ids, bumped on collision within the same ms
        let mut stamp = now.timestamp_millis();
        while self.programs.iter().any(|p| p.id == stamp.to_string()) {
            stamp += 1;
        }
        let program = ServoProgram::new(stamp.to_string(), name);
        let id = program.id.clone();
        info!("Servo {}: created program {} ({})", self.channel, program.name, id);
        self.programs.push(program);
        id
    }

    pub fn program(&self, id: &str) -> Option<&ServoProgram> {
        self.programs.iter().find(|p| p.id == id)
    }

    /// Edit a program in place and bump its `updatedAt`
    pub fn update_program<F>(&mut self, id: &str, edit: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut ServoProgram),
    {
        let program = self
            .programs
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ConfigurationError::UnknownProgram(id.to_string()))?;
        edit(program);
        program.updated_at = Utc::now();
        debug!("Servo {}: updated program {}", self.channel, id);
        Ok(())
    }

    /// Remove a program; clears the active reference if it pointed here
    pub fn delete_program(&mut self, id: &str) -> bool {
        let before = self.programs.len();
        self.programs.retain(|p| p.id != id);
        let removed = self.programs.len() != before;
        if removed && self.active_program.as_deref() == Some(id) {
            self.active_program = None;
        }
        removed
    }

    pub fn set_active_program(&mut self, id: Option<&str>) -> Result<(), ConfigurationError> {
        match id {
            Some(id) if self.program(id).is_none() => {
                Err(ConfigurationError::UnknownProgram(id.to_string()))
            }
            _ => {
                self.active_program = id.map(str::to_string);
                Ok(())
            }
        }
    }

    pub fn active_program(&self) -> Option<&ServoProgram> {
        self.active_program.as_deref().and_then(|id| self.program(id))
    }
}
