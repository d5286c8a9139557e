// Application state store
//
// Holds servos, saved patterns, hardware settings and the active pattern.
// Every write normalizes servos, persists under `appState`, then notifies
// watchers with the new snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{STATE_BACKUP_KEY, STATE_KEY};
use crate::error::StoreError;
use crate::events::{AppEvent, EventBus};
use crate::hardware::{AdvancedFeatures, HardwareConfiguration};
use crate::pattern::MovementPattern;
use crate::servo::ServoConfiguration;
use crate::store::{get_json, set_json, KeyValueStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub servos: Vec<ServoConfiguration>,
    pub patterns: Vec<MovementPattern>,
    #[serde(alias = "jetsonConfig")]
    pub hardware_config: HardwareConfiguration,
    pub advanced_features: AdvancedFeatures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_pattern: Option<MovementPattern>,
}

/// Partial update; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub servos: Option<Vec<ServoConfiguration>>,
    pub patterns: Option<Vec<MovementPattern>>,
    pub hardware_config: Option<HardwareConfiguration>,
    pub advanced_features: Option<AdvancedFeatures>,
    /// `Some(None)` clears the active pattern
    pub active_pattern: Option<Option<MovementPattern>>,
}

impl From<AppState> for StatePatch {
    fn from(state: AppState) -> Self {
        Self {
            servos: Some(state.servos),
            patterns: Some(state.patterns),
            hardware_config: Some(state.hardware_config),
            advanced_features: Some(state.advanced_features),
            active_pattern: Some(state.active_pattern),
        }
    }
}

pub struct StateStore {
    kv: Box<dyn KeyValueStore>,
    tx: watch::Sender<AppState>,
    // false when unreadable state could not be set aside; writes would destroy it
    writable: bool,
    bus: Option<EventBus>,
}

impl StateStore {
    /// Load persisted state, falling back to defaults when absent or unreadable
    ///
    /// Unreadable state is copied to `appState.unreadable` before anything can
    /// overwrite it. If that copy fails the store stays read-only.
    pub fn open(kv: impl KeyValueStore + 'static) -> Self {
        let mut writable = true;
        let state = match get_json::<AppState>(&kv, STATE_KEY) {
            Ok(Some(state)) => {
                info!(
                    "Loaded state: {} servos, {} patterns",
                    state.servos.len(),
                    state.patterns.len()
                );
                state
            }
            Ok(None) => AppState::default(),
            Err(e) => {
                warn!("Failed to load state: {}", e);
                writable = set_aside(&kv);
                AppState::default()
            }
        };
        let (tx, _) = watch::channel(state);
        Self {
            kv: Box::new(kv),
            tx,
            writable,
            bus: None,
        }
    }

    /// Publish `servo:update` for every servo added or replaced
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn get_state(&self) -> AppState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Merge a patch, persist, notify
    ///
    /// Subscribers are notified even when persisting fails; the error is
    /// returned to the caller.
    pub fn set_state(&self, patch: StatePatch) -> Result<(), StoreError> {
        let mut state = self.get_state();
        if let Some(servos) = patch.servos {
            state.servos = servos.into_iter().map(ServoConfiguration::normalized).collect();
            warn_duplicate_channels(&state.servos);
        }
        if let Some(patterns) = patch.patterns {
            state.patterns = patterns;
        }
        if let Some(hardware) = patch.hardware_config {
            state.hardware_config = hardware;
        }
        if let Some(features) = patch.advanced_features {
            state.advanced_features = features;
        }
        if let Some(active) = patch.active_pattern {
            state.active_pattern = active;
        }

        let saved = if self.writable {
            set_json(self.kv.as_ref(), STATE_KEY, &state)
        } else {
            Err(StoreError::Unreadable(STATE_KEY.to_string()))
        };
        if let Err(e) = &saved {
            warn!("Failed to save state: {}", e);
        }
        self.tx.send_replace(state);
        debug!("State updated");
        saved
    }

    pub fn add_servo(&self, servo: ServoConfiguration) -> Result<(), StoreError> {
        let mut servos = self.get_state().servos;
        servos.push(servo);
        let index = servos.len() - 1;
        let saved = self.set_servos(servos);
        self.announce_servo(index);
        saved
    }

    /// Replace the servo at `index`, false when out of range
    pub fn update_servo(&self, index: usize, servo: ServoConfiguration) -> Result<bool, StoreError> {
        let mut servos = self.get_state().servos;
        let Some(slot) = servos.get_mut(index) else {
            warn!("No servo at index {}", index);
            return Ok(false);
        };
        *slot = servo;
        let saved = self.set_servos(servos);
        self.announce_servo(index);
        saved.map(|()| true)
    }

    pub fn remove_servo(&self, index: usize) -> Result<Option<ServoConfiguration>, StoreError> {
        let mut servos = self.get_state().servos;
        if index >= servos.len() {
            return Ok(None);
        }
        let removed = servos.remove(index);
        self.set_servos(servos)?;
        Ok(Some(removed))
    }

    /// Replace the pattern with the same name, or append
    pub fn upsert_pattern(&self, pattern: MovementPattern) -> Result<(), StoreError> {
        let mut patterns = self.get_state().patterns;
        match patterns.iter_mut().find(|p| p.name == pattern.name) {
            Some(existing) => *existing = pattern,
            None => patterns.push(pattern),
        }
        self.set_state(StatePatch {
            patterns: Some(patterns),
            ..StatePatch::default()
        })
    }

    pub fn set_active_pattern(&self, pattern: Option<MovementPattern>) -> Result<(), StoreError> {
        self.set_state(StatePatch {
            active_pattern: Some(pattern),
            ..StatePatch::default()
        })
    }

    pub fn update_hardware_config(
        &self,
        update: impl FnOnce(&mut HardwareConfiguration),
    ) -> Result<(), StoreError> {
        let mut hardware = self.get_state().hardware_config;
        update(&mut hardware);
        self.set_state(StatePatch {
            hardware_config: Some(hardware),
            ..StatePatch::default()
        })
    }

    pub fn update_advanced_features(
        &self,
        update: impl FnOnce(&mut AdvancedFeatures),
    ) -> Result<(), StoreError> {
        let mut features = self.get_state().advanced_features;
        update(&mut features);
        self.set_state(StatePatch {
            advanced_features: Some(features),
            ..StatePatch::default()
        })
    }

    // Sends the stored (normalized) copy
    fn announce_servo(&self, index: usize) {
        let Some(bus) = &self.bus else {
            return;
        };
        if let Some(servo) = self.tx.borrow().servos.get(index).cloned() {
            bus.publish(AppEvent::ServoUpdate(servo));
        }
    }

    fn set_servos(&self, servos: Vec<ServoConfiguration>) -> Result<(), StoreError> {
        self.set_state(StatePatch {
            servos: Some(servos),
            ..StatePatch::default()
        })
    }
}

fn set_aside(kv: &dyn KeyValueStore) -> bool {
    let copied = kv
        .get(STATE_KEY)
        .and_then(|raw| match raw {
            Some(text) => kv.set(STATE_BACKUP_KEY, &text),
            None => Ok(()),
        });
    match copied {
        Ok(()) => {
            warn!("Kept unreadable state as {}", STATE_BACKUP_KEY);
            true
        }
        Err(e) => {
            warn!("Could not keep unreadable state, not persisting changes: {}", e);
            false
        }
    }
}

fn warn_duplicate_channels(servos: &[ServoConfiguration]) {
    let mut seen = HashSet::new();
    for servo in servos {
        if !seen.insert(servo.channel) {
            warn!("Channel {} is used by more than one servo", servo.channel);
        }
    }
}
