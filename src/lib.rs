// Servo pattern toolchain
//
// Provides:
// - Servo model, angle/pulse conversion and per-servo programs (servo)
// - Movement patterns: model, limit validation, delay transform (pattern)
// - Controller code generation through a Python IR (codegen)
// - Timed execution simulation (simulator)
// - State store, saved-pattern library and key-value persistence (state, library, store)
// - Event bus and the pipeline facade tying the stages together (events, pipeline)

pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod events;
pub mod hardware;
pub mod library;
pub mod pattern;
pub mod pipeline;
pub mod presets;
pub mod servo;
pub mod simulator;
pub mod state;
pub mod store;

pub use error::{Error, ErrorEvent, ErrorKind, Result};
