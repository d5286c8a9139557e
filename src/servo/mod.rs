// Servo description and numeric mapping
//
// Provides:
// - Servo configuration, limits and calibration types
// - Angle <-> pulse-width conversion
// - Per-servo scripted programs

mod model;
pub mod program;
pub mod pulse;

pub use model::{
    Dimensions, Range, RatedSpeed, ServoCalibration, ServoConfiguration, ServoLimits,
    ServoSpecification, Torque,
};
pub use program::{ProgramStep, ServoProgram};
pub use pulse::{angle_to_pulse, calibrated_angle, commanded_pulse, pulse_to_angle};
