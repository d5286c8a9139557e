// Defaults, storage keys, generated file names

// Servo defaults (used whenever a configuration field is absent)
pub const DEFAULT_MIN_PULSE: u32 = 500; // µs
pub const DEFAULT_MAX_PULSE: u32 = 2500; // µs
pub const DEFAULT_INITIAL_POSITION: f64 = 90.0; // deg
pub const DEFAULT_SPEED: f64 = 100.0; // deg/s
// Canonical acceleration default for both new servos and generated config files
pub const DEFAULT_ACCELERATION: f64 = 500.0; // deg/s²
pub const DEFAULT_MIN_ANGLE: f64 = 0.0;
pub const DEFAULT_MAX_ANGLE: f64 = 180.0;
pub const DEFAULT_MAX_SPEED: f64 = 1000.0;
pub const DEFAULT_MAX_ACCELERATION: f64 = 2000.0;

// Hardware defaults (Jetson header + PCA9685 board)
pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_I2C_ADDRESS: u16 = 0x40;
pub const DEFAULT_PWM_FREQUENCY: u32 = 50; // Hz, standard analog servos
pub const DEFAULT_GPIO_PIN: u8 = 18;

// Pattern config defaults
pub const DEFAULT_BASE_SPEED: f64 = 1.0;
pub const DEFAULT_PRECISION: u8 = 5;
pub const DEFAULT_FORCE_LEVEL: u8 = 5;
pub const DEFAULT_PAUSE_DURATION_MS: u64 = 500;

// Key-value store keys
pub const STATE_KEY: &str = "appState";
pub const STATE_BACKUP_KEY: &str = "appState.unreadable"; // copy of state that failed to load
pub const PATTERNS_KEY: &str = "saved_patterns";

// Data directory used by the CLI when --data-dir is not given
pub const DEFAULT_DATA_DIR: &str = ".servo-forge";

// Generated files
pub const MAIN_FILE: &str = "main.py";
pub const CONTROLLER_FILE: &str = "servo_controller.py";
pub const CONFIG_FILE: &str = "config.py";
pub const PATTERNS_FILE: &str = "patterns.py";
pub const NO_SERVOS_PLACEHOLDER: &str =
    "No servos configured yet. Please add servos in the Servos tab.";

// Event bus capacity (slow subscribers lag past this)
pub const EVENT_CHANNEL_SIZE: usize = 256;
