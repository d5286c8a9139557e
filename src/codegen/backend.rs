// Controller back ends for the generated servo_controller.py
//
// Two variants: a PCA9685-style PWM driver addressed over I2C, and direct
// per-pin PWM through RPi.GPIO. Each variant has its own render function;
// the Servo class and feature blocks are shared.

use super::ir::{Expr, Literal, Module, Stmt};
use crate::hardware::{AdvancedFeatures, ControlMethod, HardwareConfiguration};

/// PWM driver the generated controller talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverBackend {
    /// Bus-addressed PWM controller (set-frequency / set-channel)
    BusPwm { bus: u8, address: u16 },
    /// Direct pin PWM with duty-cycle control, servo channel offsets the base pin
    PinPwm { base_pin: u8 },
}

impl DriverBackend {
    /// `i2c` selects the bus driver, every other method drives pins directly
    pub fn select(hardware: &HardwareConfiguration) -> Self {
        match hardware.control_method {
            ControlMethod::I2c => DriverBackend::BusPwm {
                bus: hardware.i2c_bus,
                address: hardware.i2c_address,
            },
            ControlMethod::Gpio | ControlMethod::Uart => DriverBackend::PinPwm {
                base_pin: hardware.gpio_pin,
            },
        }
    }

    pub fn controller_module(&self, features: &AdvancedFeatures) -> Module {
        match *self {
            DriverBackend::BusPwm { bus, address } => bus_pwm_controller(bus, address, features),
            DriverBackend::PinPwm { base_pin } => pin_pwm_controller(base_pin, features),
        }
    }
}

fn bus_pwm_controller(bus: u8, address: u16, features: &AdvancedFeatures) -> Module {
    let mut body = vec![
        Stmt::comment(format!(
            "PCA9685 PWM driver on I2C bus {} at address 0x{:02x}",
            bus, address
        )),
        Stmt::import("time"),
        Stmt::ImportAs {
            module: "smbus2".to_string(),
            alias: "smbus".to_string(),
        },
    ];
    body.extend(feature_imports(features));
    body.push(Stmt::Blank);
    body.push(Stmt::assign("MODE1", Literal::Hex(0x00)));
    body.push(Stmt::assign("PRESCALE", Literal::Hex(0xfe)));
    // MODE1 bits; the chip powers up with SLEEP set
    body.push(Stmt::assign("RESTART", Literal::Hex(0x80)));
    body.push(Stmt::assign("AUTO_INCREMENT", Literal::Hex(0x20)));
    body.push(Stmt::assign("SLEEP", Literal::Hex(0x10)));
    body.push(Stmt::assign("LED0_ON_L", Literal::Hex(0x06)));
    body.push(Stmt::assign("OSCILLATOR_HZ", Literal::Int(25_000_000)));
    body.push(Stmt::assign("PWM_STEPS", Literal::Int(4096)));
    body.extend(estop_exception(features));

    let mut init = controller_init(features);
    init.push(Stmt::assign("self.bus", Literal::None));
    init.push(Stmt::assign("self.i2c_address", "config['i2c_address']"));

    let mut methods = vec![
        Stmt::def("__init__", &["self", "config"], init),
        Stmt::def(
            "initialize",
            &["self"],
            with_feature_setup(
                vec![
                    Stmt::assign("self.bus", "smbus.SMBus(self.config['i2c_bus'])"),
                    Stmt::raw("self.set_pwm_frequency(self.config['pwm_frequency'])"),
                ],
                features,
            ),
        ),
        Stmt::def(
            "cleanup",
            &["self"],
            vec![Stmt::if_then(
                "self.bus",
                vec![
                    Stmt::for_in("servo", "self.servos", vec![Stmt::raw("self.release(servo)")]),
                    Stmt::raw("self.bus.close()"),
                ],
            )],
        ),
        add_servo_method(),
        Stmt::def(
            "set_pwm_frequency",
            &["self", "freq"],
            vec![
                Stmt::assign("prescale", "int(round(OSCILLATOR_HZ / (PWM_STEPS * freq))) - 1"),
                Stmt::assign(
                    "old_mode",
                    "self.bus.read_byte_data(self.i2c_address, MODE1)",
                ),
                Stmt::assign("wake", "old_mode & ~(RESTART | SLEEP)"),
                Stmt::comment("The prescaler only takes writes while the oscillator sleeps"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, MODE1, wake | SLEEP)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, PRESCALE, prescale)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, MODE1, wake)"),
                Stmt::raw("time.sleep(0.005)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, MODE1, wake | RESTART | AUTO_INCREMENT)"),
            ],
        )
        .with_doc("Program the PWM output frequency"),
        Stmt::def(
            "set_pwm",
            &["self", "channel", "on", "off"],
            vec![
                Stmt::assign("base", "LED0_ON_L + 4 * channel"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, base, on & 0xff)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, base + 1, on >> 8)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, base + 2, off & 0xff)"),
                Stmt::raw("self.bus.write_byte_data(self.i2c_address, base + 3, off >> 8)"),
            ],
        )
        .with_doc("Set on/off tick counts for one output channel"),
        Stmt::def(
            "write_pulse",
            &["self", "servo", "pulse"],
            vec![
                Stmt::assign("period_us", "1000000 / self.config['pwm_frequency']"),
                Stmt::assign("ticks", "int(pulse / period_us * PWM_STEPS)"),
                Stmt::raw("self.set_pwm(servo.channel, 0, max(0, min(PWM_STEPS - 1, ticks)))"),
            ],
        ),
        Stmt::def(
            "release",
            &["self", "servo"],
            vec![Stmt::raw("self.set_pwm(servo.channel, 0, 0)")],
        ),
    ];
    methods.extend(feature_methods(features));

    body.push(Stmt::class("ServoController", methods));
    body.push(servo_class(features, None));
    Module::new(body)
}

fn pin_pwm_controller(base_pin: u8, features: &AdvancedFeatures) -> Module {
    let mut body = vec![
        Stmt::comment(format!(
            "Direct PWM on GPIO pins starting at {} (pin = base + channel)",
            base_pin
        )),
        Stmt::import("time"),
        Stmt::ImportAs {
            module: "RPi.GPIO".to_string(),
            alias: "GPIO".to_string(),
        },
    ];
    body.extend(feature_imports(features));
    body.extend(estop_exception(features));

    let mut init = controller_init(features);
    init.push(Stmt::raw("GPIO.setmode(GPIO.BCM)"));
    init.push(Stmt::raw("GPIO.setwarnings(False)"));

    let mut methods = vec![
        Stmt::def("__init__", &["self", "config"], init),
        Stmt::def(
            "initialize",
            &["self"],
            with_feature_setup(
                vec![Stmt::for_in(
                    "servo",
                    "self.servos",
                    vec![
                        Stmt::raw("GPIO.setup(servo.pin, GPIO.OUT)"),
                        Stmt::assign(
                            "servo.pwm",
                            "GPIO.PWM(servo.pin, self.config['pwm_frequency'])",
                        ),
                        Stmt::raw("servo.pwm.start(0)"),
                    ],
                )],
                features,
            ),
        ),
        Stmt::def(
            "cleanup",
            &["self"],
            vec![
                Stmt::for_in(
                    "servo",
                    "self.servos",
                    vec![Stmt::if_then("servo.pwm", vec![Stmt::raw("servo.pwm.stop()")])],
                ),
                Stmt::raw("GPIO.cleanup()"),
            ],
        ),
        add_servo_method(),
        Stmt::def(
            "write_pulse",
            &["self", "servo", "pulse"],
            vec![
                Stmt::assign("period_us", "1000000 / self.config['pwm_frequency']"),
                Stmt::raw("servo.pwm.ChangeDutyCycle(max(0.0, min(100.0, pulse / period_us * 100)))"),
            ],
        )
        .with_doc("Duty cycle is the pulse width as a share of the PWM period"),
        Stmt::def(
            "release",
            &["self", "servo"],
            vec![Stmt::if_then("servo.pwm", vec![Stmt::raw("servo.pwm.ChangeDutyCycle(0)")])],
        ),
    ];
    methods.extend(feature_methods(features));

    body.push(Stmt::class("ServoController", methods));
    body.push(servo_class(
        features,
        Some(vec![
            Stmt::assign("self.pin", "controller.config['gpio_pin'] + channel"),
            Stmt::assign("self.pwm", Literal::None),
        ]),
    ));
    Module::new(body)
}

fn feature_imports(features: &AdvancedFeatures) -> Vec<Stmt> {
    let mut imports = Vec::new();
    if features.data_logging {
        imports.push(Stmt::import("csv"));
        imports.push(Stmt::from_import("datetime", &["datetime"]));
    }
    imports
}

fn estop_exception(features: &AdvancedFeatures) -> Vec<Stmt> {
    if !features.emergency_stop {
        return Vec::new();
    }
    vec![Stmt::class("EmergencyStop", vec![Stmt::Pass]).with_base("Exception")]
}

fn controller_init(features: &AdvancedFeatures) -> Vec<Stmt> {
    let mut init = vec![
        Stmt::assign("self.config", "config"),
        Stmt::assign("self.servos", Literal::List(Vec::new())),
    ];
    if features.emergency_stop {
        init.push(Stmt::assign("self.stopped", Literal::Bool(false)));
    }
    if features.position_feedback {
        init.push(Stmt::assign("self.current_positions", Literal::Dict(Vec::new())));
    }
    if features.data_logging {
        init.push(Stmt::assign("self.log_file", Literal::None));
    }
    init
}

fn with_feature_setup(mut body: Vec<Stmt>, features: &AdvancedFeatures) -> Vec<Stmt> {
    if features.data_logging {
        body.push(Stmt::raw("self.setup_logging()"));
    }
    body
}

fn add_servo_method() -> Stmt {
    Stmt::def(
        "add_servo",
        &["self", "channel", "config"],
        vec![
            Stmt::assign("servo", "Servo(self, channel, config)"),
            Stmt::raw("self.servos.append(servo)"),
            Stmt::Return(Some(Expr::name("servo"))),
        ],
    )
}

fn feature_methods(features: &AdvancedFeatures) -> Vec<Stmt> {
    let mut methods = Vec::new();

    if features.emergency_stop {
        methods.push(
            Stmt::def(
                "emergency_stop",
                &["self"],
                vec![
                    Stmt::assign("self.stopped", Literal::Bool(true)),
                    Stmt::for_in("servo", "self.servos", vec![Stmt::raw("self.release(servo)")]),
                ],
            )
            .with_doc("Release every output and refuse further moves"),
        );
        methods.push(Stmt::def(
            "reset_emergency_stop",
            &["self"],
            vec![Stmt::assign("self.stopped", Literal::Bool(false))],
        ));
    }

    if features.position_feedback {
        methods.push(Stmt::def(
            "get_position",
            &["self", "channel"],
            vec![Stmt::Return(Some(Expr::raw("self.current_positions.get(channel)")))],
        ));
    }

    if features.torque_control {
        methods.push(
            Stmt::def(
                "set_torque",
                &["self", "servo", "enabled"],
                vec![Stmt::If {
                    cond: Expr::raw("enabled"),
                    body: vec![Stmt::raw("servo.move_to(servo.current_angle)")],
                    orelse: vec![Stmt::raw("self.release(servo)")],
                }],
            )
            .with_doc("Hold the last commanded angle, or let the horn turn freely"),
        );
    }

    if features.data_logging {
        methods.push(Stmt::def(
            "setup_logging",
            &["self"],
            vec![
                Stmt::assign(
                    "self.log_file",
                    "f\"servo_log_{datetime.now().strftime('%Y%m%d_%H%M%S')}.csv\"",
                ),
                Stmt::raw("self._append_log_row(['timestamp', 'channel', 'command_angle', 'pulse'])"),
            ],
        ));
        methods.push(Stmt::def(
            "log_movement",
            &["self", "channel", "angle", "pulse"],
            vec![Stmt::raw(
                "self._append_log_row([datetime.now().isoformat(), channel, angle, pulse])",
            )],
        ));
        methods.push(Stmt::def(
            "_append_log_row",
            &["self", "row"],
            vec![Stmt::raw("with open(self.log_file, 'a', newline='') as f: csv.writer(f).writerow(row)")],
        ));
    }

    methods
}

/// `Servo` class shared by both back ends; `extra_init` adds backend fields
fn servo_class(features: &AdvancedFeatures, extra_init: Option<Vec<Stmt>>) -> Stmt {
    let mut init = vec![
        Stmt::assign("self.controller", "controller"),
        Stmt::assign("self.channel", "channel"),
        Stmt::assign("self.config", "config"),
        Stmt::assign("self.initial_position", "config['initial_position']"),
        Stmt::assign("self.current_angle", "config['initial_position']"),
    ];
    init.extend(extra_init.unwrap_or_default());

    let mut move_to = Vec::new();
    if features.emergency_stop {
        move_to.push(Stmt::if_then(
            "self.controller.stopped",
            vec![Stmt::Raise(Expr::raw("EmergencyStop('Emergency stop active')"))],
        ));
    }
    move_to.push(Stmt::assign("limits", "self.config['limits']"));
    if features.soft_limits {
        move_to.push(Stmt::assign(
            "angle",
            "max(limits['min_angle'], min(limits['max_angle'], angle))",
        ));
    }
    move_to.extend([
        Stmt::assign("target", "angle"),
        Stmt::if_then(
            "self.config['inverted']",
            vec![Stmt::assign(
                "target",
                "limits['min_angle'] + limits['max_angle'] - target",
            )],
        ),
        Stmt::comment("Apply calibration"),
        Stmt::assign("calibration", "self.config['calibration']"),
        Stmt::assign(
            "target",
            "(target + calibration['center_offset']) * calibration['angle_multiplier']",
        ),
        Stmt::assign(
            "pulse",
            "self._angle_to_pulse(target) + round(calibration['pulse_offset'])",
        ),
        Stmt::raw("self.controller.write_pulse(self, pulse)"),
        Stmt::assign("self.current_angle", "angle"),
    ]);
    if features.position_feedback {
        move_to.push(Stmt::assign(
            "self.controller.current_positions[self.channel]",
            "angle",
        ));
    }
    if features.data_logging {
        move_to.push(Stmt::raw(
            "self.controller.log_movement(self.channel, angle, pulse)",
        ));
    }

    Stmt::class(
        "Servo",
        vec![
            Stmt::def("__init__", &["self", "controller", "channel", "config"], init),
            Stmt::def("move_to", &["self", "angle"], move_to),
            Stmt::def(
                "_angle_to_pulse",
                &["self", "angle"],
                vec![
                    Stmt::assign(
                        "pulse_range",
                        "self.config['max_pulse'] - self.config['min_pulse']",
                    ),
                    Stmt::assign(
                        "angle_range",
                        "self.config['limits']['max_angle'] - self.config['limits']['min_angle']",
                    ),
                    Stmt::Return(Some(Expr::raw(
                        "int(round(self.config['min_pulse'] + (angle / angle_range) * pulse_range))",
                    ))),
                ],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::python;

    fn hardware(method: ControlMethod) -> HardwareConfiguration {
        HardwareConfiguration {
            control_method: method,
            ..HardwareConfiguration::default()
        }
    }

    #[test]
    fn test_select_is_two_way() {
        assert_eq!(
            DriverBackend::select(&hardware(ControlMethod::I2c)),
            DriverBackend::BusPwm {
                bus: 1,
                address: 0x40
            }
        );
        assert_eq!(
            DriverBackend::select(&hardware(ControlMethod::Gpio)),
            DriverBackend::PinPwm { base_pin: 18 }
        );
        assert_eq!(
            DriverBackend::select(&hardware(ControlMethod::Uart)),
            DriverBackend::PinPwm { base_pin: 18 }
        );
    }

    #[test]
    fn test_bus_backend_structure() {
        let module = DriverBackend::BusPwm {
            bus: 7,
            address: 0x41,
        }
        .controller_module(&AdvancedFeatures::default());
        assert!(module.imports("smbus2"));
        assert!(!module.imports("RPi.GPIO"));
        assert!(module.defines("set_pwm_frequency"));
        assert!(module.defines("set_pwm"));
        assert!(module.defines("ServoController"));
        assert!(module.defines("Servo"));

        let text = python::render(&module);
        assert!(text.starts_with("# PCA9685 PWM driver on I2C bus 7 at address 0x41\n"));
        assert!(text.contains("self.bus = smbus.SMBus(self.config['i2c_bus'])"));
    }

    #[test]
    fn test_bus_backend_wakes_oscillator() {
        let module = DriverBackend::BusPwm {
            bus: 1,
            address: 0x40,
        }
        .controller_module(&AdvancedFeatures::default());
        assert_eq!(module.constant("SLEEP"), Some(&Literal::Hex(0x10)));
        assert_eq!(module.constant("RESTART"), Some(&Literal::Hex(0x80)));

        let text = python::render(&module);
        assert!(text.contains("wake = old_mode & ~(RESTART | SLEEP)"));
        let mode1_writes: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("self.bus.write_byte_data(self.i2c_address, MODE1,"))
            .collect();
        assert_eq!(mode1_writes.len(), 3);
        // Every write after the prescaler leaves SLEEP cleared
        for line in &mode1_writes[1..] {
            assert!(line.contains("wake") && !line.contains("SLEEP") && !line.contains("old_mode"));
        }
        assert!(mode1_writes[2].ends_with("wake | RESTART | AUTO_INCREMENT)"));
    }

    #[test]
    fn test_pin_backend_structure() {
        let module =
            DriverBackend::PinPwm { base_pin: 12 }.controller_module(&AdvancedFeatures::default());
        assert!(module.imports("RPi.GPIO"));
        assert!(!module.imports("smbus2"));
        assert!(!module.defines("set_pwm_frequency"));
        assert!(module.defines("write_pulse"));

        let text = python::render(&module);
        assert!(text.contains("servo.pwm = GPIO.PWM(servo.pin, self.config['pwm_frequency'])"));
        assert!(text.contains("ChangeDutyCycle"));
    }

    #[test]
    fn test_features_gate_blocks() {
        let none = AdvancedFeatures {
            position_feedback: false,
            torque_control: false,
            soft_limits: false,
            emergency_stop: false,
            network_control: false,
            data_logging: false,
        };
        let module = DriverBackend::PinPwm { base_pin: 18 }.controller_module(&none);
        assert!(!module.defines("EmergencyStop"));
        assert!(!module.defines("emergency_stop"));
        assert!(!module.defines("get_position"));
        assert!(!module.defines("set_torque"));
        assert!(!module.defines("log_movement"));
        assert!(!module.imports("csv"));
        assert!(!python::render(&module).contains("max(limits['min_angle']"));

        let all = AdvancedFeatures {
            position_feedback: true,
            torque_control: true,
            soft_limits: true,
            emergency_stop: true,
            network_control: true,
            data_logging: true,
        };
        let module = DriverBackend::PinPwm { base_pin: 18 }.controller_module(&all);
        assert!(module.defines("EmergencyStop"));
        assert!(module.defines("emergency_stop"));
        assert!(module.defines("get_position"));
        assert!(module.defines("set_torque"));
        assert!(module.defines("log_movement"));
        assert!(module.imports("csv"));
        assert!(python::render(&module).contains("max(limits['min_angle']"));
    }
}
