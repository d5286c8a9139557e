// Builders for main.py, config.py and patterns.py

use super::ir::{Expr, Literal, Module, Stmt};
use crate::hardware::{AdvancedFeatures, ControlMethod, HardwareConfiguration};
use crate::pattern::{Motion, MovementPattern, MovementPoint, PatternConfig, RepeatCount};
use crate::servo::ServoConfiguration;

const NETWORK_PORT: i64 = 5000;

/// Entry point: builds the controller, registers servos, runs the pattern or homes
pub fn main_module(features: &AdvancedFeatures, has_pattern: bool) -> Module {
    let mut body = vec![
        Stmt::comment("!/usr/bin/env python3"),
        Stmt::import("time"),
    ];
    if features.network_control {
        body.push(Stmt::import("threading"));
        body.push(Stmt::from_import("flask", &["Flask", "jsonify", "request"]));
    }
    body.push(Stmt::from_import("servo_controller", &["ServoController"]));
    body.push(Stmt::from_import("config", &["SERVO_CONFIG", "HARDWARE_CONFIG"]));
    if has_pattern {
        body.push(Stmt::from_import("patterns", &["execute_pattern"]));
    }

    if features.network_control {
        body.push(network_interface());
    }

    let mut run = vec![
        Stmt::raw("controller.initialize()"),
        Stmt::raw("print('Hardware initialized successfully')"),
    ];
    if features.network_control {
        run.push(Stmt::raw(
            "threading.Thread(target=start_network_interface, args=(controller,), daemon=True).start()",
        ));
    }
    if has_pattern {
        run.push(Stmt::raw("execute_pattern(controller)"));
    } else {
        run.push(Stmt::comment("Move servos to initial positions"));
        run.push(Stmt::for_in(
            "servo",
            "controller.servos",
            vec![Stmt::raw("servo.move_to(servo.initial_position)")],
        ));
        run.push(Stmt::raw("time.sleep(1)"));
    }

    body.push(Stmt::def(
        "main",
        &[],
        vec![
            Stmt::assign("controller", "ServoController(HARDWARE_CONFIG)"),
            Stmt::for_in(
                "servo_config",
                "SERVO_CONFIG",
                vec![Stmt::raw(
                    "controller.add_servo(servo_config['channel'], servo_config)",
                )],
            ),
            Stmt::Try {
                body: run,
                handlers: vec![
                    (
                        "KeyboardInterrupt".to_string(),
                        vec![Stmt::raw("print('Interrupted')")],
                    ),
                    (
                        "Exception as e".to_string(),
                        vec![Stmt::raw("print(f'Error: {e}')")],
                    ),
                ],
                finally: vec![Stmt::raw("controller.cleanup()")],
            },
        ],
    ));
    body.push(Stmt::if_then(
        "__name__ == '__main__'",
        vec![Stmt::raw("main()")],
    ));
    Module::new(body)
}

fn network_interface() -> Stmt {
    Stmt::def(
        "start_network_interface",
        &["controller"],
        vec![
            Stmt::assign("app", "Flask(__name__)"),
            Stmt::def(
                "move_servo",
                &["channel"],
                vec![
                    Stmt::assign("angle", "float(request.json['angle'])"),
                    Stmt::for_in(
                        "servo",
                        "controller.servos",
                        vec![Stmt::if_then(
                            "servo.channel == channel",
                            vec![
                                Stmt::raw("servo.move_to(angle)"),
                                Stmt::Return(Some(Expr::raw(
                                    "jsonify({'channel': channel, 'angle': angle})",
                                ))),
                            ],
                        )],
                    ),
                    Stmt::Return(Some(Expr::raw("jsonify({'error': 'unknown channel'}), 404"))),
                ],
            )
            .with_decorator("app.route('/servo/<int:channel>', methods=['POST'])"),
            Stmt::raw(format!("app.run(host='0.0.0.0', port={})", NETWORK_PORT)),
        ],
    )
    .with_doc("Accept move commands over HTTP")
}

/// HARDWARE_CONFIG and SERVO_CONFIG
pub fn config_module(
    servos: &[ServoConfiguration],
    hardware: &HardwareConfiguration,
    features: &AdvancedFeatures,
) -> Module {
    let mut hw = vec![(
        "control_method".to_string(),
        Literal::str(hardware.control_method.as_str()),
    )];
    match hardware.control_method {
        ControlMethod::I2c => {
            hw.push(("i2c_bus".to_string(), Literal::Int(hardware.i2c_bus.into())));
            hw.push((
                "i2c_address".to_string(),
                Literal::Hex(hardware.i2c_address.into()),
            ));
        }
        ControlMethod::Gpio | ControlMethod::Uart => {
            hw.push(("gpio_pin".to_string(), Literal::Int(hardware.gpio_pin.into())));
        }
    }
    hw.push((
        "pwm_frequency".to_string(),
        Literal::Int(hardware.pwm_frequency.into()),
    ));
    hw.push((
        "features".to_string(),
        Literal::dict(
            features
                .flags()
                .into_iter()
                .map(|(key, on)| (key, Literal::Bool(on))),
        ),
    ));

    Module::new(vec![
        Stmt::comment("Hardware configuration"),
        Stmt::assign("HARDWARE_CONFIG", Literal::Dict(hw)),
        Stmt::Blank,
        Stmt::comment("Servo configuration"),
        Stmt::assign(
            "SERVO_CONFIG",
            Literal::List(servos.iter().map(servo_literal).collect()),
        ),
    ])
}

fn servo_literal(servo: &ServoConfiguration) -> Literal {
    let limits = &servo.limits;
    let calibration = &servo.calibration;
    Literal::dict([
        ("channel", Literal::Int(servo.channel.into())),
        ("enabled", Literal::Bool(servo.enabled)),
        ("name", Literal::str(&servo.name)),
        ("min_pulse", Literal::Int(servo.min_pulse.into())),
        ("max_pulse", Literal::Int(servo.max_pulse.into())),
        ("initial_position", Literal::Float(servo.initial_position)),
        ("inverted", Literal::Bool(servo.inverted)),
        ("speed", Literal::Float(servo.speed)),
        ("acceleration", Literal::Float(servo.acceleration)),
        (
            "limits",
            Literal::dict([
                ("min_angle", Literal::Float(limits.min_angle)),
                ("max_angle", Literal::Float(limits.max_angle)),
                ("min_pulse", Literal::Int(limits.min_pulse.into())),
                ("max_pulse", Literal::Int(limits.max_pulse.into())),
                ("max_speed", Literal::Float(limits.effective_max_speed())),
                (
                    "max_acceleration",
                    Literal::Float(limits.effective_max_acceleration()),
                ),
            ]),
        ),
        (
            "calibration",
            Literal::dict([
                ("center_offset", Literal::Float(calibration.center_offset)),
                ("pulse_offset", Literal::Float(calibration.pulse_offset)),
                ("angle_multiplier", Literal::Float(calibration.angle_multiplier)),
            ]),
        ),
    ])
}

/// Pattern data plus `execute_pattern(controller)` driving the first servo
pub fn patterns_module(pattern: &MovementPattern) -> Module {
    let mut body = vec![
        Stmt::import("time"),
        Stmt::Blank,
        Stmt::assign("PATTERN_NAME", Literal::str(&pattern.name)),
        Stmt::assign(
            "PATTERN_CONFIG",
            pattern
                .config
                .as_ref()
                .map(config_literal)
                .unwrap_or(Literal::Dict(Vec::new())),
        ),
    ];

    let pass = match &pattern.motion {
        Motion::Flat { points, .. } => {
            body.push(Stmt::assign("POINTS", points_literal(points)));
            vec![
                Stmt::comment("Execute points"),
                Stmt::for_in("point", "POINTS", point_moves()),
            ]
        }
        Motion::Composite { sequences } => {
            let sequences = sequences
                .iter()
                .map(|s| {
                    Literal::dict([
                        ("name", Literal::str(&s.name)),
                        ("points", points_literal(&s.points)),
                    ])
                })
                .collect();
            body.push(Stmt::assign("SEQUENCES", Literal::List(sequences)));
            vec![
                Stmt::comment("Execute sequences"),
                Stmt::for_in(
                    "sequence",
                    "SEQUENCES",
                    vec![
                        Stmt::raw("print(f\"Executing sequence: {sequence['name']}\")"),
                        Stmt::for_in("point", "sequence['points']", point_moves()),
                    ],
                ),
            ]
        }
    };

    // Nothing to move; a `while True` over no points would spin
    if pattern.is_empty() {
        body.push(Stmt::def(
            "execute_pattern",
            &["controller"],
            vec![Stmt::comment("Pattern has no points"), Stmt::Return(None)],
        ));
        return Module::new(body);
    }

    let mut repetition = pass;
    let pause = pattern.pause_duration();
    if pause != 0 {
        repetition.push(Stmt::comment("Pause between repetitions"));
        repetition.push(Stmt::raw(format!("time.sleep({} / 1000)", pause)));
    }

    let repeat = match pattern.repeat_count() {
        RepeatCount::Times(n) => Stmt::for_in("_", format!("range({})", n), repetition),
        RepeatCount::Infinite => Stmt::While {
            cond: Expr::raw("True"),
            body: repetition,
        },
    };

    body.push(Stmt::def(
        "execute_pattern",
        &["controller"],
        vec![Stmt::assign("servo", "controller.servos[0]"), repeat],
    ));
    Module::new(body)
}

fn point_moves() -> Vec<Stmt> {
    vec![
        Stmt::raw("servo.move_to(point['angle'])"),
        Stmt::raw("time.sleep(point['delay'] / 1000)"),
    ]
}

fn points_literal(points: &[MovementPoint]) -> Literal {
    Literal::List(
        points
            .iter()
            .map(|p| {
                Literal::dict([
                    ("angle", Literal::Float(p.angle)),
                    ("delay", Literal::Int(i64::try_from(p.delay).unwrap_or(i64::MAX))),
                ])
            })
            .collect(),
    )
}

// Keys stay in the pattern file's camelCase form
fn config_literal(config: &PatternConfig) -> Literal {
    let repeat = match config.repeat_count {
        RepeatCount::Times(n) => Literal::Int(n.into()),
        RepeatCount::Infinite => Literal::None,
    };
    Literal::dict([
        ("baseSpeed", Literal::Float(config.base_speed)),
        ("precision", Literal::Int(config.precision.into())),
        ("forceLevel", Literal::Int(config.force_level.into())),
        ("repeatCount", repeat),
        (
            "pauseDuration",
            Literal::Int(i64::try_from(config.pause_duration).unwrap_or(i64::MAX)),
        ),
    ])
}
