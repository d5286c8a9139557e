// Built-in pattern table, looked up by key

use std::f64::consts::PI;

use crate::pattern::{
    MovementPattern, MovementPoint, PatternConfig, PointStyle, RepeatCount, Sequence,
    SequenceStyle,
};

pub const PRESET_KEYS: [&str; 7] = [
    "home",
    "wave",
    "sweep",
    "pcb-assembly",
    "lab-pipetting",
    "camera-stabilization",
    "complex-assembly",
];

pub fn preset(key: &str) -> Option<MovementPattern> {
    let pattern = match key {
        "home" => MovementPattern::flat("Home Position", PointStyle::Smooth, points(&[(90.0, 1000)])),
        "wave" => MovementPattern::flat(
            "Wave",
            PointStyle::Smooth,
            points(&[(45.0, 500), (135.0, 500), (45.0, 500), (135.0, 500), (90.0, 500)]),
        )
        .looping(true),
        "sweep" => MovementPattern::flat(
            "Sweep",
            PointStyle::Linear,
            points(&[(0.0, 1000), (180.0, 1000), (0.0, 1000)]),
        ),
        "pcb-assembly" => MovementPattern::flat(
            "PCB Assembly",
            PointStyle::Stepped,
            points(&[(90.0, 300), (45.0, 200), (60.0, 500), (30.0, 300), (15.0, 200), (0.0, 400)]),
        )
        .with_config(config(0.8, 9, 3, RepeatCount::Times(1), 300)),
        "lab-pipetting" => MovementPattern::flat(
            "Laboratory Pipetting",
            PointStyle::Smooth,
            points(&[(90.0, 400), (45.0, 300), (40.0, 500), (90.0, 400), (45.0, 300), (40.0, 500)]),
        )
        .with_config(config(0.7, 10, 2, RepeatCount::Times(1), 200)),
        "camera-stabilization" => {
            // Small oscillation around center
            let wobble = (0..10)
                .map(|i| MovementPoint::new(90.0 + (f64::from(i) * PI / 5.0).sin() * 5.0, 100))
                .collect();
            MovementPattern::flat("Camera Stabilization", PointStyle::Smooth, wobble)
                .looping(true)
                .with_config(config(1.2, 8, 4, RepeatCount::Infinite, 0))
        }
        "complex-assembly" => MovementPattern::composite(
            "Complex Assembly",
            vec![
                Sequence::new(
                    "Rough Positioning",
                    SequenceStyle::Smooth,
                    points(&[(90.0, 300), (45.0, 500)]),
                ),
                Sequence::new(
                    "Fine Adjustment",
                    SequenceStyle::Stepped,
                    points(&[(43.0, 200), (44.0, 200), (45.0, 200)]),
                ),
                Sequence::new(
                    "Final Placement",
                    SequenceStyle::Smooth,
                    points(&[(45.0, 500), (90.0, 300)]),
                ),
            ],
        )
        .with_config(config(0.9, 8, 6, RepeatCount::Times(1), 400)),
        _ => return None,
    };
    Some(pattern)
}

/// Every preset, in key order
pub fn all() -> Vec<(&'static str, MovementPattern)> {
    PRESET_KEYS
        .iter()
        .filter_map(|key| preset(key).map(|p| (*key, p)))
        .collect()
}

fn points(raw: &[(f64, u64)]) -> Vec<MovementPoint> {
    raw.iter().map(|&(angle, delay)| MovementPoint::new(angle, delay)).collect()
}

fn config(
    base_speed: f64,
    precision: u8,
    force_level: u8,
    repeat_count: RepeatCount,
    pause_duration: u64,
) -> PatternConfig {
    PatternConfig {
        base_speed,
        precision,
        force_level,
        repeat_count,
        pause_duration,
    }
}
