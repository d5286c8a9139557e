// Pattern preview: plot a built-in pattern as a text chart with commanded pulses
//
// Usage: cargo run --example pattern_preview -- [preset] [precision] [base_speed]
// Example: cargo run --example pattern_preview -- complex-assembly 8 1.5

use servo_forge::pattern::{apply_config, PatternConfig};
use servo_forge::presets::{self, PRESET_KEYS};
use servo_forge::servo::{commanded_pulse, ServoConfiguration};
use servo_forge::simulator::Simulator;
use tracing::info;

const ROWS: usize = 9; // 0°, 22.5°, ... 180°
const MAX_COLUMNS: usize = 60;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let key = args.next().unwrap_or_else(|| "wave".to_string());
    let pattern = presets::preset(&key)
        .ok_or_else(|| format!("unknown preset '{}' (try: {})", key, PRESET_KEYS.join(", ")))?;

    let mut config = pattern.config.clone().unwrap_or_default();
    if let Some(precision) = args.next() {
        config.precision = precision.parse()?;
    }
    if let Some(speed) = args.next() {
        config.base_speed = speed.parse()?;
    }
    let tuned = apply_config(&pattern, &config)?;
    info!("{}: {} points, {} ms per pass", tuned.name, tuned.point_count(), tuned.duration_ms());

    let servo = ServoConfiguration::new(0, "preview");
    let points = tuned.flatten();

    // Angle chart, one column per point
    let columns = points.len().min(MAX_COLUMNS);
    for row in (0..ROWS).rev() {
        let level = 180.0 * row as f64 / (ROWS - 1) as f64;
        let step = 180.0 / (ROWS - 1) as f64;
        let line: String = points[..columns]
            .iter()
            .map(|p| if (p.angle - level).abs() <= step / 2.0 { '*' } else { ' ' })
            .collect();
        println!("{:>6.1}° |{}", level, line);
    }
    println!("        +{}", "-".repeat(columns));
    println!();

    print_config(&config);
    println!();
    println!("{:>4}  {:>7}  {:>7}  {:>6}", "pt", "angle", "delay", "pulse");
    for (i, p) in points.iter().enumerate() {
        let pulse = commanded_pulse(p.angle, &servo, true)?;
        println!("{:>4}  {:>6.1}°  {:>5}ms  {:>4}µs", i, p.angle, p.delay, pulse);
    }

    // One pass of the timeline; endless patterns are cut off after their first pass
    println!();
    let mut elapsed = 0u64;
    for update in Simulator::start(&tuned, &[servo])?.take(points.len()) {
        elapsed += update.delay_ms;
        let label = update.sequence.as_deref().unwrap_or("-");
        println!("t={:>6}ms  {:>6.1}°  {}", elapsed, update.angle, label);
    }

    Ok(())
}

fn print_config(config: &PatternConfig) {
    println!(
        "baseSpeed {}  precision {}  forceLevel {}  repeat {:?}  pause {}ms",
        config.base_speed, config.precision, config.force_level, config.repeat_count, config.pause_duration
    );
}
