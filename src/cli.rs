// Command-line front end over the pipeline
//
// Patterns come from a JSON file, a built-in preset or the saved library,
// falling back to the active pattern in the stored state. Servos come from
// a JSON file or the stored state.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, ClearType},
};
use tracing::{info, warn};

use crate::config::DEFAULT_DATA_DIR;
use crate::error::{Error, ValidationError};
use crate::events::EventBus;
use crate::hardware::hardware_from_value;
use crate::library::{export_file_name, PatternLibrary};
use crate::pattern::{violations, MovementPattern, PatternConfig, RepeatCount};
use crate::pipeline::Pipeline;
use crate::presets::{self, PRESET_KEYS};
use crate::servo::{ServoConfiguration, ServoLimits};
use crate::simulator::{ServoStateUpdate, Simulation};
use crate::state::{AppState, StatePatch, StateStore};
use crate::store::FileStore;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

// Updates printed for an endless simulation when no --limit is given
const DEFAULT_ENDLESS_LIMIT: usize = 50;
const KEY_POLL: Duration = Duration::from_millis(20);
const GAUGE_WIDTH: usize = 40;

#[derive(Parser, Debug)]
#[command(name = "servo-forge", version)]
#[command(about = "Validate, tune, simulate and generate controller code for servo movement patterns")]
pub struct Cli {
    /// Directory holding the persisted state and saved patterns
    #[arg(long, global = true, env = "SERVO_FORGE_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a pattern against the first servo's limits
    Validate {
        #[command(flatten)]
        pattern: PatternSource,
        #[command(flatten)]
        servos: ServoSource,
    },

    /// Rescale a pattern's delays by precision and base speed
    Transform {
        #[command(flatten)]
        pattern: PatternSource,
        #[command(flatten)]
        servos: ServoSource,
        #[command(flatten)]
        tuning: Tuning,
        /// Write the transformed pattern here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Also save the result to the pattern library
        #[arg(long)]
        save: bool,
    },

    /// Generate the controller project (main.py, servo_controller.py, config.py, patterns.py)
    Generate {
        #[command(flatten)]
        pattern: PatternSource,
        #[command(flatten)]
        servos: ServoSource,
        /// Hardware configuration JSON (defaults to the stored one)
        #[arg(long, value_name = "FILE")]
        hardware: Option<PathBuf>,
        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = "generated")]
        output: PathBuf,
        /// Print files to stdout instead of writing them
        #[arg(short, long)]
        print: bool,
    },

    /// Run the timed execution simulation
    Simulate {
        #[command(flatten)]
        pattern: PatternSource,
        #[command(flatten)]
        servos: ServoSource,
        /// Pace updates in real time with a terminal gauge (q / Esc stops)
        #[arg(long)]
        live: bool,
        /// Stop after this many updates
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
        /// Print updates as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Saved pattern library
    Patterns {
        #[command(subcommand)]
        action: PatternsCommand,
    },

    /// Persisted application state
    State {
        #[command(subcommand)]
        action: StateCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PatternsCommand {
    /// List saved patterns and built-in presets
    List,
    /// Print a saved pattern (or preset) as JSON
    Show { name: String },
    /// Save a pattern JSON file, replacing one with the same name
    Save { file: PathBuf },
    Delete { name: String },
    /// Merge patterns from a JSON array file; imported names win
    Import { file: PathBuf },
    /// Write all saved patterns as JSON (defaults to servo_patterns_<date>.json)
    Export { file: Option<PathBuf> },
}

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    Show,
    /// Replace the stored state with a JSON file
    Import { file: PathBuf },
}

#[derive(Args, Debug, Default)]
pub struct PatternSource {
    /// Pattern JSON file
    #[arg(id = "pattern_file", long = "pattern", value_name = "FILE", conflicts_with_all = ["preset", "saved"])]
    pub file: Option<PathBuf>,
    /// Built-in preset key
    #[arg(long, value_name = "KEY", conflicts_with = "saved")]
    pub preset: Option<String>,
    /// Name of a pattern in the saved library
    #[arg(long, value_name = "NAME")]
    pub saved: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ServoSource {
    /// Servo configuration JSON array (defaults to the stored servos)
    #[arg(id = "servos_file", long = "servos", value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Overrides on top of the pattern's own config
#[derive(Args, Debug, Default)]
pub struct Tuning {
    #[arg(long)]
    pub base_speed: Option<f64>,
    #[arg(long)]
    pub precision: Option<u8>,
    #[arg(long)]
    pub force_level: Option<u8>,
    /// Repetitions; 0 runs forever
    #[arg(long)]
    pub repeat: Option<u32>,
    /// Pause between repetitions (ms)
    #[arg(long)]
    pub pause: Option<u64>,
}

impl Tuning {
    fn apply(&self, base: Option<&PatternConfig>) -> PatternConfig {
        let mut config = base.cloned().unwrap_or_default();
        if let Some(v) = self.base_speed {
            config.base_speed = v;
        }
        if let Some(v) = self.precision {
            config.precision = v;
        }
        if let Some(v) = self.force_level {
            config.force_level = v;
        }
        match self.repeat {
            Some(0) => config.repeat_count = RepeatCount::Infinite,
            Some(n) => config.repeat_count = RepeatCount::Times(n),
            None => {}
        }
        if let Some(v) = self.pause {
            config.pause_duration = v;
        }
        config
    }
}

struct Context {
    state: StateStore,
    library: PatternLibrary,
    pipeline: Pipeline,
}

impl Context {
    fn open(data_dir: &Path) -> CliResult<Self> {
        let store = FileStore::open(data_dir)?;
        let bus = EventBus::new();
        Ok(Self {
            state: StateStore::open(store.clone()).with_events(bus.clone()),
            library: PatternLibrary::new(store),
            pipeline: Pipeline::new(bus),
        })
    }

    fn pattern(&self, source: &PatternSource) -> CliResult<Option<MovementPattern>> {
        if let Some(path) = &source.file {
            return Ok(Some(read_json(path)?));
        }
        if let Some(key) = &source.preset {
            return presets::preset(key)
                .map(Some)
                .ok_or_else(|| format!("unknown preset '{}' (try: {})", key, PRESET_KEYS.join(", ")).into());
        }
        if let Some(name) = &source.saved {
            return self
                .library
                .get(name)
                .map(Some)
                .ok_or_else(|| format!("no saved pattern named '{}'", name).into());
        }
        Ok(self.state.get_state().active_pattern)
    }

    fn require_pattern(&self, source: &PatternSource) -> CliResult<MovementPattern> {
        self.pattern(source)?
            .ok_or_else(|| "no pattern: pass --pattern, --preset or --saved, or set an active pattern".into())
    }

    fn servos(&self, source: &ServoSource) -> CliResult<Vec<ServoConfiguration>> {
        match &source.file {
            Some(path) => Ok(read_json(path)?),
            None => Ok(self.state.get_state().servos),
        }
    }
}

pub async fn run(cli: Cli) -> CliResult<()> {
    let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let ctx = Context::open(&data_dir)?;

    match cli.command {
        Command::Validate { pattern, servos } => validate(&ctx, &pattern, &servos),
        Command::Transform {
            pattern,
            servos,
            tuning,
            output,
            save,
        } => transform(&ctx, &pattern, &servos, &tuning, output.as_deref(), save),
        Command::Generate {
            pattern,
            servos,
            hardware,
            output,
            print,
        } => generate(&ctx, &pattern, &servos, hardware.as_deref(), &output, print),
        Command::Simulate {
            pattern,
            servos,
            live,
            limit,
            json,
        } => simulate(&ctx, &pattern, &servos, live, limit, json).await,
        Command::Patterns { action } => patterns(&ctx, action),
        Command::State { action } => state(&ctx, action),
    }
}

fn validate(ctx: &Context, source: &PatternSource, servo_source: &ServoSource) -> CliResult<()> {
    let pattern = ctx.require_pattern(source)?;
    let servos = ctx.servos(servo_source)?;

    match ctx.pipeline.prepare(&pattern, None, &servos) {
        Ok(_) => {
            println!(
                "'{}' is within limits: {} points, {} ms per pass",
                pattern.name,
                pattern.point_count(),
                pattern.duration_ms()
            );
            Ok(())
        }
        Err(Error::Validation(ValidationError::OutOfLimits { .. })) => {
            // Report every offending point, not just the first
            let limits = &servos[0].limits;
            for v in violations(&pattern, limits) {
                match &v.sequence {
                    Some(seq) => println!("  point {} ({}): {}°", v.index, seq, v.angle),
                    None => println!("  point {}: {}°", v.index, v.angle),
                }
            }
            Err(format!(
                "'{}' leaves the safe range {}-{}°",
                pattern.name, limits.min_angle, limits.max_angle
            )
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

fn transform(
    ctx: &Context,
    source: &PatternSource,
    servo_source: &ServoSource,
    tuning: &Tuning,
    output: Option<&Path>,
    save: bool,
) -> CliResult<()> {
    let pattern = ctx.require_pattern(source)?;
    let servos = ctx.servos(servo_source)?;
    let config = tuning.apply(pattern.config.as_ref());

    let transformed = ctx.pipeline.prepare(&pattern, Some(&config), &servos)?;
    let text = serde_json::to_string_pretty(&transformed)?;
    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    if save && !ctx.library.save(transformed) {
        return Err("failed to save the transformed pattern".into());
    }
    Ok(())
}

fn generate(
    ctx: &Context,
    source: &PatternSource,
    servo_source: &ServoSource,
    hardware: Option<&Path>,
    output: &Path,
    print: bool,
) -> CliResult<()> {
    let state = ctx.state.get_state();
    let pattern = ctx.pattern(source)?;
    let servos = ctx.servos(servo_source)?;
    let hardware = match hardware {
        Some(path) => {
            let value: serde_json::Value = read_json(path)?;
            hardware_from_value(&value).map_err(Error::from)?
        }
        None => state.hardware_config.clone(),
    };

    let project = ctx.pipeline.generate(
        &servos,
        &hardware,
        &state.advanced_features,
        pattern.as_ref(),
    )?;

    if print {
        for (name, text) in &project.files {
            println!("# ==== {} ====", name);
            print!("{}", text);
        }
        return Ok(());
    }

    fs::create_dir_all(output)?;
    for (name, text) in &project.files {
        fs::write(output.join(name), text)?;
    }
    info!(
        "Wrote {} files to {} ({})",
        project.files.len(),
        output.display(),
        project.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

async fn simulate(
    ctx: &Context,
    source: &PatternSource,
    servo_source: &ServoSource,
    live: bool,
    limit: Option<usize>,
    json: bool,
) -> CliResult<()> {
    let pattern = ctx.require_pattern(source)?;
    let servos = ctx.servos(servo_source)?;
    let simulation = ctx.pipeline.simulate(&pattern, &servos)?;

    if live {
        // Validation above guarantees a first servo
        let limits = servos.first().map(|s| s.limits.clone()).unwrap_or_default();
        enable_raw_mode()?;
        let result = run_live(simulation, &limits, limit).await;
        disable_raw_mode()?;
        println!();
        return result;
    }

    let limit = match limit {
        Some(n) => n,
        None if !simulation.is_finite() => {
            warn!(
                "'{}' repeats forever, showing the first {} updates",
                pattern.name, DEFAULT_ENDLESS_LIMIT
            );
            DEFAULT_ENDLESS_LIMIT
        }
        None => usize::MAX,
    };

    let mut elapsed_ms: u64 = 0;
    for update in simulation.take(limit) {
        elapsed_ms = elapsed_ms.saturating_add(update.pause_ms);
        if json {
            println!("{}", serde_json::to_string(&update)?);
        } else {
            println!("{:>8} ms  {}", elapsed_ms, describe(&update));
        }
        elapsed_ms = elapsed_ms.saturating_add(update.delay_ms);
    }
    Ok(())
}

async fn run_live(mut simulation: Simulation, limits: &ServoLimits, limit: Option<usize>) -> CliResult<()> {
    let mut stdout = io::stdout();
    let mut shown = 0usize;

    while limit.is_none_or(|n| shown < n) {
        let Some(update) = simulation.next() else {
            break;
        };
        shown += 1;

        queue!(
            stdout,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(gauge(update.angle, limits)),
            Print("  "),
            Print(describe(&update)),
        )?;
        stdout.flush()?;

        // Hold the position for pause + delay, watching for q / Esc
        let mut remaining = Duration::from_millis(update.pause_ms.saturating_add(update.delay_ms));
        while !remaining.is_zero() {
            if event::poll(Duration::ZERO)? {
                if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                    let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                    if pressed && matches!(code, KeyCode::Char('q') | KeyCode::Esc) {
                        return Ok(());
                    }
                }
            }
            let step = remaining.min(KEY_POLL);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }
    Ok(())
}

fn gauge(angle: f64, limits: &ServoLimits) -> String {
    let span = limits.max_angle - limits.min_angle;
    let ratio = if span > 0.0 {
        ((angle - limits.min_angle) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * GAUGE_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(GAUGE_WIDTH - filled))
}

fn describe(update: &ServoStateUpdate) -> String {
    let mut text = format!(
        "ch{} {:>6.1}° rep {} pt {}",
        update.channel, update.angle, update.repetition, update.point_index
    );
    if let Some(seq) = &update.sequence {
        text.push_str(&format!(" [{}]", seq));
    }
    text
}

fn patterns(ctx: &Context, action: PatternsCommand) -> CliResult<()> {
    match action {
        PatternsCommand::List => {
            let saved = ctx.library.list();
            println!("Saved ({}):", saved.len());
            for p in &saved {
                println!("  {:<28} {:>3} points {:>7} ms", p.name, p.point_count(), p.duration_ms());
            }
            println!("Presets:");
            for (key, p) in presets::all() {
                println!("  {:<28} {}", key, p.name);
            }
        }
        PatternsCommand::Show { name } => {
            let pattern = ctx
                .library
                .get(&name)
                .or_else(|| presets::preset(&name))
                .ok_or_else(|| format!("no pattern named '{}'", name))?;
            println!("{}", serde_json::to_string_pretty(&pattern)?);
        }
        PatternsCommand::Save { file } => {
            let pattern: MovementPattern = read_json(&file)?;
            let name = pattern.name.clone();
            if !ctx.library.save(pattern) {
                return Err(format!("failed to save '{}'", name).into());
            }
            info!("Saved '{}'", name);
        }
        PatternsCommand::Delete { name } => {
            if !ctx.library.delete(&name) {
                return Err(format!("failed to delete '{}'", name).into());
            }
            info!("Deleted '{}'", name);
        }
        PatternsCommand::Import { file } => {
            let text = fs::read_to_string(&file)?;
            if !ctx.library.import_from(&text) {
                return Err(format!("failed to import {}", file.display()).into());
            }
        }
        PatternsCommand::Export { file } => {
            let text = ctx.library.export_to().ok_or("failed to export patterns")?;
            let path = file.unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now())));
            fs::write(&path, text)?;
            info!("Exported patterns to {}", path.display());
        }
    }
    Ok(())
}

fn state(ctx: &Context, action: StateCommand) -> CliResult<()> {
    match action {
        StateCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&ctx.state.get_state())?);
        }
        StateCommand::Import { file } => {
            let imported: AppState = read_json(&file)?;
            ctx.state.set_state(StatePatch::from(imported))?;
            info!("Imported state from {}", file.display());
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "servo-forge",
            "--data-dir",
            "/tmp/x",
            "transform",
            "--preset",
            "wave",
            "--precision",
            "9",
            "--repeat",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        let Command::Transform { pattern, tuning, .. } = cli.command else {
            panic!("expected transform");
        };
        assert_eq!(pattern.preset.as_deref(), Some("wave"));
        let config = tuning.apply(None);
        assert_eq!(config.precision, 9);
        assert_eq!(config.repeat_count, RepeatCount::Infinite);
        assert_eq!(config.base_speed, 1.0);
    }

    #[test]
    fn test_pattern_sources_conflict() {
        let result = Cli::try_parse_from([
            "servo-forge",
            "validate",
            "--preset",
            "wave",
            "--saved",
            "mine",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_gauge() {
        let limits = ServoLimits::default();
        assert_eq!(gauge(0.0, &limits), format!("[{}]", ".".repeat(GAUGE_WIDTH)));
        assert_eq!(gauge(180.0, &limits), format!("[{}]", "#".repeat(GAUGE_WIDTH)));
        assert_eq!(gauge(90.0, &limits).matches('#').count(), GAUGE_WIDTH / 2);
    }

    #[test]
    fn test_context_resolves_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::open(dir.path()).unwrap();
        assert!(ctx.pattern(&PatternSource::default()).unwrap().is_none());

        let source = PatternSource {
            preset: Some("sweep".to_string()),
            ..PatternSource::default()
        };
        assert_eq!(ctx.require_pattern(&source).unwrap().name, "Sweep");

        let missing = PatternSource {
            saved: Some("nope".to_string()),
            ..PatternSource::default()
        };
        assert!(ctx.pattern(&missing).is_err());
    }

    #[tokio::test]
    async fn test_state_import_then_generate() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        fs::write(
            &state_file,
            r#"{"servos": [{"channel": 0, "name": "base"}], "jetsonConfig": {"controlMethod": "gpio"}}"#,
        )
        .unwrap();
        let data_dir = dir.path().join("data");
        let out = dir.path().join("out");

        let cli = Cli::try_parse_from([
            "servo-forge",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "state",
            "import",
            state_file.to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await.unwrap();

        let cli = Cli::try_parse_from([
            "servo-forge",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "generate",
            "--preset",
            "home",
            "--output",
            out.to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await.unwrap();

        let controller = fs::read_to_string(out.join("servo_controller.py")).unwrap();
        assert!(controller.contains("import RPi.GPIO as GPIO"));
        assert!(out.join("patterns.py").exists());
    }
}
