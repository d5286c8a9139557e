// Movement pattern types
//
// A pattern is either a flat list of points or a composite of named sequences.
// The JSON form keeps the loose shape saved patterns use
// ({name, points?, sequences?, type, loop?, config?}) and is converted
// into the tagged `Motion` on load.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{
    DEFAULT_BASE_SPEED, DEFAULT_FORCE_LEVEL, DEFAULT_PAUSE_DURATION_MS, DEFAULT_PRECISION,
};
use crate::error::ConfigurationError;

/// Leaf unit of motion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementPoint {
    pub angle: f64, // deg
    #[serde(deserialize_with = "millis")]
    pub delay: u64, // ms until the next point
}

impl MovementPoint {
    pub fn new(angle: f64, delay: u64) -> Self {
        Self { angle, delay }
    }
}

/// Millisecond field from any JSON number, rounded to the nearest ms
///
/// Number inputs in the editors produce fractional values like `150.5`.
pub(crate) fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let ms = f64::deserialize(deserializer)?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(D::Error::custom(format!("invalid duration {} ms", ms)));
    }
    Ok(ms.round() as u64)
}

pub(crate) fn opt_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Millis(#[serde(deserialize_with = "millis")] u64);

    Ok(Option::<Millis>::deserialize(deserializer)?.map(|Millis(ms)| ms))
}

/// Interpolation style of a flat pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointStyle {
    #[default]
    Smooth,
    Stepped,
    Linear,
}

/// Interpolation style of one sequence inside a composite pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStyle {
    #[default]
    Smooth,
    Stepped,
}

/// Named sub-phase of a composite pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    #[serde(default)]
    pub points: Vec<MovementPoint>,
    #[serde(rename = "type", default)]
    pub style: SequenceStyle,
}

impl Sequence {
    pub fn new(name: impl Into<String>, style: SequenceStyle, points: Vec<MovementPoint>) -> Self {
        Self {
            name: name.into(),
            points,
            style,
        }
    }
}

/// How many times a pattern body runs
///
/// On the wire `Infinite` is `null`, which is what the web tool writes
/// for `repeatCount: Infinity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum RepeatCount {
    Times(u32),
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        RepeatCount::Times(1)
    }
}

impl From<Option<u32>> for RepeatCount {
    fn from(value: Option<u32>) -> Self {
        match value {
            Some(n) => RepeatCount::Times(n),
            None => RepeatCount::Infinite,
        }
    }
}

impl From<RepeatCount> for Option<u32> {
    fn from(value: RepeatCount) -> Self {
        match value {
            RepeatCount::Times(n) => Some(n),
            RepeatCount::Infinite => None,
        }
    }
}

/// Per-pattern tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    pub base_speed: f64, // multiplier
    pub precision: u8,   // 1 (coarse, slow) ..= 10 (fine, fast)
    pub force_level: u8, // 1..=10, advisory only
    pub repeat_count: RepeatCount,
    #[serde(deserialize_with = "millis")]
    pub pause_duration: u64, // ms between repetitions
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            base_speed: DEFAULT_BASE_SPEED,
            precision: DEFAULT_PRECISION,
            force_level: DEFAULT_FORCE_LEVEL,
            repeat_count: RepeatCount::default(),
            pause_duration: DEFAULT_PAUSE_DURATION_MS,
        }
    }
}

impl PatternConfig {
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if !self.base_speed.is_finite() || self.base_speed <= 0.0 {
            return Err(ConfigurationError::InvalidBaseSpeed(self.base_speed));
        }
        if !(1..=10).contains(&self.precision) {
            return Err(ConfigurationError::PrecisionOutOfRange(self.precision));
        }
        if !(1..=10).contains(&self.force_level) {
            return Err(ConfigurationError::ForceLevelOutOfRange(self.force_level));
        }
        if self.repeat_count == RepeatCount::Times(0) {
            return Err(ConfigurationError::ZeroRepeatCount);
        }
        Ok(())
    }
}

/// Authoritative motion source of a pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    Flat {
        style: PointStyle,
        points: Vec<MovementPoint>,
    },
    Composite {
        sequences: Vec<Sequence>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PatternWire", into = "PatternWire")]
pub struct MovementPattern {
    pub name: String,
    pub motion: Motion,
    pub looping: bool,
    pub config: Option<PatternConfig>,
}

impl MovementPattern {
    pub fn flat(name: impl Into<String>, style: PointStyle, points: Vec<MovementPoint>) -> Self {
        Self {
            name: name.into(),
            motion: Motion::Flat { style, points },
            looping: false,
            config: None,
        }
    }

    pub fn composite(name: impl Into<String>, sequences: Vec<Sequence>) -> Self {
        Self {
            name: name.into(),
            motion: Motion::Composite { sequences },
            looping: false,
            config: None,
        }
    }

    pub fn with_config(mut self, config: PatternConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.motion, Motion::Composite { .. })
    }

    /// Every point with the name of the sequence it came from (composite only)
    pub fn points_with_origin(&self) -> Vec<(Option<&str>, &MovementPoint)> {
        match &self.motion {
            Motion::Flat { points, .. } => points.iter().map(|p| (None, p)).collect(),
            Motion::Composite { sequences } => sequences
                .iter()
                .flat_map(|s| s.points.iter().map(move |p| (Some(s.name.as_str()), p)))
                .collect(),
        }
    }

    /// Flat point list, sequences concatenated in declaration order
    pub fn flatten(&self) -> Vec<MovementPoint> {
        match &self.motion {
            Motion::Flat { points, .. } => points.clone(),
            Motion::Composite { sequences } => sequences
                .iter()
                .flat_map(|s| s.points.iter().copied())
                .collect(),
        }
    }

    pub fn point_count(&self) -> usize {
        match &self.motion {
            Motion::Flat { points, .. } => points.len(),
            Motion::Composite { sequences } => sequences.iter().map(|s| s.points.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Duration of one pass over the points (ms), pauses excluded
    pub fn duration_ms(&self) -> u64 {
        self.points_with_origin().iter().map(|(_, p)| p.delay).sum()
    }

    pub fn repeat_count(&self) -> RepeatCount {
        if self.looping {
            return RepeatCount::Infinite;
        }
        self.config
            .as_ref()
            .map(|c| c.repeat_count)
            .unwrap_or_default()
    }

    pub fn pause_duration(&self) -> u64 {
        self.config.as_ref().map(|c| c.pause_duration).unwrap_or(0)
    }
}

// Wire form

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PatternType {
    #[default]
    Smooth,
    Stepped,
    Composite,
    Linear,
}

#[derive(Serialize, Deserialize)]
struct PatternWire {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Vec<MovementPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequences: Option<Vec<Sequence>>,
    #[serde(rename = "type", default)]
    kind: PatternType,
    #[serde(rename = "loop", default, skip_serializing_if = "std::ops::Not::not")]
    looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<PatternConfig>,
}

impl From<PatternWire> for MovementPattern {
    fn from(wire: PatternWire) -> Self {
        // Sequences win whenever present; neither present is an empty flat pattern
        let motion = match wire.sequences {
            Some(sequences) => Motion::Composite { sequences },
            None => Motion::Flat {
                style: match wire.kind {
                    PatternType::Stepped => PointStyle::Stepped,
                    PatternType::Linear => PointStyle::Linear,
                    PatternType::Smooth | PatternType::Composite => PointStyle::Smooth,
                },
                points: wire.points.unwrap_or_default(),
            },
        };
        Self {
            name: wire.name,
            motion,
            looping: wire.looping,
            config: wire.config,
        }
    }
}

impl From<MovementPattern> for PatternWire {
    fn from(pattern: MovementPattern) -> Self {
        let (points, sequences, kind) = match pattern.motion {
            Motion::Flat { style, points } => {
                let kind = match style {
                    PointStyle::Smooth => PatternType::Smooth,
                    PointStyle::Stepped => PatternType::Stepped,
                    PointStyle::Linear => PatternType::Linear,
                };
                (Some(points), None, kind)
            }
            Motion::Composite { sequences } => (None, Some(sequences), PatternType::Composite),
        };
        Self {
            name: pattern.name,
            points,
            sequences,
            kind,
            looping: pattern.looping,
            config: pattern.config,
        }
    }
}
