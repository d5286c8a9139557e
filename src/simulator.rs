// Timed execution simulation
//
// A validated pattern becomes a lazy cursor over its points. Iterating gives
// the timeline without waiting; `next_update` paces it in real (tokio) time.
// Nothing is shared, dropping the simulation cancels it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::pattern::{validate_pattern, MovementPattern, MovementPoint, RepeatCount};
use crate::servo::ServoConfiguration;

/// Commanded position for one point of the pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServoStateUpdate {
    pub channel: u8,
    pub angle: f64,
    pub delay_ms: u64,
    /// Pause preceding this point, non-zero only on the first point of a later repetition
    pub pause_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    pub point_index: usize,
    pub repetition: u64,
}

pub struct Simulator;

impl Simulator {
    /// Validate against the first servo and start a simulation on its channel
    pub fn start(
        pattern: &MovementPattern,
        servos: &[ServoConfiguration],
    ) -> Result<Simulation, ValidationError> {
        validate_pattern(pattern, servos)?;
        // validate_pattern rejects an empty servo list
        let channel = servos.first().map(|s| s.channel).ok_or(ValidationError::NoServos)?;

        let points = pattern
            .points_with_origin()
            .into_iter()
            .map(|(sequence, point)| (sequence.map(str::to_string), *point))
            .collect::<Vec<_>>();

        info!(
            "Simulating '{}' on channel {}: {} points, {:?}",
            pattern.name,
            channel,
            points.len(),
            pattern.repeat_count()
        );

        Ok(Simulation {
            channel,
            points,
            repeat: pattern.repeat_count(),
            pause_ms: pattern.pause_duration(),
            cursor: 0,
            repetition: 0,
            done: false,
        })
    }
}

pub struct Simulation {
    channel: u8,
    points: Vec<(Option<String>, MovementPoint)>,
    repeat: RepeatCount,
    pause_ms: u64,
    cursor: usize,
    repetition: u64,
    done: bool,
}

impl Simulation {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Whether the simulation ends on its own
    pub fn is_finite(&self) -> bool {
        self.points.is_empty() || self.repeat != RepeatCount::Infinite
    }

    /// Number of updates left, `None` when endless
    pub fn remaining(&self) -> Option<u64> {
        if self.done || self.points.is_empty() {
            return Some(0);
        }
        match self.repeat {
            RepeatCount::Infinite => None,
            RepeatCount::Times(n) => {
                let total = u64::from(n) * self.points.len() as u64;
                let emitted = self.repetition * self.points.len() as u64 + self.cursor as u64;
                Some(total.saturating_sub(emitted))
            }
        }
    }

    /// Wait out the pause and point delay, then yield the update
    pub async fn next_update(&mut self) -> Option<ServoStateUpdate> {
        let update = self.next()?;
        let wait = update.pause_ms.saturating_add(update.delay_ms);
        tokio::time::sleep(Duration::from_millis(wait)).await;
        Some(update)
    }
}

impl Iterator for Simulation {
    type Item = ServoStateUpdate;

    fn next(&mut self) -> Option<ServoStateUpdate> {
        if self.done || self.points.is_empty() {
            return None;
        }

        if self.cursor == self.points.len() {
            self.cursor = 0;
            self.repetition = self.repetition.saturating_add(1);
        }
        if let RepeatCount::Times(n) = self.repeat {
            if self.repetition >= u64::from(n) {
                debug!("Simulation finished after {} repetitions", n);
                self.done = true;
                return None;
            }
        }

        let (sequence, point) = &self.points[self.cursor];
        let pause_ms = if self.cursor == 0 && self.repetition > 0 {
            self.pause_ms
        } else {
            0
        };
        let update = ServoStateUpdate {
            channel: self.channel,
            angle: point.angle,
            delay_ms: point.delay,
            pause_ms,
            sequence: sequence.clone(),
            point_index: self.cursor,
            repetition: self.repetition,
        };
        self.cursor += 1;
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternConfig, PointStyle, Sequence, SequenceStyle};

    fn servos() -> Vec<ServoConfiguration> {
        vec![ServoConfiguration::new(4, "gripper")]
    }

    fn sweep(repeat: RepeatCount, pause: u64) -> MovementPattern {
        MovementPattern::flat(
            "sweep",
            PointStyle::Smooth,
            vec![
                MovementPoint::new(0.0, 100),
                MovementPoint::new(90.0, 200),
                MovementPoint::new(180.0, 300),
            ],
        )
        .with_config(PatternConfig {
            repeat_count: repeat,
            pause_duration: pause,
            ..PatternConfig::default()
        })
    }

    #[test]
    fn test_one_update_per_point() {
        let updates: Vec<_> = Simulator::start(&sweep(RepeatCount::Times(1), 500), &servos())
            .unwrap()
            .collect();
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.channel == 4 && u.pause_ms == 0));
        let angles: Vec<_> = updates.iter().map(|u| u.angle).collect();
        assert_eq!(angles, vec![0.0, 90.0, 180.0]);
        let delays: Vec<_> = updates.iter().map(|u| u.delay_ms).collect();
        assert_eq!(delays, vec![100, 200, 300]);
    }

    #[test]
    fn test_invalid_pattern_emits_nothing() {
        let pattern = MovementPattern::flat(
            "bad",
            PointStyle::Smooth,
            vec![MovementPoint::new(10.0, 100), MovementPoint::new(200.0, 100)],
        );
        assert!(matches!(
            Simulator::start(&pattern, &servos()),
            Err(ValidationError::OutOfLimits { index: 1, .. })
        ));
        assert_eq!(
            Simulator::start(&pattern, &[]).err(),
            Some(ValidationError::NoServos)
        );
    }

    #[test]
    fn test_repetitions_carry_pause() {
        let mut sim = Simulator::start(&sweep(RepeatCount::Times(2), 500), &servos()).unwrap();
        assert_eq!(sim.remaining(), Some(6));
        let updates: Vec<_> = sim.by_ref().collect();
        assert_eq!(updates.len(), 6);
        assert_eq!(updates[3].pause_ms, 500);
        assert_eq!(updates[3].repetition, 1);
        assert_eq!(updates[3].point_index, 0);
        assert_eq!(updates.iter().filter(|u| u.pause_ms != 0).count(), 1);
        assert_eq!(sim.remaining(), Some(0));
        assert!(sim.next().is_none());
    }

    #[test]
    fn test_infinite_never_terminates() {
        let sim = Simulator::start(&sweep(RepeatCount::Infinite, 0), &servos()).unwrap();
        assert!(!sim.is_finite());
        assert_eq!(sim.remaining(), None);
        let updates: Vec<_> = sim.take(30).collect();
        assert_eq!(updates.len(), 30);
        assert_eq!(updates[29].repetition, 9);

        let looping = sweep(RepeatCount::Times(1), 0).looping(true);
        assert_eq!(Simulator::start(&looping, &servos()).unwrap().take(10).count(), 10);
    }

    #[test]
    fn test_empty_pattern_terminates() {
        let pattern = MovementPattern::flat("empty", PointStyle::Smooth, vec![]).looping(true);
        let mut sim = Simulator::start(&pattern, &servos()).unwrap();
        assert!(sim.is_finite());
        assert!(sim.next().is_none());
    }

    #[test]
    fn test_composite_updates_name_sequence() {
        let pattern = MovementPattern::composite(
            "pick",
            vec![
                Sequence::new("reach", SequenceStyle::Smooth, vec![MovementPoint::new(30.0, 10)]),
                Sequence::new("grip", SequenceStyle::Stepped, vec![MovementPoint::new(60.0, 10)]),
            ],
        );
        let sequences: Vec<_> = Simulator::start(&pattern, &servos())
            .unwrap()
            .map(|u| u.sequence)
            .collect();
        assert_eq!(
            sequences,
            vec![Some("reach".to_string()), Some("grip".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_update_waits_delay_and_pause() {
        let mut sim = Simulator::start(&sweep(RepeatCount::Times(2), 500), &servos()).unwrap();
        let start = tokio::time::Instant::now();

        for _ in 0..3 {
            sim.next_update().await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::from_millis(600));

        let first_of_second = sim.next_update().await.unwrap();
        assert_eq!(first_of_second.pause_ms, 500);
        assert_eq!(start.elapsed(), Duration::from_millis(1200));
    }
}
