#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-driven ramp that shifts spawn odds from safe zones towards hostiles.

use std::time::Duration;

use square_field_core::{DifficultySnapshot, Event};

/// Tuning knobs for the difficulty ramp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultyTuning {
    /// Safe-zone chance at session start.
    pub initial_safe_zone_chance: f32,
    /// Hostile chance at session start.
    pub initial_hostile_chance: f32,
    /// Lowest value the safe-zone chance decays to.
    pub minimum_safe_zone_chance: f32,
    /// Highest value the hostile chance grows to.
    pub maximum_hostile_chance: f32,
    /// Safe-zone chance lost per second.
    pub safe_zone_decay_rate: f32,
    /// Hostile chance gained per second.
    pub hostile_growth_rate: f32,
}

impl Default for DifficultyTuning {
    fn default() -> Self {
        Self {
            initial_safe_zone_chance: 0.02,
            initial_hostile_chance: 0.024,
            minimum_safe_zone_chance: 0.005,
            maximum_hostile_chance: 0.5,
            safe_zone_decay_rate: 0.001,
            hostile_growth_rate: 0.001,
        }
    }
}

/// Monotone ramp over the two spawn probabilities.
#[derive(Clone, Debug)]
pub struct DifficultyRamp {
    tuning: DifficultyTuning,
    safe_zone_chance: f32,
    hostile_chance: f32,
}

impl DifficultyRamp {
    /// Creates a ramp starting from the tuning's initial values.
    ///
    /// Initial values are clamped into their ranges and negative rates behave
    /// as zero, so the chances never move the wrong way.
    #[must_use]
    pub fn new(tuning: DifficultyTuning) -> Self {
        let tuning = DifficultyTuning {
            safe_zone_decay_rate: tuning.safe_zone_decay_rate.max(0.0),
            hostile_growth_rate: tuning.hostile_growth_rate.max(0.0),
            ..tuning
        };
        let mut ramp = Self {
            tuning,
            safe_zone_chance: 0.0,
            hostile_chance: 0.0,
        };
        ramp.reset();
        ramp
    }

    /// Restores the initial values.
    pub fn reset(&mut self) {
        self.safe_zone_chance = self
            .tuning
            .initial_safe_zone_chance
            .max(self.tuning.minimum_safe_zone_chance);
        self.hostile_chance = self
            .tuning
            .initial_hostile_chance
            .min(self.tuning.maximum_hostile_chance);
    }

    /// Advances the ramp by every `TimeAdvanced` event in the batch.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                self.advance(*dt);
            }
        }
    }

    /// Advances the ramp by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        let seconds = dt.as_secs_f32();
        self.safe_zone_chance = (self.safe_zone_chance
            - self.tuning.safe_zone_decay_rate * seconds)
            .max(self.tuning.minimum_safe_zone_chance);
        self.hostile_chance = (self.hostile_chance + self.tuning.hostile_growth_rate * seconds)
            .min(self.tuning.maximum_hostile_chance);
    }

    /// Current spawn probabilities.
    #[must_use]
    pub const fn snapshot(&self) -> DifficultySnapshot {
        DifficultySnapshot {
            safe_zone_chance: self.safe_zone_chance,
            hostile_chance: self.hostile_chance,
        }
    }
}
