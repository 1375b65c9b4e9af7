//! Aggregated tuning for a session and the checks applied to it.

use square_field_core::TableError;
use square_field_system_despawn::Config as DespawnConfig;
use square_field_system_difficulty::DifficultyTuning;
use square_field_system_placement::PlacementTuning;
use square_field_system_spawning::Config as SpawningConfig;
use thiserror::Error;

/// Idle instances created for each pool when a session starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrewarmTuning {
    /// Idle normal squares.
    pub normal_squares: u32,
    /// Idle instances per hostile template.
    pub per_hostile_template: u32,
}

impl Default for PrewarmTuning {
    fn default() -> Self {
        Self {
            normal_squares: 20,
            per_hostile_template: 5,
        }
    }
}

/// Every tunable a session consumes, grouped per system.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionTuning {
    /// Spawn scheduler cadence and annulus.
    pub spawning: SpawningConfig,
    /// Placement validator rules.
    pub placement: PlacementTuning,
    /// Difficulty ramp shape.
    pub difficulty: DifficultyTuning,
    /// Periodic despawn sweep.
    pub despawn: DespawnConfig,
    /// Pool prewarm sizes.
    pub prewarm: PrewarmTuning,
}

impl SessionTuning {
    /// Default tuning with the radii of `profile` applied.
    #[must_use]
    pub fn for_profile(profile: RadiusProfile) -> Self {
        let mut tuning = Self::default();
        profile.apply(&mut tuning);
        tuning
    }

    /// Rejects tunings the systems cannot run with.
    pub fn validate(&self) -> Result<(), TuningError> {
        let radii = [
            ("no_spawn_radius", self.spawning.no_spawn_radius),
            ("spawn_radius", self.spawning.spawn_radius),
            ("despawn_radius", self.despawn.despawn_radius),
            ("overlap_check_radius", self.placement.overlap_check_radius),
        ];
        for (name, value) in radii {
            if value.is_nan() || value <= 0.0 {
                return Err(TuningError::NonPositiveRadius { name, value });
            }
            if value.is_infinite() {
                return Err(TuningError::UnboundedRadius { name });
            }
        }

        if self.spawning.no_spawn_radius > self.spawning.spawn_radius {
            return Err(TuningError::InvertedAnnulus {
                min: self.spawning.no_spawn_radius,
                max: self.spawning.spawn_radius,
            });
        }
        if self.spawning.slots_per_cycle == 0 {
            return Err(TuningError::ZeroSlots);
        }
        if self.placement.max_position_tries == 0 {
            return Err(TuningError::ZeroPlacementBudget);
        }
        if self.placement.safe_zone_exclusion_margin < 0.0 {
            return Err(TuningError::NegativeMargin {
                margin: self.placement.safe_zone_exclusion_margin,
            });
        }
        Ok(())
    }
}

/// Platform-specific radius presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RadiusProfile {
    /// Default radii.
    #[default]
    Desktop,
    /// Wider radii for small screens viewed up close.
    Handheld,
}

impl RadiusProfile {
    /// Overwrites the radii in `tuning` with the profile's values.
    pub fn apply(self, tuning: &mut SessionTuning) {
        if self == Self::Handheld {
            tuning.spawning.spawn_radius = 25.0;
            tuning.spawning.no_spawn_radius = 20.0;
            tuning.despawn.despawn_radius = 25.0;
        }
    }
}

/// Tuning or table problems that prevent a session from starting.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TuningError {
    /// A radius is zero, negative or not a number.
    #[error("{name} must be positive, got {value}")]
    NonPositiveRadius {
        /// Name of the offending tunable.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// A radius is infinite.
    #[error("{name} must be finite")]
    UnboundedRadius {
        /// Name of the offending tunable.
        name: &'static str,
    },
    /// The inner spawn radius exceeds the outer one.
    #[error("no-spawn radius {min} exceeds spawn radius {max}")]
    InvertedAnnulus {
        /// Inner radius.
        min: f32,
        /// Outer radius.
        max: f32,
    },
    /// The scheduler would never attempt a slot.
    #[error("slots per cycle must be at least one")]
    ZeroSlots,
    /// The placement validator would never generate a candidate.
    #[error("max position tries must be at least one")]
    ZeroPlacementBudget,
    /// The safe-zone exclusion margin is negative.
    #[error("safe-zone exclusion margin {margin} is negative")]
    NegativeMargin {
        /// Offending margin.
        margin: f32,
    },
    /// The spawn tables are malformed.
    #[error(transparent)]
    Table(#[from] TableError),
}
