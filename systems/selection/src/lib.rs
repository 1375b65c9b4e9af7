#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Weighted category and type selection for spawn slots.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use square_field_core::{
    HostileEnemyEntry, HostileTypeId, SquareType, SquareTypeId, UniqueSquareType,
    UniqueSquareTypeId,
};

/// Per-entry spawn gate tracking cooldown and unlock time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostileSpawnGate {
    cooldown_until: Duration,
    minimum_world_time: Duration,
    disabled: bool,
}

impl HostileSpawnGate {
    /// Creates an open gate for `entry`; entries without a template start disabled.
    #[must_use]
    pub fn new(entry: &HostileEnemyEntry) -> Self {
        Self {
            cooldown_until: Duration::ZERO,
            minimum_world_time: entry.minimum_world_time,
            disabled: entry.template.is_none(),
        }
    }

    /// Reports whether the entry may spawn at world time `now`.
    #[must_use]
    pub fn is_eligible(&self, now: Duration) -> bool {
        !self.disabled && now >= self.minimum_world_time && now >= self.cooldown_until
    }

    /// Closes the gate until `now + cooldown`.
    pub fn start_cooldown(&mut self, now: Duration, cooldown: Duration) {
        self.cooldown_until = now.saturating_add(cooldown);
    }

    /// World time at which the current cooldown ends.
    #[must_use]
    pub const fn cooldown_until(&self) -> Duration {
        self.cooldown_until
    }

    /// Reports whether the entry is skipped for the session.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// Square type chosen for a slot that fell through to squares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquareChoice {
    /// Normal square of the referenced type.
    Normal(SquareTypeId),
    /// Unique square of the referenced type.
    Unique(UniqueSquareTypeId),
}

/// Square tables along with which entries may be chosen.
#[derive(Clone, Copy, Debug)]
pub struct SquareCandidates<'a> {
    /// Normal square types.
    pub squares: &'a [SquareType],
    /// Whether normal squares can spawn at all.
    pub squares_enabled: bool,
    /// Unique square types.
    pub unique_squares: &'a [UniqueSquareType],
    /// Per-entry flags marking the unique types that can spawn.
    pub unique_enabled: &'a [bool],
}

/// Seeded selector that resolves chance rolls and weighted picks.
#[derive(Debug)]
pub struct Selection {
    rng: ChaCha8Rng,
}

impl Selection {
    /// Creates a selector drawing from a stream seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns `true` with probability `chance`.
    pub fn roll(&mut self, chance: f32) -> bool {
        self.rng.gen::<f32>() < chance
    }

    /// Picks a hostile entry by weight among the entries whose gate is open.
    ///
    /// Returns `None` when no eligible entry carries positive weight.
    pub fn choose_hostile(
        &mut self,
        entries: &[HostileEnemyEntry],
        gates: &[HostileSpawnGate],
        now: Duration,
    ) -> Option<HostileTypeId> {
        let draw = self.rng.gen::<f32>();
        pick_weighted(
            entries,
            |index, _| gates.get(index).is_some_and(|gate| gate.is_eligible(now)),
            |entry| entry.weight,
            draw,
        )
        .map(|index| HostileTypeId::new(index as u32))
    }

    /// Decides between unique and normal squares, then picks the type by weight.
    pub fn choose_square(&mut self, candidates: SquareCandidates<'_>) -> Option<SquareChoice> {
        let enabled = candidates.unique_enabled;
        let unique_eligible =
            move |index: usize, _: &UniqueSquareType| enabled.get(index) == Some(&true);
        let unique_total: f32 = candidates
            .unique_squares
            .iter()
            .enumerate()
            .filter(|&(index, unique)| unique_eligible(index, unique))
            .map(|(_, unique)| unique.weight.max(0.0))
            .sum();
        let normal_total: f32 = if candidates.squares_enabled {
            candidates
                .squares
                .iter()
                .map(|square| square.weight.max(0.0))
                .sum()
        } else {
            0.0
        };

        let combined = unique_total + normal_total;
        let unique_ratio = if combined > 0.0 {
            unique_total / combined
        } else {
            0.0
        };

        let category_draw = self.rng.gen::<f32>();
        let type_draw = self.rng.gen::<f32>();
        if unique_total > 0.0 && category_draw < unique_ratio {
            return pick_weighted(
                candidates.unique_squares,
                unique_eligible,
                |unique| unique.weight,
                type_draw,
            )
            .map(|index| SquareChoice::Unique(UniqueSquareTypeId::new(index as u32)));
        }

        if !candidates.squares_enabled {
            return None;
        }
        pick_weighted(
            candidates.squares,
            |_, _| true,
            |square| square.weight,
            type_draw,
        )
        .map(|index| SquareChoice::Normal(SquareTypeId::new(index as u32)))
    }
}

/// Cumulative-weight scan over the eligible items of `items`.
///
/// Scales `draw` in `[0, 1)` by the eligible total and returns the first item
/// whose running total reaches it. Rounding can leave the draw above the last
/// running total, in which case the last eligible item is returned. Items with
/// non-positive weight are never chosen.
pub fn pick_weighted<T>(
    items: &[T],
    eligible: impl Fn(usize, &T) -> bool,
    weight: impl Fn(&T) -> f32,
    draw: f32,
) -> Option<usize> {
    let mut total = 0.0;
    for (index, item) in items.iter().enumerate() {
        let value = weight(item);
        if value > 0.0 && eligible(index, item) {
            total += value;
        }
    }
    if total <= 0.0 {
        return None;
    }

    let scaled = draw * total;
    let mut cumulative = 0.0;
    let mut last = None;
    for (index, item) in items.iter().enumerate() {
        let value = weight(item);
        if value <= 0.0 || !eligible(index, item) {
            continue;
        }
        cumulative += value;
        if scaled <= cumulative {
            return Some(index);
        }
        last = Some(index);
    }
    last
}
