#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Distance-based despawn sweeps and safe-zone interior purging.

use std::time::Duration;

use square_field_core::{
    ActiveEntityView, Command, DespawnCause, EntityHandle, Event, SafeZoneView, Vec2,
};

/// Configuration parameters required to construct the despawn sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Time between two periodic sweeps.
    pub interval: Duration,
    /// Distance from the player beyond which entities are despawned.
    pub despawn_radius: f32,
}

impl Config {
    /// Creates a configuration with the provided cadence and radius.
    #[must_use]
    pub const fn new(interval: Duration, despawn_radius: f32) -> Self {
        Self {
            interval,
            despawn_radius,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 22.0)
    }
}

/// Periodic sweep that despawns entities that drifted out of range.
#[derive(Debug)]
pub struct DespawnSweep {
    config: Config,
    accumulator: Duration,
}

impl DespawnSweep {
    /// Creates a sweep using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            accumulator: Duration::ZERO,
        }
    }

    /// Radius beyond which entities are despawned.
    #[must_use]
    pub const fn despawn_radius(&self) -> f32 {
        self.config.despawn_radius
    }

    /// Consumes events and the registry view to emit despawn commands.
    ///
    /// The interval timer is frozen while `despawn_enabled` is `false`.
    pub fn handle(
        &mut self,
        events: &[Event],
        despawn_enabled: bool,
        player: Vec2,
        entities: ActiveEntityView<'_>,
        out: &mut Vec<Command>,
    ) {
        if !despawn_enabled {
            return;
        }

        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                self.accumulator = self.accumulator.saturating_add(*dt);
            }
        }

        if self.accumulator < self.config.interval {
            return;
        }
        self.accumulator = Duration::ZERO;

        let radius = self.config.despawn_radius;
        for entity in entities.iter().rev() {
            if entity.position.distance(player) > radius {
                out.push(Command::Despawn {
                    handle: entity.handle,
                    cause: DespawnCause::OutOfRange,
                });
            }
        }
    }
}

/// Progress reported by [`GradualSweep::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepProgress {
    /// Candidates remain for later ticks.
    Pending {
        /// Snapshot entries not yet visited.
        remaining: usize,
    },
    /// Every candidate was visited.
    Complete,
}

/// Budgeted sweep over a registry snapshot, spread across ticks.
#[derive(Clone, Debug)]
pub struct GradualSweep {
    remaining: Vec<EntityHandle>,
    per_tick: usize,
}

impl GradualSweep {
    /// Snapshots the registry; each tick checks at most `per_tick` live entities.
    #[must_use]
    pub fn new(entities: ActiveEntityView<'_>, per_tick: usize) -> Self {
        Self {
            remaining: entities.iter().map(|entity| entity.handle).collect(),
            per_tick: per_tick.max(1),
        }
    }

    /// Snapshot entries not yet visited.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Visits the next batch in reverse registry order.
    ///
    /// Entries that already left the registry are skipped without counting
    /// against the budget.
    pub fn advance(
        &mut self,
        entities: ActiveEntityView<'_>,
        player: Vec2,
        despawn_radius: f32,
        out: &mut Vec<Command>,
    ) -> SweepProgress {
        let mut checked = 0;
        while checked < self.per_tick {
            let Some(handle) = self.remaining.pop() else {
                break;
            };
            let Some(entity) = entities.get(handle) else {
                continue;
            };
            checked += 1;
            if entity.position.distance(player) > despawn_radius {
                out.push(Command::Despawn {
                    handle,
                    cause: DespawnCause::OutOfRange,
                });
            }
        }

        if self.remaining.is_empty() {
            SweepProgress::Complete
        } else {
            SweepProgress::Pending {
                remaining: self.remaining.len(),
            }
        }
    }
}

/// Removes collectible squares that end up inside an active safe zone.
#[derive(Debug, Default)]
pub struct SafeZonePurge;

impl SafeZonePurge {
    /// Creates the purge system.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Emits a despawn for every square covered by a safe zone.
    pub fn handle(
        &mut self,
        entities: ActiveEntityView<'_>,
        safe_zones: SafeZoneView<'_>,
        out: &mut Vec<Command>,
    ) {
        if safe_zones.is_empty() {
            return;
        }

        for entity in entities.iter() {
            if entity.category().is_square() && safe_zones.covers(entity.position) {
                out.push(Command::Despawn {
                    handle: entity.handle,
                    cause: DespawnCause::InsideSafeZone,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use square_field_core::{ActiveEntity, SpawnKind, SquareTypeId, TemplateId};

    fn square(handle: u32, x: f32) -> ActiveEntity {
        ActiveEntity {
            handle: EntityHandle::new(handle),
            template: TemplateId::new(0),
            kind: SpawnKind::NormalSquare {
                square: SquareTypeId::new(0),
            },
            position: Vec2::new(x, 0.0),
        }
    }

    fn despawned(commands: &[Command]) -> Vec<u32> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::Despawn { handle, .. } => Some(handle.get()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sweep_visits_registry_in_reverse() {
        let entities = [square(0, 30.0), square(1, 5.0), square(2, 40.0)];
        let mut sweep = DespawnSweep::new(Config::default());
        let mut commands = Vec::new();
        sweep.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_millis(100),
            }],
            true,
            Vec2::ZERO,
            ActiveEntityView::new(&entities),
            &mut commands,
        );
        assert_eq!(despawned(&commands), vec![2, 0]);
    }

    #[test]
    fn boundary_distance_is_kept() {
        let entities = [square(0, 22.0)];
        let mut sweep = DespawnSweep::new(Config::default());
        let mut commands = Vec::new();
        sweep.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(1),
            }],
            true,
            Vec2::ZERO,
            ActiveEntityView::new(&entities),
            &mut commands,
        );
        assert!(commands.is_empty());
    }

    #[test]
    fn disabled_sweep_freezes_its_timer() {
        let entities = [square(0, 50.0)];
        let mut sweep = DespawnSweep::new(Config::default());
        let mut commands = Vec::new();
        let tick = [Event::TimeAdvanced {
            dt: Duration::from_millis(60),
        }];

        sweep.handle(&tick, false, Vec2::ZERO, ActiveEntityView::new(&entities), &mut commands);
        sweep.handle(&tick, true, Vec2::ZERO, ActiveEntityView::new(&entities), &mut commands);
        assert!(commands.is_empty(), "disabled ticks must not accumulate");

        sweep.handle(&tick, true, Vec2::ZERO, ActiveEntityView::new(&entities), &mut commands);
        assert_eq!(despawned(&commands), vec![0]);
    }

    #[test]
    fn gradual_sweep_respects_budget_and_skips_dead_entries() {
        let all = [
            square(0, 50.0),
            square(1, 1.0),
            square(2, 60.0),
            square(3, 70.0),
            square(4, 80.0),
        ];
        let mut sweep = GradualSweep::new(ActiveEntityView::new(&all), 2);
        let mut commands = Vec::new();

        let progress = sweep.advance(ActiveEntityView::new(&all), Vec2::ZERO, 22.0, &mut commands);
        assert_eq!(progress, SweepProgress::Pending { remaining: 3 });
        assert_eq!(despawned(&commands), vec![4, 3]);

        let survivors = [square(0, 50.0), square(1, 1.0)];
        commands.clear();
        let progress =
            sweep.advance(ActiveEntityView::new(&survivors), Vec2::ZERO, 22.0, &mut commands);
        assert_eq!(progress, SweepProgress::Complete);
        assert_eq!(despawned(&commands), vec![0]);
    }

    #[test]
    fn zero_budget_still_makes_progress() {
        let all = [square(0, 50.0)];
        let mut sweep = GradualSweep::new(ActiveEntityView::new(&all), 0);
        let mut commands = Vec::new();
        assert_eq!(
            sweep.advance(ActiveEntityView::new(&all), Vec2::ZERO, 22.0, &mut commands),
            SweepProgress::Complete
        );
    }
}
