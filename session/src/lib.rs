#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Composition layer that owns one world and drives every population system.
//!
//! A [`Session`] is the only object a game loop talks to. Each [`Session::tick`]
//! advances the world clock, ramps difficulty, runs the spawn scheduler, purges
//! squares inside safe zones, advances any gradual cleanup, and finally runs
//! the periodic despawn sweep. Commands produced by each stage are applied
//! before the next stage reads the world.

mod seed;
pub mod tuning;

use std::time::Duration;

use square_field_core::{
    ActiveEntityView, Command, DespawnCause, DifficultySnapshot, EntityHandle, Event,
    SafeZoneView, SpawnTables, TemplateId, Vec2, WeightAudit,
};
use square_field_system_despawn::{DespawnSweep, GradualSweep, SafeZonePurge, SweepProgress};
use square_field_system_difficulty::DifficultyRamp;
use square_field_system_placement::{Placement, PlacementStats};
use square_field_system_selection::Selection;
use square_field_system_spawning::{hostile_templates, SpawnContext, Spawning};
use square_field_world::{self as world, pool::PoolStats, query, World};
use tracing::{debug, info, warn};

pub use square_field_system_spawning::{InitialPopulation, PopulationReport};
pub use tuning::{PrewarmTuning, RadiusProfile, SessionTuning, TuningError};

use crate::seed::SessionSeeds;

/// Everything required to start a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Tunables for every system.
    pub tuning: SessionTuning,
    /// Spawn tables.
    pub tables: SpawnTables,
    /// Seed every random stream is derived from.
    pub seed: u64,
}

/// Owns the world and the population systems for one play session.
#[derive(Debug)]
pub struct Session {
    world: World,
    difficulty: DifficultyRamp,
    spawning: Spawning,
    sweep: DespawnSweep,
    purge: SafeZonePurge,
    cleanup: Option<GradualSweep>,
    events: Vec<Event>,
    commands: Vec<Command>,
}

impl Session {
    /// Validates the configuration, prewarms the pools and builds every system.
    pub fn new(config: SessionConfig) -> Result<Self, TuningError> {
        let SessionConfig {
            tuning,
            tables,
            seed,
        } = config;
        tuning.validate()?;
        tables.validate()?;

        match tables.audit_weights() {
            WeightAudit::Balanced => {}
            WeightAudit::Exceeds { total } => {
                warn!(total, "spawn weights sum above 1; selection is normalised")
            }
            WeightAudit::Short { total } => {
                warn!(total, "spawn weights do not sum to 1; selection is normalised")
            }
        }
        if tuning.despawn.despawn_radius < tuning.spawning.spawn_radius {
            warn!(
                despawn_radius = tuning.despawn.despawn_radius,
                spawn_radius = tuning.spawning.spawn_radius,
                "despawn radius is smaller than spawn radius; fresh spawns may vanish"
            );
        }

        let seeds = SessionSeeds::derive(seed);
        let mut world = World::new();
        let mut events = Vec::new();
        for (template, count) in prewarm_plan(&tables, tuning.prewarm) {
            world::apply(
                &mut world,
                Command::PrewarmPool { template, count },
                &mut events,
            );
        }

        let placement = Placement::new(tuning.placement, seeds.placement, seeds.density);
        let spawning = Spawning::new(
            tuning.spawning,
            tables,
            placement,
            Selection::new(seeds.selection),
        );

        info!(
            seed,
            pooled = query::pool(&world).total_instantiated(),
            "session started"
        );

        Ok(Self {
            world,
            difficulty: DifficultyRamp::new(tuning.difficulty),
            spawning,
            sweep: DespawnSweep::new(tuning.despawn),
            purge: SafeZonePurge::new(),
            cleanup: None,
            events,
            commands: Vec::new(),
        })
    }

    /// Advances the session by `dt` with the player at `player`.
    ///
    /// Returns every event the world emitted during the tick.
    pub fn tick(&mut self, dt: Duration, player: Vec2) -> &[Event] {
        self.events.clear();
        world::apply(&mut self.world, Command::Tick { dt }, &mut self.events);
        self.difficulty.handle(&self.events);

        self.commands.clear();
        {
            let spatial = query::spatial(&self.world);
            self.spawning.handle(
                &self.events,
                SpawnContext {
                    player,
                    world_time: query::world_time(&self.world),
                    difficulty: self.difficulty.snapshot(),
                    spatial: &spatial,
                    safe_zones: query::safe_zones(&self.world),
                },
                &mut self.commands,
            );
        }
        self.flush();

        self.purge.handle(
            query::active_entities(&self.world),
            query::safe_zones(&self.world),
            &mut self.commands,
        );
        self.flush();

        if let Some(cleanup) = self.cleanup.as_mut() {
            let progress = cleanup.advance(
                query::active_entities(&self.world),
                player,
                self.sweep.despawn_radius(),
                &mut self.commands,
            );
            if progress == SweepProgress::Complete {
                info!("gradual cleanup complete; periodic sweep enabled");
                self.cleanup = None;
                self.commands
                    .push(Command::SetDespawnEnabled { enabled: true });
            }
            self.flush();
        }

        self.sweep.handle(
            &self.events,
            query::despawn_enabled(&self.world),
            player,
            query::active_entities(&self.world),
            &mut self.commands,
        );
        self.flush();

        &self.events
    }

    /// Places the initial normal squares inside the player's view.
    pub fn spawn_initial_population(
        &mut self,
        request: InitialPopulation,
        player: Vec2,
    ) -> PopulationReport {
        self.events.clear();
        self.commands.clear();
        let report = {
            let spatial = query::spatial(&self.world);
            self.spawning.spawn_initial_population(
                request,
                player,
                &spatial,
                query::safe_zones(&self.world),
                &mut self.commands,
            )
        };
        self.flush();
        report
    }

    /// Removes an active entity; stale handles are ignored.
    pub fn despawn(&mut self, handle: EntityHandle) -> &[Event] {
        self.submit(Command::Despawn {
            handle,
            cause: DespawnCause::Consumed,
        })
    }

    /// Destroys a unique square and awards `points` once.
    pub fn destroy_unique_square(&mut self, handle: EntityHandle, points: u32) -> &[Event] {
        self.submit(Command::DestroyUniqueSquare { handle, points })
    }

    /// Synchronises the tracked position of an entity that moved on its own.
    pub fn relocate(&mut self, handle: EntityHandle, position: Vec2) {
        self.events.clear();
        world::apply(
            &mut self.world,
            Command::RelocateEntity { handle, position },
            &mut self.events,
        );
    }

    /// Opens or closes the periodic despawn sweep.
    pub fn set_despawn_enabled(&mut self, enabled: bool) -> &[Event] {
        self.submit(Command::SetDespawnEnabled { enabled })
    }

    /// Closes the periodic sweep and starts a budgeted cleanup of the registry.
    ///
    /// The periodic sweep reopens once every snapshot entry was visited.
    pub fn begin_gradual_cleanup(&mut self, per_tick: usize) -> &[Event] {
        self.cleanup = Some(GradualSweep::new(
            query::active_entities(&self.world),
            per_tick,
        ));
        debug!(per_tick, "gradual cleanup scheduled");
        self.submit(Command::SetDespawnEnabled { enabled: false })
    }

    /// Overrides the scheduler's last spawn position, e.g. after a teleport.
    pub fn force_last_spawn_position(&mut self, position: Vec2) {
        self.spawning.force_last_spawn_position(position);
    }

    /// Active entities in insertion order.
    #[must_use]
    pub fn active_entities(&self) -> ActiveEntityView<'_> {
        query::active_entities(&self.world)
    }

    /// Active safe zones.
    #[must_use]
    pub fn safe_zones(&self) -> SafeZoneView<'_> {
        query::safe_zones(&self.world)
    }

    /// Current spawn probabilities.
    #[must_use]
    pub fn difficulty(&self) -> DifficultySnapshot {
        self.difficulty.snapshot()
    }

    /// Total simulated time.
    #[must_use]
    pub fn world_time(&self) -> Duration {
        query::world_time(&self.world)
    }

    /// Reports whether the periodic sweep may run.
    #[must_use]
    pub fn despawn_enabled(&self) -> bool {
        query::despawn_enabled(&self.world)
    }

    /// Reports whether a gradual cleanup is in progress.
    #[must_use]
    pub fn is_cleaning_up(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Pool counters for `template`.
    #[must_use]
    pub fn pool_stats(&self, template: TemplateId) -> PoolStats {
        query::pool(&self.world).stats(template)
    }

    /// Placement rejection counters.
    #[must_use]
    pub fn placement_stats(&self) -> PlacementStats {
        self.spawning.placement().stats()
    }

    /// Tables the session spawns from.
    #[must_use]
    pub fn tables(&self) -> &SpawnTables {
        self.spawning.tables()
    }

    fn submit(&mut self, command: Command) -> &[Event] {
        self.events.clear();
        world::apply(&mut self.world, command, &mut self.events);
        &self.events
    }

    fn flush(&mut self) {
        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.events);
        }
    }
}

fn prewarm_plan(tables: &SpawnTables, prewarm: PrewarmTuning) -> Vec<(TemplateId, u32)> {
    let mut plan = Vec::new();
    if let Some(template) = tables.square_template {
        plan.push((template, prewarm.normal_squares));
    }
    for template in hostile_templates(tables) {
        plan.push((template, prewarm.per_hostile_template));
    }
    if let Some(zone) = tables.safe_zone {
        plan.push((zone.template, zone.pool_size));
    }
    plan.retain(|(_, count)| *count > 0);
    plan
}
