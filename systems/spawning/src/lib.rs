#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Movement-gated spawn scheduler that fills slots around the player.

use std::time::Duration;

use square_field_core::{
    Command, DifficultySnapshot, Event, HostileTypeId, SafeZoneFootprint, SafeZoneView,
    SpatialQuery, SpawnKind, SpawnTables, TableError, TemplateId, Vec2, ViewRect,
};
use square_field_system_placement::{Placement, PlacementContext, PlacementRequest};
use square_field_system_selection::{
    HostileSpawnGate, Selection, SquareCandidates, SquareChoice,
};
use tracing::{debug, error, info, warn};

const INITIAL_ATTEMPT_MULTIPLIER: u32 = 20;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Minimum time between two spawn cycles.
    pub spawn_interval: Duration,
    /// Distance the player must travel between two spawn cycles.
    pub spawn_distance_threshold: f32,
    /// Slot attempts made per cycle.
    pub slots_per_cycle: u32,
    /// Inner radius of the spawn annulus.
    pub no_spawn_radius: f32,
    /// Outer radius of the spawn annulus.
    pub spawn_radius: f32,
}

impl Config {
    /// Creates a configuration using the provided cadence and annulus.
    #[must_use]
    pub const fn new(
        spawn_interval: Duration,
        spawn_distance_threshold: f32,
        slots_per_cycle: u32,
        no_spawn_radius: f32,
        spawn_radius: f32,
    ) -> Self {
        Self {
            spawn_interval,
            spawn_distance_threshold,
            slots_per_cycle,
            no_spawn_radius,
            spawn_radius,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 1.0, 3, 8.0, 20.0)
    }
}

/// Read-only state the scheduler consults each tick.
#[derive(Clone, Copy, Debug)]
pub struct SpawnContext<'a, S> {
    /// Current player position.
    pub player: Vec2,
    /// Current world time.
    pub world_time: Duration,
    /// Spawn probabilities published by the difficulty ramp.
    pub difficulty: DifficultySnapshot,
    /// Radius queries against the world.
    pub spatial: &'a S,
    /// Active safe zones.
    pub safe_zones: SafeZoneView<'a>,
}

/// Request to fill the player's view before play starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialPopulation {
    /// View rectangle every initial square must lie in.
    pub view: ViewRect,
    /// Number of normal squares to place.
    pub count: u32,
    /// Inner radius of the placement annulus around the player.
    pub min_radius: f32,
    /// Outer radius of the placement annulus around the player.
    pub max_radius: f32,
}

/// Outcome of an initial population request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PopulationReport {
    /// Squares requested.
    pub requested: u32,
    /// Squares placed.
    pub spawned: u32,
    /// Placement calls made.
    pub attempts: u32,
}

/// Scheduler that turns elapsed time and player movement into spawn commands.
#[derive(Debug)]
pub struct Spawning {
    config: Config,
    tables: SpawnTables,
    placement: Placement,
    selection: Selection,
    gates: Vec<HostileSpawnGate>,
    unique_enabled: Vec<bool>,
    accumulator: Duration,
    last_spawn_position: Option<Vec2>,
    pending_positions: Vec<Vec2>,
    zone_workspace: Vec<SafeZoneFootprint>,
}

impl Spawning {
    /// Creates a scheduler over `tables`.
    ///
    /// Entries without a template are reported once and skipped for the
    /// lifetime of the scheduler.
    #[must_use]
    pub fn new(
        config: Config,
        tables: SpawnTables,
        placement: Placement,
        selection: Selection,
    ) -> Self {
        for problem in tables.missing_templates() {
            if let TableError::MissingTemplate { category, name } = &problem {
                error!(?category, %name, "{problem}; entry disabled");
            }
        }

        let gates = tables.hostiles.iter().map(HostileSpawnGate::new).collect();
        let unique_enabled = tables
            .unique_squares
            .iter()
            .map(|unique| unique.template.is_some())
            .collect();

        Self {
            config,
            tables,
            placement,
            selection,
            gates,
            unique_enabled,
            accumulator: Duration::ZERO,
            last_spawn_position: None,
            pending_positions: Vec::new(),
            zone_workspace: Vec::new(),
        }
    }

    /// Configuration the scheduler runs with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Tables the scheduler draws from.
    #[must_use]
    pub const fn tables(&self) -> &SpawnTables {
        &self.tables
    }

    /// Placement validator, exposed for its rejection counters.
    #[must_use]
    pub const fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Spawn gate of the hostile entry `id`.
    #[must_use]
    pub fn hostile_gate(&self, id: HostileTypeId) -> Option<&HostileSpawnGate> {
        self.gates.get(id.index())
    }

    /// Position the player occupied when the last cycle ran.
    #[must_use]
    pub const fn last_spawn_position(&self) -> Option<Vec2> {
        self.last_spawn_position
    }

    /// Overrides the recorded last spawn position, e.g. after a teleport.
    pub fn force_last_spawn_position(&mut self, position: Vec2) {
        self.last_spawn_position = Some(position);
    }

    /// Consumes events and immutable views to emit spawn commands.
    pub fn handle<S: SpatialQuery>(
        &mut self,
        events: &[Event],
        context: SpawnContext<'_, S>,
        out: &mut Vec<Command>,
    ) {
        let anchor = *self.last_spawn_position.get_or_insert(context.player);

        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                self.accumulator = self.accumulator.saturating_add(*dt);
            }
        }

        if self.accumulator < self.config.spawn_interval {
            return;
        }
        if context.player.distance(anchor) < self.config.spawn_distance_threshold {
            return;
        }

        self.begin_cycle(context.safe_zones);
        for _ in 0..self.config.slots_per_cycle {
            self.fill_slot(&context, out);
        }

        self.last_spawn_position = Some(context.player);
        self.accumulator = Duration::ZERO;
    }

    /// Places up to `request.count` normal squares inside the view.
    ///
    /// Never fails: a shortfall after `count * 20` placement calls is logged
    /// and reported.
    pub fn spawn_initial_population<S: SpatialQuery>(
        &mut self,
        request: InitialPopulation,
        player: Vec2,
        spatial: &S,
        safe_zones: SafeZoneView<'_>,
        out: &mut Vec<Command>,
    ) -> PopulationReport {
        let mut report = PopulationReport {
            requested: request.count,
            ..PopulationReport::default()
        };

        if request.count == 0 {
            debug!("initial population skipped: zero squares requested");
            return report;
        }
        if !request.view.is_valid() {
            error!(
                width = request.view.width(),
                height = request.view.height(),
                "initial population skipped: invalid view dimensions"
            );
            return report;
        }
        if !request.min_radius.is_finite()
            || !request.max_radius.is_finite()
            || request.min_radius < 0.0
            || request.max_radius < request.min_radius
        {
            error!(
                min_radius = request.min_radius,
                max_radius = request.max_radius,
                "initial population skipped: invalid radii"
            );
            return report;
        }
        let Some(template) = self.tables.square_template else {
            error!("initial population skipped: no normal square template");
            return report;
        };

        info!(
            count = request.count,
            width = request.view.width(),
            height = request.view.height(),
            "spawning initial squares"
        );

        self.begin_cycle(safe_zones);
        let placement = PlacementRequest {
            center: player,
            min_radius: request.min_radius,
            max_radius: request.max_radius,
            bounds: Some(request.view),
        };
        let max_attempts = request.count.saturating_mul(INITIAL_ATTEMPT_MULTIPLIER);

        while report.spawned < request.count && report.attempts < max_attempts {
            report.attempts += 1;
            let Some(position) = self.place(placement, spatial) else {
                continue;
            };
            let choice = self.selection.choose_square(SquareCandidates {
                squares: &self.tables.squares,
                squares_enabled: true,
                unique_squares: &[],
                unique_enabled: &[],
            });
            let Some(SquareChoice::Normal(square)) = choice else {
                break;
            };
            out.push(Command::Spawn {
                template,
                kind: SpawnKind::NormalSquare { square },
                position,
            });
            self.pending_positions.push(position);
            report.spawned += 1;
        }

        if report.spawned < request.count {
            warn!(
                spawned = report.spawned,
                requested = request.count,
                attempts = report.attempts,
                "initial population fell short; check radii, density or view size"
            );
        } else {
            info!(spawned = report.spawned, "initial population complete");
        }
        report
    }

    fn begin_cycle(&mut self, safe_zones: SafeZoneView<'_>) {
        self.pending_positions.clear();
        self.zone_workspace.clear();
        self.zone_workspace.extend(safe_zones.footprints());
    }

    fn fill_slot<S: SpatialQuery>(&mut self, context: &SpawnContext<'_, S>, out: &mut Vec<Command>) {
        let request = PlacementRequest {
            center: context.player,
            min_radius: self.config.no_spawn_radius,
            max_radius: self.config.spawn_radius,
            bounds: None,
        };

        if let Some(zone) = self.tables.safe_zone {
            if self.selection.roll(context.difficulty.safe_zone_chance) {
                if let Some(position) = self.place(request, context.spatial) {
                    out.push(Command::Spawn {
                        template: zone.template,
                        kind: SpawnKind::SafeZone { shape: zone.shape },
                        position,
                    });
                    self.zone_workspace.push(SafeZoneFootprint {
                        position,
                        radius: zone.shape.radius,
                    });
                    return;
                }
            }
        }

        if !self.tables.hostiles.is_empty()
            && self.selection.roll(context.difficulty.hostile_chance)
        {
            if let Some(id) =
                self.selection
                    .choose_hostile(&self.tables.hostiles, &self.gates, context.world_time)
            {
                if self.spawn_hostile(id, request, context, out) {
                    return;
                }
            }
        }

        let choice = self.selection.choose_square(SquareCandidates {
            squares: &self.tables.squares,
            squares_enabled: self.tables.square_template.is_some(),
            unique_squares: &self.tables.unique_squares,
            unique_enabled: &self.unique_enabled,
        });
        let Some(choice) = choice else {
            return;
        };
        let (template, kind) = match choice {
            SquareChoice::Normal(square) => (
                self.tables.square_template,
                SpawnKind::NormalSquare { square },
            ),
            SquareChoice::Unique(unique) => (
                self.tables
                    .unique_squares
                    .get(unique.index())
                    .and_then(|entry| entry.template),
                SpawnKind::UniqueSquare { unique },
            ),
        };
        let Some(template) = template else {
            return;
        };
        if let Some(position) = self.place(request, context.spatial) {
            out.push(Command::Spawn {
                template,
                kind,
                position,
            });
        }
    }

    fn spawn_hostile<S: SpatialQuery>(
        &mut self,
        id: HostileTypeId,
        request: PlacementRequest,
        context: &SpawnContext<'_, S>,
        out: &mut Vec<Command>,
    ) -> bool {
        let Some(entry) = self.tables.hostiles.get(id.index()) else {
            return false;
        };
        let Some(template) = entry.template else {
            return false;
        };
        let cooldown = entry.cooldown;

        let Some(position) = self.place(request, context.spatial) else {
            return false;
        };
        out.push(Command::Spawn {
            template,
            kind: SpawnKind::HostileEnemy { hostile: id },
            position,
        });
        if let Some(gate) = self.gates.get_mut(id.index()) {
            gate.start_cooldown(context.world_time, cooldown);
        }
        true
    }

    fn place<S: SpatialQuery>(&mut self, request: PlacementRequest, spatial: &S) -> Option<Vec2> {
        let position = self.placement.try_find_position(
            request,
            PlacementContext {
                spatial,
                safe_zones: &self.zone_workspace,
                pending: &self.pending_positions,
            },
        )?;
        self.pending_positions.push(position);
        Some(position)
    }
}

/// Distinct templates referenced by the hostile table, in ascending order.
#[must_use]
pub fn hostile_templates(tables: &SpawnTables) -> Vec<TemplateId> {
    let mut templates: Vec<TemplateId> = tables
        .hostiles
        .iter()
        .filter_map(|entry| entry.template)
        .collect();
    templates.sort_unstable();
    templates.dedup();
    templates
}
