#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Square Field session.
//!
//! A simulated player wanders across the field while the session spawns,
//! recycles and despawns entities around it. Squares the player touches are
//! collected, and a summary of the run is printed at the end.

mod config;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use square_field_core::{
    DespawnCause, Disposal, EntityCategory, EntityHandle, Event, SpawnKind, SpawnTables, ViewRect,
};
use square_field_session::{
    InitialPopulation, PopulationReport, RadiusProfile, Session, SessionConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::FileConfig;

const DEFAULT_SEED: u64 = 0x5eed_f1e1_d000_0001;
const PLAYER_SPEED: f32 = 6.0;
const PICKUP_RADIUS: f32 = 1.0;
const VIEW_WIDTH: f32 = 36.0;
const VIEW_HEIGHT: f32 = 20.0;
const INITIAL_SQUARES: u32 = 30;

#[derive(Debug, Parser)]
#[command(name = "square-field")]
#[command(about = "Runs a headless Square Field population simulation")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session seed; overrides the seed in the configuration file.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 1_800)]
    ticks: u32,

    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 16)]
    dt_ms: u64,

    /// Radius preset to run with.
    #[arg(long, value_enum, default_value_t = Profile::Desktop)]
    profile: Profile,

    /// Print the summary as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Profile {
    Desktop,
    Handheld,
}

impl From<Profile> for RadiusProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Desktop => Self::Desktop,
            Profile::Handheld => Self::Handheld,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct Tally {
    normal_squares: u32,
    unique_squares: u32,
    hostile_enemies: u32,
    safe_zones: u32,
}

impl Tally {
    fn record(&mut self, category: EntityCategory) {
        let slot = match category {
            EntityCategory::NormalSquare => &mut self.normal_squares,
            EntityCategory::UniqueSquare => &mut self.unique_squares,
            EntityCategory::HostileEnemy => &mut self.hostile_enemies,
            EntityCategory::SafeZone => &mut self.safe_zones,
        };
        *slot += 1;
    }
}

#[derive(Debug, Default, Serialize)]
struct Removals {
    out_of_range: u32,
    consumed: u32,
    expired: u32,
    inside_safe_zone: u32,
    recycled: u32,
}

#[derive(Debug, Serialize)]
struct Summary {
    seed: u64,
    ticks: u32,
    world_time_secs: f64,
    initial_population: InitialSummary,
    spawned: Tally,
    reused_instances: u32,
    removed: Removals,
    points: u64,
    active: Tally,
    safe_zone_chance: f32,
    hostile_chance: f32,
    placement_candidates: u64,
    placement_failures: u64,
}

#[derive(Debug, Serialize)]
struct InitialSummary {
    requested: u32,
    spawned: u32,
    attempts: u32,
}

impl From<PopulationReport> for InitialSummary {
    fn from(report: PopulationReport) -> Self {
        Self {
            requested: report.requested,
            spawned: report.spawned,
            attempts: report.attempts,
        }
    }
}

/// Entry point for the Square Field command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let seed = cli.seed.or(file.seed).unwrap_or(DEFAULT_SEED);
    let tuning = file.tuning(cli.profile.into())?;
    let tables = file.tables()?;

    let mut session = Session::new(SessionConfig {
        tuning,
        tables: tables.clone(),
        seed,
    })
    .context("failed to start session")?;

    let summary = run(&mut session, &tables, &cli, seed);
    if cli.json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("failed to render summary json")?;
        println!("{rendered}");
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn run(session: &mut Session, tables: &SpawnTables, cli: &Cli, seed: u64) -> Summary {
    let dt = Duration::from_millis(cli.dt_ms);
    let mut wander = ChaCha8Rng::seed_from_u64(seed);
    let mut player = Vec2::ZERO;
    let mut heading = 0.0_f32;

    let initial = session.spawn_initial_population(
        InitialPopulation {
            view: ViewRect::new(player, VIEW_WIDTH, VIEW_HEIGHT),
            count: INITIAL_SQUARES,
            min_radius: 4.0,
            max_radius: 18.0,
        },
        player,
    );

    let mut summary = Summary {
        seed,
        ticks: cli.ticks,
        world_time_secs: 0.0,
        initial_population: initial.into(),
        spawned: Tally::default(),
        reused_instances: 0,
        removed: Removals::default(),
        points: 0,
        active: Tally::default(),
        safe_zone_chance: 0.0,
        hostile_chance: 0.0,
        placement_candidates: 0,
        placement_failures: 0,
    };
    for entity in session.active_entities().iter() {
        summary.spawned.record(entity.category());
    }

    let mut touched = Vec::new();
    for _ in 0..cli.ticks {
        heading += wander.gen_range(-0.15..0.15);
        player += Vec2::from_angle(heading) * PLAYER_SPEED * dt.as_secs_f32();

        let events = session.tick(dt, player);
        record_events(&mut summary, events);

        touched.clear();
        touched.extend(
            session
                .active_entities()
                .iter()
                .filter(|entity| entity.position.distance(player) <= PICKUP_RADIUS)
                .map(|entity| (entity.handle, entity.kind)),
        );
        for &(handle, kind) in &touched {
            collect(session, tables, handle, kind, &mut summary);
        }
    }

    let active = session.active_entities();
    for entity in active.iter() {
        summary.active.record(entity.category());
    }
    let difficulty = session.difficulty();
    let placement = session.placement_stats();
    summary.world_time_secs = session.world_time().as_secs_f64();
    summary.safe_zone_chance = difficulty.safe_zone_chance;
    summary.hostile_chance = difficulty.hostile_chance;
    summary.placement_candidates = placement.candidates;
    summary.placement_failures = placement.exhausted;

    info!(
        active = active.len(),
        points = summary.points,
        "simulation finished"
    );
    summary
}

fn collect(
    session: &mut Session,
    tables: &SpawnTables,
    handle: EntityHandle,
    kind: SpawnKind,
    summary: &mut Summary,
) {
    let events = match kind {
        SpawnKind::NormalSquare { square } => {
            let points = tables
                .squares
                .get(square.index())
                .map_or(0, |entry| entry.point_value);
            summary.points += u64::from(points);
            session.despawn(handle)
        }
        SpawnKind::UniqueSquare { unique } => {
            let points = tables
                .unique_squares
                .get(unique.index())
                .map_or(0, |entry| entry.point_value);
            session.destroy_unique_square(handle, points)
        }
        SpawnKind::HostileEnemy { .. } | SpawnKind::SafeZone { .. } => return,
    };
    record_events(summary, events);
}

fn record_events(summary: &mut Summary, events: &[Event]) {
    for event in events {
        match event {
            Event::EntitySpawned { kind, reused, .. } => {
                summary.spawned.record(kind.category());
                if *reused {
                    summary.reused_instances += 1;
                }
            }
            Event::EntityDespawned { cause, disposal, .. } => {
                let removed = &mut summary.removed;
                match cause {
                    DespawnCause::OutOfRange => removed.out_of_range += 1,
                    DespawnCause::Consumed => removed.consumed += 1,
                    DespawnCause::Expired => removed.expired += 1,
                    DespawnCause::InsideSafeZone => removed.inside_safe_zone += 1,
                }
                if *disposal == Disposal::Pooled {
                    removed.recycled += 1;
                }
            }
            Event::PointsAwarded { points } => summary.points += u64::from(*points),
            Event::TimeAdvanced { .. } | Event::DespawnGateChanged { .. } => {}
        }
    }
}

fn print_summary(summary: &Summary) {
    println!("square field run (seed {:#x})", summary.seed);
    println!(
        "  simulated {} ticks, {:.1}s",
        summary.ticks, summary.world_time_secs
    );
    println!(
        "  initial population: {}/{} in {} attempts",
        summary.initial_population.spawned,
        summary.initial_population.requested,
        summary.initial_population.attempts
    );
    print_tally("spawned", &summary.spawned);
    println!("  reused pool instances: {}", summary.reused_instances);
    let removed = &summary.removed;
    println!(
        "  removed: {} out of range, {} collected, {} expired, {} inside safe zones ({} recycled)",
        removed.out_of_range,
        removed.consumed,
        removed.expired,
        removed.inside_safe_zone,
        removed.recycled
    );
    print_tally("active", &summary.active);
    println!("  points: {}", summary.points);
    println!(
        "  chances: safe zone {:.4}, hostile {:.4}",
        summary.safe_zone_chance, summary.hostile_chance
    );
    println!(
        "  placement: {} candidates, {} exhausted calls",
        summary.placement_candidates, summary.placement_failures
    );
}

fn print_tally(label: &str, tally: &Tally) {
    println!(
        "  {label}: {} normal, {} unique, {} hostile, {} safe zones",
        tally.normal_squares, tally.unique_squares, tally.hostile_enemies, tally.safe_zones
    );
}
