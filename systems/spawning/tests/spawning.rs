use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use square_field_core::{
    Command, DifficultySnapshot, EntityCategory, HostileEnemyEntry, HostileTypeId,
    SafeZoneShape, SafeZoneType, SpawnKind, SpawnTables, SquareType, TemplateId, UniqueSquareType,
    Vec2, ViewRect,
};
use square_field_system_placement::{Placement, PlacementTuning};
use square_field_system_selection::Selection;
use square_field_system_spawning::{Config, InitialPopulation, SpawnContext, Spawning};
use square_field_world::{self as world, query, World};

const SQUARE: TemplateId = TemplateId::new(0);
const CIRCLE: TemplateId = TemplateId::new(1);
const ZONE: TemplateId = TemplateId::new(2);
const SHIELD: TemplateId = TemplateId::new(3);

const CALM: DifficultySnapshot = DifficultySnapshot {
    safe_zone_chance: 0.0,
    hostile_chance: 0.0,
};

fn square(name: &str, weight: f32) -> SquareType {
    SquareType {
        name: name.to_owned(),
        point_value: 10,
        damages_on_contact: false,
        contact_damage: 0,
        weight,
    }
}

fn circle(minimum_secs: u64) -> HostileEnemyEntry {
    HostileEnemyEntry {
        name: String::from("circle"),
        template: Some(CIRCLE),
        weight: 0.1,
        cooldown: Duration::from_secs(3),
        minimum_world_time: Duration::from_secs(minimum_secs),
    }
}

fn tables() -> SpawnTables {
    SpawnTables {
        square_template: Some(SQUARE),
        squares: vec![square("plain", 0.6), square("spiky", 0.2)],
        unique_squares: vec![UniqueSquareType {
            name: String::from("shield"),
            template: Some(SHIELD),
            point_value: 50,
            damages_on_contact: false,
            contact_damage: 0,
            weight: 0.1,
        }],
        hostiles: vec![circle(30)],
        safe_zone: Some(SafeZoneType {
            template: ZONE,
            shape: SafeZoneShape::default(),
            pool_size: 2,
        }),
    }
}

fn scheduler(tables: SpawnTables, seed: u64) -> Spawning {
    let placement = Placement::new(
        PlacementTuning {
            noise_threshold: 0.0,
            ..PlacementTuning::default()
        },
        seed,
        seed as u32,
    );
    Spawning::new(Config::default(), tables, placement, Selection::new(seed ^ 0xa5a5))
}

struct Harness {
    world: World,
    spawning: Spawning,
    commands: Vec<Command>,
}

impl Harness {
    fn new(spawning: Spawning) -> Self {
        Self {
            world: World::new(),
            spawning,
            commands: Vec::new(),
        }
    }

    fn step(&mut self, dt: Duration, player: Vec2, difficulty: DifficultySnapshot) -> Vec<Command> {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);

        self.commands.clear();
        {
            let spatial = query::spatial(&self.world);
            self.spawning.handle(
                &events,
                SpawnContext {
                    player,
                    world_time: query::world_time(&self.world),
                    difficulty,
                    spatial: &spatial,
                    safe_zones: query::safe_zones(&self.world),
                },
                &mut self.commands,
            );
        }

        let emitted = self.commands.clone();
        for command in emitted.iter().cloned() {
            world::apply(&mut self.world, command, &mut events);
        }
        emitted
    }
}

#[test]
fn stationary_player_never_triggers_a_cycle() {
    let mut harness = Harness::new(scheduler(tables(), 1));
    for _ in 0..50 {
        let emitted = harness.step(Duration::from_millis(100), Vec2::ZERO, CALM);
        assert!(emitted.is_empty());
    }
    assert!(query::active_entities(&harness.world).is_empty());
}

#[test]
fn moving_player_spawns_at_most_one_batch_per_cycle() {
    let mut harness = Harness::new(scheduler(tables(), 2));
    let _ = harness.step(Duration::from_millis(50), Vec2::ZERO, CALM);

    let emitted = harness.step(Duration::from_millis(50), Vec2::new(1.5, 0.0), CALM);
    assert!(!emitted.is_empty(), "interval and distance both satisfied");
    assert!(emitted.len() <= 3);
    assert_eq!(
        harness.spawning.last_spawn_position(),
        Some(Vec2::new(1.5, 0.0))
    );

    let emitted = harness.step(Duration::from_millis(50), Vec2::new(3.0, 0.0), CALM);
    assert!(emitted.is_empty(), "accumulator was reset by the cycle");
}

#[test]
fn spawned_entities_never_overlap() {
    let mut harness = Harness::new(scheduler(tables(), 3));
    let difficulty = DifficultySnapshot {
        safe_zone_chance: 0.05,
        hostile_chance: 0.3,
    };

    for step in 1..=400 {
        let player = Vec2::new(step as f32 * 1.2, (step as f32 * 0.05).sin() * 10.0);
        let _ = harness.step(Duration::from_millis(100), player, difficulty);
    }

    let placed: Vec<Vec2> = query::active_entities(&harness.world)
        .iter()
        .filter(|entity| entity.category() != EntityCategory::SafeZone)
        .map(|entity| entity.position)
        .collect();
    assert!(placed.len() > 50, "expected a populated field");

    for (index, a) in placed.iter().enumerate() {
        for b in &placed[index + 1..] {
            assert!(a.distance(*b) >= 2.5, "{a} and {b} overlap");
        }
    }
}

#[test]
fn locked_hostile_falls_through_to_squares() {
    let mut tables = tables();
    tables.safe_zone = None;
    let mut harness = Harness::new(scheduler(tables, 4));
    let eager = DifficultySnapshot {
        safe_zone_chance: 0.0,
        hostile_chance: 1.0,
    };

    let mut spawned_squares = 0;
    for step in 1..=280 {
        let player = Vec2::new(step as f32 * 2.0, 0.0);
        for command in harness.step(Duration::from_millis(100), player, eager) {
            match command {
                Command::Spawn {
                    kind: SpawnKind::HostileEnemy { .. },
                    ..
                } => panic!("hostile spawned before its unlock time"),
                Command::Spawn { .. } => spawned_squares += 1,
                _ => {}
            }
        }
    }

    assert!(query::world_time(&harness.world) < Duration::from_secs(30));
    assert!(spawned_squares > 0, "slots fell through to squares");
}

#[test]
fn unlocked_hostile_spawns_and_starts_cooldown() {
    let mut tables = tables();
    tables.safe_zone = None;
    tables.hostiles = vec![circle(0)];
    let mut harness = Harness::new(scheduler(tables, 5));
    let eager = DifficultySnapshot {
        safe_zone_chance: 0.0,
        hostile_chance: 1.0,
    };

    let _ = harness.step(Duration::from_millis(100), Vec2::ZERO, eager);
    let emitted = harness.step(Duration::from_millis(100), Vec2::new(2.0, 0.0), eager);

    let hostiles = emitted
        .iter()
        .filter(|command| {
            matches!(
                command,
                Command::Spawn {
                    kind: SpawnKind::HostileEnemy { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(hostiles, 1, "cooldown blocks the remaining slots");

    let gate = harness
        .spawning
        .hostile_gate(HostileTypeId::new(0))
        .expect("gate exists");
    assert_eq!(gate.cooldown_until(), Duration::from_millis(200) + Duration::from_secs(3));
}

#[test]
fn entries_without_templates_are_skipped() {
    let mut tables = tables();
    tables.safe_zone = None;
    tables.hostiles[0].template = None;
    tables.hostiles[0].minimum_world_time = Duration::ZERO;
    tables.unique_squares[0].template = None;
    let mut harness = Harness::new(scheduler(tables, 6));
    let eager = DifficultySnapshot {
        safe_zone_chance: 0.0,
        hostile_chance: 1.0,
    };

    for step in 1..=100 {
        let player = Vec2::new(step as f32 * 2.0, 0.0);
        for command in harness.step(Duration::from_millis(100), player, eager) {
            if let Command::Spawn { template, .. } = command {
                assert_eq!(template, SQUARE);
            }
        }
    }
}

#[test]
fn initial_population_fills_the_view() {
    let mut world = World::new();
    let mut spawning = scheduler(tables(), 7);
    let view = ViewRect::new(Vec2::ZERO, 36.0, 20.0);
    let mut commands = Vec::new();

    let report = {
        let spatial = query::spatial(&world);
        spawning.spawn_initial_population(
            InitialPopulation {
                view,
                count: 12,
                min_radius: 4.0,
                max_radius: 18.0,
            },
            Vec2::ZERO,
            &spatial,
            query::safe_zones(&world),
            &mut commands,
        )
    };

    assert_eq!(report.requested, 12);
    assert_eq!(report.spawned, 12);
    assert!(report.attempts <= 12 * 20);
    assert_eq!(commands.len(), 12);

    let mut events = Vec::new();
    for command in commands {
        world::apply(&mut world, command, &mut events);
    }
    let active = query::active_entities(&world);
    assert_eq!(active.count(EntityCategory::NormalSquare), 12);
    assert!(active.iter().all(|entity| view.contains(entity.position)));
}

#[test]
fn initial_population_ignores_invalid_requests() {
    let world = World::new();
    let mut spawning = scheduler(tables(), 8);
    let spatial = query::spatial(&world);
    let mut commands = Vec::new();

    let zero = spawning.spawn_initial_population(
        InitialPopulation {
            view: ViewRect::new(Vec2::ZERO, 36.0, 20.0),
            count: 0,
            min_radius: 4.0,
            max_radius: 18.0,
        },
        Vec2::ZERO,
        &spatial,
        query::safe_zones(&world),
        &mut commands,
    );
    let flat = spawning.spawn_initial_population(
        InitialPopulation {
            view: ViewRect::new(Vec2::ZERO, 0.0, 20.0),
            count: 5,
            min_radius: 4.0,
            max_radius: 18.0,
        },
        Vec2::ZERO,
        &spatial,
        query::safe_zones(&world),
        &mut commands,
    );

    assert_eq!(zero.attempts, 0);
    assert_eq!(flat.attempts, 0);
    assert!(commands.is_empty());
}

#[test]
fn initial_population_rejects_unbounded_radii() {
    let world = World::new();
    let mut spawning = scheduler(tables(), 8);
    let spatial = query::spatial(&world);
    let mut commands = Vec::new();

    for (min_radius, max_radius) in [(4.0, f32::INFINITY), (f32::NAN, 18.0), (18.0, 4.0)] {
        let report = spawning.spawn_initial_population(
            InitialPopulation {
                view: ViewRect::new(Vec2::ZERO, 36.0, 20.0),
                count: 5,
                min_radius,
                max_radius,
            },
            Vec2::ZERO,
            &spatial,
            query::safe_zones(&world),
            &mut commands,
        );
        assert_eq!(report.requested, 5);
        assert_eq!(report.spawned, 0);
        assert_eq!(report.attempts, 0);
    }
    assert!(commands.is_empty());
}

#[test]
fn initial_population_reports_shortfall() {
    let world = World::new();
    let mut spawning = scheduler(tables(), 9);
    let spatial = query::spatial(&world);
    let mut commands = Vec::new();

    let report = spawning.spawn_initial_population(
        InitialPopulation {
            view: ViewRect::new(Vec2::ZERO, 6.0, 6.0),
            count: 40,
            min_radius: 0.0,
            max_radius: 3.0,
        },
        Vec2::ZERO,
        &spatial,
        query::safe_zones(&world),
        &mut commands,
    );

    assert!(report.spawned < 40, "a 6x6 view cannot hold 40 squares");
    assert_eq!(report.attempts, 40 * 20);
    assert_eq!(commands.len() as u32, report.spawned);
}

#[test]
fn forced_anchor_suppresses_the_next_cycle() {
    let mut harness = Harness::new(scheduler(tables(), 10));
    let _ = harness.step(Duration::from_millis(100), Vec2::ZERO, CALM);

    harness.spawning.force_last_spawn_position(Vec2::new(50.0, 0.0));
    let emitted = harness.step(Duration::from_millis(100), Vec2::new(50.5, 0.0), CALM);
    assert!(emitted.is_empty(), "teleport destination counts as the anchor");

    let emitted = harness.step(Duration::from_millis(100), Vec2::new(52.0, 0.0), CALM);
    assert!(!emitted.is_empty());
}

#[test]
fn deterministic_replay_produces_identical_sequence() {
    let first = replay(0x4d59_5df4_d0f3_3173);
    let second = replay(0x4d59_5df4_d0f3_3173);
    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());

    let other = replay(0x1234_5678);
    assert_ne!(first, other, "different seeds should diverge");
}

fn replay(seed: u64) -> ReplayOutcome {
    let mut harness = Harness::new(scheduler(tables(), seed));
    let difficulty = DifficultySnapshot {
        safe_zone_chance: 0.1,
        hostile_chance: 0.2,
    };
    let mut spawns = Vec::new();

    for step in 1..=150 {
        let player = Vec2::new(step as f32, step as f32 * 0.5);
        for command in harness.step(Duration::from_millis(100), player, difficulty) {
            if let Command::Spawn {
                template, position, ..
            } = command
            {
                spawns.push(SpawnRecord {
                    template: template.get(),
                    x: position.x.to_bits(),
                    y: position.y.to_bits(),
                });
            }
        }
    }

    let active = query::active_entities(&harness.world)
        .iter()
        .map(|entity| entity.handle.get())
        .collect();
    ReplayOutcome { spawns, active }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    spawns: Vec<SpawnRecord>,
    active: Vec<u32>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SpawnRecord {
    template: u32,
    x: u32,
    y: u32,
}
