#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Square Field spawning engine.
//!
//! The world owns the entity pool, the active entity registry, the safe-zone
//! records and the static border geometry. It is mutated exclusively through
//! [`apply`]; everything else reads it through the [`query`] module.

pub mod pool;

use std::time::Duration;

use square_field_core::{
    ActiveEntity, Border, Command, DespawnCause, Disposal, EntityCategory, EntityHandle, Event,
    SafeZoneRecord, SpawnKind, TemplateId, Vec2,
};
use tracing::{debug, warn};

use crate::pool::{EntityPool, ReleaseOutcome};

/// Represents the authoritative Square Field world state.
#[derive(Debug)]
pub struct World {
    clock: Duration,
    pool: EntityPool,
    registry: Registry,
    safe_zones: Vec<SafeZoneRecord>,
    borders: Vec<Border>,
    despawn_enabled: bool,
}

impl World {
    /// Creates an empty world with the despawn sweep enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Duration::ZERO,
            pool: EntityPool::new(),
            registry: Registry::default(),
            safe_zones: Vec::new(),
            borders: Vec::new(),
            despawn_enabled: true,
        }
    }

    fn spawn(
        &mut self,
        template: TemplateId,
        kind: SpawnKind,
        position: Vec2,
        out_events: &mut Vec<Event>,
    ) {
        let (handle, reused) = if kind.category().is_pooled() {
            let acquired = self.pool.acquire(template);
            (acquired.handle, acquired.reused)
        } else {
            (self.pool.instantiate_unpooled(template), false)
        };

        if !self.pool.activate(handle) {
            warn!(handle = handle.get(), "pool issued a handle that cannot activate");
            return;
        }

        self.registry.insert(ActiveEntity {
            handle,
            template,
            kind,
            position,
        });

        if let SpawnKind::SafeZone { shape } = kind {
            self.safe_zones.push(SafeZoneRecord {
                handle,
                position,
                radius: shape.radius,
                remaining: shape.lifetime,
            });
        }

        out_events.push(Event::EntitySpawned {
            handle,
            template,
            kind,
            position,
            reused,
        });
    }

    fn despawn(
        &mut self,
        handle: EntityHandle,
        cause: DespawnCause,
        out_events: &mut Vec<Event>,
    ) {
        let Some(entity) = self.registry.remove(handle) else {
            debug!(handle = handle.get(), ?cause, "ignoring despawn of inactive entity");
            return;
        };

        let category = entity.category();
        if category == EntityCategory::SafeZone {
            self.safe_zones.retain(|zone| zone.handle != handle);
        }

        let disposal = if category.is_pooled() {
            match self.pool.release(entity.template, handle) {
                ReleaseOutcome::Pooled => Disposal::Pooled,
                outcome => {
                    warn!(
                        handle = handle.get(),
                        ?outcome,
                        "pool refused a release; destroying instance"
                    );
                    let _ = self.pool.destroy(handle);
                    Disposal::Destroyed
                }
            }
        } else {
            let _ = self.pool.destroy(handle);
            Disposal::Destroyed
        };

        out_events.push(Event::EntityDespawned {
            handle,
            template: entity.template,
            category,
            cause,
            disposal,
        });
    }

    fn expire_safe_zones(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let mut expired = Vec::new();
        for zone in &mut self.safe_zones {
            zone.remaining = zone.remaining.saturating_sub(dt);
            if zone.remaining.is_zero() {
                expired.push(zone.handle);
            }
        }

        for handle in expired {
            self.despawn(handle, DespawnCause::Expired, out_events);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
            world.expire_safe_zones(dt, out_events);
        }
        Command::Spawn {
            template,
            kind,
            position,
        } => world.spawn(template, kind, position, out_events),
        Command::Despawn { handle, cause } => world.despawn(handle, cause, out_events),
        Command::DestroyUniqueSquare { handle, points } => {
            if world.registry.get(handle).is_none() {
                debug!(handle = handle.get(), "ignoring destruction of inactive square");
                return;
            }
            if points > 0 {
                out_events.push(Event::PointsAwarded { points });
            }
            world.despawn(handle, DespawnCause::Consumed, out_events);
        }
        Command::RelocateEntity { handle, position } => {
            if let Some(entity) = world.registry.get_mut(handle) {
                entity.position = position;
            }
            if let Some(zone) = world
                .safe_zones
                .iter_mut()
                .find(|zone| zone.handle == handle)
            {
                zone.position = position;
            }
        }
        Command::SetDespawnEnabled { enabled } => {
            if world.despawn_enabled != enabled {
                world.despawn_enabled = enabled;
                out_events.push(Event::DespawnGateChanged { enabled });
            }
        }
        Command::ConfigureBorders { borders } => {
            world.borders = borders;
        }
        Command::PrewarmPool { template, count } => {
            world.pool.prewarm(template, count);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use square_field_core::{
        ActiveEntity, ActiveEntityView, Border, EntityCategory, SafeZoneView, SpatialQuery, Vec2,
    };

    use super::World;
    use crate::pool::EntityPool;

    /// Total simulated time since the world was created.
    #[must_use]
    pub fn world_time(world: &World) -> Duration {
        world.clock
    }

    /// Read-only view of the active entities in insertion order.
    #[must_use]
    pub fn active_entities(world: &World) -> ActiveEntityView<'_> {
        ActiveEntityView::new(world.registry.as_slice())
    }

    /// Read-only view of the active safe zones.
    #[must_use]
    pub fn safe_zones(world: &World) -> SafeZoneView<'_> {
        SafeZoneView::new(&world.safe_zones)
    }

    /// Reports whether the periodic despawn sweep may run.
    #[must_use]
    pub fn despawn_enabled(world: &World) -> bool {
        world.despawn_enabled
    }

    /// Read-only access to the entity pool.
    #[must_use]
    pub fn pool(world: &World) -> &EntityPool {
        &world.pool
    }

    /// Border geometry currently obstructing placement.
    #[must_use]
    pub fn borders(world: &World) -> &[Border] {
        &world.borders
    }

    /// Radius query service backed by the registry and border geometry.
    #[must_use]
    pub fn spatial(world: &World) -> WorldSpatial<'_> {
        WorldSpatial {
            entities: world.registry.as_slice(),
            borders: &world.borders,
        }
    }

    /// Non-allocating radius queries over the world.
    #[derive(Clone, Copy, Debug)]
    pub struct WorldSpatial<'a> {
        entities: &'a [ActiveEntity],
        borders: &'a [Border],
    }

    impl SpatialQuery for WorldSpatial<'_> {
        fn is_occupied(&self, point: Vec2, radius: f32) -> bool {
            let radius_sq = radius * radius;
            self.entities.iter().any(|entity| {
                entity.category() != EntityCategory::SafeZone
                    && entity.position.distance_squared(point) < radius_sq
            })
        }

        fn is_obstructed(&self, point: Vec2, radius: f32) -> bool {
            self.borders
                .iter()
                .any(|border| border.intersects_circle(point, radius))
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    entities: Vec<ActiveEntity>,
}

impl Registry {
    fn insert(&mut self, entity: ActiveEntity) {
        self.entities.push(entity);
    }

    fn remove(&mut self, handle: EntityHandle) -> Option<ActiveEntity> {
        let index = self
            .entities
            .iter()
            .position(|entity| entity.handle == handle)?;
        Some(self.entities.remove(index))
    }

    fn get(&self, handle: EntityHandle) -> Option<&ActiveEntity> {
        self.entities.iter().find(|entity| entity.handle == handle)
    }

    fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut ActiveEntity> {
        self.entities
            .iter_mut()
            .find(|entity| entity.handle == handle)
    }

    fn as_slice(&self) -> &[ActiveEntity] {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use square_field_core::{
        HostileTypeId, SafeZoneShape, SpatialQuery, SquareTypeId, UniqueSquareTypeId,
    };

    const SQUARE: TemplateId = TemplateId::new(0);
    const UNIQUE: TemplateId = TemplateId::new(1);
    const ZONE: TemplateId = TemplateId::new(2);
    const ENEMY: TemplateId = TemplateId::new(3);

    fn spawn(world: &mut World, template: TemplateId, kind: SpawnKind, at: Vec2) -> EntityHandle {
        let mut events = Vec::new();
        apply(
            world,
            Command::Spawn {
                template,
                kind,
                position: at,
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::EntitySpawned { handle, .. }] => *handle,
            other => panic!("unexpected events: {other:?}"),
        }
    }

    fn normal() -> SpawnKind {
        SpawnKind::NormalSquare {
            square: SquareTypeId::new(0),
        }
    }

    #[test]
    fn despawned_square_returns_to_pool_and_is_recycled() {
        let mut world = World::new();
        let handle = spawn(&mut world, SQUARE, normal(), Vec2::new(3.0, 4.0));
        assert_eq!(query::active_entities(&world).len(), 1);

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Despawn {
                handle,
                cause: DespawnCause::OutOfRange,
            },
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::EntityDespawned {
                disposal: Disposal::Pooled,
                category: EntityCategory::NormalSquare,
                ..
            }]
        ));
        assert!(query::active_entities(&world).is_empty());
        assert!(query::pool(&world).is_idle(handle));

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Spawn {
                template: SQUARE,
                kind: normal(),
                position: Vec2::ZERO,
            },
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::EntitySpawned { handle: reused_handle, reused: true, .. }] if *reused_handle == handle
        ));
    }

    #[test]
    fn stale_despawn_is_a_no_op() {
        let mut world = World::new();
        let handle = spawn(&mut world, ENEMY, SpawnKind::HostileEnemy {
            hostile: HostileTypeId::new(0),
        }, Vec2::ZERO);

        let mut events = Vec::new();
        for _ in 0..2 {
            apply(
                &mut world,
                Command::Despawn {
                    handle,
                    cause: DespawnCause::Consumed,
                },
                &mut events,
            );
        }
        assert_eq!(events.len(), 1, "second despawn must not emit");
        assert_eq!(query::pool(&world).stats(ENEMY).idle, 1);
    }

    #[test]
    fn unique_square_destruction_awards_points_once() {
        let mut world = World::new();
        let handle = spawn(
            &mut world,
            UNIQUE,
            SpawnKind::UniqueSquare {
                unique: UniqueSquareTypeId::new(0),
            },
            Vec2::ZERO,
        );

        let mut events = Vec::new();
        for _ in 0..2 {
            apply(
                &mut world,
                Command::DestroyUniqueSquare { handle, points: 40 },
                &mut events,
            );
        }

        let awarded: u32 = events
            .iter()
            .filter_map(|event| match event {
                Event::PointsAwarded { points } => Some(*points),
                _ => None,
            })
            .sum();
        assert_eq!(awarded, 40);
        assert!(events.iter().any(|event| matches!(
            event,
            Event::EntityDespawned {
                disposal: Disposal::Destroyed,
                ..
            }
        )));
        assert_eq!(query::pool(&world).stats(UNIQUE).idle, 0);
    }

    #[test]
    fn zero_point_destruction_suppresses_award() {
        let mut world = World::new();
        let handle = spawn(
            &mut world,
            UNIQUE,
            SpawnKind::UniqueSquare {
                unique: UniqueSquareTypeId::new(0),
            },
            Vec2::ZERO,
        );
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::DestroyUniqueSquare { handle, points: 0 },
            &mut events,
        );
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::PointsAwarded { .. })));
        assert!(query::active_entities(&world).is_empty());
    }

    #[test]
    fn safe_zones_expire_into_their_pool() {
        let mut world = World::new();
        let shape = SafeZoneShape {
            radius: 3.0,
            lifetime: Duration::from_secs(2),
        };
        let handle = spawn(&mut world, ZONE, SpawnKind::SafeZone { shape }, Vec2::ZERO);
        assert_eq!(query::safe_zones(&world).len(), 1);

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
            &mut events,
        );
        assert_eq!(query::safe_zones(&world).len(), 1);

        events.clear();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
            &mut events,
        );
        assert!(query::safe_zones(&world).is_empty());
        assert!(events.iter().any(|event| matches!(
            event,
            Event::EntityDespawned {
                cause: DespawnCause::Expired,
                disposal: Disposal::Pooled,
                ..
            }
        )));
        assert!(query::pool(&world).is_idle(handle));
        assert_eq!(query::world_time(&world), Duration::from_secs(2));
    }

    #[test]
    fn relocation_moves_entity_and_zone_record() {
        let mut world = World::new();
        let handle = spawn(
            &mut world,
            ZONE,
            SpawnKind::SafeZone {
                shape: SafeZoneShape::default(),
            },
            Vec2::ZERO,
        );
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::RelocateEntity {
                handle,
                position: Vec2::new(5.0, 5.0),
            },
            &mut events,
        );
        assert!(events.is_empty());
        let moved = query::active_entities(&world)
            .get(handle)
            .expect("zone is active");
        assert_eq!(moved.position, Vec2::new(5.0, 5.0));
        assert!(query::safe_zones(&world).covers(Vec2::new(6.0, 5.0)));
    }

    #[test]
    fn despawn_gate_reports_only_changes() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SetDespawnEnabled { enabled: true },
            &mut events,
        );
        assert!(events.is_empty());
        apply(
            &mut world,
            Command::SetDespawnEnabled { enabled: false },
            &mut events,
        );
        assert_eq!(events, vec![Event::DespawnGateChanged { enabled: false }]);
        assert!(!query::despawn_enabled(&world));
    }

    #[test]
    fn spatial_queries_ignore_safe_zones_and_respect_borders() {
        let mut world = World::new();
        let _ = spawn(&mut world, SQUARE, normal(), Vec2::new(10.0, 0.0));
        let _ = spawn(
            &mut world,
            ZONE,
            SpawnKind::SafeZone {
                shape: SafeZoneShape::default(),
            },
            Vec2::new(-10.0, 0.0),
        );
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureBorders {
                borders: vec![Border::from_corners(
                    Vec2::new(0.0, 20.0),
                    Vec2::new(1.0, 30.0),
                )],
            },
            &mut events,
        );

        let spatial = query::spatial(&world);
        assert!(spatial.is_occupied(Vec2::new(11.0, 0.0), 2.5));
        assert!(!spatial.is_occupied(Vec2::new(-10.0, 0.0), 2.5));
        assert!(spatial.is_obstructed(Vec2::new(0.5, 18.0), 2.5));
        assert!(!spatial.is_obstructed(Vec2::new(0.5, 10.0), 2.5));
    }
}
