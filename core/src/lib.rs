#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Square Field spawning engine.
//!
//! This crate defines the message surface that connects the authoritative
//! world, the pure population systems, and the session layer. Systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to. Systems read immutable views such as
//! [`ActiveEntityView`] and [`SafeZoneView`] and respond exclusively with new
//! command batches.

use std::time::Duration;

pub use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that an instance of `template` becomes active at `position`.
    Spawn {
        /// Template the instance is drawn from.
        template: TemplateId,
        /// Category and type descriptor attached to the spawned entity.
        kind: SpawnKind,
        /// World position the entity occupies once active.
        position: Vec2,
    },
    /// Requests removal of an active entity from the registry.
    Despawn {
        /// Handle of the entity to remove.
        handle: EntityHandle,
        /// Reason reported alongside the removal.
        cause: DespawnCause,
    },
    /// Destroys a unique square and awards its point value.
    DestroyUniqueSquare {
        /// Handle of the unique square to destroy.
        handle: EntityHandle,
        /// Points awarded for the destruction. Zero suppresses the award.
        points: u32,
    },
    /// Synchronises the tracked position of an entity that moved on its own.
    RelocateEntity {
        /// Handle of the entity that moved.
        handle: EntityHandle,
        /// Latest world position of the entity.
        position: Vec2,
    },
    /// Opens or closes the periodic despawn sweep.
    SetDespawnEnabled {
        /// Whether the periodic sweep may run.
        enabled: bool,
    },
    /// Replaces the static border geometry consulted by placement.
    ConfigureBorders {
        /// Border rectangles that obstruct placement.
        borders: Vec<Border>,
    },
    /// Pre-instantiates idle instances for a template.
    PrewarmPool {
        /// Template whose pool receives the instances.
        template: TemplateId,
        /// Number of idle instances to create.
        count: u32,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an entity became active.
    EntitySpawned {
        /// Handle assigned to the active entity.
        handle: EntityHandle,
        /// Template the instance was drawn from.
        template: TemplateId,
        /// Category and type descriptor attached to the entity.
        kind: SpawnKind,
        /// Position the entity occupies.
        position: Vec2,
        /// Whether the instance was recycled from its pool.
        reused: bool,
    },
    /// Confirms that an entity left the registry.
    EntityDespawned {
        /// Handle of the removed entity.
        handle: EntityHandle,
        /// Template the instance belongs to.
        template: TemplateId,
        /// Category of the removed entity.
        category: EntityCategory,
        /// Reason for the removal.
        cause: DespawnCause,
        /// Whether the instance returned to its pool or was destroyed.
        disposal: Disposal,
    },
    /// Reports points earned by destroying a unique square.
    PointsAwarded {
        /// Number of points to credit.
        points: u32,
    },
    /// Announces that the periodic despawn gate changed.
    DespawnGateChanged {
        /// Whether the periodic sweep may now run.
        enabled: bool,
    },
}

/// Stable identity of a spawnable kind, used as the pool key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(u32);

impl TemplateId {
    /// Creates a new template identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Instance reference handed out by the entity pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(u32);

impl EntityHandle {
    /// Creates a new handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

macro_rules! table_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Creates an identifier referring to the entry at `value`.
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Retrieves the numeric representation of the identifier.
            #[must_use]
            pub const fn get(&self) -> u32 {
                self.0
            }

            /// Position of the referenced entry within its table.
            #[must_use]
            pub const fn index(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

table_index!(
    /// Index of a normal square type within [`SpawnTables::squares`].
    SquareTypeId
);
table_index!(
    /// Index of a unique square type within [`SpawnTables::unique_squares`].
    UniqueSquareTypeId
);
table_index!(
    /// Index of a hostile entry within [`SpawnTables::hostiles`].
    HostileTypeId
);

/// Broad classification that decides how an entity is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    /// Renewable collectible square drawn from the shared square pool.
    NormalSquare,
    /// Square carrying an ability; destroyed rather than pooled.
    UniqueSquare,
    /// Hostile enemy drawn from its type's pool.
    HostileEnemy,
    /// Transient safe area that excludes other spawns.
    SafeZone,
}

impl EntityCategory {
    /// Reports whether instances of the category return to a pool on despawn.
    #[must_use]
    pub const fn is_pooled(self) -> bool {
        !matches!(self, Self::UniqueSquare)
    }

    /// Reports whether the category is one of the collectible squares.
    #[must_use]
    pub const fn is_square(self) -> bool {
        matches!(self, Self::NormalSquare | Self::UniqueSquare)
    }
}

/// Radius and lifetime that define a safe zone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeZoneShape {
    /// Radius inside which other spawns are excluded.
    pub radius: f32,
    /// Time the zone stays active before expiring.
    pub lifetime: Duration,
}

impl Default for SafeZoneShape {
    fn default() -> Self {
        Self {
            radius: 3.0,
            lifetime: Duration::from_secs(30),
        }
    }
}

/// Category plus the type descriptor an entity receives when it spawns.
///
/// Behaviours that need to know which table entry they represent read the
/// descriptor from here instead of inspecting the entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpawnKind {
    /// Normal square of the referenced type.
    NormalSquare {
        /// Square type the entity was initialised with.
        square: SquareTypeId,
    },
    /// Unique square of the referenced type.
    UniqueSquare {
        /// Unique type the entity was initialised with.
        unique: UniqueSquareTypeId,
    },
    /// Hostile enemy of the referenced entry.
    HostileEnemy {
        /// Hostile entry the entity was spawned from.
        hostile: HostileTypeId,
    },
    /// Safe zone with the provided shape.
    SafeZone {
        /// Radius and lifetime of the zone.
        shape: SafeZoneShape,
    },
}

impl SpawnKind {
    /// Category the kind belongs to.
    #[must_use]
    pub const fn category(&self) -> EntityCategory {
        match self {
            Self::NormalSquare { .. } => EntityCategory::NormalSquare,
            Self::UniqueSquare { .. } => EntityCategory::UniqueSquare,
            Self::HostileEnemy { .. } => EntityCategory::HostileEnemy,
            Self::SafeZone { .. } => EntityCategory::SafeZone,
        }
    }
}

/// Reasons an entity leaves the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DespawnCause {
    /// The entity drifted beyond the despawn radius.
    OutOfRange,
    /// A collaborator consumed or destroyed the entity.
    Consumed,
    /// The entity's lifetime ran out.
    Expired,
    /// The square ended up inside an active safe zone.
    InsideSafeZone,
}

/// How a removed instance was disposed of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposal {
    /// The instance returned to its template's pool.
    Pooled,
    /// The instance was destroyed and its handle retired.
    Destroyed,
}

/// Entity currently tracked by the registry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveEntity {
    /// Handle allocated by the pool.
    pub handle: EntityHandle,
    /// Template the instance was drawn from.
    pub template: TemplateId,
    /// Category and type descriptor attached at spawn.
    pub kind: SpawnKind,
    /// Last known world position.
    pub position: Vec2,
}

impl ActiveEntity {
    /// Category of the entity.
    #[must_use]
    pub const fn category(&self) -> EntityCategory {
        self.kind.category()
    }
}

/// Read-only view of the active entity registry in insertion order.
#[derive(Clone, Copy, Debug)]
pub struct ActiveEntityView<'a> {
    entities: &'a [ActiveEntity],
}

impl<'a> ActiveEntityView<'a> {
    /// Captures a new view backed by the provided registry slice.
    #[must_use]
    pub const fn new(entities: &'a [ActiveEntity]) -> Self {
        Self { entities }
    }

    /// Iterator over the active entities in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a ActiveEntity> + 'a {
        self.entities.iter()
    }

    /// Underlying registry slice.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [ActiveEntity] {
        self.entities
    }

    /// Number of active entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entities.len()
    }

    /// Reports whether the registry is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up the active entity with the provided handle.
    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&'a ActiveEntity> {
        self.entities.iter().find(|entity| entity.handle == handle)
    }

    /// Counts the active entities that belong to `category`.
    #[must_use]
    pub fn count(&self, category: EntityCategory) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.category() == category)
            .count()
    }
}

/// Position and radius of a safe zone used for exclusion checks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeZoneFootprint {
    /// Centre of the zone.
    pub position: Vec2,
    /// Radius of the zone, excluding any placement margin.
    pub radius: f32,
}

impl SafeZoneFootprint {
    /// Reports whether `point` lies strictly inside the zone grown by `margin`.
    #[must_use]
    pub fn excludes(&self, point: Vec2, margin: f32) -> bool {
        self.position.distance(point) < self.radius + margin
    }
}

/// Bookkeeping for a safe zone that is currently active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeZoneRecord {
    /// Handle of the safe zone entity.
    pub handle: EntityHandle,
    /// Centre of the zone.
    pub position: Vec2,
    /// Radius of the zone.
    pub radius: f32,
    /// Time left before the zone expires.
    pub remaining: Duration,
}

impl SafeZoneRecord {
    /// Position and radius of the zone.
    #[must_use]
    pub const fn footprint(&self) -> SafeZoneFootprint {
        SafeZoneFootprint {
            position: self.position,
            radius: self.radius,
        }
    }
}

/// Read-only view of the active safe zones.
#[derive(Clone, Copy, Debug)]
pub struct SafeZoneView<'a> {
    zones: &'a [SafeZoneRecord],
}

impl<'a> SafeZoneView<'a> {
    /// Captures a new view backed by the provided records.
    #[must_use]
    pub const fn new(zones: &'a [SafeZoneRecord]) -> Self {
        Self { zones }
    }

    /// Iterator over the active safe zones.
    pub fn iter(&self) -> impl Iterator<Item = &'a SafeZoneRecord> + 'a {
        self.zones.iter()
    }

    /// Iterator over the footprints of the active safe zones.
    pub fn footprints(&self) -> impl Iterator<Item = SafeZoneFootprint> + 'a {
        self.zones.iter().map(SafeZoneRecord::footprint)
    }

    /// Number of active safe zones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.zones.len()
    }

    /// Reports whether no safe zone is active.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Reports whether any active zone covers `point`.
    #[must_use]
    pub fn covers(&self, point: Vec2) -> bool {
        self.zones
            .iter()
            .any(|zone| zone.footprint().excludes(point, 0.0))
    }
}

/// Axis-aligned rectangle of static boundary geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Border {
    min: Vec2,
    max: Vec2,
}

impl Border {
    /// Creates a border spanning the two provided corners in any order.
    #[must_use]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Lower-left corner of the border.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper-right corner of the border.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Reports whether the circle at `center` with `radius` touches the border.
    #[must_use]
    pub fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }
}

/// View rectangle used to clip the initial population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewRect {
    center: Vec2,
    width: f32,
    height: f32,
}

impl ViewRect {
    /// Creates a rectangle centred on `center` with the provided extent.
    #[must_use]
    pub const fn new(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            center,
            width,
            height,
        }
    }

    /// Centre of the rectangle.
    #[must_use]
    pub const fn center(&self) -> Vec2 {
        self.center
    }

    /// Width of the rectangle in world units.
    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Height of the rectangle in world units.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Reports whether both extents are positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Reports whether `point` lies inside the rectangle, edges included.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        let half_width = self.width / 2.0;
        let half_height = self.height / 2.0;
        point.x >= self.center.x - half_width
            && point.x <= self.center.x + half_width
            && point.y >= self.center.y - half_height
            && point.y <= self.center.y + half_height
    }
}

/// Radius queries the placement validator issues against the world.
pub trait SpatialQuery {
    /// Reports whether any placed entity lies within `radius` of `point`.
    fn is_occupied(&self, point: Vec2, radius: f32) -> bool;

    /// Reports whether static border geometry intersects the circle.
    fn is_obstructed(&self, point: Vec2, radius: f32) -> bool;
}

/// Spawn probabilities published by the difficulty ramp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultySnapshot {
    /// Probability that a slot attempts a safe zone.
    pub safe_zone_chance: f32,
    /// Probability that a slot attempts a hostile enemy.
    pub hostile_chance: f32,
}

/// Normal square type drawn from the shared square pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SquareType {
    /// Display name of the type.
    pub name: String,
    /// Points awarded when collected.
    #[serde(default)]
    pub point_value: u32,
    /// Whether touching the square damages the player.
    #[serde(default)]
    pub damages_on_contact: bool,
    /// Damage dealt on contact.
    #[serde(default)]
    pub contact_damage: u32,
    /// Relative spawn weight in `[0, 1]`.
    pub weight: f32,
}

/// Unique square type that carries an ability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueSquareType {
    /// Display name of the type.
    pub name: String,
    /// Template instantiated for the type; `None` disables the entry.
    #[serde(default)]
    pub template: Option<TemplateId>,
    /// Points awarded when collected.
    #[serde(default)]
    pub point_value: u32,
    /// Whether touching the square damages the player.
    #[serde(default)]
    pub damages_on_contact: bool,
    /// Damage dealt on contact.
    #[serde(default)]
    pub contact_damage: u32,
    /// Relative spawn weight in `[0, 1]`.
    pub weight: f32,
}

/// Hostile enemy entry with its spawn gating.
#[derive(Clone, Debug, PartialEq)]
pub struct HostileEnemyEntry {
    /// Display name of the enemy.
    pub name: String,
    /// Template instantiated for the enemy; `None` disables the entry.
    pub template: Option<TemplateId>,
    /// Relative spawn weight in `[0, 1]`.
    pub weight: f32,
    /// Minimum time between two spawns of this entry.
    pub cooldown: Duration,
    /// World time before which the entry never spawns.
    pub minimum_world_time: Duration,
}

/// Safe-zone template and shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeZoneType {
    /// Template instantiated for safe zones.
    pub template: TemplateId,
    /// Radius and lifetime applied to every zone.
    pub shape: SafeZoneShape,
    /// Idle instances created when the session starts.
    pub pool_size: u32,
}

/// Static weight tables consulted by the selector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnTables {
    /// Template shared by every normal square type.
    pub square_template: Option<TemplateId>,
    /// Normal square types.
    pub squares: Vec<SquareType>,
    /// Unique square types.
    pub unique_squares: Vec<UniqueSquareType>,
    /// Hostile enemy entries.
    pub hostiles: Vec<HostileEnemyEntry>,
    /// Safe-zone configuration; `None` disables safe zones.
    pub safe_zone: Option<SafeZoneType>,
}

/// Tolerance used when comparing the grand weight total against one.
pub const WEIGHT_TOTAL_TOLERANCE: f32 = 1e-3;

impl SpawnTables {
    /// Sum of the normal square weights.
    #[must_use]
    pub fn normal_weight_total(&self) -> f32 {
        self.squares.iter().map(|square| square.weight).sum()
    }

    /// Sum of the unique square weights.
    #[must_use]
    pub fn unique_weight_total(&self) -> f32 {
        self.unique_squares.iter().map(|unique| unique.weight).sum()
    }

    /// Sum of the hostile entry weights.
    #[must_use]
    pub fn hostile_weight_total(&self) -> f32 {
        self.hostiles.iter().map(|hostile| hostile.weight).sum()
    }

    /// Compares the grand weight total across every category against one.
    #[must_use]
    pub fn audit_weights(&self) -> WeightAudit {
        let total =
            self.normal_weight_total() + self.unique_weight_total() + self.hostile_weight_total();
        if total > 1.0 + WEIGHT_TOTAL_TOLERANCE {
            WeightAudit::Exceeds { total }
        } else if (total - 1.0).abs() > WEIGHT_TOTAL_TOLERANCE {
            WeightAudit::Short { total }
        } else {
            WeightAudit::Balanced
        }
    }

    /// Checks that every weight lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), TableError> {
        let weights = self
            .squares
            .iter()
            .map(|square| (square.name.as_str(), square.weight))
            .chain(
                self.unique_squares
                    .iter()
                    .map(|unique| (unique.name.as_str(), unique.weight)),
            )
            .chain(
                self.hostiles
                    .iter()
                    .map(|hostile| (hostile.name.as_str(), hostile.weight)),
            );

        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(TableError::WeightOutOfRange {
                    name: name.to_owned(),
                    weight,
                });
            }
        }
        Ok(())
    }

    /// Lists every entry that cannot spawn because its template is missing.
    #[must_use]
    pub fn missing_templates(&self) -> Vec<TableError> {
        let mut missing = Vec::new();
        if self.square_template.is_none() && !self.squares.is_empty() {
            missing.push(TableError::MissingTemplate {
                category: EntityCategory::NormalSquare,
                name: String::from("normal squares"),
            });
        }
        for unique in self.unique_squares.iter().filter(|u| u.template.is_none()) {
            missing.push(TableError::MissingTemplate {
                category: EntityCategory::UniqueSquare,
                name: unique.name.clone(),
            });
        }
        for hostile in self.hostiles.iter().filter(|h| h.template.is_none()) {
            missing.push(TableError::MissingTemplate {
                category: EntityCategory::HostileEnemy,
                name: hostile.name.clone(),
            });
        }
        missing
    }
}

/// Outcome of comparing the grand weight total against one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WeightAudit {
    /// The total matches one within [`WEIGHT_TOTAL_TOLERANCE`].
    Balanced,
    /// The total exceeds one.
    Exceeds {
        /// Grand total across all categories.
        total: f32,
    },
    /// The total falls short of one.
    Short {
        /// Grand total across all categories.
        total: f32,
    },
}

/// Configuration problems detected in the spawn tables.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TableError {
    /// An entry has no template assigned and is skipped for the session.
    #[error("{category:?} entry `{name}` has no template assigned")]
    MissingTemplate {
        /// Category of the entry.
        category: EntityCategory,
        /// Name of the entry.
        name: String,
    },
    /// A weight lies outside `[0, 1]`.
    #[error("entry `{name}` has weight {weight} outside [0, 1]")]
    WeightOutOfRange {
        /// Name of the entry.
        name: String,
        /// Offending weight.
        weight: f32,
    },
}
