//! TOML configuration file mapped onto session tuning and spawn tables.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use square_field_core::{
    HostileEnemyEntry, SafeZoneShape, SafeZoneType, SpawnTables, SquareType, TemplateId,
    UniqueSquareType,
};
use square_field_session::{RadiusProfile, SessionTuning};

const DEFAULT_SQUARE_TEMPLATE: u32 = 0;
const DEFAULT_SAFE_ZONE_TEMPLATE: u32 = 30;

/// Parsed contents of a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) seed: Option<u64>,
    square_template: Option<u32>,
    spawning: SpawningSection,
    placement: PlacementSection,
    difficulty: DifficultySection,
    despawn: DespawnSection,
    prewarm: PrewarmSection,
    safe_zone: Option<SafeZoneSection>,
    squares: Vec<SquareType>,
    unique_squares: Vec<UniqueSquareType>,
    hostiles: Vec<HostileSection>,
    profiles: ProfilesSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SpawningSection {
    interval: Option<f64>,
    distance_threshold: Option<f32>,
    slots_per_cycle: Option<u32>,
    no_spawn_radius: Option<f32>,
    spawn_radius: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PlacementSection {
    max_position_tries: Option<u32>,
    noise_scale: Option<f32>,
    noise_threshold: Option<f32>,
    overlap_check_radius: Option<f32>,
    safe_zone_exclusion_margin: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DifficultySection {
    initial_safe_zone_chance: Option<f32>,
    initial_hostile_chance: Option<f32>,
    minimum_safe_zone_chance: Option<f32>,
    maximum_hostile_chance: Option<f32>,
    safe_zone_decay_rate: Option<f32>,
    hostile_growth_rate: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DespawnSection {
    interval: Option<f64>,
    radius: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PrewarmSection {
    normal_squares: Option<u32>,
    per_hostile_template: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SafeZoneSection {
    template: Option<u32>,
    radius: Option<f32>,
    lifetime: Option<f64>,
    pool_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostileSection {
    name: String,
    #[serde(default)]
    template: Option<TemplateId>,
    weight: f32,
    cooldown: f64,
    #[serde(default)]
    minimum_world_time: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProfilesSection {
    handheld: RadiusOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RadiusOverrides {
    spawn_radius: Option<f32>,
    no_spawn_radius: Option<f32>,
    despawn_radius: Option<f32>,
}

impl FileConfig {
    /// Reads and parses the configuration file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid config file at {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config toml contents")
    }

    /// Session tuning with the file's overrides and the profile's radii applied.
    pub(crate) fn tuning(&self, profile: RadiusProfile) -> Result<SessionTuning> {
        let mut tuning = SessionTuning::for_profile(profile);

        let spawning = &mut tuning.spawning;
        if let Some(interval) = self.spawning.interval {
            spawning.spawn_interval = seconds("spawning.interval", interval)?;
        }
        overlay(&mut spawning.spawn_distance_threshold, self.spawning.distance_threshold);
        overlay(&mut spawning.slots_per_cycle, self.spawning.slots_per_cycle);
        overlay(&mut spawning.no_spawn_radius, self.spawning.no_spawn_radius);
        overlay(&mut spawning.spawn_radius, self.spawning.spawn_radius);

        let placement = &mut tuning.placement;
        overlay(&mut placement.max_position_tries, self.placement.max_position_tries);
        overlay(&mut placement.noise_scale, self.placement.noise_scale);
        overlay(&mut placement.noise_threshold, self.placement.noise_threshold);
        overlay(
            &mut placement.overlap_check_radius,
            self.placement.overlap_check_radius,
        );
        overlay(
            &mut placement.safe_zone_exclusion_margin,
            self.placement.safe_zone_exclusion_margin,
        );

        let difficulty = &mut tuning.difficulty;
        let section = &self.difficulty;
        overlay(
            &mut difficulty.initial_safe_zone_chance,
            section.initial_safe_zone_chance,
        );
        overlay(
            &mut difficulty.initial_hostile_chance,
            section.initial_hostile_chance,
        );
        overlay(
            &mut difficulty.minimum_safe_zone_chance,
            section.minimum_safe_zone_chance,
        );
        overlay(
            &mut difficulty.maximum_hostile_chance,
            section.maximum_hostile_chance,
        );
        overlay(&mut difficulty.safe_zone_decay_rate, section.safe_zone_decay_rate);
        overlay(&mut difficulty.hostile_growth_rate, section.hostile_growth_rate);

        if let Some(interval) = self.despawn.interval {
            tuning.despawn.interval = seconds("despawn.interval", interval)?;
        }
        overlay(&mut tuning.despawn.despawn_radius, self.despawn.radius);

        overlay(
            &mut tuning.prewarm.normal_squares,
            self.prewarm.normal_squares,
        );
        overlay(
            &mut tuning.prewarm.per_hostile_template,
            self.prewarm.per_hostile_template,
        );

        if profile == RadiusProfile::Handheld {
            let handheld = &self.profiles.handheld;
            overlay(&mut tuning.spawning.spawn_radius, handheld.spawn_radius);
            overlay(&mut tuning.spawning.no_spawn_radius, handheld.no_spawn_radius);
            overlay(&mut tuning.despawn.despawn_radius, handheld.despawn_radius);
        }

        Ok(tuning)
    }

    /// Spawn tables from the file, or the built-in demo tables when it lists no types.
    pub(crate) fn tables(&self) -> Result<SpawnTables> {
        if self.squares.is_empty() && self.unique_squares.is_empty() && self.hostiles.is_empty() {
            let mut tables = demo_tables();
            if let Some(section) = &self.safe_zone {
                tables.safe_zone = Some(safe_zone(section)?);
            }
            return Ok(tables);
        }

        let hostiles = self
            .hostiles
            .iter()
            .map(|hostile| {
                Ok(HostileEnemyEntry {
                    name: hostile.name.clone(),
                    template: hostile.template,
                    weight: hostile.weight,
                    cooldown: seconds("hostiles.cooldown", hostile.cooldown)?,
                    minimum_world_time: seconds(
                        "hostiles.minimum_world_time",
                        hostile.minimum_world_time,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SpawnTables {
            square_template: Some(TemplateId::new(
                self.square_template.unwrap_or(DEFAULT_SQUARE_TEMPLATE),
            )),
            squares: self.squares.clone(),
            unique_squares: self.unique_squares.clone(),
            hostiles,
            safe_zone: self.safe_zone.as_ref().map(safe_zone).transpose()?,
        })
    }
}

fn overlay<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    if value < 0.0 {
        bail!("{name} must be a non-negative number of seconds, got {value}");
    }
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{name} is not a representable number of seconds: {value}"))
}

fn safe_zone(section: &SafeZoneSection) -> Result<SafeZoneType> {
    let defaults = SafeZoneShape::default();
    let lifetime = match section.lifetime {
        Some(lifetime) => seconds("safe_zone.lifetime", lifetime)?,
        None => defaults.lifetime,
    };
    Ok(SafeZoneType {
        template: TemplateId::new(section.template.unwrap_or(DEFAULT_SAFE_ZONE_TEMPLATE)),
        shape: SafeZoneShape {
            radius: section.radius.unwrap_or(defaults.radius),
            lifetime,
        },
        pool_size: section.pool_size.unwrap_or(2),
    })
}

/// Tables used when no configuration file lists any spawn types.
pub(crate) fn demo_tables() -> SpawnTables {
    let square = |name: &str, point_value, damages_on_contact, weight| SquareType {
        name: name.to_owned(),
        point_value,
        damages_on_contact,
        contact_damage: u32::from(damages_on_contact),
        weight,
    };
    let unique = |name: &str, template, weight| UniqueSquareType {
        name: name.to_owned(),
        template: Some(TemplateId::new(template)),
        point_value: 50,
        damages_on_contact: false,
        contact_damage: 0,
        weight,
    };
    let hostile = |name: &str, template, weight, cooldown, minimum| HostileEnemyEntry {
        name: name.to_owned(),
        template: Some(TemplateId::new(template)),
        weight,
        cooldown: Duration::from_secs(cooldown),
        minimum_world_time: Duration::from_secs(minimum),
    };

    SpawnTables {
        square_template: Some(TemplateId::new(DEFAULT_SQUARE_TEMPLATE)),
        squares: vec![
            square("plain", 10, false, 0.55),
            square("golden", 25, false, 0.1),
            square("spiked", 5, true, 0.1),
        ],
        unique_squares: vec![unique("magnet", 10, 0.05), unique("shield", 11, 0.05)],
        hostiles: vec![
            hostile("chaser", 20, 0.1, 3, 30),
            hostile("spinner", 21, 0.05, 5, 60),
        ],
        safe_zone: Some(SafeZoneType {
            template: TemplateId::new(DEFAULT_SAFE_ZONE_TEMPLATE),
            shape: SafeZoneShape::default(),
            pool_size: 2,
        }),
    }
}
