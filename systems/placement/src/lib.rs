#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rejection-sampling placement validator for annulus spawn positions.
//!
//! Candidates are drawn uniformly by angle and distance inside the annulus
//! around a centre, then filtered in order by the optional bounds rectangle,
//! the coherent-noise density field, physical overlap, border obstruction,
//! and safe-zone exclusion. The first candidate that passes every check wins.

use std::{f32::consts::TAU, fmt};

use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use square_field_core::{SafeZoneFootprint, SpatialQuery, Vec2, ViewRect};

/// Tuning knobs for the placement validator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementTuning {
    /// Candidates generated per call before giving up.
    pub max_position_tries: u32,
    /// Scale applied to world positions before sampling the density field.
    pub noise_scale: f32,
    /// Minimum density a candidate needs; zero or less disables the check.
    pub noise_threshold: f32,
    /// Radius used for overlap and obstruction queries.
    pub overlap_check_radius: f32,
    /// Extra distance kept clear around every safe zone.
    pub safe_zone_exclusion_margin: f32,
}

impl Default for PlacementTuning {
    fn default() -> Self {
        Self {
            max_position_tries: 10,
            noise_scale: 0.05,
            noise_threshold: 0.4,
            overlap_check_radius: 2.5,
            safe_zone_exclusion_margin: 2.0,
        }
    }
}

/// Seeded coherent-noise field remapped to `[0, 1]`.
#[derive(Clone)]
pub struct DensityField {
    perlin: Perlin,
    scale: f32,
    threshold: f32,
}

impl DensityField {
    /// Creates a density field sampling Perlin noise seeded with `seed`.
    #[must_use]
    pub fn new(seed: u32, scale: f32, threshold: f32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            scale,
            threshold,
        }
    }

    /// Density at `position` within `[0, 1]`.
    #[must_use]
    pub fn sample(&self, position: Vec2) -> f32 {
        let scaled = position * self.scale;
        let value = self.perlin.get([f64::from(scaled.x), f64::from(scaled.y)]);
        (((value + 1.0) * 0.5) as f32).clamp(0.0, 1.0)
    }

    /// Reports whether `position` is dense enough to host a spawn.
    #[must_use]
    pub fn admits(&self, position: Vec2) -> bool {
        self.threshold <= 0.0 || self.sample(position) >= self.threshold
    }
}

impl fmt::Debug for DensityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DensityField")
            .field("scale", &self.scale)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Annulus and optional clip rectangle a position is requested in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRequest {
    /// Centre of the annulus, usually the player position.
    pub center: Vec2,
    /// Inner radius of the annulus.
    pub min_radius: f32,
    /// Outer radius of the annulus.
    pub max_radius: f32,
    /// Rectangle every accepted position must lie in.
    pub bounds: Option<ViewRect>,
}

/// World state consulted while validating candidates.
#[derive(Clone, Copy, Debug)]
pub struct PlacementContext<'a, S> {
    /// Radius queries against placed entities and borders.
    pub spatial: &'a S,
    /// Active safe zones plus zones accepted earlier in the current cycle.
    pub safe_zones: &'a [SafeZoneFootprint],
    /// Positions accepted earlier in the current cycle but not applied yet.
    pub pending: &'a [Vec2],
}

impl<S: SpatialQuery> PlacementContext<'_, S> {
    fn is_occupied(&self, point: Vec2, radius: f32) -> bool {
        let radius_sq = radius * radius;
        self.spatial.is_occupied(point, radius)
            || self
                .pending
                .iter()
                .any(|pending| pending.distance_squared(point) < radius_sq)
    }
}

/// Rejection counters accumulated across calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    /// Candidates generated.
    pub candidates: u64,
    /// Candidates outside the bounds rectangle.
    pub outside_bounds: u64,
    /// Candidates below the density threshold.
    pub too_sparse: u64,
    /// Candidates overlapping a placed or pending entity.
    pub overlapping: u64,
    /// Candidates touching border geometry.
    pub obstructed: u64,
    /// Candidates inside a safe zone's exclusion radius.
    pub inside_safe_zone: u64,
    /// Calls that returned a position.
    pub placed: u64,
    /// Calls that exhausted their budget.
    pub exhausted: u64,
}

/// Placement validator owning its random stream and density field.
#[derive(Debug)]
pub struct Placement {
    tuning: PlacementTuning,
    rng: ChaCha8Rng,
    density: DensityField,
    stats: PlacementStats,
}

impl Placement {
    /// Creates a validator whose candidates come from `rng_seed` and whose
    /// density field is seeded with `noise_seed`.
    #[must_use]
    pub fn new(tuning: PlacementTuning, rng_seed: u64, noise_seed: u32) -> Self {
        Self {
            tuning,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
            density: DensityField::new(noise_seed, tuning.noise_scale, tuning.noise_threshold),
            stats: PlacementStats::default(),
        }
    }

    /// Tuning the validator was created with.
    #[must_use]
    pub const fn tuning(&self) -> &PlacementTuning {
        &self.tuning
    }

    /// Counters accumulated since construction.
    #[must_use]
    pub const fn stats(&self) -> PlacementStats {
        self.stats
    }

    /// Searches for a position satisfying every placement rule.
    ///
    /// Returns `None` once `max_position_tries` candidates were rejected or when
    /// the annulus is empty or unbounded.
    pub fn try_find_position<S: SpatialQuery>(
        &mut self,
        request: PlacementRequest,
        context: PlacementContext<'_, S>,
    ) -> Option<Vec2> {
        if !request.min_radius.is_finite()
            || !request.max_radius.is_finite()
            || request.max_radius < request.min_radius
            || request.min_radius < 0.0
        {
            self.stats.exhausted += 1;
            return None;
        }

        for _ in 0..self.tuning.max_position_tries {
            let candidate = self.sample_annulus(&request);
            self.stats.candidates += 1;
            if self.accepts(candidate, &request, &context) {
                self.stats.placed += 1;
                return Some(candidate);
            }
        }

        self.stats.exhausted += 1;
        None
    }

    fn sample_annulus(&mut self, request: &PlacementRequest) -> Vec2 {
        let angle = self.rng.gen_range(0.0..TAU);
        let distance = self
            .rng
            .gen_range(request.min_radius..=request.max_radius);
        request.center + Vec2::from_angle(angle) * distance
    }

    fn accepts<S: SpatialQuery>(
        &mut self,
        candidate: Vec2,
        request: &PlacementRequest,
        context: &PlacementContext<'_, S>,
    ) -> bool {
        let radius = self.tuning.overlap_check_radius;
        let margin = self.tuning.safe_zone_exclusion_margin;

        if request
            .bounds
            .is_some_and(|bounds| !bounds.contains(candidate))
        {
            self.stats.outside_bounds += 1;
            return false;
        }
        if !self.density.admits(candidate) {
            self.stats.too_sparse += 1;
            return false;
        }
        if context.is_occupied(candidate, radius) {
            self.stats.overlapping += 1;
            return false;
        }
        if context.spatial.is_obstructed(candidate, radius) {
            self.stats.obstructed += 1;
            return false;
        }
        if context
            .safe_zones
            .iter()
            .any(|zone| zone.excludes(candidate, margin))
        {
            self.stats.inside_safe_zone += 1;
            return false;
        }
        true
    }
}
