//! Ore veins.
//!
//! Every ore type draws a fixed number of vein attempts from the stream of
//! the chunk a vein starts in. A kept attempt walks a short straight line
//! through a chain of ellipsoids that swell towards the middle. Veins only
//! claim blocks that are still solid after carving, and each chunk reports
//! the blocks of every vein that reaches into it.

use std::f64::consts::PI;

use glam::{DVec3, IVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_noise::hash::{det_cos, det_exp, det_sin};
use strata_noise::{StreamTag, chunk_rng, derive_seed};
use strata_preset::{BiomeId, PeriodicOreSettings, StandardOreSettings};

use super::origins_around;
use crate::density::{CHUNK_SIZE, DensityField};
use crate::sampler::DensitySampler;

/// Ore blocks one vein placed inside the generated chunk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VeinRecord {
    pub ore: String,
    /// Index of the ore type. Periodic ores are numbered after standard ones.
    pub index: usize,
    /// World blocks turned to ore, sorted by (x, y, z).
    pub blocks: Vec<IVec3>,
}

/// Height distribution of one ore type.
#[derive(Clone, Debug)]
enum Distribution {
    Uniform,
    Periodic { mean: f64, std_deviation: f64, spacing: f64 },
}

impl Distribution {
    /// Multiplier on the spawn probability at block height `y`.
    fn weight(&self, y: i32) -> f64 {
        match *self {
            Self::Uniform => 1.0,
            Self::Periodic {
                mean,
                std_deviation,
                spacing,
            } => {
                let offset = (f64::from(y) - mean).rem_euclid(spacing);
                let distance = offset.min(spacing - offset);
                det_exp(-distance * distance / (2.0 * std_deviation * std_deviation))
            }
        }
    }
}

#[derive(Clone, Debug)]
struct OreType {
    settings: StandardOreSettings,
    distribution: Distribution,
}

/// Places every ore type of a preset.
pub struct OrePlacer {
    ores: Vec<OreType>,
}

impl OrePlacer {
    pub fn new(standard: Vec<StandardOreSettings>, periodic: Vec<PeriodicOreSettings>) -> Self {
        let standard = standard.into_iter().map(|settings| OreType {
            settings,
            distribution: Distribution::Uniform,
        });
        let periodic = periodic.into_iter().map(|p| OreType {
            settings: p.ore,
            distribution: Distribution::Periodic {
                mean: p.height_mean,
                std_deviation: p.height_std_deviation,
                spacing: p.height_spacing,
            },
        });
        Self {
            ores: standard.chain(periodic).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ores.is_empty()
    }

    /// Veins reaching into the chunk `field` covers, ordered by ore type,
    /// then origin chunk, then attempt.
    pub fn place(&self, sampler: &DensitySampler, field: &DensityField, seed: u64) -> Vec<VeinRecord> {
        let mut records = Vec::new();
        for (index, ore) in self.ores.iter().enumerate() {
            let ore_seed = derive_seed(seed, index as u32);
            for origin in origins_around(field.chunk(), 1) {
                for blocks in ore.veins_from(sampler, field, ore_seed, origin) {
                    records.push(VeinRecord {
                        ore: ore.settings.name.clone(),
                        index,
                        blocks,
                    });
                }
            }
        }
        records
    }
}

impl OreType {
    fn veins_from(
        &self,
        sampler: &DensitySampler,
        field: &DensityField,
        seed: u64,
        origin: IVec3,
    ) -> Vec<Vec<IVec3>> {
        let settings = &self.settings;
        let mut rng = chunk_rng(seed, origin.to_array(), StreamTag::ORES);
        let size = CHUNK_SIZE as i32;
        let reach = vein_reach(settings.spawn_size);
        let mut veins = Vec::new();
        for _ in 0..settings.spawn_tries {
            // Every attempt draws the same values whether or not it is kept.
            let roll = rng.random::<f64>();
            let start = origin * size
                + IVec3::new(
                    rng.random_range(0..size),
                    rng.random_range(0..size),
                    rng.random_range(0..size),
                );
            let vein_seed = rng.random::<u64>();

            let y = f64::from(start.y);
            if settings.min_height.is_some_and(|min| y < min) || settings.max_height.is_some_and(|max| y > max) {
                continue;
            }
            if roll >= settings.spawn_probability * self.distribution.weight(start.y) {
                continue;
            }
            if !touches(field, start, reach) || !self.biome_allowed(sampler, start) {
                continue;
            }
            let blocks = vein_blocks(field, start, settings.spawn_size, ChaCha8Rng::seed_from_u64(vein_seed));
            if !blocks.is_empty() {
                veins.push(blocks);
            }
        }
        veins
    }

    fn biome_allowed(&self, sampler: &DensitySampler, start: IVec3) -> bool {
        if self.settings.biomes.is_empty() {
            return true;
        }
        let biome = sampler.blender().dominant_biome(start.x, start.z);
        self.settings.biomes.iter().any(|&id| BiomeId(id) == biome)
    }
}

/// Furthest a vein of `size` steps reaches from its start block.
fn vein_reach(size: u32) -> i32 {
    let size = f64::from(size);
    (size / 8.0 + size / 16.0 + 3.0).ceil() as i32
}

fn touches(field: &DensityField, start: IVec3, reach: i32) -> bool {
    let lo = field.world_origin() - IVec3::splat(reach);
    let hi = field.world_origin() + IVec3::splat(CHUNK_SIZE as i32 - 1 + reach);
    start.cmpge(lo).all() && start.cmple(hi).all()
}

/// Solid blocks of the chunk covered by one vein walk.
fn vein_blocks(field: &DensityField, start: IVec3, size: u32, mut rng: ChaCha8Rng) -> Vec<IVec3> {
    let steps = f64::from(size);
    let angle = rng.random::<f64>() * PI;
    let half = steps / 8.0;
    let base = start.as_dvec3();
    let from = DVec3::new(
        base.x + det_sin(angle) * half,
        base.y + f64::from(rng.random_range(0..3i32) - 2),
        base.z + det_cos(angle) * half,
    );
    let to = DVec3::new(
        base.x - det_sin(angle) * half,
        base.y + f64::from(rng.random_range(0..3i32) - 2),
        base.z - det_cos(angle) * half,
    );

    let mut blocks = Vec::new();
    for i in 0..size {
        let progress = f64::from(i) / steps;
        let center = from.lerp(to, progress);
        let size_factor = rng.random::<f64>() * steps / 16.0;
        let diameter = (det_sin(PI * progress) + 1.0) * size_factor + 1.0;
        ellipsoid_blocks(field, center, diameter / 2.0, &mut blocks);
    }
    blocks.sort_unstable_by_key(|b| b.to_array());
    blocks.dedup();
    blocks
}

fn ellipsoid_blocks(field: &DensityField, center: DVec3, radius: f64, out: &mut Vec<IVec3>) {
    let origin = field.world_origin();
    let size = IVec3::splat(CHUNK_SIZE as i32);
    let lo = ((center - DVec3::splat(radius)).floor().as_ivec3() - origin).clamp(IVec3::ZERO, size);
    let hi = ((center + DVec3::splat(radius)).floor().as_ivec3() - origin + IVec3::ONE).clamp(IVec3::ZERO, size);
    for y in lo.y..hi.y {
        for z in lo.z..hi.z {
            for x in lo.x..hi.x {
                let world = origin + IVec3::new(x, y, z);
                let offset = (world.as_dvec3() + DVec3::splat(0.5) - center) / radius;
                if offset.length_squared() <= 1.0 && field.is_solid(x as usize, y as usize, z as usize) {
                    out.push(world);
                }
            }
        }
    }
}
