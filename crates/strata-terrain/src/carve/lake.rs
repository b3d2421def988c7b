//! Lakes.
//!
//! Each lake type rolls one candidate column per origin chunk. Where the
//! column has a surface inside its chunk the lake sits on it and the surface
//! chance curve decides; otherwise the candidate block must be solid rock and
//! the main chance curve decides. An accepted lake carves a flat-topped basin
//! below its liquid level. Surfaces come from the uncarved terrain, so a lake
//! carves the same basin in every chunk it touches.

use std::collections::BTreeMap;

use glam::{DVec3, IVec3};
use rand::Rng;
use strata_noise::{Curve, InvariantError, StreamTag, chunk_rng, derive_seed};
use strata_preset::{BiomeId, LakeSettings};

use super::structure::surface_in_chunk;
use super::{carve_shape, origins_around};
use crate::density::{CHUNK_SIZE, DensityField};
use crate::sampler::DensitySampler;

/// A lake whose centre column lies inside the generated chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct LakeRecord {
    pub lake: String,
    /// Index of the lake type in the preset.
    pub index: usize,
    /// Centre block of the liquid surface.
    pub center: IVec3,
    /// Empty blocks below this height inside the basin hold liquid.
    pub liquid_level: i32,
    pub radius: f64,
    pub depth: f64,
    /// Whether the lake was placed in rock rather than on the surface.
    pub underground: bool,
}

struct LakeType {
    settings: LakeSettings,
    surface_chance: Option<Curve>,
    main_chance: Option<Curve>,
}

/// Carves every lake type of a preset.
pub struct LakeCarver {
    lakes: Vec<LakeType>,
}

impl LakeCarver {
    /// Chance curves are looked up in `curves`; a missing name disables
    /// that placement mode.
    pub fn new(lakes: Vec<LakeSettings>, curves: &BTreeMap<String, Curve>) -> Self {
        let lookup = |name: &Option<String>| name.as_ref().and_then(|n| curves.get(n)).cloned();
        let lakes = lakes
            .into_iter()
            .map(|settings| LakeType {
                surface_chance: lookup(&settings.surface_chance),
                main_chance: lookup(&settings.main_chance),
                settings,
            })
            .collect();
        Self { lakes }
    }

    pub fn is_empty(&self) -> bool {
        self.lakes.is_empty()
    }

    /// Carve every lake reaching the chunk `field` covers and report the
    /// lakes centred in it.
    pub fn carve(
        &self,
        sampler: &DensitySampler,
        field: &mut DensityField,
        seed: u64,
    ) -> Result<Vec<LakeRecord>, InvariantError> {
        let mut records = Vec::new();
        for (index, lake) in self.lakes.iter().enumerate() {
            let lake_seed = derive_seed(seed, index as u32);
            for origin in origins_around(field.chunk(), 1) {
                let Some(record) = lake.roll(sampler, lake_seed, origin, index)? else {
                    continue;
                };
                let center = record.center.as_dvec3() + DVec3::new(0.5, 0.0, 0.5);
                carve_shape(
                    field,
                    center,
                    record.radius,
                    record.depth,
                    lake.settings.strength,
                    basin,
                );
                if origin == field.chunk() {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

impl LakeType {
    /// The lake `origin` proposes, if its roll succeeds.
    fn roll(
        &self,
        sampler: &DensitySampler,
        seed: u64,
        origin: IVec3,
        index: usize,
    ) -> Result<Option<LakeRecord>, InvariantError> {
        let size = CHUNK_SIZE as i32;
        let mut rng = chunk_rng(seed, origin.to_array(), StreamTag::LAKES);
        let roll = rng.random::<f64>();
        let column = origin * size
            + IVec3::new(
                rng.random_range(0..size),
                rng.random_range(0..size),
                rng.random_range(0..size),
            );
        if self.surface_chance.is_none() && self.main_chance.is_none() {
            return Ok(None);
        }
        if !self.biome_allowed(sampler, column) {
            return Ok(None);
        }

        let (level, chance, underground) =
            match surface_in_chunk(sampler, column.x, origin.y * size, column.z)? {
                Some(level) => (level, self.surface_chance.as_ref(), false),
                None if sampler.density_at(column)? > 0.0 => (column.y, self.main_chance.as_ref(), true),
                None => return Ok(None),
            };
        let Some(curve) = chance else {
            return Ok(None);
        };
        if roll >= curve.sample(f64::from(level)).clamp(0.0, 1.0) {
            return Ok(None);
        }
        Ok(Some(LakeRecord {
            lake: self.settings.name.clone(),
            index,
            center: IVec3::new(column.x, level, column.z),
            liquid_level: level,
            radius: self.settings.radius,
            depth: self.settings.depth,
            underground,
        }))
    }

    fn biome_allowed(&self, sampler: &DensitySampler, column: IVec3) -> bool {
        if self.settings.biomes.is_empty() {
            return true;
        }
        let biome = sampler.blender().dominant_biome(column.x, column.z);
        self.settings.biomes.iter().any(|&id| BiomeId(id) == biome)
    }
}

/// Lower half of an ellipsoid: everything below the liquid level.
fn basin(offset: DVec3, _y: i32) -> Option<f64> {
    (offset.y < 0.0).then(|| offset.length_squared())
}
