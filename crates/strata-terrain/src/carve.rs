//! Deterministic feature pipeline: caves, ravines, lakes, structure
//! placement and ore veins.
//!
//! Every feature derives its randomness from `(seed, origin chunk, feature
//! tag)` and never from the chunk being generated, so a feature spanning
//! several chunks carves each of them consistently whatever order they are
//! requested in. Carving only ever lowers density, which makes overlapping
//! features commute.

mod cave;
mod lake;
mod ore;
mod ravine;
mod structure;

use std::collections::BTreeMap;

use glam::{DVec3, IVec3};
use strata_noise::{Curve, InvariantError};
use strata_preset::{FeatureSettings, MAX_FEATURE_RADIUS};

use crate::density::{CHUNK_SIZE, DensityField, check_chunk};
use crate::sampler::DensitySampler;

pub use cave::CaveCarver;
pub use lake::{LakeCarver, LakeRecord};
pub use ore::{OrePlacer, VeinRecord};
pub use ravine::RavineCarver;
pub use structure::StructurePlacer;

/// A structure accepted inside the generated chunk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlacementRecord {
    pub structure: String,
    /// Index of the structure type in the preset.
    pub index: usize,
    /// World block the structure stands on top of.
    pub position: IVec3,
    /// Quarter turns about the vertical axis, `0..4`.
    pub rotation: u8,
}

/// A carved chunk and everything the feature stage placed in it.
#[derive(Clone, Debug, PartialEq)]
pub struct CarvedChunk {
    pub field: DensityField,
    pub placements: Vec<PlacementRecord>,
    pub veins: Vec<VeinRecord>,
    pub lakes: Vec<LakeRecord>,
}

/// The full feature stage for one preset.
pub struct FeaturePipeline {
    caves: Option<CaveCarver>,
    ravines: Option<RavineCarver>,
    lakes: LakeCarver,
    structures: StructurePlacer,
    ores: OrePlacer,
}

impl FeaturePipeline {
    /// Lake chance curves are resolved against the preset's `curves`.
    pub fn new(features: &FeatureSettings, curves: &BTreeMap<String, Curve>) -> Self {
        Self {
            caves: features
                .caves
                .enabled
                .then(|| CaveCarver::new(features.caves.clone())),
            ravines: features
                .ravines
                .enabled
                .then(|| RavineCarver::new(features.ravines.clone())),
            lakes: LakeCarver::new(features.lakes.clone(), curves),
            structures: StructurePlacer::new(features.structures.clone()),
            ores: OrePlacer::new(
                features.standard_ores.clone(),
                features.periodic_gaussian_ores.clone(),
            ),
        }
    }

    /// Carve the chunk `field` covers, then place its structures and ores.
    ///
    /// Lake and structure surfaces are found on the uncarved terrain through
    /// `sampler`, so neither depends on neighbouring chunks' caves. Ores fill
    /// only blocks still solid once this chunk is carved.
    pub fn carve(
        &self,
        sampler: &DensitySampler,
        mut field: DensityField,
        seed: u64,
    ) -> Result<CarvedChunk, InvariantError> {
        check_chunk(field.chunk())?;
        if let Some(caves) = &self.caves {
            caves.carve(&mut field, seed);
        }
        if let Some(ravines) = &self.ravines {
            ravines.carve(&mut field, seed);
        }
        let lakes = if self.lakes.is_empty() {
            Vec::new()
        } else {
            self.lakes.carve(sampler, &mut field, seed)?
        };
        let placements = self.structures.place(sampler, field.chunk(), seed)?;
        let veins = if self.ores.is_empty() {
            Vec::new()
        } else {
            self.ores.place(sampler, &field, seed)
        };
        Ok(CarvedChunk {
            field,
            placements,
            veins,
            lakes,
        })
    }
}

/// Origin chunks whose features may reach `chunk`.
fn origins_around(chunk: IVec3, range: u32) -> impl Iterator<Item = IVec3> {
    let r = range as i32;
    (-r..=r).flat_map(move |dy| {
        (-r..=r).flat_map(move |dz| (-r..=r).map(move |dx| chunk + IVec3::new(dx, dy, dz)))
    })
}

/// Whether a walker at `position` with `remaining` steps left can still
/// touch the chunk `field` covers.
fn can_reach(field: &DensityField, position: DVec3, remaining: f64, radius: f64) -> bool {
    let half = CHUNK_SIZE as f64 / 2.0;
    let center = field.world_origin().as_dvec3() + DVec3::splat(half);
    let distance = (position.x - center.x).hypot(position.z - center.z);
    distance - remaining <= radius + half * std::f64::consts::SQRT_2
}

/// Lower the density of every voxel in the chunk whose normalised squared
/// distance from `center`, as computed by `metric`, is below one.
///
/// `metric` receives the voxel-centre offset divided by the radii and the
/// voxel's world y.
fn carve_shape(
    field: &mut DensityField,
    center: DVec3,
    radius_h: f64,
    radius_v: f64,
    strength: f64,
    metric: impl Fn(DVec3, i32) -> Option<f64>,
) {
    let radius_h = radius_h.min(MAX_FEATURE_RADIUS);
    let radius_v = radius_v.min(MAX_FEATURE_RADIUS);
    if radius_h <= 0.0 || radius_v <= 0.0 {
        return;
    }
    let origin = field.world_origin();
    let extent = DVec3::new(radius_h, radius_v, radius_h);
    let size = IVec3::splat(CHUNK_SIZE as i32);
    let lo = ((center - extent).floor().as_ivec3() - origin).clamp(IVec3::ZERO, size);
    let hi = ((center + extent).ceil().as_ivec3() - origin + IVec3::ONE).clamp(IVec3::ZERO, size);
    if lo.cmpge(hi).any() {
        return;
    }

    for y in lo.y..hi.y {
        for z in lo.z..hi.z {
            for x in lo.x..hi.x {
                let world = origin + IVec3::new(x, y, z);
                let offset = (world.as_dvec3() + DVec3::splat(0.5) - center) / extent;
                match metric(offset, world.y) {
                    Some(d2) if d2 < 1.0 => {
                        field.carve_to(x as usize, y as usize, z as usize, -(1.0 - d2) * strength);
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_field(chunk: IVec3) -> DensityField {
        let mut field = DensityField::new(chunk);
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    field.set(x, y, z, 10.0);
                }
            }
        }
        field
    }

    fn sphere(offset: DVec3, _y: i32) -> Option<f64> {
        Some(offset.length_squared())
    }

    #[test]
    fn test_origins_cover_cube() {
        let origins: Vec<IVec3> = origins_around(IVec3::new(1, 2, 3), 2).collect();
        assert_eq!(origins.len(), 125);
        assert!(origins.contains(&IVec3::new(-1, 0, 1)));
        assert!(origins.contains(&IVec3::new(3, 4, 5)));
    }

    #[test]
    fn test_carve_shape_stays_inside_ellipsoid() {
        let mut field = solid_field(IVec3::ZERO);
        carve_shape(&mut field, DVec3::splat(8.0), 3.0, 3.0, 1.0, sphere);
        assert!(!field.is_solid(7, 7, 7), "centre should be carved");
        assert!(field.is_solid(0, 0, 0));
        assert!(field.is_solid(8, 12, 8), "4.5 blocks away is outside radius 3");
        assert!(field.get(7, 7, 7) >= -1.0);
    }

    #[test]
    fn test_carve_shape_clips_to_chunk() {
        let mut field = solid_field(IVec3::ZERO);
        // Centre lies in the neighbouring chunk; only the overlapping rim is carved.
        carve_shape(&mut field, DVec3::new(17.0, 8.0, 8.0), 3.0, 3.0, 1.0, sphere);
        assert!(!field.is_solid(15, 7, 7));
        assert!(field.is_solid(12, 7, 7));

        let mut far = solid_field(IVec3::ZERO);
        carve_shape(&mut far, DVec3::new(40.0, 8.0, 8.0), 3.0, 3.0, 1.0, sphere);
        assert_eq!(far.solid_count(), CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE);
    }

    #[test]
    fn test_overlapping_carves_commute() {
        let a = |field: &mut DensityField| carve_shape(field, DVec3::new(6.0, 8.0, 8.0), 4.0, 3.0, 1.0, sphere);
        let b = |field: &mut DensityField| carve_shape(field, DVec3::new(9.0, 7.0, 8.0), 3.0, 5.0, 2.0, sphere);
        let mut ab = solid_field(IVec3::ZERO);
        a(&mut ab);
        b(&mut ab);
        let mut ba = solid_field(IVec3::ZERO);
        b(&mut ba);
        a(&mut ba);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_radius_clamped() {
        let mut field = solid_field(IVec3::ZERO);
        carve_shape(&mut field, DVec3::new(-30.0, 8.0, 8.0), 100.0, 100.0, 1.0, sphere);
        assert_eq!(
            field.solid_count(),
            CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE,
            "a clamped radius cannot reach 30 blocks"
        );
    }

    #[test]
    fn test_reach_check() {
        let field = DensityField::new(IVec3::ZERO);
        assert!(can_reach(&field, DVec3::new(8.0, 0.0, 8.0), 0.0, 1.0));
        assert!(!can_reach(&field, DVec3::new(200.0, 0.0, 8.0), 10.0, 3.0));
        assert!(can_reach(&field, DVec3::new(200.0, 0.0, 8.0), 190.0, 3.0));
    }
}
