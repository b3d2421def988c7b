//! Surface classification and material resolution.
//!
//! A solid voxel's depth below the terrain surface is estimated from its
//! density and vertical gradient, `density / -∂density/∂y`. The host maps
//! each (class, depth, biome) to its own block type through a
//! [`MaterialResolver`].

use strata_preset::{BiomeId, GeneratorPreset};

use crate::density::{CHUNK_SIZE, DensityField};

/// Smallest downward gradient used when estimating depth, so flat or
/// overhanging density never divides by zero.
const MIN_GRADIENT: f64 = 1e-3;

/// Coarse role of a voxel in the terrain column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelClass {
    Air,
    /// Empty, below the water level.
    Liquid,
    /// The topmost solid block.
    Surface,
    /// Solid, within the biome's surface depth.
    Subsurface,
    /// Solid bulk below the surface layers.
    Filler,
}

impl VoxelClass {
    pub fn is_solid(self) -> bool {
        matches!(self, Self::Surface | Self::Subsurface | Self::Filler)
    }
}

/// Host-supplied mapping from classified voxels to block types.
pub trait MaterialResolver {
    type Material;

    fn resolve(&self, density: f64, depth: f64, biome: BiomeId, class: VoxelClass) -> Self::Material;
}

/// Estimated depth, in blocks, below the surface. Zero or negative for empty voxels.
pub fn surface_depth(field: &DensityField, x: usize, y: usize, z: usize) -> f64 {
    let density = field.get(x, y, z);
    density / (-field.gradient(x, y, z)).max(MIN_GRADIENT)
}

/// Classify one voxel of a field sampled under `preset`.
pub fn classify(
    field: &DensityField,
    preset: &GeneratorPreset,
    x: usize,
    y: usize,
    z: usize,
) -> VoxelClass {
    if !field.is_solid(x, y, z) {
        let world_y = f64::from(field.world_origin().y + y as i32);
        return match preset.terrain.water_level {
            Some(level) if world_y < level => VoxelClass::Liquid,
            _ => VoxelClass::Air,
        };
    }

    let depth = surface_depth(field, x, y, z);
    let layer = preset.biome(field.biome(x, z)).surface_depth;
    if depth <= 1.0 {
        VoxelClass::Surface
    } else if depth <= 1.0 + layer {
        VoxelClass::Subsurface
    } else {
        VoxelClass::Filler
    }
}

/// Resolve every voxel of `field`, in the field's `(y, z, x)` order.
pub fn resolve_materials<R: MaterialResolver>(
    field: &DensityField,
    preset: &GeneratorPreset,
    resolver: &R,
) -> Vec<R::Material> {
    let mut out = Vec::with_capacity(CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE);
    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let class = classify(field, preset, x, y, z);
                out.push(resolver.resolve(
                    field.get(x, y, z),
                    surface_depth(field, x, y, z),
                    field.biome(x, z),
                    class,
                ));
            }
        }
    }
    out
}
