//! Per-chunk voxel density storage.

use glam::IVec3;
use strata_noise::InvariantError;
use strata_preset::BiomeId;

/// Edge length of a chunk, in voxels.
pub const CHUNK_SIZE: usize = 16;

/// Voxels per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Columns per chunk.
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Largest chunk coordinate magnitude on any axis. World block coordinates
/// of generable chunks and everything their features consult fit in `i32`.
pub const MAX_CHUNK_COORD: i32 = 1 << 26;

/// Reject chunks whose block coordinates could overflow.
pub fn check_chunk(chunk: IVec3) -> Result<(), InvariantError> {
    let limit = IVec3::splat(MAX_CHUNK_COORD);
    if chunk.cmpge(-limit).all() && chunk.cmple(limit).all() {
        Ok(())
    } else {
        Err(InvariantError::ChunkOutOfRange {
            chunk: chunk.to_array(),
            limit: MAX_CHUNK_COORD,
        })
    }
}

/// Densities for one 16³ chunk plus the data surface classification needs.
///
/// Positive density is solid. Local coordinates run `0..CHUNK_SIZE` on each
/// axis; `(0, 0, 0)` is the voxel at [`DensityField::world_origin`].
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    chunk: IVec3,
    densities: Vec<f64>,
    gradients: Vec<f64>,
    biomes: Vec<BiomeId>,
}

#[inline]
fn voxel_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE);
    (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
}

#[inline]
fn column_index(x: usize, z: usize) -> usize {
    debug_assert!(x < CHUNK_SIZE && z < CHUNK_SIZE);
    z * CHUNK_SIZE + x
}

impl DensityField {
    /// An all-empty field for `chunk`.
    pub fn new(chunk: IVec3) -> Self {
        Self {
            chunk,
            densities: vec![0.0; CHUNK_VOLUME],
            gradients: vec![0.0; CHUNK_VOLUME],
            biomes: vec![BiomeId::UNKNOWN; CHUNK_AREA],
        }
    }

    pub fn chunk(&self) -> IVec3 {
        self.chunk
    }

    /// World block coordinate of local voxel `(0, 0, 0)`.
    pub fn world_origin(&self) -> IVec3 {
        self.chunk * CHUNK_SIZE as i32
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.densities[voxel_index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, density: f64) {
        self.densities[voxel_index(x, y, z)] = density;
    }

    /// Lower the density at a voxel to at most `density`.
    pub fn carve_to(&mut self, x: usize, y: usize, z: usize, density: f64) {
        let slot = &mut self.densities[voxel_index(x, y, z)];
        *slot = slot.min(density);
    }

    /// Vertical density derivative at a voxel, per block.
    pub fn gradient(&self, x: usize, y: usize, z: usize) -> f64 {
        self.gradients[voxel_index(x, y, z)]
    }

    pub fn set_gradient(&mut self, x: usize, y: usize, z: usize, gradient: f64) {
        self.gradients[voxel_index(x, y, z)] = gradient;
    }

    /// Dominant biome of a column.
    pub fn biome(&self, x: usize, z: usize) -> BiomeId {
        self.biomes[column_index(x, z)]
    }

    pub fn set_biome(&mut self, x: usize, z: usize, biome: BiomeId) {
        self.biomes[column_index(x, z)] = biome;
    }

    pub fn is_solid(&self, x: usize, y: usize, z: usize) -> bool {
        self.get(x, y, z) > 0.0
    }

    pub fn solid_count(&self) -> usize {
        self.densities.iter().filter(|&&d| d > 0.0).count()
    }

    /// Raw densities in `(y, z, x)` order, x fastest.
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }
}
