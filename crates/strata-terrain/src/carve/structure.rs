//! Spacing-resolved structure placement.
//!
//! Every origin chunk proposes a fixed number of candidates per structure
//! type from its own stream. A candidate is valid when its column has a
//! surface inside the origin chunk and, if the type restricts biomes, an
//! allowed dominant biome. A valid candidate is accepted when no other valid
//! candidate of the same type within `spacing` outranks it. Rejected
//! candidates are dropped, never re-rolled, so the outcome for a chunk never
//! depends on which chunks were generated before it.

use glam::IVec3;
use hashbrown::HashMap;
use rand::Rng;
use strata_noise::{InvariantError, StreamTag, chunk_rng, derive_seed};
use strata_preset::{BiomeId, MAX_STRUCTURE_SPACING, StructureSettings};

use super::PlacementRecord;
use crate::density::CHUNK_SIZE;
use crate::sampler::DensitySampler;

#[derive(Clone, Copy, Debug)]
struct Candidate {
    position: IVec3,
    rotation: u8,
    priority: u64,
    attempt: u32,
}

impl Candidate {
    /// Total order used to resolve spacing conflicts; higher wins.
    fn rank(&self) -> (u64, [i32; 3], u32) {
        (self.priority, self.position.to_array(), self.attempt)
    }
}

/// Places every structure type of a preset.
pub struct StructurePlacer {
    structures: Vec<StructureSettings>,
}

impl StructurePlacer {
    pub fn new(structures: Vec<StructureSettings>) -> Self {
        Self { structures }
    }

    pub fn structures(&self) -> &[StructureSettings] {
        &self.structures
    }

    /// Structures accepted inside `chunk`, ordered by type then generation order.
    ///
    /// Fails when the terrain of any chunk whose candidates are considered
    /// cannot be sampled.
    pub fn place(
        &self,
        sampler: &DensitySampler,
        chunk: IVec3,
        seed: u64,
    ) -> Result<Vec<PlacementRecord>, InvariantError> {
        let mut records = Vec::new();
        for (index, settings) in self.structures.iter().enumerate() {
            let placer = TypePlacer {
                sampler,
                settings,
                seed: derive_seed(seed, index as u32),
                spacing: settings.spacing.clamp(f64::MIN_POSITIVE, MAX_STRUCTURE_SPACING),
                memo: HashMap::new(),
            };
            records.extend(placer.accepted(chunk)?.into_iter().map(|c| PlacementRecord {
                structure: settings.name.clone(),
                index,
                position: c.position,
                rotation: c.rotation,
            }));
        }
        Ok(records)
    }
}

struct TypePlacer<'a> {
    sampler: &'a DensitySampler,
    settings: &'a StructureSettings,
    seed: u64,
    spacing: f64,
    memo: HashMap<IVec3, Vec<Candidate>>,
}

impl TypePlacer<'_> {
    fn accepted(mut self, chunk: IVec3) -> Result<Vec<Candidate>, InvariantError> {
        let local = self.candidates(chunk)?;
        if local.is_empty() {
            return Ok(local);
        }
        let reach = (self.spacing / CHUNK_SIZE as f64).ceil() as i32;
        let mut accepted = Vec::with_capacity(local.len());
        for candidate in local {
            if !self.outranked(chunk, candidate, reach)? {
                accepted.push(candidate);
            }
        }
        Ok(accepted)
    }

    fn outranked(&mut self, chunk: IVec3, candidate: Candidate, reach: i32) -> Result<bool, InvariantError> {
        for dy in -reach..=reach {
            for dz in -reach..=reach {
                for dx in -reach..=reach {
                    let origin = chunk + IVec3::new(dx, dy, dz);
                    let beaten = self.candidates(origin)?.iter().any(|other| {
                        other.rank() > candidate.rank()
                            && (other.position - candidate.position).as_dvec3().length() < self.spacing
                    });
                    if beaten {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Valid candidates proposed by `origin`, memoised for this placement.
    fn candidates(&mut self, origin: IVec3) -> Result<Vec<Candidate>, InvariantError> {
        if let Some(found) = self.memo.get(&origin) {
            return Ok(found.clone());
        }
        let found = self.generate(origin)?;
        self.memo.insert(origin, found.clone());
        Ok(found)
    }

    fn generate(&self, origin: IVec3) -> Result<Vec<Candidate>, InvariantError> {
        let mut rng = chunk_rng(self.seed, origin.to_array(), StreamTag::STRUCTURES);
        let size = CHUNK_SIZE as i32;
        let mut out = Vec::new();
        for attempt in 0..self.settings.attempts {
            // Every attempt draws the same values whether or not it is kept.
            let roll = rng.random::<f64>();
            let x = rng.random_range(0..size);
            let z = rng.random_range(0..size);
            let rotation = rng.random_range(0..4u8);
            let priority = rng.random::<u64>();
            if roll >= self.settings.probability {
                continue;
            }

            let (wx, wz) = (origin.x * size + x, origin.z * size + z);
            if !self.biome_allowed(wx, wz) {
                continue;
            }
            if let Some(y) = surface_in_chunk(self.sampler, wx, origin.y * size, wz)? {
                out.push(Candidate {
                    position: IVec3::new(wx, y, wz),
                    rotation,
                    priority,
                    attempt,
                });
            }
        }
        Ok(out)
    }

    fn biome_allowed(&self, x: i32, z: i32) -> bool {
        if self.settings.biomes.is_empty() {
            return true;
        }
        let biome = self.sampler.blender().dominant_biome(x, z);
        self.settings.biomes.iter().any(|&id| BiomeId(id) == biome)
    }

}

/// Highest empty block resting on a solid one, both inside the chunk
/// starting at `base_y`, on the uncarved terrain.
pub(super) fn surface_in_chunk(
    sampler: &DensitySampler,
    x: i32,
    base_y: i32,
    z: i32,
) -> Result<Option<i32>, InvariantError> {
    let top = base_y + CHUNK_SIZE as i32 - 1;
    let mut above = sampler.density_at(IVec3::new(x, top, z))?;
    for y in (base_y..top).rev() {
        let here = sampler.density_at(IVec3::new(x, y, z))?;
        if here > 0.0 && above <= 0.0 {
            return Ok(Some(y + 1));
        }
        above = here;
    }
    Ok(None)
}
