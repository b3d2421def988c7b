//! The host-facing terrain engine.
//!
//! A [`TerrainEngine`] binds a validated preset to a world seed and a host
//! biome map. It is `Send + Sync`; everything but the shared sample caches
//! is read-only after construction, so any number of threads may request
//! chunks at once.

use std::sync::Arc;
use std::time::Instant;

use glam::IVec3;
use strata_noise::{CacheStats, InvariantError, SampleCache, SampleKey};
use strata_preset::{BiomeId, GeneratorPreset};

use crate::biome::{BiomeMap, ColumnKey, WeightedBiomeParameters};
use crate::carve::{CarvedChunk, FeaturePipeline, LakeRecord, PlacementRecord, VeinRecord};
use crate::classify::{self, MaterialResolver, VoxelClass};
use crate::density::{CHUNK_SIZE, DensityField};
use crate::sampler::DensitySampler;

/// Cache sizing for an engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Entries in the lattice/column sample cache.
    pub sample_cache_capacity: usize,
    /// Entries in the blended-biome column cache.
    pub column_cache_capacity: usize,
    pub cache_shards: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sample_cache_capacity: 1 << 20,
            column_cache_capacity: 1 << 16,
            cache_shards: 16,
        }
    }
}

/// A fully generated chunk ready for the host.
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    pub chunk: IVec3,
    /// Carved density data.
    pub field: DensityField,
    /// Structures placed inside the chunk.
    pub placements: Vec<PlacementRecord>,
    /// Ore blocks inside the chunk, per vein.
    pub veins: Vec<VeinRecord>,
    /// Lakes centred inside the chunk.
    pub lakes: Vec<LakeRecord>,
    /// Generation time in microseconds (for profiling).
    pub generation_time_us: u64,
}

/// One preset's sampler and feature stage, plus its area overrides.
struct PresetLayer {
    sampler: DensitySampler,
    features: FeaturePipeline,
    areas: Vec<AreaLayer>,
}

struct AreaLayer {
    min: IVec3,
    max: IVec3,
    layer: PresetLayer,
}

impl PresetLayer {
    fn build(
        preset: Arc<GeneratorPreset>,
        seed: u64,
        biome_map: &Arc<dyn BiomeMap>,
        samples: &Arc<SampleCache<SampleKey, f64>>,
        columns: &Arc<SampleCache<ColumnKey, Arc<WeightedBiomeParameters>>>,
        next_tag: &mut u32,
    ) -> Self {
        let tag = *next_tag;
        *next_tag += 1;
        let areas = preset
            .areas
            .iter()
            .map(|area| AreaLayer {
                min: IVec3::from_array(area.min),
                max: IVec3::from_array(area.max),
                layer: Self::build(
                    Arc::clone(&area.preset),
                    seed,
                    biome_map,
                    samples,
                    columns,
                    next_tag,
                ),
            })
            .collect();
        Self {
            features: FeaturePipeline::new(&preset.features, &preset.curves),
            sampler: DensitySampler::new(
                preset,
                seed,
                Arc::clone(biome_map),
                Arc::clone(samples),
                Arc::clone(columns),
                tag,
            ),
            areas,
        }
    }

    /// The innermost layer responsible for `chunk`; the first matching area wins.
    fn resolve(&self, chunk: IVec3) -> &PresetLayer {
        self.areas
            .iter()
            .find(|area| chunk.cmpge(area.min).all() && chunk.cmple(area.max).all())
            .map_or(self, |area| area.layer.resolve(chunk))
    }
}

/// Seeded, preset-driven chunk generator.
pub struct TerrainEngine {
    seed: u64,
    root: PresetLayer,
    samples: Arc<SampleCache<SampleKey, f64>>,
    columns: Arc<SampleCache<ColumnKey, Arc<WeightedBiomeParameters>>>,
}

impl TerrainEngine {
    /// Build an engine. A preset `seedOverride` replaces `seed`; area
    /// presets share the resulting seed, the biome map and the caches.
    pub fn initialize(
        seed: u64,
        preset: Arc<GeneratorPreset>,
        biome_map: Arc<dyn BiomeMap>,
        options: EngineOptions,
    ) -> Self {
        let seed = match preset.seed_override {
            Some(over) => {
                tracing::info!(seed = over, "Preset overrides the world seed");
                over
            }
            None => seed,
        };
        let shards = options.cache_shards.max(1);
        let samples = Arc::new(SampleCache::new(options.sample_cache_capacity, shards));
        let columns = Arc::new(SampleCache::new(options.column_cache_capacity, shards));

        let mut next_tag = 0;
        let root = PresetLayer::build(preset, seed, &biome_map, &samples, &columns, &mut next_tag);
        tracing::info!(
            seed,
            layers = next_tag,
            sample_cache = options.sample_cache_capacity,
            column_cache = options.column_cache_capacity,
            "Terrain engine initialised"
        );
        Self {
            seed,
            root,
            samples,
            columns,
        }
    }

    /// The effective world seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn preset(&self) -> &GeneratorPreset {
        self.root.sampler.preset()
    }

    /// The preset that generates `chunk`, after area overrides.
    pub fn preset_for(&self, chunk: IVec3) -> &GeneratorPreset {
        self.root.resolve(chunk).sampler.preset()
    }

    /// Sample, carve and place structures, lakes and ores for one chunk.
    ///
    /// Chunks beyond [`MAX_CHUNK_COORD`](crate::density::MAX_CHUNK_COORD) on
    /// any axis are rejected.
    pub fn request_chunk(&self, chunk: IVec3) -> Result<GeneratedChunk, InvariantError> {
        let start = Instant::now();
        let field = self.sample_chunk(chunk)?;
        let CarvedChunk {
            field,
            placements,
            veins,
            lakes,
        } = self.carve(field)?;
        let generation_time_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            chunk = ?chunk.to_array(),
            solid = field.solid_count(),
            placements = placements.len(),
            veins = veins.len(),
            lakes = lakes.len(),
            generation_time_us,
            "Generated chunk"
        );
        Ok(GeneratedChunk {
            chunk,
            field,
            placements,
            veins,
            lakes,
            generation_time_us,
        })
    }

    /// Uncarved densities for one chunk.
    pub fn sample_chunk(&self, chunk: IVec3) -> Result<DensityField, InvariantError> {
        self.root
            .resolve(chunk)
            .sampler
            .sample_chunk(chunk)
            .inspect_err(|err| {
                tracing::warn!(chunk = ?chunk.to_array(), %err, "Chunk sampling failed");
            })
    }

    /// Run the feature pipeline over a sampled field.
    pub fn carve(&self, field: DensityField) -> Result<CarvedChunk, InvariantError> {
        let chunk = field.chunk();
        let layer = self.root.resolve(chunk);
        layer
            .features
            .carve(&layer.sampler, field, self.seed)
            .inspect_err(|err| {
                tracing::warn!(chunk = ?chunk.to_array(), %err, "Feature stage failed");
            })
    }

    /// Uncarved density of one world block.
    pub fn density_at(&self, block: IVec3) -> Result<f64, InvariantError> {
        let chunk = block.div_euclid(IVec3::splat(CHUNK_SIZE as i32));
        self.root.resolve(chunk).sampler.density_at(block)
    }

    /// Dominant biome of a column.
    pub fn request_column_biome(&self, x: i32, z: i32) -> BiomeId {
        self.root.sampler.blender().dominant_biome(x, z)
    }

    /// Blended biome parameters of a column.
    pub fn blend(&self, x: i32, z: i32) -> Arc<WeightedBiomeParameters> {
        self.root.sampler.blender().blend(x, z)
    }

    pub fn classify(&self, field: &DensityField, x: usize, y: usize, z: usize) -> VoxelClass {
        classify::classify(field, self.preset_for(field.chunk()), x, y, z)
    }

    pub fn resolve_materials<R: MaterialResolver>(
        &self,
        field: &DensityField,
        resolver: &R,
    ) -> Vec<R::Material> {
        classify::resolve_materials(field, self.preset_for(field.chunk()), resolver)
    }

    pub fn sample_cache(&self) -> &SampleCache<SampleKey, f64> {
        &self.samples
    }

    pub fn column_cache(&self) -> &SampleCache<ColumnKey, Arc<WeightedBiomeParameters>> {
        &self.columns
    }

    /// Hit/miss counters of the sample and column caches.
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.samples.stats(), self.columns.stats())
    }

    /// Drop every cached value. Only costs recomputation.
    pub fn clear_caches(&self) {
        self.samples.clear();
        self.columns.clear();
    }
}
