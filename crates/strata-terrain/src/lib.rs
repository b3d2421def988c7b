//! Chunked density generation: biome blending, coarse sampling with
//! trilinear interpolation, feature carving, lake and ore placement, and
//! background generation.

pub mod async_generation;
pub mod biome;
pub mod carve;
pub mod classify;
pub mod density;
pub mod engine;
pub mod sampler;

pub use async_generation::{AsyncChunkGenerator, ChunkOutcome, SubmitError, default_thread_count};
pub use biome::{
    BiomeBlender, BiomeCandidate, BiomeMap, ClimateMap, ClimateRegion, ColumnKey, GridBiomeMap,
    WeightedBiomeParameters,
};
pub use carve::{
    CarvedChunk, CaveCarver, FeaturePipeline, LakeCarver, LakeRecord, OrePlacer, PlacementRecord,
    RavineCarver, StructurePlacer, VeinRecord,
};
pub use classify::{MaterialResolver, VoxelClass, classify, resolve_materials, surface_depth};
pub use density::{CHUNK_AREA, CHUNK_SIZE, CHUNK_VOLUME, DensityField};
pub use engine::{EngineOptions, GeneratedChunk, TerrainEngine};
pub use sampler::DensitySampler;
