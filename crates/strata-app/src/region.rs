//! Generating a block of chunks through the worker pool.

use std::time::{Duration, Instant};

use glam::IVec3;
use strata_terrain::{AsyncChunkGenerator, CHUNK_VOLUME, SubmitError};

/// Chunk row the region is centred on; near sea level for the built-in preset.
pub const CENTER_Y: i32 = 4;

/// Aggregate results of one region.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegionSummary {
    pub generated: usize,
    pub failed: usize,
    pub solid_voxels: usize,
    pub placements: usize,
    pub veins: usize,
    pub lakes: usize,
    /// Sum of per-chunk generation times.
    pub total_time_us: u64,
}

impl RegionSummary {
    /// Fraction of generated voxels that are solid.
    pub fn solid_fraction(&self) -> f64 {
        if self.generated == 0 {
            return 0.0;
        }
        self.solid_voxels as f64 / (self.generated * CHUNK_VOLUME) as f64
    }
}

/// Chunks within `radius` horizontally and `vertical_radius` vertically of
/// `(0, CENTER_Y, 0)`, nearest first.
pub fn region_chunks(radius: u32, vertical_radius: u32) -> Vec<IVec3> {
    let (r, v) = (radius as i32, vertical_radius as i32);
    let mut chunks: Vec<IVec3> = (-v..=v)
        .flat_map(|dy| {
            (-r..=r).flat_map(move |dz| (-r..=r).map(move |dx| IVec3::new(dx, CENTER_Y + dy, dz)))
        })
        .collect();
    chunks.sort_by_key(|c| {
        let d = *c - IVec3::new(0, CENTER_Y, 0);
        (d.length_squared(), c.to_array())
    });
    chunks
}

/// Generate every chunk in `chunks`, waiting for results whenever the pool's
/// queue is full.
pub fn generate_region(generator: &AsyncChunkGenerator, chunks: &[IVec3], timeout: Duration) -> RegionSummary {
    let mut summary = RegionSummary::default();
    let mut received = 0;
    let deadline = Instant::now() + timeout;

    let collect = |summary: &mut RegionSummary| -> usize {
        let results = generator.drain_results();
        for outcome in &results {
            match &outcome.result {
                Ok(generated) => {
                    summary.generated += 1;
                    summary.solid_voxels += generated.field.solid_count();
                    summary.placements += generated.placements.len();
                    summary.veins += generated.veins.len();
                    summary.lakes += generated.lakes.len();
                    summary.total_time_us += generated.generation_time_us;
                }
                Err(err) => {
                    tracing::warn!(chunk = ?outcome.chunk.to_array(), %err, "Chunk failed");
                    summary.failed += 1;
                }
            }
        }
        results.len()
    };

    let mut expected = chunks.len();
    for &chunk in chunks {
        loop {
            match generator.submit(chunk) {
                Ok(()) => break,
                Err(SubmitError::AlreadyPending(_)) => {
                    expected -= 1;
                    break;
                }
                Err(SubmitError::QueueFull(_)) => {}
            }
            received += collect(&mut summary);
            if Instant::now() >= deadline {
                tracing::warn!(received, "Timed out while queueing region");
                return summary;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    while received < expected && Instant::now() < deadline {
        let got = collect(&mut summary);
        received += got;
        if got == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    if received < expected {
        tracing::warn!(received, expected, "Timed out waiting for region");
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_preset::{BiomeId, GeneratorPreset};
    use strata_terrain::{EngineOptions, GridBiomeMap, TerrainEngine};

    use super::*;

    #[test]
    fn test_region_chunk_count_and_order() {
        let chunks = region_chunks(1, 2);
        assert_eq!(chunks.len(), 3 * 3 * 5);
        assert_eq!(chunks[0], IVec3::new(0, CENTER_Y, 0), "centre comes first");
        let last = chunks.last().unwrap();
        assert_eq!((*last - IVec3::new(0, CENTER_Y, 0)).length_squared(), 1 + 4 + 1);
    }

    #[test]
    fn test_zero_radius_is_one_chunk() {
        assert_eq!(region_chunks(0, 0), vec![IVec3::new(0, CENTER_Y, 0)]);
    }

    #[test]
    fn test_generate_small_region() {
        let engine = Arc::new(TerrainEngine::initialize(
            42,
            Arc::new(GeneratorPreset::builtin().unwrap()),
            Arc::new(GridBiomeMap::new(4, |_, _| BiomeId(1))),
            EngineOptions::default(),
        ));
        // A tiny queue forces the backpressure path.
        let generator = AsyncChunkGenerator::new(engine, 2, 1, 2).unwrap();
        let chunks = region_chunks(1, 0);
        let summary = generate_region(&generator, &chunks, Duration::from_secs(120));
        assert_eq!(summary.generated, chunks.len());
        assert_eq!(summary.failed, 0);
        assert!(summary.solid_fraction() > 0.0 && summary.solid_fraction() < 1.0);
    }

    #[test]
    fn test_repeated_chunks_are_generated_once() {
        let engine = Arc::new(TerrainEngine::initialize(
            42,
            Arc::new(GeneratorPreset::builtin().unwrap()),
            Arc::new(GridBiomeMap::new(4, |_, _| BiomeId(1))),
            EngineOptions::default(),
        ));
        let generator = AsyncChunkGenerator::new(engine, 1, 8, 8).unwrap();
        let chunk = IVec3::new(0, CENTER_Y, 0);
        let summary = generate_region(&generator, &[chunk, chunk], Duration::from_secs(120));
        assert_eq!(summary.generated, 1, "the repeat is already pending");
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_empty_summary_fraction() {
        assert_eq!(RegionSummary::default().solid_fraction(), 0.0);
    }
}
