//! Coarse-lattice density sampling.
//!
//! The noise graph and biome blend are evaluated only at lattice points
//! spaced `horizontalStep`/`verticalStep` blocks apart in absolute world
//! coordinates; voxels in between are trilinearly interpolated. Because the
//! lattice ignores chunk boundaries, every voxel's density is a function of
//! its world position alone and chunks may be generated in any order.

use std::sync::Arc;

use glam::{DVec3, IVec3};
use strata_noise::{Evaluator, InvariantError, SampleCache, SampleKey, Scratch};
use strata_preset::GeneratorPreset;

use crate::biome::{BiomeBlender, BiomeMap, ColumnKey, WeightedBiomeParameters};
use crate::density::{CHUNK_SIZE, DensityField, check_chunk};

/// Node id used in [`SampleKey`]s of shaped lattice densities.
const LATTICE_NODE: u32 = u32::MAX;

/// Samples the shaped density of one preset.
pub struct DensitySampler {
    preset: Arc<GeneratorPreset>,
    evaluator: Evaluator,
    blender: BiomeBlender,
    lattice: Arc<SampleCache<SampleKey, f64>>,
    horizontal_step: i32,
    vertical_step: i32,
}

impl DensitySampler {
    pub fn new(
        preset: Arc<GeneratorPreset>,
        seed: u64,
        biome_map: Arc<dyn BiomeMap>,
        samples: Arc<SampleCache<SampleKey, f64>>,
        columns: Arc<SampleCache<ColumnKey, Arc<WeightedBiomeParameters>>>,
        graph_tag: u32,
    ) -> Self {
        let evaluator = Evaluator::new(Arc::clone(&preset.graph), seed)
            .with_cache(Arc::clone(&samples), graph_tag);
        let blender = BiomeBlender::new(&preset, biome_map, columns, seed, graph_tag);
        Self {
            horizontal_step: preset.sampling.horizontal_step.clamp(1, 16) as i32,
            vertical_step: preset.sampling.vertical_step.clamp(1, 16) as i32,
            preset,
            evaluator,
            blender,
            lattice: samples,
        }
    }

    pub fn preset(&self) -> &GeneratorPreset {
        &self.preset
    }

    pub fn blender(&self) -> &BiomeBlender {
        &self.blender
    }

    pub fn seed(&self) -> u64 {
        self.evaluator.seed()
    }

    /// Apply biome and global height shaping to a raw graph value `t` at
    /// height `y`. Positive results are solid.
    pub fn shape(&self, t: f64, blend: &WeightedBiomeParameters, y: f64) -> f64 {
        let terrain = &self.preset.terrain;
        let height = terrain.height_factor * blend.height_base + terrain.height_offset;
        let mut variation =
            terrain.height_variation_factor * blend.height_variation + terrain.height_variation_offset;
        variation *= blend.volatility(y - height);
        if y < height {
            variation *= terrain.variation_factor_below_base;
        }
        t * variation + height - y
    }

    /// Shaped density at a lattice point.
    fn lattice_density(&self, scratch: &mut Scratch, point: IVec3) -> Result<f64, InvariantError> {
        let key = SampleKey {
            seed: self.evaluator.seed(),
            graph: self.evaluator.graph_tag(),
            node: LATTICE_NODE,
            tier: self.horizontal_step as u8,
            position: point.to_array(),
        };
        self.lattice.try_get_or_compute(key, || {
            let position = point.as_dvec3();
            let output = self.evaluator.graph().output();
            let t = self.evaluator.evaluate_with(scratch, output, position)?;
            let blend = self.blender.blend(point.x, point.z);
            let density = self.shape(t, &blend, position.y);
            if density.is_finite() {
                Ok(density)
            } else {
                Err(InvariantError::NonFinite {
                    node: output,
                    value: density,
                    position: position.to_array(),
                })
            }
        })
    }

    /// Densities, vertical gradients and column biomes for one chunk.
    pub fn sample_chunk(&self, chunk: IVec3) -> Result<DensityField, InvariantError> {
        check_chunk(chunk)?;
        let (hs, vs) = (self.horizontal_step, self.vertical_step);
        let size = CHUNK_SIZE as i32;
        let origin = chunk * size;
        let nx = (size / hs + 1) as usize;
        let ny = (size / vs + 1) as usize;
        let at = |i: usize, j: usize, k: usize| (j * nx + k) * nx + i;

        let mut scratch = self.evaluator.scratch();
        let mut lattice = vec![0.0; nx * ny * nx];
        for j in 0..ny {
            for k in 0..nx {
                for i in 0..nx {
                    let point = origin + IVec3::new(i as i32 * hs, j as i32 * vs, k as i32 * hs);
                    lattice[at(i, j, k)] = self.lattice_density(&mut scratch, point)?;
                }
            }
        }

        let mut field = DensityField::new(chunk);
        for ly in 0..CHUNK_SIZE {
            let (j, fy) = split(ly as i32, vs);
            for lz in 0..CHUNK_SIZE {
                let (k, fz) = split(lz as i32, hs);
                for lx in 0..CHUNK_SIZE {
                    let (i, fx) = split(lx as i32, hs);
                    let corners = [
                        lattice[at(i, j, k)],
                        lattice[at(i + 1, j, k)],
                        lattice[at(i, j + 1, k)],
                        lattice[at(i + 1, j + 1, k)],
                        lattice[at(i, j, k + 1)],
                        lattice[at(i + 1, j, k + 1)],
                        lattice[at(i, j + 1, k + 1)],
                        lattice[at(i + 1, j + 1, k + 1)],
                    ];
                    let (density, gradient) = trilinear(&corners, DVec3::new(fx, fy, fz), vs);
                    field.set(lx, ly, lz, density);
                    field.set_gradient(lx, ly, lz, gradient);
                }
            }
        }

        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let biome = self
                    .blender
                    .dominant_biome(origin.x + lx as i32, origin.z + lz as i32);
                field.set_biome(lx, lz, biome);
            }
        }
        Ok(field)
    }

    /// Density of a single world block, interpolated from the same lattice
    /// as [`sample_chunk`](Self::sample_chunk) and therefore equal to it.
    pub fn density_at(&self, block: IVec3) -> Result<f64, InvariantError> {
        check_chunk(block.div_euclid(IVec3::splat(CHUNK_SIZE as i32)))?;
        let (hs, vs) = (self.horizontal_step, self.vertical_step);
        let base = IVec3::new(
            block.x.div_euclid(hs) * hs,
            block.y.div_euclid(vs) * vs,
            block.z.div_euclid(hs) * hs,
        );
        let frac = DVec3::new(
            f64::from(block.x.rem_euclid(hs)) / f64::from(hs),
            f64::from(block.y.rem_euclid(vs)) / f64::from(vs),
            f64::from(block.z.rem_euclid(hs)) / f64::from(hs),
        );

        let mut scratch = self.evaluator.scratch();
        let mut corners = [0.0; 8];
        for (n, corner) in corners.iter_mut().enumerate() {
            let offset = IVec3::new(
                (n & 1) as i32 * hs,
                ((n >> 1) & 1) as i32 * vs,
                ((n >> 2) & 1) as i32 * hs,
            );
            *corner = self.lattice_density(&mut scratch, base + offset)?;
        }
        Ok(trilinear(&corners, frac, vs).0)
    }
}

/// Lattice cell index and in-cell fraction of a local coordinate.
fn split(local: i32, step: i32) -> (usize, f64) {
    ((local / step) as usize, f64::from(local % step) / f64::from(step))
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Interpolate cell corners ordered by (x, y, z) bits, x lowest. Returns the
/// density and its vertical derivative per block.
fn trilinear(c: &[f64; 8], f: DVec3, vertical_step: i32) -> (f64, f64) {
    let y0z0 = lerp(c[0], c[1], f.x);
    let y1z0 = lerp(c[2], c[3], f.x);
    let y0z1 = lerp(c[4], c[5], f.x);
    let y1z1 = lerp(c[6], c[7], f.x);
    let bottom = lerp(y0z0, y0z1, f.z);
    let top = lerp(y1z0, y1z1, f.z);
    (lerp(bottom, top, f.y), (top - bottom) / f64::from(vertical_step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::GridBiomeMap;
    use strata_preset::BiomeId;

    /// Flat terrain at y = 64 under the given steps.
    fn flat_preset(h: u32, v: u32) -> GeneratorPreset {
        GeneratorPreset::load(&format!(
            r#"{{
                "version": 4,
                "noiseGraph": {{ "nodes": [ {{ "id": "zero", "type": "constant", "value": 0.0 }} ], "output": "zero" }},
                "biomes": [ {{ "id": 1, "heightBase": 1.0, "heightVariation": 0.0, "surfaceDepth": 3.0 }} ],
                "terrain": {{ "heightFactor": 64.0, "heightOffset": 0.0 }},
                "sampling": {{ "horizontalStep": {h}, "verticalStep": {v} }},
            }}"#
        ))
        .unwrap()
    }

    fn hilly_preset() -> GeneratorPreset {
        GeneratorPreset::load(
            r#"{
                "version": 4,
                "noiseGraph": { "nodes": [ { "id": "n", "type": "noise", "frequency": 0.03, "octaves": 3 } ], "output": "n" },
                "biomes": [
                    { "id": 1, "heightBase": 1.0, "heightVariation": 0.5, "surfaceDepth": 3.0 },
                    { "id": 2, "heightBase": 0.5, "heightVariation": 0.25, "surfaceDepth": 3.0 },
                ],
                "terrain": { "heightFactor": 16.0, "heightVariationFactor": 16.0 },
            }"#,
        )
        .unwrap()
    }

    fn sampler_with(preset: GeneratorPreset, map: impl BiomeMap + 'static) -> DensitySampler {
        DensitySampler::new(
            Arc::new(preset),
            42,
            Arc::new(map),
            Arc::new(SampleCache::new(1 << 16, 8)),
            Arc::new(SampleCache::new(1 << 12, 8)),
            0,
        )
    }

    /// West of x = 0 is biome 1, east is biome 2.
    fn sampler(preset: GeneratorPreset) -> DensitySampler {
        sampler_with(
            preset,
            GridBiomeMap::new(4, |x, _| BiomeId(if x < 0 { 1 } else { 2 })),
        )
    }

    fn flat_sampler(h: u32, v: u32) -> DensitySampler {
        sampler_with(flat_preset(h, v), GridBiomeMap::new(4, |_, _| BiomeId(1)))
    }

    #[test]
    fn test_flat_terrain_surface() {
        let sampler = flat_sampler(4, 8);
        let field = sampler.sample_chunk(IVec3::new(0, 3, 0)).unwrap();
        // Chunk y = 3 spans world y 48..64; density = 64 - y.
        for ly in 0..CHUNK_SIZE {
            let expected = 64.0 - (48 + ly) as f64;
            assert!(
                (field.get(5, ly, 9) - expected).abs() < 1e-9,
                "density at y {} is {}",
                48 + ly,
                field.get(5, ly, 9)
            );
            assert!((field.gradient(5, ly, 9) + 1.0).abs() < 1e-9);
        }
        assert_eq!(field.solid_count(), 16 * 16 * 16);

        let above = sampler.sample_chunk(IVec3::new(0, 4, 0)).unwrap();
        assert_eq!(above.solid_count(), 0, "y = 64 and up is empty");
    }

    #[test]
    fn test_density_at_matches_chunk_voxels() {
        let sampler = sampler(hilly_preset());
        for chunk in [IVec3::new(0, 0, 0), IVec3::new(-1, 0, 2), IVec3::new(3, -1, -4)] {
            let field = sampler.sample_chunk(chunk).unwrap();
            let origin = field.world_origin();
            for (x, y, z) in [(0, 0, 0), (15, 15, 15), (3, 7, 11), (8, 0, 15), (1, 9, 2)] {
                let world = origin + IVec3::new(x as i32, y as i32, z as i32);
                assert_eq!(
                    sampler.density_at(world).unwrap().to_bits(),
                    field.get(x, y, z).to_bits(),
                    "mismatch at {world}"
                );
            }
        }
    }

    #[test]
    fn test_cold_and_warm_cache_agree() {
        let warm = sampler(hilly_preset());
        let chunk = IVec3::new(2, 0, -3);
        let first = warm.sample_chunk(chunk).unwrap();
        let second = warm.sample_chunk(chunk).unwrap();
        let cold = sampler(hilly_preset()).sample_chunk(chunk).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, cold);
    }

    #[test]
    fn test_column_biomes_recorded() {
        let sampler = sampler(hilly_preset());
        let west = sampler.sample_chunk(IVec3::new(-4, 0, 0)).unwrap();
        let east = sampler.sample_chunk(IVec3::new(3, 0, 0)).unwrap();
        assert_eq!(west.biome(8, 8), BiomeId(1));
        assert_eq!(east.biome(8, 8), BiomeId(2));
    }

    #[test]
    fn test_every_step_combination_interpolates_exactly_at_lattice() {
        for h in [1, 2, 4, 8, 16] {
            for v in [1, 2, 4, 8, 16] {
                let sampler = flat_sampler(h, v);
                let field = sampler.sample_chunk(IVec3::new(0, 4, 0)).unwrap();
                // Linear density interpolates exactly at every voxel.
                assert!((field.get(0, 0, 0) - 0.0).abs() < 1e-9, "steps {h}/{v}");
                assert!((field.get(15, 15, 15) + 15.0).abs() < 1e-9, "steps {h}/{v}");
            }
        }
    }

    #[test]
    fn test_trilinear_corners_and_gradient() {
        let c = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(trilinear(&c, DVec3::ZERO, 4).0, 0.0);
        assert_eq!(trilinear(&c, DVec3::ONE, 4).0, 7.0);
        assert_eq!(trilinear(&c, DVec3::splat(0.5), 4).0, 3.5);
        // Top minus bottom is 2.0 everywhere, over 4 blocks.
        assert_eq!(trilinear(&c, DVec3::splat(0.25), 4).1, 0.5);
    }
}
