//! Weighted blending of biome parameters around a column.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_noise::{Curve, SampleCache};
use strata_preset::{BiomeId, BiomeParameters, GeneratorPreset};

use super::BiomeMap;

/// Cache key of one blended column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub seed: u64,
    pub graph: u32,
    pub x: i32,
    pub z: i32,
}

/// Biome parameters blended over every biome near a column.
#[derive(Clone, Debug)]
pub struct WeightedBiomeParameters {
    pub height_base: f64,
    pub height_variation: f64,
    pub surface_depth: f64,
    /// Normalised weights, one per distinct biome, sorted by id. Empty when
    /// the column had no usable candidates.
    pub weights: Vec<(BiomeId, f64)>,
    volatility: Vec<(Arc<Curve>, f64)>,
}

impl WeightedBiomeParameters {
    /// A single, unweighted parameter set.
    pub fn fallback(params: &BiomeParameters) -> Self {
        Self {
            height_base: params.height_base,
            height_variation: params.height_variation,
            surface_depth: params.surface_depth,
            weights: Vec::new(),
            volatility: Vec::new(),
        }
    }

    /// Variation multiplier at `offset` blocks above the column's base
    /// height. Biomes without a volatility curve contribute `1.0`.
    pub fn volatility(&self, offset: f64) -> f64 {
        let mut covered = 0.0;
        let mut value = 0.0;
        for (curve, weight) in &self.volatility {
            value += weight * curve.sample(offset);
            covered += weight;
        }
        value + (1.0 - covered)
    }

    /// The highest-weight biome; ties go to the lowest id.
    pub fn dominant(&self) -> BiomeId {
        let mut best: Option<(BiomeId, f64)> = None;
        for &(biome, weight) in &self.weights {
            if best.is_none_or(|(_, w)| weight > w) {
                best = Some((biome, weight));
            }
        }
        best.map_or(BiomeId::UNKNOWN, |(biome, _)| biome)
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }
}

struct BlendSource {
    params: BiomeParameters,
    volatility: Option<Arc<Curve>>,
}

/// Blends the candidates a [`BiomeMap`] reports around each column with the
/// kernel `(1 - (d / (R + 1))²)²`, `d` and `R` in blend-lattice cells.
pub struct BiomeBlender {
    map: Arc<dyn BiomeMap>,
    /// Query radius, in blocks.
    radius: u32,
    spacing: u32,
    sources: BTreeMap<BiomeId, BlendSource>,
    fallback: BiomeParameters,
    cache: Arc<SampleCache<ColumnKey, Arc<WeightedBiomeParameters>>>,
    seed: u64,
    graph_tag: u32,
}

impl BiomeBlender {
    pub fn new(
        preset: &GeneratorPreset,
        map: Arc<dyn BiomeMap>,
        cache: Arc<SampleCache<ColumnKey, Arc<WeightedBiomeParameters>>>,
        seed: u64,
        graph_tag: u32,
    ) -> Self {
        let sources = preset
            .biomes
            .iter()
            .map(|(&id, params)| {
                let volatility = params
                    .volatility_curve
                    .as_ref()
                    .and_then(|name| preset.curves.get(name))
                    .map(|curve| Arc::new(curve.clone()));
                (
                    id,
                    BlendSource {
                        params: params.clone(),
                        volatility,
                    },
                )
            })
            .collect();
        let spacing = preset.terrain.blend_spacing.max(1);
        Self {
            map,
            radius: preset.terrain.blend_radius.saturating_mul(spacing),
            spacing,
            sources,
            fallback: preset.fallback_biome.clone(),
            cache,
            seed,
            graph_tag,
        }
    }

    /// Blended parameters for column `(x, z)`, cached per column.
    pub fn blend(&self, x: i32, z: i32) -> Arc<WeightedBiomeParameters> {
        let key = ColumnKey {
            seed: self.seed,
            graph: self.graph_tag,
            x,
            z,
        };
        self.cache
            .get_or_compute(key, || Arc::new(self.blend_uncached(x, z)))
    }

    /// The dominant biome of column `(x, z)`.
    pub fn dominant_biome(&self, x: i32, z: i32) -> BiomeId {
        self.blend(x, z).dominant()
    }

    fn blend_uncached(&self, x: i32, z: i32) -> WeightedBiomeParameters {
        let reach = f64::from(self.radius) + f64::from(self.spacing);
        let mut merged: BTreeMap<BiomeId, f64> = BTreeMap::new();
        for candidate in self.map.biomes_near(x, z, self.radius) {
            if !(candidate.weight.is_finite() && candidate.weight > 0.0) {
                continue;
            }
            let d = f64::from(candidate.dx).hypot(f64::from(candidate.dz));
            let falloff = 1.0 - (d / reach) * (d / reach);
            if falloff <= 0.0 {
                continue;
            }
            *merged.entry(candidate.biome).or_default() += candidate.weight * falloff * falloff;
        }

        let total: f64 = merged.values().sum();
        if !(total.is_finite() && total > 0.0) {
            tracing::trace!(x, z, "No biome candidates, using fallback parameters");
            return WeightedBiomeParameters::fallback(&self.fallback);
        }

        let mut blended = WeightedBiomeParameters {
            height_base: 0.0,
            height_variation: 0.0,
            surface_depth: 0.0,
            weights: Vec::with_capacity(merged.len()),
            volatility: Vec::new(),
        };
        for (biome, raw) in merged {
            let weight = raw / total;
            let source = self.sources.get(&biome);
            if source.is_none() {
                tracing::trace!(biome = biome.0, "Unknown biome id, using fallback parameters");
            }
            let params = source.map_or(&self.fallback, |s| &s.params);
            blended.height_base += weight * params.height_base;
            blended.height_variation += weight * params.height_variation;
            blended.surface_depth += weight * params.surface_depth;
            if let Some(curve) = source.and_then(|s| s.volatility.as_ref()) {
                blended.volatility.push((Arc::clone(curve), weight));
            }
            blended.weights.push((biome, weight));
        }
        blended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeCandidate, GridBiomeMap};

    const PRESET: &str = r#"{
        "version": 4,
        "noiseGraph": { "nodes": [ { "id": "zero", "type": "constant", "value": 0.0 } ], "output": "zero" },
        "curves": { "steep": { "points": [[0.0, 2.0], [10.0, 4.0]] } },
        "biomes": [
            { "id": 1, "heightBase": 1.0, "heightVariation": 0.5, "surfaceDepth": 4.0 },
            { "id": 2, "heightBase": 3.0, "heightVariation": 1.5, "volatilityCurve": "steep", "surfaceDepth": 2.0 },
        ],
        "fallbackBiome": { "heightBase": -1.0, "heightVariation": 0.25, "surfaceDepth": 8.0 },
        "terrain": { "blendRadius": 2, "blendSpacing": 4 },
    }"#;

    struct FixedMap(Vec<BiomeCandidate>);

    impl BiomeMap for FixedMap {
        fn biomes_near(&self, _x: i32, _z: i32, _radius: u32) -> Vec<BiomeCandidate> {
            self.0.clone()
        }
    }

    fn candidate(biome: u32, dx: i32, dz: i32, weight: f64) -> BiomeCandidate {
        BiomeCandidate {
            biome: BiomeId(biome),
            dx,
            dz,
            weight,
        }
    }

    fn blender(map: impl BiomeMap + 'static) -> BiomeBlender {
        let preset = GeneratorPreset::load(PRESET).unwrap();
        BiomeBlender::new(&preset, Arc::new(map), Arc::new(SampleCache::new(1024, 4)), 42, 0)
    }

    #[test]
    fn test_weights_normalised() {
        let blender = blender(GridBiomeMap::new(4, |x, z| BiomeId(1 + ((x / 4 + z / 4) & 1) as u32)));
        for (x, z) in [(0, 0), (3, 9), (-21, 14), (100, -100)] {
            let blend = blender.blend(x, z);
            assert!(
                (blend.weight_sum() - 1.0).abs() < 1e-6,
                "weights sum to {} at ({x}, {z})",
                blend.weight_sum()
            );
            assert!(blend.weights.iter().all(|&(_, w)| w > 0.0));
        }
    }

    #[test]
    fn test_single_biome_blends_to_itself() {
        let blender = blender(GridBiomeMap::new(4, |_, _| BiomeId(1)));
        let blend = blender.blend(17, -5);
        assert_eq!(blend.weights.len(), 1);
        assert!((blend.height_base - 1.0).abs() < 1e-12);
        assert!((blend.height_variation - 0.5).abs() < 1e-12);
        assert!((blend.surface_depth - 4.0).abs() < 1e-12);
        assert_eq!(blend.volatility(5.0), 1.0);
        assert_eq!(blend.dominant(), BiomeId(1));
    }

    #[test]
    fn test_weighted_average_of_two_biomes() {
        let blender = blender(FixedMap(vec![candidate(1, 0, 0, 1.0), candidate(2, 0, 0, 3.0)]));
        let blend = blender.blend(0, 0);
        assert_eq!(blend.weights, vec![(BiomeId(1), 0.25), (BiomeId(2), 0.75)]);
        assert!((blend.height_base - 2.5).abs() < 1e-12);
        assert!((blend.surface_depth - 2.5).abs() < 1e-12);
        assert_eq!(blend.dominant(), BiomeId(2));
        // 0.75 * steep(10) + 0.25 * 1.0
        assert!((blend.volatility(10.0) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_no_candidates_yield_fallback() {
        let blender = blender(FixedMap(Vec::new()));
        let blend = blender.blend(0, 0);
        assert!(blend.weights.is_empty());
        assert_eq!(blend.height_base, -1.0);
        assert_eq!(blend.surface_depth, 8.0);
        assert_eq!(blend.dominant(), BiomeId::UNKNOWN);
    }

    #[test]
    fn test_zero_and_invalid_weights_ignored() {
        let blender = blender(FixedMap(vec![
            candidate(1, 0, 0, 0.0),
            candidate(2, 0, 0, f64::NAN),
            candidate(2, 0, 0, -4.0),
        ]));
        let blend = blender.blend(0, 0);
        assert!(blend.weights.is_empty(), "all-zero weights fall back");
        assert_eq!(blend.height_base, -1.0);
    }

    #[test]
    fn test_unknown_biome_uses_fallback_parameters() {
        let blender = blender(FixedMap(vec![candidate(99, 0, 0, 1.0)]));
        let blend = blender.blend(0, 0);
        assert_eq!(blend.weights, vec![(BiomeId(99), 1.0)]);
        assert_eq!(blend.height_base, -1.0);
        assert_eq!(blend.height_variation, 0.25);
    }

    #[test]
    fn test_far_candidates_have_no_weight() {
        // Reach is (2 + 1) * 4 = 12 blocks.
        let blender = blender(FixedMap(vec![candidate(1, 0, 0, 1.0), candidate(2, 12, 0, 100.0)]));
        let blend = blender.blend(0, 0);
        assert_eq!(blend.weights, vec![(BiomeId(1), 1.0)]);
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let blender = blender(FixedMap(vec![candidate(2, 1, 0, 1.0), candidate(1, 0, 1, 1.0)]));
        assert_eq!(blender.dominant_biome(0, 0), BiomeId(1));
    }

    #[test]
    fn test_blends_are_cached() {
        let blender = blender(GridBiomeMap::new(4, |_, _| BiomeId(2)));
        let first = blender.blend(3, 3);
        let second = blender.blend(3, 3);
        assert!(Arc::ptr_eq(&first, &second), "second lookup should hit the column cache");
    }
}
