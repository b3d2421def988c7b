//! A noise-driven biome lookup for hosts without their own biome data.
//!
//! Temperature and moisture are two decorrelated simplex fields; a
//! Whittaker-style table of rectangles maps each pair to a biome.

use noise::{NoiseFn, Simplex};
use strata_noise::derive_seed;
use strata_preset::BiomeId;

/// A rectangle in temperature/moisture space. Bounds are inclusive at the
/// minimum and exclusive at the maximum, all in `[0.0, 1.0]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClimateRegion {
    pub temp_min: f64,
    pub temp_max: f64,
    pub moisture_min: f64,
    pub moisture_max: f64,
    pub biome: BiomeId,
}

/// Seeded climate fields plus the region table. First matching region wins.
pub struct ClimateMap {
    temp_noise: Simplex,
    moisture_noise: Simplex,
    regions: Vec<ClimateRegion>,
    fallback: BiomeId,
    /// Lower values produce broader temperature zones.
    pub temp_frequency: f64,
    pub moisture_frequency: f64,
}

impl ClimateMap {
    pub fn new(seed: u64, regions: Vec<ClimateRegion>, fallback: BiomeId) -> Self {
        Self {
            temp_noise: Simplex::new(derive_seed(seed, 0x7E3B_0001) as u32),
            moisture_noise: Simplex::new(derive_seed(seed, 0x7E3B_0002) as u32),
            regions,
            fallback,
            temp_frequency: 0.0015,
            moisture_frequency: 0.0021,
        }
    }

    /// Five climate bands matching the biome ids of the built-in preset:
    /// 0 ocean, 1 plains, 2 desert, 3 mountains, 4 forest.
    pub fn with_default_regions(seed: u64) -> Self {
        let region = |temp: (f64, f64), moisture: (f64, f64), id: u32| ClimateRegion {
            temp_min: temp.0,
            temp_max: temp.1,
            moisture_min: moisture.0,
            moisture_max: moisture.1,
            biome: BiomeId(id),
        };
        Self::new(
            seed,
            vec![
                region((0.0, 1.0), (0.75, 1.01), 0),
                region((0.0, 0.3), (0.0, 0.75), 3),
                region((0.65, 1.01), (0.0, 0.3), 2),
                region((0.3, 1.01), (0.45, 0.75), 4),
            ],
            BiomeId(1),
        )
    }

    /// Returns `(temperature, moisture)` at a column, both in `[0.0, 1.0]`.
    pub fn climate(&self, x: i32, z: i32) -> (f64, f64) {
        let (x, z) = (f64::from(x), f64::from(z));
        let t = self
            .temp_noise
            .get([x * self.temp_frequency, z * self.temp_frequency]);
        let m = self
            .moisture_noise
            .get([x * self.moisture_frequency, z * self.moisture_frequency]);
        (
            ((t + 1.0) * 0.5).clamp(0.0, 1.0),
            ((m + 1.0) * 0.5).clamp(0.0, 1.0),
        )
    }

    pub fn lookup(&self, temperature: f64, moisture: f64) -> BiomeId {
        self.regions
            .iter()
            .find(|r| {
                temperature >= r.temp_min
                    && temperature < r.temp_max
                    && moisture >= r.moisture_min
                    && moisture < r.moisture_max
            })
            .map_or(self.fallback, |r| r.biome)
    }

    pub fn biome_at(&self, x: i32, z: i32) -> BiomeId {
        let (t, m) = self.climate(x, z);
        self.lookup(t, m)
    }
}
