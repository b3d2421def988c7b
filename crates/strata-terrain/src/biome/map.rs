//! The host-facing biome lookup seam.

use strata_preset::BiomeId;

/// One biome sample near a queried column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeCandidate {
    pub biome: BiomeId,
    /// Offset, in blocks, from the queried column to the sample.
    pub dx: i32,
    pub dz: i32,
    /// Raw weight before the blending kernel is applied. Non-positive or
    /// non-finite weights are ignored.
    pub weight: f64,
}

/// Source of biome data, implemented by the host.
///
/// Must be deterministic: the same query always yields the same candidates.
pub trait BiomeMap: Send + Sync {
    /// Biome samples within `radius` blocks (plus one sample spacing) of the
    /// column `(x, z)`.
    fn biomes_near(&self, x: i32, z: i32, radius: u32) -> Vec<BiomeCandidate>;
}

/// Adapts a point lookup into a [`BiomeMap`] by sampling it on a fixed grid
/// of world-aligned points `spacing` blocks apart.
pub struct GridBiomeMap<F> {
    spacing: i32,
    lookup: F,
}

impl<F> GridBiomeMap<F>
where
    F: Fn(i32, i32) -> BiomeId + Send + Sync,
{
    /// `spacing` is clamped to at least one block.
    pub fn new(spacing: u32, lookup: F) -> Self {
        Self {
            spacing: spacing.clamp(1, i32::MAX as u32) as i32,
            lookup,
        }
    }

    pub fn spacing(&self) -> u32 {
        self.spacing as u32
    }

    /// The biome of the grid point nearest below `(x, z)`.
    pub fn biome_at(&self, x: i32, z: i32) -> BiomeId {
        let s = self.spacing;
        (self.lookup)(x.div_euclid(s) * s, z.div_euclid(s) * s)
    }
}

impl<F> BiomeMap for GridBiomeMap<F>
where
    F: Fn(i32, i32) -> BiomeId + Send + Sync,
{
    fn biomes_near(&self, x: i32, z: i32, radius: u32) -> Vec<BiomeCandidate> {
        let s = self.spacing;
        let reach = i64::from(radius) + i64::from(s);
        let cells = (reach / i64::from(s)) as i32 + 1;
        let (cx, cz) = (i64::from(x.div_euclid(s)), i64::from(z.div_euclid(s)));

        let mut out = Vec::with_capacity(((2 * cells + 1) * (2 * cells + 1)) as usize);
        for j in -cells..=cells {
            for i in -cells..=cells {
                // Grid points past the i32 world edge do not exist.
                let gx = (cx + i64::from(i)) * i64::from(s);
                let gz = (cz + i64::from(j)) * i64::from(s);
                let (Ok(gx), Ok(gz)) = (i32::try_from(gx), i32::try_from(gz)) else {
                    continue;
                };
                let (dx, dz) = (i64::from(gx) - i64::from(x), i64::from(gz) - i64::from(z));
                if dx * dx + dz * dz >= reach * reach {
                    continue;
                }
                out.push(BiomeCandidate {
                    biome: (self.lookup)(gx, gz),
                    dx: dx as i32,
                    dz: dz as i32,
                    weight: 1.0,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_lie_on_world_grid() {
        let map = GridBiomeMap::new(4, |x, _| BiomeId((x / 4) as u32 & 7));
        for (x, z) in [(0, 0), (5, -3), (-17, 22)] {
            let candidates = map.biomes_near(x, z, 8);
            assert!(!candidates.is_empty());
            for c in &candidates {
                assert_eq!((x + c.dx).rem_euclid(4), 0, "sample x off grid");
                assert_eq!((z + c.dz).rem_euclid(4), 0, "sample z off grid");
                let d = f64::from(c.dx).hypot(f64::from(c.dz));
                assert!(d < 12.0, "candidate at distance {d} outside reach");
            }
        }
    }

    #[test]
    fn test_candidates_are_deterministic() {
        let map = GridBiomeMap::new(4, |x, z| BiomeId(((x ^ z) & 3) as u32));
        assert_eq!(map.biomes_near(13, 7, 8), map.biomes_near(13, 7, 8));
    }

    #[test]
    fn test_world_edge_columns() {
        let map = GridBiomeMap::new(16, |_, _| BiomeId(2));
        for (x, z) in [(i32::MAX, i32::MAX), (i32::MIN, i32::MIN), (i32::MAX, i32::MIN)] {
            let candidates = map.biomes_near(x, z, 64);
            assert!(!candidates.is_empty(), "({x}, {z}) has in-range grid points");
            for c in &candidates {
                assert!(i64::from(x) + i64::from(c.dx) <= i64::from(i32::MAX));
                assert!(i64::from(z) + i64::from(c.dz) >= i64::from(i32::MIN));
            }
        }
    }

    #[test]
    fn test_zero_radius_still_samples_neighbours() {
        let map = GridBiomeMap::new(4, |_, _| BiomeId(1));
        let candidates = map.biomes_near(2, 2, 0);
        assert!(candidates.iter().all(|c| c.biome == BiomeId(1)));
        assert!(candidates.len() >= 4);
    }

    #[test]
    fn test_biome_at_snaps_to_grid() {
        let map = GridBiomeMap::new(8, |x, z| BiomeId((x + 1000 * z) as u32));
        assert_eq!(map.biome_at(7, 0), BiomeId(0));
        assert_eq!(map.biome_at(8, 0), BiomeId(8));
        assert_eq!(map.biome_at(-1, 0), map.biome_at(-8, 0));
    }
}
