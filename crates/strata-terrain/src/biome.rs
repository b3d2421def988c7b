//! Biome lookup and blending.
//!
//! The host supplies biomes through a [`BiomeMap`]. The [`BiomeBlender`]
//! turns the candidates around a column into one smoothly weighted parameter
//! set, so terrain height changes gradually across biome borders.

mod blend;
mod climate;
mod map;

pub use blend::{BiomeBlender, ColumnKey, WeightedBiomeParameters};
pub use climate::{ClimateMap, ClimateRegion};
pub use map::{BiomeCandidate, BiomeMap, GridBiomeMap};
