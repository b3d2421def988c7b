//! Terrain shaping, sampling and feature parameters.
//!
//! These sections are deserialized straight from the preset document; every
//! field has a default, so presets only spell out what they change.

use serde::{Deserialize, Serialize};

/// Largest horizontal radius, in blocks, any carving feature may reach.
/// Carvers clamp to it at run time as well.
pub const MAX_FEATURE_RADIUS: f64 = 16.0;

/// Largest distance, in chunks, a feature may travel from its origin chunk.
pub const MAX_FEATURE_RANGE: u32 = 8;

/// Largest structure spacing, in blocks.
pub const MAX_STRUCTURE_SPACING: f64 = 128.0;

/// Largest number of tunnels a single cave system may start with.
pub const MAX_TUNNELS: u32 = 64;

/// Largest ore vein walk, in steps.
pub const MAX_VEIN_SIZE: u32 = 64;

/// Largest number of vein attempts per chunk for one ore type.
pub const MAX_VEIN_TRIES: u32 = 256;

/// Lattice steps accepted for coarse sampling.
pub const ALLOWED_STEPS: [u32; 5] = [1, 2, 4, 8, 16];

/// Global height shaping factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerrainSettings {
    /// Multiplier on the blended biome height base.
    pub height_factor: f64,
    /// Added to the scaled height base.
    pub height_offset: f64,
    /// Multiplier on the blended biome height variation.
    pub height_variation_factor: f64,
    /// Added to the scaled height variation.
    pub height_variation_offset: f64,
    /// Extra variation multiplier applied below the column's base height.
    pub variation_factor_below_base: f64,
    /// Empty voxels below this height are liquid. `None` disables liquid.
    pub water_level: Option<f64>,
    /// Biome blending radius, in lattice cells of `blend_spacing` blocks.
    pub blend_radius: u32,
    /// Spacing, in blocks, of the biome blending lattice.
    pub blend_spacing: u32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            height_factor: 1.0,
            height_offset: 0.0,
            height_variation_factor: 1.0,
            height_variation_offset: 0.0,
            variation_factor_below_base: 1.0,
            water_level: Some(63.0),
            blend_radius: 2,
            blend_spacing: 4,
        }
    }
}

/// Coarse lattice resolution used by the density sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SamplingSettings {
    pub horizontal_step: u32,
    pub vertical_step: u32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            horizontal_step: 4,
            vertical_step: 8,
        }
    }
}

/// Worm cave systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaveSettings {
    pub enabled: bool,
    /// Chance that an origin chunk starts a cave system.
    pub probability: f64,
    /// Upper bound on tunnels per system.
    pub max_tunnels: u32,
    /// Chance that a tunnel starts with a large room.
    pub room_probability: f64,
    /// Peak tunnel radius multiplier, in blocks.
    pub tunnel_radius: f64,
    /// Vertical radius relative to horizontal radius.
    pub vertical_squash: f64,
    /// How far, in chunks, a system may reach from its origin chunk.
    pub range: u32,
    /// Depth of the carved density at a tunnel's centre line.
    pub strength: f64,
}

impl Default for CaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: 1.0 / 14.0,
            max_tunnels: 14,
            room_probability: 0.25,
            tunnel_radius: 3.0,
            vertical_squash: 0.6,
            range: 4,
            strength: 1.0,
        }
    }
}

/// Tall, narrow ravines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RavineSettings {
    pub enabled: bool,
    /// Chance that an origin chunk starts a ravine.
    pub probability: f64,
    /// Peak horizontal half-width, in blocks.
    pub max_width: f64,
    /// Vertical extent relative to horizontal width.
    pub vertical_stretch: f64,
    /// Ravines only start at or below this height.
    pub max_start_y: f64,
    pub range: u32,
    pub strength: f64,
}

impl Default for RavineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: 0.01,
            max_width: 6.0,
            vertical_stretch: 3.0,
            max_start_y: 64.0,
            range: 4,
            strength: 1.0,
        }
    }
}

/// One kind of discrete structure placed on terrain surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructureSettings {
    pub name: String,
    /// Candidates proposed per origin chunk.
    pub attempts: u32,
    /// Chance that each proposed candidate is kept.
    pub probability: f64,
    /// Minimum distance, in blocks, between two placed structures of this kind.
    pub spacing: f64,
    /// Biomes the structure may be placed in. Empty allows all.
    pub biomes: Vec<u32>,
}

impl Default for StructureSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            attempts: 1,
            probability: 0.5,
            spacing: 24.0,
            biomes: Vec::new(),
        }
    }
}

/// Ore veins spread evenly over a height band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StandardOreSettings {
    pub name: String,
    /// Steps of the vein walk; bigger veins are longer and fatter.
    pub spawn_size: u32,
    /// Vein attempts per chunk.
    pub spawn_tries: u32,
    /// Chance that each attempt is kept.
    pub spawn_probability: f64,
    /// Lowest block height a vein may start at. `None` is unbounded.
    pub min_height: Option<f64>,
    /// Highest block height a vein may start at. `None` is unbounded.
    pub max_height: Option<f64>,
    /// Biomes the ore may generate in. Empty allows all.
    pub biomes: Vec<u32>,
}

impl Default for StandardOreSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            spawn_size: 8,
            spawn_tries: 8,
            spawn_probability: 1.0,
            min_height: None,
            max_height: None,
            biomes: Vec::new(),
        }
    }
}

/// Ore veins whose frequency follows a bell curve repeating every
/// `height_spacing` blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeriodicOreSettings {
    #[serde(flatten)]
    pub ore: StandardOreSettings,
    pub height_mean: f64,
    pub height_std_deviation: f64,
    pub height_spacing: f64,
}

impl Default for PeriodicOreSettings {
    fn default() -> Self {
        Self {
            ore: StandardOreSettings::default(),
            height_mean: 0.0,
            height_std_deviation: 16.0,
            height_spacing: 256.0,
        }
    }
}

/// Surface and underground lakes.
///
/// The chance curves are names of preset curves, sampled at the block height
/// of the candidate lake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LakeSettings {
    pub name: String,
    /// Chance of a lake where the candidate column has a surface in its chunk.
    pub surface_chance: Option<String>,
    /// Chance of an underground lake where the column has no surface.
    pub main_chance: Option<String>,
    /// Horizontal basin radius, in blocks.
    pub radius: f64,
    /// Basin depth below the liquid level, in blocks.
    pub depth: f64,
    pub strength: f64,
    /// Biomes the lake may generate in. Empty allows all.
    pub biomes: Vec<u32>,
}

impl Default for LakeSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            surface_chance: None,
            main_chance: None,
            radius: 6.0,
            depth: 3.0,
            strength: 1.0,
            biomes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureSettings {
    pub caves: CaveSettings,
    pub ravines: RavineSettings,
    pub structures: Vec<StructureSettings>,
    pub standard_ores: Vec<StandardOreSettings>,
    pub periodic_gaussian_ores: Vec<PeriodicOreSettings>,
    pub lakes: Vec<LakeSettings>,
}
