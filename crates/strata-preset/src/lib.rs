//! Versioned generator presets for Strata terrain.
//!
//! A preset is a human-editable document describing the noise graph, biome
//! parameters, terrain shaping, coarse sampling resolution, feature pipeline
//! and per-region overrides. [`GeneratorPreset::load`] parses it, upgrades
//! old schema versions, and rejects anything the engine could not sample.

pub mod document;
mod error;
pub mod migrate;
mod preset;
pub mod schema;
mod settings;

pub use error::ConfigError;
pub use migrate::{CURRENT_VERSION, migrate};
pub use preset::{AreaPreset, BUILTIN_PRESET, BiomeId, BiomeParameters, GeneratorPreset};
pub use settings::{
    ALLOWED_STEPS, CaveSettings, FeatureSettings, LakeSettings, MAX_FEATURE_RADIUS,
    MAX_FEATURE_RANGE, MAX_STRUCTURE_SPACING, MAX_TUNNELS, MAX_VEIN_SIZE, MAX_VEIN_TRIES,
    PeriodicOreSettings, RavineSettings, SamplingSettings, StandardOreSettings, StructureSettings,
    TerrainSettings,
};

/// Parse, migrate and validate a preset document.
pub fn load(raw: &str) -> Result<GeneratorPreset, ConfigError> {
    GeneratorPreset::load(raw)
}
