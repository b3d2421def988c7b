//! Serde schema of a current-version preset document.
//!
//! These types mirror the document one to one. [`crate::preset`] turns them
//! into a validated [`GeneratorPreset`](crate::GeneratorPreset).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_noise::{Axis, Interpolation, NoiseKind};

use crate::settings::{FeatureSettings, SamplingSettings, TerrainSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDocument {
    /// Nested area presets may leave this out and inherit the current version.
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub seed_override: Option<u64>,
    pub noise_graph: GraphDocument,
    #[serde(default)]
    pub curves: BTreeMap<String, CurveDocument>,
    #[serde(default)]
    pub biomes: Vec<BiomeDocument>,
    #[serde(default)]
    pub fallback_biome: Option<FallbackBiomeDocument>,
    #[serde(default)]
    pub terrain: TerrainSettings,
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub areas: Vec<AreaDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: String,
    #[serde(flatten)]
    pub op: OpDocument,
}

/// Operator parameters. Inputs are wired by [`EdgeDocument`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OpDocument {
    Noise {
        #[serde(default)]
        kind: NoiseKind,
        /// Defaults to a hash of the node id.
        #[serde(default)]
        salt: Option<u32>,
        frequency: f64,
        #[serde(default = "one")]
        vertical_scale: f64,
        #[serde(default = "one_octave")]
        octaves: u32,
        #[serde(default = "half")]
        persistence: f64,
        #[serde(default = "two")]
        lacunarity: f64,
    },
    Constant {
        value: f64,
    },
    Coordinate {
        axis: Axis,
    },
    ScaleBias {
        #[serde(default = "one")]
        scale: f64,
        #[serde(default)]
        bias: f64,
    },
    Clamp {
        min: f64,
        max: f64,
    },
    Abs {},
    Negate {},
    Curve {
        curve: String,
    },
    Sum {},
    Product {},
    Min {},
    Max {},
    Blend {},
    Select {
        #[serde(default)]
        threshold: f64,
        #[serde(default)]
        falloff: f64,
    },
    Column {},
}

fn current_version() -> u32 {
    crate::migrate::CURRENT_VERSION
}

fn one() -> f64 {
    1.0
}

fn half() -> f64 {
    0.5
}

fn two() -> f64 {
    2.0
}

fn one_octave() -> u32 {
    1
}

fn input_port() -> String {
    "input".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub from: String,
    pub to: String,
    #[serde(default = "input_port")]
    pub port: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveDocument {
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomeDocument {
    pub id: u32,
    pub height_base: f64,
    #[serde(default)]
    pub height_variation: f64,
    #[serde(default)]
    pub volatility_curve: Option<String>,
    #[serde(default)]
    pub surface_depth: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackBiomeDocument {
    pub height_base: f64,
    pub height_variation: f64,
    pub surface_depth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaDocument {
    /// Inclusive chunk-coordinate corners.
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub preset: Box<PresetDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_tags() {
        let node: NodeDocument = serde_json::from_str(
            r#"{ "id": "base", "type": "noise", "frequency": 0.02, "verticalScale": 0.0, "kind": "simplex" }"#,
        )
        .unwrap();
        assert_eq!(node.id, "base");
        match node.op {
            OpDocument::Noise {
                kind,
                frequency,
                vertical_scale,
                octaves,
                salt,
                ..
            } => {
                assert_eq!(kind, NoiseKind::Simplex);
                assert_eq!(frequency, 0.02);
                assert_eq!(vertical_scale, 0.0);
                assert_eq!(octaves, 1);
                assert_eq!(salt, None);
            }
            other => panic!("expected a noise node, got {other:?}"),
        }

        let node: NodeDocument =
            serde_json::from_str(r#"{ "id": "h", "type": "scale_bias", "bias": 64 }"#).unwrap();
        assert!(matches!(node.op, OpDocument::ScaleBias { scale, bias } if scale == 1.0 && bias == 64.0));

        let node: NodeDocument = serde_json::from_str(r#"{ "id": "a", "type": "abs" }"#).unwrap();
        assert!(matches!(node.op, OpDocument::Abs {}));
    }

    #[test]
    fn test_unknown_node_type_rejected() {
        let result: Result<NodeDocument, _> =
            serde_json::from_str(r#"{ "id": "x", "type": "teleport" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_edge_port_defaults_to_input() {
        let edge: EdgeDocument = serde_json::from_str(r#"{ "from": "a", "to": "b" }"#).unwrap();
        assert_eq!(edge.port, "input");
    }
}
