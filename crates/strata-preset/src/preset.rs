//! The validated generator preset and its loader.
//!
//! Loading runs parse -> migrate -> deserialize -> validate. Everything the
//! engine relies on (an acyclic graph, resolved references, numeric ranges)
//! is checked here so sampling never has to.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_noise::{Curve, GraphError, NodeId, NoiseGraph, NoiseNode, NoiseParams, hash_str};

use crate::document::parse_document;
use crate::error::ConfigError;
use crate::migrate::{CURRENT_VERSION, migrate};
use crate::schema::{
    AreaDocument, BiomeDocument, CurveDocument, GraphDocument, NodeDocument, OpDocument,
    PresetDocument,
};
use crate::settings::{
    ALLOWED_STEPS, CaveSettings, FeatureSettings, LakeSettings, MAX_FEATURE_RADIUS,
    MAX_FEATURE_RANGE, MAX_STRUCTURE_SPACING, MAX_TUNNELS, MAX_VEIN_SIZE, MAX_VEIN_TRIES,
    PeriodicOreSettings, RavineSettings, SamplingSettings, StandardOreSettings, StructureSettings,
    TerrainSettings,
};

/// Host-supplied biome key. The engine never interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiomeId(pub u32);

impl BiomeId {
    /// Reported for columns with no biome candidates at all.
    pub const UNKNOWN: Self = Self(u32::MAX);
}

/// Terrain-shaping parameters of one biome.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomeParameters {
    pub height_base: f64,
    pub height_variation: f64,
    /// Name of a preset curve mapping height above the column's base to a
    /// variation multiplier.
    pub volatility_curve: Option<String>,
    /// Depth, in blocks, of the surface layer.
    pub surface_depth: f64,
}

impl BiomeParameters {
    /// The flat, sea-level parameter set used where no biome data exists.
    pub const OCEAN: Self = Self {
        height_base: 0.0,
        height_variation: 0.0,
        volatility_curve: None,
        surface_depth: 0.0,
    };
}

/// A nested preset used for chunks inside an inclusive chunk-coordinate box.
#[derive(Debug, Clone)]
pub struct AreaPreset {
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub preset: Arc<GeneratorPreset>,
}

impl AreaPreset {
    pub fn contains(&self, chunk: [i32; 3]) -> bool {
        (0..3).all(|axis| chunk[axis] >= self.min[axis] && chunk[axis] <= self.max[axis])
    }
}

/// A fully validated generator configuration. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct GeneratorPreset {
    pub version: u32,
    pub seed_override: Option<u64>,
    pub graph: Arc<NoiseGraph>,
    /// Document id of every graph node, indexed by [`NodeId`].
    pub node_names: Vec<String>,
    pub curves: BTreeMap<String, Curve>,
    pub biomes: BTreeMap<BiomeId, BiomeParameters>,
    pub fallback_biome: BiomeParameters,
    pub terrain: TerrainSettings,
    pub sampling: SamplingSettings,
    pub features: FeatureSettings,
    pub areas: Vec<AreaPreset>,
}

impl GeneratorPreset {
    /// Parse, migrate and validate a preset document.
    pub fn load(text: &str) -> Result<Self, ConfigError> {
        let doc = migrate(parse_document(text)?)?;
        let doc: PresetDocument = serde_json::from_value(doc).map_err(ConfigError::Schema)?;
        let preset = Self::from_document(doc)?;
        tracing::info!(
            nodes = preset.graph.len(),
            biomes = preset.biomes.len(),
            areas = preset.areas.len(),
            "Loaded generator preset"
        );
        Ok(preset)
    }

    /// Read and load a preset file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::load(&text)
    }

    /// The preset shipped with the engine.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::load(BUILTIN_PRESET)
    }

    /// Validate a current-version document.
    pub fn from_document(doc: PresetDocument) -> Result<Self, ConfigError> {
        if doc.version != CURRENT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: i64::from(doc.version),
                supported: CURRENT_VERSION,
            });
        }

        let curves = build_curves(&doc.curves)?;
        let (graph, node_names) = build_graph(&doc.noise_graph, &curves)?;
        let biomes = build_biomes(&doc.biomes, &curves)?;
        validate_terrain(&doc.terrain)?;
        validate_sampling(&doc.sampling)?;
        validate_features(&doc.features, &curves)?;

        let fallback_biome = doc
            .fallback_biome
            .map(|f| BiomeParameters {
                height_base: f.height_base,
                height_variation: f.height_variation,
                volatility_curve: None,
                surface_depth: f.surface_depth,
            })
            .unwrap_or(BiomeParameters::OCEAN);

        let areas = doc
            .areas
            .into_iter()
            .enumerate()
            .map(|(index, area)| build_area(index, area))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: doc.version,
            seed_override: doc.seed_override,
            graph: Arc::new(graph),
            node_names,
            curves,
            biomes,
            fallback_biome,
            terrain: doc.terrain,
            sampling: doc.sampling,
            features: doc.features,
            areas,
        })
    }

    /// Look up a node by its document id.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names
            .iter()
            .position(|n| n == name)
            .map(|i| NodeId(i as u32))
    }

    /// Parameters for `id`, or the fallback set for unknown biomes.
    pub fn biome(&self, id: BiomeId) -> &BiomeParameters {
        self.biomes.get(&id).unwrap_or(&self.fallback_biome)
    }

    /// The first area whose box contains `chunk`.
    pub fn area_for(&self, chunk: [i32; 3]) -> Option<&AreaPreset> {
        self.areas.iter().find(|a| a.contains(chunk))
    }
}

/// Source of the preset returned by [`GeneratorPreset::builtin`].
pub const BUILTIN_PRESET: &str = include_str!("../presets/default.ron");

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

fn build_curves(docs: &BTreeMap<String, CurveDocument>) -> Result<BTreeMap<String, Curve>, ConfigError> {
    docs.iter()
        .map(|(name, doc)| {
            let curve = Curve::new(&doc.points, doc.interpolation).map_err(|e| {
                let value = match e {
                    strata_noise::CurveError::Empty => 0.0,
                    strata_noise::CurveError::NotIncreasing { index }
                    | strata_noise::CurveError::NonFinite { index } => doc.points[index][0],
                };
                ConfigError::out_of_range(format!("curves.{name}.points"), value, e.to_string())
            })?;
            Ok((name.clone(), curve))
        })
        .collect()
}

/// Ports each operator accepts.
fn ports(op: &OpDocument) -> &'static [&'static str] {
    match op {
        OpDocument::Noise { .. } | OpDocument::Constant { .. } | OpDocument::Coordinate { .. } => &[],
        OpDocument::Blend {} => &["a", "b", "weight"],
        OpDocument::Select { .. } => &["selector", "low", "high"],
        _ => &["input"],
    }
}

fn build_graph(
    doc: &GraphDocument,
    curves: &BTreeMap<String, Curve>,
) -> Result<(NoiseGraph, Vec<String>), ConfigError> {
    let mut ids: HashMap<&str, NodeId> = HashMap::with_capacity(doc.nodes.len());
    for (index, node) in doc.nodes.iter().enumerate() {
        if ids.insert(node.id.as_str(), NodeId(index as u32)).is_some() {
            return Err(ConfigError::unresolved("duplicate node id", node.id.clone()));
        }
    }

    // Inputs per node and port, in document order.
    let mut wired: Vec<HashMap<&str, Vec<NodeId>>> = vec![HashMap::new(); doc.nodes.len()];
    for edge in &doc.edges {
        let from = *ids.get(edge.from.as_str()).ok_or_else(|| {
            ConfigError::unresolved(format!("edge into `{}`", edge.to), edge.from.clone())
        })?;
        let to = *ids.get(edge.to.as_str()).ok_or_else(|| {
            ConfigError::unresolved(format!("edge from `{}`", edge.from), edge.to.clone())
        })?;
        let target = &doc.nodes[to.index()];
        if !ports(&target.op).contains(&edge.port.as_str()) {
            return Err(ConfigError::unresolved(
                format!("node `{}` has no port", target.id),
                edge.port.clone(),
            ));
        }
        wired[to.index()]
            .entry(edge.port.as_str())
            .or_default()
            .push(from);
    }

    let nodes = doc
        .nodes
        .iter()
        .zip(&wired)
        .map(|(node, inputs)| build_node(node, inputs, curves))
        .collect::<Result<Vec<_>, _>>()?;

    let output = *ids
        .get(doc.output.as_str())
        .ok_or_else(|| ConfigError::unresolved("noise graph output", doc.output.clone()))?;

    let names: Vec<String> = doc.nodes.iter().map(|n| n.id.clone()).collect();
    let graph = NoiseGraph::new(nodes, output).map_err(|e| match e {
        GraphError::Cycle(cycle) => ConfigError::CyclicGraph {
            nodes: cycle.iter().map(|id| names[id.index()].clone()).collect(),
        },
        GraphError::Dangling { node, input } => ConfigError::unresolved(
            format!("node `{}`", names[node.index()]),
            format!("#{}", input.0),
        ),
        GraphError::MissingOutput(id) => {
            ConfigError::unresolved("noise graph output", format!("#{}", id.0))
        }
    })?;
    Ok((graph, names))
}

fn single(
    node: &NodeDocument,
    inputs: &HashMap<&str, Vec<NodeId>>,
    port: &str,
) -> Result<NodeId, ConfigError> {
    match inputs.get(port).map(Vec::as_slice) {
        Some([id]) => Ok(*id),
        Some(_) => Err(ConfigError::unresolved(
            format!("node `{}` port `{port}` is wired more than once", node.id),
            port,
        )),
        None => Err(ConfigError::unresolved(
            format!("node `{}` port `{port}` is not wired", node.id),
            port,
        )),
    }
}

/// Every `input` edge of an n-ary node, in document order. At least one is required.
fn many(node: &NodeDocument, inputs: &HashMap<&str, Vec<NodeId>>) -> Result<Vec<NodeId>, ConfigError> {
    match inputs.get("input") {
        Some(list) if !list.is_empty() => Ok(list.clone()),
        _ => Err(ConfigError::unresolved(
            format!("node `{}` port `input` is not wired", node.id),
            "input",
        )),
    }
}

fn build_node(
    node: &NodeDocument,
    inputs: &HashMap<&str, Vec<NodeId>>,
    curves: &BTreeMap<String, Curve>,
) -> Result<NoiseNode, ConfigError> {
    let field = |name: &str| format!("noiseGraph.{}.{name}", node.id);

    let built = match &node.op {
        OpDocument::Noise {
            kind,
            salt,
            frequency,
            vertical_scale,
            octaves,
            persistence,
            lacunarity,
        } => {
            positive(field("frequency"), *frequency)?;
            positive(field("persistence"), *persistence)?;
            positive(field("lacunarity"), *lacunarity)?;
            if !vertical_scale.is_finite() || *vertical_scale < 0.0 {
                return Err(ConfigError::out_of_range(field("verticalScale"), *vertical_scale, ">= 0"));
            }
            if !(1..=16).contains(octaves) {
                return Err(ConfigError::out_of_range(field("octaves"), f64::from(*octaves), "1..=16"));
            }
            NoiseNode::Noise(NoiseParams {
                kind: *kind,
                salt: salt.unwrap_or_else(|| hash_str(&node.id)),
                frequency: *frequency,
                vertical_scale: *vertical_scale,
                octaves: *octaves,
                persistence: *persistence,
                lacunarity: *lacunarity,
            })
        }
        OpDocument::Constant { value } => NoiseNode::Constant(finite(field("value"), *value)?),
        OpDocument::Coordinate { axis } => NoiseNode::Coordinate(*axis),
        OpDocument::ScaleBias { scale, bias } => NoiseNode::ScaleBias {
            input: single(node, inputs, "input")?,
            scale: finite(field("scale"), *scale)?,
            bias: finite(field("bias"), *bias)?,
        },
        OpDocument::Clamp { min, max } => {
            let min = finite(field("min"), *min)?;
            let max = finite(field("max"), *max)?;
            if min > max {
                return Err(ConfigError::out_of_range(field("max"), max, format!(">= min ({min})")));
            }
            NoiseNode::Clamp {
                input: single(node, inputs, "input")?,
                min,
                max,
            }
        }
        OpDocument::Abs {} => NoiseNode::Abs {
            input: single(node, inputs, "input")?,
        },
        OpDocument::Negate {} => NoiseNode::Negate {
            input: single(node, inputs, "input")?,
        },
        OpDocument::Curve { curve } => NoiseNode::Curve {
            input: single(node, inputs, "input")?,
            curve: curves
                .get(curve)
                .cloned()
                .ok_or_else(|| ConfigError::unresolved(format!("node `{}` curve", node.id), curve.clone()))?,
        },
        OpDocument::Blend {} => NoiseNode::Blend {
            a: single(node, inputs, "a")?,
            b: single(node, inputs, "b")?,
            weight: single(node, inputs, "weight")?,
        },
        OpDocument::Select { threshold, falloff } => {
            if !falloff.is_finite() || *falloff < 0.0 {
                return Err(ConfigError::out_of_range(field("falloff"), *falloff, ">= 0"));
            }
            NoiseNode::Select {
                selector: single(node, inputs, "selector")?,
                low: single(node, inputs, "low")?,
                high: single(node, inputs, "high")?,
                threshold: finite(field("threshold"), *threshold)?,
                falloff: *falloff,
            }
        }
        OpDocument::Column {} => NoiseNode::Column {
            input: single(node, inputs, "input")?,
        },
        OpDocument::Sum {} => NoiseNode::Sum(many(node, inputs)?),
        OpDocument::Product {} => NoiseNode::Product(many(node, inputs)?),
        OpDocument::Min {} => NoiseNode::Min(many(node, inputs)?),
        OpDocument::Max {} => NoiseNode::Max(many(node, inputs)?),
    };
    Ok(built)
}

// ---------------------------------------------------------------------------
// Biomes, terrain, sampling, features
// ---------------------------------------------------------------------------

fn build_biomes(
    docs: &[BiomeDocument],
    curves: &BTreeMap<String, Curve>,
) -> Result<BTreeMap<BiomeId, BiomeParameters>, ConfigError> {
    let mut biomes = BTreeMap::new();
    for doc in docs {
        let field = |name: &str| format!("biomes.{}.{name}", doc.id);
        if let Some(curve) = &doc.volatility_curve
            && !curves.contains_key(curve)
        {
            return Err(ConfigError::unresolved(
                format!("biome {} volatility curve", doc.id),
                curve.clone(),
            ));
        }
        let params = BiomeParameters {
            height_base: finite(field("heightBase"), doc.height_base)?,
            height_variation: finite(field("heightVariation"), doc.height_variation)?,
            volatility_curve: doc.volatility_curve.clone(),
            surface_depth: non_negative(field("surfaceDepth"), doc.surface_depth)?,
        };
        if biomes.insert(BiomeId(doc.id), params).is_some() {
            return Err(ConfigError::unresolved("duplicate biome id", doc.id.to_string()));
        }
    }
    Ok(biomes)
}

fn validate_terrain(t: &TerrainSettings) -> Result<(), ConfigError> {
    finite("terrain.heightFactor", t.height_factor)?;
    finite("terrain.heightOffset", t.height_offset)?;
    finite("terrain.heightVariationFactor", t.height_variation_factor)?;
    finite("terrain.heightVariationOffset", t.height_variation_offset)?;
    finite("terrain.variationFactorBelowBase", t.variation_factor_below_base)?;
    if let Some(water) = t.water_level {
        finite("terrain.waterLevel", water)?;
    }
    if t.blend_radius > 8 {
        return Err(ConfigError::out_of_range("terrain.blendRadius", f64::from(t.blend_radius), "0..=8"));
    }
    step("terrain.blendSpacing", t.blend_spacing)
}

fn validate_sampling(s: &SamplingSettings) -> Result<(), ConfigError> {
    step("sampling.horizontalStep", s.horizontal_step)?;
    step("sampling.verticalStep", s.vertical_step)
}

fn validate_features(f: &FeatureSettings, curves: &BTreeMap<String, Curve>) -> Result<(), ConfigError> {
    let CaveSettings {
        probability,
        max_tunnels,
        room_probability,
        tunnel_radius,
        vertical_squash,
        range,
        strength,
        ..
    } = &f.caves;
    unit("features.caves.probability", *probability)?;
    if *max_tunnels > MAX_TUNNELS {
        return Err(ConfigError::out_of_range(
            "features.caves.maxTunnels",
            f64::from(*max_tunnels),
            format!("0..={MAX_TUNNELS}"),
        ));
    }
    unit("features.caves.roomProbability", *room_probability)?;
    radius("features.caves.tunnelRadius", *tunnel_radius)?;
    positive("features.caves.verticalSquash", *vertical_squash)?;
    feature_range("features.caves.range", *range)?;
    non_negative("features.caves.strength", *strength)?;

    let RavineSettings {
        probability,
        max_width,
        vertical_stretch,
        max_start_y,
        range,
        strength,
        ..
    } = &f.ravines;
    unit("features.ravines.probability", *probability)?;
    radius("features.ravines.maxWidth", *max_width)?;
    positive("features.ravines.verticalStretch", *vertical_stretch)?;
    finite("features.ravines.maxStartY", *max_start_y)?;
    feature_range("features.ravines.range", *range)?;
    non_negative("features.ravines.strength", *strength)?;

    for (index, StructureSettings {
        attempts,
        probability,
        spacing,
        ..
    }) in f.structures.iter().enumerate()
    {
        let field = |name: &str| format!("features.structures.{index}.{name}");
        unit(field("probability"), *probability)?;
        if *attempts > 64 {
            return Err(ConfigError::out_of_range(field("attempts"), f64::from(*attempts), "0..=64"));
        }
        if !spacing.is_finite() || *spacing <= 0.0 || *spacing > MAX_STRUCTURE_SPACING {
            return Err(ConfigError::out_of_range(
                field("spacing"),
                *spacing,
                format!("(0, {MAX_STRUCTURE_SPACING}]"),
            ));
        }
    }

    for (index, ore) in f.standard_ores.iter().enumerate() {
        validate_ore(&format!("features.standardOres.{index}"), ore)?;
    }
    for (index, PeriodicOreSettings {
        ore,
        height_mean,
        height_std_deviation,
        height_spacing,
    }) in f.periodic_gaussian_ores.iter().enumerate()
    {
        let prefix = format!("features.periodicGaussianOres.{index}");
        validate_ore(&prefix, ore)?;
        finite(format!("{prefix}.heightMean"), *height_mean)?;
        positive(format!("{prefix}.heightStdDeviation"), *height_std_deviation)?;
        positive(format!("{prefix}.heightSpacing"), *height_spacing)?;
    }

    for (index, LakeSettings {
        surface_chance,
        main_chance,
        radius: basin_radius,
        depth,
        strength,
        ..
    }) in f.lakes.iter().enumerate()
    {
        let field = |name: &str| format!("features.lakes.{index}.{name}");
        for (name, chance) in [("surfaceChance", surface_chance), ("mainChance", main_chance)] {
            if let Some(curve) = chance
                && !curves.contains_key(curve)
            {
                return Err(ConfigError::unresolved(field(name), curve.clone()));
            }
        }
        radius(field("radius"), *basin_radius)?;
        radius(field("depth"), *depth)?;
        non_negative(field("strength"), *strength)?;
    }
    Ok(())
}

fn validate_ore(prefix: &str, ore: &StandardOreSettings) -> Result<(), ConfigError> {
    let field = |name: &str| format!("{prefix}.{name}");
    if ore.spawn_size == 0 || ore.spawn_size > MAX_VEIN_SIZE {
        return Err(ConfigError::out_of_range(
            field("spawnSize"),
            f64::from(ore.spawn_size),
            format!("1..={MAX_VEIN_SIZE}"),
        ));
    }
    if ore.spawn_tries > MAX_VEIN_TRIES {
        return Err(ConfigError::out_of_range(
            field("spawnTries"),
            f64::from(ore.spawn_tries),
            format!("0..={MAX_VEIN_TRIES}"),
        ));
    }
    unit(field("spawnProbability"), ore.spawn_probability)?;
    if let Some(min) = ore.min_height {
        finite(field("minHeight"), min)?;
    }
    if let Some(max) = ore.max_height {
        finite(field("maxHeight"), max)?;
    }
    if let (Some(min), Some(max)) = (ore.min_height, ore.max_height)
        && min > max
    {
        return Err(ConfigError::out_of_range(field("maxHeight"), max, format!(">= minHeight ({min})")));
    }
    Ok(())
}

fn build_area(index: usize, area: AreaDocument) -> Result<AreaPreset, ConfigError> {
    for axis in 0..3 {
        if area.min[axis] > area.max[axis] {
            return Err(ConfigError::out_of_range(
                format!("areas.{index}.max"),
                f64::from(area.max[axis]),
                format!(">= min ({})", area.min[axis]),
            ));
        }
    }
    Ok(AreaPreset {
        min: area.min,
        max: area.max,
        preset: Arc::new(GeneratorPreset::from_document(*area.preset)?),
    })
}

// ---------------------------------------------------------------------------
// Range helpers
// ---------------------------------------------------------------------------

fn finite(field: impl Into<String>, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, value, "a finite number"))
    }
}

fn positive(field: impl Into<String>, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, value, "> 0"))
    }
}

fn non_negative(field: impl Into<String>, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, value, ">= 0"))
    }
}

fn unit(field: impl Into<String>, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, value, "0..=1"))
    }
}

fn radius(field: impl Into<String>, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 && value <= MAX_FEATURE_RADIUS {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, value, format!("(0, {MAX_FEATURE_RADIUS}]")))
    }
}

fn feature_range(field: impl Into<String>, value: u32) -> Result<u32, ConfigError> {
    if value <= MAX_FEATURE_RANGE {
        Ok(value)
    } else {
        Err(ConfigError::out_of_range(field, f64::from(value), format!("0..={MAX_FEATURE_RANGE}")))
    }
}

fn step(field: impl Into<String>, value: u32) -> Result<(), ConfigError> {
    if ALLOWED_STEPS.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, f64::from(value), "one of 1, 2, 4, 8, 16"))
    }
}
