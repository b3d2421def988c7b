//! Ordered schema migrations over untyped preset documents.
//!
//! Each step upgrades a document by exactly one version, touches only the
//! keys it renames or reshapes and keeps everything else. Nested area presets
//! are upgraded with their parent; one without its own `version` is taken to
//! be at the parent's stored version, and only gains the key when a step ran.

use serde_json::{Map, Value, json};

use crate::document::document_version;
use crate::error::ConfigError;

/// The schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 4;

type Step = fn(&mut Map<String, Value>);

/// `STEPS[n]` upgrades a version `n + 1` document to `n + 2`.
const STEPS: [Step; (CURRENT_VERSION - 1) as usize] = [v1_to_v2, v2_to_v3, v3_to_v4];

/// Upgrade `doc` to [`CURRENT_VERSION`]. A current document is returned unchanged.
pub fn migrate(doc: Value) -> Result<Value, ConfigError> {
    migrate_with_default(doc, 1)
}

fn migrate_with_default(mut doc: Value, default_version: i64) -> Result<Value, ConfigError> {
    let Some(map) = doc.as_object_mut() else {
        return Err(ConfigError::schema("preset document must be a map"));
    };

    let version = if map.contains_key("version") {
        document_version(map)?
    } else {
        default_version
    };
    if version < 1 || version > i64::from(CURRENT_VERSION) {
        return Err(ConfigError::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    for step in &STEPS[(version - 1) as usize..] {
        step(map);
    }
    if version < i64::from(CURRENT_VERSION) {
        tracing::debug!(from = version, to = CURRENT_VERSION, "Migrated preset document");
        map.insert("version".to_owned(), json!(CURRENT_VERSION));
    }

    if let Some(Value::Array(areas)) = map.get_mut("areas") {
        for area in areas.iter_mut() {
            if let Some(preset) = area.get_mut("preset") {
                let nested = std::mem::take(preset);
                *preset = migrate_with_default(nested, version)?;
            }
        }
    }
    Ok(doc)
}

fn rename_key(map: &mut Map<String, Value>, from: &str, to: &str) {
    if map.contains_key(to) {
        return;
    }
    if let Some(value) = map.remove(from) {
        map.insert(to.to_owned(), value);
    }
}

/// The object under `key`, created empty when missing.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

fn objects_in<'a>(
    map: &'a mut Map<String, Value>,
    path: &[&str],
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    let mut cursor = Some(map);
    for key in &path[..path.len() - 1] {
        cursor = cursor
            .and_then(|m| m.get_mut(*key))
            .and_then(Value::as_object_mut);
    }
    cursor
        .and_then(|m| m.get_mut(path[path.len() - 1]))
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut().filter_map(Value::as_object_mut))
}

/// v1 -> v2: `octaveCount` becomes `octaves`; biome `height`/`variation`
/// become `heightBase`/`heightVariation`.
fn v1_to_v2(doc: &mut Map<String, Value>) {
    for node in objects_in(doc, &["noiseGraph", "nodes"]) {
        rename_key(node, "octaveCount", "octaves");
    }
    for biome in objects_in(doc, &["biomes"]) {
        rename_key(biome, "height", "heightBase");
        rename_key(biome, "variation", "heightVariation");
    }
}

/// v2 -> v3: boolean cave/ravine toggles become `{ enabled }` objects and the
/// top-level `waterLevel` moves under `terrain`.
fn v2_to_v3(doc: &mut Map<String, Value>) {
    if let Some(features) = doc.get_mut("features").and_then(Value::as_object_mut) {
        for key in ["caves", "ravines"] {
            let toggle = features.get(key).and_then(Value::as_bool);
            if let Some(enabled) = toggle {
                features.insert(key.to_owned(), json!({ "enabled": enabled }));
            }
        }
    }

    if let Some(water) = doc.remove("waterLevel")
        && let Some(terrain) = object_entry(doc, "terrain")
    {
        terrain.entry("waterLevel").or_insert(water);
    }
}

/// v3 -> v4: top-level ore lists move under `features`, and the
/// `waterLakes`/`lavaLakes` toggles with their rarities become
/// `features.lakes` entries backed by constant chance curves.
fn v3_to_v4(doc: &mut Map<String, Value>) {
    let mut moved: Vec<(String, Value)> = ["standardOres", "periodicGaussianOres"]
        .into_iter()
        .filter_map(|key| doc.remove(key).map(|ores| (key.to_owned(), ores)))
        .collect();

    let mut lakes = Vec::new();
    for (liquid, default_rarity) in [("water", 4.0), ("lava", 8.0)] {
        let enabled = doc.remove(&format!("{liquid}Lakes")).and_then(|v| v.as_bool());
        let rarity = doc.remove(&format!("{liquid}LakeRarity")).and_then(|v| v.as_f64());
        if enabled != Some(true) {
            continue;
        }
        let rarity = rarity.filter(|r| *r >= 1.0).unwrap_or(default_rarity);
        let curve = format!("{liquid}LakeChance");
        if let Some(curves) = object_entry(doc, "curves") {
            curves
                .entry(curve.as_str())
                .or_insert_with(|| json!({ "points": [[0.0, 1.0 / rarity]] }));
        }
        lakes.push(json!({ "name": liquid, "surfaceChance": curve, "mainChance": curve }));
    }
    if !lakes.is_empty() {
        moved.push(("lakes".to_owned(), Value::Array(lakes)));
    }

    if moved.is_empty() {
        return;
    }
    if let Some(features) = object_entry(doc, "features") {
        for (key, value) in moved {
            features.entry(key).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_document() -> Value {
        json!({
            "waterLevel": 63,
            "noiseGraph": {
                "nodes": [ { "id": "n", "type": "noise", "frequency": 0.01, "octaveCount": 4 } ],
                "output": "n"
            },
            "biomes": [ { "id": 1, "height": 64.0, "variation": 16.0, "custom": "kept" } ],
            "features": { "caves": true, "ravines": false },
            "unknownTopLevel": [1, 2, 3]
        })
    }

    #[test]
    fn test_v1_upgrades_to_current() {
        let doc = migrate(v1_document()).unwrap();
        assert_eq!(doc["version"], CURRENT_VERSION);
        assert_eq!(doc["noiseGraph"]["nodes"][0]["octaves"], 4);
        assert!(doc["noiseGraph"]["nodes"][0].get("octaveCount").is_none());
        assert_eq!(doc["biomes"][0]["heightBase"], 64.0);
        assert_eq!(doc["biomes"][0]["heightVariation"], 16.0);
        assert_eq!(doc["features"]["caves"], json!({ "enabled": true }));
        assert_eq!(doc["features"]["ravines"], json!({ "enabled": false }));
        assert_eq!(doc["terrain"]["waterLevel"], 63);
        assert!(doc.get("waterLevel").is_none());
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let doc = migrate(v1_document()).unwrap();
        assert_eq!(doc["unknownTopLevel"], json!([1, 2, 3]));
        assert_eq!(doc["biomes"][0]["custom"], "kept");
    }

    #[test]
    fn test_current_version_is_identity() {
        let mut current = v1_document();
        current["version"] = json!(CURRENT_VERSION);
        current["areas"] = json!([ { "min": [0, 0, 0], "max": [1, 1, 1], "preset": {
            "biomes": [ { "id": 2, "heightBase": 5.0 } ]
        } } ]);
        let migrated = migrate(current.clone()).unwrap();
        assert_eq!(migrated, current);
        assert!(migrated["areas"][0]["preset"].get("version").is_none());
    }

    #[test]
    fn test_migration_idempotent() {
        let once = migrate(v1_document()).unwrap();
        let twice = migrate(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_target_keys_win() {
        let doc = migrate(json!({
            "version": 2,
            "waterLevel": 10,
            "terrain": { "waterLevel": 40 }
        }))
        .unwrap();
        assert_eq!(doc["terrain"]["waterLevel"], 40);
    }

    #[test]
    fn test_unsupported_versions_fail_closed() {
        for version in [0, 5, 99, -1] {
            let err = migrate(json!({ "version": version })).unwrap_err();
            assert!(
                matches!(err, ConfigError::UnsupportedVersion { found, .. } if found == i64::from(version)),
                "version {version} should be rejected"
            );
        }
    }

    #[test]
    fn test_nested_area_presets_migrated() {
        let doc = migrate(json!({
            "version": 1,
            "areas": [ { "min": [0, 0, 0], "max": [1, 1, 1], "preset": {
                "biomes": [ { "id": 2, "height": 5.0 } ],
                "features": { "caves": false }
            } } ]
        }))
        .unwrap();
        let nested = &doc["areas"][0]["preset"];
        assert_eq!(nested["version"], CURRENT_VERSION);
        assert_eq!(nested["biomes"][0]["heightBase"], 5.0);
        assert_eq!(nested["features"]["caves"], json!({ "enabled": false }));
    }

    #[test]
    fn test_v3_lakes_and_ores_move_under_features() {
        let doc = migrate(json!({
            "version": 3,
            "waterLakes": true,
            "waterLakeRarity": 5,
            "lavaLakes": false,
            "lavaLakeRarity": 2,
            "standardOres": [ { "name": "coal", "spawnSize": 17 } ],
            "periodicGaussianOres": [],
            "features": { "caves": { "enabled": false } }
        }))
        .unwrap();
        assert_eq!(doc["version"], CURRENT_VERSION);
        for key in ["waterLakes", "waterLakeRarity", "lavaLakes", "lavaLakeRarity", "standardOres"] {
            assert!(doc.get(key).is_none(), "`{key}` should be consumed");
        }
        let features = &doc["features"];
        assert_eq!(features["caves"], json!({ "enabled": false }));
        assert_eq!(features["standardOres"][0]["name"], "coal");
        assert_eq!(features["periodicGaussianOres"], json!([]));
        assert_eq!(features["lakes"].as_array().map(Vec::len), Some(1), "disabled lava lakes are dropped");
        assert_eq!(features["lakes"][0]["name"], "water");
        assert_eq!(features["lakes"][0]["surfaceChance"], "waterLakeChance");
        assert_eq!(doc["curves"]["waterLakeChance"]["points"], json!([[0.0, 0.2]]));
    }

    #[test]
    fn test_v3_without_legacy_keys_gains_no_sections() {
        let doc = migrate(json!({ "version": 3, "biomes": [] })).unwrap();
        assert_eq!(doc, json!({ "version": CURRENT_VERSION, "biomes": [] }));
    }

    #[test]
    fn test_nested_preset_newer_than_current_rejected() {
        let err = migrate(json!({
            "version": 4,
            "areas": [ { "min": [0, 0, 0], "max": [0, 0, 0], "preset": { "version": 7 } } ]
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 7, .. }));
    }
}
