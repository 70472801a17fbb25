//! Static per-provider metadata loaded from a plugins directory.
//!
//! Manifests describe providers independently of whether a live
//! implementation is registered, so a catalog can advertise a provider whose
//! implementation is missing on this build.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "plugin.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManifestLine {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub scope: String,
    pub primary_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginManifest {
    pub schema_version: i64,
    pub id: String,
    pub name: String,
    pub version: String,
    pub entry: String,
    pub icon: String,
    pub brand_color: String,
    pub lines: Vec<ManifestLine>,
}

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: PluginManifest,
    pub plugin_dir: PathBuf,
    /// Embeddable icon, or empty when the manifest has no icon or the icon
    /// file could not be read.
    pub icon_data_url: String,
}

/// Reads every `<dir>/<sub>/plugin.json`. An unlistable directory is an
/// error; individual manifests that are missing, unparsable, or lack an id
/// are skipped. The `BTreeMap` keys give the lexicographic catalog order.
pub fn load_manifests(dir: &Path) -> std::io::Result<BTreeMap<String, LoadedManifest>> {
    let entries = std::fs::read_dir(dir)?;

    let mut manifests = BTreeMap::new();
    for entry in entries.flatten() {
        let plugin_dir = entry.path();
        if !plugin_dir.is_dir() {
            continue;
        }

        let Ok(data) = std::fs::read_to_string(plugin_dir.join(MANIFEST_FILE)) else {
            continue;
        };
        let manifest: PluginManifest = match serde_json::from_str(&data) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::debug!(dir = %plugin_dir.display(), error = %err, "skipping unparsable manifest");
                continue;
            }
        };
        if manifest.id.is_empty() {
            continue;
        }

        let icon_data_url = if manifest.icon.is_empty() {
            String::new()
        } else {
            match std::fs::read(plugin_dir.join(&manifest.icon)) {
                Ok(bytes) => format!("data:image/svg+xml;base64,{}", STANDARD.encode(bytes)),
                Err(_) => String::new(),
            }
        };

        manifests.insert(
            manifest.id.clone(),
            LoadedManifest {
                manifest,
                plugin_dir,
                icon_data_url,
            },
        );
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(plugins_dir: &Path, id: &str, name: &str) {
        let plugin_dir = plugins_dir.join(id);
        std::fs::create_dir_all(&plugin_dir).unwrap();
        let manifest = format!(r#"{{"id":"{id}","name":"{name}","icon":"icon.svg"}}"#);
        std::fs::write(plugin_dir.join("plugin.json"), manifest).unwrap();
        std::fs::write(plugin_dir.join("icon.svg"), "<svg></svg>").unwrap();
    }

    #[test]
    fn loads_and_sorts_while_skipping_invalid_manifests() {
        let dir = tempfile::tempdir().unwrap();

        write_manifest(dir.path(), "zeta", "Zeta");
        write_manifest(dir.path(), "alpha", "Alpha");

        let invalid = dir.path().join("invalid");
        std::fs::create_dir_all(&invalid).unwrap();
        std::fs::write(invalid.join("plugin.json"), "{not-json").unwrap();

        let manifests = load_manifests(dir.path()).unwrap();

        let order: Vec<&String> = manifests.keys().collect();
        assert_eq!(order, ["alpha", "zeta"]);

        let alpha = &manifests["alpha"];
        assert_eq!(alpha.manifest.name, "Alpha");
        assert!(alpha
            .icon_data_url
            .starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn skips_manifest_without_id() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("anonymous");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("plugin.json"), r#"{"name":"No Id"}"#).unwrap();

        assert!(load_manifests(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn skips_subdirectory_without_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        write_manifest(dir.path(), "real", "Real");

        let manifests = load_manifests(dir.path()).unwrap();
        assert_eq!(manifests.len(), 1);
        assert!(manifests.contains_key("real"));
    }

    #[test]
    fn icon_read_failure_degrades_to_empty_url() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("noicon");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("plugin.json"),
            r#"{"id":"noicon","name":"No Icon","icon":"missing.svg"}"#,
        )
        .unwrap();

        let manifests = load_manifests(dir.path()).unwrap();
        assert_eq!(manifests["noicon"].icon_data_url, "");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifests(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn declared_line_schema_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("lines");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("plugin.json"),
            r#"{
                "schemaVersion": 1,
                "id": "lines",
                "name": "Lines",
                "lines": [
                    {"type": "progress", "label": "Session", "scope": "session", "primaryOrder": 1},
                    {"type": "badge", "label": "Tier", "scope": "account"}
                ]
            }"#,
        )
        .unwrap();

        let manifests = load_manifests(dir.path()).unwrap();
        let manifest = &manifests["lines"].manifest;
        assert_eq!(manifest.schema_version, 1);
        assert_eq!(manifest.lines.len(), 2);
        assert_eq!(manifest.lines[0].kind, "progress");
        assert_eq!(manifest.lines[0].primary_order, Some(1));
        assert_eq!(manifest.lines[1].primary_order, None);
    }
}
