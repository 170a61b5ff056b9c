//! Preset Registry - Store and reuse mapping presets
//!
//! Saves presets to disk and matches them to sheets based on their columns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PresetError, PresetResult};
use crate::models::MappingPreset;

/// Directory where presets are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".sheetmap/presets";

/// Environment variable overriding [`DEFAULT_REGISTRY_DIR`]
pub const REGISTRY_DIR_ENV: &str = "SHEETMAP_PRESET_DIR";

/// Minimum share of a preset's columns a sheet must have to be compatible
const MIN_COMPATIBILITY: f64 = 0.5;

/// A stored preset with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPreset {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// The mapping preset
    pub preset: MappingPreset,
    /// Sheet columns this preset was created for
    pub csv_columns: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this preset was used
    #[serde(default)]
    pub last_used: Option<String>,
    /// Number of times used
    #[serde(default)]
    pub use_count: u32,
}

/// Registry for managing mapping presets
#[derive(Debug)]
pub struct PresetRegistry {
    /// Directory where presets are stored
    registry_dir: PathBuf,
    /// Loaded presets (id -> preset)
    presets: HashMap<String, StoredPreset>,
}

impl PresetRegistry {
    /// Open the registry at `$SHEETMAP_PRESET_DIR`, or the default directory.
    pub fn new() -> Self {
        let dir = std::env::var(REGISTRY_DIR_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY_DIR.to_string());
        Self::with_dir(dir)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: PathBuf::from(dir.as_ref()),
            presets: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all presets from the registry directory.
    ///
    /// Files that are not stored presets are ignored.
    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.registry_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredPreset>(&content) {
                        self.presets.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// Get all stored presets, most used first
    pub fn list(&self) -> Vec<&StoredPreset> {
        let mut presets: Vec<_> = self.presets.values().collect();
        presets.sort_by(|a, b| b.use_count.cmp(&a.use_count).then_with(|| a.id.cmp(&b.id)));
        presets
    }

    /// Get a preset by ID
    pub fn get(&self, id: &str) -> Option<&StoredPreset> {
        self.presets.get(id)
    }

    /// Find presets compatible with the given sheet columns.
    ///
    /// Sorted by compatibility score, then by use count.
    pub fn find_compatible(&self, csv_columns: &[String]) -> Vec<(&StoredPreset, f64)> {
        let mut compatible: Vec<_> = self
            .presets
            .values()
            .filter_map(|p| {
                let score = compatibility(&p.csv_columns, csv_columns);
                (score > MIN_COMPATIBILITY).then_some((p, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });

        compatible
    }

    /// Save a new preset to the registry
    pub fn save(&mut self, preset: MappingPreset, name: &str, csv_columns: Vec<String>) -> PresetResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(name);
        let stored = StoredPreset {
            id: id.clone(),
            name: name.to_string(),
            preset,
            csv_columns,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.presets.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a preset from a `{ mapping, customKeys }` JSON file
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> PresetResult<String> {
        let content = fs::read_to_string(path)?;
        let preset = MappingPreset::from_json(&content)?;

        if preset.mapping.is_empty() && preset.custom_keys.is_empty() {
            return Err(PresetError::Invalid(format!(
                "{} has no mappings and no custom keys",
                path.display()
            )));
        }

        let preset_name = name.unwrap_or_else(|| path.file_stem().and_then(|s| s.to_str()).unwrap_or("imported"));

        let csv_columns = preset.source_columns();
        self.save(preset, preset_name, csv_columns)
    }

    /// Record a use of the preset
    pub fn touch(&mut self, id: &str) -> PresetResult<()> {
        let stored = self
            .presets
            .get_mut(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let stored = stored.clone();
        self.write(&stored)
    }

    /// Delete a preset from the registry
    pub fn delete(&mut self, id: &str) -> PresetResult<()> {
        if self.presets.remove(id).is_none() {
            return Err(PresetError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredPreset) -> PresetResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }

    /// Generate a unique ID from a name
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let slug = if slug.is_empty() { "preset".to_string() } else { slug };

        let base = format!("{}-{}", slug, chrono::Utc::now().timestamp_millis());
        let mut id = base.clone();
        let mut n = 1;
        while self.presets.contains_key(&id) {
            n += 1;
            id = format!("{}-{}", base, n);
        }
        id
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of `stored` columns present in `csv`, ignoring case
fn compatibility(stored: &[String], csv: &[String]) -> f64 {
    if stored.is_empty() {
        return 0.0;
    }

    let csv_lower: Vec<String> = csv.iter().map(|c| c.to_lowercase()).collect();
    let match_count = stored
        .iter()
        .filter(|col| csv_lower.contains(&col.to_lowercase()))
        .count();

    match_count as f64 / stored.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnMapping;
    use tempfile::tempdir;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn preset() -> MappingPreset {
        MappingPreset::new(
            vec![
                ColumnMapping::new("SKU", "sku"),
                ColumnMapping::new("Qty", "qty"),
            ],
            vec![],
        )
    }

    #[test]
    fn test_compatibility_score() {
        let stored = cols(&["SKU", "Title", "Qty"]);
        let csv = cols(&["SKU", "Title", "Price"]);

        let score = compatibility(&stored, &csv);
        assert!((score - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_case_insensitive_match() {
        let score = compatibility(&cols(&["sku", "QTY"]), &cols(&["SKU", "qty"]));
        assert!((score - 1.0).abs() < 0.01);
        assert_eq!(compatibility(&[], &cols(&["SKU"])), 0.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let id = {
            let mut registry = PresetRegistry::with_dir(dir.path());
            registry.save(preset(), "Orders Export", cols(&["SKU", "Qty"])).unwrap()
        };
        assert!(id.starts_with("orders-export-"));

        let registry = PresetRegistry::with_dir(dir.path());
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.name, "Orders Export");
        assert_eq!(stored.preset, preset());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let a = registry.save(preset(), "orders", vec![]).unwrap();
        let b = registry.save(preset(), "orders", vec![]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_find_compatible_ranking() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let partial = registry.save(preset(), "partial", cols(&["SKU", "Qty", "Notes"])).unwrap();
        let exact = registry.save(preset(), "exact", cols(&["sku", "qty"])).unwrap();
        registry.save(preset(), "other", cols(&["Customer", "City"])).unwrap();

        let found = registry.find_compatible(&cols(&["SKU", "Qty"]));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0.id, exact);
        assert_eq!(found[1].0.id, partial);
    }

    #[test]
    fn test_touch_updates_stats() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let id = registry.save(preset(), "orders", cols(&["SKU"])).unwrap();

        registry.touch(&id).unwrap();
        registry.touch(&id).unwrap();

        let reloaded = PresetRegistry::with_dir(dir.path());
        let stored = reloaded.get(&id).unwrap();
        assert_eq!(stored.use_count, 2);
        assert!(stored.last_used.is_some());
        assert!(matches!(registry.touch("missing"), Err(PresetError::NotFound(_))));
    }

    #[test]
    fn test_import_and_delete() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("orders.json");
        fs::write(&file, preset().to_json().unwrap()).unwrap();

        let mut registry = PresetRegistry::with_dir(dir.path().join("store"));
        let id = registry.import(&file, None).unwrap();
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.name, "orders");
        assert_eq!(stored.csv_columns, cols(&["Qty", "SKU"]));

        registry.delete(&id).unwrap();
        assert!(registry.get(&id).is_none());
        assert!(matches!(registry.delete(&id), Err(PresetError::NotFound(_))));
    }

    #[test]
    fn test_import_rejects_empty_preset() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, "{}").unwrap();

        let mut registry = PresetRegistry::with_dir(dir.path().join("store"));
        assert!(matches!(registry.import(&file, None), Err(PresetError::Invalid(_))));

        fs::write(&file, "not json").unwrap();
        assert!(matches!(registry.import(&file, None), Err(PresetError::Json(_))));
    }
}
