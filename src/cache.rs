//! Layer-keyed package cache and the bridge that hydrates images from it.
//!
//! Extraction is expensive (it runs commands inside a container), so
//! resolved package lists are cached per layer id and reused whenever the
//! same layer shows up again in any image. [`load_from_cache`] reports
//! whether the whole image was satisfied from cache; [`store_layers`]
//! persists the current state, best-effort and without transactionality.

use crate::image::{Image, Layer};
use crate::notice::{Notice, NoticeLevel};
use crate::package::{Package, PackageRecord};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub trait PackageCache {
    /// Cached package records for a layer id, or `None` on a miss.
    fn get_packages(&self, layer_id: &str) -> Option<Vec<PackageRecord>>;

    /// Persist a layer's current package list under its id.
    fn add_layer(&mut self, layer: &Layer);
}

/// Hydrate every package-less layer of `image` from the cache.
///
/// Returns `true` only if every layer ends the call with packages, either
/// pre-existing or loaded from cache. Layers that already hold packages are
/// neither queried nor mutated. A miss marks the image incomplete but all
/// remaining layers are still attempted.
pub fn load_from_cache(image: &mut Image, cache: &dyn PackageCache) -> bool {
    let mut is_full = true;
    let image_ref = image.origin_ref();
    for layer in &mut image.layers {
        if !layer.packages.is_empty() {
            continue;
        }
        match cache.get_packages(&layer.id) {
            // an empty record list is as good as a miss
            None => is_full = false,
            Some(records) if records.is_empty() => is_full = false,
            Some(records) => {
                layer.add_notice(Notice::new(
                    format!("{}{}", image_ref, layer.id),
                    format!("Loading packages from cache for layer {}", layer.id),
                    NoticeLevel::Info,
                ));
                for record in records {
                    layer.add_package(Package::from_record(record));
                }
            }
        }
    }
    is_full
}

/// Write every layer of the image into the cache.
pub fn store_layers(image: &Image, cache: &mut dyn PackageCache) {
    for layer in &image.layers {
        cache.add_layer(layer);
    }
}

/// In-memory cache, used in tests and as the fallback when no cache file is
/// configured.
#[derive(Debug, Default)]
pub struct MemoryCache {
    layers: HashMap<String, Vec<PackageRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PackageCache for MemoryCache {
    fn get_packages(&self, layer_id: &str) -> Option<Vec<PackageRecord>> {
        self.layers.get(layer_id).cloned()
    }

    fn add_layer(&mut self, layer: &Layer) {
        let records = layer.packages.iter().map(Package::to_record).collect();
        self.layers.insert(layer.id.clone(), records);
    }
}

/// File-backed cache: one JSON object mapping layer id to package records.
pub struct JsonFileCache {
    path: PathBuf,
    layers: HashMap<String, Vec<PackageRecord>>,
}

impl JsonFileCache {
    /// Open the cache file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let layers = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cache file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse cache file {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self { path, layers })
    }

    /// Write the cache back to disk.
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.layers)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write cache file {}", self.path.display()))
    }
}

impl PackageCache for JsonFileCache {
    fn get_packages(&self, layer_id: &str) -> Option<Vec<PackageRecord>> {
        self.layers.get(layer_id).cloned()
    }

    fn add_layer(&mut self, layer: &Layer) {
        let records = layer.packages.iter().map(Package::to_record).collect();
        self.layers.insert(layer.id.clone(), records);
    }
}
