// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Two-phase resource table.
//!
//! Registration happens in the `Building` phase, backed by an insertion-ordered
//! map. [`ResourceTable::freeze`] moves every entry into a pre-sized, immutable
//! lookup structure with dense ids; [`ResourceTable::unfreeze`] moves them back.
//! The storage enum guarantees exactly one of the two layouts exists at a time.
//!
//! ```
//! use archetype_assets::resources::{LazyAsset, ResourceTable, TextureResource};
//!
//! let mut table = ResourceTable::new("textures");
//! let pixel = TextureResource::new("Pixel".to_string(), vec![255; 4]);
//! table.add("Pixel", LazyAsset::generated(pixel)).unwrap();
//! table.freeze();
//!
//! assert!(table.is_frozen());
//! assert_eq!(table.id_of("Pixel"), Some(0));
//! assert_eq!(table.value("Pixel").unwrap().path(), "Pixel");
//! ```

use crate::error::{AssetError, Result};
use crate::reclaim::ReclaimTimer;
use crate::resources::lazy::LoadTracker;
use crate::resources::{Asset, ContentLoader, LazyAsset, TableStats};
use ahash::AHashMap;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Which layout a table is in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Building,
    Frozen,
}

/// Called after every freeze and unfreeze with the table's keys in id order
pub type PhaseHook = Box<dyn FnMut(Phase, &[String]) + Send>;

struct FrozenMap<T: Asset> {
    index: AHashMap<String, usize>,
    keys: Box<[String]>,
    assets: Box<[LazyAsset<T>]>,
}

impl<T: Asset> FrozenMap<T> {
    fn from_building(map: IndexMap<String, LazyAsset<T>>) -> Self {
        let mut index = AHashMap::with_capacity(map.len());
        let mut keys = Vec::with_capacity(map.len());
        let mut assets = Vec::with_capacity(map.len());
        for (id, (key, asset)) in map.into_iter().enumerate() {
            index.insert(key.clone(), id);
            keys.push(key);
            assets.push(asset);
        }
        Self {
            index,
            keys: keys.into_boxed_slice(),
            assets: assets.into_boxed_slice(),
        }
    }

    fn into_building(self) -> IndexMap<String, LazyAsset<T>> {
        let mut map = IndexMap::with_capacity(self.keys.len());
        for (key, asset) in self.keys.into_vec().into_iter().zip(self.assets.into_vec()) {
            map.insert(key, asset);
        }
        map
    }

    fn get(&self, key: &str) -> Option<&LazyAsset<T>> {
        self.index.get(key).map(|&id| &self.assets[id])
    }
}

enum Storage<T: Asset> {
    Building(IndexMap<String, LazyAsset<T>>),
    Frozen(FrozenMap<T>),
}

/// Named collection of lazy assets with a building and a frozen phase.
///
/// Mutation happens on the update thread; lookups hand out `&LazyAsset` that
/// load on first access.
pub struct ResourceTable<T: Asset> {
    name: String,
    storage: Storage<T>,
    tracker: Arc<LoadTracker>,
    hooks: Vec<PhaseHook>,
}

impl<T: Asset> ResourceTable<T> {
    /// Empty table in the building phase
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: Storage::Building(IndexMap::new()),
            tracker: Arc::new(LoadTracker::new(None)),
            hooks: Vec::new(),
        }
    }

    /// Empty table whose loads ping `timer`
    pub fn with_timer(name: impl Into<String>, timer: Arc<ReclaimTimer>) -> Self {
        Self {
            tracker: Arc::new(LoadTracker::new(Some(timer))),
            ..Self::new(name)
        }
    }

    /// Name used in log output
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        match self.storage {
            Storage::Building(_) => Phase::Building,
            Storage::Frozen(_) => Phase::Frozen,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.phase() == Phase::Frozen
    }

    /// Register a hook fired after each freeze and unfreeze
    pub fn on_phase_change(&mut self, hook: impl FnMut(Phase, &[String]) + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Move the entries out in building layout, thawing a frozen table.
    /// Leaves an empty building map behind until the caller puts them back.
    fn take_building(&mut self) -> IndexMap<String, LazyAsset<T>> {
        let empty = Storage::Building(IndexMap::new());
        match std::mem::replace(&mut self.storage, empty) {
            Storage::Building(map) => map,
            Storage::Frozen(frozen) => {
                let map = frozen.into_building();
                tracing::debug!(table = %self.name, entries = map.len(), "table unfrozen");
                if !self.hooks.is_empty() {
                    let keys: Vec<String> = map.keys().cloned().collect();
                    for hook in &mut self.hooks {
                        hook(Phase::Building, &keys);
                    }
                }
                map
            }
        }
    }

    /// Run `edit` against the building map, unfreezing first if needed
    fn edit<R>(&mut self, edit: impl FnOnce(&mut IndexMap<String, LazyAsset<T>>) -> R) -> R {
        let mut map = self.take_building();
        let result = edit(&mut map);
        self.storage = Storage::Building(map);
        result
    }

    /// Register an asset. Unfreezes the table first if needed.
    pub fn add(&mut self, key: impl Into<String>, mut asset: LazyAsset<T>) -> Result<()> {
        let key = key.into();
        let tracker = self.tracker.clone();
        self.edit(|map| {
            if map.contains_key(&key) {
                return Err(AssetError::DuplicateKey(key));
            }
            asset.attach(tracker);
            map.insert(key, asset);
            Ok(())
        })
    }

    /// Register a file-backed asset
    pub fn add_file(
        &mut self,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        loader: Arc<dyn ContentLoader<T>>,
    ) -> Result<()> {
        self.add(key, LazyAsset::file_backed(path, loader))
    }

    /// Remove an asset, unfreezing the table first if needed
    pub fn remove(&mut self, key: &str) -> Result<LazyAsset<T>> {
        let mut asset = self
            .edit(|map| map.shift_remove(key))
            .ok_or_else(|| AssetError::AssetNotFound(key.to_string()))?;
        asset.detach();
        Ok(asset)
    }

    /// Load-on-demand handle for `key`
    pub fn get(&self, key: &str) -> Option<&LazyAsset<T>> {
        match &self.storage {
            Storage::Building(map) => map.get(key),
            Storage::Frozen(frozen) => frozen.get(key),
        }
    }

    /// Value for `key`, loading it if needed
    pub fn value(&self, key: &str) -> Result<Arc<T>> {
        self.get(key)
            .ok_or_else(|| AssetError::AssetNotFound(key.to_string()))?
            .value()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Dense id assigned at freeze time
    pub fn id_of(&self, key: &str) -> Option<usize> {
        match &self.storage {
            Storage::Frozen(frozen) => frozen.index.get(key).copied(),
            Storage::Building(_) => None,
        }
    }

    pub fn key_of(&self, id: usize) -> Option<&str> {
        match &self.storage {
            Storage::Frozen(frozen) => frozen.keys.get(id).map(String::as_str),
            Storage::Building(_) => None,
        }
    }

    pub fn get_by_id(&self, id: usize) -> Option<&LazyAsset<T>> {
        match &self.storage {
            Storage::Frozen(frozen) => frozen.assets.get(id),
            Storage::Building(_) => None,
        }
    }

    /// Switch to the read-optimized layout. No-op when already frozen.
    pub fn freeze(&mut self) {
        let Storage::Building(map) = &mut self.storage else {
            return;
        };
        let frozen = FrozenMap::from_building(std::mem::take(map));
        self.storage = Storage::Frozen(frozen);

        tracing::debug!(table = %self.name, entries = self.len(), "table frozen");
        if let Storage::Frozen(frozen) = &self.storage {
            for hook in &mut self.hooks {
                hook(Phase::Frozen, &frozen.keys);
            }
        }
    }

    /// Switch back to the mutable layout. No-op when already building.
    pub fn unfreeze(&mut self) {
        let map = self.take_building();
        self.storage = Storage::Building(map);
    }

    /// Keys in registration (id) order
    pub fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match &self.storage {
            Storage::Building(map) => Box::new(map.keys().map(String::as_str)),
            Storage::Frozen(frozen) => Box::new(frozen.keys.iter().map(String::as_str)),
        }
    }

    /// Entries in registration (id) order
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, &LazyAsset<T>)> + '_> {
        match &self.storage {
            Storage::Building(map) => Box::new(map.iter().map(|(k, v)| (k.as_str(), v))),
            Storage::Frozen(frozen) => Box::new(
                frozen
                    .keys
                    .iter()
                    .map(String::as_str)
                    .zip(frozen.assets.iter()),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Building(map) => map.len(),
            Storage::Frozen(frozen) => frozen.assets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries currently holding a value
    pub fn loaded_count(&self) -> u16 {
        self.tracker.loaded()
    }

    /// Mark an entry pinned (or unpinned). Unfreezes the table first if needed.
    pub fn set_unloadable(&mut self, key: &str, can_be_unloaded: bool) -> Result<()> {
        self.edit(|map| match map.get_mut(key) {
            Some(asset) => {
                asset.set_unloadable(can_be_unloaded);
                Ok(())
            }
            None => Err(AssetError::AssetNotFound(key.to_string())),
        })
    }

    /// Unload one entry. Returns `Ok(false)` if it was not loaded.
    pub fn unload(&self, key: &str) -> Result<bool> {
        let asset = self
            .get(key)
            .ok_or_else(|| AssetError::AssetNotFound(key.to_string()))?;
        if !asset.can_be_unloaded() {
            return Err(AssetError::UnloadOfNonUnloadable(key.to_string()));
        }
        if !asset.is_loaded() {
            return Ok(false);
        }
        asset.unload()?;
        Ok(true)
    }

    /// Unload every loaded, unloadable entry. Returns how many were unloaded.
    pub fn clear_all(&self) -> usize {
        let mut unloaded = 0;
        for (key, asset) in self.iter() {
            if !asset.can_be_unloaded() || !asset.is_loaded() {
                continue;
            }
            match asset.unload() {
                Ok(()) => unloaded += 1,
                Err(e) => tracing::warn!(table = %self.name, key, "unload failed: {e}"),
            }
        }
        tracing::debug!(table = %self.name, unloaded, "cleared table");
        unloaded
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            entries: self.len(),
            loaded: self.loaded_count(),
            pinned: self.iter().filter(|(_, a)| !a.can_be_unloaded()).count(),
            frozen: self.is_frozen(),
        }
    }
}

impl<T: Asset> std::fmt::Debug for ResourceTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTable")
            .field("name", &self.name)
            .field("phase", &self.phase())
            .field("entries", &self.len())
            .field("loaded", &self.loaded_count())
            .finish()
    }
}
