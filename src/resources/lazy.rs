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

//! Load-on-first-access asset slots.
//!
//! A [`LazyAsset`] is either file-backed (materialized through a
//! [`ContentLoader`] on first access, unloadable, reloadable) or generated
//! (constructed in memory, always loaded, never unloaded).

use crate::error::{AssetError, Result};
use crate::reclaim::ReclaimTimer;
use crate::resources::{Asset, ContentLoader};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

enum Slot<T> {
    Unloaded,
    Loaded(Arc<T>),
    /// Disposed instance kept for in-place reload
    Retired(T),
}

enum Source<T: Asset> {
    File {
        path: PathBuf,
        loader: Arc<dyn ContentLoader<T>>,
    },
    Generated,
}

/// Per-table bookkeeping shared by every asset the table owns.
///
/// Replaces per-asset load/unload callbacks: the table attaches one tracker
/// to each entry, and loads/unloads update it directly.
#[derive(Default)]
pub(crate) struct LoadTracker {
    loaded: AtomicU16,
    timer: Option<Arc<ReclaimTimer>>,
}

impl LoadTracker {
    pub(crate) fn new(timer: Option<Arc<ReclaimTimer>>) -> Self {
        Self {
            loaded: AtomicU16::new(0),
            timer,
        }
    }

    fn on_load(&self) {
        self.count_loaded();
        if let Some(timer) = &self.timer {
            timer.notify();
        }
    }

    pub(crate) fn count_loaded(&self) {
        self.loaded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn count_unloaded(&self) {
        // Never below zero, even if an entry was attached twice.
        let _ = self
            .loaded
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn loaded(&self) -> u16 {
        self.loaded.load(Ordering::Acquire)
    }
}

/// A single named resource whose value is built on first access.
///
/// File-backed assets can be unloaded and transparently reloaded; generated
/// ones are created loaded and stay that way.
pub struct LazyAsset<T: Asset> {
    source: Source<T>,
    can_be_unloaded: bool,
    slot: Mutex<Slot<T>>,
    tracker: Option<Arc<LoadTracker>>,
}

impl<T: Asset> LazyAsset<T> {
    /// Unloaded asset materialized from `path` on first access
    pub fn file_backed(path: impl Into<PathBuf>, loader: Arc<dyn ContentLoader<T>>) -> Self {
        Self {
            source: Source::File {
                path: path.into(),
                loader,
            },
            can_be_unloaded: true,
            slot: Mutex::new(Slot::Unloaded),
            tracker: None,
        }
    }

    /// Asset built in memory; always loaded and never unloadable
    pub fn generated(value: T) -> Self {
        Self {
            source: Source::Generated,
            can_be_unloaded: false,
            slot: Mutex::new(Slot::Loaded(Arc::new(value))),
            tracker: None,
        }
    }

    /// Exclude this asset from unloads and bulk sweeps
    pub fn pinned(mut self) -> Self {
        self.can_be_unloaded = false;
        self
    }

    pub(crate) fn set_unloadable(&mut self, can_be_unloaded: bool) {
        if let Source::File { .. } = self.source {
            self.can_be_unloaded = can_be_unloaded;
        }
    }

    pub(crate) fn attach(&mut self, tracker: Arc<LoadTracker>) {
        if self.is_loaded() {
            tracker.count_loaded();
        }
        self.tracker = Some(tracker);
    }

    pub(crate) fn detach(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            if self.is_loaded() {
                tracker.count_unloaded();
            }
        }
    }

    /// Source path; `None` for generated assets
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File { path, .. } => Some(path),
            Source::Generated => None,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self.source, Source::Generated)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Loaded(_))
    }

    pub fn can_be_unloaded(&self) -> bool {
        self.can_be_unloaded
    }

    /// Materialize the asset. Loading an already loaded asset is a no-op.
    ///
    /// Loader errors propagate and leave the asset unloaded.
    pub fn load(&self) -> Result<()> {
        self.value().map(|_| ())
    }

    /// Current value, loading it first if needed
    pub fn value(&self) -> Result<Arc<T>> {
        let mut slot = self.slot.lock();
        if let Slot::Loaded(value) = &*slot {
            return Ok(value.clone());
        }

        let Source::File { path, loader } = &self.source else {
            // Generated assets are created loaded and never unloaded.
            return Err(AssetError::NotLoaded("<generated>".to_string()));
        };

        let value = match std::mem::replace(&mut *slot, Slot::Unloaded) {
            Slot::Retired(mut disposed) => {
                loader.reload(path, &mut disposed)?;
                disposed
            }
            _ => loader.load(path)?,
        };
        let value = Arc::new(value);
        *slot = Slot::Loaded(value.clone());
        drop(slot);

        tracing::trace!(path = %path.display(), "asset loaded");
        if let Some(tracker) = &self.tracker {
            tracker.on_load();
        }
        Ok(value)
    }

    /// Value if already loaded; never triggers a load
    pub fn try_value(&self) -> Option<Arc<T>> {
        match &*self.slot.lock() {
            Slot::Loaded(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Dispose the value.
    ///
    /// If no handle outside this slot still holds the value it is disposed via
    /// [`Asset::on_unload`] and kept for in-place reload; otherwise the slot
    /// simply lets go of it.
    pub fn unload(&self) -> Result<()> {
        if !self.can_be_unloaded {
            return Err(AssetError::UnloadOfNonUnloadable(self.describe()));
        }

        let mut slot = self.slot.lock();
        let Slot::Loaded(value) = std::mem::replace(&mut *slot, Slot::Unloaded) else {
            return Err(AssetError::NotLoaded(self.describe()));
        };
        if let Ok(mut owned) = Arc::try_unwrap(value) {
            owned.on_unload();
            *slot = Slot::Retired(owned);
        }
        drop(slot);

        if let Some(tracker) = &self.tracker {
            tracker.count_unloaded();
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.source {
            Source::File { path, .. } => path.display().to_string(),
            Source::Generated => "<generated>".to_string(),
        }
    }
}

impl<T: Asset> std::fmt::Debug for LazyAsset<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyAsset")
            .field("path", &self.path())
            .field("loaded", &self.is_loaded())
            .field("can_be_unloaded", &self.can_be_unloaded)
            .finish()
    }
}
