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

use crate::config::AssetConfig;
use crate::error::{AssetError, Result};
use crate::reclaim::ReclaimTimer;
use crate::resources::{
    file_key, list_files, Asset, ContentLoader, EffectResource, FileContentLoader, Phase,
    ResourceTable, SoundResource, TableStats, TextureResource,
};
use crate::themes::{
    CancelToken, LoadProgress, LoadSummary, PipelineSettings, Theme, ThemeDecoder,
    ThemeLoadPipeline, ThemeRegistry,
};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Content loaders used by [`AssetManager::discover`]
#[derive(Clone)]
pub struct AssetLoaders {
    pub textures: Arc<dyn ContentLoader<TextureResource>>,
    pub effects: Arc<dyn ContentLoader<EffectResource>>,
    pub sounds: Arc<dyn ContentLoader<SoundResource>>,
}

impl Default for AssetLoaders {
    fn default() -> Self {
        Self {
            textures: Arc::new(FileContentLoader::new()),
            effects: Arc::new(FileContentLoader::new()),
            sounds: Arc::new(FileContentLoader::new()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManagerStats {
    pub textures: TableStats,
    pub effects: TableStats,
    pub sounds: TableStats,
    pub themes: usize,
}

struct ThemeLoad {
    progress: Arc<LoadProgress>,
    cancel: CancelToken,
    handle: Option<JoinHandle<LoadSummary>>,
}

/// Central asset context.
///
/// Built once at startup and handed to whatever needs lookups. Owns the three
/// resource tables, the theme registry and the reclaim timer every load pings.
pub struct AssetManager {
    config: AssetConfig,
    textures: ResourceTable<TextureResource>,
    effects: ResourceTable<EffectResource>,
    sounds: ResourceTable<SoundResource>,
    sound_names: Arc<RwLock<Vec<String>>>,
    themes: Arc<ThemeRegistry>,
    timer: Arc<ReclaimTimer>,
    theme_load: Option<ThemeLoad>,
}

impl AssetManager {
    /// `release` runs whenever the reclaim timer expires
    pub fn new(config: AssetConfig, release: impl FnMut() + Send + 'static) -> Self {
        let timer = Arc::new(ReclaimTimer::new(config.reclaim_base_ticks, release));

        let sound_names = Arc::new(RwLock::new(Vec::new()));
        let mut sounds = ResourceTable::with_timer("sounds", timer.clone());
        let names = sound_names.clone();
        sounds.on_phase_change(move |phase, keys| {
            if phase == Phase::Frozen {
                *names.write() = keys.to_vec();
            }
        });

        Self {
            textures: ResourceTable::with_timer("textures", timer.clone()),
            effects: ResourceTable::with_timer("effects", timer.clone()),
            sounds,
            sound_names,
            themes: Arc::new(ThemeRegistry::new(config.theme_collision)),
            timer,
            theme_load: None,
            config,
        }
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Register one lazy asset per file under the content root, pin the
    /// configured textures and freeze all tables.
    ///
    /// Returns the number of newly registered assets.
    pub fn discover(&mut self, loaders: &AssetLoaders) -> Result<usize> {
        let mut registered = 0;
        registered += register_dir(&mut self.textures, &self.config.textures_dir(), &loaders.textures)?;
        registered += register_dir(&mut self.effects, &self.config.effects_dir(), &loaders.effects)?;
        registered += register_dir(&mut self.sounds, &self.config.sfx_dir(), &loaders.sounds)?;

        for key in &self.config.pinned_textures {
            match self.textures.set_unloadable(key, false) {
                Ok(()) => {}
                Err(AssetError::AssetNotFound(_)) => {
                    tracing::warn!(key = %key, "pinned texture not found");
                }
                Err(e) => return Err(e),
            }
        }

        self.textures.freeze();
        self.effects.freeze();
        self.sounds.freeze();

        tracing::info!(
            textures = self.textures.len(),
            effects = self.effects.len(),
            sounds = self.sounds.len(),
            "asset discovery complete"
        );
        Ok(registered)
    }

    pub fn textures(&self) -> &ResourceTable<TextureResource> {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut ResourceTable<TextureResource> {
        &mut self.textures
    }

    pub fn effects(&self) -> &ResourceTable<EffectResource> {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut ResourceTable<EffectResource> {
        &mut self.effects
    }

    pub fn sounds(&self) -> &ResourceTable<SoundResource> {
        &self.sounds
    }

    pub fn sounds_mut(&mut self) -> &mut ResourceTable<SoundResource> {
        &mut self.sounds
    }

    pub fn texture(&self, key: &str) -> Result<Arc<TextureResource>> {
        self.textures.value(key)
    }

    pub fn effect(&self, key: &str) -> Result<Arc<EffectResource>> {
        self.effects.value(key)
    }

    pub fn sound(&self, key: &str) -> Result<Arc<SoundResource>> {
        self.sounds.value(key)
    }

    /// Sound name for a frozen id, as of the last freeze
    pub fn sound_name(&self, id: usize) -> Option<String> {
        self.sound_names.read().get(id).cloned()
    }

    pub fn themes(&self) -> &Arc<ThemeRegistry> {
        &self.themes
    }

    pub fn theme(&self, key: &str) -> Option<Arc<Theme>> {
        self.themes.get(key)
    }

    pub fn timer(&self) -> &Arc<ReclaimTimer> {
        &self.timer
    }

    /// Start loading every `Themes/*.ogg` file on a background thread.
    ///
    /// Stale cache entries are removed first, on the calling thread. Calling
    /// this while a load is still running returns the running load's progress.
    pub fn start_themes(&mut self, decoder: Arc<dyn ThemeDecoder>) -> Result<Arc<LoadProgress>> {
        if let Some(load) = &self.theme_load {
            if !load.progress.is_finished() {
                tracing::warn!("theme load already running");
                return Ok(load.progress.clone());
            }
        }
        self.join_themes();

        let themes_dir = self.config.themes_dir();
        let sources = if themes_dir.is_dir() {
            list_files(&themes_dir, Some("ogg"))?
        } else {
            tracing::warn!(dir = %themes_dir.display(), "no themes directory");
            Vec::new()
        };

        let settings = PipelineSettings {
            cache_dir: self.config.cache_themes.then(|| self.config.cache_dir()),
            workers: self.config.effective_workers(),
        };
        let pipeline = ThemeLoadPipeline::new(settings, decoder, self.themes.clone())
            .with_timer(self.timer.clone());

        match pipeline.scan_and_reconcile_cache(&sources) {
            Ok(report) if !report.removed.is_empty() => {
                tracing::info!(removed = report.removed.len(), "reconciled theme cache");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("theme cache reconcile failed: {e}"),
        }

        let progress = pipeline.progress();
        let cancel = pipeline.cancel_token();
        let handle = Arc::new(pipeline).spawn(sources)?;
        self.theme_load = Some(ThemeLoad {
            progress: progress.clone(),
            cancel,
            handle: Some(handle),
        });
        Ok(progress)
    }

    pub fn theme_progress(&self) -> Option<Arc<LoadProgress>> {
        self.theme_load.as_ref().map(|load| load.progress.clone())
    }

    /// Whether a theme load was started and has finished
    pub fn themes_ready(&self) -> bool {
        self.theme_load
            .as_ref()
            .is_some_and(|load| load.progress.is_finished())
    }

    pub fn cancel_themes(&self) {
        if let Some(load) = &self.theme_load {
            load.cancel.cancel();
        }
    }

    /// Wait for the background theme load and return its summary
    pub fn join_themes(&mut self) -> Option<LoadSummary> {
        let handle = self.theme_load.as_mut()?.handle.take()?;
        match handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                tracing::error!("theme loader thread panicked");
                None
            }
        }
    }

    /// Advance the reclaim timer one frame. Returns true if it fired.
    pub fn tick(&self) -> bool {
        self.timer.tick()
    }

    /// Unload every loaded, unloadable asset in all tables
    pub fn clear_all(&self) -> usize {
        let unloaded = self.textures.clear_all() + self.effects.clear_all() + self.sounds.clear_all();
        tracing::info!(unloaded, "cleared asset tables");
        unloaded
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            textures: self.textures.stats(),
            effects: self.effects.stats(),
            sounds: self.sounds.stats(),
            themes: self.themes.len(),
        }
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.cancel_themes();
        self.join_themes();
    }
}

fn register_dir<T: Asset>(
    table: &mut ResourceTable<T>,
    dir: &Path,
    loader: &Arc<dyn ContentLoader<T>>,
) -> Result<usize> {
    if !dir.is_dir() {
        tracing::warn!(table = table.name(), dir = %dir.display(), "content directory missing");
        return Ok(0);
    }

    let mut registered = 0;
    for path in list_files(dir, None)? {
        let Some(key) = file_key(&path) else {
            tracing::warn!(path = %path.display(), "skipping file without a usable name");
            continue;
        };
        match table.add_file(key, path, loader.clone()) {
            Ok(()) => registered += 1,
            Err(AssetError::DuplicateKey(key)) => {
                tracing::warn!(table = table.name(), key = %key, "duplicate asset name skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(registered)
}
