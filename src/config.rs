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

//! Asset configuration.
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```
//! use archetype_assets::config::AssetConfig;
//!
//! let config = AssetConfig::from_json_str(r#"{ "cache_themes": false }"#).unwrap();
//! assert!(!config.cache_themes);
//! assert_eq!(config.reclaim_base_ticks, 120);
//! ```

use crate::error::Result;
use crate::themes::CollisionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default reclaim timer interval, in update ticks.
pub const DEFAULT_RECLAIM_TICKS: u16 = 120;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Root holding `Textures/`, `Effects/`, `SFX/` and `Themes/`
    pub content_root: PathBuf,
    /// Write and read decoded themes from `CachedThemes/`
    pub cache_themes: bool,
    /// Theme decode workers; 0 means available parallelism
    pub worker_count: usize,
    /// Base interval of the reclaim timer
    pub reclaim_base_ticks: u16,
    /// What the theme registry does when two files share a key
    pub theme_collision: CollisionPolicy,
    /// Texture keys that are never unloaded
    pub pinned_textures: Vec<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("Content"),
            cache_themes: true,
            worker_count: 0,
            reclaim_base_ticks: DEFAULT_RECLAIM_TICKS,
            theme_collision: CollisionPolicy::KeepFirst,
            pinned_textures: Vec::new(),
        }
    }
}

impl AssetConfig {
    /// Default config rooted at `content_root`
    pub fn with_root(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            ..Self::default()
        }
    }

    /// Parse config from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn textures_dir(&self) -> PathBuf {
        self.content_root.join("Textures")
    }

    pub fn effects_dir(&self) -> PathBuf {
        self.content_root.join("Effects")
    }

    pub fn sfx_dir(&self) -> PathBuf {
        self.content_root.join("SFX")
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.content_root.join("Themes")
    }

    /// `CachedThemes/` sits next to `Themes/`
    pub fn cache_dir(&self) -> PathBuf {
        self.content_root.join("CachedThemes")
    }

    /// Worker count with 0 resolved to the machine's parallelism
    pub fn effective_workers(&self) -> usize {
        if self.worker_count > 0 {
            self.worker_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
