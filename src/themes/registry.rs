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

use crate::error::{AssetError, Result};
use crate::themes::Theme;
use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// What happens when a theme is published under a key that is already taken
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the first theme, log the duplicate
    #[default]
    KeepFirst,
    /// Replace the existing theme
    Overwrite,
    /// Fail the second publish with [`AssetError::DuplicateTheme`]
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Inserted,
    /// A theme already held the key and was kept
    Kept,
    Replaced,
}

impl PublishOutcome {
    /// Whether the published theme is now the one in the registry
    pub fn is_stored(self) -> bool {
        !matches!(self, PublishOutcome::Kept)
    }
}

/// Concurrent key -> theme map shared by pipeline workers and consumers
pub struct ThemeRegistry {
    policy: CollisionPolicy,
    themes: RwLock<AHashMap<String, Arc<Theme>>>,
}

impl ThemeRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            themes: RwLock::new(AHashMap::new()),
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Insert a theme under its key. The check and insert are one atomic step.
    pub fn publish(&self, theme: Theme) -> Result<PublishOutcome> {
        let mut themes = self.themes.write();
        match themes.entry(theme.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(theme));
                Ok(PublishOutcome::Inserted)
            }
            Entry::Occupied(mut slot) => match self.policy {
                CollisionPolicy::KeepFirst => {
                    tracing::warn!(key = %theme.key, "duplicate theme ignored, keeping first");
                    Ok(PublishOutcome::Kept)
                }
                CollisionPolicy::Overwrite => {
                    tracing::warn!(key = %theme.key, "duplicate theme replaces earlier one");
                    slot.insert(Arc::new(theme));
                    Ok(PublishOutcome::Replaced)
                }
                CollisionPolicy::Reject => Err(AssetError::DuplicateTheme(theme.key)),
            },
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Theme>> {
        self.themes.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.themes.read().contains_key(key)
    }

    /// Published keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.themes.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.themes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.read().is_empty()
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new(CollisionPolicy::default())
    }
}
