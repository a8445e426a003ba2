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

use crate::error::Result;
use std::path::Path;

/// Core trait for any value a resource table can hold
pub trait Asset: Send + Sync + 'static {
    /// Get asset type name
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Get approximate memory size in bytes
    fn memory_size(&self) -> usize {
        std::mem::size_of_val(self)
    }

    /// Called when the asset is unloaded; release heavy data here.
    ///
    /// The disposed instance is kept and may be handed back to
    /// [`ContentLoader::reload`] on the next load.
    fn on_unload(&mut self) {}
}

/// Produces or refreshes a materialized resource for a logical path
pub trait ContentLoader<T: Asset>: Send + Sync {
    /// Load a fresh instance
    fn load(&self, path: &Path) -> Result<T>;

    /// Refill a previously disposed instance in place
    fn reload(&self, path: &Path, disposed: &mut T) -> Result<()> {
        *disposed = self.load(path)?;
        Ok(())
    }
}

/// Snapshot of a table's bookkeeping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub entries: usize,
    pub loaded: u16,
    pub pinned: usize,
    pub frozen: bool,
}

impl TableStats {
    pub fn loaded_ratio(&self) -> f32 {
        if self.entries == 0 {
            0.0
        } else {
            self.loaded as f32 / self.entries as f32
        }
    }
}
