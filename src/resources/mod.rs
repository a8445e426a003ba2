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

//! Lazily loaded game resources and the tables that hold them.

pub mod asset_types;
pub mod lazy;
pub mod loader;
pub mod manager;
pub mod resource;
pub mod table;

pub use asset_types::{EffectResource, RawResource, SoundResource, TextureResource};
pub use lazy::LazyAsset;
pub use loader::{file_key, list_files, FileContentLoader};
pub use manager::{AssetLoaders, AssetManager, ManagerStats};
pub use resource::{Asset, ContentLoader, TableStats};
pub use table::{Phase, PhaseHook, ResourceTable};
