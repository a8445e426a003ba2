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

//! Archetype Assets - lazy game resources and background theme loading
//!
//! Textures, effects and sound effects are registered as [`LazyAsset`]s in
//! two-phase [`ResourceTable`]s that freeze into a read-optimized layout once
//! discovery is done. Background music themes are decoded on a worker pool,
//! cached on disk, and published into a shared [`ThemeRegistry`]. A
//! [`ReclaimTimer`] releases transient loader memory after loads go quiet.

pub mod config;
pub mod error;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod reclaim;
pub mod resources;
pub mod themes;


pub use config::*;
pub use error::*;
pub use reclaim::*;
pub use resources::*;
pub use themes::*;
