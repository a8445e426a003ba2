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

//! Background music: decoding, the on-disk cache and the shared registry.

pub mod cache;
pub mod decoder;
pub mod pipeline;
pub mod registry;
pub mod theme;

pub use cache::{
    cache_path, read_cache, reconcile_cache, write_cache, ReconcileReport, ThemeCacheRecord,
    CACHE_SUFFIX, TEMP_PREFIX,
};
pub use decoder::{DecodedTheme, SymphoniaDecoder, ThemeDecoder, ThemeTags};
pub use pipeline::{
    CancelToken, LoadProgress, LoadStatus, LoadSummary, PipelineSettings, ThemeEvent,
    ThemeLoadPipeline,
};
pub use registry::{CollisionPolicy, PublishOutcome, ThemeRegistry};
pub use theme::{SoundBuffer, Theme};
