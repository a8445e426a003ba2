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

//! # Profiling
//!
//! Enable the `profiling` feature to write every asset log event and span as
//! JSON lines:
//!
//! ```toml
//! [dependencies]
//! archetype_assets = { version = "0.3", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! let _guard = archetype_assets::profiling::init_file_logging("assets.json")?;
//! manager.start_themes(decoder)?.wait();
//! ```
//!
//! Per-file theme work runs inside a `theme` span keyed by the theme name, so
//! slow decodes stand out when the trace is loaded into a viewer.

use crate::error::{AssetError, Result};
use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Install a global JSON subscriber writing to `path`.
///
/// Keep the returned guard alive; dropping it flushes and stops the writer.
pub fn init_file_logging(path: impl AsRef<Path>) -> Result<WorkerGuard> {
    let file = File::create(path.as_ref())?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .json()
        .try_init()
        .map_err(|e| AssetError::ConfigError(format!("tracing subscriber already set: {e}")))?;
    Ok(guard)
}
