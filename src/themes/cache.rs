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

//! On-disk theme cache.
//!
//! One `<key>_Cached.dat` file per theme, little-endian:
//!
//! | field         | encoding                         |
//! |---------------|----------------------------------|
//! | title         | u32 byte length + UTF-8          |
//! | album         | u32 byte length + UTF-8          |
//! | artist        | u32 byte length + UTF-8          |
//! | year          | u16                              |
//! | loop_start    | u32                              |
//! | sample_rate   | u32                              |
//! | channel_count | u8                               |
//! | pcm_length    | i32 (never negative)             |
//! | pcm_bytes     | `pcm_length` bytes               |
//! | sample_count  | i32                              |
//!
//! `pcm_length` + `pcm_bytes` is exactly speedy's `Vec<u8>` encoding, since a
//! non-negative i32 and a u32 share their little-endian bytes.

use crate::error::{AssetError, Result};
use rustc_hash::FxHashSet;
use speedy::{LittleEndian, Readable, Writable};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to a theme key to name its cache file
pub const CACHE_SUFFIX: &str = "_Cached.dat";

/// Name prefix of in-progress writes; any left on disk are from a crash
pub const TEMP_PREFIX: &str = ".theme-";
const TEMP_SUFFIX: &str = ".part";

#[derive(Clone, Debug, PartialEq, Eq, Readable, Writable)]
pub struct ThemeCacheRecord {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub year: u16,
    pub loop_start: u32,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub pcm: Vec<u8>,
    pub sample_count: i32,
}

impl ThemeCacheRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if i32::try_from(self.pcm.len()).is_err() {
            return Err(AssetError::IoError(format!(
                "pcm buffer of {} bytes does not fit the cache format",
                self.pcm.len()
            )));
        }
        self.write_to_vec_with_ctx(LittleEndian::default())
            .map_err(|e| AssetError::IoError(format!("cache encode failed: {e}")))
    }

    /// Parse a whole cache file; bytes past the record make it corrupt.
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let corrupt = |reason: String| AssetError::CacheCorrupt {
            path: path.to_path_buf(),
            reason,
        };
        let (record, consumed) =
            Self::read_with_length_from_buffer_with_ctx(LittleEndian::default(), bytes);
        let record = record.map_err(|e| corrupt(e.to_string()))?;
        if consumed != bytes.len() {
            return Err(corrupt(format!(
                "{} trailing bytes after record",
                bytes.len() - consumed
            )));
        }
        Ok(record)
    }
}

/// Cache file for `key` inside `cache_dir`
pub fn cache_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(format!("{key}{CACHE_SUFFIX}"))
}

/// Theme key a cache file belongs to, if the name carries the cache suffix
pub fn cache_key(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.strip_suffix(CACHE_SUFFIX)
}

/// Read and parse a cache file. Any failure reports the file as corrupt.
pub fn read_cache(path: &Path) -> Result<ThemeCacheRecord> {
    let bytes = fs::read(path).map_err(|e| AssetError::CacheCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    ThemeCacheRecord::from_bytes(path, &bytes)
}

/// Write a cache file atomically.
///
/// The record goes to a temporary file in `cache_dir` which is then renamed
/// over the final name, so readers never see a partial entry.
pub fn write_cache(cache_dir: &Path, key: &str, record: &ThemeCacheRecord) -> Result<PathBuf> {
    let bytes = record.to_bytes()?;
    fs::create_dir_all(cache_dir)?;

    let target = cache_path(cache_dir, key);
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(cache_dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(&target).map_err(|e| AssetError::IoError(e.error.to_string()))?;
    Ok(target)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX))
}

/// Outcome of [`reconcile_cache`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
}

/// Delete cache files whose source theme no longer exists.
///
/// Leftover temporary files from interrupted writes are deleted too. Other
/// files in `cache_dir` without the cache suffix are left alone. A missing
/// cache directory is created and reported as empty.
pub fn reconcile_cache(source_files: &[PathBuf], cache_dir: &Path) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    if !cache_dir.exists() {
        fs::create_dir_all(cache_dir)?;
        return Ok(report);
    }

    let sources: FxHashSet<&str> = source_files
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
        .collect();

    for entry in fs::read_dir(cache_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if !is_temp_file(&path) {
            let Some(key) = cache_key(&path) else {
                continue;
            };
            if sources.contains(key) {
                report.kept += 1;
                continue;
            }
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed stale theme cache");
                report.removed.push(path);
            }
            Err(e) => tracing::warn!(path = %path.display(), "failed to remove stale theme cache: {e}"),
        }
    }

    Ok(report)
}
