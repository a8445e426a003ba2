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

//! Error types

use std::fmt;
use std::path::PathBuf;

/// Asset error type
#[derive(Debug, Clone)]
pub enum AssetError {
    /// Key already registered in a building table
    DuplicateKey(String),

    /// No asset registered under this key
    AssetNotFound(String),

    /// Content loader failed to materialize a resource
    ResourceLoadError(String),

    /// Unload requested for a pinned asset
    UnloadOfNonUnloadable(String),

    /// Unload requested for an asset that is not loaded
    NotLoaded(String),

    /// Theme cache file could not be parsed (recoverable)
    CacheCorrupt { path: PathBuf, reason: String },

    /// Theme source could not be decoded (bad tags, codec error)
    SourceDecodeFailed { path: PathBuf, reason: String },

    /// Decoded data could not be turned into a playable sound
    ConstructionFailed { key: String, reason: String },

    /// Theme key already published and the registry rejects collisions
    DuplicateTheme(String),

    /// Batch was cancelled before this item ran
    Cancelled,

    /// Configuration could not be read or parsed
    ConfigError(String),

    /// IO error (file operations, etc.)
    IoError(String),
}

impl AssetError {
    /// Whether the pipeline can fall back to another source after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AssetError::CacheCorrupt { .. })
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::DuplicateKey(key) => write!(f, "Duplicate asset key: {key}"),
            AssetError::AssetNotFound(key) => write!(f, "Asset not found: {key}"),
            AssetError::ResourceLoadError(msg) => write!(f, "Resource load error: {msg}"),
            AssetError::UnloadOfNonUnloadable(key) => {
                write!(f, "Asset {key} is pinned and cannot be unloaded")
            }
            AssetError::NotLoaded(key) => write!(f, "Asset {key} is not loaded"),
            AssetError::CacheCorrupt { path, reason } => {
                write!(f, "Corrupt theme cache {}: {reason}", path.display())
            }
            AssetError::SourceDecodeFailed { path, reason } => {
                write!(f, "Failed to decode theme {}: {reason}", path.display())
            }
            AssetError::ConstructionFailed { key, reason } => {
                write!(f, "Failed to construct sound for theme {key}: {reason}")
            }
            AssetError::DuplicateTheme(key) => write!(f, "Theme already published: {key}"),
            AssetError::Cancelled => write!(f, "Operation cancelled"),
            AssetError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            AssetError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::ConfigError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;
