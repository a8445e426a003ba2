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
use crate::resources::{ContentLoader, RawResource};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Content loader that reads a whole file into a [`RawResource`]
pub struct FileContentLoader<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> FileContentLoader<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for FileContentLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        AssetError::ResourceLoadError(format!("Failed to load file {}: {e}", path.display()))
    })
}

impl<T: RawResource> ContentLoader<T> for FileContentLoader<T> {
    fn load(&self, path: &Path) -> Result<T> {
        let data = read_file(path)?;
        Ok(T::from_bytes(path.to_string_lossy().to_string(), data))
    }

    fn reload(&self, path: &Path, disposed: &mut T) -> Result<()> {
        disposed.replace_data(read_file(path)?);
        Ok(())
    }
}

/// Table key for a file: its name without the extension
pub fn file_key(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// List regular files in `directory`, optionally filtered by extension.
///
/// Results are sorted so registration order does not depend on the
/// filesystem's enumeration order.
pub fn list_files(directory: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(directory).map_err(|e| {
        AssetError::ResourceLoadError(format!(
            "Failed to read directory {}: {e}",
            directory.display()
        ))
    })? {
        let entry = entry.map_err(|e| {
            AssetError::ResourceLoadError(format!("Failed to read entry: {e}"))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match extension {
            Some(wanted) => {
                let matches = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
                if matches {
                    files.push(path);
                }
            }
            None => files.push(path),
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::TextureResource;

    #[test]
    fn test_file_key_strips_extension() {
        assert_eq!(file_key(Path::new("Textures/Pixel.png")).as_deref(), Some("Pixel"));
        assert_eq!(file_key(Path::new("Themes/Boss.Fight.ogg")).as_deref(), Some("Boss.Fight"));
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.ogg"), b"b").unwrap();
        fs::write(dir.path().join("a.OGG"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        fs::create_dir(dir.path().join("sub.ogg")).unwrap();

        let oggs = list_files(dir.path(), Some("ogg")).unwrap();
        let names: Vec<_> = oggs.iter().filter_map(|p| file_key(p)).collect();
        assert_eq!(names, vec!["a", "b"]);

        let all = list_files(dir.path(), None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_missing_directory_is_load_error() {
        let err = list_files(Path::new("definitely/not/here"), None).unwrap_err();
        assert!(matches!(err, AssetError::ResourceLoadError(_)));
    }

    #[test]
    fn test_file_loader_load_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pixel.png");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        let loader = FileContentLoader::<TextureResource>::new();
        let mut texture = loader.load(&path).unwrap();
        assert_eq!(texture.data(), &[1, 2, 3]);

        fs::write(&path, [9u8]).unwrap();
        loader.reload(&path, &mut texture).unwrap();
        assert_eq!(texture.data(), &[9]);
    }
}
