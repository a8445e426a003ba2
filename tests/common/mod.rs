#![allow(dead_code)]

use archetype_assets::themes::{DecodedTheme, ThemeTags};
use archetype_assets::{AssetError, Result, ThemeDecoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Decodes plain-text `key=value` theme sources.
///
/// Tags use the codec's names; `rate`, `channels` and `frames` describe the
/// PCM that gets synthesized.
#[derive(Default)]
pub struct FakeDecoder {
    calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ThemeDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedTheme> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = |reason: String| AssetError::SourceDecodeFailed {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let pairs: Vec<(String, String)> = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let number = |name: &str, default: u32| -> Result<u32> {
            match pairs.iter().find(|(k, _)| k == name) {
                Some((_, v)) => v.parse().map_err(|_| fail(format!("bad {name}"))),
                None => Ok(default),
            }
        };

        let sample_rate = number("rate", 22_050)?;
        let channel_count = number("channels", 2)? as u8;
        let frames = number("frames", 8)?;
        let tags = ThemeTags::from_pairs(pairs.iter().cloned()).map_err(fail)?;
        let pcm = (0..frames as usize * 2 * channel_count as usize)
            .map(|i| (i % 251) as u8)
            .collect();

        Ok(DecodedTheme {
            tags,
            sample_rate,
            channel_count,
            pcm,
            frames: frames as i32,
        })
    }
}

pub fn theme_source(title: &str) -> String {
    format!("title={title}\nalbum=Soundtrack\nartist=Composer\nyear=2018\nsplitStart=4\n")
}

/// Write `Themes/<key>.ogg` under `root`
pub fn write_theme(root: &Path, key: &str, contents: &str) -> PathBuf {
    let dir = root.join("Themes");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{key}.ogg"));
    fs::write(&path, contents).unwrap();
    path
}
