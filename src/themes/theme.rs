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
use crate::themes::cache::ThemeCacheRecord;
use crate::themes::decoder::DecodedTheme;
use std::sync::Arc;

/// 16-bit interleaved PCM ready for the audio engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundBuffer {
    pcm: Arc<[u8]>,
    sample_rate: u32,
    channels: u8,
    frames: i32,
}

impl SoundBuffer {
    /// Validate decoded PCM the way the audio engine would on construction
    pub fn new(key: &str, pcm: Vec<u8>, sample_rate: u32, channels: u8, frames: i32) -> Result<Self> {
        let fail = |reason: String| AssetError::ConstructionFailed {
            key: key.to_string(),
            reason,
        };

        if !(8_000..=48_000).contains(&sample_rate) {
            return Err(fail(format!("unsupported sample rate {sample_rate}")));
        }
        if !(1..=2).contains(&channels) {
            return Err(fail(format!("unsupported channel count {channels}")));
        }
        if i32::try_from(pcm.len()).is_err() {
            return Err(fail(format!("pcm buffer too large ({} bytes)", pcm.len())));
        }
        let block_align = 2 * channels as usize;
        if pcm.len() % block_align != 0 {
            return Err(fail(format!(
                "pcm length {} is not a multiple of {block_align}",
                pcm.len()
            )));
        }
        if frames < 0 || frames as usize * block_align > pcm.len() {
            return Err(fail(format!("sample count {frames} exceeds pcm data")));
        }

        Ok(Self {
            pcm: pcm.into(),
            sample_rate,
            channels,
            frames,
        })
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Samples per channel
    pub fn frames(&self) -> i32 {
        self.frames
    }

    pub fn duration_seconds(&self) -> f32 {
        self.frames as f32 / self.sample_rate as f32
    }
}

/// A fully decoded background-music track.
///
/// Immutable once published; the registry hands out `Arc<Theme>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub key: String,
    pub album: String,
    pub artist: String,
    pub title: String,
    pub year: u16,
    pub loop_start_sample: i32,
    pub sample_rate: i32,
    pub channel_count: u8,
    pub pcm_length_bytes: i32,
    pub sound: SoundBuffer,
}

impl Theme {
    pub fn from_decoded(key: impl Into<String>, decoded: DecodedTheme) -> Result<Self> {
        let key = key.into();
        let loop_start_sample = i32::try_from(decoded.tags.loop_start).map_err(|_| {
            AssetError::ConstructionFailed {
                key: key.clone(),
                reason: format!("loop start {} out of range", decoded.tags.loop_start),
            }
        })?;
        let sound = SoundBuffer::new(
            &key,
            decoded.pcm,
            decoded.sample_rate,
            decoded.channel_count,
            decoded.frames,
        )?;
        Ok(Self::assemble(
            key,
            decoded.tags.title,
            decoded.tags.album,
            decoded.tags.artist,
            decoded.tags.year,
            loop_start_sample,
            sound,
        ))
    }

    pub fn from_cache(key: impl Into<String>, record: ThemeCacheRecord) -> Result<Self> {
        let key = key.into();
        let loop_start_sample =
            i32::try_from(record.loop_start).map_err(|_| AssetError::ConstructionFailed {
                key: key.clone(),
                reason: format!("loop start {} out of range", record.loop_start),
            })?;
        let sound = SoundBuffer::new(
            &key,
            record.pcm,
            record.sample_rate,
            record.channel_count,
            record.sample_count,
        )?;
        Ok(Self::assemble(
            key,
            record.title,
            record.album,
            record.artist,
            record.year,
            loop_start_sample,
            sound,
        ))
    }

    fn assemble(
        key: String,
        title: String,
        album: String,
        artist: String,
        year: u16,
        loop_start_sample: i32,
        sound: SoundBuffer,
    ) -> Self {
        Self {
            key,
            album,
            artist,
            title,
            year,
            loop_start_sample,
            sample_rate: sound.sample_rate() as i32,
            channel_count: sound.channels(),
            // SoundBuffer::new rejects buffers longer than i32::MAX.
            pcm_length_bytes: sound.pcm().len() as i32,
            sound,
        }
    }

    /// Cache record carrying this theme's metadata and PCM
    pub fn to_cache_record(&self) -> ThemeCacheRecord {
        ThemeCacheRecord {
            title: self.title.clone(),
            album: self.album.clone(),
            artist: self.artist.clone(),
            year: self.year,
            loop_start: self.loop_start_sample as u32,
            sample_rate: self.sound.sample_rate(),
            channel_count: self.channel_count,
            pcm: self.sound.pcm().to_vec(),
            sample_count: self.sound.frames(),
        }
    }

    /// Loop point in seconds
    pub fn loop_start_seconds(&self) -> f32 {
        self.loop_start_sample as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::decoder::ThemeTags;

    fn decoded(channels: u8, frames: i32) -> DecodedTheme {
        DecodedTheme {
            tags: ThemeTags {
                title: "Overworld".to_string(),
                album: "Soundtrack".to_string(),
                artist: "Composer".to_string(),
                year: 2019,
                loop_start: 1_000,
            },
            sample_rate: 44_100,
            channel_count: channels,
            pcm: vec![0u8; frames as usize * 2 * channels as usize],
            frames,
        }
    }

    #[test]
    fn test_from_decoded() {
        let theme = Theme::from_decoded("Overworld", decoded(2, 4)).unwrap();
        assert_eq!(theme.pcm_length_bytes, 16);
        assert_eq!(theme.sample_rate, 44_100);
        assert_eq!(theme.channel_count, 2);
        assert_eq!(theme.loop_start_sample, 1_000);
        assert_eq!(theme.sound.frames(), 4);
    }

    #[test]
    fn test_cache_record_round_trip() {
        let theme = Theme::from_decoded("Overworld", decoded(1, 3)).unwrap();
        let restored = Theme::from_cache("Overworld", theme.to_cache_record()).unwrap();
        assert_eq!(restored, theme);
    }

    #[test]
    fn test_bad_channel_count_fails_construction() {
        let err = Theme::from_decoded("Overworld", decoded(6, 2)).unwrap_err();
        assert!(matches!(err, AssetError::ConstructionFailed { .. }));
    }

    #[test]
    fn test_misaligned_pcm_fails_construction() {
        let err = SoundBuffer::new("x", vec![0u8; 3], 22_050, 1, 1).unwrap_err();
        assert!(err.to_string().contains("multiple of 2"));
    }
}
