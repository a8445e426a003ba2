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

//! Theme source decoding.
//!
//! [`ThemeDecoder`] is the seam between the pipeline and the audio codec.
//! [`SymphoniaDecoder`] reads Ogg Vorbis files: sample rate and channel count
//! from the stream, the five required comment tags, and all packets streamed
//! into a 16-bit little-endian interleaved PCM buffer.

use crate::error::{AssetError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;

/// Required metadata carried by every theme source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeTags {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub year: u16,
    /// Loop point, in samples per channel
    pub loop_start: u32,
}

impl ThemeTags {
    /// Build tags from raw `(key, value)` comment pairs.
    ///
    /// Keys match case-insensitively; `date` is accepted for `year` (first
    /// four characters), and the loop point is read from `splitStart`.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> std::result::Result<Self, String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut title = None;
        let mut album = None;
        let mut artist = None;
        let mut year = None;
        let mut date = None;
        let mut loop_start = None;

        for (key, value) in pairs {
            let value = value.as_ref().trim().to_string();
            match key.as_ref().to_ascii_lowercase().as_str() {
                "title" => title = Some(value),
                "album" => album = Some(value),
                "artist" => artist = Some(value),
                "year" => year = Some(value),
                "date" => date = Some(value),
                "splitstart" => loop_start = Some(value),
                _ => {}
            }
        }

        let year_text = year
            .or_else(|| date.map(|d| d.chars().take(4).collect()))
            .ok_or_else(|| "missing tag: year".to_string())?;
        let year = year_text
            .parse::<u16>()
            .map_err(|_| format!("malformed year tag: {year_text:?}"))?;
        let loop_text = loop_start.ok_or_else(|| "missing tag: splitStart".to_string())?;
        let loop_start = loop_text
            .parse::<u32>()
            .map_err(|_| format!("malformed splitStart tag: {loop_text:?}"))?;

        Ok(Self {
            title: title.ok_or_else(|| "missing tag: title".to_string())?,
            album: album.ok_or_else(|| "missing tag: album".to_string())?,
            artist: artist.ok_or_else(|| "missing tag: artist".to_string())?,
            year,
            loop_start,
        })
    }
}

/// Decoder output before it becomes a [`crate::themes::Theme`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTheme {
    pub tags: ThemeTags,
    pub sample_rate: u32,
    pub channel_count: u8,
    /// 16-bit little-endian interleaved samples
    pub pcm: Vec<u8>,
    /// Samples per channel
    pub frames: i32,
}

/// Turns a theme source file into PCM plus metadata
pub trait ThemeDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedTheme>;
}

/// Ogg Vorbis decoder built on `symphonia`
#[derive(Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn collect_tags(revision: &MetadataRevision, pairs: &mut Vec<(String, String)>) {
    for tag in revision.tags() {
        pairs.push((tag.key.clone(), tag.value.to_string()));
    }
}

impl ThemeDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedTheme> {
        let fail = |reason: String| AssetError::SourceDecodeFailed {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| fail(e.to_string()))?;

        // Tags may live in the container preamble or in the stream headers.
        let mut pairs = Vec::new();
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                collect_tags(revision, &mut pairs);
            }
        }
        let mut format = probed.format;
        {
            let metadata = format.metadata();
            if let Some(revision) = metadata.current() {
                collect_tags(revision, &mut pairs);
            }
        }
        let tags = ThemeTags::from_pairs(pairs).map_err(fail)?;

        let track = format
            .default_track()
            .ok_or_else(|| fail("no default audio track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| fail("unknown sample rate".to_string()))?;
        let channels = params
            .channels
            .ok_or_else(|| fail("unknown channel count".to_string()))?
            .count();
        let channel_count = u8::try_from(channels)
            .map_err(|_| fail(format!("too many channels: {channels}")))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| fail(e.to_string()))?;

        let mut pcm = Vec::new();
        let mut frames: u64 = 0;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(fail(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(path = %path.display(), "skipping undecodable packet: {e}");
                    continue;
                }
                Err(e) => return Err(fail(e.to_string())),
            };

            frames += decoded.frames() as u64;
            let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
            samples.copy_interleaved_ref(decoded);
            pcm.reserve(samples.samples().len() * 2);
            for sample in samples.samples() {
                pcm.extend_from_slice(&sample.to_le_bytes());
            }
        }

        let frames = i32::try_from(frames).map_err(|_| fail(format!("track too long: {frames} frames")))?;
        tracing::debug!(path = %path.display(), sample_rate, channels, frames, "decoded theme source");

        Ok(DecodedTheme {
            tags,
            sample_rate,
            channel_count,
            pcm,
            frames,
        })
    }
}
