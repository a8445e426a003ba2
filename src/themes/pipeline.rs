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

//! Concurrent theme loading.
//!
//! Each source file moves through
//! `Discovered -> (CacheHit | CacheMiss) -> Decoded -> Published`, or ends in
//! `Failed`. Files are processed on a dedicated rayon pool; the only shared
//! write is the registry publish. A failure is logged and counted against its
//! own file and never stops the batch.

use crate::error::{AssetError, Result};
use crate::reclaim::ReclaimTimer;
use crate::resources::file_key;
use crate::themes::cache::{self, ReconcileReport};
use crate::themes::{PublishOutcome, Theme, ThemeDecoder, ThemeRegistry};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info_span;

/// Cooperative cancellation flag shared with the workers
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker to stop before its next file
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Lifecycle of one theme batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// Not started yet
    Idle,
    Running,
    /// Every file was attempted
    Complete,
    /// Stopped early; some files were never attempted
    Cancelled,
}

impl LoadStatus {
    /// True once the batch will make no further progress
    pub fn is_finished(self) -> bool {
        matches!(self, LoadStatus::Complete | LoadStatus::Cancelled)
    }
}

/// Shared progress of one batch; consumers poll or wait on it
pub struct LoadProgress {
    status: Mutex<LoadStatus>,
    finished: Condvar,
    total: AtomicUsize,
    attempted: AtomicUsize,
    published: AtomicUsize,
    duplicates: AtomicUsize,
    failed: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_rebuilt: AtomicUsize,
}

impl LoadProgress {
    fn new() -> Self {
        Self {
            status: Mutex::new(LoadStatus::Idle),
            finished: Condvar::new(),
            total: AtomicUsize::new(0),
            attempted: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            cache_rebuilt: AtomicUsize::new(0),
        }
    }

    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Release);
        *self.status.lock() = LoadStatus::Running;
    }

    fn finish(&self, status: LoadStatus) {
        *self.status.lock() = status;
        self.finished.notify_all();
    }

    /// Current status snapshot
    pub fn status(&self) -> LoadStatus {
        *self.status.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Block until the batch completes or is cancelled
    pub fn wait(&self) -> LoadStatus {
        let mut status = self.status.lock();
        while !status.is_finished() {
            self.finished.wait(&mut status);
        }
        *status
    }

    /// Like [`LoadProgress::wait`] with a timeout; returns `None` on timeout
    pub fn wait_timeout(&self, timeout: Duration) -> Option<LoadStatus> {
        let mut status = self.status.lock();
        if !status.is_finished() {
            self.finished.wait_for(&mut status, timeout);
        }
        status.is_finished().then_some(*status)
    }

    /// Files in the batch
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Files that ran to success or failure
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::Acquire)
    }

    /// Files whose theme is now the one stored in the registry
    pub fn published(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    /// Files dropped because their key was already taken
    pub fn duplicates(&self) -> usize {
        self.duplicates.load(Ordering::Acquire)
    }

    /// Files that failed to decode, construct or publish
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    /// Files served from the on-disk cache
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Acquire)
    }

    /// Corrupt cache entries that were deleted and rebuilt from source
    pub fn cache_rebuilt(&self) -> usize {
        self.cache_rebuilt.load(Ordering::Acquire)
    }

    /// Snapshot of every counter
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            status: self.status(),
            total: self.total(),
            attempted: self.attempted(),
            published: self.published(),
            duplicates: self.duplicates(),
            failed: self.failed(),
            cache_hits: self.cache_hits(),
            cache_rebuilt: self.cache_rebuilt(),
        }
    }
}

impl std::fmt::Debug for LoadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.summary(), f)
    }
}

/// Counters of a batch; see the matching [`LoadProgress`] getters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    pub status: LoadStatus,
    pub total: usize,
    pub attempted: usize,
    pub published: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub cache_rebuilt: usize,
}

/// Per-file notifications for consumers that want more than counters
#[derive(Clone, Debug)]
pub enum ThemeEvent {
    Published { key: String, from_cache: bool },
    /// Loaded fine, but the registry kept an earlier theme under `key`
    Duplicate { key: String, from_cache: bool },
    CacheDiscarded { key: String },
    Failed { key: String, error: AssetError },
}

/// How a file ended up in the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Cache,
    Source,
}

/// Knobs for a [`ThemeLoadPipeline`]
pub struct PipelineSettings {
    /// `None` disables reading and writing the cache
    pub cache_dir: Option<PathBuf>,
    /// Decode threads; clamped to at least one
    pub workers: usize,
}

/// Loads a batch of theme sources into a [`ThemeRegistry`], using and
/// refreshing the on-disk cache when one is configured.
pub struct ThemeLoadPipeline {
    settings: PipelineSettings,
    decoder: Arc<dyn ThemeDecoder>,
    registry: Arc<ThemeRegistry>,
    timer: Option<Arc<ReclaimTimer>>,
    progress: Arc<LoadProgress>,
    cancel: CancelToken,
    subscribers: Vec<Sender<ThemeEvent>>,
}

impl ThemeLoadPipeline {
    /// Pipeline publishing into `registry`
    pub fn new(
        settings: PipelineSettings,
        decoder: Arc<dyn ThemeDecoder>,
        registry: Arc<ThemeRegistry>,
    ) -> Self {
        Self {
            settings: PipelineSettings {
                workers: settings.workers.max(1),
                ..settings
            },
            decoder,
            registry,
            timer: None,
            progress: Arc::new(LoadProgress::new()),
            cancel: CancelToken::new(),
            subscribers: Vec::new(),
        }
    }

    /// Ping `timer` after each source decode
    pub fn with_timer(mut self, timer: Arc<ReclaimTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Receive a [`ThemeEvent`] per file outcome
    pub fn subscribe(&mut self) -> Receiver<ThemeEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Shared progress handle; valid before, during and after the batch
    pub fn progress(&self) -> Arc<LoadProgress> {
        self.progress.clone()
    }

    /// Token that stops this pipeline's batch
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &Arc<ThemeRegistry> {
        &self.registry
    }

    /// Whether a cache directory is configured
    pub fn caching_enabled(&self) -> bool {
        self.settings.cache_dir.is_some()
    }

    /// Delete cache entries whose source is gone. Run before [`Self::load_all`].
    pub fn scan_and_reconcile_cache(&self, source_files: &[PathBuf]) -> Result<ReconcileReport> {
        match &self.settings.cache_dir {
            Some(cache_dir) => cache::reconcile_cache(source_files, cache_dir),
            None => Ok(ReconcileReport::default()),
        }
    }

    /// Process every file on a pool of `workers` threads and block until done
    pub fn load_all(&self, source_files: &[PathBuf]) -> LoadSummary {
        let _span = info_span!("load_themes", files = source_files.len()).entered();
        self.progress.start(source_files.len());

        let run = || {
            source_files
                .par_iter()
                .for_each(|path| self.process(path));
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .thread_name(|i| format!("theme-decode-{i}"))
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!("theme pool unavailable ({e}), using global pool");
                run();
            }
        }

        let attempted = self.progress.attempted();
        let status = if self.cancel.is_cancelled() && attempted < source_files.len() {
            LoadStatus::Cancelled
        } else {
            LoadStatus::Complete
        };
        self.progress.finish(status);

        let summary = self.progress.summary();
        tracing::info!(
            published = summary.published,
            duplicates = summary.duplicates,
            failed = summary.failed,
            cache_hits = summary.cache_hits,
            "theme loading finished: {status:?}"
        );
        summary
    }

    /// Run [`Self::load_all`] on a background thread
    pub fn spawn(self: Arc<Self>, source_files: Vec<PathBuf>) -> Result<JoinHandle<LoadSummary>> {
        let handle = std::thread::Builder::new()
            .name("theme-loader".to_string())
            .spawn(move || self.load_all(&source_files))?;
        Ok(handle)
    }

    fn emit(&self, event: ThemeEvent) {
        for subscriber in &self.subscribers {
            // A dropped receiver just stops listening.
            let _ = subscriber.send(event.clone());
        }
    }

    fn process(&self, path: &Path) {
        if self.cancel.is_cancelled() {
            return;
        }
        let key = file_key(path).unwrap_or_else(|| path.display().to_string());
        let _span = info_span!("theme", key = %key).entered();

        let result = self.load_one(&key, path);
        if let Err(AssetError::Cancelled) = result {
            tracing::debug!("dropped decoded theme after cancellation");
            return;
        }
        self.progress.attempted.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok((origin, outcome)) => {
                let from_cache = origin == Origin::Cache;
                if from_cache {
                    self.progress.cache_hits.fetch_add(1, Ordering::AcqRel);
                }
                if outcome.is_stored() {
                    self.progress.published.fetch_add(1, Ordering::AcqRel);
                    self.emit(ThemeEvent::Published { key, from_cache });
                } else {
                    self.progress.duplicates.fetch_add(1, Ordering::AcqRel);
                    self.emit(ThemeEvent::Duplicate { key, from_cache });
                }
            }
            Err(error) => {
                self.progress.failed.fetch_add(1, Ordering::AcqRel);
                tracing::error!(path = %path.display(), "theme failed to load: {error}");
                self.emit(ThemeEvent::Failed { key, error });
            }
        }
    }

    fn load_one(&self, key: &str, path: &Path) -> Result<(Origin, PublishOutcome)> {
        if let Some(cache_dir) = &self.settings.cache_dir {
            let cache_file = cache::cache_path(cache_dir, key);
            if cache_file.is_file() {
                match self.load_cached(key, &cache_file) {
                    Ok(theme) => {
                        let outcome = self.registry.publish(theme)?;
                        return Ok((Origin::Cache, outcome));
                    }
                    Err(e) => self.discard_cache(key, &cache_file, &e),
                }
            }
        }

        let decoded = self.decoder.decode(path)?;
        if self.cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        let theme = Theme::from_decoded(key, decoded)?;
        let record = self
            .settings
            .cache_dir
            .as_ref()
            .map(|_| theme.to_cache_record());

        let outcome = self.registry.publish(theme)?;
        if let Some(timer) = &self.timer {
            timer.notify();
        }

        if let (Some(cache_dir), Some(record)) = (&self.settings.cache_dir, record) {
            if outcome.is_stored() && !self.cancel.is_cancelled() {
                match cache::write_cache(cache_dir, key, &record) {
                    Ok(file) => tracing::debug!(file = %file.display(), "wrote theme cache"),
                    // The theme is already published; a missing cache only costs a redecode.
                    Err(e) => tracing::warn!("failed to write theme cache: {e}"),
                }
            }
        }

        Ok((Origin::Source, outcome))
    }

    fn load_cached(&self, key: &str, cache_file: &Path) -> Result<Theme> {
        let record = cache::read_cache(cache_file)?;
        Theme::from_cache(key, record).map_err(|e| AssetError::CacheCorrupt {
            path: cache_file.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn discard_cache(&self, key: &str, cache_file: &Path, error: &AssetError) {
        tracing::warn!("{error}; deleting and decoding from source");
        if let Err(e) = std::fs::remove_file(cache_file) {
            tracing::warn!(file = %cache_file.display(), "failed to delete corrupt cache: {e}");
        }
        self.progress.cache_rebuilt.fetch_add(1, Ordering::AcqRel);
        self.emit(ThemeEvent::CacheDiscarded {
            key: key.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::decoder::{DecodedTheme, ThemeTags};
    use crate::themes::CollisionPolicy;

    /// Decodes `Name.ogg` files whose contents are the title; "bad" fails.
    struct TitleDecoder;

    impl ThemeDecoder for TitleDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedTheme> {
            let title = std::fs::read_to_string(path)?;
            if title == "bad" {
                return Err(AssetError::SourceDecodeFailed {
                    path: path.to_path_buf(),
                    reason: "missing tag: title".to_string(),
                });
            }
            Ok(DecodedTheme {
                tags: ThemeTags {
                    title,
                    album: "Album".to_string(),
                    artist: "Artist".to_string(),
                    year: 2020,
                    loop_start: 0,
                },
                sample_rate: 22_050,
                channel_count: 1,
                pcm: vec![1, 0, 2, 0],
                frames: 2,
            })
        }
    }

    fn pipeline(cache_dir: Option<PathBuf>) -> ThemeLoadPipeline {
        ThemeLoadPipeline::new(
            PipelineSettings {
                cache_dir,
                workers: 2,
            },
            Arc::new(TitleDecoder),
            Arc::new(ThemeRegistry::new(CollisionPolicy::KeepFirst)),
        )
    }

    #[test]
    fn test_load_all_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.ogg");
        let b = dir.path().join("B.ogg");
        std::fs::write(&a, "Alpha").unwrap();
        std::fs::write(&b, "bad").unwrap();

        let pipeline = pipeline(None);
        let summary = pipeline.load_all(&[a, b]);

        assert_eq!(summary.status, LoadStatus::Complete);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(pipeline.registry().get("A").unwrap().title, "Alpha");
        assert!(pipeline.registry().get("B").is_none());
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.ogg");
        std::fs::write(&a, "Alpha").unwrap();

        let pipeline = pipeline(Some(dir.path().join("CachedThemes")));
        pipeline.cancel_token().cancel();
        let summary = pipeline.load_all(&[a]);

        assert_eq!(summary.status, LoadStatus::Cancelled);
        assert_eq!(summary.attempted, 0);
        assert!(pipeline.registry().is_empty());
        assert!(!dir.path().join("CachedThemes").join("A_Cached.dat").exists());
    }

    #[test]
    fn test_events_report_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.ogg");
        let b = dir.path().join("B.ogg");
        std::fs::write(&a, "Alpha").unwrap();
        std::fs::write(&b, "bad").unwrap();

        let mut pipeline = pipeline(None);
        let events = pipeline.subscribe();
        pipeline.load_all(&[a, b]);

        let events: Vec<ThemeEvent> = events.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ThemeEvent::Published { key, from_cache: false } if key == "A"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, ThemeEvent::Failed { key, .. } if key == "B")));
    }

    #[test]
    fn test_wait_returns_after_spawned_batch() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| {
                let path = dir.path().join(format!("T{i}.ogg"));
                std::fs::write(&path, format!("Track {i}")).unwrap();
                path
            })
            .collect();

        let pipeline = Arc::new(pipeline(None));
        let progress = pipeline.progress();
        let handle = pipeline.clone().spawn(files).unwrap();

        assert_eq!(progress.wait(), LoadStatus::Complete);
        assert_eq!(progress.published(), 6);
        assert_eq!(handle.join().unwrap().published, 6);
        assert_eq!(
            progress.wait_timeout(Duration::from_millis(1)),
            Some(LoadStatus::Complete)
        );
    }
}
