mod common;

use archetype_assets::themes::cache_path;
use archetype_assets::themes::DecodedTheme;
use archetype_assets::{
    read_cache, AssetError, CancelToken, CollisionPolicy, LoadStatus, PipelineSettings,
    ReclaimTimer, Theme, ThemeCacheRecord, ThemeDecoder, ThemeEvent, ThemeLoadPipeline,
    ThemeRegistry,
};
use common::{theme_source, write_theme, FakeDecoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

fn pipeline(root: &Path, decoder: Arc<FakeDecoder>, policy: CollisionPolicy) -> ThemeLoadPipeline {
    ThemeLoadPipeline::new(
        PipelineSettings {
            cache_dir: Some(root.join("CachedThemes")),
            workers: 3,
        },
        decoder,
        Arc::new(ThemeRegistry::new(policy)),
    )
}

#[test]
fn cache_record_preserves_pcm_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_theme(dir.path(), "Cave", &(theme_source("Cave") + "channels=1\nframes=300\n"));
    let decoder = FakeDecoder::default();
    let decoded = archetype_assets::ThemeDecoder::decode(&decoder, &source).unwrap();
    let theme = Theme::from_decoded("Cave", decoded).unwrap();

    let record = theme.to_cache_record();
    let bytes = record.to_bytes().unwrap();
    let restored = ThemeCacheRecord::from_bytes(&source, &bytes).unwrap();
    assert_eq!(restored.pcm, theme.sound.pcm());
    assert_eq!(restored.title, "Cave");
    assert_eq!(restored.album, theme.album);
    assert_eq!(restored.artist, theme.artist);
    assert_eq!(restored.year, 2018);
    assert_eq!(restored.loop_start, 4);
    assert_eq!(restored.channel_count, 1);
    assert_eq!(restored.sample_count, 300);

    assert_eq!(Theme::from_cache("Cave", restored).unwrap(), theme);
}

#[test]
fn stale_cache_is_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("CachedThemes");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("Old_Cached.dat"), b"stale").unwrap();
    fs::write(cache_dir.join("Town_Cached.dat"), b"live").unwrap();
    let town = write_theme(dir.path(), "Town", &theme_source("Town"));

    let pipeline = pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst);
    let report = pipeline.scan_and_reconcile_cache(&[town]).unwrap();

    assert_eq!(report.removed, vec![cache_dir.join("Old_Cached.dat")]);
    assert!(!cache_dir.join("Old_Cached.dat").exists());
    assert!(cache_dir.join("Town_Cached.dat").exists());
}

#[test]
fn fresh_decode_writes_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_theme(dir.path(), "Forest", &theme_source("Forest Song"));
    let decoder = Arc::new(FakeDecoder::default());
    let pipeline = pipeline(dir.path(), decoder.clone(), CollisionPolicy::KeepFirst);

    let summary = pipeline.load_all(&[source]);
    assert_eq!(summary.status, LoadStatus::Complete);
    assert_eq!(summary.published, 1);

    let entry = dir.path().join("CachedThemes").join("Forest_Cached.dat");
    let record = read_cache(&entry).unwrap();
    let theme = pipeline.registry().get("Forest").unwrap();
    assert_eq!(record, theme.to_cache_record());
    assert_eq!(record.title, "Forest Song");
    assert_eq!(decoder.calls(), 1);
}

#[test]
fn second_run_uses_cache_without_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_theme(dir.path(), "Forest", &theme_source("Forest Song"));
    pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst).load_all(&[source.clone()]);

    let decoder = Arc::new(FakeDecoder::default());
    let mut second = pipeline(dir.path(), decoder.clone(), CollisionPolicy::KeepFirst);
    let events = second.subscribe();
    let summary = second.load_all(&[source]);

    assert_eq!(summary.cache_hits, 1);
    assert_eq!(decoder.calls(), 0);
    assert!(matches!(
        events.try_recv().unwrap(),
        ThemeEvent::Published { ref key, from_cache: true } if key == "Forest"
    ));
}

#[test]
fn corrupt_cache_is_replaced_from_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_theme(dir.path(), "Desert", &theme_source("Dunes"));
    let cache_dir = dir.path().join("CachedThemes");
    fs::create_dir_all(&cache_dir).unwrap();
    let entry = cache_path(&cache_dir, "Desert");
    fs::write(&entry, [3, 0, 0, 0, b'a']).unwrap();

    let decoder = Arc::new(FakeDecoder::default());
    let mut pipeline = pipeline(dir.path(), decoder.clone(), CollisionPolicy::KeepFirst);
    let events = pipeline.subscribe();
    let summary = pipeline.load_all(&[source]);

    assert_eq!(summary.published, 1);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.cache_rebuilt, 1);
    assert_eq!(decoder.calls(), 1);
    assert_eq!(pipeline.registry().get("Desert").unwrap().title, "Dunes");
    assert_eq!(read_cache(&entry).unwrap().title, "Dunes");

    let events: Vec<ThemeEvent> = events.try_iter().collect();
    assert!(matches!(events[0], ThemeEvent::CacheDiscarded { ref key } if key == "Desert"));
    assert!(matches!(events[1], ThemeEvent::Published { from_cache: false, .. }));
}

#[test]
fn one_bad_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("CachedThemes");
    fs::create_dir_all(&cache_dir).unwrap();

    let mut sources: Vec<PathBuf> = (0..6)
        .map(|i| write_theme(dir.path(), &format!("Track{i}"), &theme_source(&format!("Track {i}"))))
        .collect();
    // Corrupt cache for one file, undecodable source for another.
    fs::write(cache_path(&cache_dir, "Track2"), b"\x10\x00\x00\x00Tr").unwrap();
    sources.push(write_theme(dir.path(), "Noise", "title=Noise\nyear=never\n"));
    sources.push(write_theme(dir.path(), "Loud", &(theme_source("Loud") + "channels=7\n")));

    let pipeline = pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst);
    let progress = pipeline.progress();
    let summary = pipeline.load_all(&sources);

    assert!(progress.is_finished());
    assert_eq!(summary.status, LoadStatus::Complete);
    assert_eq!(summary.attempted, 8);
    assert_eq!(summary.published, 6);
    assert_eq!(summary.failed, 2);
    for i in 0..6 {
        assert!(pipeline.registry().contains(&format!("Track{i}")));
    }
    assert!(!pipeline.registry().contains("Noise"));
    assert!(!pipeline.registry().contains("Loud"));
    assert!(!cache_path(&cache_dir, "Noise").exists());
}

#[test]
fn duplicate_keys_follow_policy() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_theme(dir.path(), "Boss", &theme_source("Original"));
    let copy_dir = dir.path().join("Copies");
    let second = write_theme(&copy_dir, "Boss", &theme_source("Conflict copy"));

    let mut keep = pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst);
    let kept_events = keep.subscribe();
    let summary = keep.load_all(&[first.clone(), second.clone()]);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(keep.registry().len(), 1);
    let kept_events: Vec<_> = kept_events.try_iter().collect();
    assert_eq!(
        kept_events.iter().filter(|e| matches!(e, ThemeEvent::Published { .. })).count(),
        1
    );
    assert!(kept_events
        .iter()
        .any(|e| matches!(e, ThemeEvent::Duplicate { key, .. } if key == "Boss")));
    // only the stored theme gets a cache entry
    let cache_dir = dir.path().join("CachedThemes");
    let stored = keep.registry().get("Boss").unwrap();
    let record = read_cache(&cache_path(&cache_dir, "Boss")).unwrap();
    assert_eq!(record.title, stored.title);

    let reject_dir = tempfile::tempdir().unwrap();
    let mut reject = pipeline(reject_dir.path(), Arc::default(), CollisionPolicy::Reject);
    let events = reject.subscribe();
    let summary = reject.load_all(&[first, second]);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.failed, 1);
    assert!(events.try_iter().any(|e| matches!(
        e,
        ThemeEvent::Failed { error: AssetError::DuplicateTheme(_), .. }
    )));
}

#[test]
fn cancellation_reports_incomplete_and_leaves_no_partial_cache() {
    let dir = tempfile::tempdir().unwrap();
    let sources: Vec<PathBuf> = (0..4)
        .map(|i| write_theme(dir.path(), &format!("T{i}"), &theme_source("x")))
        .collect();

    let pipeline = pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst);
    pipeline.cancel_token().cancel();
    let summary = pipeline.load_all(&sources);

    assert_eq!(summary.status, LoadStatus::Cancelled);
    assert_eq!(pipeline.progress().wait(), LoadStatus::Cancelled);
    assert!(pipeline.registry().is_empty());
    let leftovers = fs::read_dir(dir.path().join("CachedThemes"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

/// Cancels the batch from inside its first decode
#[derive(Default)]
struct CancellingDecoder {
    inner: FakeDecoder,
    token: OnceLock<CancelToken>,
}

impl ThemeDecoder for CancellingDecoder {
    fn decode(&self, path: &Path) -> archetype_assets::Result<DecodedTheme> {
        if let Some(token) = self.token.get() {
            token.cancel();
        }
        self.inner.decode(path)
    }
}

#[test]
fn cancel_during_decode_discards_result() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("CachedThemes");
    let source = write_theme(dir.path(), "Storm", &theme_source("Storm"));

    let decoder = Arc::new(CancellingDecoder::default());
    let mut pipeline = ThemeLoadPipeline::new(
        PipelineSettings {
            cache_dir: Some(cache_dir.clone()),
            workers: 1,
        },
        decoder.clone(),
        Arc::new(ThemeRegistry::new(CollisionPolicy::KeepFirst)),
    );
    decoder.token.set(pipeline.cancel_token()).unwrap();
    let events = pipeline.subscribe();

    let summary = pipeline.load_all(&[source]);

    assert_eq!(decoder.inner.calls(), 1);
    assert_eq!(summary.status, LoadStatus::Cancelled);
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.published, 0);
    assert_eq!(summary.failed, 0);
    assert!(pipeline.registry().is_empty());
    assert!(events.try_iter().next().is_none());
    assert!(!cache_path(&cache_dir, "Storm").exists());
    let leftovers = fs::read_dir(&cache_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn source_decodes_ping_reclaim_timer() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_theme(dir.path(), "Sea", &theme_source("Sea"));
    let timer = Arc::new(ReclaimTimer::detached(30));
    let pipeline = pipeline(dir.path(), Arc::default(), CollisionPolicy::KeepFirst)
        .with_timer(timer.clone());

    pipeline.load_all(&[source]);
    assert_eq!(timer.countdown(), 30);
}
