use archetype_assets::ThemeCacheRecord;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

fn record(seconds: usize) -> ThemeCacheRecord {
    let frames = 44_100 * seconds;
    ThemeCacheRecord {
        title: "Overworld".to_string(),
        album: "Soundtrack".to_string(),
        artist: "Composer".to_string(),
        year: 2019,
        loop_start: 44_100,
        sample_rate: 44_100,
        channel_count: 2,
        pcm: vec![0x5a; frames * 4],
        sample_count: frames as i32,
    }
}

fn bench_encode(c: &mut Criterion) {
    let record = record(10);
    c.bench_function("theme_cache_encode_10s", |b| {
        b.iter(|| black_box(record.to_bytes().unwrap()))
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = record(10).to_bytes().unwrap();
    let path = Path::new("Overworld_Cached.dat");
    c.bench_function("theme_cache_decode_10s", |b| {
        b.iter(|| black_box(ThemeCacheRecord::from_bytes(path, &bytes).unwrap()))
    });
}

fn bench_write_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let record = record(2);
    c.bench_function("theme_cache_write_read_2s", |b| {
        b.iter(|| {
            let path = archetype_assets::write_cache(dir.path(), "Overworld", &record).unwrap();
            black_box(archetype_assets::read_cache(&path).unwrap())
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_write_read);
criterion_main!(benches);
