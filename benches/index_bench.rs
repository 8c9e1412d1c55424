use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::GzEncoder;
use flate2::Compression;
use gzseek::{deflate_start, seek_entry, DeflateIndex, Inflater};
use std::io::{Cursor, Write};

fn bench_index(c: &mut Criterion) {
    let data = b"Hello, benchmark!\n".repeat(60_000);
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&data).unwrap();
    let gz = enc.finish().unwrap();

    c.bench_function("index_1mb_chunk1k", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&gz));
            let start = deflate_start(&mut cursor).unwrap();
            DeflateIndex::build(&mut cursor, start, 1024).unwrap()
        })
    });

    let mut cursor = Cursor::new(&gz);
    let start = deflate_start(&mut cursor).unwrap();
    let (index, history) = DeflateIndex::build(&mut cursor, start, 1024).unwrap();
    let mid = index.len() / 2;
    c.bench_function("seek_mid_entry", |b| {
        let mut codec = Inflater::raw().unwrap();
        b.iter(|| {
            let mut cursor = Cursor::new(&gz);
            seek_entry(&mut codec, &mut cursor, &index, black_box(mid), &history).unwrap()
        })
    });
}

criterion_group!(benches, bench_index);
criterion_main!(benches);
