use flate2::write::GzEncoder;
use flate2::Compression;
use gzseek::{deflate_start, verify_reverse, DeflateIndex, Error, MAX_MATCH};
use rand::Rng;
use std::fs::File;
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn gzip(data: &[u8], level: Compression) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), level);
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Index an in-memory gzip stream and reverse-walk every entry point.
fn index_and_check(gz: &[u8], chunk_size: usize) -> DeflateIndex {
    let mut cursor = Cursor::new(gz);
    let start = deflate_start(&mut cursor).unwrap();
    let (index, data) = DeflateIndex::build(&mut cursor, start, chunk_size).unwrap();
    let checked = verify_reverse(&mut cursor, &index, &data).unwrap();
    assert_eq!(checked, index.len());
    index
}

#[test]
fn hello_world_reverse_walk_through_a_file() {
    let data = b"Hello, world!\n".repeat(10_000);
    let gz = gzip(&data, Compression::default());

    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&gz).unwrap();
    tmp.flush().unwrap();

    let mut file = File::open(tmp.path()).unwrap();
    let start = deflate_start(&mut file).unwrap();
    let (index, out) = DeflateIndex::build(&mut file, start, 1024).unwrap();

    assert_eq!(out, data);
    assert_eq!(index.len(), (data.len() - 1) / 1024 + 1);
    assert_eq!(index.points[0].head, None);
    assert_eq!(index.points[0].start, 0);
    assert_eq!(index.points[0].offset, 0);

    let checked = verify_reverse(&mut file, &index, &out).unwrap();
    assert_eq!(checked, index.len());
}

#[test]
fn stored_blocks_get_synthesized_headers() {
    // Level 0 emits stored blocks, so entries land mid-copy and must carry
    // the bytes-remaining count for header synthesis on resume.
    let data = vec![0u8; 200_000];
    let gz = gzip(&data, Compression::none());
    let index = index_and_check(&gz, 16384);
    assert!(
        index.points.iter().skip(1).any(|p| p.head.is_none() && p.offset > 0),
        "expected at least one entry inside a stored block"
    );
}

#[test]
fn long_matches_at_maximum_compression() {
    // Long runs make the encoder emit maximal matches, so chunk boundaries
    // routinely split a code and force large pre-roll offsets.
    let mut data = Vec::with_capacity(160_000);
    for i in 0..40usize {
        data.extend(std::iter::repeat(b'a' + (i % 4) as u8).take(4000));
    }
    let gz = gzip(&data, Compression::best());
    let index = index_and_check(&gz, 512);

    let mut saw_preroll = false;
    for p in &index.points {
        if p.head.is_some() {
            assert!(p.offset <= MAX_MATCH);
            saw_preroll |= p.offset > 0;
        }
    }
    assert!(saw_preroll, "expected some entry to split a code");
}

#[test]
fn truncated_stream_is_unexpected_eof() {
    let data = b"truncation must never produce a partial index".repeat(500);
    let gz = gzip(&data, Compression::default());

    // Drop the 8-byte gzip trailer plus one byte of actual deflate payload.
    let cut = &gz[..gz.len() - 9];
    let mut cursor = Cursor::new(cut);
    let start = deflate_start(&mut cursor).unwrap();
    let err = DeflateIndex::build(&mut cursor, start, 1024);
    assert!(matches!(err, Err(Error::UnexpectedEof)), "got {err:?}");
}

#[test]
fn corrupt_huffman_table_is_a_data_error() {
    // A final dynamic block whose code-length alphabet is entirely empty:
    // 0x05 = BFINAL=1, BTYPE=dynamic, then all-zero code lengths.
    let raw = [0x05u8, 0, 0, 0, 0, 0, 0, 0, 0];
    let err = DeflateIndex::build(&mut Cursor::new(&raw[..]), 0, 1024);
    assert!(matches!(err, Err(Error::Data(_))), "got {err:?}");
}

#[test]
fn reserved_block_type_is_a_data_error() {
    // BTYPE=11 is reserved.
    let raw = [0x06u8, 0, 0, 0];
    let err = DeflateIndex::build(&mut Cursor::new(&raw[..]), 0, 1024);
    assert!(matches!(err, Err(Error::Data(_))), "got {err:?}");
}

#[test]
fn chunk_larger_than_stream_yields_one_entry() {
    let data = b"small beer";
    let gz = gzip(data, Compression::default());
    let index = index_and_check(&gz, 1 << 20);
    assert_eq!(index.len(), 1);
}

#[test]
fn chunk_size_one_indexes_every_byte() {
    let data = b"dense index: every single byte is an entry".repeat(7);
    let gz = gzip(&data, Compression::default());
    let index = index_and_check(&gz, 1);
    assert_eq!(index.len(), data.len());
}

#[test]
fn entries_inside_a_single_block() {
    // Small compressible input compresses to one deflate block, so every
    // interior entry must resume via header replay within that block.
    let data = b"one block, many entry points ".repeat(140);
    let gz = gzip(&data, Compression::default());
    let index = index_and_check(&gz, 256);
    assert!(index.len() > 1);
}

#[test]
fn stream_length_an_exact_multiple_of_chunk() {
    let data: Vec<u8> = (0..8192u32).map(|i| (i % 97) as u8).collect();
    let gz = gzip(&data, Compression::default());
    let index = index_and_check(&gz, 1024);
    assert_eq!(index.len(), 8);
}

#[test]
fn empty_stream_still_indexes() {
    let gz = gzip(b"", Compression::default());
    let mut cursor = Cursor::new(&gz);
    let start = deflate_start(&mut cursor).unwrap();
    let (index, data) = DeflateIndex::build(&mut cursor, start, 1024).unwrap();
    assert_eq!(index.len(), 1);
    assert!(data.is_empty());
    assert_eq!(verify_reverse(&mut cursor, &index, &data).unwrap(), 1);
}

#[test]
fn coarse_grid_over_a_large_stream() {
    // Runs of a small alphabet: compressible enough to stay fast, varied
    // enough to exercise dynamic blocks throughout.
    let mut rng = rand::thread_rng();
    let target = 2 << 20;
    let mut data = Vec::with_capacity(target);
    while data.len() < target {
        let byte: u8 = rng.gen_range(b'a'..=b'h');
        let run = rng.gen_range(1..64);
        data.extend(std::iter::repeat(byte).take(run));
    }
    data.truncate(target);

    let gz = gzip(&data, Compression::default());
    let index = index_and_check(&gz, 65536);
    assert_eq!(index.len(), (target - 1) / 65536 + 1);
}
