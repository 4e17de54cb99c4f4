//! End-to-end round-trips: write records, read them back, across
//! compression settings and parallelism levels.

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ribbon::codec::Compression;
use ribbon::records::{ReaderOptions, RecordReader, RecordWriter, WriterOptions};

fn write_to_vec(options: WriterOptions, records: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = RecordWriter::create(Vec::new(), options).unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.into_inner().unwrap().into_inner().unwrap()
}

fn read_all(file: &[u8]) -> Vec<Vec<u8>> {
    let mut reader =
        RecordReader::open(Cursor::new(file.to_vec()), ReaderOptions::default()).unwrap();
    let mut records = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        records.push(record.to_vec());
    }
    records
}

fn random_records(seed: u64, count: usize, max_len: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..max_len);
            let mut data = vec![0u8; len];
            rng.fill(&mut data[..]);
            data
        })
        .collect()
}

// -------------------------------------------------------------------
// Uncompressed round-trip
// -------------------------------------------------------------------

#[test]
fn test_roundtrip_1000_records_uncompressed() {
    let records: Vec<Vec<u8>> = (0..1000)
        .map(|i| format!("r{:04}", i).into_bytes())
        .collect();
    let file = write_to_vec(WriterOptions::default(), &records);

    let mut reader =
        RecordReader::open(Cursor::new(file), ReaderOptions::default()).unwrap();
    let mut read_back = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        read_back.push(record.to_vec());
    }
    assert_eq!(read_back, records);

    // All 1000 records share the chunk at logical position 0, so the last
    // record's numeric position is its index.
    assert_eq!(reader.last_pos().unwrap().numeric(), 999);
}

#[test]
fn test_roundtrip_empty_file() {
    let file = write_to_vec(WriterOptions::default(), &[]);
    assert!(file.is_empty());
    assert!(read_all(&file).is_empty());
}

#[test]
fn test_roundtrip_empty_and_large_records() {
    let records = vec![
        Vec::new(),
        vec![0xAA; 200_000],
        Vec::new(),
        b"tiny".to_vec(),
    ];
    let file = write_to_vec(WriterOptions::default(), &records);
    assert_eq!(read_all(&file), records);
}

#[test]
fn test_roundtrip_many_chunks() {
    let records = random_records(11, 2000, 512);
    let file = write_to_vec(
        WriterOptions {
            chunk_size: 4096,
            ..Default::default()
        },
        &records,
    );
    assert_eq!(read_all(&file), records);
}

// -------------------------------------------------------------------
// Compressed round-trips
// -------------------------------------------------------------------

#[test]
fn test_compressed_roundtrip_brotli_shrinks_file() {
    // 1000 records of 1024 repeated-prefix bytes compress very well
    let records: Vec<Vec<u8>> = (0..1000).map(|_| vec![b'A'; 1024]).collect();

    let plain = write_to_vec(WriterOptions::default(), &records);
    let packed = write_to_vec(
        WriterOptions {
            compression: Compression::Brotli(6),
            ..Default::default()
        },
        &records,
    );

    assert!(
        packed.len() < plain.len(),
        "brotli file ({}) not smaller than uncompressed ({})",
        packed.len(),
        plain.len()
    );
    assert_eq!(read_all(&packed), records);
}

#[test]
fn test_compressed_roundtrip_all_codecs() {
    let records = random_records(7, 500, 2048);
    for compression in [
        Compression::Brotli(4),
        Compression::Zstd(3),
        Compression::Zlib(6),
        Compression::Lz4,
    ] {
        let file = write_to_vec(
            WriterOptions {
                compression,
                chunk_size: 64 * 1024,
                ..Default::default()
            },
            &records,
        );
        assert_eq!(read_all(&file), records, "{:?}", compression);
    }
}

#[test]
fn test_size_hint_does_not_change_contents() {
    let records = random_records(3, 200, 1024);
    let without = write_to_vec(
        WriterOptions {
            compression: Compression::Brotli(6),
            ..Default::default()
        },
        &records,
    );
    let with = write_to_vec(
        WriterOptions {
            compression: Compression::Brotli(6),
            size_hint: Some(256 * 1024),
            ..Default::default()
        },
        &records,
    );
    // The hint tunes the encoder; both files must decode identically
    assert_eq!(read_all(&without), records);
    assert_eq!(read_all(&with), records);
}

// -------------------------------------------------------------------
// Parallel determinism
// -------------------------------------------------------------------

#[test]
fn test_parallel_encoding_is_byte_identical() {
    let records = random_records(42, 10_000, 4096);
    let options = |parallelism| WriterOptions {
        chunk_size: 256 * 1024,
        parallelism,
        ..Default::default()
    };

    let sequential = write_to_vec(options(0), &records);
    for parallelism in [1, 4] {
        let parallel = write_to_vec(options(parallelism), &records);
        assert_eq!(
            parallel, sequential,
            "parallelism {} changed the output bytes",
            parallelism
        );
    }
    assert_eq!(read_all(&sequential), records);
}

#[test]
fn test_parallel_encoding_is_byte_identical_compressed() {
    let records = random_records(43, 3_000, 2048);
    let options = |parallelism| WriterOptions {
        compression: Compression::Zstd(3),
        chunk_size: 128 * 1024,
        parallelism,
        ..Default::default()
    };

    let sequential = write_to_vec(options(0), &records);
    for parallelism in [1, 4] {
        let parallel = write_to_vec(options(parallelism), &records);
        assert_eq!(parallel, sequential, "parallelism {}", parallelism);
    }
    assert_eq!(read_all(&sequential), records);
}

// -------------------------------------------------------------------
// File-backed round-trip
// -------------------------------------------------------------------

#[test]
fn test_roundtrip_through_a_real_file() {
    let records = random_records(99, 1500, 1024);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.ribbon");

    let file = std::fs::File::create(&path).unwrap();
    let mut writer = RecordWriter::create(
        file,
        WriterOptions {
            compression: Compression::Zstd(5),
            chunk_size: 32 * 1024,
            parallelism: 2,
            ..Default::default()
        },
    )
    .unwrap();
    for record in &records {
        writer.write_record(record).unwrap();
    }
    writer.close().unwrap();

    let file = std::fs::File::open(&path).unwrap();
    let mut reader = RecordReader::open(file, ReaderOptions::default()).unwrap();
    let mut read_back = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        read_back.push(record.to_vec());
    }
    assert_eq!(read_back, records);
}
