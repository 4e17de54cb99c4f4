//! Positioned reads: serialize a record's position, reopen the file, seek,
//! and get exactly that record back.

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ribbon::records::{ReaderOptions, RecordPosition, RecordReader, RecordWriter, WriterOptions};

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

fn write_to_vec(options: WriterOptions, records: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = RecordWriter::create(Vec::new(), options).unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.into_inner().unwrap().into_inner().unwrap()
}

/// Position of every record, captured during a sequential read.
fn collect_positions(file: &[u8]) -> Vec<RecordPosition> {
    let mut reader =
        RecordReader::open(Cursor::new(file.to_vec()), ReaderOptions::default()).unwrap();
    let mut positions = Vec::new();
    loop {
        let pos = reader.pos().unwrap();
        match reader.next_record().unwrap() {
            Some(_) => positions.push(pos),
            None => break,
        }
    }
    positions
}

#[test]
fn test_seek_to_serialized_positions() {
    let records = random_records(4242, 10_000, 4096);
    let file = write_to_vec(
        WriterOptions {
            chunk_size: 256 * 1024,
            ..Default::default()
        },
        &records,
    );
    let positions = collect_positions(&file);
    assert_eq!(positions.len(), records.len());

    for &index in &[100usize, 5_000, 9_999] {
        let serialized = positions[index].serialize();

        // A fresh reader, as if the position came from an external index
        let mut reader =
            RecordReader::open(Cursor::new(file.clone()), ReaderOptions::default()).unwrap();
        let position = RecordPosition::parse(&serialized).unwrap();
        reader.seek(position).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.as_ref(), records[index].as_slice(), "record {}", index);
    }
}

#[test]
fn test_positions_sort_like_their_serialized_forms() {
    let records = random_records(5, 2_000, 1024);
    let file = write_to_vec(
        WriterOptions {
            chunk_size: 16 * 1024,
            ..Default::default()
        },
        &records,
    );
    let positions = collect_positions(&file);

    for window in positions.windows(2) {
        assert!(window[0] < window[1]);
        assert!(window[0].serialize() < window[1].serialize());
        assert!(window[0].numeric() < window[1].numeric());
    }
}

#[test]
fn test_seek_numeric_approximates_positions() {
    let records = random_records(77, 5_000, 512);
    let file = write_to_vec(
        WriterOptions {
            chunk_size: 8 * 1024,
            ..Default::default()
        },
        &records,
    );
    let positions = collect_positions(&file);

    let mut reader =
        RecordReader::open(Cursor::new(file.clone()), ReaderOptions::default()).unwrap();
    for &index in &[0usize, 17, 2_500, 4_999] {
        reader.seek_numeric(positions[index].numeric()).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.as_ref(), records[index].as_slice(), "record {}", index);
    }
}

#[test]
fn test_seek_works_on_compressed_files() {
    let records = random_records(8, 3_000, 2048);
    let file = write_to_vec(
        WriterOptions {
            compression: ribbon::codec::Compression::Zstd(3),
            chunk_size: 64 * 1024,
            ..Default::default()
        },
        &records,
    );
    let positions = collect_positions(&file);

    let mut reader =
        RecordReader::open(Cursor::new(file), ReaderOptions::default()).unwrap();
    for &index in &[10usize, 1_500, 2_999] {
        reader.seek(positions[index]).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.as_ref(), records[index].as_slice(), "record {}", index);
    }
}

#[test]
fn test_seek_then_sequential_read_continues_correctly() {
    let records = random_records(13, 1_000, 256);
    let file = write_to_vec(
        WriterOptions {
            chunk_size: 2 * 1024,
            ..Default::default()
        },
        &records,
    );
    let positions = collect_positions(&file);

    let mut reader =
        RecordReader::open(Cursor::new(file), ReaderOptions::default()).unwrap();
    reader.seek(positions[700]).unwrap();
    for expected in &records[700..] {
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.as_ref(), expected.as_slice());
    }
    assert!(reader.next_record().unwrap().is_none());
}
