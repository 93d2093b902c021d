use std::fs;
use std::path::PathBuf;

use burnr_core::{Error, ImageFile, ImageOptions};
use tempfile::TempDir;

fn write_image(dir: &TempDir, name: &str, len: usize) -> PathBuf {
    let path = dir.path().join(name);
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    fs::write(&path, bytes).unwrap();
    path
}

fn options(chunk_size: usize) -> ImageOptions {
    ImageOptions {
        chunk_size,
        ..ImageOptions::default()
    }
}

#[test]
fn total_chunks_is_ceiling_division() {
    let dir = TempDir::new().unwrap();
    for (len, chunk_size, expected) in [
        (0usize, 8usize, 0u64),
        (1, 8, 1),
        (7, 8, 1),
        (8, 8, 1),
        (9, 8, 2),
        (16, 8, 2),
        (17, 8, 3),
        (100_000, 32 * 1024, 4),
    ] {
        let path = write_image(&dir, &format!("img-{len}-{chunk_size}.img"), len);
        let image = ImageFile::open_with(&path, options(chunk_size)).unwrap();
        assert_eq!(
            image.total_chunks().unwrap(),
            expected,
            "len={len} chunk_size={chunk_size}"
        );
    }
}

#[test]
fn chunks_cover_the_file_exactly() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "cover.img", 100);

    let image = ImageFile::open_with(&path, options(16)).unwrap();
    assert_eq!(image.total_chunks().unwrap(), 7);

    let chunks: Vec<Vec<u8>> = image.into_chunks().unwrap().map(|c| c.unwrap()).collect();
    assert_eq!(chunks.len(), 7);
    assert!(chunks[..6].iter().all(|c| c.len() == 16));
    assert_eq!(chunks[6].len(), 4);
    assert_eq!(chunks.concat(), fs::read(&path).unwrap());
}

#[test]
fn empty_image_yields_no_chunks() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "empty.img", 0);

    let image = ImageFile::open_with(&path, options(8)).unwrap();
    assert_eq!(image.total_chunks().unwrap(), 0);
    assert_eq!(image.into_chunks().unwrap().count(), 0);
}

#[test]
fn exhausted_sequence_stays_exhausted() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "twice.img", 16);

    let image = ImageFile::open_with(&path, options(8)).unwrap();
    let mut chunks = image.into_chunks().unwrap();
    assert_eq!(chunks.by_ref().count(), 2);
    assert!(chunks.next().is_none());
    assert!(chunks.next().is_none());
}

#[test]
fn rejects_unknown_extensions_lexically() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "notes.txt", 10);

    match ImageFile::open(&path) {
        Err(Error::InvalidExtension { .. }) => {}
        other => panic!("expected InvalidExtension, got {other:?}"),
    }

    // The same path is fine once the check is turned off.
    let relaxed = ImageOptions {
        check_extension: false,
        ..ImageOptions::default()
    };
    assert!(ImageFile::open_with(&path, relaxed).is_ok());
}

#[test]
fn extension_matching_ignores_case() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "UPPER.ISO", 10);
    assert!(ImageFile::open(&path).is_ok());
}

#[test]
fn missing_file_is_reported_as_such() {
    match ImageFile::open("/no/such/file.img") {
        Err(Error::FileNotFound { .. }) => {}
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}
