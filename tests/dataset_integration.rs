//! Integration tests for replaying datasets from catalogs and directories.

use std::fs;
use std::path::{Path, PathBuf};

use harvester_core::catalog::{CatalogEntry, CatalogWriter, WriteMode};
use harvester_core::dataset::DatasetIterator;
use harvester_core::urls::AssetExtensions;
use tempfile::TempDir;

fn build_dataset(dir: &Path, count: usize) -> (PathBuf, Vec<PathBuf>) {
    let catalog_path = dir.join("annotations.csv");
    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).expect("open");
    let mut assets = Vec::new();
    for i in 1..=count {
        let path = dir.join(format!("{i:04}_clip.mp3"));
        fs::write(&path, vec![1u8; 2048]).expect("write asset");
        let entry = CatalogEntry::for_asset(&path, &catalog_path, format!("clip {i}")).expect("entry");
        writer.append(&entry).expect("append");
        assets.push(path);
    }
    writer.finish().expect("finish");
    (catalog_path, assets)
}

fn collect(iter: &mut DatasetIterator) -> Vec<PathBuf> {
    iter.by_ref().map(|item| item.expect("readable")).collect()
}

#[test]
fn test_replay_yields_catalog_order() {
    let dir = TempDir::new().expect("temp dir");
    let (catalog_path, assets) = build_dataset(dir.path(), 4);

    let mut iter = DatasetIterator::from_catalog(&catalog_path).expect("dataset");

    assert_eq!(collect(&mut iter), assets);
    assert!(!iter.has_next());
}

#[test]
fn test_deleted_file_is_skipped() {
    let dir = TempDir::new().expect("temp dir");
    let (catalog_path, assets) = build_dataset(dir.path(), 5);
    fs::remove_file(&assets[2]).expect("delete");

    let mut iter = DatasetIterator::from_catalog(&catalog_path).expect("dataset");
    let paths = collect(&mut iter);

    assert_eq!(paths.len(), 4);
    assert!(!paths.contains(&assets[2]));
    assert_eq!(iter.total().expect("total"), 4);
}

#[test]
fn test_moved_dataset_falls_back_to_relative_paths() {
    let dir = TempDir::new().expect("temp dir");
    let original = dir.path().join("original");
    fs::create_dir_all(&original).expect("dir");
    build_dataset(&original, 3);

    let moved = dir.path().join("moved");
    fs::rename(&original, &moved).expect("move dataset");

    let mut iter = DatasetIterator::from_catalog(&moved.join("annotations.csv")).expect("dataset");
    let paths = collect(&mut iter);

    assert_eq!(
        paths,
        vec![
            moved.join("0001_clip.mp3"),
            moved.join("0002_clip.mp3"),
            moved.join("0003_clip.mp3"),
        ]
    );
}

#[test]
fn test_reset_restarts_from_first_entry() {
    let dir = TempDir::new().expect("temp dir");
    let (catalog_path, assets) = build_dataset(dir.path(), 3);

    let mut iter = DatasetIterator::from_catalog(&catalog_path).expect("dataset");
    let first = iter.next().expect("item").expect("readable");
    assert_eq!(first, assets[0]);
    iter.reset();

    assert_eq!(iter.yielded(), 0);
    assert_eq!(collect(&mut iter), assets);
}

#[test]
fn test_directory_replay_filters_extensions() {
    let dir = TempDir::new().expect("temp dir");
    let nested = dir.path().join("b");
    fs::create_dir_all(&nested).expect("dir");
    fs::write(dir.path().join("a.mp3"), b"x").expect("write");
    fs::write(dir.path().join("notes.txt"), b"x").expect("write");
    fs::write(nested.join("c.WAV"), b"x").expect("write");

    let mut iter = DatasetIterator::from_directory(dir.path(), AssetExtensions::new(["mp3", "wav"]))
        .expect("dataset");

    assert_eq!(collect(&mut iter), vec![dir.path().join("a.mp3"), nested.join("c.WAV")]);
}

#[test]
fn test_missing_catalog_fails_up_front() {
    let dir = TempDir::new().expect("temp dir");
    assert!(DatasetIterator::from_catalog(&dir.path().join("none.csv")).is_err());
}

#[test]
fn test_catalog_written_through_parent_component_survives_move() {
    let dir = TempDir::new().expect("temp dir");
    let work = dir.path().join("work");
    fs::create_dir_all(work.join("sub")).expect("dir");
    fs::create_dir_all(work.join("out")).expect("dir");
    let asset = work.join("out").join("0001_a.mp3");
    fs::write(&asset, vec![1u8; 2048]).expect("write asset");

    let catalog_path = work.join("sub").join("..").join("cat.csv");
    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).expect("open");
    let entry = CatalogEntry::for_asset(&asset, &catalog_path, "a").expect("entry");
    assert_eq!(entry.relative_path, Path::new("out/0001_a.mp3"));
    writer.append(&entry).expect("append");
    writer.finish().expect("finish");

    let moved = dir.path().join("moved");
    fs::rename(&work, &moved).expect("move dataset");

    let mut iter = DatasetIterator::from_catalog(&moved.join("cat.csv")).expect("dataset");
    assert_eq!(collect(&mut iter), vec![moved.join("out").join("0001_a.mp3")]);
}
