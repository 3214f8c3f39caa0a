//! Integration tests for writing and reading annotation catalogs on disk.

use std::fs;
use std::path::Path;

use harvester_core::catalog::{AppendOutcome, CatalogEntry, CatalogError, CatalogWriter, WriteMode, read_all};
use tempfile::TempDir;

fn asset(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![7u8; 2048]).expect("write asset");
    path
}

#[test]
fn test_written_catalog_reads_back_in_order() {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("annotations.csv");
    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).expect("open");

    let mut expected = Vec::new();
    for (name, title) in [("0001_bark.mp3", "Bark, loud"), ("0002_howl.mp3", "Howl \"long\"")] {
        let entry = CatalogEntry::for_asset(&asset(dir.path(), name), &catalog_path, title).expect("entry");
        assert_eq!(writer.append(&entry).expect("append"), AppendOutcome::Written);
        expected.push(entry);
    }
    assert_eq!(writer.finish().expect("finish"), 2);

    let entries = read_all(&catalog_path).expect("read");
    assert_eq!(entries, expected);
    assert_eq!(entries[0].relative_path, Path::new("0001_bark.mp3"));
}

#[test]
fn test_catalog_in_sibling_directory_gets_parent_relative_paths() {
    let dir = TempDir::new().expect("temp dir");
    let media = dir.path().join("media");
    fs::create_dir_all(&media).expect("media dir");
    let catalog_path = dir.path().join("meta").join("catalog.csv");

    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).expect("open");
    let entry = CatalogEntry::for_asset(&asset(&media, "0001_a.wav"), &catalog_path, "a").expect("entry");
    writer.append(&entry).expect("append");
    writer.finish().expect("finish");

    let entries = read_all(&catalog_path).expect("read");
    assert_eq!(entries[0].relative_path, Path::new("../media/0001_a.wav"));
}

#[test]
fn test_hand_edited_catalog_with_reordered_and_extra_columns() {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("edited.csv");
    fs::write(
        &catalog_path,
        "relative_path,license,Title,absolute_path\n\
         a.mp3,CC0,First,/data/a.mp3\n\
         b.mp3,CC-BY,Second,/data/b.mp3\n",
    )
    .expect("write catalog");

    let entries = read_all(&catalog_path).expect("read");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].title, "Second");
    assert_eq!(entries[1].absolute_path, Path::new("/data/b.mp3"));
    assert_eq!(entries[1].relative_path, Path::new("b.mp3"));
}

#[test]
fn test_catalog_without_required_column_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("broken.csv");
    fs::write(&catalog_path, "name,path\nx,/data/x.mp3\n").expect("write catalog");

    let error = read_all(&catalog_path).unwrap_err();

    assert!(matches!(error, CatalogError::Parse { line: 1, .. }), "{error:?}");
}

#[test]
fn test_merge_mode_keeps_previous_run_and_skips_duplicates() {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("annotations.csv");
    let first = CatalogEntry::for_asset(&asset(dir.path(), "0001_a.mp3"), &catalog_path, "a").expect("entry");
    let second = CatalogEntry::for_asset(&asset(dir.path(), "0002_b.mp3"), &catalog_path, "b").expect("entry");

    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).expect("open");
    writer.append(&first).expect("append");
    writer.finish().expect("finish");

    let writer = CatalogWriter::open_for_write(&catalog_path, WriteMode::Merge).expect("reopen");
    assert_eq!(writer.append(&first).expect("append"), AppendOutcome::AlreadyPresent);
    assert_eq!(writer.append(&second).expect("append"), AppendOutcome::Written);
    assert_eq!(writer.finish().expect("finish"), 2);

    let titles: Vec<String> = read_all(&catalog_path)
        .expect("read")
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, vec!["a", "b"]);
}
