//! CSV annotation catalog of acquired assets.
//!
//! The catalog is the only durable record a run produces: one row per
//! successfully downloaded asset, header `title,absolute_path,relative_path`.
//! [`CatalogWriter`] is the single writer during a run; [`read_all`] and
//! [`crate::dataset::DatasetIterator`] read it back.

mod error;
mod reader;
mod writer;

pub use error::CatalogError;
pub use reader::{CatalogColumns, read_all};
pub(crate) use reader::open as open_reader;
pub use writer::CatalogWriter;

use std::path::{Component, Path, PathBuf};

/// Column names, in written order.
pub const CATALOG_HEADER: [&str; 3] = ["title", "absolute_path", "relative_path"];

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Human-readable asset title.
    pub title: String,
    /// Absolute location of the asset at write time.
    pub absolute_path: PathBuf,
    /// Location relative to the catalog's directory.
    pub relative_path: PathBuf,
}

impl CatalogEntry {
    /// Builds the entry for `asset_path`, with `relative_path` computed
    /// against the directory that holds `catalog_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if either path cannot be made absolute.
    pub fn for_asset(
        asset_path: &Path,
        catalog_path: &Path,
        title: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let absolute_path = std::path::absolute(asset_path)
            .map(|p| normalize_lexically(&p))
            .map_err(|e| CatalogError::io(asset_path, e))?;
        let catalog_absolute = std::path::absolute(catalog_path)
            .map(|p| normalize_lexically(&p))
            .map_err(|e| CatalogError::io(catalog_path, e))?;
        let catalog_dir = catalog_absolute.parent().unwrap_or(Path::new("/"));

        Ok(Self {
            title: title.into(),
            relative_path: relative_to(&absolute_path, catalog_dir),
            absolute_path,
        })
    }
}

/// How [`CatalogWriter::open_for_write`] treats an existing catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty catalog.
    #[default]
    Truncate,
    /// Keep existing rows whose file still exists; skip duplicate appends.
    Merge,
}

/// Result of [`CatalogWriter::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new row was written.
    Written,
    /// A row with the same absolute path already exists.
    AlreadyPresent,
}

/// Removes `.` components and folds `..` into its parent without touching
/// the filesystem. `..` at the root is dropped.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Path of `path` relative to `base`. Both are expected to be absolute and
/// free of `.`/`..` components (see [`normalize_lexically`]).
#[must_use]
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_sibling_directory() {
        assert_eq!(
            relative_to(Path::new("/data/out/0001_a.mp3"), Path::new("/data/out")),
            PathBuf::from("0001_a.mp3")
        );
        assert_eq!(
            relative_to(Path::new("/data/out/0001_a.mp3"), Path::new("/data/meta")),
            PathBuf::from("../out/0001_a.mp3")
        );
    }

    #[test]
    fn test_relative_to_nested_and_deeper_base() {
        assert_eq!(
            relative_to(Path::new("/a/b/c/x.wav"), Path::new("/a/d/e")),
            PathBuf::from("../../b/c/x.wav")
        );
    }

    #[test]
    fn test_normalize_lexically_folds_dot_components() {
        assert_eq!(
            normalize_lexically(Path::new("/work/sub/../out/./a.mp3")),
            PathBuf::from("/work/out/a.mp3")
        );
        assert_eq!(normalize_lexically(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("../x/../y")), PathBuf::from("../y"));
    }

    #[test]
    fn test_for_asset_catalog_path_with_parent_component() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(work.join("sub")).unwrap();
        let asset = work.join("out").join("0001_a.mp3");
        let catalog = work.join("sub").join("..").join("cat.csv");

        let entry = CatalogEntry::for_asset(&asset, &catalog, "a").unwrap();

        assert_eq!(entry.relative_path, PathBuf::from("out/0001_a.mp3"));
        assert_eq!(entry.absolute_path, normalize_lexically(&std::path::absolute(&asset).unwrap()));
    }

    #[test]
    fn test_for_asset_uses_catalog_directory() {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("assets").join("0001_dog.mp3");
        let catalog = dir.path().join("catalog.csv");

        let entry = CatalogEntry::for_asset(&asset, &catalog, "Dog").unwrap();

        assert_eq!(entry.title, "Dog");
        assert!(entry.absolute_path.is_absolute());
        assert_eq!(entry.relative_path, PathBuf::from("assets/0001_dog.mp3"));
    }

    #[test]
    fn test_write_mode_defaults_to_truncate() {
        assert_eq!(WriteMode::default(), WriteMode::Truncate);
    }
}
