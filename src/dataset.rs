//! Lazy, restartable replay of acquired assets.
//!
//! A [`DatasetIterator`] walks either a catalog (row order) or a directory
//! tree (sorted by name) and yields paths of files that exist right now.
//! Nothing is opened until the first call to [`DatasetIterator::has_next`] or
//! `next`; the underlying handle is dropped on exhaustion, on
//! [`DatasetIterator::reset`], or with the iterator.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use harvester_core::dataset::DatasetIterator;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dataset = DatasetIterator::from_catalog(Path::new("out/catalog.csv"))?;
//! while dataset.has_next() {
//!     if let Some(path) = dataset.next() {
//!         println!("{}", path?.display());
//!     }
//! }
//! dataset.reset();
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecordsIntoIter;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::catalog::{CatalogColumns, CatalogError, normalize_lexically, open_reader};
use crate::urls::AssetExtensions;

/// Errors surfaced while replaying a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The catalog could not be opened or parsed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Directory traversal failed.
    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        /// Root of the walk.
        root: PathBuf,
        /// Underlying walkdir error.
        #[source]
        source: walkdir::Error,
    },

    /// The directory source is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
}

#[derive(Debug, Clone)]
enum DatasetSource {
    Catalog { path: PathBuf, base_dir: PathBuf },
    Directory { root: PathBuf, extensions: AssetExtensions },
}

enum Cursor {
    Catalog {
        records: StringRecordsIntoIter<File>,
        columns: CatalogColumns,
    },
    Directory(walkdir::IntoIter),
}

enum State {
    NotStarted,
    Open(Box<Cursor>),
    Exhausted,
}

/// Sequence of existing asset paths from a catalog or a directory.
pub struct DatasetIterator {
    source: DatasetSource,
    state: State,
    peeked: Option<Result<PathBuf, DatasetError>>,
    position: usize,
}

impl std::fmt::Debug for DatasetIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetIterator")
            .field("source", &self.source)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl DatasetIterator {
    /// Replays the catalog at `path`. The header is validated immediately;
    /// rows are read lazily.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be opened or lacks a required column.
    pub fn from_catalog(path: &Path) -> Result<Self, DatasetError> {
        drop(open_reader(path)?);

        let absolute = std::path::absolute(path)
            .map(|p| normalize_lexically(&p))
            .map_err(|e| CatalogError::io(path, e))?;
        let base_dir = absolute
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Ok(Self::with_source(DatasetSource::Catalog {
            path: path.to_path_buf(),
            base_dir,
        }))
    }

    /// Replays every file under `root` whose extension is in `extensions`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::NotADirectory`] if `root` is not a directory.
    pub fn from_directory(root: &Path, extensions: AssetExtensions) -> Result<Self, DatasetError> {
        if !root.is_dir() {
            return Err(DatasetError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        Ok(Self::with_source(DatasetSource::Directory {
            root: root.to_path_buf(),
            extensions,
        }))
    }

    fn with_source(source: DatasetSource) -> Self {
        Self {
            source,
            state: State::NotStarted,
            peeked: None,
            position: 0,
        }
    }

    /// Returns true if another item is available. Opens the source on first use.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked.is_some()
    }

    /// Rewinds to the start. The next call re-opens the source.
    pub fn reset(&mut self) {
        self.state = State::NotStarted;
        self.peeked = None;
        self.position = 0;
    }

    /// Number of paths yielded since construction or the last reset.
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.position
    }

    /// Counts the paths a fresh pass would yield, without disturbing this iterator.
    ///
    /// # Errors
    ///
    /// Returns the first error the fresh pass encounters.
    pub fn total(&self) -> Result<usize, DatasetError> {
        let mut count = 0;
        for item in Self::with_source(self.source.clone()) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn open(&self) -> Result<Cursor, DatasetError> {
        match &self.source {
            DatasetSource::Catalog { path, .. } => {
                let (reader, columns) = open_reader(path)?;
                Ok(Cursor::Catalog {
                    records: reader.into_records(),
                    columns,
                })
            }
            DatasetSource::Directory { root, .. } => Ok(Cursor::Directory(
                WalkDir::new(root).sort_by_file_name().into_iter(),
            )),
        }
    }

    fn advance(&mut self) -> Option<Result<PathBuf, DatasetError>> {
        if matches!(self.state, State::NotStarted) {
            match self.open() {
                Ok(cursor) => self.state = State::Open(Box::new(cursor)),
                Err(error) => {
                    self.state = State::Exhausted;
                    return Some(Err(error));
                }
            }
        }

        let State::Open(cursor) = &mut self.state else {
            return None;
        };
        let next = match (cursor.as_mut(), &self.source) {
            (Cursor::Catalog { records, columns }, DatasetSource::Catalog { path, base_dir }) => {
                next_catalog_path(records, columns, path, base_dir)
            }
            (Cursor::Directory(walk), DatasetSource::Directory { root, extensions }) => {
                next_directory_path(walk, root, extensions)
            }
            _ => None,
        };

        if next.is_none() {
            self.state = State::Exhausted;
        }
        next
    }
}

impl Iterator for DatasetIterator {
    type Item = Result<PathBuf, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.peeked.take() {
            Some(item) => Some(item),
            None => self.advance(),
        };
        if matches!(item, Some(Ok(_))) {
            self.position += 1;
        }
        item
    }
}

fn next_catalog_path(
    records: &mut StringRecordsIntoIter<File>,
    columns: &CatalogColumns,
    catalog: &Path,
    base_dir: &Path,
) -> Option<Result<PathBuf, DatasetError>> {
    for record in records.by_ref() {
        let entry = match record
            .map_err(|e| CatalogError::csv(catalog, e))
            .and_then(|record| columns.entry(&record, catalog))
        {
            Ok(entry) => entry,
            Err(error) => return Some(Err(error.into())),
        };

        if entry.absolute_path.is_file() {
            return Some(Ok(entry.absolute_path));
        }
        if !entry.relative_path.as_os_str().is_empty() {
            let moved = base_dir.join(&entry.relative_path);
            if moved.is_file() {
                return Some(Ok(moved));
            }
        }
        debug!(path = %entry.absolute_path.display(), "catalog entry no longer on disk, skipping");
    }
    None
}

fn next_directory_path(
    walk: &mut walkdir::IntoIter,
    root: &Path,
    extensions: &AssetExtensions,
) -> Option<Result<PathBuf, DatasetError>> {
    for entry in walk.by_ref() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                return Some(Err(DatasetError::Walk {
                    root: root.to_path_buf(),
                    source,
                }));
            }
        };
        if entry.file_type().is_file() && extensions.matches_path(entry.path()) {
            return Some(Ok(entry.into_path()));
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, CatalogWriter, WriteMode};

    fn write_asset(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"payload").unwrap();
    }

    fn catalog_of(dir: &Path, names: &[&str]) -> PathBuf {
        let catalog = dir.join("catalog.csv");
        let writer = CatalogWriter::open_for_write(&catalog, WriteMode::Truncate).unwrap();
        for name in names {
            let asset = dir.join("assets").join(name);
            write_asset(&asset);
            writer
                .append(&CatalogEntry::for_asset(&asset, &catalog, *name).unwrap())
                .unwrap();
        }
        writer.finish().unwrap();
        catalog
    }

    // ==================== Catalog Tests ====================

    #[test]
    fn test_catalog_yields_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["b.mp3", "a.mp3", "c.mp3"]);

        let names: Vec<String> = DatasetIterator::from_catalog(&catalog)
            .unwrap()
            .map(|p| p.unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["b.mp3", "a.mp3", "c.mp3"]);
    }

    #[test]
    fn test_catalog_skips_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["a.mp3", "b.mp3", "c.mp3"]);
        std::fs::remove_file(dir.path().join("assets").join("b.mp3")).unwrap();

        let dataset = DatasetIterator::from_catalog(&catalog).unwrap();
        assert_eq!(dataset.total().unwrap(), 2);
    }

    #[test]
    fn test_catalog_falls_back_to_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.csv");
        write_asset(&dir.path().join("assets").join("moved.mp3"));
        std::fs::write(
            &catalog,
            "title,absolute_path,relative_path\nMoved,/nonexistent/old/moved.mp3,assets/moved.mp3\n",
        )
        .unwrap();

        let paths: Vec<PathBuf> = DatasetIterator::from_catalog(&catalog)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("assets/moved.mp3"));
        assert!(paths[0].is_file());
    }

    #[test]
    fn test_catalog_header_is_validated_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.csv");
        std::fs::write(&catalog, "name,file\nx,y\n").unwrap();

        let error = DatasetIterator::from_catalog(&catalog).unwrap_err();
        assert!(matches!(error, DatasetError::Catalog(CatalogError::Parse { .. })));
    }

    #[test]
    fn test_short_row_surfaces_as_error_item() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.csv");
        std::fs::write(&catalog, "title,absolute_path,relative_path\nbroken\n").unwrap();

        let mut dataset = DatasetIterator::from_catalog(&catalog).unwrap();
        assert!(dataset.has_next());
        assert!(dataset.next().unwrap().is_err());
        assert!(!dataset.has_next());
    }

    // ==================== Cursor Tests ====================

    #[test]
    fn test_has_next_does_not_consume() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["a.mp3"]);
        let mut dataset = DatasetIterator::from_catalog(&catalog).unwrap();

        assert!(dataset.has_next());
        assert!(dataset.has_next());
        assert_eq!(dataset.yielded(), 0);
        assert!(dataset.next().unwrap().is_ok());
        assert_eq!(dataset.yielded(), 1);
        assert!(!dataset.has_next());
        assert!(dataset.next().is_none());
    }

    #[test]
    fn test_yielded_through_mutable_borrow() {
        fn drain(dataset: &mut DatasetIterator) -> usize {
            while dataset.has_next() {
                let _ = dataset.next();
            }
            dataset.yielded()
        }

        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["a.mp3", "b.mp3"]);
        let mut dataset = DatasetIterator::from_catalog(&catalog).unwrap();

        assert_eq!(drain(&mut dataset), 2);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["a.mp3", "b.mp3"]);
        let mut dataset = DatasetIterator::from_catalog(&catalog).unwrap();

        let first: Vec<PathBuf> = dataset.by_ref().map(Result::unwrap).collect();
        dataset.reset();
        assert_eq!(dataset.yielded(), 0);
        let second: Vec<PathBuf> = dataset.by_ref().map(Result::unwrap).collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_total_is_independent_of_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_of(dir.path(), &["a.mp3", "b.mp3", "c.mp3"]);
        let mut dataset = DatasetIterator::from_catalog(&catalog).unwrap();

        dataset.next();
        assert_eq!(dataset.total().unwrap(), 3);
        assert_eq!(dataset.yielded(), 1);
        assert_eq!(dataset.count(), 2);
    }

    // ==================== Directory Tests ====================

    #[test]
    fn test_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(&dir.path().join("b.WAV"));
        write_asset(&dir.path().join("a.mp3"));
        write_asset(&dir.path().join("notes.txt"));
        write_asset(&dir.path().join("sub").join("c.mp3"));

        let names: Vec<String> =
            DatasetIterator::from_directory(dir.path(), AssetExtensions::new(["mp3", "wav"]))
                .unwrap()
                .map(|p| p.unwrap().file_name().unwrap().to_string_lossy().into_owned())
                .collect();

        assert_eq!(names, vec!["a.mp3", "b.WAV", "c.mp3"]);
    }

    #[test]
    fn test_directory_source_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let error =
            DatasetIterator::from_directory(&dir.path().join("missing"), AssetExtensions::default())
                .unwrap_err();
        assert!(matches!(error, DatasetError::NotADirectory { .. }));
    }

    #[test]
    fn test_empty_directory_has_no_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = DatasetIterator::from_directory(dir.path(), AssetExtensions::default()).unwrap();
        assert!(!dataset.has_next());
        assert_eq!(dataset.total().unwrap(), 0);
    }
}
