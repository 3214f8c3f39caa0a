//! Single-writer catalog handle shared by concurrent download workers.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use csv::Writer;
use tracing::{debug, info, instrument};

use super::{AppendOutcome, CATALOG_HEADER, CatalogEntry, CatalogError, WriteMode, read_all};

struct WriterState {
    writer: Writer<File>,
    rows: usize,
    known: HashSet<PathBuf>,
}

/// Open catalog. Appends from many tasks are serialized by an internal lock.
///
/// Every row is flushed and synced before [`append`](Self::append) returns,
/// so an interrupted run leaves a valid catalog. The file is flushed again
/// when the writer is dropped.
pub struct CatalogWriter {
    path: PathBuf,
    state: Mutex<WriterState>,
}

impl std::fmt::Debug for CatalogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogWriter")
            .field("path", &self.path)
            .field("rows", &self.rows())
            .finish_non_exhaustive()
    }
}

impl CatalogWriter {
    /// Creates the catalog at `path` and writes the header.
    ///
    /// In [`WriteMode::Merge`], rows of an existing catalog whose file is
    /// still present are carried over.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory or file cannot be created, or if an
    /// existing catalog cannot be parsed in merge mode.
    #[instrument(skip_all, fields(path = %path.display(), ?mode))]
    pub fn open_for_write(path: &Path, mode: WriteMode) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }

        let carried = match mode {
            WriteMode::Merge if path.exists() => {
                let existing = read_all(path)?;
                let total = existing.len();
                let kept: Vec<CatalogEntry> = existing
                    .into_iter()
                    .filter(|entry| entry.absolute_path.is_file())
                    .collect();
                info!(kept = kept.len(), dropped = total - kept.len(), "merging existing catalog");
                kept
            }
            _ => Vec::new(),
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| CatalogError::io(path, e))?;

        let mut state = WriterState {
            writer: Writer::from_writer(file),
            rows: 0,
            known: HashSet::new(),
        };
        state
            .writer
            .write_record(CATALOG_HEADER)
            .map_err(|e| CatalogError::csv(path, e))?;
        for entry in carried {
            write_row(&mut state.writer, &entry, path)?;
            state.known.insert(entry.absolute_path);
            state.rows += 1;
        }
        sync(&mut state.writer, path)?;

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    /// Catalog file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows currently in the catalog.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).rows
    }

    /// Appends one row and makes it durable before returning.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidEntry`] when the asset file is missing
    /// or empty, and IO/CSV errors when the row cannot be written.
    pub fn append(&self, entry: &CatalogEntry) -> Result<AppendOutcome, CatalogError> {
        let metadata = std::fs::metadata(&entry.absolute_path).map_err(|_| {
            CatalogError::invalid_entry(&entry.absolute_path, "asset file does not exist")
        })?;
        if !metadata.is_file() {
            return Err(CatalogError::invalid_entry(&entry.absolute_path, "not a regular file"));
        }
        if metadata.len() == 0 {
            return Err(CatalogError::invalid_entry(&entry.absolute_path, "asset file is empty"));
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.known.contains(&entry.absolute_path) {
            debug!(path = %entry.absolute_path.display(), "catalog already lists asset");
            return Ok(AppendOutcome::AlreadyPresent);
        }

        write_row(&mut state.writer, entry, &self.path)?;
        sync(&mut state.writer, &self.path)?;
        state.known.insert(entry.absolute_path.clone());
        state.rows += 1;
        Ok(AppendOutcome::Written)
    }

    /// Flushes and closes the catalog, returning the final row count.
    ///
    /// # Errors
    ///
    /// Fails if the final flush cannot be completed.
    pub fn finish(self) -> Result<usize, CatalogError> {
        let mut state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        sync(&mut state.writer, &self.path)?;
        debug!(path = %self.path.display(), rows = state.rows, "catalog closed");
        Ok(state.rows)
    }
}

fn write_row(writer: &mut Writer<File>, entry: &CatalogEntry, path: &Path) -> Result<(), CatalogError> {
    writer
        .write_record([
            entry.title.as_str(),
            &*entry.absolute_path.to_string_lossy(),
            &*entry.relative_path.to_string_lossy(),
        ])
        .map_err(|e| CatalogError::csv(path, e))
}

fn sync(writer: &mut Writer<File>, path: &Path) -> Result<(), CatalogError> {
    writer.flush().map_err(|e| CatalogError::io(path, e))?;
    writer
        .get_ref()
        .sync_data()
        .map_err(|e| CatalogError::io(path, e))
}
