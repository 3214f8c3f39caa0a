//! Catalog parsing.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};

use super::{CATALOG_HEADER, CatalogEntry, CatalogError};

/// Column positions of the three required fields in a catalog header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogColumns {
    title: usize,
    absolute_path: usize,
    relative_path: usize,
}

impl CatalogColumns {
    /// Locates the required columns by name, ignoring case, order and extras.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] naming the first missing column.
    pub fn locate(headers: &StringRecord, path: &Path) -> Result<Self, CatalogError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| CatalogError::parse(path, 1, format!("missing column '{name}'")))
        };

        Ok(Self {
            title: find(CATALOG_HEADER[0])?,
            absolute_path: find(CATALOG_HEADER[1])?,
            relative_path: find(CATALOG_HEADER[2])?,
        })
    }

    /// Smallest record length that carries all three fields.
    #[must_use]
    pub fn min_len(&self) -> usize {
        self.title.max(self.absolute_path).max(self.relative_path) + 1
    }

    /// Builds an entry from one data record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] on a short row or an empty absolute path.
    pub fn entry(&self, record: &StringRecord, path: &Path) -> Result<CatalogEntry, CatalogError> {
        let line = record.position().map_or(0, csv::Position::line);
        if record.len() < self.min_len() {
            return Err(CatalogError::parse(
                path,
                line,
                format!("expected at least {} fields, found {}", self.min_len(), record.len()),
            ));
        }

        let field = |index: usize| record.get(index).unwrap_or_default();
        let absolute = field(self.absolute_path);
        if absolute.trim().is_empty() {
            return Err(CatalogError::parse(path, line, "empty absolute_path"));
        }

        Ok(CatalogEntry {
            title: field(self.title).to_string(),
            absolute_path: PathBuf::from(absolute),
            relative_path: PathBuf::from(field(self.relative_path)),
        })
    }
}

/// Opens a catalog and validates its header.
pub(crate) fn open(path: &Path) -> Result<(Reader<File>, CatalogColumns), CatalogError> {
    let file = File::open(path).map_err(|e| CatalogError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| CatalogError::csv(path, e))?
        .clone();
    let columns = CatalogColumns::locate(&headers, path)?;
    Ok((reader, columns))
}

/// Reads every entry of the catalog at `path`, in row order.
///
/// # Errors
///
/// Fails on IO errors, a header lacking a required column, or a short row.
pub fn read_all(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let (mut reader, columns) = open(path)?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CatalogError::csv(path, e))?;
        entries.push(columns.entry(&record, path)?);
    }
    Ok(entries)
}
