//! `replay`: prints the paths of a catalog or directory dataset.

use std::io::{self, Write};

use anyhow::{Context, Result};
use harvester_core::AssetExtensions;
use harvester_core::dataset::DatasetIterator;
use tracing::info;

use crate::ProcessExit;
use crate::cli::ReplayArgs;

/// Opens the dataset named by `args`.
pub(crate) fn open_dataset(args: &ReplayArgs) -> Result<DatasetIterator> {
    if let Some(catalog) = &args.annotation_file {
        return DatasetIterator::from_catalog(catalog)
            .with_context(|| format!("cannot replay catalog {}", catalog.display()));
    }
    let dir = args
        .dir
        .as_deref()
        .context("replay needs --annotation-file or --dir")?;
    let extensions = if args.extensions.is_empty() {
        AssetExtensions::default()
    } else {
        AssetExtensions::new(&args.extensions)
    };
    DatasetIterator::from_directory(dir, extensions)
        .with_context(|| format!("cannot replay directory {}", dir.display()))
}

/// Writes `N/total<TAB>path` for every item of `dataset`.
pub(crate) fn write_replay(dataset: &mut DatasetIterator, out: &mut impl Write) -> Result<usize> {
    let total = dataset.total().context("failed to count dataset")?;
    while dataset.has_next() {
        let Some(item) = dataset.next() else {
            break;
        };
        let path = item.context("failed to read dataset")?;
        writeln!(out, "{}/{}\t{}", dataset.yielded(), total, path.display())?;
    }
    Ok(dataset.yielded())
}

pub(crate) fn run_replay(args: &ReplayArgs) -> Result<ProcessExit> {
    let mut dataset = open_dataset(args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let replayed = write_replay(&mut dataset, &mut out)?;
    out.flush()?;
    info!(replayed, "replay complete");
    Ok(ProcessExit::Success)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn replay_args(annotation_file: Option<PathBuf>, dir: Option<PathBuf>) -> ReplayArgs {
        ReplayArgs {
            annotation_file,
            dir,
            extensions: Vec::new(),
            verbose: 0,
            quiet: false,
        }
    }

    #[test]
    fn test_write_replay_numbers_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("b.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("skip.txt"), b"x").unwrap();

        let mut dataset = open_dataset(&replay_args(None, Some(dir.path().to_path_buf()))).unwrap();
        let mut out = Vec::new();
        let count = write_replay(&mut dataset, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(count, 2);
        assert!(lines[0].starts_with("1/2\t"));
        assert!(lines[0].ends_with("a.mp3"));
        assert!(lines[1].starts_with("2/2\t"));
    }

    #[test]
    fn test_open_dataset_reports_bad_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("c.csv");
        std::fs::write(&catalog, "name\nx\n").unwrap();

        let error = open_dataset(&replay_args(Some(catalog), None)).unwrap_err();
        assert!(format!("{error:#}").contains("missing column"));
    }
}
