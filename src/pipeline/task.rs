//! Per-reference work: resolve, download, record.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::stats::AcquisitionStats;
use crate::catalog::{AppendOutcome, CatalogEntry, CatalogError, CatalogWriter};
use crate::crawl::AssetReference;
use crate::download::{AssetDownloader, FailureReason, asset_filename};
use crate::fetch::PageFetcher;
use crate::resolver::{ResolutionMiss, UrlResolver};

/// Everything a worker task needs, shared by all tasks of a run.
pub(crate) struct TaskContext {
    pub(crate) resolver: Arc<UrlResolver>,
    pub(crate) downloader: Arc<AssetDownloader>,
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    pub(crate) catalog: Arc<CatalogWriter>,
    pub(crate) stats: Arc<AcquisitionStats>,
    pub(crate) output_dir: PathBuf,
    pub(crate) cancel: CancellationToken,
}

/// Processes one reference. `index` is 1-based and becomes the file name prefix.
///
/// Resolution misses and download failures are counted and swallowed. A
/// catalog failure cancels the run and is returned.
pub(crate) async fn process_reference(
    ctx: &TaskContext,
    index: usize,
    reference: AssetReference,
) -> Result<(), CatalogError> {
    if ctx.cancel.is_cancelled() {
        return Ok(());
    }

    let asset = match ctx.resolver.resolve(&reference).await {
        Ok(asset) => asset,
        Err(miss) => {
            match &miss {
                ResolutionMiss::FetchFailed { .. } => warn!(index, error = %miss, "reference skipped"),
                _ => debug!(index, error = %miss, "reference skipped"),
            }
            ctx.stats.record_miss();
            return Ok(());
        }
    };
    ctx.stats.record_resolved();

    if !ctx.fetcher.allows(&asset.direct_url).await {
        debug!(index, url = %asset.direct_url, "asset disallowed by robots.txt");
        ctx.stats.record_robots_skip();
        return Ok(());
    }

    let destination = ctx.output_dir.join(asset_filename(
        index,
        &asset.suggested_name,
        &asset.direct_url,
    ));

    let result = tokio::select! {
        () = ctx.cancel.cancelled() => {
            debug!(index, "download abandoned on cancellation");
            return Ok(());
        }
        result = ctx.downloader.download(&asset.direct_url, &destination) => result,
    };

    if !result.success {
        let reason = result.failure_reason.unwrap_or(FailureReason::HttpError);
        warn!(
            index,
            url = %asset.direct_url,
            reason = %reason,
            attempts = result.attempts,
            error = result.last_error.as_deref().unwrap_or(""),
            "download failed"
        );
        ctx.stats.record_failure(reason);
        return Ok(());
    }
    ctx.stats.record_acquired(result.reused());

    let recorded = record_in_catalog(
        Arc::clone(&ctx.catalog),
        result.local_path.clone(),
        asset.suggested_name.clone(),
    )
    .await;
    match recorded {
        Ok(AppendOutcome::Written) => {
            debug!(index, path = %result.local_path.display(), "catalog row written");
            Ok(())
        }
        Ok(AppendOutcome::AlreadyPresent) => {
            debug!(index, path = %result.local_path.display(), "catalog already lists asset");
            Ok(())
        }
        Err(error) => {
            ctx.cancel.cancel();
            Err(error)
        }
    }
}

/// Appends one row on the blocking pool; the writer stats and fsyncs under its lock.
async fn record_in_catalog(
    catalog: Arc<CatalogWriter>,
    local_path: PathBuf,
    title: String,
) -> Result<AppendOutcome, CatalogError> {
    let catalog_path = catalog.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        let entry = CatalogEntry::for_asset(&local_path, catalog.path(), &title)?;
        catalog.append(&entry)
    })
    .await
    .map_err(|e| CatalogError::io(catalog_path, std::io::Error::other(e)))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{WriteMode, read_all};

    #[tokio::test(flavor = "current_thread")]
    async fn test_record_in_catalog_from_concurrent_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.csv");
        let catalog =
            Arc::new(CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).unwrap());

        let mut handles = Vec::new();
        for i in 1..=8 {
            let file = dir.path().join(format!("{i:04}_clip.mp3"));
            std::fs::write(&file, vec![3u8; 2048]).unwrap();
            let catalog = Arc::clone(&catalog);
            handles.push(tokio::spawn(async move {
                record_in_catalog(catalog, file, format!("clip {i}")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), AppendOutcome::Written);
        }

        assert_eq!(catalog.rows(), 8);
        assert_eq!(read_all(&catalog_path).unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_record_in_catalog_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.csv");
        let catalog =
            Arc::new(CatalogWriter::open_for_write(&catalog_path, WriteMode::Truncate).unwrap());

        let err = record_in_catalog(catalog, dir.path().join("gone.mp3"), "gone".into())
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidEntry { .. }));
    }
}
