//! Progress UI (spinner) for acquisition runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use harvester_core::pipeline::{AcquisitionStats, StatsSnapshot};
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    stats: Arc<AcquisitionStats>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(stats, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    stats: Arc<AcquisitionStats>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            spinner.set_message(progress_message(&stats.snapshot()));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}

/// One-line status for the spinner.
pub(crate) fn progress_message(snapshot: &StatsSnapshot) -> String {
    if snapshot.candidates == 0 {
        return format!("Crawling listings ({} pages)...", snapshot.pages_visited);
    }
    format!(
        "[{}/{}] acquired {} of {} targeted, {} failed",
        snapshot.processed().min(snapshot.candidates),
        snapshot.candidates,
        snapshot.acquired,
        snapshot.targeted,
        snapshot.failed + snapshot.resolution_misses,
    )
}
