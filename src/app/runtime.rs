//! Command dispatch and the acquisition run.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use harvester_core::crawl::RegexListingSelector;
use harvester_core::pipeline::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, output, progress, replay, settings, terminal};
use crate::cli::{Cli, Command, FetchArgs};

pub(crate) async fn run_harvester(cli: Cli) -> Result<ProcessExit> {
    match cli.command {
        Some(Command::Replay(args)) => {
            terminal::init_tracing(terminal::default_log_level(args.verbose, args.quiet));
            replay::run_replay(&args)
        }
        Some(Command::Fetch(args)) => run_fetch(args).await,
        None => run_fetch(cli.fetch).await,
    }
}

async fn run_fetch(args: FetchArgs) -> Result<ProcessExit> {
    terminal::init_tracing(terminal::default_log_level(args.verbose, args.quiet));
    debug!(?args, "CLI arguments parsed");

    let settings = settings::resolve_settings(&args)?;
    let selector = RegexListingSelector::from_site(&settings.site)
        .context("invalid listing selector settings")?;
    let pipeline = Pipeline::new(&settings.crawler, Arc::new(selector))
        .context("failed to set up the acquisition pipeline")?;

    info!(
        count = settings.request.count,
        listings = settings.request.listing_urls.len(),
        output_dir = %settings.request.output_dir.display(),
        "Harvester starting"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            interrupt.cancel();
        }
    });

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) = progress::spawn_progress_ui(use_spinner, pipeline.stats());

    let result = pipeline.run(&settings.request, &cancel).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let report = result.context("acquisition aborted")?;
    output::print_summary(&report);

    if report.cancelled {
        warn!(acquired = report.acquired, "Interrupted. Run again with --merge to keep the catalog.");
    }
    Ok(exit_handler::determine_exit_outcome(report.acquired))
}
