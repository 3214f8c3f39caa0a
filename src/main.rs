//! CLI entry point for the harvester tool.

use std::process::ExitCode;

use clap::Parser;

mod app;
mod cli;

use cli::Cli;

/// Process outcome, mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// At least one asset acquired, or replay completed.
    Success,
    /// The run finished but acquired nothing.
    NothingAcquired,
    /// Invalid configuration or catalog I/O failure.
    Fatal,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::NothingAcquired => 1,
            Self::Fatal => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let outcome = match app::runtime::run_harvester(cli).await {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("error: {error:#}");
            ProcessExit::Fatal
        }
    };
    ExitCode::from(outcome.code())
}
