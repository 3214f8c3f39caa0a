//! Exit code logic for the harvester process.
//!
//! Single responsibility: map run outcomes to the process exit code.

use crate::ProcessExit;

/// A run succeeds when at least one asset was acquired.
pub(crate) fn determine_exit_outcome(acquired: usize) -> ProcessExit {
    if acquired > 0 {
        ProcessExit::Success
    } else {
        ProcessExit::NothingAcquired
    }
}
