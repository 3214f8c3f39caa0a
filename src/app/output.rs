//! Run summaries printed to stdout.

use harvester_core::pipeline::AcquisitionReport;

/// Lines describing a finished acquisition.
pub(crate) fn summary_lines(report: &AcquisitionReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Acquired {} of {} targeted assets ({} reused, {} failed, {} unresolved)",
        report.acquired, report.targeted, report.reused, report.failed, report.resolution_misses
    )];
    if report.robots_skipped > 0 {
        lines.push(format!("Skipped {} assets disallowed by robots.txt", report.robots_skipped));
    }
    if !report.failures.is_empty() {
        let breakdown: Vec<String> = report
            .failures
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect();
        lines.push(format!("Failures: {}", breakdown.join(", ")));
    }
    lines.push(format!(
        "Catalog: {} ({} rows)",
        report.catalog_path.display(),
        report.catalog_rows
    ));
    if report.cancelled {
        lines.push("Interrupted before completion.".to_string());
    }
    lines
}

/// Prints [`summary_lines`].
pub(crate) fn print_summary(report: &AcquisitionReport) {
    for line in summary_lines(report) {
        println!("{line}");
    }
}
