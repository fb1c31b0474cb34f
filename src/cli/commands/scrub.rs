//! PII scrubbing command.

use std::path::Path;

use console::style;

use recordscribe::config::Settings;
use recordscribe::models::{Granularity, Window};
use recordscribe::services::{PatternRedactor, ScrubService};

use super::super::helpers::open_ledger;

pub fn cmd_scrub(
    settings: &Settings,
    output_to: &Path,
    document_type: Granularity,
    window: Window,
    threshold: f64,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(settings)?;
    let redactor = PatternRedactor::from_config(&settings.scrub);

    println!(
        "{} Scrubbing {} outputs {}..{} (threshold {})",
        style("→").cyan(),
        document_type,
        window.offset,
        window.end(),
        threshold
    );

    let service = ScrubService::new(&redactor, threshold, output_to);
    let summary = service.run_window(&mut ledger, document_type, window)?;

    if summary.scrubbed == 0 && summary.failed == 0 {
        println!("{} Nothing to scrub", style("!").yellow());
        return Ok(());
    }
    println!(
        "{} Scrubbed {} file(s), {} entities redacted",
        style("✓").green(),
        summary.scrubbed,
        summary.entities
    );
    if summary.failed > 0 {
        println!(
            "  {} {} file(s) could not be read",
            style("!").yellow(),
            summary.failed
        );
    }
    Ok(())
}
