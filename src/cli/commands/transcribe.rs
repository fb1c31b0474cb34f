//! Ledger transcription command.

use std::path::Path;

use console::style;
use tracing::info;

use recordscribe::config::Settings;
use recordscribe::models::{Granularity, Window};
use recordscribe::services::{BatchEvent, TranscriptionService};

use super::super::helpers::{open_ledger, print_summary, require_backend, BatchProgress};

/// Transcribe one window of pending assets.
pub fn cmd_transcribe(
    settings: &Settings,
    output_to: &Path,
    document_type: Granularity,
    window: Window,
) -> anyhow::Result<()> {
    let backend = require_backend(settings)?;
    let mut ledger = open_ledger(settings)?;

    println!(
        "{} Transcribing {} assets {}..{}",
        style("→").cyan(),
        document_type,
        window.offset,
        window.end()
    );
    info!("Writing text under {}", output_to.display());

    let service = TranscriptionService::new(&backend, output_to);
    let mut progress = BatchProgress::new();
    let result = service.run_window(&mut ledger, document_type, window, &mut |event: BatchEvent| {
        progress.handle(event)
    });
    progress.finish();

    let summary = result?;
    print_summary(&summary);
    if summary.rows_persisted > 0 {
        println!("  {} ledger row(s) written", summary.rows_persisted);
    }
    Ok(())
}
