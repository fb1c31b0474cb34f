//! File map transcription command.

use std::fs;
use std::path::Path;

use console::style;

use recordscribe::config::Settings;
use recordscribe::models::{Granularity, Window};
use recordscribe::services::{
    load_file_map, results_path, write_results, BatchEvent, FileMapRunner, PatternRedactor,
    ScrubStage,
};

use super::super::helpers::{print_summary, require_backend, BatchProgress};

/// Transcribe one window of a JSON file map and write the results file.
///
/// With `scrub_threshold` set, every written unit is also scrubbed.
pub fn cmd_image_to_text(
    settings: &Settings,
    input_file: &Path,
    output_to: &Path,
    window: Window,
    strategy: Granularity,
    scrub_threshold: Option<f64>,
) -> anyhow::Result<()> {
    let records = load_file_map(input_file)?;
    let backend = require_backend(settings)?;
    fs::create_dir_all(output_to)?;

    println!(
        "{} Transcribing {} item(s) of {} by {}",
        style("→").cyan(),
        window.chunk_size,
        input_file.display(),
        strategy
    );

    let redactor = PatternRedactor::from_config(&settings.scrub);
    let mut runner = FileMapRunner::new(&backend, output_to);
    if let Some(threshold) = scrub_threshold {
        runner = runner.with_scrub(ScrubStage {
            redactor: &redactor,
            threshold,
        });
    }

    let mut progress = BatchProgress::new();
    let result = runner.run(&records, strategy, window, &mut |event: BatchEvent| {
        progress.handle(event)
    });
    progress.finish();
    let (results, summary) = result?;

    let path = results_path(output_to, window);
    write_results(&path, &results)?;

    print_summary(&summary);
    println!(
        "{} Wrote {} record(s) to {}",
        style("✓").green(),
        results.len(),
        path.display()
    );
    Ok(())
}
