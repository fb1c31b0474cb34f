//! List replacement command.

use std::path::Path;

use console::style;

use recordscribe::config::Settings;
use recordscribe::models::{Granularity, Window};
use recordscribe::services::{read_target_strings, ListReplacementService, StringReplacer};

use super::super::helpers::open_ledger;

/// Replace every string of `key_column` in the transcribed outputs.
pub fn cmd_replace_strings(
    settings: &Settings,
    data_file: &Path,
    key_column: &str,
    replacement: &str,
    output_dir: &Path,
    document_type: Granularity,
    window: Window,
) -> anyhow::Result<()> {
    let targets = read_target_strings(data_file, key_column)?;
    let replacer = StringReplacer::new(targets, replacement);
    if replacer.is_empty() {
        println!(
            "{} No strings in column '{}' of {}",
            style("!").yellow(),
            key_column,
            data_file.display()
        );
        return Ok(());
    }

    println!(
        "{} Replacing {} string(s) in {} outputs {}..{}",
        style("→").cyan(),
        replacer.len(),
        document_type,
        window.offset,
        window.end()
    );

    let mut ledger = open_ledger(settings)?;
    let service = ListReplacementService::new(replacer, output_dir);
    let summary = service.run_window(&mut ledger, document_type, window)?;

    println!(
        "{} Rewrote {} file(s), {} replacement(s)",
        style("✓").green(),
        summary.files,
        summary.replacements
    );
    if summary.failed > 0 {
        println!(
            "  {} {} file(s) could not be processed",
            style("!").yellow(),
            summary.failed
        );
    }
    Ok(())
}
