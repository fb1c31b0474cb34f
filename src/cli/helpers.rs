//! Shared helper functions for CLI commands.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use recordscribe::config::Settings;
use recordscribe::ocr::{OcrBackend, TesseractBackend};
use recordscribe::repository::{DbContext, LedgerSession};
use recordscribe::services::{BatchEvent, BatchSummary};

/// Open a ledger session, creating the data directory first when needed.
pub fn open_ledger(settings: &Settings) -> anyhow::Result<LedgerSession> {
    settings.ensure_data_dir()?;
    let ctx = DbContext::from_url(&settings.database_url());
    Ok(ctx.session()?)
}

/// Tesseract backend from settings, failing early when tools are missing.
pub fn require_backend(settings: &Settings) -> anyhow::Result<TesseractBackend> {
    let backend = TesseractBackend::with_config(settings.tesseract.clone());
    if !backend.is_available() {
        anyhow::bail!("{}", backend.availability_hint());
    }
    Ok(backend)
}

/// Renders batch events as a progress bar.
#[derive(Default)]
pub struct BatchProgress {
    bar: Option<ProgressBar>,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: BatchEvent) {
        match event {
            BatchEvent::WindowSelected { total } => {
                if total == 0 {
                    return;
                }
                let progress = ProgressBar::new(total as u64);
                progress.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓░"),
                );
                progress.set_message("Transcribing...");
                self.bar = Some(progress);
            }
            BatchEvent::AssetStarted { path } => {
                if let Some(ref bar) = self.bar {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    bar.set_message(name);
                }
            }
            BatchEvent::AssetCompleted { .. } => self.inc(),
            BatchEvent::AssetFailed { path, error } => {
                self.println(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    path.display(),
                    error
                ));
                self.inc();
            }
            BatchEvent::AssetSkipped { path, status } => {
                self.println(format!(
                    "{} {} ({})",
                    style("-").dim(),
                    path.display(),
                    status
                ));
                self.inc();
            }
            BatchEvent::WindowPersisted { .. } => self.finish(),
        }
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn inc(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    fn println(&self, line: String) {
        match self.bar {
            Some(ref bar) => bar.println(line),
            None => println!("{}", line),
        }
    }
}

/// Print the outcome of a processed window.
pub fn print_summary(summary: &BatchSummary) {
    if summary.assets == 0 {
        println!("{} Nothing to process", style("!").yellow());
        return;
    }

    println!(
        "{} Processed {} file(s): {} unit(s), {} written, {} blank",
        style("✓").green(),
        summary.assets,
        summary.units,
        summary.written,
        summary.blank
    );
    if summary.errors > 0 || summary.failed_assets > 0 {
        println!(
            "  {} {} unit error(s), {} file(s) failed",
            style("!").yellow(),
            summary.errors,
            summary.failed_assets
        );
    }
    if summary.skipped_assets > 0 {
        println!(
            "  {} {} file(s) skipped",
            style("-").dim(),
            summary.skipped_assets
        );
    }
}
