//! OCR tool availability check.

use console::style;

use recordscribe::config::Settings;
use recordscribe::ocr::{OcrBackend, TesseractBackend};

/// Report whether the OCR tools are installed.
pub fn cmd_ocr_check(settings: &Settings) -> anyhow::Result<()> {
    let backend = TesseractBackend::with_config(settings.tesseract.clone());

    println!("{} Checking OCR tools", style("→").cyan());
    for tool in ["pdftoppm", "tesseract"] {
        match which::which(tool) {
            Ok(path) => println!("  {} {} ({})", style("✓").green(), tool, path.display()),
            Err(_) => println!("  {} {} not found", style("✗").red(), tool),
        }
    }
    println!("  Language: {}", backend.config().language);
    println!("  DPI: {}", backend.config().dpi);

    if backend.is_available() {
        println!("{} {} backend ready", style("✓").green(), backend.name());
        Ok(())
    } else {
        anyhow::bail!("{}", backend.availability_hint())
    }
}
