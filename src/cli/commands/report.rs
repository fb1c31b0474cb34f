//! Confidence histogram command.

use std::path::Path;

use console::style;

use recordscribe::services::build_report;

pub fn cmd_report(dir: &Path) -> anyhow::Result<()> {
    let report = build_report(dir)?;

    if report.files.is_empty() {
        println!(
            "{} No filemap_confidence-*.json files in {}",
            style("!").yellow(),
            dir.display()
        );
        return Ok(());
    }

    println!(
        "\n{} Confidence across {} result file(s)",
        style("Report").bold(),
        report.files.len()
    );
    println!("{}", "-".repeat(30));

    let total = report.total().max(1);
    for (label, count) in report.rows() {
        let pct = count as f64 * 100.0 / total as f64;
        println!("  {:<8} {:>8}  {:>5.1}%", label, count, pct);
    }
    println!("  {:<8} {:>8}", "none", report.without_confidence);

    println!("\n{}", style("Status").bold());
    for (status, count) in &report.statuses {
        println!("  {:<16} {:>8}", status, count);
    }
    println!("  {:<16} {:>8}", "total", report.total());
    Ok(())
}
