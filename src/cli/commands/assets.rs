//! Ledger inspection commands.

use console::style;

use recordscribe::config::Settings;
use recordscribe::models::{Granularity, UnitStatus};

use super::super::helpers::open_ledger;

/// List registered assets with their subject and transcription state.
pub fn cmd_assets(settings: &Settings, document_type: Granularity) -> anyhow::Result<()> {
    let mut ledger = open_ledger(settings)?;
    let assets = ledger.list_assets(document_type)?;

    if assets.is_empty() {
        println!("{} No {} assets registered", style("!").yellow(), document_type);
        return Ok(());
    }

    println!(
        "\n{} {} asset(s)",
        style(document_type.to_string()).bold(),
        assets.len()
    );
    println!("{}", "-".repeat(60));

    let mut pending = 0;
    for asset in &assets {
        let subject = ledger
            .metadata_for_asset(asset.id)?
            .and_then(|m| m.subject_id)
            .unwrap_or_else(|| "-".to_string());
        let results = ledger.results_for_asset(asset.id)?;
        let written = results.iter().filter(|r| r.ocr_output_file.is_some()).count();
        let errors = results
            .iter()
            .filter(|r| r.status == UnitStatus::Error)
            .count();

        let state = if written > 0 {
            style("done").green()
        } else if errors > 0 {
            style("error").red()
        } else {
            style("pending").yellow()
        };
        if written == 0 {
            pending += 1;
        }

        println!(
            "  {:>6}  {:<12} {:<8} {:>4} unit(s)  {}",
            asset.id,
            subject,
            state,
            results.len(),
            asset.input_file.display()
        );
    }
    println!("\n  {} pending", pending);
    Ok(())
}

/// Remove an asset and everything recorded for it.
pub fn cmd_forget(settings: &Settings, id: i32) -> anyhow::Result<()> {
    let mut ledger = open_ledger(settings)?;

    let Some(asset) = ledger.get_asset(id)? else {
        anyhow::bail!("No asset with id {}", id);
    };
    ledger.delete_asset(id)?;

    println!(
        "{} Removed asset {} ({})",
        style("✓").green(),
        id,
        asset.input_file.display()
    );
    Ok(())
}
