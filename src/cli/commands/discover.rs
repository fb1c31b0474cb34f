//! Records tree scanning commands.

use std::fs;
use std::path::Path;

use console::style;

use recordscribe::config::Settings;
use recordscribe::discovery::Discovery;
use recordscribe::models::{Granularity, UnitRecord};

use super::super::helpers::open_ledger;

/// Scan a records tree and emit a JSON file map.
pub fn cmd_scan(settings: &Settings, path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let discovery = Discovery::new(&settings.subject_id_pattern)?;
    let files = discovery.scan(path)?;
    let records: Vec<UnitRecord> = files.iter().map(|f| f.to_unit_record()).collect();
    let json = serde_json::to_string_pretty(&records)?;

    match output {
        Some(out) => {
            fs::write(out, json)?;
            println!(
                "{} Wrote {} file(s) to {}",
                style("✓").green(),
                records.len(),
                out.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Scan a records tree and register every file in the ledger.
pub fn cmd_register(
    settings: &Settings,
    path: &Path,
    document_type: Granularity,
) -> anyhow::Result<()> {
    let discovery = Discovery::new(&settings.subject_id_pattern)?;
    let files = discovery.scan(path)?;

    if files.is_empty() {
        println!("{} No files found under {}", style("!").yellow(), path.display());
        return Ok(());
    }

    let registrations: Vec<_> = files.iter().map(|f| f.to_registration()).collect();

    let mut ledger = open_ledger(settings)?;
    let ids = ledger.register_assets(document_type, &registrations)?;

    println!(
        "{} Registered {} {} asset(s) from {}",
        style("✓").green(),
        ids.len(),
        document_type,
        path.display()
    );
    Ok(())
}
