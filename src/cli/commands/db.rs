//! Ledger schema management commands.

use console::style;

use recordscribe::config::Settings;
use recordscribe::repository::DbContext;

/// Create the ledger tables.
pub fn cmd_install(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;
    let ctx = DbContext::from_url(&settings.database_url());

    println!("{} Installing ledger schema", style("→").cyan());
    println!("  Database: {}", ctx.database_url());

    ctx.install_schema()?;

    println!("{} Ledger tables ready", style("✓").green());
    Ok(())
}

/// Drop the ledger tables.
pub fn cmd_drop(settings: &Settings) -> anyhow::Result<()> {
    let ctx = DbContext::from_url(&settings.database_url());

    println!("{} Dropping ledger schema", style("→").cyan());
    println!("  Database: {}", ctx.database_url());

    ctx.drop_schema()?;

    println!("{} Ledger tables dropped", style("✓").green());
    Ok(())
}
