//! `partmaster status` command - Row counts per table

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::utils::{print_json, Context};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::catalog;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let store = ctx.open_store()?;
    let version = store.schema_version().into_diagnostic()?;
    let counts = catalog::table_counts(&store)?;

    if global.format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "database": store.path(),
            "schema_version": version,
            "tables": counts,
        }));
    }

    println!("{}", style("Store Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:       {}", store.path().display());
    println!("  Schema version: {}", style(version).cyan());
    println!();
    for count in &counts {
        let rows = if count.rows == 0 {
            style(count.rows).dim()
        } else {
            style(count.rows).cyan()
        };
        println!("  {:<28} {}", count.table, rows);
    }
    Ok(())
}
