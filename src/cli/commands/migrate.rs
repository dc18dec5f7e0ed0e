//! `partmaster migrate` command - Bring the store to the current schema

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::utils::{print_json, Context};
use crate::cli::{GlobalOpts, OutputFormat};

pub fn run(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let store = ctx.open_store()?;
    let version = store.schema_version().into_diagnostic()?;

    if global.format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "database": store.path(),
            "path": store.migration().to_string(),
            "schema_version": version,
            "recovered_from": store.recovered_from(),
        }));
    }

    if let Some(backup) = store.recovered_from() {
        println!(
            "{} Corrupted store moved to {}",
            style("!").yellow(),
            backup.display()
        );
    }
    println!(
        "{} Store ready ({}), schema version {}",
        style("✓").green(),
        style(store.migration()).cyan(),
        version
    );
    println!("  Location: {}", store.path().display());
    Ok(())
}
