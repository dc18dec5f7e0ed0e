//! `partmaster reset` command - Delete the store file and its sidecars

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::utils::Context;
use crate::cli::GlobalOpts;
use crate::core::db::Store;

#[derive(clap::Args, Debug)]
pub struct ResetArgs {
    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}

pub fn run(args: ResetArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    if !args.yes {
        return Err(miette::miette!(
            help = "re-run with --yes to delete it",
            "this deletes {}",
            ctx.db.display()
        ));
    }

    Store::reset(&ctx.db).into_diagnostic()?;
    println!("{} Removed {}", style("✓").green(), ctx.db.display());
    Ok(())
}
