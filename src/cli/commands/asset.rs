//! `partmaster asset` command - Part image store operations

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::commands::utils::{print_json, Context};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::assets::AssetRepository;

#[derive(Subcommand, Debug)]
pub enum AssetCommands {
    /// Fetch the active image of a part
    Get {
        /// Part uniq code
        uniq_no: String,

        /// Write the image bytes here instead of printing the reference
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Re-hash every blob and report mismatches
    Verify,

    /// Delete blobs no image row references
    Gc {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(cmd: AssetCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        AssetCommands::Get { uniq_no, output } => run_get(&uniq_no, output, global),
        AssetCommands::Verify => run_verify(global),
        AssetCommands::Gc { dry_run } => run_gc(dry_run, global),
    }
}

fn run_get(uniq_no: &str, output: Option<PathBuf>, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let store = ctx.open_store()?;
    let assets = ctx.asset_store();
    let repo = AssetRepository::new(&store, &assets);

    let asset = repo
        .active_image_ref(uniq_no)?
        .ok_or_else(|| miette::miette!("no active image for part '{}'", uniq_no))?;

    let Some(output) = output else {
        if global.format == OutputFormat::Json {
            return print_json(&serde_json::to_value(&asset).into_diagnostic()?);
        }
        println!("{}", asset.storage_rel_path);
        println!("  SHA-256: {}", asset.digest_hex);
        println!("  Type:    {}", asset.mime);
        println!("  Size:    {} bytes", asset.size_bytes);
        return Ok(());
    };

    let bytes = repo.load_image_bytes(&asset)?.ok_or_else(|| {
        miette::miette!(
            help = "run `partmaster asset verify` or re-run bootstrap with --force",
            "blob {} is missing from the asset store",
            asset.storage_rel_path
        )
    })?;
    std::fs::write(&output, &bytes).into_diagnostic()?;
    println!(
        "{} Wrote {} bytes to {}",
        style("✓").green(),
        bytes.len(),
        output.display()
    );
    Ok(())
}

fn run_verify(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let report = ctx.asset_store().verify()?;

    if global.format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "blobs_checked": report.blobs_checked,
            "mismatched": report.mismatched,
            "foreign": report.foreign,
        }))?;
    } else {
        println!(
            "{} Checked {} blobs under {}",
            style("→").blue(),
            report.blobs_checked,
            ctx.asset_root.display()
        );
        for rel in &report.mismatched {
            println!("  {} {}", style("✗").red(), rel);
        }
        for rel in &report.foreign {
            println!("  {} {} (not a blob)", style("?").yellow(), rel);
        }
    }

    if !report.mismatched.is_empty() {
        return Err(miette::miette!(
            "{} blob(s) do not match their digest",
            report.mismatched.len()
        ));
    }
    if global.format != OutputFormat::Json {
        println!("{} All blobs match their digests", style("✓").green());
    }
    Ok(())
}

fn run_gc(dry_run: bool, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let store = ctx.open_store()?;
    let assets = ctx.asset_store();
    let referenced = AssetRepository::new(&store, &assets).referenced_paths()?;
    let report = assets.gc(&referenced, dry_run)?;

    if global.format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "dry_run": dry_run,
            "blobs_scanned": report.blobs_scanned,
            "removed": report.removed,
            "bytes_freed": report.bytes_freed,
        }));
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for rel in &report.removed {
        println!("  {} {}", style("-").red(), rel);
    }
    println!(
        "{} {} {} of {} blobs ({} bytes)",
        style("✓").green(),
        verb,
        report.removed.len(),
        report.blobs_scanned,
        report.bytes_freed
    );
    Ok(())
}
