//! `partmaster bootstrap` command - Import an export directory

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::commands::utils::{print_json, Context};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::bootstrap::{BootstrapSummary, Bootstrapper};

#[derive(clap::Args, Debug)]
pub struct BootstrapArgs {
    /// Export directory (default: PARTMASTER_EXPORT or the config file)
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Clear the catalog and re-import even if it is populated
    #[arg(long)]
    pub force: bool,

    /// Line code for rows whose line is not recognized
    #[arg(long)]
    pub default_line: Option<String>,
}

pub fn run(args: BootstrapArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let export = args
        .export
        .or_else(|| ctx.config.export_dir().map(PathBuf::from))
        .ok_or_else(|| {
            miette::miette!(
                help = "pass --export DIR or set PARTMASTER_EXPORT",
                "no export directory configured"
            )
        })?;
    let default_line = args
        .default_line
        .unwrap_or_else(|| ctx.config.default_line().to_string());

    let mut store = ctx.open_store()?;
    let assets = ctx.asset_store();
    let mut bootstrapper = Bootstrapper::new(&mut store, &assets).with_default_line(default_line);

    let summary = if args.force {
        bootstrapper.bootstrap_forced(&export)?
    } else {
        bootstrapper.bootstrap_if_empty(&export)?
    };

    if global.format == OutputFormat::Json {
        return print_json(&summary_json(summary.as_ref()));
    }

    let Some(summary) = summary else {
        println!(
            "{} Nothing imported (catalog already populated or no mapping in {})",
            style("→").blue(),
            export.display()
        );
        return Ok(());
    };

    println!("{} Bootstrap completed", style("✓").green());
    println!("  Parts:   {}", style(summary.imported_parts).cyan());
    println!("  Images:  {}", style(summary.imported_images).cyan());
    println!("  Reports: {}", style(summary.imported_reports).cyan());
    if summary.screening_imported {
        println!(
            "  Screening: {} part stats, {} material risks",
            summary.screening_part_stats, summary.screening_material_risks
        );
    }
    if !summary.skipped_images.is_empty() {
        println!(
            "  Skipped images: {}",
            style(summary.skipped_images.len()).yellow()
        );
        for skipped in &summary.skipped_images {
            println!(
                "    {} {} ({})",
                style(&skipped.uniq_no).yellow(),
                skipped.path,
                style(&skipped.reason).dim()
            );
        }
    }
    Ok(())
}

fn summary_json(summary: Option<&BootstrapSummary>) -> serde_json::Value {
    let Some(summary) = summary else {
        return serde_json::json!({ "imported": false });
    };
    let skipped: Vec<_> = summary
        .skipped_images
        .iter()
        .map(|s| serde_json::json!({ "uniq_no": s.uniq_no, "path": s.path, "reason": s.reason }))
        .collect();
    serde_json::json!({
        "imported": true,
        "parts": summary.imported_parts,
        "images": summary.imported_images,
        "reports": summary.imported_reports,
        "skipped_images": skipped,
        "screening": {
            "imported": summary.screening_imported,
            "part_stats": summary.screening_part_stats,
            "material_risks": summary.screening_material_risks,
        },
    })
}
