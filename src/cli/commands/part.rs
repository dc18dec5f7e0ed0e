//! `partmaster part` command - One part and its defect recommendations

use console::style;
use miette::Result;

use crate::cli::commands::utils::{print_json, Context};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::catalog::{self, RecommendationBasis};

#[derive(clap::Args, Debug)]
pub struct PartArgs {
    /// Part uniq code
    pub uniq_no: String,

    /// Maximum number of defect recommendations
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

pub fn run(args: PartArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::resolve(global);
    let store = ctx.open_store()?;

    let part = catalog::find_part(&store, &args.uniq_no)?
        .ok_or_else(|| miette::miette!("no part with uniq code '{}'", args.uniq_no))?;
    let recommendations = catalog::recommended_defects(&store, &args.uniq_no, args.limit)?;

    if global.format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "part": part,
            "recommended_defects": recommendations,
        }));
    }

    println!(
        "{} {}",
        style(&part.uniq_no).bold(),
        style(&part.part_name).dim()
    );
    println!("  Part number: {}", part.part_number);
    println!("  Line:        {}", part.line);
    println!("  Models:      {}", part.models.join(", "));
    println!(
        "  Image:       {}",
        if part.has_active_image { "yes" } else { "no" }
    );

    if !part.requirements.is_empty() {
        println!();
        println!("  {}", style("Requirements").bold());
        for req in &part.requirements {
            println!("    {:<12} {}", req.model, req.qty_kbn);
        }
    }

    if !part.layers.is_empty() {
        println!();
        println!("  {}", style("Layers").bold());
        for layer in &part.layers {
            let weight = layer
                .weight_g
                .map(|w| format!("{} g", w))
                .unwrap_or_default();
            println!("    {}. {:<24} {}", layer.order, layer.material, weight);
        }
    }

    if !recommendations.is_empty() {
        println!();
        println!("  {}", style("Recommended defect checks").bold());
        for rec in &recommendations {
            let basis = match rec.basis {
                RecommendationBasis::PartHistory => format!("seen {} times", rec.score),
                RecommendationBasis::MaterialRisk => format!(
                    "risk {:.2} via {}",
                    rec.score,
                    rec.material.as_deref().unwrap_or("material")
                ),
            };
            println!(
                "    {:<24} {:<8} {}",
                rec.defect_name,
                rec.source_line,
                style(basis).dim()
            );
        }
    }
    Ok(())
}
