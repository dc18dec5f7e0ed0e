//! Read-side catalog queries
//!
//! Everything here only reads; the bootstrap pass is the sole writer.

use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::core::db::Store;
use crate::core::normalize::normalize_uniq;

/// Tables owned by the part master store, in display order
pub const OWNED_TABLES: &[&str] = &[
    "production_line",
    "supplier",
    "part",
    "model",
    "part_model",
    "part_requirement",
    "material_tag",
    "material",
    "part_material_tag",
    "part_material_layer",
    "part_material_layer_tag",
    "image_asset",
    "qa_report",
    "qa_defect_type",
    "qa_report_defect_legend",
    "qa_part_report_summary",
    "qa_part_defect_observation",
    "item_defect",
    "part_item_defect_stat",
    "material_item_defect_risk",
    "defect_catalog",
    "material_defect_catalog",
    "part_defect_catalog",
    "part_configuration",
    "part_recycle_source",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

/// Row count of every owned table
pub fn table_counts(store: &Store) -> Result<Vec<TableCount>> {
    OWNED_TABLES
        .iter()
        .map(|&table| {
            let rows = store
                .conn()
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .into_diagnostic()?;
            Ok::<_, miette::Report>(TableCount { table, rows })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSummary {
    pub uniq_no: String,
    pub part_number: String,
    pub part_name: String,
    pub line: String,
    pub models: Vec<String>,
    pub requirements: Vec<Requirement>,
    pub layers: Vec<Layer>,
    pub has_active_image: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub model: String,
    pub qty_kbn: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub order: i64,
    pub material: String,
    pub weight_g: Option<f64>,
    pub basis_weight_gsm: Option<f64>,
    pub unit: Option<String>,
}

/// Look up a part by uniq code, matched after normalization
pub fn find_part(store: &Store, uniq_no: &str) -> Result<Option<PartSummary>> {
    let conn = store.conn();
    let head = conn
        .query_row(
            "SELECT p.part_id, p.uniq_no, p.part_number, p.part_name, pl.code,
                    EXISTS(SELECT 1 FROM image_asset ia WHERE ia.part_id = p.part_id AND ia.active = 1)
             FROM part p
             JOIN production_line pl ON pl.production_line_id = p.production_line_id
             WHERE p.uniq_no_norm = ?1",
            params![normalize_uniq(uniq_no)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    PartSummary {
                        uniq_no: row.get(1)?,
                        part_number: row.get(2)?,
                        part_name: row.get(3)?,
                        line: row.get(4)?,
                        models: Vec::new(),
                        requirements: Vec::new(),
                        layers: Vec::new(),
                        has_active_image: row.get(5)?,
                    },
                ))
            },
        )
        .optional()
        .into_diagnostic()?;

    let Some((part_id, mut part)) = head else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT m.code FROM part_model pm
             JOIN model m ON m.model_id = pm.model_id
             WHERE pm.part_id = ?1 ORDER BY m.code",
        )
        .into_diagnostic()?;
    part.models = stmt
        .query_map(params![part_id], |row| row.get(0))
        .into_diagnostic()?
        .collect::<rusqlite::Result<_>>()
        .into_diagnostic()?;

    let mut stmt = conn
        .prepare(
            "SELECT m.code, pr.qty_kbn FROM part_requirement pr
             JOIN model m ON m.model_id = pr.model_id
             WHERE pr.part_id = ?1 ORDER BY m.code",
        )
        .into_diagnostic()?;
    part.requirements = stmt
        .query_map(params![part_id], |row| {
            Ok(Requirement {
                model: row.get(0)?,
                qty_kbn: row.get(1)?,
            })
        })
        .into_diagnostic()?
        .collect::<rusqlite::Result<_>>()
        .into_diagnostic()?;

    let mut stmt = conn
        .prepare(
            "SELECT l.layer_order, mat.material_name, l.weight_g, l.basis_weight_gsm, l.unit
             FROM part_material_layer l
             JOIN material mat ON mat.material_id = l.material_id
             WHERE l.part_id = ?1 ORDER BY l.layer_order",
        )
        .into_diagnostic()?;
    part.layers = stmt
        .query_map(params![part_id], |row| {
            Ok(Layer {
                order: row.get(0)?,
                material: row.get(1)?,
                weight_g: row.get(2)?,
                basis_weight_gsm: row.get(3)?,
                unit: row.get(4)?,
            })
        })
        .into_diagnostic()?
        .collect::<rusqlite::Result<_>>()
        .into_diagnostic()?;

    Ok(Some(part))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationBasis {
    /// Seen on this part in screening
    PartHistory,
    /// Scored against one of the part's layer materials
    MaterialRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectRecommendation {
    pub defect_name: String,
    pub source_line: String,
    pub basis: RecommendationBasis,
    /// Occurrence quantity for part history, risk score for material risk
    pub score: f64,
    pub material: Option<String>,
}

/// Defects worth checking for a part
///
/// The part's own screening history comes first by occurrence quantity,
/// then material risks through its layers by score. A defect appears once.
pub fn recommended_defects(store: &Store, uniq_no: &str, limit: usize) -> Result<Vec<DefectRecommendation>> {
    let conn = store.conn();
    let uniq_norm = normalize_uniq(uniq_no);

    let mut stmt = conn
        .prepare(
            "SELECT d.defect_name, s.source_line, s.occurrence_qty
             FROM part_item_defect_stat s
             JOIN item_defect d ON d.item_defect_id = s.item_defect_id
             JOIN part p ON p.part_id = s.part_id
             WHERE p.uniq_no_norm = ?1
             ORDER BY s.occurrence_qty DESC, d.defect_name",
        )
        .into_diagnostic()?;
    let history = stmt
        .query_map(params![uniq_norm], |row| {
            Ok(DefectRecommendation {
                defect_name: row.get(0)?,
                source_line: row.get(1)?,
                basis: RecommendationBasis::PartHistory,
                score: row.get::<_, i64>(2)? as f64,
                material: None,
            })
        })
        .into_diagnostic()?
        .collect::<rusqlite::Result<Vec<_>>>()
        .into_diagnostic()?;

    let mut stmt = conn
        .prepare(
            "SELECT d.defect_name, r.source_line, MAX(r.risk_score), mat.material_name
             FROM material_item_defect_risk r
             JOIN item_defect d ON d.item_defect_id = r.item_defect_id
             JOIN material mat ON mat.material_id = r.material_id
             JOIN part_material_layer l ON l.material_id = r.material_id
             JOIN part p ON p.part_id = l.part_id
             WHERE p.uniq_no_norm = ?1
             GROUP BY d.item_defect_id, r.source_line, mat.material_id
             ORDER BY MAX(r.risk_score) DESC, d.defect_name",
        )
        .into_diagnostic()?;
    let risks = stmt
        .query_map(params![uniq_norm], |row| {
            Ok(DefectRecommendation {
                defect_name: row.get(0)?,
                source_line: row.get(1)?,
                basis: RecommendationBasis::MaterialRisk,
                score: row.get(2)?,
                material: row.get(3)?,
            })
        })
        .into_diagnostic()?
        .collect::<rusqlite::Result<Vec<_>>>()
        .into_diagnostic()?;

    let mut seen = std::collections::HashSet::new();
    Ok(history
        .into_iter()
        .chain(risks)
        .filter(|rec| seen.insert(rec.defect_name.clone()))
        .take(limit)
        .collect())
}
