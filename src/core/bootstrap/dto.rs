//! Export descriptor shapes
//!
//! Field names follow the export's JSON. Missing optional fields take the
//! defaults below and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `mappings/mapping.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MappingRoot {
    pub generated_at: Option<String>,
    pub indexes: Indexes,
    pub qa: QaSection,
    pub parts: Vec<PartDescriptor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Indexes {
    pub models: Vec<String>,
    pub material_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QaSection {
    pub reports: Vec<QaReport>,
    pub defect_types: Vec<QaDefectType>,
    pub report_legends: Vec<QaReportLegend>,
    pub part_summaries: Vec<QaPartSummary>,
    pub observations: Vec<QaObservation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaReport {
    pub report_id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub line: String,
    #[serde(default)]
    pub period_year: Option<i64>,
    #[serde(default)]
    pub period_month: Option<i64>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaDefectType {
    pub defect_type_id: String,
    pub name: String,
    pub name_norm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaReportLegend {
    pub report_id: String,
    pub code: String,
    pub defect_type_id: String,
    #[serde(default)]
    pub defect_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaPartSummary {
    pub summary_id: String,
    pub report_id: String,
    pub uniq_no: String,
    #[serde(default)]
    pub total_check: Option<i64>,
    #[serde(default)]
    pub total_ok: Option<i64>,
    #[serde(default)]
    pub total_defect: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaObservation {
    pub observation_id: String,
    pub report_id: String,
    pub uniq_no: String,
    #[serde(default)]
    pub part_number_in_report: Option<String>,
    pub defect_type_id: String,
    #[serde(default)]
    pub defect_name: Option<String>,
    #[serde(default)]
    pub qty: i64,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartDescriptor {
    pub uniq_no: String,
    pub production_line: String,
    pub part_number: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_number_partlist: Option<String>,
    #[serde(default)]
    pub part_name_partlist: Option<String>,
    #[serde(default)]
    pub material_raw: Option<String>,
    #[serde(default)]
    pub material_note: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    /// Flat quantity used when no per-model rows are declared
    #[serde(default)]
    pub qty_kbn: Option<i64>,
    #[serde(default)]
    pub qty_kbn_inconsistent: bool,
    #[serde(default)]
    pub models_inferred: bool,
    #[serde(default)]
    pub models_source: String,
    #[serde(default)]
    pub requirements_raw: Vec<RequirementRaw>,
    #[serde(default)]
    pub image: Option<ImageDescriptor>,
    #[serde(default)]
    pub notes: PartNotes,
    #[serde(default)]
    pub materials: Vec<MaterialLayer>,
    #[serde(default)]
    pub material_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequirementRaw {
    pub part_number: Option<String>,
    pub part_name: Option<String>,
    pub models: Vec<String>,
    pub qty_kbn: Option<i64>,
    pub source_page: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartNotes {
    pub missing_in_part_requirement_list: bool,
    pub missing_image_in_part_list_pdf: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDescriptor {
    pub status: String,
    pub path: String,
    /// Digest as declared by the export; the stored digest is always recomputed
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub width_px: Option<i64>,
    #[serde(default)]
    pub height_px: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub transparent_background: Option<bool>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub qc: Option<ImageQc>,
}

impl ImageDescriptor {
    pub fn is_marked_missing(&self) -> bool {
        self.status == "missing"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageQc {
    pub alpha_border_ratio: Option<f64>,
    pub content_empty: Option<bool>,
    pub rendered_page_size_px: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialLayer {
    pub layer_order: i64,
    pub material_name: String,
    #[serde(default)]
    pub weight_g: Option<f64>,
    #[serde(default)]
    pub basis_weight_gsm: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub layer_tags: Vec<String>,
}

/// `reports/defect_screening.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefectScreening {
    pub generated_at: Option<String>,
    pub summary: ScreeningSummary,
    pub part_item_defect_stats: Vec<PartItemDefectStat>,
    pub material_item_defect_risk: Vec<MaterialItemDefectRisk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScreeningSummary {
    pub total_observations: i64,
    pub distinct_part_defect_pairs: i64,
    pub distinct_material_defect_risk: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartItemDefectStat {
    pub line: String,
    pub part_number: String,
    pub part_number_norm: String,
    pub defect_name: String,
    pub defect_name_norm: String,
    pub occurrence_qty: i64,
    pub affected_days: i64,
    #[serde(default)]
    pub last_seen_sheet: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialItemDefectRisk {
    pub line: String,
    pub material_name: String,
    pub material_name_norm: String,
    pub defect_name: String,
    pub defect_name_norm: String,
    pub risk_score: f64,
    pub affected_parts: i64,
    pub sample_size: i64,
}
