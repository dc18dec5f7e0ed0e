//! Export import: one transaction that resets and repopulates the catalog
//!
//! An export directory holds:
//! - `mappings/mapping.json` (required): indexes, QA ledger and part descriptors
//! - `reports/defect_screening.json` (optional): screening statistics
//! - image files at the paths named by each part's `image.path`
//!
//! Every stage upserts on a natural key, so importing the same export twice
//! yields the same rows.

pub mod dto;
mod parse;
mod part_image;
mod parts;
mod qa;
mod screening;

#[cfg(test)]
mod tests;

pub use parse::ImportParseError;

use std::collections::HashMap;
use std::path::Path;

use miette::Diagnostic;
use rusqlite::Transaction;
use thiserror::Error;
use tracing::{debug, info, warn};

use self::dto::{DefectScreening, MappingRoot};
use self::part_image::ImageOutcome;
use self::parse::{load_json, LoadError};
use crate::core::assets::{AssetError, AssetStore};
use crate::core::db::Store;
use crate::core::normalize::{clean_codes, line_key, normalize_part_number, normalize_uniq};

/// Primary descriptor, relative to the export root
pub const MAPPING_PATH: &str = "mappings/mapping.json";

/// Optional screening descriptor, relative to the export root
pub const SCREENING_PATH: &str = "reports/defect_screening.json";

/// Line used when a row names an unknown line and no other default is configured
pub const FALLBACK_LINE: &str = "press";

#[derive(Debug, Error, Diagnostic)]
pub enum BootstrapError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ImportParse(#[from] ImportParseError),

    #[error("bootstrap store error: {0}")]
    #[diagnostic(code(partmaster::bootstrap::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Asset(#[from] AssetError),

    #[error("bootstrap IO error: {0}")]
    #[diagnostic(code(partmaster::bootstrap::io))]
    Io(#[from] std::io::Error),

    #[error("placeholder image encoding failed: {0}")]
    #[diagnostic(code(partmaster::bootstrap::image))]
    Image(#[from] image::ImageError),

    #[error("descriptor serialization failed: {0}")]
    #[diagnostic(code(partmaster::bootstrap::json))]
    Json(#[from] serde_json::Error),
}

/// A part image that could not be imported; the part itself was
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub uniq_no: String,
    pub path: String,
    pub reason: String,
}

/// Counts from one completed import
#[derive(Debug, Clone, Default)]
pub struct BootstrapSummary {
    pub imported_parts: usize,
    pub imported_images: usize,
    pub imported_reports: usize,
    pub skipped_images: Vec<SkippedImage>,
    /// Whether a screening descriptor was found and imported
    pub screening_imported: bool,
    pub screening_part_stats: usize,
    pub screening_material_risks: usize,
}

/// Id lookups built during one run and dropped with it
#[derive(Debug, Default)]
pub(crate) struct IdMaps {
    pub lines: HashMap<String, i64>,
    pub models: HashMap<String, i64>,
    pub tags: HashMap<String, i64>,
    /// Keyed by normalized material name
    pub materials: HashMap<String, i64>,
    /// Keyed by normalized uniq code
    pub parts_by_uniq: HashMap<String, i64>,
    /// Keyed by normalized part number
    pub parts_by_number: HashMap<String, i64>,
    pub reports: HashMap<String, i64>,
    pub defect_types: HashMap<String, i64>,
}

impl IdMaps {
    pub fn line_or(&self, key: &str, default_line_id: i64) -> i64 {
        self.lines.get(key).copied().unwrap_or(default_line_id)
    }
}

/// Tables cleared before every import, children first
const RESET_TABLES: &[&str] = &[
    "qa_part_defect_observation",
    "qa_part_report_summary",
    "qa_report_defect_legend",
    "qa_defect_type",
    "qa_report",
    "image_asset",
    "part_material_layer_tag",
    "part_material_tag",
    "part_material_layer",
    "material",
    "material_tag",
    "part_requirement",
    "part_model",
    "model",
    "part",
];

/// Imports an export directory into a [`Store`]
pub struct Bootstrapper<'a> {
    store: &'a mut Store,
    assets: &'a AssetStore,
    default_line: String,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(store: &'a mut Store, assets: &'a AssetStore) -> Self {
        Self {
            store,
            assets,
            default_line: FALLBACK_LINE.to_string(),
        }
    }

    /// Line code used for rows whose line is not recognized
    pub fn with_default_line(mut self, line: impl Into<String>) -> Self {
        self.default_line = line.into();
        self
    }

    /// Import only if the part catalog is empty
    ///
    /// Returns `None` without writing when the catalog is populated or the
    /// export has no mapping descriptor.
    pub fn bootstrap_if_empty(&mut self, export_root: &Path) -> Result<Option<BootstrapSummary>, BootstrapError> {
        self.run(export_root, false)
    }

    /// Clear every owned table and import, even over a populated catalog
    ///
    /// Returns `None` only when the export has no mapping descriptor.
    pub fn bootstrap_forced(&mut self, export_root: &Path) -> Result<Option<BootstrapSummary>, BootstrapError> {
        self.run(export_root, true)
    }

    pub fn is_catalog_empty(&self) -> Result<bool, BootstrapError> {
        let count: i64 = self
            .store
            .conn()
            .query_row("SELECT COUNT(*) FROM part", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    fn run(&mut self, export_root: &Path, force: bool) -> Result<Option<BootstrapSummary>, BootstrapError> {
        let mapping_path = export_root.join(MAPPING_PATH);
        if !mapping_path.is_file() {
            info!(export = %export_root.display(), "no mapping descriptor in export, nothing to import");
            return Ok(None);
        }

        if !force && !self.is_catalog_empty()? {
            debug!("part catalog already populated, skipping bootstrap");
            return Ok(None);
        }

        let mapping: MappingRoot = match load_json(&mapping_path) {
            Ok(mapping) => mapping,
            Err(LoadError::Io(e)) => return Err(e.into()),
            Err(LoadError::Parse(e)) => return Err(e.into()),
        };
        let screening = load_screening(&export_root.join(SCREENING_PATH));

        info!(
            export = %export_root.display(),
            parts = mapping.parts.len(),
            reports = mapping.qa.reports.len(),
            force,
            "bootstrapping part master data"
        );

        let assets = self.assets;
        let default_line = line_key(&self.default_line);
        let summary = self.store.write(|tx| {
            import(tx, assets, export_root, &mapping, screening.as_ref(), &default_line)
        })?;

        info!(
            parts = summary.imported_parts,
            images = summary.imported_images,
            reports = summary.imported_reports,
            skipped_images = summary.skipped_images.len(),
            "part bootstrap completed"
        );
        Ok(Some(summary))
    }
}

fn load_screening(path: &Path) -> Option<DefectScreening> {
    if !path.is_file() {
        return None;
    }
    match load_json(path) {
        Ok(screening) => Some(screening),
        Err(LoadError::Parse(e)) => {
            warn!(path = %path.display(), error = %e.message, "malformed screening descriptor, skipping screening import");
            None
        }
        Err(LoadError::Io(e)) => {
            warn!(path = %path.display(), error = %e, "unreadable screening descriptor, skipping screening import");
            None
        }
    }
}

/// Every stage, in foreign-key order, inside the caller's transaction
fn import(
    tx: &Transaction<'_>,
    assets: &AssetStore,
    export_root: &Path,
    mapping: &MappingRoot,
    screening: Option<&DefectScreening>,
    default_line: &str,
) -> Result<BootstrapSummary, BootstrapError> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut ids = IdMaps::default();
    let mut summary = BootstrapSummary {
        imported_parts: mapping.parts.len(),
        imported_reports: mapping.qa.reports.len(),
        ..Default::default()
    };

    for table in RESET_TABLES {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    parts::upsert_lines(tx, &mut ids)?;
    let fallback_id = ids.line_or(FALLBACK_LINE, 1);
    let default_line_id = match ids.lines.get(default_line) {
        Some(id) => *id,
        None => {
            warn!(line = %default_line, "unknown default line, using {}", FALLBACK_LINE);
            fallback_id
        }
    };

    for code in clean_codes(&mapping.indexes.models) {
        parts::model_id(tx, &mut ids, &code)?;
    }
    for tag in clean_codes(&mapping.indexes.material_tags) {
        parts::tag_id(tx, &mut ids, &tag)?;
    }

    for part in &mapping.parts {
        let line_id = ids.line_or(&line_key(&part.production_line), default_line_id);
        let part_id = parts::upsert_part(tx, part, line_id, &now)?;
        ids.parts_by_uniq.insert(normalize_uniq(&part.uniq_no), part_id);
        ids.parts_by_number
            .insert(normalize_part_number(&part.part_number), part_id);

        parts::sync_models(tx, &mut ids, part_id, part)?;
        parts::sync_requirements(tx, &mut ids, part_id, part)?;
        parts::sync_materials(tx, &mut ids, part_id, part)?;

        match part_image::store_part_image(tx, assets, export_root, part_id, part, &now)? {
            ImageOutcome::Stored => summary.imported_images += 1,
            ImageOutcome::Skipped(skipped) => summary.skipped_images.push(skipped),
            ImageOutcome::Absent => {}
        }
    }

    qa::import_qa(tx, &mut ids, &mapping.qa, default_line_id, &now)?;

    if let Some(screening) = screening {
        let counts = screening::import_screening(tx, &ids, screening)?;
        summary.screening_imported = true;
        summary.screening_part_stats = counts.part_stats;
        summary.screening_material_risks = counts.material_risks;
    }

    Ok(summary)
}
