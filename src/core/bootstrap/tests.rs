use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use image::{ImageFormat, Rgba, RgbaImage};
use rusqlite::params;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::*;
use crate::core::assets::{sha256_hex, AssetRepository};
use crate::core::db::SchemaMigrator;

const OWNED_TABLES: &[&str] = &[
    "part",
    "model",
    "part_model",
    "part_requirement",
    "material",
    "material_tag",
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
];

fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([shade, 40, 90, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

struct Fixture {
    _tmp: TempDir,
    export: PathBuf,
    db: PathBuf,
    assets: AssetStore,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let export = tmp.path().join("export");
        let db = tmp.path().join("data/partmaster.db");
        let assets = AssetStore::new(tmp.path().join("assets"));
        Self {
            _tmp: tmp,
            export,
            db,
            assets,
        }
    }

    fn write(&self, rel: &str, bytes: &[u8]) {
        let path = self.export.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn write_mapping(&self, mapping: &Value) {
        self.write(MAPPING_PATH, mapping.to_string().as_bytes());
    }

    fn store(&self) -> Store {
        SchemaMigrator::new().ensure_ready(&self.db).unwrap()
    }
}

fn sample_mapping(observation_qty: i64) -> Value {
    json!({
        "generated_at": "2026-03-01T00:00:00Z",
        "indexes": {"models": ["M1", " M2 ", ""], "material_tags": ["FR"]},
        "qa": {
            "reports": [{"report_id": "R1", "type": "monthly", "line": "Press", "period_year": 2026, "period_month": 2}],
            "defect_types": [{"defect_type_id": "D1", "name": "Wrinkle", "name_norm": "WRINKLE"}],
            "report_legends": [
                {"report_id": "R1", "code": "A", "defect_type_id": "D1", "defect_name": "wrinkle"},
                {"report_id": "R9", "code": "B", "defect_type_id": "D1"}
            ],
            "part_summaries": [
                {"summary_id": "S1", "report_id": "R1", "uniq_no": "U-001", "total_check": 10, "total_ok": 9, "total_defect": 1}
            ],
            "observations": [
                {"observation_id": "O1", "report_id": "R1", "uniq_no": "U-001", "defect_type_id": "D1", "qty": observation_qty},
                {"observation_id": "O2", "report_id": "R1", "uniq_no": "U-404", "defect_type_id": "D1", "qty": 1}
            ]
        },
        "parts": [
            {
                "uniq_no": "U-001",
                "production_line": "press",
                "part_number": "ab-O1",
                "part_name": "Dash insulator",
                "models": ["M1"],
                "requirements_raw": [{"models": ["M1"], "qty_kbn": 12, "source_page": 3}],
                "image": {"status": "present", "path": "images/u001.png", "width_px": 99, "height_px": 99,
                          "format": "PNG", "mode": "RGBA", "qc": {"alpha_border_ratio": 0.5}},
                "materials": [
                    {"layer_order": 2, "material_name": "  felt   grey "},
                    {"layer_order": 1, "material_name": "PP Sheet", "weight_g": 12.5, "layer_tags": ["inner", "inner"]},
                    {"layer_order": 3, "material_name": "   "}
                ],
                "material_tags": ["FR", " "]
            },
            {
                "uniq_no": "U-002",
                "production_line": "Paint Shop",
                "part_number": "XY-2",
                "models": ["M1", "M2"],
                "qty_kbn": 4,
                "image": {"status": "missing", "path": "images/none.png"}
            },
            {
                "uniq_no": "U-003",
                "production_line": " SEWING ",
                "part_number": "Z-3",
                "image": {"status": "present", "path": "images/gone.png"}
            }
        ]
    })
}

fn seeded(observation_qty: i64) -> Fixture {
    let fx = Fixture::new();
    fx.write_mapping(&sample_mapping(observation_qty));
    fx.write("images/u001.png", &png(3, 2, 10));
    fx
}

fn count(store: &Store, sql: &str) -> i64 {
    store.conn().query_row(sql, [], |row| row.get(0)).unwrap()
}

fn table_counts(store: &Store) -> Vec<i64> {
    OWNED_TABLES
        .iter()
        .map(|t| count(store, &format!("SELECT COUNT(*) FROM {}", t)))
        .collect()
}

fn part_id(store: &Store, uniq: &str) -> i64 {
    store
        .conn()
        .query_row("SELECT part_id FROM part WHERE uniq_no = ?1", params![uniq], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_normalized_part_number_and_requirement() {
    let fx = seeded(5);
    let mut store = fx.store();

    let summary = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_if_empty(&fx.export)
        .unwrap()
        .unwrap();
    assert_eq!(summary.imported_parts, 3);
    assert_eq!(summary.imported_reports, 1);

    let norm: String = store
        .conn()
        .query_row("SELECT part_number_norm FROM part WHERE uniq_no = 'U-001'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(norm, "AB01");

    let (model, qty, page): (String, i64, Option<i64>) = store
        .conn()
        .query_row(
            "SELECT m.code, r.qty_kbn, r.source_page FROM part_requirement r
             JOIN model m ON m.model_id = r.model_id
             JOIN part p ON p.part_id = r.part_id
             WHERE p.uniq_no = 'U-001'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!((model.as_str(), qty, page), ("M1", 12, Some(3)));
}

#[test]
fn test_flat_quantity_and_unknown_line_fall_back() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_if_empty(&fx.export)
        .unwrap();

    let u002 = part_id(&store, "U-002");
    let quantities: Vec<(String, i64)> = store
        .conn()
        .prepare(
            "SELECT m.code, r.qty_kbn FROM part_requirement r JOIN model m ON m.model_id = r.model_id
             WHERE r.part_id = ?1 ORDER BY m.code",
        )
        .unwrap()
        .query_map(params![u002], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(quantities, vec![("M1".to_string(), 4), ("M2".to_string(), 4)]);

    let line = |uniq: &str| -> String {
        store
            .conn()
            .query_row(
                "SELECT l.code FROM part p JOIN production_line l ON l.production_line_id = p.production_line_id
                 WHERE p.uniq_no = ?1",
                params![uniq],
                |row| row.get(0),
            )
            .unwrap()
    };
    assert_eq!(line("U-002"), "press");
    assert_eq!(line("U-003"), "sewing");
}

#[test]
fn test_configured_default_line() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .with_default_line("Sewing")
        .bootstrap_if_empty(&fx.export)
        .unwrap();

    let line_id: i64 = store
        .conn()
        .query_row("SELECT production_line_id FROM part WHERE uniq_no = 'U-002'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(line_id, 2);
}

#[test]
fn test_material_layers_are_ordered_and_tagged() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_if_empty(&fx.export)
        .unwrap();

    let layers: Vec<(i64, String, Option<f64>)> = store
        .conn()
        .prepare(
            "SELECT l.layer_order, m.material_name_norm, l.weight_g FROM part_material_layer l
             JOIN material m ON m.material_id = l.material_id ORDER BY l.layer_order",
        )
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        layers,
        vec![
            (1, "PP SHEET".to_string(), Some(12.5)),
            (2, "FELT GREY".to_string(), None),
        ]
    );
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part_material_layer_tag"), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part_material_tag"), 1);
}

#[test]
fn test_images_stored_placeholder_used_and_unreadable_skipped() {
    let fx = seeded(5);
    let mut store = fx.store();
    let summary = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_if_empty(&fx.export)
        .unwrap()
        .unwrap();

    assert_eq!(summary.imported_images, 2);
    assert_eq!(summary.skipped_images.len(), 1);
    assert_eq!(summary.skipped_images[0].uniq_no, "U-003");
    assert_eq!(summary.skipped_images[0].path, "images/gone.png");

    // Decoded dimensions win over the declared ones
    let (w, h): (i64, i64) = store
        .conn()
        .query_row(
            "SELECT width_px, height_px FROM image_asset WHERE part_id = ?1",
            params![part_id(&store, "U-001")],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((w, h), (3, 2));

    let repo = AssetRepository::new(&store, &fx.assets);
    let (asset, bytes) = repo.load_active_image("U-001").unwrap().unwrap();
    assert_eq!(bytes, png(3, 2, 10));
    assert_eq!(asset.digest_hex, sha256_hex(&bytes));

    let (placeholder_ref, placeholder) = repo.load_active_image("U-002").unwrap().unwrap();
    assert_eq!(placeholder_ref.mime, "image/png");
    assert_eq!(part_image::decoded_dimensions(&placeholder), Some((1, 1)));

    assert!(repo.active_image_ref("U-003").unwrap().is_none());
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part WHERE uniq_no = 'U-003'"), 1);
}

#[test]
fn test_forced_reimport_is_idempotent() {
    let fx = seeded(5);
    let mut store = fx.store();

    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap()
        .unwrap();
    let first = table_counts(&store);

    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap()
        .unwrap();
    assert_eq!(table_counts(&store), first);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part"), 3);
}

#[test]
fn test_if_empty_skips_populated_catalog() {
    let fx = seeded(5);
    let mut store = fx.store();
    let mut bootstrapper = Bootstrapper::new(&mut store, &fx.assets);

    assert!(bootstrapper.bootstrap_if_empty(&fx.export).unwrap().is_some());
    assert!(!bootstrapper.is_catalog_empty().unwrap());
    assert!(bootstrapper.bootstrap_if_empty(&fx.export).unwrap().is_none());
}

#[test]
fn test_qa_observation_last_run_wins() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    fx.write_mapping(&sample_mapping(7));
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    assert_eq!(count(&store, "SELECT COUNT(*) FROM qa_part_defect_observation"), 1);
    assert_eq!(count(&store, "SELECT qty FROM qa_part_defect_observation"), 7);
    // Legend for an unknown report is dropped
    assert_eq!(count(&store, "SELECT COUNT(*) FROM qa_report_defect_legend"), 1);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM qa_part_report_summary"), 1);
}

#[test]
fn test_duplicate_observation_in_one_export_collapses() {
    let fx = seeded(5);
    let mut mapping = sample_mapping(5);
    mapping["qa"]["observations"]
        .as_array_mut()
        .unwrap()
        .push(json!({"observation_id": "O1b", "report_id": "R1", "uniq_no": "u-001", "defect_type_id": "D1", "qty": 9}));
    fx.write_mapping(&mapping);

    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    assert_eq!(count(&store, "SELECT COUNT(*) FROM qa_part_defect_observation"), 1);
    assert_eq!(count(&store, "SELECT qty FROM qa_part_defect_observation"), 9);
}

#[test]
fn test_new_image_replaces_active_across_runs() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    let replacement = png(4, 4, 200);
    fx.write("images/u001.png", &replacement);
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    let u001 = part_id(&store, "U-001");
    let active: Vec<String> = store
        .conn()
        .prepare("SELECT sha256 FROM image_asset WHERE part_id = ?1 AND active = 1")
        .unwrap()
        .query_map(params![u001], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(active, vec![sha256_hex(&replacement)]);
}

#[test]
fn test_repeated_part_entry_deactivates_previous_image() {
    let fx = seeded(5);
    let mut mapping = sample_mapping(5);
    let mut again = mapping["parts"][0].clone();
    again["image"]["path"] = json!("images/u001-v2.png");
    mapping["parts"].as_array_mut().unwrap().push(again);
    fx.write_mapping(&mapping);
    let second = png(5, 5, 77);
    fx.write("images/u001-v2.png", &second);

    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();

    let u001 = part_id(&store, "U-001");
    let rows: Vec<(String, bool)> = store
        .conn()
        .prepare("SELECT sha256, active FROM image_asset WHERE part_id = ?1 ORDER BY image_asset_id")
        .unwrap()
        .query_map(params![u001], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].1);
    assert_eq!(rows[1], (sha256_hex(&second), true));
}

#[test]
fn test_missing_mapping_is_a_no_op() {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.export).unwrap();
    let mut store = fx.store();

    let result = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();
    assert!(result.is_none());
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part"), 0);
}

#[test]
fn test_malformed_mapping_fails_without_writes() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();
    let before = table_counts(&store);

    fx.write(MAPPING_PATH, b"{\"parts\": [ {\"uniq_no\": \"U-9\", }");
    let err = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap_err();
    assert!(matches!(err, BootstrapError::ImportParse(_)));
    assert_eq!(table_counts(&store), before);
}

#[test]
fn test_non_utf8_mapping_fails_as_parse_error() {
    let fx = seeded(5);
    let mut store = fx.store();
    fx.write(MAPPING_PATH, b"{\"parts\": [ {\"uniq_no\": \"U-\xff\xfe\"} ]}");

    let err = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap_err();
    assert!(matches!(err, BootstrapError::ImportParse(_)));
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part"), 0);
}

#[test]
fn test_failing_stage_rolls_back_whole_run() {
    let fx = seeded(5);
    let mut store = fx.store();
    Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap();
    let before = table_counts(&store);

    // Same normalized part number under a second uniq code violates uniqueness
    let mut mapping = sample_mapping(5);
    mapping["parts"]
        .as_array_mut()
        .unwrap()
        .push(json!({"uniq_no": "U-777", "production_line": "press", "part_number": "AB-01"}));
    fx.write_mapping(&mapping);

    let err = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Sqlite(_)));
    assert_eq!(table_counts(&store), before);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM part WHERE uniq_no = 'U-777'"), 0);
}

fn sample_screening() -> Value {
    json!({
        "generated_at": "2026-03-01T00:00:00Z",
        "summary": {"total_observations": 3},
        "part_item_defect_stats": [
            {"line": "Press Line", "part_number": "ab-O1", "part_number_norm": "AB01",
             "defect_name": "Wrinkle ", "defect_name_norm": "WRINKLE", "occurrence_qty": 6, "affected_days": -2,
             "last_seen_sheet": "2026-02-20"},
            {"line": "Sewing", "part_number": "XY-2", "part_number_norm": "XY2",
             "defect_name": "wrinkle", "defect_name_norm": "WRINKLE", "occurrence_qty": 1, "affected_days": 1},
            {"line": "press", "part_number": "nope", "part_number_norm": "NOPE",
             "defect_name": "Hole", "defect_name_norm": "HOLE", "occurrence_qty": 1, "affected_days": 1}
        ],
        "material_item_defect_risk": [
            {"line": "press", "material_name": "felt grey", "material_name_norm": "FELT GREY",
             "defect_name": "Wrinkle", "defect_name_norm": "WRINKLE", "risk_score": -1.5,
             "affected_parts": 2, "sample_size": 10}
        ]
    })
}

#[test]
fn test_screening_joins_and_clamps() {
    let fx = seeded(5);
    fx.write(SCREENING_PATH, sample_screening().to_string().as_bytes());
    let mut store = fx.store();

    let summary = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap()
        .unwrap();
    assert!(summary.screening_imported);
    assert_eq!(summary.screening_part_stats, 2);
    assert_eq!(summary.screening_material_risks, 1);

    let source_line: String = store
        .conn()
        .query_row("SELECT source_line FROM item_defect WHERE defect_name_norm = 'WRINKLE'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(source_line, "mixed");
    assert_eq!(count(&store, "SELECT COUNT(*) FROM item_defect"), 1);
    assert_eq!(
        count(&store, "SELECT affected_days FROM part_item_defect_stat WHERE source_line = 'press'"),
        0
    );
    let score: f64 = store
        .conn()
        .query_row("SELECT risk_score FROM material_item_defect_risk", [], |row| row.get(0))
        .unwrap();
    assert_eq!(score, 0.0);
}

#[test]
fn test_malformed_screening_is_skipped() {
    let fx = seeded(5);
    fx.write(SCREENING_PATH, b"{ not json");
    let mut store = fx.store();

    let summary = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap()
        .unwrap();
    assert!(!summary.screening_imported);
    assert_eq!(summary.imported_parts, 3);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM item_defect"), 0);
}

#[test]
fn test_export_outside_paths_are_skipped() {
    let fx = seeded(5);
    let mut mapping = sample_mapping(5);
    mapping["parts"][0]["image"]["path"] = json!("../../etc/passwd");
    fx.write_mapping(&mapping);

    let mut store = fx.store();
    let summary = Bootstrapper::new(&mut store, &fx.assets)
        .bootstrap_forced(&fx.export)
        .unwrap()
        .unwrap();
    assert!(summary
        .skipped_images
        .iter()
        .any(|s| s.uniq_no == "U-001" && s.reason.contains("traversal")));
}
