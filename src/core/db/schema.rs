//! Target schema script and the additive objects introduced since version 11

use rusqlite::{params, Connection};

/// Version written to `PRAGMA user_version` once a store is ready
pub const TARGET_SCHEMA_VERSION: i32 = 12;

/// Oldest version the supplemental patch can bring forward
pub const SUPPLEMENTAL_BASE_VERSION: i32 = 11;

/// Column whose presence marks a store as carrying the normalized schema
pub const NORMALIZED_MARKER: (&str, &str) = ("part", "uniq_no_norm");

/// Tables that must exist for the fast path
pub const ADVANCED_TABLES: &[&str] = &["part_configuration", "defect_catalog"];

/// Full hard-replacement script
pub const SCHEMA_SQL: &str = include_str!("schema_v12.sql");

pub const SUPPLEMENTAL_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS supplier (
       supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
       supplier_name TEXT NOT NULL,
       supplier_name_norm TEXT NOT NULL UNIQUE,
       is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1))
     )",
    "CREATE TABLE IF NOT EXISTS defect_catalog (
       defect_catalog_id INTEGER PRIMARY KEY AUTOINCREMENT,
       defect_name TEXT NOT NULL,
       defect_name_norm TEXT NOT NULL UNIQUE,
       ng_origin_type TEXT NOT NULL CHECK (ng_origin_type IN ('material', 'process')),
       line_code TEXT CHECK (line_code IS NULL OR line_code IN ('press', 'sewing', 'mixed'))
     )",
    "CREATE TABLE IF NOT EXISTS material_defect_catalog (
       material_id INTEGER NOT NULL REFERENCES material(material_id) ON DELETE CASCADE,
       defect_catalog_id INTEGER NOT NULL REFERENCES defect_catalog(defect_catalog_id) ON DELETE CASCADE,
       PRIMARY KEY (material_id, defect_catalog_id)
     )",
    "CREATE TABLE IF NOT EXISTS part_defect_catalog (
       part_id INTEGER NOT NULL REFERENCES part(part_id) ON DELETE CASCADE,
       defect_catalog_id INTEGER NOT NULL REFERENCES defect_catalog(defect_catalog_id) ON DELETE CASCADE,
       ng_origin_type TEXT NOT NULL CHECK (ng_origin_type IN ('material', 'process')),
       material_id INTEGER REFERENCES material(material_id) ON DELETE SET NULL,
       PRIMARY KEY (part_id, defect_catalog_id)
     )",
    "CREATE TABLE IF NOT EXISTS part_configuration (
       part_id INTEGER PRIMARY KEY REFERENCES part(part_id) ON DELETE CASCADE,
       exclude_from_checksheet INTEGER NOT NULL DEFAULT 0 CHECK (exclude_from_checksheet IN (0, 1)),
       is_recycled_part INTEGER NOT NULL DEFAULT 0 CHECK (is_recycled_part IN (0, 1)),
       recycle_note TEXT
     )",
    "CREATE TABLE IF NOT EXISTS part_recycle_source (
       recycle_part_id INTEGER NOT NULL REFERENCES part(part_id) ON DELETE CASCADE,
       source_part_id INTEGER REFERENCES part(part_id) ON DELETE SET NULL,
       source_material_id INTEGER REFERENCES material(material_id) ON DELETE SET NULL,
       note TEXT,
       PRIMARY KEY (recycle_part_id, source_part_id, source_material_id)
     )",
];

/// A column added with `ALTER TABLE`, applied only when missing
pub struct GuardedColumn {
    pub table: &'static str,
    pub column: &'static str,
    pub ddl: &'static str,
}

pub const SUPPLEMENTAL_COLUMNS: &[GuardedColumn] = &[
    GuardedColumn {
        table: "material",
        column: "supplier_id",
        ddl: "ALTER TABLE material ADD COLUMN supplier_id INTEGER REFERENCES supplier(supplier_id)",
    },
    GuardedColumn {
        table: "material",
        column: "client_supplied",
        ddl: "ALTER TABLE material ADD COLUMN client_supplied INTEGER NOT NULL DEFAULT 0 \
              CHECK (client_supplied IN (0, 1))",
    },
];

pub const SUPPLEMENTAL_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_material_supplier ON material(supplier_id)",
    "CREATE INDEX IF NOT EXISTS idx_material_client_supplied ON material(client_supplied)",
    "CREATE INDEX IF NOT EXISTS idx_defect_catalog_origin ON defect_catalog(ng_origin_type)",
    "CREATE INDEX IF NOT EXISTS idx_defect_catalog_line ON defect_catalog(line_code)",
    "CREATE INDEX IF NOT EXISTS idx_material_defect_catalog_defect ON material_defect_catalog(defect_catalog_id)",
    "CREATE INDEX IF NOT EXISTS idx_part_defect_catalog_origin ON part_defect_catalog(part_id, ng_origin_type)",
    "CREATE INDEX IF NOT EXISTS idx_part_defect_catalog_material ON part_defect_catalog(material_id)",
    "CREATE INDEX IF NOT EXISTS idx_part_recycle_source_part ON part_recycle_source(recycle_part_id)",
];

pub fn has_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
