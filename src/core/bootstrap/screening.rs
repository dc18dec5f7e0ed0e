//! Defect screening statistics joined onto already-imported parts and materials

use rusqlite::{params, Connection};

use super::dto::DefectScreening;
use super::IdMaps;
use crate::core::normalize::{normalize_line, normalize_name};

/// Replace the screening tables with the descriptor's rows
///
/// Parts join on the descriptor's own `part_number_norm` and materials on
/// `material_name_norm`; rows that do not join are dropped.
pub(crate) fn import_screening(
    conn: &Connection,
    ids: &IdMaps,
    screening: &DefectScreening,
) -> rusqlite::Result<ScreeningCounts> {
    conn.execute("DELETE FROM part_item_defect_stat", [])?;
    conn.execute("DELETE FROM material_item_defect_risk", [])?;
    conn.execute("DELETE FROM item_defect", [])?;

    let mut counts = ScreeningCounts::default();

    for row in &screening.part_item_defect_stats {
        let Some(part_id) = ids.parts_by_number.get(&row.part_number_norm) else {
            continue;
        };
        let line = normalize_line(&row.line);
        let defect_id = item_defect_id(conn, &row.defect_name, line)?;
        conn.execute(
            "INSERT INTO part_item_defect_stat(part_id, item_defect_id, source_line, occurrence_qty, affected_days, last_seen_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(part_id, item_defect_id, source_line) DO UPDATE SET
               occurrence_qty = excluded.occurrence_qty,
               affected_days = excluded.affected_days,
               last_seen_date = excluded.last_seen_date",
            params![
                part_id,
                defect_id,
                line,
                row.occurrence_qty.max(0),
                row.affected_days.max(0),
                row.last_seen_sheet,
            ],
        )?;
        counts.part_stats += 1;
    }

    for row in &screening.material_item_defect_risk {
        let Some(material_id) = ids.materials.get(&row.material_name_norm) else {
            continue;
        };
        let line = normalize_line(&row.line);
        let defect_id = item_defect_id(conn, &row.defect_name, line)?;
        conn.execute(
            "INSERT INTO material_item_defect_risk(material_id, item_defect_id, source_line, risk_score, affected_parts, sample_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(material_id, item_defect_id, source_line) DO UPDATE SET
               risk_score = excluded.risk_score,
               affected_parts = excluded.affected_parts,
               sample_size = excluded.sample_size",
            params![
                material_id,
                defect_id,
                line,
                row.risk_score.max(0.0),
                row.affected_parts.max(0),
                row.sample_size.max(0),
            ],
        )?;
        counts.material_risks += 1;
    }

    Ok(counts)
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ScreeningCounts {
    pub part_stats: usize,
    pub material_risks: usize,
}

/// Upsert an item defect; a defect seen on more than one line becomes `mixed`
fn item_defect_id(conn: &Connection, name: &str, line: &str) -> rusqlite::Result<i64> {
    let norm = normalize_name(name);
    conn.execute(
        "INSERT INTO item_defect(defect_name, defect_name_norm, source_line, source_json)
         VALUES (?1, ?2, ?3, NULL)
         ON CONFLICT(defect_name_norm) DO UPDATE SET
           defect_name = excluded.defect_name,
           source_line = CASE
             WHEN item_defect.source_line = excluded.source_line THEN item_defect.source_line
             ELSE 'mixed'
           END",
        params![name.trim(), norm, line],
    )?;
    conn.query_row(
        "SELECT item_defect_id FROM item_defect WHERE defect_name_norm = ?1",
        params![norm],
        |row| row.get(0),
    )
}
