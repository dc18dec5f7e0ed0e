//! Required lookup rows, checked on every open

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::core::normalize::normalize_name;

/// Canonical name of the supplier materials default to
pub const DEFAULT_SUPPLIER_NAME: &str = "Default Supplier";

/// Placeholder supplier names older stores were seeded with
const LEGACY_SUPPLIER_NAMES: &[&str] = &["PT Dummy"];

/// Production lines every store must know about
pub(crate) const KNOWN_LINES: &[(i64, &str, &str)] = &[(1, "press", "Press"), (2, "sewing", "Sewing")];

/// Ensure the known lines and the canonical default supplier exist
///
/// Returns the number of rows inserted or corrected.
pub(crate) fn reconcile(conn: &mut Connection) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let mut changes = ensure_known_lines(&tx)?;
    changes += ensure_default_supplier(&tx)?;
    tx.commit()?;
    Ok(changes)
}

pub(crate) fn ensure_known_lines(conn: &Connection) -> rusqlite::Result<usize> {
    let mut inserted = 0;
    for (id, code, name) in KNOWN_LINES {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO production_line(production_line_id, code, display_name) VALUES (?1, ?2, ?3)",
            params![id, code, name],
        )?;
    }
    Ok(inserted)
}

fn ensure_default_supplier(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
    let canonical_norm = normalize_name(DEFAULT_SUPPLIER_NAME);
    let mut changes = 0;

    for legacy in LEGACY_SUPPLIER_NAMES {
        let Some(legacy_id) = supplier_id(tx, &normalize_name(legacy))? else {
            continue;
        };

        match supplier_id(tx, &canonical_norm)? {
            Some(canonical_id) => {
                tx.execute(
                    "UPDATE material SET supplier_id = ?1 WHERE supplier_id = ?2",
                    params![canonical_id, legacy_id],
                )?;
                tx.execute("DELETE FROM supplier WHERE supplier_id = ?1", params![legacy_id])?;
            }
            None => {
                tx.execute(
                    "UPDATE supplier SET supplier_name = ?1, supplier_name_norm = ?2 WHERE supplier_id = ?3",
                    params![DEFAULT_SUPPLIER_NAME, canonical_norm, legacy_id],
                )?;
            }
        }
        changes += 1;
    }

    changes += tx.execute(
        "INSERT INTO supplier(supplier_name, supplier_name_norm, is_active) VALUES (?1, ?2, 1)
         ON CONFLICT(supplier_name_norm) DO UPDATE SET supplier_name = excluded.supplier_name
         WHERE supplier.supplier_name <> excluded.supplier_name",
        params![DEFAULT_SUPPLIER_NAME, canonical_norm],
    )?;

    Ok(changes)
}

fn supplier_id(conn: &Connection, name_norm: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT supplier_id FROM supplier WHERE supplier_name_norm = ?1",
        params![name_norm],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::SchemaMigrator;
    use tempfile::tempdir;

    fn suppliers(conn: &Connection) -> Vec<(i64, String)> {
        let mut stmt = conn
            .prepare("SELECT supplier_id, supplier_name FROM supplier ORDER BY supplier_id")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("p.db");
        drop(SchemaMigrator::new().ensure_ready(&path).unwrap());

        let mut conn = Connection::open(&path).unwrap();
        assert_eq!(reconcile(&mut conn).unwrap(), 0);
        assert_eq!(suppliers(&conn).len(), 1);
    }

    #[test]
    fn test_legacy_placeholder_is_renamed() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("p.db");
        drop(SchemaMigrator::new().ensure_ready(&path).unwrap());

        let mut conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "DELETE FROM supplier;
             INSERT INTO supplier(supplier_id, supplier_name, supplier_name_norm) VALUES (7, 'PT Dummy', 'PT DUMMY');",
        )
        .unwrap();

        assert_eq!(reconcile(&mut conn).unwrap(), 1);
        assert_eq!(suppliers(&conn), vec![(7, DEFAULT_SUPPLIER_NAME.to_string())]);
    }

    #[test]
    fn test_legacy_placeholder_is_merged_into_canonical() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("p.db");
        drop(SchemaMigrator::new().ensure_ready(&path).unwrap());

        let mut conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO supplier(supplier_id, supplier_name, supplier_name_norm) VALUES (50, 'PT Dummy', 'PT DUMMY');
             INSERT INTO material(material_name, material_name_norm, supplier_id) VALUES ('Felt', 'FELT', 50);",
        )
        .unwrap();
        let canonical = suppliers(&conn)[0].0;

        reconcile(&mut conn).unwrap();

        assert_eq!(suppliers(&conn), vec![(canonical, DEFAULT_SUPPLIER_NAME.to_string())]);
        let owner: i64 = conn
            .query_row("SELECT supplier_id FROM material WHERE material_name_norm = 'FELT'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(owner, canonical);
    }

    #[test]
    fn test_missing_lines_are_restored() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("p.db");
        drop(SchemaMigrator::new().ensure_ready(&path).unwrap());

        let mut conn = Connection::open(&path).unwrap();
        conn.execute("DELETE FROM production_line WHERE code = 'sewing'", []).unwrap();
        assert_eq!(reconcile(&mut conn).unwrap(), 1);
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM production_line", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
