//! Catalog stages: lines, models, tags, materials, parts and their children

use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use super::dto::{PartDescriptor, RequirementRaw};
use super::IdMaps;
use crate::core::db::ensure_known_lines;
use crate::core::normalize::{clean_codes, line_key, normalize_name, normalize_part_number, normalize_uniq};

/// Known lines keyed by code
pub(crate) fn upsert_lines(conn: &Connection, ids: &mut IdMaps) -> rusqlite::Result<()> {
    ensure_known_lines(conn)?;

    let mut stmt = conn.prepare("SELECT code, production_line_id FROM production_line")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (code, id) = row?;
        ids.lines.insert(line_key(&code), id);
    }
    Ok(())
}

pub(crate) fn model_id(conn: &Connection, ids: &mut IdMaps, code: &str) -> rusqlite::Result<i64> {
    if let Some(id) = ids.models.get(code) {
        return Ok(*id);
    }
    conn.execute("INSERT OR IGNORE INTO model(code) VALUES (?1)", params![code])?;
    let id = conn.query_row("SELECT model_id FROM model WHERE code = ?1", params![code], |row| row.get(0))?;
    ids.models.insert(code.to_string(), id);
    Ok(id)
}

pub(crate) fn tag_id(conn: &Connection, ids: &mut IdMaps, tag: &str) -> rusqlite::Result<i64> {
    if let Some(id) = ids.tags.get(tag) {
        return Ok(*id);
    }
    conn.execute("INSERT OR IGNORE INTO material_tag(tag) VALUES (?1)", params![tag])?;
    let id = conn.query_row(
        "SELECT material_tag_id FROM material_tag WHERE tag = ?1",
        params![tag],
        |row| row.get(0),
    )?;
    ids.tags.insert(tag.to_string(), id);
    Ok(id)
}

fn material_id(conn: &Connection, ids: &mut IdMaps, name: &str, norm: &str) -> rusqlite::Result<i64> {
    if let Some(id) = ids.materials.get(norm) {
        return Ok(*id);
    }
    conn.execute(
        "INSERT INTO material(material_name, material_name_norm) VALUES (?1, ?2)
         ON CONFLICT(material_name_norm) DO UPDATE SET material_name = excluded.material_name",
        params![name.trim(), norm],
    )?;
    let id = conn.query_row(
        "SELECT material_id FROM material WHERE material_name_norm = ?1",
        params![norm],
        |row| row.get(0),
    )?;
    ids.materials.insert(norm.to_string(), id);
    Ok(id)
}

/// Upsert one part row keyed by its uniq code and return its id
pub(crate) fn upsert_part(
    conn: &Connection,
    part: &PartDescriptor,
    line_id: i64,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO part(
           uniq_no, uniq_no_norm, production_line_id,
           part_number, part_number_norm, part_name,
           part_number_partlist, part_name_partlist,
           material_raw, material_note, models_source,
           models_inferred, qty_kbn_inconsistent,
           note_missing_in_part_requirement_list, note_missing_image_in_part_list_pdf,
           created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
         ON CONFLICT(uniq_no) DO UPDATE SET
           uniq_no_norm = excluded.uniq_no_norm,
           production_line_id = excluded.production_line_id,
           part_number = excluded.part_number,
           part_number_norm = excluded.part_number_norm,
           part_name = excluded.part_name,
           part_number_partlist = excluded.part_number_partlist,
           part_name_partlist = excluded.part_name_partlist,
           material_raw = excluded.material_raw,
           material_note = excluded.material_note,
           models_source = excluded.models_source,
           models_inferred = excluded.models_inferred,
           qty_kbn_inconsistent = excluded.qty_kbn_inconsistent,
           note_missing_in_part_requirement_list = excluded.note_missing_in_part_requirement_list,
           note_missing_image_in_part_list_pdf = excluded.note_missing_image_in_part_list_pdf,
           updated_at = excluded.updated_at",
        params![
            part.uniq_no,
            normalize_uniq(&part.uniq_no),
            line_id,
            part.part_number,
            normalize_part_number(&part.part_number),
            part.part_name,
            part.part_number_partlist,
            part.part_name_partlist,
            part.material_raw,
            part.material_note,
            part.models_source,
            part.models_inferred,
            part.qty_kbn_inconsistent,
            part.notes.missing_in_part_requirement_list,
            part.notes.missing_image_in_part_list_pdf,
            now,
        ],
    )?;

    conn.query_row(
        "SELECT part_id FROM part WHERE uniq_no = ?1",
        params![part.uniq_no],
        |row| row.get(0),
    )
}

pub(crate) fn sync_models(
    conn: &Connection,
    ids: &mut IdMaps,
    part_id: i64,
    part: &PartDescriptor,
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM part_model WHERE part_id = ?1", params![part_id])?;
    for code in clean_codes(&part.models) {
        let model = model_id(conn, ids, &code)?;
        conn.execute(
            "INSERT INTO part_model(part_id, model_id) VALUES (?1, ?2)",
            params![part_id, model],
        )?;
    }
    Ok(())
}

/// Rewrite per-model requirement quantities for a part
///
/// Explicit rows win, the last row naming a model taking precedence. With no
/// explicit rows, a flat `qty_kbn` applies to every declared model.
pub(crate) fn sync_requirements(
    conn: &Connection,
    ids: &mut IdMaps,
    part_id: i64,
    part: &PartDescriptor,
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM part_requirement WHERE part_id = ?1", params![part_id])?;

    let mut by_model: BTreeMap<String, RequirementRaw> = BTreeMap::new();
    for row in &part.requirements_raw {
        for code in clean_codes(&row.models) {
            by_model.insert(code, row.clone());
        }
    }

    if by_model.is_empty() {
        if let Some(qty) = part.qty_kbn {
            for code in clean_codes(&part.models) {
                let synthesized = RequirementRaw {
                    part_number: Some(part.part_number.clone()),
                    part_name: Some(part.part_name.clone()),
                    models: vec![code.clone()],
                    qty_kbn: Some(qty),
                    source_page: None,
                };
                by_model.insert(code, synthesized);
            }
        }
    }

    for (code, row) in &by_model {
        let Some(qty) = row.qty_kbn else {
            continue;
        };
        let model = model_id(conn, ids, code)?;
        conn.execute(
            "INSERT INTO part_requirement(part_id, model_id, qty_kbn, source_page, source_part_number, source_part_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(part_id, model_id) DO UPDATE SET
               qty_kbn = excluded.qty_kbn,
               source_page = excluded.source_page,
               source_part_number = excluded.source_part_number,
               source_part_name = excluded.source_part_name",
            params![part_id, model, qty, row.source_page, row.part_number, row.part_name],
        )?;
    }
    Ok(())
}

/// Rewrite material tags and layers for a part
///
/// Layers are stored in ascending declared order and numbered from 1;
/// layers without a material name are dropped.
pub(crate) fn sync_materials(
    conn: &Connection,
    ids: &mut IdMaps,
    part_id: i64,
    part: &PartDescriptor,
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM part_material_tag WHERE part_id = ?1", params![part_id])?;
    conn.execute(
        "DELETE FROM part_material_layer_tag WHERE part_material_layer_id IN
           (SELECT part_material_layer_id FROM part_material_layer WHERE part_id = ?1)",
        params![part_id],
    )?;
    conn.execute("DELETE FROM part_material_layer WHERE part_id = ?1", params![part_id])?;

    for tag in clean_codes(&part.material_tags) {
        let tag = tag_id(conn, ids, &tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO part_material_tag(part_id, material_tag_id) VALUES (?1, ?2)",
            params![part_id, tag],
        )?;
    }

    let mut layers: Vec<_> = part.materials.iter().collect();
    layers.sort_by_key(|layer| layer.layer_order);

    let mut order = 0i64;
    for layer in layers {
        let norm = normalize_name(&layer.material_name);
        if norm.is_empty() {
            continue;
        }
        order += 1;

        let material = material_id(conn, ids, &layer.material_name, &norm)?;
        conn.execute(
            "INSERT INTO part_material_layer(part_id, material_id, layer_order, weight_g, basis_weight_gsm, unit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![part_id, material, order, layer.weight_g, layer.basis_weight_gsm, layer.unit],
        )?;
        let layer_id = conn.last_insert_rowid();

        for tag in clean_codes(&layer.layer_tags) {
            let tag = tag_id(conn, ids, &tag)?;
            conn.execute(
                "INSERT OR IGNORE INTO part_material_layer_tag(part_material_layer_id, material_tag_id) VALUES (?1, ?2)",
                params![layer_id, tag],
            )?;
        }
    }
    Ok(())
}
