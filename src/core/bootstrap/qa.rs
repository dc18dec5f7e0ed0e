//! QA ledger stages: reports, defect types, legends, summaries, observations
//!
//! Rows that reference a report, part or defect type not imported in the
//! same run are skipped.

use rusqlite::{params, Connection};

use super::dto::QaSection;
use super::IdMaps;
use crate::core::normalize::{line_key, normalize_uniq};

pub(crate) fn import_qa(
    conn: &Connection,
    ids: &mut IdMaps,
    qa: &QaSection,
    default_line_id: i64,
    now: &str,
) -> rusqlite::Result<()> {
    for report in &qa.reports {
        let line_id = ids.line_or(&line_key(&report.line), default_line_id);
        conn.execute(
            "INSERT INTO qa_report(report_id, report_type, production_line_id, period_year, period_month,
                                   report_date, source_file, title, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(report_id) DO UPDATE SET
               report_type = excluded.report_type,
               production_line_id = excluded.production_line_id,
               period_year = excluded.period_year,
               period_month = excluded.period_month,
               report_date = excluded.report_date,
               source_file = excluded.source_file,
               title = excluded.title,
               imported_at = excluded.imported_at",
            params![
                report.report_id,
                report.report_type,
                line_id,
                report.period_year,
                report.period_month,
                report.report_date,
                report.source_file,
                report.title,
                now,
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT qa_report_id FROM qa_report WHERE report_id = ?1",
            params![report.report_id],
            |row| row.get(0),
        )?;
        ids.reports.insert(report.report_id.clone(), id);
    }

    for defect in &qa.defect_types {
        conn.execute(
            "INSERT INTO qa_defect_type(defect_type_id, defect_name, defect_name_norm)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(defect_type_id) DO UPDATE SET
               defect_name = excluded.defect_name,
               defect_name_norm = excluded.defect_name_norm",
            params![defect.defect_type_id, defect.name, defect.name_norm],
        )?;
        let id: i64 = conn.query_row(
            "SELECT qa_defect_type_id FROM qa_defect_type WHERE defect_type_id = ?1",
            params![defect.defect_type_id],
            |row| row.get(0),
        )?;
        ids.defect_types.insert(defect.defect_type_id.clone(), id);
    }

    for legend in &qa.report_legends {
        let (Some(report_id), Some(defect_id)) = (
            ids.reports.get(&legend.report_id),
            ids.defect_types.get(&legend.defect_type_id),
        ) else {
            continue;
        };
        conn.execute(
            "INSERT INTO qa_report_defect_legend(qa_report_id, legend_code, qa_defect_type_id, defect_name_in_report)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(qa_report_id, legend_code) DO UPDATE SET
               qa_defect_type_id = excluded.qa_defect_type_id,
               defect_name_in_report = excluded.defect_name_in_report",
            params![report_id, legend.code, defect_id, legend.defect_name],
        )?;
    }

    for summary in &qa.part_summaries {
        let (Some(report_id), Some(part_id)) = (
            ids.reports.get(&summary.report_id),
            ids.parts_by_uniq.get(&normalize_uniq(&summary.uniq_no)),
        ) else {
            continue;
        };
        conn.execute(
            "INSERT INTO qa_part_report_summary(summary_id, qa_report_id, part_id, uniq_no_in_report,
                                                total_check, total_ok, total_defect, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(summary_id) DO UPDATE SET
               qa_report_id = excluded.qa_report_id,
               part_id = excluded.part_id,
               uniq_no_in_report = excluded.uniq_no_in_report,
               total_check = excluded.total_check,
               total_ok = excluded.total_ok,
               total_defect = excluded.total_defect,
               source = excluded.source",
            params![
                summary.summary_id,
                report_id,
                part_id,
                summary.uniq_no,
                summary.total_check,
                summary.total_ok,
                summary.total_defect,
                summary.source,
            ],
        )?;
    }

    for observation in &qa.observations {
        let (Some(report_id), Some(part_id), Some(defect_id)) = (
            ids.reports.get(&observation.report_id),
            ids.parts_by_uniq.get(&normalize_uniq(&observation.uniq_no)),
            ids.defect_types.get(&observation.defect_type_id),
        ) else {
            continue;
        };
        conn.execute(
            "INSERT INTO qa_part_defect_observation(
               observation_id, qa_report_id, part_id, uniq_no_in_report, part_number_in_report,
               qa_defect_type_id, defect_name_in_report, qty, source
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(qa_report_id, part_id, qa_defect_type_id) DO UPDATE SET
               observation_id = excluded.observation_id,
               uniq_no_in_report = excluded.uniq_no_in_report,
               part_number_in_report = excluded.part_number_in_report,
               defect_name_in_report = excluded.defect_name_in_report,
               qty = excluded.qty,
               source = excluded.source",
            params![
                observation.observation_id,
                report_id,
                part_id,
                observation.uniq_no,
                observation.part_number_in_report,
                defect_id,
                observation.defect_name,
                observation.qty,
                observation.source,
            ],
        )?;
    }

    Ok(())
}
