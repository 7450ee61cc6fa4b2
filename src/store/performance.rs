use super::{SearchString, Store};
use crate::error::{is_unique_violation, Error, Result};
use crate::evaluation::{Evaluation, MembershipKind, SearchPerformance};
use rusqlite::{params, OptionalExtension};

/// Progress of an experiment as seen from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExperimentStatus {
    pub units: usize,
    pub strings: usize,
    pub scored: usize,
    pub pending: usize,
    pub invalid: usize,
}

impl Store {
    /// Strings lacking a performance record, ascending id. With an experiment,
    /// only strings produced by its sweep units.
    pub fn strings_without_performance(&self, experiment_id: Option<i64>) -> Result<Vec<SearchString>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.string FROM search_string s
             WHERE NOT EXISTS (SELECT 1 FROM search_performance p WHERE p.search_string_id = s.id)
               AND (?1 IS NULL OR EXISTS (
                    SELECT 1 FROM sweep_unit u WHERE u.search_string_id = s.id AND u.experiment_id = ?1))
             ORDER BY s.id",
        )?;
        let rows = stmt.query_map(params![experiment_id], |row| {
            Ok(SearchString { id: row.get(0)?, string: row.get(1)? })
        })?;
        let mut strings = Vec::new();
        for row in rows {
            strings.push(row?);
        }
        Ok(strings)
    }

    /// Strings scored with zero results, ascending id.
    pub fn zero_result_strings(&self) -> Result<Vec<SearchString>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.string FROM search_string s
             JOIN search_performance p ON p.search_string_id = s.id
             WHERE p.n_results = 0
             ORDER BY s.id",
        )?;
        let rows = stmt.query_map([], |row| Ok(SearchString { id: row.get(0)?, string: row.get(1)? }))?;
        let mut strings = Vec::new();
        for row in rows {
            strings.push(row?);
        }
        Ok(strings)
    }

    /// Write a performance record with its membership lists in one
    /// transaction. Returns false when the string was already scored.
    pub fn insert_performance(&self, performance: &SearchPerformance) -> Result<bool> {
        let e = &performance.evaluation;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO search_performance
                (search_string_id, n_results, n_qgs_in_results, n_gs_in_results, n_gs_in_bsb, n_gs_in_sb,
                 start_set_precision, start_set_recall, start_set_f1, bsb_recall, sb_recall)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                performance.search_string_id,
                performance.n_results,
                e.qgs_in_results.len() as i64,
                e.gs_in_results.len() as i64,
                e.gs_in_bsb.len() as i64,
                e.gs_in_sb.len() as i64,
                e.start_set_precision,
                e.start_set_recall,
                e.start_set_f1,
                e.bsb_recall,
                e.sb_recall
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        let performance_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO performance_membership (performance_id, set_kind, study_id) VALUES (?1, ?2, ?3)",
            )?;
            for kind in MembershipKind::ALL {
                for study_id in e.members(kind) {
                    stmt.execute(params![performance_id, kind.as_str(), study_id])?;
                }
            }
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn performance_for_string(&self, search_string_id: i64) -> Result<Option<SearchPerformance>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, n_results, start_set_precision, start_set_recall, start_set_f1, bsb_recall, sb_recall
                 FROM search_performance WHERE search_string_id = ?1",
                params![search_string_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        Evaluation {
                            start_set_precision: row.get(2)?,
                            start_set_recall: row.get(3)?,
                            start_set_f1: row.get(4)?,
                            bsb_recall: row.get(5)?,
                            sb_recall: row.get(6)?,
                            ..Evaluation::default()
                        },
                    ))
                },
            )
            .optional()?;

        let Some((performance_id, n_results, mut evaluation)) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT set_kind, study_id FROM performance_membership
             WHERE performance_id = ?1 ORDER BY set_kind, study_id",
        )?;
        let rows = stmt.query_map(params![performance_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, study_id) = row?;
            let kind = MembershipKind::parse(&kind)
                .ok_or_else(|| Error::Invariant(format!("unknown membership kind '{}'", kind)))?;
            evaluation.members_mut(kind).push(study_id);
        }

        Ok(Some(SearchPerformance { search_string_id, n_results, evaluation }))
    }

    /// Rewrite a scored record as the malformed-query sentinel.
    pub fn mark_performance_invalid(&self, search_string_id: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM performance_membership WHERE performance_id IN
                (SELECT id FROM search_performance WHERE search_string_id = ?1)",
            params![search_string_id],
        )?;
        let updated = tx.execute(
            "UPDATE search_performance SET n_results = ?2,
                n_qgs_in_results = 0, n_gs_in_results = 0, n_gs_in_bsb = 0, n_gs_in_sb = 0,
                start_set_precision = 0, start_set_recall = 0, start_set_f1 = 0, bsb_recall = 0, sb_recall = 0
             WHERE search_string_id = ?1",
            params![search_string_id, crate::config::INVALID_QUERY_RESULTS],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("performance of string #{}", search_string_id)));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn experiment_status(&self, experiment_id: i64) -> Result<ExperimentStatus> {
        let conn = self.conn.lock();
        let (units, strings, scored, invalid): (i64, i64, i64, i64) = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM sweep_unit WHERE experiment_id = ?1),
                (SELECT COUNT(DISTINCT search_string_id) FROM sweep_unit WHERE experiment_id = ?1),
                (SELECT COUNT(*) FROM search_performance p WHERE p.search_string_id IN
                    (SELECT search_string_id FROM sweep_unit WHERE experiment_id = ?1)),
                (SELECT COUNT(*) FROM search_performance p WHERE p.n_results < 0 AND p.search_string_id IN
                    (SELECT search_string_id FROM sweep_unit WHERE experiment_id = ?1))",
            params![experiment_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        Ok(ExperimentStatus {
            units: units as usize,
            strings: strings as usize,
            scored: scored as usize,
            pending: (strings - scored).max(0) as usize,
            invalid: invalid as usize,
        })
    }
}
