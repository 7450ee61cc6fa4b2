use super::{get_or_insert, Store};
use crate::config::YearRange;
use crate::error::{is_unique_violation, Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Slr {
    pub id: i64,
    pub name: String,
    pub years: YearRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Study {
    pub id: i64,
    pub slr_id: i64,
    pub node_id: i64,
    pub title: String,
    pub abstract_text: String,
    pub keywords: String,
}

/// Study as supplied on import; `node_id` is the study's key inside its review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewStudy {
    pub node_id: i64,
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: String,
    /// `node_id`s of the studies this one cites.
    #[serde(default)]
    pub references: Vec<i64>,
}

/// Import file for `slr import`: a review with its gold-set studies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlrImport {
    pub name: String,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
    pub studies: Vec<NewStudy>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub slr_id: i64,
    pub studies: usize,
    pub citations: usize,
    /// References naming a `node_id` that is not part of the import.
    pub dangling_references: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Experiment {
    pub id: i64,
    pub name: String,
    pub slr_id: i64,
}

impl Study {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Study {
            id: row.get(0)?,
            slr_id: row.get(1)?,
            node_id: row.get(2)?,
            title: row.get(3)?,
            abstract_text: row.get(4)?,
            keywords: row.get(5)?,
        })
    }
}

fn select_experiment(conn: &Connection, name: &str) -> Result<Option<Experiment>> {
    Ok(conn
        .query_row(
            "SELECT id, name, slr_id FROM experiment WHERE name = ?1",
            params![name],
            |row| Ok(Experiment { id: row.get(0)?, name: row.get(1)?, slr_id: row.get(2)? }),
        )
        .optional()?)
}

impl Store {
    // ── Reviews ──────────────────────────────────────────────────────

    /// An existing review keeps its id; asking for it with other years is
    /// `Error::Config`.
    pub fn get_or_create_slr(&self, name: &str, years: YearRange) -> Result<i64> {
        years.validate()?;
        let conn = self.conn.lock();
        let id = get_or_insert(
            &conn,
            "SELECT id FROM slr WHERE name = ?1",
            params![name],
            "INSERT INTO slr (name, min_year, max_year) VALUES (?1, ?2, ?3)",
            params![name, years.min, years.max],
        )?;

        let stored = conn.query_row("SELECT min_year, max_year FROM slr WHERE id = ?1", params![id], |row| {
            Ok(YearRange { min: row.get(0)?, max: row.get(1)? })
        })?;
        if stored != years {
            return Err(Error::Config(format!(
                "SLR '{}' is stored with years {:?}..{:?}, not {:?}..{:?}",
                name, stored.min, stored.max, years.min, years.max
            )));
        }
        Ok(id)
    }

    pub fn slr_by_name(&self, name: &str) -> Result<Slr> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, min_year, max_year FROM slr WHERE name = ?1",
            params![name],
            |row| {
                Ok(Slr {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    years: YearRange { min: row.get(2)?, max: row.get(3)? },
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("SLR '{}'", name)))
    }

    pub fn slr_by_id(&self, id: i64) -> Result<Slr> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, min_year, max_year FROM slr WHERE id = ?1",
            params![id],
            |row| {
                Ok(Slr {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    years: YearRange { min: row.get(2)?, max: row.get(3)? },
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("SLR #{}", id)))
    }

    /// Import a review, its studies and their citations. Re-importing the
    /// same file changes nothing.
    pub fn import_slr(&self, import: &SlrImport) -> Result<ImportSummary> {
        let years = YearRange::new(import.min_year, import.max_year)?;
        let slr_id = self.get_or_create_slr(&import.name, years)?;

        let mut ids = HashMap::with_capacity(import.studies.len());
        for study in &import.studies {
            ids.insert(study.node_id, self.add_study(slr_id, study)?);
        }

        let mut summary = ImportSummary { slr_id, studies: ids.len(), ..ImportSummary::default() };
        for study in &import.studies {
            let citing = ids[&study.node_id];
            for reference in &study.references {
                match ids.get(reference) {
                    Some(&cited) => {
                        self.add_citation(citing, cited)?;
                        summary.citations += 1;
                    }
                    None => summary.dangling_references += 1,
                }
            }
        }
        Ok(summary)
    }

    // ── Studies and citations ────────────────────────────────────────

    pub fn add_study(&self, slr_id: i64, study: &NewStudy) -> Result<i64> {
        let conn = self.conn.lock();
        get_or_insert(
            &conn,
            "SELECT id FROM study WHERE slr_id = ?1 AND node_id = ?2",
            params![slr_id, study.node_id],
            "INSERT INTO study (slr_id, node_id, title, abstract, keywords) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![slr_id, study.node_id, study.title, study.abstract_text, study.keywords],
        )
    }

    /// Record that `study_id` cites `reference_id`. Repeats are ignored.
    pub fn add_citation(&self, study_id: i64, reference_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO study_citation (study_id, reference_id) VALUES (?1, ?2)",
            params![study_id, reference_id],
        )?;
        Ok(())
    }

    /// Gold set of a review, ascending id.
    pub fn studies_for_slr(&self, slr_id: i64) -> Result<Vec<Study>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, slr_id, node_id, title, abstract, keywords FROM study WHERE slr_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![slr_id], Study::from_row)?;
        let mut studies = Vec::new();
        for row in rows {
            studies.push(row?);
        }
        Ok(studies)
    }

    /// Citation edges `(citing, cited)` between studies of a review.
    pub fn citations_for_slr(&self, slr_id: i64) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.study_id, c.reference_id FROM study_citation c
             JOIN study s ON s.id = c.study_id
             WHERE s.slr_id = ?1
             ORDER BY c.study_id, c.reference_id",
        )?;
        let rows = stmt.query_map(params![slr_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    // ── Experiments ──────────────────────────────────────────────────

    pub fn experiment_by_name(&self, name: &str) -> Result<Experiment> {
        let conn = self.conn.lock();
        select_experiment(&conn, name)?.ok_or_else(|| Error::NotFound(format!("experiment '{}'", name)))
    }

    /// Find the experiment by name, or create it with a quasi-gold set of
    /// `|GS| / 3` studies sampled from the review. The QGS is fixed at
    /// creation; later runs reuse it. Returns whether the row was created.
    pub fn get_or_create_experiment<R: Rng + ?Sized>(
        &self,
        name: &str,
        slr_id: i64,
        rng: &mut R,
    ) -> Result<(Experiment, bool)> {
        let mut conn = self.conn.lock();

        if let Some(existing) = select_experiment(&conn, name)? {
            if existing.slr_id != slr_id {
                return Err(Error::Config(format!(
                    "experiment '{}' belongs to another SLR (#{})",
                    name, existing.slr_id
                )));
            }
            return Ok((existing, false));
        }

        let gs_ids: Vec<i64> = {
            let mut stmt = conn.prepare("SELECT id FROM study WHERE slr_id = ?1 ORDER BY id")?;
            let ids = stmt.query_map(params![slr_id], |row| row.get(0))?;
            ids.collect::<rusqlite::Result<_>>()?
        };
        let mut qgs: Vec<i64> = gs_ids.choose_multiple(rng, gs_ids.len() / 3).copied().collect();
        qgs.sort_unstable();

        let tx = conn.transaction()?;
        match tx.execute(
            "INSERT INTO experiment (name, slr_id) VALUES (?1, ?2)",
            params![name, slr_id],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                let existing = select_experiment(&conn, name)?
                    .ok_or_else(|| Error::Invariant(format!("experiment '{}' vanished after conflict", name)))?;
                return Ok((existing, false));
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare("INSERT INTO experiment_qgs (experiment_id, study_id) VALUES (?1, ?2)")?;
            for study_id in &qgs {
                stmt.execute(params![id, study_id])?;
            }
        }
        tx.commit()?;

        Ok((Experiment { id, name: name.to_string(), slr_id }, true))
    }

    /// Quasi-gold set of an experiment, ascending id.
    pub fn qgs_for_experiment(&self, experiment_id: i64) -> Result<Vec<Study>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.slr_id, s.node_id, s.title, s.abstract, s.keywords
             FROM study s JOIN experiment_qgs q ON q.study_id = s.id
             WHERE q.experiment_id = ?1
             ORDER BY s.id",
        )?;
        let rows = stmt.query_map(params![experiment_id], Study::from_row)?;
        let mut studies = Vec::new();
        for row in rows {
            studies.push(row?);
        }
        Ok(studies)
    }
}
