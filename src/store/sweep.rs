use super::{get_or_insert, Store};
use crate::config::{EnrichmentStrategy, TopicStrategy};
use crate::error::{is_unique_violation, Result};
use rusqlite::{params, OptionalExtension};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchString {
    pub id: i64,
    pub string: String,
}

/// Idempotency key of the sweep: one unit per key within an experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SweepKey {
    pub experiment_id: i64,
    pub formulation_params_id: i64,
    pub topic_params_id: i64,
    pub enrichment_strategy: EnrichmentStrategy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    Inserted { search_string_id: i64 },
    /// Another run committed this key first.
    AlreadyPresent,
}

impl Store {
    pub fn sweep_unit_exists(&self, key: &SweepKey) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM sweep_unit
                 WHERE experiment_id = ?1 AND formulation_params_id = ?2
                   AND topic_params_id = ?3 AND enrichment_strategy = ?4",
                params![
                    key.experiment_id,
                    key.formulation_params_id,
                    key.topic_params_id,
                    key.enrichment_strategy.as_str()
                ],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Persist the search string (deduplicated by content) and the unit that
    /// produced it in one transaction. Nothing is written if the unit exists.
    pub fn commit_sweep_unit(&self, key: &SweepKey, topic_strategy: TopicStrategy, string: &str) -> Result<UnitOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let search_string_id = get_or_insert(
            &tx,
            "SELECT id FROM search_string WHERE string = ?1",
            params![string],
            "INSERT INTO search_string (string) VALUES (?1)",
            params![string],
        )?;

        let inserted = tx.execute(
            "INSERT INTO sweep_unit
                (experiment_id, topic_strategy, enrichment_strategy, formulation_params_id, topic_params_id, search_string_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.experiment_id,
                topic_strategy.as_str(),
                key.enrichment_strategy.as_str(),
                key.formulation_params_id,
                key.topic_params_id,
                search_string_id
            ],
        );

        match inserted {
            Ok(_) => {
                tx.commit()?;
                Ok(UnitOutcome::Inserted { search_string_id })
            }
            // Dropping the transaction rolls back the string insert too.
            Err(e) if is_unique_violation(&e) => Ok(UnitOutcome::AlreadyPresent),
            Err(e) => Err(e.into()),
        }
    }

    pub fn search_string_by_id(&self, id: i64) -> Result<Option<SearchString>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, string FROM search_string WHERE id = ?1",
                params![id],
                |row| Ok(SearchString { id: row.get(0)?, string: row.get(1)? }),
            )
            .optional()?)
    }

    /// Distinct strings produced by an experiment's units, ascending id.
    pub fn search_strings_for_experiment(&self, experiment_id: i64) -> Result<Vec<SearchString>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT s.id, s.string FROM search_string s
             JOIN sweep_unit u ON u.search_string_id = s.id
             WHERE u.experiment_id = ?1
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

    pub fn count_sweep_units(&self, experiment_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sweep_unit WHERE experiment_id = ?1",
            params![experiment_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
