use super::{get_or_insert, Store};
use crate::error::{Error, Result};
use crate::params::{FormulationParams, TopicParams};
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Get-or-create by `(kind, payload)`. Concurrent callers converge on one id.
    pub fn resolve_topic_params(&self, topic: &TopicParams) -> Result<i64> {
        let kind = topic.strategy().as_str();
        let payload = topic.payload()?;
        let conn = self.conn.lock();
        get_or_insert(
            &conn,
            "SELECT id FROM topic_params WHERE kind = ?1 AND payload = ?2",
            params![kind, payload],
            "INSERT INTO topic_params (kind, payload) VALUES (?1, ?2)",
            params![kind, payload],
        )
    }

    pub fn resolve_formulation_params(&self, formulation: &FormulationParams) -> Result<i64> {
        let conn = self.conn.lock();
        get_or_insert(
            &conn,
            "SELECT id FROM formulation_params WHERE n_words_per_topic = ?1 AND n_enrichments_per_word = ?2",
            params![formulation.n_words_per_topic, formulation.n_enrichments_per_word],
            "INSERT INTO formulation_params (n_words_per_topic, n_enrichments_per_word) VALUES (?1, ?2)",
            params![formulation.n_words_per_topic, formulation.n_enrichments_per_word],
        )
    }

    pub fn topic_params_by_id(&self, id: i64) -> Result<TopicParams> {
        let conn = self.conn.lock();
        let (kind, payload): (String, String) = conn
            .query_row(
                "SELECT kind, payload FROM topic_params WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("topic params #{}", id)))?;
        TopicParams::from_payload(&kind, &payload)
    }

    pub fn formulation_params_by_id(&self, id: i64) -> Result<FormulationParams> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT n_words_per_topic, n_enrichments_per_word FROM formulation_params WHERE id = ?1",
            params![id],
            |row| {
                Ok(FormulationParams {
                    n_words_per_topic: row.get(0)?,
                    n_enrichments_per_word: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("formulation params #{}", id)))
    }
}
