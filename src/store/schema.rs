// Schema and migrations, run once by Store::open.
// Adding a table or column: append an idempotent CREATE TABLE IF NOT EXISTS
// at the end of run_migrations(); never edit existing DDL.

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

pub(crate) fn run_migrations(conn: &Connection) -> Result<()> {
    // ── Reviews and studies ──────────────────────────────────────────
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS slr (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            min_year INTEGER,
            max_year INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS study (
            id INTEGER PRIMARY KEY,
            slr_id INTEGER NOT NULL REFERENCES slr(id),
            node_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            abstract TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '',
            UNIQUE (slr_id, node_id)
        );

        CREATE TABLE IF NOT EXISTS study_citation (
            study_id INTEGER NOT NULL REFERENCES study(id),
            reference_id INTEGER NOT NULL REFERENCES study(id),
            PRIMARY KEY (study_id, reference_id)
        );

        CREATE TABLE IF NOT EXISTS experiment (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slr_id INTEGER NOT NULL REFERENCES slr(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS experiment_qgs (
            experiment_id INTEGER NOT NULL REFERENCES experiment(id),
            study_id INTEGER NOT NULL REFERENCES study(id),
            PRIMARY KEY (experiment_id, study_id)
        );
        ",
    )?;

    // ── Parameter space ──────────────────────────────────────────────
    // topic_params is a tagged union: `kind` names the strategy and
    // `payload` holds the canonical JSON of that strategy's fields.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS topic_params (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            UNIQUE (kind, payload)
        );

        CREATE TABLE IF NOT EXISTS formulation_params (
            id INTEGER PRIMARY KEY,
            n_words_per_topic INTEGER NOT NULL,
            n_enrichments_per_word INTEGER NOT NULL,
            UNIQUE (n_words_per_topic, n_enrichments_per_word)
        );
        ",
    )?;

    // ── Sweep output ─────────────────────────────────────────────────
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS search_string (
            id INTEGER PRIMARY KEY,
            string TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS sweep_unit (
            id INTEGER PRIMARY KEY,
            experiment_id INTEGER NOT NULL REFERENCES experiment(id),
            topic_strategy TEXT NOT NULL,
            enrichment_strategy TEXT NOT NULL,
            formulation_params_id INTEGER NOT NULL REFERENCES formulation_params(id),
            topic_params_id INTEGER NOT NULL REFERENCES topic_params(id),
            search_string_id INTEGER NOT NULL REFERENCES search_string(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (experiment_id, formulation_params_id, topic_params_id, enrichment_strategy)
        );

        CREATE INDEX IF NOT EXISTS idx_sweep_unit_string
            ON sweep_unit(search_string_id);
        ",
    )?;

    // ── Memoization cache ────────────────────────────────────────────
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memo_cache (
            id INTEGER PRIMARY KEY,
            namespace TEXT NOT NULL,
            scope TEXT NOT NULL,
            strategy TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            key_digest TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (namespace, scope, strategy, key_digest)
        );
        ",
    )?;

    // ── Retrieval results ────────────────────────────────────────────
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS search_performance (
            id INTEGER PRIMARY KEY,
            search_string_id INTEGER NOT NULL UNIQUE REFERENCES search_string(id),
            n_results INTEGER NOT NULL,
            n_qgs_in_results INTEGER NOT NULL DEFAULT 0,
            n_gs_in_results INTEGER NOT NULL DEFAULT 0,
            n_gs_in_bsb INTEGER NOT NULL DEFAULT 0,
            n_gs_in_sb INTEGER NOT NULL DEFAULT 0,
            start_set_precision REAL NOT NULL DEFAULT 0,
            start_set_recall REAL NOT NULL DEFAULT 0,
            start_set_f1 REAL NOT NULL DEFAULT 0,
            bsb_recall REAL NOT NULL DEFAULT 0,
            sb_recall REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS performance_membership (
            performance_id INTEGER NOT NULL REFERENCES search_performance(id),
            set_kind TEXT NOT NULL,
            study_id INTEGER NOT NULL REFERENCES study(id),
            PRIMARY KEY (performance_id, set_kind, study_id)
        );
        ",
    )?;

    debug!("Migrations applied");
    Ok(())
}
