//! SQL migration definitions for the knowledge store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: doc_functions, harvested_steps",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Creation methods scraped from the API documentation
CREATE TABLE IF NOT EXISTS doc_functions (
    function_key TEXT PRIMARY KEY,   -- hybridshapefactory.addnewplaneoffset
    factory      TEXT NOT NULL,      -- HybridShapeFactory
    method       TEXT NOT NULL,      -- AddNewPlaneOffset
    action_label TEXT NOT NULL,      -- create_plane_offset
    doc_url      TEXT,
    tokens_json  TEXT NOT NULL       -- JSON array of lowercase tokens
);

CREATE INDEX IF NOT EXISTS idx_doc_functions_action ON doc_functions(action_label);

-- Build steps harvested from the instructions document
CREATE TABLE IF NOT EXISTS harvested_steps (
    step_id         INTEGER PRIMARY KEY,   -- execution order
    action_label    TEXT NOT NULL,
    description     TEXT NOT NULL,
    params_json     TEXT NOT NULL,         -- JSON object
    produces_json   TEXT,                  -- JSON array
    references_json TEXT,                  -- JSON array
    code_lang       TEXT,
    generated_code  TEXT
);

CREATE INDEX IF NOT EXISTS idx_harvested_steps_action ON harvested_steps(action_label);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
