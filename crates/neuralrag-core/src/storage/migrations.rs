//! Database Migrations
//!
//! Schema migration definitions for the graph store. The current schema
//! version lives in `_meta` under the `schema_version` key; migrations run
//! forward idempotently on open.

/// Schema version this build understands
pub const SCHEMA_VERSION: u32 = 1;

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial graph schema: neurons, synapses, manifest, query log",
    up: MIGRATION_V1_UP,
}];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS _meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS neurons (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    embedding BLOB,
    file_path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT '',
    activation_count INTEGER NOT NULL DEFAULT 0,
    last_activated TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_neurons_file_path ON neurons(file_path);
CREATE INDEX IF NOT EXISTS idx_neurons_type ON neurons(type);
CREATE INDEX IF NOT EXISTS idx_neurons_name ON neurons(name);

CREATE TABLE IF NOT EXISTS synapses (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES neurons(id) ON DELETE CASCADE,
    weight REAL NOT NULL,
    type TEXT NOT NULL,
    metadata TEXT,
    fire_count INTEGER NOT NULL DEFAULT 0,
    last_fired TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(source_id, target_id, type)
);

CREATE INDEX IF NOT EXISTS idx_synapses_source ON synapses(source_id);
CREATE INDEX IF NOT EXISTS idx_synapses_target ON synapses(target_id);
CREATE INDEX IF NOT EXISTS idx_synapses_type ON synapses(type);

CREATE TABLE IF NOT EXISTS indexed_files (
    path TEXT PRIMARY KEY,
    language TEXT NOT NULL DEFAULT '',
    neuron_count INTEGER NOT NULL DEFAULT 0,
    last_indexed TEXT NOT NULL,
    content_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS query_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    activated_neuron_ids TEXT NOT NULL DEFAULT '[]',
    used_neuron_ids TEXT,
    timestamp TEXT NOT NULL
);

INSERT OR IGNORE INTO _meta (key, value) VALUES ('schema_version', '1');
"#;

/// Get current schema version from the database (0 for a fresh file)
pub fn current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT CAST(value AS INTEGER) FROM _meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations, returning how many ran
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT OR REPLACE INTO _meta (key, value) VALUES ('schema_version', ?1)",
                [migration.version.to_string()],
            )?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrations_are_ordered_and_start_at_one() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert_eq!(migration.version, last + 1);
            last = migration.version;
        }
        assert_eq!(last, SCHEMA_VERSION);
    }

    #[test]
    fn apply_twice_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&conn).unwrap(), MIGRATIONS.len() as u32);
        assert_eq!(apply_migrations(&conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn fresh_database_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);
    }
}
