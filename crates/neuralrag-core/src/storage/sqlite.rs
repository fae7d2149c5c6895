//! SQLite store for the code graph
//!
//! Owns all persistent state: neurons, synapses, the indexed-file manifest,
//! and the query log. Batch inserts are atomic, endpoint deletion cascades
//! to synapses, and every weight update clamps to `[0, 1]`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::graph::{
    IndexedFile, Neuron, NeuronInput, QueryLogEntry, StoreStats, Synapse, SynapseInput,
    SynapseKind,
};

use super::migrations::{self, SCHEMA_VERSION};

/// Directory under the project root holding the store
pub const STORE_DIR: &str = ".neuralrag";

/// Database file name
pub const STORE_FILE: &str = "brain.db";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Unknown id
    #[error("Not found: {0}")]
    NotFound(String),
    /// Out-of-range or malformed input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Duplicate synapse on the `(source, target, type)` unique key
    #[error("Duplicate synapse {source_id} -> {target_id} ({kind})")]
    Conflict {
        /// Origin neuron id
        source_id: String,
        /// Destination neuron id
        target_id: String,
        /// Relation kind name
        kind: String,
    },
    /// The on-disk schema was written by a newer build
    #[error("Store schema v{found} is newer than supported v{supported}")]
    SchemaTooNew {
        /// Version found in `_meta`
        found: u32,
        /// Version this build understands
        supported: u32,
    },
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Deadline expired before any work could start
    #[error("Deadline exceeded")]
    Cancelled,
}

/// Store result type
pub type Result<T> = std::result::Result<T, BrainError>;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

// ============================================================================
// EMBEDDING BLOB CODEC
// ============================================================================

/// Encode an embedding as raw little-endian f32 bytes
pub fn embedding_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode raw little-endian f32 bytes; `None` if the length is not a
/// multiple of four
pub fn blob_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

// ============================================================================
// STORE
// ============================================================================

/// Durable graph store backed by a single SQLite file
///
/// Uses separate reader/writer connections for interior mutability. All
/// methods take `&self`, making the store `Send + Sync` so callers can share
/// it behind an `Arc` without an outer mutex.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    db_path: PathBuf,
}

impl Store {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (creating if needed) the store at `<project_root>/.neuralrag/brain.db`
    ///
    /// Runs pending migrations. Opening a store written by a newer schema
    /// version is a fatal error.
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        let dir = project_root.as_ref().join(STORE_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(STORE_FILE);

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;

        let found = migrations::current_version(&writer_conn)?;
        if found > SCHEMA_VERSION {
            return Err(BrainError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            db_path: path,
        })
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn write(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| BrainError::Init("Writer lock poisoned".into()))
    }

    fn read(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| BrainError::Init("Reader lock poisoned".into()))
    }

    // ========================================================================
    // EMBEDDING DIMENSION
    // ========================================================================

    /// Store-wide embedding dimension, fixed by the first embedded neuron
    pub fn embedding_dim(&self) -> Result<Option<usize>> {
        let reader = self.read()?;
        Self::meta_embedding_dim(&reader)
    }

    fn meta_embedding_dim(conn: &Connection) -> Result<Option<usize>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM _meta WHERE key = 'embedding_dim'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Validate an embedding against the store-wide dimension, fixing the
    /// dimension on first use. Empty embeddings always pass.
    fn check_embedding(conn: &Connection, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Ok(());
        }
        match Self::meta_embedding_dim(conn)? {
            Some(dim) if dim != embedding.len() => Err(BrainError::InvalidArgument(format!(
                "Embedding dimension {} does not match store dimension {}",
                embedding.len(),
                dim
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT OR REPLACE INTO _meta (key, value) VALUES ('embedding_dim', ?1)",
                    [embedding.len().to_string()],
                )?;
                Ok(())
            }
        }
    }

    // ========================================================================
    // NEURONS
    // ========================================================================

    fn validate_neuron_input(input: &NeuronInput) -> Result<()> {
        if input.start_line > input.end_line {
            return Err(BrainError::InvalidArgument(format!(
                "Line span {}..{} is inverted for {}",
                input.start_line, input.end_line, input.file_path
            )));
        }
        input
            .kind
            .parse::<crate::graph::NeuronKind>()
            .map_err(BrainError::InvalidArgument)?;
        Ok(())
    }

    fn insert_neuron(conn: &Connection, input: &NeuronInput, now: DateTime<Utc>) -> Result<Neuron> {
        Self::check_embedding(conn, &input.embedding)?;
        let id = Uuid::new_v4().to_string();
        let blob = if input.embedding.is_empty() {
            None
        } else {
            Some(embedding_to_blob(&input.embedding))
        };

        conn.execute(
            "INSERT INTO neurons (
                id, content, summary, embedding, file_path, start_line, end_line,
                type, name, language, activation_count, last_activated, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11, ?12)",
            params![
                id,
                input.content,
                input.summary,
                blob,
                input.file_path,
                input.start_line,
                input.end_line,
                input.kind,
                input.name,
                input.language,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Neuron {
            id,
            content: input.content.clone(),
            summary: input.summary.clone(),
            embedding: input.embedding.clone(),
            file_path: input.file_path.clone(),
            start_line: input.start_line,
            end_line: input.end_line,
            kind: input.kind.clone(),
            name: input.name.clone(),
            language: input.language.clone(),
            activation_count: 0,
            last_activated: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a single neuron, assigning its id and timestamps
    pub fn create_neuron(&self, input: &NeuronInput) -> Result<Neuron> {
        Self::validate_neuron_input(input)?;
        let writer = self.write()?;
        Self::insert_neuron(&writer, input, Utc::now())
    }

    /// Create a batch of neurons atomically; all inputs are validated before
    /// any row is written
    pub fn create_neurons_batch(&self, inputs: &[NeuronInput]) -> Result<Vec<String>> {
        for input in inputs {
            Self::validate_neuron_input(input)?;
        }
        let now = Utc::now();
        let writer = self.write()?;
        let tx = writer.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            ids.push(Self::insert_neuron(&tx, input, now)?.id);
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Get a neuron by id
    pub fn get_neuron(&self, id: &str) -> Result<Option<Neuron>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare("SELECT * FROM neurons WHERE id = ?1")?;
        let neuron = stmt
            .query_row(params![id], |row| Self::row_to_neuron(row))
            .optional()?;
        Ok(neuron)
    }

    /// Get all neurons in a file, ordered by start line
    pub fn get_neurons_by_file(&self, path: &str) -> Result<Vec<Neuron>> {
        self.query_neurons(
            "SELECT * FROM neurons WHERE file_path = ?1 ORDER BY start_line ASC",
            params![path],
        )
    }

    /// Get every neuron, ordered by file path then start line
    pub fn get_all_neurons(&self) -> Result<Vec<Neuron>> {
        self.query_neurons(
            "SELECT * FROM neurons ORDER BY file_path ASC, start_line ASC",
            params![],
        )
    }

    /// Get neurons of one kind
    pub fn get_neurons_by_kind(&self, kind: crate::graph::NeuronKind) -> Result<Vec<Neuron>> {
        self.query_neurons(
            "SELECT * FROM neurons WHERE type = ?1 ORDER BY file_path ASC, start_line ASC",
            params![kind.as_str()],
        )
    }

    /// Get neurons by symbol name
    pub fn get_neurons_by_name(&self, name: &str) -> Result<Vec<Neuron>> {
        self.query_neurons(
            "SELECT * FROM neurons WHERE name = ?1 ORDER BY file_path ASC, start_line ASC",
            params![name],
        )
    }

    fn query_neurons(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Neuron>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare(sql)?;
        let rows = stmt.query_map(args, |row| Self::row_to_neuron(row))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Delete every neuron in a file; synapses touching them cascade away
    pub fn delete_neurons_by_file(&self, path: &str) -> Result<usize> {
        let writer = self.write()?;
        let rows = writer.execute("DELETE FROM neurons WHERE file_path = ?1", params![path])?;
        Ok(rows)
    }

    /// Atomically bump a neuron's activation count and touch its timestamps
    pub fn increment_activation(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let writer = self.write()?;
        let rows = writer.execute(
            "UPDATE neurons SET
                activation_count = activation_count + 1,
                last_activated = ?1,
                updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;
        if rows == 0 {
            return Err(BrainError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// All embedded neurons as `(id, vector)` pairs, for the vector index
    pub fn load_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare(
            "SELECT id, embedding FROM neurons
             WHERE embedding IS NOT NULL AND length(embedding) > 0
             ORDER BY id ASC",
        )?;
        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|(id, bytes)| blob_to_embedding(&bytes).map(|v| (id, v)))
            .collect())
    }

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    fn parse_opt_timestamp(value: Option<String>, field_name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
        value
            .map(|v| Self::parse_timestamp(&v, field_name))
            .transpose()
    }

    /// Convert a row to a Neuron
    fn row_to_neuron(row: &rusqlite::Row) -> rusqlite::Result<Neuron> {
        let embedding_bytes: Option<Vec<u8>> = row.get("embedding")?;
        let embedding = match embedding_bytes {
            Some(bytes) => blob_to_embedding(&bytes).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "Embedding blob length is not a multiple of 4",
                    )),
                )
            })?,
            None => vec![],
        };

        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let last_activated: Option<String> = row.get("last_activated")?;

        Ok(Neuron {
            id: row.get("id")?,
            content: row.get("content")?,
            summary: row.get("summary")?,
            embedding,
            file_path: row.get("file_path")?,
            start_line: row.get("start_line")?,
            end_line: row.get("end_line")?,
            kind: row.get("type")?,
            name: row.get("name")?,
            language: row.get("language")?,
            activation_count: row.get("activation_count")?,
            last_activated: Self::parse_opt_timestamp(last_activated, "last_activated")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
        })
    }

    // ========================================================================
    // SYNAPSES
    // ========================================================================

    fn validate_synapse_input(input: &SynapseInput) -> Result<()> {
        if input.source_id == input.target_id {
            return Err(BrainError::InvalidArgument(format!(
                "Self-referential synapse on {}",
                input.source_id
            )));
        }
        if !(0.0..=1.0).contains(&input.weight) {
            return Err(BrainError::InvalidArgument(format!(
                "Synapse weight {} is outside [0, 1]",
                input.weight
            )));
        }
        input
            .kind
            .parse::<SynapseKind>()
            .map_err(BrainError::InvalidArgument)?;
        Ok(())
    }

    /// Strict insert: maps a unique-key violation to `Conflict` and an
    /// unknown endpoint to `NotFound`
    fn insert_synapse(conn: &Connection, input: &SynapseInput, now: DateTime<Utc>) -> Result<Synapse> {
        let id = Uuid::new_v4().to_string();
        let metadata = input
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "null".to_string()));

        let inserted = conn.execute(
            "INSERT INTO synapses (
                id, source_id, target_id, weight, type, metadata, fire_count, last_fired, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)",
            params![
                id,
                input.source_id,
                input.target_id,
                input.weight,
                input.kind,
                metadata,
                now.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(Synapse {
                id,
                source_id: input.source_id.clone(),
                target_id: input.target_id.clone(),
                weight: input.weight,
                kind: input.kind.clone(),
                metadata: input.metadata.clone(),
                fire_count: 0,
                last_fired: None,
                created_at: now,
            }),
            Err(e) if is_unique_violation(&e) => Err(BrainError::Conflict {
                source_id: input.source_id.clone(),
                target_id: input.target_id.clone(),
                kind: input.kind.clone(),
            }),
            Err(e) if is_foreign_key_violation(&e) => Err(BrainError::NotFound(format!(
                "Synapse endpoint {} or {}",
                input.source_id, input.target_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a synapse, insert-if-absent on `(source, target, type)`.
    /// A duplicate returns the existing row untouched, not an upsert.
    pub fn create_synapse(&self, input: &SynapseInput) -> Result<Synapse> {
        Self::validate_synapse_input(input)?;
        let writer = self.write()?;
        match Self::insert_synapse(&writer, input, Utc::now()) {
            Err(BrainError::Conflict { .. }) => {
                let existing = Self::find_synapse(&writer, &input.source_id, &input.target_id, &input.kind)?;
                existing.ok_or_else(|| BrainError::NotFound(input.source_id.clone()))
            }
            other => other,
        }
    }

    /// Create a batch of synapses atomically; duplicates are silently
    /// skipped, any other failure rolls the whole batch back. Returns the
    /// number of rows actually inserted.
    pub fn create_synapses_batch(&self, inputs: &[SynapseInput]) -> Result<usize> {
        for input in inputs {
            Self::validate_synapse_input(input)?;
        }
        let now = Utc::now();
        let writer = self.write()?;
        let tx = writer.unchecked_transaction()?;
        let mut inserted = 0;
        for input in inputs {
            match Self::insert_synapse(&tx, input, now) {
                Ok(_) => inserted += 1,
                Err(BrainError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn find_synapse(
        conn: &Connection,
        source_id: &str,
        target_id: &str,
        kind: &str,
    ) -> Result<Option<Synapse>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM synapses WHERE source_id = ?1 AND target_id = ?2 AND type = ?3",
        )?;
        let synapse = stmt
            .query_row(params![source_id, target_id, kind], |row| {
                Self::row_to_synapse(row)
            })
            .optional()?;
        Ok(synapse)
    }

    /// Look up one synapse by its unique key
    pub fn get_synapse_between(
        &self,
        source_id: &str,
        target_id: &str,
        kind: SynapseKind,
    ) -> Result<Option<Synapse>> {
        let reader = self.read()?;
        Self::find_synapse(&reader, source_id, target_id, kind.as_str())
    }

    /// Get a synapse by id
    pub fn get_synapse(&self, id: &str) -> Result<Option<Synapse>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare("SELECT * FROM synapses WHERE id = ?1")?;
        let synapse = stmt
            .query_row(params![id], |row| Self::row_to_synapse(row))
            .optional()?;
        Ok(synapse)
    }

    /// Outgoing synapses of a neuron, strongest first
    pub fn get_outgoing(&self, neuron_id: &str) -> Result<Vec<Synapse>> {
        self.query_synapses(
            "SELECT * FROM synapses WHERE source_id = ?1 ORDER BY weight DESC, target_id ASC",
            params![neuron_id],
        )
    }

    /// Incoming synapses of a neuron, strongest first
    pub fn get_incoming(&self, neuron_id: &str) -> Result<Vec<Synapse>> {
        self.query_synapses(
            "SELECT * FROM synapses WHERE target_id = ?1 ORDER BY weight DESC, source_id ASC",
            params![neuron_id],
        )
    }

    /// All synapses touching a neuron in either direction, strongest first
    pub fn get_connected(&self, neuron_id: &str) -> Result<Vec<Synapse>> {
        self.query_synapses(
            "SELECT * FROM synapses WHERE source_id = ?1 OR target_id = ?1
             ORDER BY weight DESC, id ASC",
            params![neuron_id],
        )
    }

    /// Outgoing edges as `(target_id, weight)` pairs, the walker's view
    pub fn outgoing_weights(&self, neuron_id: &str) -> Result<Vec<(String, f64)>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare(
            "SELECT target_id, weight FROM synapses WHERE source_id = ?1
             ORDER BY weight DESC, target_id ASC",
        )?;
        let rows = stmt.query_map(params![neuron_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn query_synapses(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Synapse>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare(sql)?;
        let rows = stmt.query_map(args, |row| Self::row_to_synapse(row))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Adjust the weight of the synapse(s) between two neurons, clamped to
    /// `[0, 1]`. A positive delta also bumps `fire_count` and `last_fired`.
    /// With `kind = None` every kind between the pair is adjusted. Returns
    /// the number of rows changed.
    ///
    /// Weights are quantized to 12 decimals so that repeated fixed-delta
    /// updates land on exact decimals and saturate at exactly 1.0.
    pub fn adjust_weight(
        &self,
        source_id: &str,
        target_id: &str,
        kind: Option<SynapseKind>,
        delta: f64,
    ) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let writer = self.write()?;
        let rows = match (kind, delta > 0.0) {
            (Some(k), true) => writer.execute(
                "UPDATE synapses SET
                    weight = MIN(1.0, MAX(0.0, ROUND(weight + ?1, 12))),
                    fire_count = fire_count + 1,
                    last_fired = ?2
                 WHERE source_id = ?3 AND target_id = ?4 AND type = ?5",
                params![delta, now, source_id, target_id, k.as_str()],
            )?,
            (Some(k), false) => writer.execute(
                "UPDATE synapses SET weight = MIN(1.0, MAX(0.0, ROUND(weight + ?1, 12)))
                 WHERE source_id = ?2 AND target_id = ?3 AND type = ?4",
                params![delta, source_id, target_id, k.as_str()],
            )?,
            (None, true) => writer.execute(
                "UPDATE synapses SET
                    weight = MIN(1.0, MAX(0.0, ROUND(weight + ?1, 12))),
                    fire_count = fire_count + 1,
                    last_fired = ?2
                 WHERE source_id = ?3 AND target_id = ?4",
                params![delta, now, source_id, target_id],
            )?,
            (None, false) => writer.execute(
                "UPDATE synapses SET weight = MIN(1.0, MAX(0.0, ROUND(weight + ?1, 12)))
                 WHERE source_id = ?2 AND target_id = ?3",
                params![delta, source_id, target_id],
            )?,
        };
        Ok(rows)
    }

    /// Upsert a full synapse record, preserving caller-provided timestamps
    /// and counters. Intended for import/restore tooling; normal ingestion
    /// goes through `create_synapse`.
    pub fn put_synapse(&self, synapse: &Synapse) -> Result<()> {
        if synapse.source_id == synapse.target_id {
            return Err(BrainError::InvalidArgument(format!(
                "Self-referential synapse on {}",
                synapse.source_id
            )));
        }
        if !(0.0..=1.0).contains(&synapse.weight) {
            return Err(BrainError::InvalidArgument(format!(
                "Synapse weight {} is outside [0, 1]",
                synapse.weight
            )));
        }
        let metadata = synapse
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "null".to_string()));
        let writer = self.write()?;
        writer.execute(
            "INSERT OR REPLACE INTO synapses (
                id, source_id, target_id, weight, type, metadata, fire_count, last_fired, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                synapse.id,
                synapse.source_id,
                synapse.target_id,
                synapse.weight,
                synapse.kind,
                metadata,
                synapse.fire_count,
                synapse.last_fired.map(|dt| dt.to_rfc3339()),
                synapse.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Count synapses of one kind
    pub fn count_synapses_by_kind(&self, kind: SynapseKind) -> Result<i64> {
        let reader = self.read()?;
        let count = reader.query_row(
            "SELECT COUNT(*) FROM synapses WHERE type = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Ids of co-activation synapses whose last activity (fire, else
    /// creation) is older than `days_old` days, by Julian-day arithmetic
    pub fn stale_co_activation_ids(&self, days_old: u32) -> Result<Vec<String>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare(
            "SELECT id FROM synapses
             WHERE type = 'co_activation'
               AND julianday('now') - julianday(COALESCE(last_fired, created_at)) > ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![days_old as f64], |row| row.get(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Decrement the weight of the given synapses by `delta`, clamped at 0.
    /// Returns the number of rows changed.
    pub fn decay_synapses(&self, ids: &[String], delta: f64) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let writer = self.write()?;
        let tx = writer.unchecked_transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE synapses SET weight = MAX(0.0, ROUND(weight - ?1, 12)) WHERE id = ?2",
            )?;
            for id in ids {
                changed += stmt.execute(params![delta, id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Delete co-activation synapses with weight at or below `floor`.
    /// Structural kinds are never touched. Returns the number deleted.
    pub fn prune_co_activation(&self, floor: f64) -> Result<usize> {
        let writer = self.write()?;
        let rows = writer.execute(
            "DELETE FROM synapses WHERE type = 'co_activation' AND weight <= ?1",
            params![floor],
        )?;
        Ok(rows)
    }

    /// Convert a row to a Synapse
    fn row_to_synapse(row: &rusqlite::Row) -> rusqlite::Result<Synapse> {
        let metadata_json: Option<String> = row.get("metadata")?;
        let metadata = metadata_json.and_then(|m| serde_json::from_str(&m).ok());

        let created_at: String = row.get("created_at")?;
        let last_fired: Option<String> = row.get("last_fired")?;

        Ok(Synapse {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            target_id: row.get("target_id")?,
            weight: row.get("weight")?,
            kind: row.get("type")?,
            metadata,
            fire_count: row.get("fire_count")?,
            last_fired: Self::parse_opt_timestamp(last_fired, "last_fired")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
        })
    }

    // ========================================================================
    // INDEXED-FILE MANIFEST
    // ========================================================================

    /// Insert or replace a manifest entry, stamping `last_indexed` to now
    pub fn upsert_indexed_file(
        &self,
        path: &str,
        language: &str,
        neuron_count: i64,
        content_hash: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let writer = self.write()?;
        writer.execute(
            "INSERT OR REPLACE INTO indexed_files (path, language, neuron_count, last_indexed, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, language, neuron_count, now, content_hash],
        )?;
        Ok(())
    }

    /// Get a manifest entry
    pub fn get_indexed_file(&self, path: &str) -> Result<Option<IndexedFile>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare("SELECT * FROM indexed_files WHERE path = ?1")?;
        let file = stmt
            .query_row(params![path], |row| Self::row_to_indexed_file(row))
            .optional()?;
        Ok(file)
    }

    /// Remove a manifest entry
    pub fn delete_indexed_file(&self, path: &str) -> Result<bool> {
        let writer = self.write()?;
        let rows = writer.execute("DELETE FROM indexed_files WHERE path = ?1", params![path])?;
        Ok(rows > 0)
    }

    /// All manifest entries, ordered by path
    pub fn list_indexed_files(&self) -> Result<Vec<IndexedFile>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare("SELECT * FROM indexed_files ORDER BY path ASC")?;
        let rows = stmt.query_map([], |row| Self::row_to_indexed_file(row))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Whether a file's content hash differs from the manifest (unknown
    /// files always need indexing)
    pub fn needs_reindex(&self, path: &str, content_hash: &str) -> Result<bool> {
        Ok(self
            .get_indexed_file(path)?
            .map(|f| f.content_hash != content_hash)
            .unwrap_or(true))
    }

    fn row_to_indexed_file(row: &rusqlite::Row) -> rusqlite::Result<IndexedFile> {
        let last_indexed: String = row.get("last_indexed")?;
        Ok(IndexedFile {
            path: row.get("path")?,
            language: row.get("language")?,
            neuron_count: row.get("neuron_count")?,
            last_indexed: Self::parse_timestamp(&last_indexed, "last_indexed")?,
            content_hash: row.get("content_hash")?,
        })
    }

    // ========================================================================
    // QUERY LOG
    // ========================================================================

    /// Record a query and the ids it activated; returns the log row id
    pub fn log_query(
        &self,
        query: &str,
        activated_ids: &[String],
        used_ids: Option<&[String]>,
    ) -> Result<i64> {
        let activated_json =
            serde_json::to_string(activated_ids).unwrap_or_else(|_| "[]".to_string());
        let used_json = used_ids.map(|ids| serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string()));
        let writer = self.write()?;
        writer.execute(
            "INSERT INTO query_log (query, activated_neuron_ids, used_neuron_ids, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![query, activated_json, used_json, Utc::now().to_rfc3339()],
        )?;
        Ok(writer.last_insert_rowid())
    }

    /// Record which activated neurons were actually used
    pub fn update_query_used(&self, query_id: i64, used_ids: &[String]) -> Result<()> {
        let used_json = serde_json::to_string(used_ids).unwrap_or_else(|_| "[]".to_string());
        let writer = self.write()?;
        let rows = writer.execute(
            "UPDATE query_log SET used_neuron_ids = ?1 WHERE id = ?2",
            params![used_json, query_id],
        )?;
        if rows == 0 {
            return Err(BrainError::NotFound(format!("Query log entry {}", query_id)));
        }
        Ok(())
    }

    /// Get a query log entry
    pub fn get_query(&self, query_id: i64) -> Result<Option<QueryLogEntry>> {
        let reader = self.read()?;
        let mut stmt = reader.prepare("SELECT * FROM query_log WHERE id = ?1")?;
        let entry = stmt
            .query_row(params![query_id], |row| Self::row_to_query_entry(row))
            .optional()?;
        Ok(entry)
    }

    /// Most recent query log entries, newest first
    pub fn get_recent_queries(&self, limit: i64) -> Result<Vec<QueryLogEntry>> {
        let reader = self.read()?;
        let mut stmt =
            reader.prepare("SELECT * FROM query_log ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| Self::row_to_query_entry(row))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn row_to_query_entry(row: &rusqlite::Row) -> rusqlite::Result<QueryLogEntry> {
        let activated_json: String = row.get("activated_neuron_ids")?;
        let activated: Vec<String> = serde_json::from_str(&activated_json).unwrap_or_default();
        let used_json: Option<String> = row.get("used_neuron_ids")?;
        let used = used_json.and_then(|u| serde_json::from_str(&u).ok());
        let timestamp: String = row.get("timestamp")?;

        Ok(QueryLogEntry {
            id: row.get("id")?,
            query: row.get("query")?,
            activated_neuron_ids: activated,
            used_neuron_ids: used,
            timestamp: Self::parse_timestamp(&timestamp, "timestamp")?,
        })
    }

    // ========================================================================
    // STATS & MAINTENANCE
    // ========================================================================

    /// Aggregate counts over the store
    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self.read()?;

        let neurons: i64 =
            reader.query_row("SELECT COUNT(*) FROM neurons", [], |row| row.get(0))?;
        let synapses: i64 =
            reader.query_row("SELECT COUNT(*) FROM synapses", [], |row| row.get(0))?;
        let indexed_files: i64 =
            reader.query_row("SELECT COUNT(*) FROM indexed_files", [], |row| row.get(0))?;
        let total_queries: i64 =
            reader.query_row("SELECT COUNT(*) FROM query_log", [], |row| row.get(0))?;

        let mut stmt = reader.prepare(
            "SELECT DISTINCT language FROM indexed_files WHERE language != '' ORDER BY language ASC",
        )?;
        let languages: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        let last_indexed: Option<String> = reader
            .query_row("SELECT MAX(last_indexed) FROM indexed_files", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        let last_indexed = last_indexed.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(StoreStats {
            neurons,
            synapses,
            indexed_files,
            languages,
            last_indexed,
            total_queries,
        })
    }

    /// Delete everything: query log, synapses, neurons, manifest, and the
    /// learned embedding dimension. The schema itself stays.
    pub fn clear_all(&self) -> Result<()> {
        let writer = self.write()?;
        let tx = writer.unchecked_transaction()?;
        tx.execute("DELETE FROM query_log", [])?;
        tx.execute("DELETE FROM synapses", [])?;
        tx.execute("DELETE FROM neurons", [])?;
        tx.execute("DELETE FROM indexed_files", [])?;
        tx.execute("DELETE FROM _meta WHERE key = 'embedding_dim'", [])?;
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
