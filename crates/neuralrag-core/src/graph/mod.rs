//! Graph module - core types of the code graph
//!
//! Neurons are semantic code chunks; synapses are weighted directed
//! relations between them. The manifest and query log round out the
//! persistent model.

mod neuron;
mod synapse;

pub use neuron::{Neuron, NeuronInput, NeuronKind};
pub use synapse::{Synapse, SynapseInput, SynapseKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// INDEXED-FILE MANIFEST
// ============================================================================

/// Manifest entry for an indexed source file
///
/// `content_hash` lets the indexer skip files whose content is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    /// Path relative to the project root
    pub path: String,
    /// Source language
    pub language: String,
    /// How many neurons the last index pass produced for this file
    pub neuron_count: i64,
    /// When the file was last indexed
    pub last_indexed: DateTime<Utc>,
    /// Hash of the file content at index time
    pub content_hash: String,
}

// ============================================================================
// QUERY LOG
// ============================================================================

/// One recorded retrieval query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    /// Row id
    pub id: i64,
    /// Query text
    pub query: String,
    /// Neuron ids returned by retrieval, in ranked order
    pub activated_neuron_ids: Vec<String>,
    /// Subset the caller later reported as actually used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_neuron_ids: Option<Vec<String>>,
    /// When the query ran
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// STATS
// ============================================================================

/// Aggregate counts over the persistent store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Total neurons
    pub neurons: i64,
    /// Total synapses
    pub synapses: i64,
    /// Total manifest entries
    pub indexed_files: i64,
    /// Distinct non-empty languages across the manifest
    pub languages: Vec<String>,
    /// Most recent manifest `last_indexed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexed: Option<DateTime<Utc>>,
    /// Total logged queries
    pub total_queries: i64,
}
