//! Synapse - a weighted directed edge between two neurons

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SYNAPSE KINDS
// ============================================================================

/// Relation kinds connecting neurons
///
/// Structural kinds are produced by the indexer; `co_activation` is the only
/// kind the learner synthesizes, strengthens, decays, or prunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynapseKind {
    /// Source imports the target's file or symbol
    Imports,
    /// Source calls into the target
    Calls,
    /// Source references the target's type
    TypeReference,
    /// Source extends or implements the target
    Extends,
    /// Source and target are adjacent in the same file
    Proximity,
    /// Synthesized because both endpoints appeared in one query result
    CoActivation,
    /// Semantic association
    #[default]
    Semantic,
}

impl SynapseKind {
    /// String representation used in the database `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            SynapseKind::Imports => "imports",
            SynapseKind::Calls => "calls",
            SynapseKind::TypeReference => "type_reference",
            SynapseKind::Extends => "extends",
            SynapseKind::Proximity => "proximity",
            SynapseKind::CoActivation => "co_activation",
            SynapseKind::Semantic => "semantic",
        }
    }

    /// Structural kinds come from the indexer and are never touched by the
    /// learner; they disappear only through file-reindex cascades.
    pub fn is_structural(&self) -> bool {
        !matches!(self, SynapseKind::CoActivation)
    }
}

impl std::fmt::Display for SynapseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SynapseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "imports" => Ok(SynapseKind::Imports),
            "calls" => Ok(SynapseKind::Calls),
            "type_reference" => Ok(SynapseKind::TypeReference),
            "extends" => Ok(SynapseKind::Extends),
            "proximity" => Ok(SynapseKind::Proximity),
            "co_activation" => Ok(SynapseKind::CoActivation),
            "semantic" => Ok(SynapseKind::Semantic),
            _ => Err(format!("Unknown synapse kind: {}", s)),
        }
    }
}

// ============================================================================
// SYNAPSE
// ============================================================================

/// A directed weighted edge in the code graph
///
/// Invariants enforced by the store: `weight` stays in `[0, 1]` under all
/// updates, `source_id != target_id`, and at most one synapse exists per
/// `(source_id, target_id, kind)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synapse {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Origin neuron; deletion cascades to this edge
    pub source_id: String,
    /// Destination neuron; deletion cascades to this edge
    pub target_id: String,
    /// Connection strength in `[0, 1]`
    pub weight: f64,
    /// Relation kind, one of the `SynapseKind` names
    pub kind: String,
    /// Open-ended structured payload (e.g. an import path); unknown keys
    /// round-trip unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// How many times this edge carried activation or was strengthened
    pub fire_count: i64,
    /// When the edge last fired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired: Option<DateTime<Utc>>,
    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

impl Synapse {
    /// Parsed relation kind (unknown strings fall back to the default)
    pub fn kind(&self) -> SynapseKind {
        self.kind.parse().unwrap_or_default()
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a synapse; the id and timestamp are assigned by the
/// store. Inserting an edge that already exists on the unique key is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SynapseInput {
    /// Origin neuron id
    pub source_id: String,
    /// Destination neuron id
    pub target_id: String,
    /// Initial weight in `[0, 1]`
    pub weight: f64,
    /// Relation kind name
    pub kind: String,
    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SynapseInput {
    /// Convenience constructor for the common metadata-free case
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: SynapseKind,
        weight: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            weight,
            kind: kind.as_str().to_string(),
            metadata: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
