//! Neuron - a semantic code chunk
//!
//! Each neuron represents one extracted chunk of source code with:
//! - Content, one-line summary, and an optional embedding vector
//! - Location (file path + inclusive line span)
//! - Classification (kind, name, language)
//! - Activation bookkeeping updated by the retrieval engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// NEURON KINDS
// ============================================================================

/// Kinds of code chunks a neuron can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeuronKind {
    /// A free function
    #[default]
    Function,
    /// A class definition
    Class,
    /// A method on a class or type
    Method,
    /// A type definition (struct, enum, alias)
    Type,
    /// An interface or trait
    Interface,
    /// A module or namespace
    Module,
    /// Configuration (build files, manifests)
    Config,
    /// Documentation chunk
    Doc,
    /// A variable or constant binding
    Variable,
    /// An export or re-export statement
    Export,
}

impl NeuronKind {
    /// String representation used in the database `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            NeuronKind::Function => "function",
            NeuronKind::Class => "class",
            NeuronKind::Method => "method",
            NeuronKind::Type => "type",
            NeuronKind::Interface => "interface",
            NeuronKind::Module => "module",
            NeuronKind::Config => "config",
            NeuronKind::Doc => "doc",
            NeuronKind::Variable => "variable",
            NeuronKind::Export => "export",
        }
    }
}

impl std::fmt::Display for NeuronKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NeuronKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "function" => Ok(NeuronKind::Function),
            "class" => Ok(NeuronKind::Class),
            "method" => Ok(NeuronKind::Method),
            "type" => Ok(NeuronKind::Type),
            "interface" => Ok(NeuronKind::Interface),
            "module" => Ok(NeuronKind::Module),
            "config" => Ok(NeuronKind::Config),
            "doc" => Ok(NeuronKind::Doc),
            "variable" => Ok(NeuronKind::Variable),
            "export" => Ok(NeuronKind::Export),
            _ => Err(format!("Unknown neuron kind: {}", s)),
        }
    }
}

// ============================================================================
// NEURON
// ============================================================================

/// A neuron in the code graph
///
/// Created by the external indexer, replaced wholesale when its file is
/// reindexed, and destroyed when the file leaves the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neuron {
    /// Unique identifier (UUID v4), stable across sessions
    pub id: String,
    /// Raw source text of the chunk
    pub content: String,
    /// One-line summary
    pub summary: String,
    /// Dense embedding vector; empty means "no embedding"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// File path relative to the project root
    pub file_path: String,
    /// First line of the chunk (inclusive)
    pub start_line: u32,
    /// Last line of the chunk (inclusive)
    pub end_line: u32,
    /// Chunk kind, one of the `NeuronKind` names
    pub kind: String,
    /// Free-form symbol name
    pub name: String,
    /// Source language
    pub language: String,
    /// How many times this neuron was accepted into a query result
    pub activation_count: i64,
    /// When this neuron was last accepted into a query result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activated: Option<DateTime<Utc>>,
    /// When the neuron was created
    pub created_at: DateTime<Utc>,
    /// When the neuron was last modified
    pub updated_at: DateTime<Utc>,
}

impl Neuron {
    /// Parsed chunk kind (unknown strings fall back to the default)
    pub fn kind(&self) -> NeuronKind {
        self.kind.parse().unwrap_or_default()
    }

    /// Whether this neuron carries an embedding
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Number of source lines covered by the chunk
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for creating a neuron; ids and timestamps are assigned by the store.
///
/// Uses `deny_unknown_fields` to reject malformed indexer payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NeuronInput {
    /// Raw source text
    pub content: String,
    /// One-line summary
    #[serde(default)]
    pub summary: String,
    /// Embedding vector; empty for unembedded chunks
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// File path relative to the project root
    pub file_path: String,
    /// First line (inclusive)
    pub start_line: u32,
    /// Last line (inclusive)
    pub end_line: u32,
    /// Chunk kind name
    pub kind: String,
    /// Symbol name
    #[serde(default)]
    pub name: String,
    /// Source language
    #[serde(default)]
    pub language: String,
}

impl Default for NeuronInput {
    fn default() -> Self {
        Self {
            content: String::new(),
            summary: String::new(),
            embedding: vec![],
            file_path: String::new(),
            start_line: 1,
            end_line: 1,
            kind: NeuronKind::Function.as_str().to_string(),
            name: String::new(),
            language: String::new(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in [
            NeuronKind::Function,
            NeuronKind::Class,
            NeuronKind::Method,
            NeuronKind::Type,
            NeuronKind::Interface,
            NeuronKind::Module,
            NeuronKind::Config,
            NeuronKind::Doc,
            NeuronKind::Variable,
            NeuronKind::Export,
        ] {
            assert_eq!(kind.as_str().parse::<NeuronKind>().unwrap(), kind);
        }
    }

    #[test]
    fn kind_rejects_unknown() {
        assert!("lambda".parse::<NeuronKind>().is_err());
    }

    #[test]
    fn input_denies_unknown_fields() {
        let json = r#"{"content": "fn a() {}", "filePath": "src/a.rs", "startLine": 1, "endLine": 3, "kind": "function"}"#;
        assert!(serde_json::from_str::<NeuronInput>(json).is_ok());

        let bad = r#"{"content": "x", "filePath": "a.rs", "startLine": 1, "endLine": 1, "kind": "function", "extra": true}"#;
        assert!(serde_json::from_str::<NeuronInput>(bad).is_err());
    }

    #[test]
    fn line_count_is_inclusive() {
        let neuron = Neuron {
            id: "n".into(),
            content: String::new(),
            summary: String::new(),
            embedding: vec![],
            file_path: "a.rs".into(),
            start_line: 10,
            end_line: 12,
            kind: "function".into(),
            name: String::new(),
            language: "rust".into(),
            activation_count: 0,
            last_activated: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(neuron.line_count(), 3);
        assert!(!neuron.has_embedding());
    }
}
