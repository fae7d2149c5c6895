//! # neuralRAG Core
//!
//! Local code-retrieval engine that represents a source tree as a weighted
//! directed graph: semantic chunks ("neurons") connected by structural and
//! learned relations ("synapses"). Queries combine vector similarity with
//! spreading activation, and the graph adapts over time through
//! Hebbian-style weight updates driven by query outcomes.
//!
//! - **Store**: durable SQLite graph (WAL, cascading deletes, versioned
//!   schema) at `<project_root>/.neuralrag/brain.db`
//! - **Vector index**: exact cosine top-k over neuron embeddings, rebuilt
//!   lazily and invalidated on every neuron mutation
//! - **Spreading activation**: bounded best-first traversal propagating
//!   `score * weight * decay_factor` along outgoing synapses
//! - **Hebbian learning**: co-activation synapses synthesized at 0.3,
//!   strengthened by 0.05 on co-occurrence and reported use, decayed when
//!   stale, pruned at the floor
//!
//! Chunking, AST extraction, and embedding computation are external
//! collaborators: the indexer feeds neuron/synapse batches keyed by file
//! path, and the embedder turns query text into vectors.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neuralrag_core::{Brain, NeuronInput, QueryConfig};
//!
//! let brain = Brain::open("/path/to/project")?;
//!
//! // Indexer side: feed chunks (ids come back in input order)
//! let ids = brain.reindex_file("src/lib.rs", "rust", content_hash, &chunks)?;
//!
//! // Query side: embed the question externally, then retrieve
//! let outcome = brain.query("where is the config parsed?", &embedding, &QueryConfig::default())?;
//! for result in &outcome.results {
//!     println!("{} (score {:.2}, depth {})", result.neuron.name, result.score, result.depth);
//! }
//!
//! // Close the loop: what was actually useful?
//! brain.report_used(outcome.query_id, &used_ids)?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod activation;
pub mod graph;
pub mod learning;
pub mod retrieval;
pub mod search;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Graph types
pub use graph::{
    IndexedFile, Neuron, NeuronInput, NeuronKind, QueryLogEntry, StoreStats, Synapse,
    SynapseInput, SynapseKind,
};

// Storage layer
pub use storage::{
    blob_to_embedding, embedding_to_blob, BrainError, Result, Store, SCHEMA_VERSION, STORE_DIR,
    STORE_FILE,
};

// Search
pub use search::{cosine_similarity, VectorIndex, VectorIndexError, VectorIndexStats};

// Spreading activation
pub use activation::{
    average_depth, spread_activation, Activation, EdgeSource, WalkConfig, WalkOutcome,
};

// Retrieval engine
pub use retrieval::{ActivationResult, Brain, BrainStats, QueryConfig, QueryOutcome};

// Hebbian learning
pub use learning::{
    Learner, COACTIVATION_INITIAL_WEIGHT, DECAY_BATCH_SIZE, REINFORCE_DELTA,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ActivationResult, Brain, BrainError, BrainStats, Learner, Neuron, NeuronInput,
        NeuronKind, QueryConfig, QueryOutcome, Result, Store, Synapse, SynapseInput, SynapseKind,
        WalkConfig,
    };
}
