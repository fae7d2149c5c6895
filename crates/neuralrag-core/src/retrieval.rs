//! Brain - the retrieval facade
//!
//! Composes the store, the vector index, the spreading-activation walker,
//! and the learner into the query path: vector similarity selects entry
//! neurons, activation spreads across synapses, accepted neurons get their
//! activation bookkeeping, co-activation edges are synthesized among the
//! result set, and the query is logged.

use std::sync::Mutex;
use std::time::Instant;

use crate::activation::{average_depth, spread_activation, WalkConfig};
use crate::graph::{Neuron, NeuronInput, StoreStats, SynapseInput};
use crate::learning::Learner;
use crate::search::VectorIndex;
use crate::storage::{BrainError, Result, Store};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for one retrieval query
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How many entry neurons to seed from vector similarity
    pub entry_count: usize,
    /// Maximum accepted neurons
    pub max_neurons: usize,
    /// Geometric decay per hop
    pub decay_factor: f64,
    /// Propagation cutoff
    pub min_activation: f64,
    /// Optional similarity floor for entry selection
    pub min_similarity: Option<f32>,
    /// Optional deadline; expiry mid-walk yields a partial result
    pub deadline: Option<Instant>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            entry_count: 3,
            max_neurons: 15,
            decay_factor: 0.7,
            min_activation: 0.1,
            min_similarity: None,
            deadline: None,
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// One accepted neuron in a query result
#[derive(Debug, Clone)]
pub struct ActivationResult {
    /// The accepted neuron
    pub neuron: Neuron,
    /// Activation score
    pub score: f64,
    /// Hops from the entry neuron
    pub depth: u32,
    /// Neuron ids from the entry to this node, inclusive
    pub path: Vec<String>,
}

/// Outcome of one query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Query-log row id, for a later `report_used`
    pub query_id: i64,
    /// Accepted neurons, ranked by score descending
    pub results: Vec<ActivationResult>,
    /// True when a deadline cut the walk short
    pub partial: bool,
    /// Mean depth over this query's results
    pub avg_depth: f64,
}

/// Store stats plus engine-level retrieval metrics
#[derive(Debug, Clone)]
pub struct BrainStats {
    /// Aggregate store counts
    pub store: StoreStats,
    /// Running mean of per-query average activation depth, over the queries
    /// this engine instance served
    pub avg_activation_depth: f64,
}

#[derive(Debug, Default)]
struct DepthAccumulator {
    queries: u64,
    depth_sum: f64,
}

// ============================================================================
// BRAIN
// ============================================================================

/// Retrieval engine over one project's code graph
///
/// The embedding cache for entry selection is owned here and rebuilt lazily
/// from the store; every neuron mutation routed through this facade
/// invalidates it.
pub struct Brain {
    store: Store,
    index: Mutex<Option<VectorIndex>>,
    depths: Mutex<DepthAccumulator>,
}

impl Brain {
    /// Open the brain for a project root (store lives at
    /// `<project_root>/.neuralrag/brain.db`)
    pub fn open(project_root: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            store: Store::open(project_root)?,
            index: Mutex::new(None),
            depths: Mutex::new(DepthAccumulator::default()),
        })
    }

    /// The underlying store, for collaborators that bypass the query path
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A learner over this brain's store
    pub fn learner(&self) -> Learner<'_> {
        Learner::new(&self.store)
    }

    fn invalidate_index(&self) -> Result<()> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| BrainError::Init("Vector index lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }

    fn build_index(store: &Store) -> Result<VectorIndex> {
        let mut index = VectorIndex::new();
        for (id, vector) in store.load_embeddings()? {
            if let Err(e) = index.add(&id, &vector) {
                tracing::warn!("Skipping embedding for {}: {}", id, e);
            }
        }
        Ok(index)
    }

    /// Entry neurons by vector similarity, honoring the optional floor
    fn entry_candidates(
        &self,
        query_embedding: &[f32],
        entry_count: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<(String, f32)>> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| BrainError::Init("Vector index lock poisoned".into()))?;
        if guard.is_none() {
            *guard = Some(Self::build_index(&self.store)?);
        }
        let Some(index) = guard.as_ref() else {
            return Err(BrainError::Init("Vector index unavailable".into()));
        };
        if index.is_empty() {
            return Ok(vec![]);
        }
        let results = match min_similarity {
            Some(floor) => index.top_k_with_threshold(query_embedding, entry_count, floor),
            None => index.top_k(query_embedding, entry_count),
        };
        results.map_err(|e| BrainError::InvalidArgument(e.to_string()))
    }

    /// Run one retrieval query
    ///
    /// The query embedding comes from the external embedder. Accepted
    /// neurons get `increment_activation`, co-activation edges are
    /// synthesized among them (both directions), and the query is logged;
    /// that bookkeeping happens even for a deadline-shortened partial set.
    pub fn query(
        &self,
        text: &str,
        query_embedding: &[f32],
        config: &QueryConfig,
    ) -> Result<QueryOutcome> {
        if let Some(deadline) = config.deadline {
            if Instant::now() >= deadline {
                return Err(BrainError::Cancelled);
            }
        }
        if query_embedding.is_empty() {
            return Err(BrainError::InvalidArgument("Empty query embedding".into()));
        }

        let entries =
            self.entry_candidates(query_embedding, config.entry_count, config.min_similarity)?;

        // Cosine <= 0 cannot seed the open interval (0, 1]; float error
        // above 1 clamps down.
        let seeds: Vec<(String, f64)> = entries
            .into_iter()
            .filter(|(_, similarity)| *similarity > 0.0)
            .map(|(id, similarity)| (id, (similarity as f64).min(1.0)))
            .collect();

        if seeds.is_empty() {
            let query_id = self.store.log_query(text, &[], None)?;
            self.record_depth(0.0)?;
            return Ok(QueryOutcome {
                query_id,
                results: vec![],
                partial: false,
                avg_depth: 0.0,
            });
        }

        let walk_config = WalkConfig {
            max_neurons: config.max_neurons,
            decay_factor: config.decay_factor,
            min_activation: config.min_activation,
        };
        let walk = spread_activation(&self.store, &seeds, &walk_config, config.deadline)?;

        let mut results = Vec::with_capacity(walk.accepted.len());
        for activation in &walk.accepted {
            self.store.increment_activation(&activation.neuron_id)?;
            let neuron = self
                .store
                .get_neuron(&activation.neuron_id)?
                .ok_or_else(|| BrainError::NotFound(activation.neuron_id.clone()))?;
            results.push(ActivationResult {
                neuron,
                score: activation.score,
                depth: activation.depth,
                path: activation.path.clone(),
            });
        }

        // Neurons that fire together wire together. Best-effort: a failed
        // edge update never fails the query.
        let learner = self.learner();
        let accepted_ids: Vec<String> =
            walk.accepted.iter().map(|a| a.neuron_id.clone()).collect();
        for a in &accepted_ids {
            for b in &accepted_ids {
                if a == b {
                    continue;
                }
                if let Err(e) = learner.observe_co_activation(a, b) {
                    tracing::warn!("Co-activation update {} -> {} failed: {}", a, b, e);
                }
            }
        }

        let query_id = self.store.log_query(text, &accepted_ids, None)?;

        let avg_depth = average_depth(&walk.accepted);
        self.record_depth(avg_depth)?;

        Ok(QueryOutcome {
            query_id,
            results,
            partial: walk.partial,
            avg_depth,
        })
    }

    /// Record which neurons from a past query were actually used
    ///
    /// Updates the query-log entry, then strengthens the co-activation edges
    /// among `used_ids` (best-effort, like the query path).
    pub fn report_used(&self, query_id: i64, used_ids: &[String]) -> Result<()> {
        self.store.update_query_used(query_id, used_ids)?;
        if let Err(e) = self.learner().reinforce_use(used_ids) {
            tracing::warn!("Reinforcement for query {} failed: {}", query_id, e);
        }
        Ok(())
    }

    fn record_depth(&self, avg_depth: f64) -> Result<()> {
        let mut depths = self
            .depths
            .lock()
            .map_err(|_| BrainError::Init("Depth stats lock poisoned".into()))?;
        depths.queries += 1;
        depths.depth_sum += avg_depth;
        Ok(())
    }

    // ========================================================================
    // INDEXING PASSTHROUGHS
    // ========================================================================
    // These keep the embedding cache coherent; indexers that talk to the
    // store directly must not be mixed with a live Brain.

    /// Create one neuron and invalidate the embedding cache
    pub fn add_neuron(&self, input: &NeuronInput) -> Result<Neuron> {
        let neuron = self.store.create_neuron(input)?;
        self.invalidate_index()?;
        Ok(neuron)
    }

    /// Create a batch of neurons atomically and invalidate the embedding cache
    pub fn add_neurons(&self, inputs: &[NeuronInput]) -> Result<Vec<String>> {
        let ids = self.store.create_neurons_batch(inputs)?;
        self.invalidate_index()?;
        Ok(ids)
    }

    /// Create a batch of synapses (duplicates skipped); embeddings are
    /// untouched so the cache stays valid
    pub fn add_synapses(&self, inputs: &[SynapseInput]) -> Result<usize> {
        self.store.create_synapses_batch(inputs)
    }

    /// Drop a file's neurons (synapses cascade) and its manifest entry
    pub fn remove_file(&self, path: &str) -> Result<usize> {
        let deleted = self.store.delete_neurons_by_file(path)?;
        self.store.delete_indexed_file(path)?;
        self.invalidate_index()?;
        Ok(deleted)
    }

    /// Incremental reindex of one file: skipped entirely (returning `None`)
    /// when the manifest hash matches, otherwise delete-by-path, batch
    /// insert, and manifest upsert. Synapses for the new neurons follow via
    /// [`add_synapses`](Self::add_synapses) once the indexer has the ids.
    pub fn reindex_file(
        &self,
        path: &str,
        language: &str,
        content_hash: &str,
        neurons: &[NeuronInput],
    ) -> Result<Option<Vec<String>>> {
        if !self.store.needs_reindex(path, content_hash)? {
            return Ok(None);
        }
        for input in neurons {
            if input.file_path != path {
                return Err(BrainError::InvalidArgument(format!(
                    "Neuron for {} in reindex batch for {}",
                    input.file_path, path
                )));
            }
        }
        self.store.delete_neurons_by_file(path)?;
        let ids = self.store.create_neurons_batch(neurons)?;
        self.store
            .upsert_indexed_file(path, language, ids.len() as i64, content_hash)?;
        self.invalidate_index()?;
        Ok(Some(ids))
    }

    /// Delete everything and reset the embedding cache
    pub fn clear(&self) -> Result<()> {
        self.store.clear_all()?;
        self.invalidate_index()
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Store stats plus the engine's running average activation depth
    pub fn stats(&self) -> Result<BrainStats> {
        let store = self.store.stats()?;
        let depths = self
            .depths
            .lock()
            .map_err(|_| BrainError::Init("Depth stats lock poisoned".into()))?;
        let avg_activation_depth = if depths.queries == 0 {
            0.0
        } else {
            depths.depth_sum / depths.queries as f64
        };
        Ok(BrainStats {
            store,
            avg_activation_depth,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
