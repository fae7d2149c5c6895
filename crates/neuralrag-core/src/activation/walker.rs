//! Spreading activation over the synapse graph
//!
//! Bounded best-first traversal: entry neurons seed a priority queue, and
//! activation propagates along outgoing synapses as
//! `score * weight * decay_factor`, cut off below `min_activation` and
//! capped at `max_neurons` accepted nodes. Cycles are handled by the
//! visited-with-best-score map; every neuron is accepted at most once, with
//! its best discovered score and shortest-tying path.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use crate::storage::{BrainError, Result, Store};

// ============================================================================
// EDGE SOURCE
// ============================================================================

/// Supplier of outgoing edges for the walker
///
/// Implemented by [`Store`] for real traversal and by
/// `HashMap<String, Vec<(String, f64)>>` for in-memory graphs in tests and
/// benchmarks. The walker itself does no I/O beyond these calls.
pub trait EdgeSource {
    /// Outgoing edges of a neuron as `(target_id, weight)` pairs
    fn outgoing(&self, neuron_id: &str) -> Result<Vec<(String, f64)>>;
}

impl EdgeSource for Store {
    fn outgoing(&self, neuron_id: &str) -> Result<Vec<(String, f64)>> {
        self.outgoing_weights(neuron_id)
    }
}

impl EdgeSource for HashMap<String, Vec<(String, f64)>> {
    fn outgoing(&self, neuron_id: &str) -> Result<Vec<(String, f64)>> {
        Ok(self.get(neuron_id).cloned().unwrap_or_default())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for one spreading-activation walk
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Maximum accepted neurons
    pub max_neurons: usize,
    /// Geometric decay applied per hop, in `(0, 1)`
    pub decay_factor: f64,
    /// Scores below this are not propagated, in `[0, 1)`
    pub min_activation: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_neurons: 15,
            decay_factor: 0.7,
            min_activation: 0.1,
        }
    }
}

impl WalkConfig {
    fn validate(&self) -> Result<()> {
        if self.max_neurons == 0 {
            return Err(BrainError::InvalidArgument(
                "max_neurons must be positive".into(),
            ));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(BrainError::InvalidArgument(format!(
                "decay_factor {} is outside (0, 1)",
                self.decay_factor
            )));
        }
        if !(0.0..1.0).contains(&self.min_activation) {
            return Err(BrainError::InvalidArgument(format!(
                "min_activation {} is outside [0, 1)",
                self.min_activation
            )));
        }
        Ok(())
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// One accepted neuron with its activation bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Accepted neuron id
    pub neuron_id: String,
    /// Activation score at acceptance
    pub score: f64,
    /// Hops from the entry neuron that reached this node
    pub depth: u32,
    /// Neuron ids from the entry to this node, inclusive of both endpoints
    pub path: Vec<String>,
}

/// Outcome of one walk
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Accepted neurons sorted by score descending (ties: depth, then id)
    pub accepted: Vec<Activation>,
    /// True when the deadline expired before the walk finished
    pub partial: bool,
}

/// Mean depth over accepted results; 0.0 when empty
pub fn average_depth(accepted: &[Activation]) -> f64 {
    if accepted.is_empty() {
        return 0.0;
    }
    accepted.iter().map(|a| a.depth as f64).sum::<f64>() / accepted.len() as f64
}

// ============================================================================
// WALKER
// ============================================================================

/// A frontier candidate; the heap pops the best first
#[derive(Debug, Clone)]
struct Candidate {
    score: f64,
    depth: u32,
    id: String,
    path: Vec<String>,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Run spreading activation from the given entry neurons
///
/// `seeds` are `(neuron_id, score)` pairs with scores in `(0, 1]`. Only
/// outgoing synapses propagate; the graph is directed and the walker does
/// not symmetrize. When `deadline` expires mid-walk, the accepted set so far
/// is returned with `partial = true`.
pub fn spread_activation<E: EdgeSource>(
    edges: &E,
    seeds: &[(String, f64)],
    config: &WalkConfig,
    deadline: Option<Instant>,
) -> Result<WalkOutcome> {
    config.validate()?;
    if seeds.is_empty() {
        return Err(BrainError::InvalidArgument("No entry neurons".into()));
    }
    for (id, score) in seeds {
        if !(*score > 0.0 && *score <= 1.0) {
            return Err(BrainError::InvalidArgument(format!(
                "Entry score {} for {} is outside (0, 1]",
                score, id
            )));
        }
    }

    let mut queue: BinaryHeap<Candidate> = seeds
        .iter()
        .map(|(id, score)| Candidate {
            score: *score,
            depth: 0,
            id: id.clone(),
            path: vec![id.clone()],
        })
        .collect();

    let mut best: HashMap<String, f64> = HashMap::new();
    let mut accepted: Vec<Activation> = Vec::new();
    let mut partial = false;

    while accepted.len() < config.max_neurons {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                partial = true;
                break;
            }
        }
        let Some(candidate) = queue.pop() else {
            break;
        };

        // The heap pops in descending score order, so an id seen here with
        // an equal or higher recorded score has already been accepted.
        if best
            .get(&candidate.id)
            .is_some_and(|&score| score >= candidate.score)
        {
            continue;
        }
        best.insert(candidate.id.clone(), candidate.score);

        for (target, weight) in edges.outgoing(&candidate.id)? {
            let propagated = candidate.score * weight * config.decay_factor;
            if propagated < config.min_activation {
                continue;
            }
            if best.get(&target).is_some_and(|&score| score >= propagated) {
                continue;
            }
            let mut path = candidate.path.clone();
            path.push(target.clone());
            queue.push(Candidate {
                score: propagated,
                depth: candidate.depth + 1,
                id: target,
                path,
            });
        }

        accepted.push(Activation {
            neuron_id: candidate.id,
            score: candidate.score,
            depth: candidate.depth,
            path: candidate.path,
        });
    }

    Ok(WalkOutcome { accepted, partial })
}

// ============================================================================
// TESTS
// ============================================================================
