//! Hebbian learning over co-activation synapses
//!
//! Neurons that fire together wire together: edges between co-activated
//! neurons are synthesized and strengthened, stale edges decay, and edges
//! at the floor are pruned. Only `co_activation` synapses are ever touched;
//! structural synapses belong to the indexer and disappear only through
//! file-reindex cascades.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::graph::{SynapseInput, SynapseKind};
use crate::storage::{Result, Store};

/// Initial weight of a freshly synthesized co-activation synapse
pub const COACTIVATION_INITIAL_WEIGHT: f64 = 0.3;

/// Weight added when an existing co-activation synapse is strengthened
pub const REINFORCE_DELTA: f64 = 0.05;

/// Synapses mutated per decay batch; the stop flag is checked between batches
pub const DECAY_BATCH_SIZE: usize = 256;

/// Edge mutator driven by query outcomes
pub struct Learner<'a> {
    store: &'a Store,
}

impl<'a> Learner<'a> {
    /// Create a learner over a store
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Record that two distinct neurons appeared together in a query result.
    ///
    /// Strengthens the existing `(a, b, co_activation)` synapse by
    /// [`REINFORCE_DELTA`], clamped at 1.0; creates it at
    /// [`COACTIVATION_INITIAL_WEIGHT`] when absent. The retrieval engine
    /// calls this for every ordered pair, so both directions get wired.
    pub fn observe_co_activation(&self, a: &str, b: &str) -> Result<()> {
        let strengthened =
            self.store
                .adjust_weight(a, b, Some(SynapseKind::CoActivation), REINFORCE_DELTA)?;
        if strengthened == 0 {
            self.store.create_synapse(&SynapseInput::new(
                a,
                b,
                SynapseKind::CoActivation,
                COACTIVATION_INITIAL_WEIGHT,
            ))?;
        }
        Ok(())
    }

    /// Strengthen co-activation synapses among neurons a caller reported as
    /// actually used. Unlike [`observe_co_activation`](Self::observe_co_activation)
    /// this never creates new edges. Returns the number strengthened.
    pub fn reinforce_use(&self, ids: &[String]) -> Result<usize> {
        let mut strengthened = 0;
        for a in ids {
            for b in ids {
                if a == b {
                    continue;
                }
                strengthened += self.store.adjust_weight(
                    a,
                    b,
                    Some(SynapseKind::CoActivation),
                    REINFORCE_DELTA,
                )?;
            }
        }
        Ok(strengthened)
    }

    /// Decay co-activation synapses whose last activity is older than
    /// `days_old` days (Julian-day arithmetic) by `delta`, clamped at 0.
    ///
    /// Runs in batches of [`DECAY_BATCH_SIZE`]; when `stop` is set the job
    /// returns between batches with the count mutated so far.
    pub fn decay(&self, days_old: u32, delta: f64, stop: Option<&AtomicBool>) -> Result<usize> {
        let stale = self.store.stale_co_activation_ids(days_old)?;
        let mut mutated = 0;
        for batch in stale.chunks(DECAY_BATCH_SIZE) {
            if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::info!("Decay interrupted after {} synapses", mutated);
                break;
            }
            mutated += self.store.decay_synapses(batch, delta)?;
        }
        Ok(mutated)
    }

    /// Delete co-activation synapses with weight at or below `floor`.
    /// Returns the number deleted.
    pub fn prune(&self, floor: f64) -> Result<usize> {
        let pruned = self.store.prune_co_activation(floor)?;
        if pruned > 0 {
            tracing::info!("Pruned {} co-activation synapses at floor {}", pruned, floor);
        }
        Ok(pruned)
    }
}

// ============================================================================
// TESTS
// ============================================================================
