//! Activation module
//!
//! Spreading activation: bounded best-first traversal that propagates
//! entry scores along outgoing synapses with geometric decay.

mod walker;

pub use walker::{
    average_depth, spread_activation, Activation, EdgeSource, WalkConfig, WalkOutcome,
};
