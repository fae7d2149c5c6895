//! Search module
//!
//! Exact cosine similarity search over neuron embeddings. Entry points for
//! spreading activation are selected here.

mod vector;

pub use vector::{cosine_similarity, VectorIndex, VectorIndexError, VectorIndexStats};
