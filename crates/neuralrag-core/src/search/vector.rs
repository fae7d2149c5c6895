//! Exact cosine vector index
//!
//! A flat in-memory matrix of `(neuron_id, unit-normalized embedding)`
//! pairs, scanned exhaustively per query. Exact scores and id tie-breaks
//! make results fully deterministic; at the scales this engine targets
//! (tens of thousands of neurons) the scan is fast enough. An ANN structure
//! can replace it behind the same contract.

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Vector index error types
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorIndexError {
    /// Dimension mismatch (expected, got)
    InvalidDimensions(usize, usize),
    /// A zero-norm vector has no direction to compare
    ZeroNorm,
}

impl std::fmt::Display for VectorIndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorIndexError::InvalidDimensions(expected, got) => {
                write!(f, "Invalid dimensions: expected {}, got {}", expected, got)
            }
            VectorIndexError::ZeroNorm => write!(f, "Cannot index or query a zero-norm vector"),
        }
    }
}

impl std::error::Error for VectorIndexError {}

// ============================================================================
// VECTOR MATH
// ============================================================================

/// Cosine similarity between two equal-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn normalized(vector: &[f32]) -> Result<Vec<f32>, VectorIndexError> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(VectorIndexError::ZeroNorm);
    }
    Ok(vector.iter().map(|x| x / norm).collect())
}

// ============================================================================
// INDEX STATS
// ============================================================================

/// Index statistics
#[derive(Debug, Clone)]
pub struct VectorIndexStats {
    /// Total number of vectors
    pub total_vectors: usize,
    /// Vector dimensions (None until the first add)
    pub dimensions: Option<usize>,
}

// ============================================================================
// VECTOR INDEX
// ============================================================================

/// Flat exact-scan cosine index
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(String, Vec<f32>)>,
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Create an empty index; the dimension locks in on the first add
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensions of the index (None until the first add)
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Add a vector under a key, replacing any previous vector for that key.
    /// The vector is unit-normalized on the way in.
    pub fn add(&mut self, key: &str, vector: &[f32]) -> Result<(), VectorIndexError> {
        if let Some(dims) = self.dimensions {
            if vector.len() != dims {
                return Err(VectorIndexError::InvalidDimensions(dims, vector.len()));
            }
        }
        let unit = normalized(vector)?;
        self.dimensions.get_or_insert(vector.len());

        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k == key) {
            slot.1 = unit;
        } else {
            self.entries.push((key.to_string(), unit));
        }
        Ok(())
    }

    /// Remove a vector by key
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() < before
    }

    /// Check if a key exists in the index
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Top-k keys by cosine similarity, sorted descending; ties broken by
    /// ascending key for determinism
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>, VectorIndexError> {
        if let Some(dims) = self.dimensions {
            if query.len() != dims {
                return Err(VectorIndexError::InvalidDimensions(dims, query.len()));
            }
        }
        let unit = normalized(query)?;

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|(key, vec)| {
                let dot: f32 = vec.iter().zip(&unit).map(|(x, y)| x * y).sum();
                (key.clone(), dot)
            })
            .collect();

        scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Top-k with a minimum similarity threshold
    pub fn top_k_with_threshold(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<(String, f32)>, VectorIndexError> {
        let results = self.top_k(query, k)?;
        Ok(results
            .into_iter()
            .filter(|(_, score)| *score >= min_similarity)
            .collect())
    }

    /// Get index statistics
    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.dimensions,
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
    fn index_creation() {
        let index = VectorIndex::new();
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn add_and_search_exact_scores() {
        let mut index = VectorIndex::new();
        index.add("x", &[1.0, 0.0, 0.0]).unwrap();
        index.add("y", &[0.0, 1.0, 0.0]).unwrap();
        index.add("xy", &[1.0, 1.0, 0.0]).unwrap();

        let results = index.top_k(&[2.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results[0].0, "x");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, "xy");
        assert!((results[1].1 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(results[2].0, "y");
        assert!(results[2].1.abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_key() {
        let mut index = VectorIndex::new();
        index.add("b", &[1.0, 0.0]).unwrap();
        index.add("a", &[1.0, 0.0]).unwrap();
        index.add("c", &[1.0, 0.0]).unwrap();

        let results = index.top_k(&[1.0, 0.0], 3).unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn re_add_replaces() {
        let mut index = VectorIndex::new();
        index.add("n", &[1.0, 0.0]).unwrap();
        index.add("n", &[0.0, 1.0]).unwrap();
        assert_eq!(index.len(), 1);

        let results = index.top_k(&[0.0, 1.0], 1).unwrap();
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remove_works() {
        let mut index = VectorIndex::new();
        index.add("n", &[1.0, 0.0]).unwrap();
        assert!(index.contains("n"));
        assert!(index.remove("n"));
        assert!(!index.contains("n"));
        assert!(!index.remove("n"));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new();
        index.add("n", &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(
            index.add("m", &[1.0, 0.0]),
            Err(VectorIndexError::InvalidDimensions(3, 2))
        );
        assert_eq!(
            index.top_k(&[1.0], 1),
            Err(VectorIndexError::InvalidDimensions(3, 1))
        );
    }

    #[test]
    fn zero_vector_is_rejected() {
        let mut index = VectorIndex::new();
        assert_eq!(index.add("z", &[0.0, 0.0]), Err(VectorIndexError::ZeroNorm));
        index.add("n", &[1.0, 0.0]).unwrap();
        assert_eq!(index.top_k(&[0.0, 0.0], 1), Err(VectorIndexError::ZeroNorm));
    }

    #[test]
    fn threshold_filters() {
        let mut index = VectorIndex::new();
        index.add("near", &[1.0, 0.1, 0.0]).unwrap();
        index.add("far", &[0.0, 0.0, 1.0]).unwrap();

        let results = index
            .top_k_with_threshold(&[1.0, 0.0, 0.0], 10, 0.9)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "near");
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn stats() {
        let mut index = VectorIndex::new();
        index.add("n", &[1.0, 0.0]).unwrap();
        let stats = index.stats();
        assert_eq!(stats.total_vectors, 1);
        assert_eq!(stats.dimensions, Some(2));
    }
}
