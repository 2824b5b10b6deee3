//! HNSW vector index for approximate nearest neighbor search

use hnsw_rs::prelude::*;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Search failed: {0}")]
    SearchError(String),
}

/// One approximate-nearest-neighbor hit
#[derive(Debug, Clone)]
pub struct AnnHit {
    /// Internal numeric ID assigned at insert time
    pub id: u64,
    /// Cosine similarity (1 - distance), higher is more similar
    pub score: f32,
}

/// HNSW parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub capacity: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            capacity: 100_000,
        }
    }
}

/// In-memory HNSW index over cosine distance
///
/// The index is append-only; deletion is handled by the owning store, which
/// drops dead IDs during hydration.
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    params: HnswParams,
    count: RwLock<u64>,
}

impl VectorIndex {
    pub fn new(dimension: usize, params: HnswParams) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            params.m,
            params.capacity,
            16,
            params.ef_construction,
            DistCosine,
        );
        Self {
            index: RwLock::new(index),
            dimension,
            params,
            count: RwLock::new(0),
        }
    }

    /// Insert a vector under a numeric ID
    pub fn insert(&self, id: u64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();
        let index = self.index.write().unwrap();
        index.insert((&data, id as usize));

        let mut count = self.count.write().unwrap();
        *count += 1;

        Ok(())
    }

    /// Search for the `k` nearest neighbors, sorted by similarity descending
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<AnnHit>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let neighbours = index.search(query, k, ef_search);

        Ok(neighbours
            .into_iter()
            .map(|n| AnnHit {
                id: n.d_id as u64,
                score: 1.0 - n.distance,
            })
            .collect())
    }

    pub fn len(&self) -> u64 {
        *self.count.read().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Drop all vectors, keeping dimension and parameters
    pub fn clear(&self) {
        let mut index = self.index.write().unwrap();
        *index = Hnsw::<f32, DistCosine>::new(
            self.params.m,
            self.params.capacity,
            16,
            self.params.ef_construction,
            DistCosine,
        );
        let mut count = self.count.write().unwrap();
        *count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new(8, HnswParams::default());
        index.insert(1, &unit(8, 0)).unwrap();
        index.insert(2, &unit(8, 1)).unwrap();
        let mut near_first = unit(8, 0);
        near_first[1] = 0.2;
        index.insert(3, &near_first).unwrap();

        assert_eq!(index.len(), 3);

        let hits = index.search(&unit(8, 0), 2, 50).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].id == 1 || hits[0].id == 3);
        assert!(hits[0].score > 0.9);
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(8, HnswParams::default());
        assert!(index.insert(1, &unit(4, 0)).is_err());
        assert!(index.search(&unit(4, 0), 2, 50).is_err());
    }

    #[test]
    fn test_empty_index_search() {
        let index = VectorIndex::new(8, HnswParams::default());
        let hits = index.search(&unit(8, 0), 5, 50).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_clear() {
        let index = VectorIndex::new(8, HnswParams::default());
        index.insert(1, &unit(8, 0)).unwrap();
        assert!(!index.is_empty());
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 8);
    }
}
