use crate::error::{Result, VectorStoreError};
use ndarray::{ArrayView1, ArrayView2};
use std::ops::Range;

/// Exact nearest-neighbour index over squared Euclidean distance.
///
/// Vectors are stored row-major in one contiguous buffer; slot `i` is the `i`-th row. Slots
/// are dense, assigned in insertion order and never reused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatL2Index {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Empty index; the dimension is fixed by the first `add`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty index with a fixed dimension
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    /// Rebuild an index from a row-major buffer
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            if data.is_empty() {
                return Ok(Self::new());
            }
            return Err(VectorStoreError::format("Vector data present with dimension 0"));
        }
        if data.len() % dimension != 0 {
            return Err(VectorStoreError::format(format!(
                "Vector buffer of {} floats is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self {
            dimension: Some(dimension),
            data,
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.dimension {
            Some(d) if d > 0 => self.data.len() / d,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major view of every stored vector
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The vector stored at `slot`
    #[must_use]
    pub fn vector(&self, slot: usize) -> Option<&[f32]> {
        let d = self.dimension?;
        let start = slot.checked_mul(d)?;
        self.data.get(start..start + d)
    }

    /// Append vectors, returning the slots they were assigned.
    ///
    /// The whole batch is validated before anything is stored, so a dimension mismatch
    /// leaves the index untouched.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>> {
        let start = self.len();
        let Some(first) = vectors.first() else {
            return Ok(start..start);
        };

        let dimension = self.dimension.unwrap_or(first.len());
        if dimension == 0 {
            return Err(VectorStoreError::embedding("Embedding provider returned empty vectors"));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        self.dimension = Some(dimension);
        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(start..start + vectors.len())
    }

    /// The `k` nearest slots to `query`, nearest first, as `(slot, squared L2 distance)`.
    ///
    /// Ties are broken by the lower slot. Rows whose distance is NaN (non-finite stored
    /// components) rank after every other row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let (Some(dimension), false) = (self.dimension, self.is_empty()) else {
            return Err(VectorStoreError::EmptyIndex);
        };
        if query.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = ArrayView2::from_shape((self.len(), dimension), &self.data)
            .map_err(|e| VectorStoreError::format(format!("Corrupt vector buffer: {e}")))?;
        let query = ArrayView1::from(query);

        let mut hits: Vec<(usize, f32)> = rows
            .outer_iter()
            .enumerate()
            .map(|(slot, row)| {
                let diff = &row - &query;
                (slot, diff.dot(&diff))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.1.is_nan()
                .cmp(&b.1.is_nan())
                .then_with(|| a.1.total_cmp(&b.1))
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> FlatL2Index {
        let mut index = FlatL2Index::new();
        index
            .add(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]])
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits, vec![(0, 0.0), (2, 1.0), (1, 25.0)]);
    }

    #[test]
    fn test_nan_rows_rank_last() {
        let mut index = FlatL2Index::new();
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| {
                if i % 3 == 0 {
                    vec![f32::NAN, 0.0]
                } else {
                    vec![i as f32, 0.0]
                }
            })
            .collect();
        index.add(&vectors).unwrap();

        let hits = index.search(&[0.0, 0.0], 5).unwrap();
        let slots: Vec<usize> = hits.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![1, 2, 4, 5, 7]);

        let all = index.search(&[0.0, 0.0], 200).unwrap();
        assert_eq!(all.len(), 200);
        assert!(all[..133].iter().all(|(_, d)| d.is_finite()));
        assert!(all[133..].iter().all(|(_, d)| d.is_nan()));
        assert_eq!(all[133].0, 0);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = sample();
        assert_eq!(index.search(&[3.0, 4.0], 10).unwrap().len(), 3);
        assert!(index.search(&[3.0, 4.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_prefer_lower_slot() {
        let mut index = FlatL2Index::new();
        index
            .add(&[vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let slots: Vec<usize> = hits.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn test_add_returns_slot_range() {
        let mut index = sample();
        let range = index.add(&[vec![5.0, 5.0], vec![6.0, 6.0]]).unwrap();
        assert_eq!(range, 3..5);
        assert_eq!(index.len(), 5);
        assert_eq!(index.vector(4), Some(&[6.0, 6.0][..]));
        assert_eq!(index.vector(5), None);
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let mut index = sample();
        let before = index.clone();
        let err = index.add(&[vec![1.0, 1.0], vec![1.0, 1.0, 1.0]]).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(index, before);

        let err = index.search(&[1.0], 1).unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_empty_index_search() {
        let index = FlatL2Index::with_dimension(4);
        assert!(matches!(
            index.search(&[0.0; 4], 3),
            Err(VectorStoreError::EmptyIndex)
        ));
        assert!(matches!(
            FlatL2Index::new().search(&[0.0], 1),
            Err(VectorStoreError::EmptyIndex)
        ));
    }

    #[test]
    fn test_from_raw_validates_shape() {
        assert_eq!(FlatL2Index::from_raw(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap().len(), 2);
        assert!(FlatL2Index::from_raw(3, vec![1.0, 2.0]).is_err());
        assert!(FlatL2Index::from_raw(0, Vec::new()).unwrap().is_empty());
    }
}
