//! Flat indexing of dense multi-dimensional tables.
//!
//! Axis 0 is the fastest-varying one: its stride is 1 and the stride of axis k is the product
//! of the dimensions of all lower axes. This is the column-major (Fortran) convention, and the
//! one [`crate::StateEnumerator`] follows, so that enumerating states and walking the flat
//! storage visit cells in the same order.
use crate::{FgError, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MultiDimIndex {
    dims: Vec<usize>,
    /// shortcuts[k] = dims[0] * ... * dims[k-1]; the last entry is the capacity.
    shortcuts: Vec<usize>,
    check_bounds: bool,
}

// Two indices over the same shape are equal whatever their bounds checking.
impl PartialEq for MultiDimIndex {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
    }
}

impl Eq for MultiDimIndex {}

impl MultiDimIndex {
    pub fn build(dims: &[usize]) -> Result<Self> {
        if dims.iter().any(|d| *d == 0) {
            return Err(FgError::InvalidShape(dims.to_vec()));
        }
        let mut shortcuts = Vec::with_capacity(dims.len() + 1);
        let mut number: usize = 1;
        shortcuts.push(number);
        for d in dims {
            number = number
                .checked_mul(*d)
                .ok_or_else(|| FgError::InvalidShape(dims.to_vec()))?;
            shortcuts.push(number);
        }
        Ok(Self {
            dims: dims.to_vec(),
            shortcuts,
            check_bounds: cfg!(debug_assertions),
        })
    }

    pub fn with_bounds_check(mut self, check_bounds: bool) -> Self {
        self.check_bounds = check_bounds;
        self
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
    pub fn strides(&self) -> &[usize] {
        &self.shortcuts[..self.rank()]
    }
    /// Total number of cells (product of the dimensions, 1 for rank 0).
    pub fn capacity(&self) -> usize {
        self.shortcuts[self.rank()]
    }

    pub fn flatten(&self, state: &[usize]) -> Result<usize> {
        if state.len() != self.rank() {
            return Err(FgError::RankMismatch {
                got: state.len(),
                expected: self.rank(),
            });
        }
        if self.check_bounds {
            if let Some((axis, (s, d))) = state
                .iter()
                .zip(self.dims.iter())
                .enumerate()
                .find(|(_, (s, d))| s >= d)
            {
                return Err(FgError::StateOutOfRange {
                    axis,
                    state: *s,
                    dim: *d,
                });
            }
        }
        Ok(state
            .iter()
            .zip(self.shortcuts.iter())
            .map(|(s, stride)| s * stride)
            .sum())
    }

    /// Inverse of [`Self::flatten`], `None` if `offset` is not below the capacity.
    pub fn unflatten(&self, offset: usize) -> Option<Vec<usize>> {
        if offset >= self.capacity() {
            return None;
        }
        Some(
            self.dims
                .iter()
                .zip(self.shortcuts.iter())
                .map(|(d, stride)| (offset / stride) % d)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts() {
        let idx = MultiDimIndex::build(&[2, 3, 4]).unwrap();
        assert_eq!(idx.strides(), &[1, 2, 6]);
        assert_eq!(idx.capacity(), 24);
        assert_eq!(idx.flatten(&[1, 2, 3]).unwrap(), 1 + 4 + 18);
        assert_eq!(idx.unflatten(23), Some(vec![1, 2, 3]));
        assert_eq!(idx.unflatten(24), None);
    }

    #[test]
    fn rank_zero() {
        let idx = MultiDimIndex::build(&[]).unwrap();
        assert_eq!(idx.capacity(), 1);
        assert_eq!(idx.flatten(&[]).unwrap(), 0);
        assert_eq!(idx.unflatten(0), Some(vec![]));
    }

    #[test]
    fn invalid() {
        assert_eq!(
            MultiDimIndex::build(&[2, 0]),
            Err(FgError::InvalidShape(vec![2, 0]))
        );
        assert!(matches!(
            MultiDimIndex::build(&[usize::MAX, 2]),
            Err(FgError::InvalidShape(_))
        ));
        let idx = MultiDimIndex::build(&[2, 3]).unwrap();
        assert_eq!(
            idx.flatten(&[1]),
            Err(FgError::RankMismatch {
                got: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn bounds() {
        let idx = MultiDimIndex::build(&[2, 3]).unwrap().with_bounds_check(true);
        assert_eq!(
            idx.flatten(&[2, 0]),
            Err(FgError::StateOutOfRange {
                axis: 0,
                state: 2,
                dim: 2
            })
        );
        // Without checks, the out-of-range component aliases another cell.
        let idx = idx.with_bounds_check(false);
        assert_eq!(idx.flatten(&[2, 0]).unwrap(), idx.flatten(&[0, 1]).unwrap());
    }
}
