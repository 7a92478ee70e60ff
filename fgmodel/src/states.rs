//! Mixed-radix enumeration of table states.
//!
//! Axis 0 is the innermost counter: it increments on every step and carries into axis 1 when
//! it reaches its dimension, and so on. Table generation, rendering and projection all rely on
//! this exact order.

/// Increments `states` in place, returns `false` once the carry runs past the last axis.
pub(crate) fn advance(states: &mut [usize], dims: &[usize]) -> bool {
    for (s, d) in states.iter_mut().zip(dims.iter()) {
        *s += 1;
        if *s < *d {
            return true;
        }
        *s = 0;
    }
    false
}

/// Lazy sequence of every state-vector of a shape, each visited once.
///
/// A shape containing a zero dimension has no states. A rank-0 shape has exactly one (empty)
/// state.
#[derive(Debug, Clone)]
pub struct StateEnumerator {
    dims: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl StateEnumerator {
    pub fn new(dims: &[usize]) -> Self {
        let mut res = Self {
            dims: dims.to_vec(),
            next: None,
        };
        res.reset();
        res
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Restart the enumeration from the all-zero state.
    pub fn reset(&mut self) {
        self.next = if self.dims.contains(&0) {
            None
        } else {
            Some(vec![0; self.dims.len()])
        };
    }

    fn remaining(&self) -> usize {
        let Some(next) = &self.next else {
            return 0;
        };
        let mut stride: usize = 1;
        let mut pos: usize = 0;
        for (s, d) in next.iter().zip(self.dims.iter()) {
            pos = pos.saturating_add(s.saturating_mul(stride));
            stride = stride.saturating_mul(*d);
        }
        stride - pos
    }
}

impl Iterator for StateEnumerator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut following = current.clone();
        if advance(&mut following, &self.dims) {
            self.next = Some(following);
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for StateEnumerator {}

impl std::iter::FusedIterator for StateEnumerator {}
