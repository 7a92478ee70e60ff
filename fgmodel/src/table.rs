use itertools::Itertools;
use ndarray::{ArrayViewD, IxDyn, ShapeBuilder};

use crate::index::MultiDimIndex;
use crate::states::StateEnumerator;
use crate::{Assignment, Config, FgError, Result, VarId};

/// Conditional probability table
///
/// Dense table over an ordered list of variables, one axis per variable. The flat storage
/// follows the [`MultiDimIndex`] layout (axis 0 fastest) and is never resized.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConditionalTable {
    variables: Vec<VarId>,
    index: MultiDimIndex,
    values: Vec<f64>,
}

impl ConditionalTable {
    /// Zero-initialized table, `dims[i]` is the cardinality of `variables[i]`.
    pub fn new(variables: Vec<VarId>, dims: &[usize]) -> Result<Self> {
        Self::with_config(variables, dims, &Config::default())
    }

    pub fn with_config(variables: Vec<VarId>, dims: &[usize], config: &Config) -> Result<Self> {
        if variables.len() != dims.len() {
            return Err(FgError::RankMismatch {
                got: dims.len(),
                expected: variables.len(),
            });
        }
        if let Some(dup) = variables.iter().duplicates().next() {
            return Err(FgError::DuplicateKey(format!("table variable {}", dup)));
        }
        let index = MultiDimIndex::build(dims)?.with_bounds_check(config.check_bounds);
        let values = vec![0.0; index.capacity()];
        Ok(Self {
            variables,
            index,
            values,
        })
    }

    pub fn variables(&self) -> &[VarId] {
        &self.variables
    }
    pub fn dims(&self) -> &[usize] {
        self.index.dims()
    }
    pub fn index(&self) -> &MultiDimIndex {
        &self.index
    }
    /// Flat storage, in enumeration order of [`Self::states`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Axis of `var` in this table.
    pub fn position(&self, var: VarId) -> Option<usize> {
        self.variables.iter().position(|v| *v == var)
    }
    pub fn states(&self) -> StateEnumerator {
        StateEnumerator::new(self.dims())
    }

    // Without bounds checks an out-of-range component may alias another cell, or point past
    // the storage.
    fn out_of_range(&self, state: &[usize], offset: usize) -> FgError {
        match state
            .iter()
            .zip(self.dims().iter())
            .enumerate()
            .find(|(_, (s, d))| s >= d)
        {
            Some((axis, (s, d))) => FgError::StateOutOfRange {
                axis,
                state: *s,
                dim: *d,
            },
            None => FgError::RankMismatch {
                got: offset,
                expected: self.values.len(),
            },
        }
    }

    pub fn get(&self, state: &[usize]) -> Result<f64> {
        let offset = self.index.flatten(state)?;
        self.values
            .get(offset)
            .copied()
            .ok_or_else(|| self.out_of_range(state, offset))
    }
    pub fn set_state(&mut self, state: &[usize], value: f64) -> Result<()> {
        let offset = self.index.flatten(state)?;
        match self.values.get_mut(offset) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(self.out_of_range(state, offset)),
        }
    }

    /// Stores `value` at the state that `assignment` gives to the table variables.
    /// Entries of `assignment` for other variables are ignored.
    pub fn set(&mut self, value: f64, assignment: &Assignment) -> Result<()> {
        let state = self
            .variables
            .iter()
            .map(|v| {
                assignment
                    .get(v)
                    .copied()
                    .ok_or(FgError::MissingAssignment(*v))
            })
            .collect::<Result<Vec<_>>>()?;
        self.set_state(&state, value)
    }

    /// Linearizes the table over `target` axes.
    ///
    /// Every state of this table is copied to the target-shaped state obtained by picking, for
    /// each target variable, the component of its axis. When `target` is a permutation of the
    /// table variables this is a pure axis reordering. When axes are dropped, several source
    /// states land on the same target cell and the last one in enumeration order wins.
    pub fn project(&self, target: &[VarId]) -> Result<Vec<f64>> {
        let remap = target
            .iter()
            .map(|v| self.position(*v).ok_or(FgError::VariableNotInTable(*v)))
            .collect::<Result<Vec<_>>>()?;
        let dims = remap.iter().map(|i| self.dims()[*i]).collect_vec();
        let out_index = MultiDimIndex::build(&dims)?;
        let mut out = vec![0.0; out_index.capacity()];
        let mut out_state = vec![0; remap.len()];
        for (state, value) in self.states().zip(self.values.iter()) {
            for (o, i) in out_state.iter_mut().zip(remap.iter()) {
                *o = state[*i];
            }
            out[out_index.flatten(&out_state)?] = *value;
        }
        Ok(out)
    }

    /// Column-major view of the storage, indexed by state-vector.
    pub fn as_array(&self) -> ArrayViewD<'_, f64> {
        ArrayViewD::from_shape(IxDyn(self.dims()).f(), &self.values)
            .expect("storage length is the product of dims")
    }

    /// One line per state: `"<idx> <value> # <state>"`.
    pub fn render(&self, precision: usize) -> impl Iterator<Item = String> + '_ {
        self.states()
            .zip(self.values.iter())
            .enumerate()
            .map(move |(i, (state, value))| {
                format!("{} {:.prec$} # {:?}", i, value, state, prec = precision)
            })
    }
}

impl std::fmt::Display for ConditionalTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precision = Config::default().value_precision;
        write!(f, "{}", self.render(precision).join("\n"))
    }
}
