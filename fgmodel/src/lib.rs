//! Construction of discrete factor graphs.
//!
//! Variables and factors are collected in registries with dense IDs, every factor carries a
//! [`CptGenerator`] that materializes its conditional probability table by full state
//! enumeration, and the resulting [`FactorGraphModel`] is either dumped as text or exported to
//! an [`InferenceEngine`].
pub mod em;
pub mod engine;
pub mod generator;
pub mod index;
pub mod model;
pub mod registry;
pub mod shared;
pub mod states;
pub mod table;

pub use em::{EmRequest, EmSession, Observation, SharedParameterSpec};
pub use engine::{ExportedFactor, ExportedGraph, ExportedVariable, InferenceEngine, Properties};
pub use generator::{Calculator, CptGenerator};
pub use index::MultiDimIndex;
pub use model::FactorGraphModel;
pub use registry::{Factor, FactorRegistry, Variable, VariableRegistry};
pub use shared::SharedParameterGroup;
pub use states::StateEnumerator;
pub use table::ConditionalTable;

use thiserror::Error;

pub type VarId = usize;
pub type FactorId = usize;

/// Maps a variable ID to its state.
pub type Assignment = std::collections::BTreeMap<VarId, usize>;

pub type Result<T> = std::result::Result<T, FgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FgError {
    #[error("Invalid shape {0:?}: every dimension must be at least 1.")]
    InvalidShape(Vec<usize>),
    #[error("Wrong rank: got {got}, expected {expected}.")]
    RankMismatch { got: usize, expected: usize },
    #[error("State {state} out of range on axis {axis} (dimension {dim}).")]
    StateOutOfRange { axis: usize, state: usize, dim: usize },
    #[error("Duplicate key {0}.")]
    DuplicateKey(String),
    #[error("Not found: {0}.")]
    NotFound(String),
    #[error("No state assigned to table variable {0}.")]
    MissingAssignment(VarId),
    #[error("Variable {0} is not in the table.")]
    VariableNotInTable(VarId),
    #[error("Null value from factor calculator {factor} at {assignment:?}.")]
    NullValue {
        factor: String,
        assignment: Assignment,
    },
    #[error("Mismatch of variable set size: got {got}, expected {expected}.")]
    ArityMismatch { got: usize, expected: usize },
    #[error("Shared parameter binding has dimensions {got:?}, expected {expected:?}.")]
    SharedDimMismatch {
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Serialization failure: {0}")]
    Serialization(String),
    #[error("Inference engine failure: {0}")]
    Engine(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Number of digits after the decimal point when rendering table values.
    pub value_precision: usize,
    /// Check every state-vector component against its dimension before flattening.
    /// Out-of-range components otherwise alias other cells of the table.
    pub check_bounds: bool,
}

impl Config {
    pub fn strict() -> Self {
        Self {
            check_bounds: true,
            ..Self::default()
        }
    }
    pub fn fast() -> Self {
        Self {
            check_bounds: false,
            ..Self::default()
        }
    }
    pub fn with_precision(mut self, value_precision: usize) -> Self {
        self.value_precision = value_precision;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            value_precision: 6,
            check_bounds: cfg!(debug_assertions),
        }
    }
}
