//! Hand-off of a factor graph to an external inference engine.
//!
//! The engine is an injected collaborator: it receives an [`ExportedGraph`], which carries for
//! every variable its cardinality and for every factor its variable IDs in ascending order,
//! along with the flat table enumerated over these sorted axes (axis 0 fastest).
use std::collections::BTreeMap;

use crate::em::EmRequest;
use crate::table::ConditionalTable;
use crate::{FactorId, FgError, Result, VarId};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExportedVariable {
    pub id: VarId,
    pub dim: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportedFactor {
    pub id: FactorId,
    pub name: String,
    pub kind: String,
    /// Ascending.
    pub variables: Vec<VarId>,
    pub dims: Vec<usize>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportedGraph {
    /// In ID order.
    pub variables: Vec<ExportedVariable>,
    /// In factor ID order.
    pub factors: Vec<ExportedFactor>,
}

impl ExportedGraph {
    pub fn variable(&self, id: VarId) -> Option<&ExportedVariable> {
        self.variables.get(id).filter(|v| v.id == id)
    }

    /// Rebuilds the table of a factor from its exported linearization.
    pub fn table(&self, factor: FactorId) -> Result<ConditionalTable> {
        let f = self
            .factors
            .get(factor)
            .ok_or_else(|| FgError::NotFound(format!("factor id {}", factor)))?;
        let mut table = ConditionalTable::new(f.variables.clone(), &f.dims)?;
        if f.values.len() != table.len() {
            return Err(FgError::RankMismatch {
                got: f.values.len(),
                expected: table.len(),
            });
        }
        let states: Vec<_> = table.states().collect();
        for (state, value) in states.iter().zip(f.values.iter()) {
            table.set_state(state, *value)?;
        }
        Ok(table)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| FgError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| FgError::Serialization(e.to_string()))
    }
}

/// Ordered string properties passed to the engine's algorithms.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_owned(), value.to_string());
        self
    }

    /// Loopy belief propagation with sequential fixed-order updates.
    pub fn bp(logdomain: bool, verbose: bool) -> Self {
        Self::new()
            .with("tol", "1e-9")
            .with("logdomain", u8::from(logdomain))
            .with("updates", "SEQFIX")
            .with("verbose", u8::from(verbose))
    }

    /// Junction tree with HUGIN updates.
    pub fn jtree() -> Self {
        Self::new()
            .with("inference", "SUMPROD")
            .with("updates", "HUGIN")
            .with("verbose", "1")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: ToString, V: ToString> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// External inference/learning engine.
///
/// Engines build their native model from the exported graph on every call; nothing is cached
/// on this side.
pub trait InferenceEngine {
    type Output;

    /// Runs the inference algorithm `method` (e.g. `"BP"`, `"JTREE"`).
    fn run_inference(
        &mut self,
        graph: &ExportedGraph,
        method: &str,
        props: &Properties,
    ) -> Result<Self::Output>;

    /// Runs expectation-maximization with `method` as the inference algorithm, returns one
    /// estimated parameter vector per entry of `request.shared`.
    fn run_em(
        &mut self,
        graph: &ExportedGraph,
        request: &EmRequest,
        method: &str,
        props: &Properties,
    ) -> Result<Vec<Vec<f64>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let bp = Properties::bp(true, false);
        assert_eq!(bp.get("tol"), Some("1e-9"));
        assert_eq!(bp.get("logdomain"), Some("1"));
        assert_eq!(bp.get("verbose"), Some("0"));
        assert_eq!(bp.get("updates"), Some("SEQFIX"));
        let jt = Properties::jtree();
        assert_eq!(
            jt.iter().collect::<Vec<_>>(),
            vec![("inference", "SUMPROD"), ("updates", "HUGIN"), ("verbose", "1")]
        );
        let p: Properties = [("maxiter", 100)].into_iter().collect();
        assert_eq!(p.get("maxiter"), Some("100"));
    }

    #[test]
    fn bytes_and_table() {
        let graph = ExportedGraph {
            variables: vec![
                ExportedVariable { id: 0, dim: 2 },
                ExportedVariable { id: 1, dim: 3 },
            ],
            factors: vec![ExportedFactor {
                id: 0,
                name: "f".into(),
                kind: "cpt".into(),
                variables: vec![0, 1],
                dims: vec![2, 3],
                values: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            }],
        };
        let back = ExportedGraph::from_bytes(&graph.to_bytes().unwrap()).unwrap();
        assert_eq!(back, graph);
        let t = back.table(0).unwrap();
        assert_eq!(t.get(&[1, 2]).unwrap(), 5.0);
        assert!(matches!(back.table(1), Err(FgError::NotFound(_))));
        assert_eq!(back.variable(1).map(|v| v.dim), Some(3));
        assert!(back.variable(2).is_none());
    }
}
