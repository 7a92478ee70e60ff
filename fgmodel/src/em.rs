//! Expectation-maximization requests.
//!
//! An [`EmSession`] gathers observed evidence and groups of shared parameters, hands them to
//! the [`InferenceEngine`] along with the exported graph, and stores the estimates it returns
//! in the groups.
use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::info;

use crate::engine::{ExportedGraph, InferenceEngine, Properties};
use crate::shared::SharedParameterGroup;
use crate::{FactorId, FgError, Result, VarId};

pub const DEFAULT_PSEUDO_COUNT: f64 = 0.1;

/// Observed states of one sample.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    pub sample: String,
    pub values: BTreeMap<VarId, usize>,
}

/// One shared parameter vector to estimate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SharedParameterSpec {
    /// Variables of each factor, in the order of the shared axes.
    pub orientations: BTreeMap<FactorId, Vec<VarId>>,
    pub total_dim: usize,
    /// Dimension of the first shared axis, over which the estimate is normalized.
    pub target_dim: usize,
    pub pseudo_counts: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmRequest {
    pub observations: Vec<Observation>,
    pub shared: Vec<SharedParameterSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct EmSession {
    // sample -> (variable -> state), in insertion order
    evidence: IndexMap<String, IndexMap<VarId, usize>>,
    shared: Vec<SharedParameterGroup>,
}

impl EmSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_evidence(&mut self, sample: &str, variable: VarId, value: usize) {
        self.evidence
            .entry(sample.to_owned())
            .or_default()
            .insert(variable, value);
    }

    /// Creates a new empty group, to be filled with [`SharedParameterGroup::add_factor`].
    pub fn new_shared<S: Into<String>>(
        &mut self,
        labels: impl IntoIterator<Item = S>,
    ) -> &mut SharedParameterGroup {
        self.shared.push(SharedParameterGroup::new(labels));
        self.shared.last_mut().expect("group was just pushed")
    }

    pub fn groups(&self) -> &[SharedParameterGroup] {
        &self.shared
    }

    pub fn group_mut(&mut self, idx: usize) -> Option<&mut SharedParameterGroup> {
        self.shared.get_mut(idx)
    }

    /// Builds the request handed to the engine, checking the evidence against `graph`.
    pub fn request(&self, graph: &ExportedGraph, pseudo_count: f64) -> Result<EmRequest> {
        let observations = self
            .evidence
            .iter()
            .map(|(sample, values)| -> Result<Observation> {
                for (var, value) in values {
                    let v = graph
                        .variable(*var)
                        .ok_or_else(|| FgError::NotFound(format!("evidence variable {}", var)))?;
                    if *value >= v.dim {
                        return Err(FgError::StateOutOfRange {
                            axis: 0,
                            state: *value,
                            dim: v.dim,
                        });
                    }
                }
                Ok(Observation {
                    sample: sample.clone(),
                    values: values.iter().map(|(k, v)| (*k, *v)).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let shared = self
            .shared
            .iter()
            .map(|group| -> Result<SharedParameterSpec> {
                let dims = group.variable_dims().ok_or_else(|| {
                    FgError::NotFound(format!(
                        "bindings for shared parameters {:?}",
                        group.labels()
                    ))
                })?;
                let total_dim: usize = dims.iter().product();
                Ok(SharedParameterSpec {
                    orientations: group
                        .bindings()
                        .iter()
                        .map(|b| (b.factor, b.variable_ids()))
                        .collect(),
                    total_dim,
                    target_dim: dims.first().copied().unwrap_or(1),
                    pseudo_counts: vec![pseudo_count; total_dim],
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(EmRequest {
            observations,
            shared,
        })
    }

    /// Runs EM on the engine and stores one estimate in every group.
    pub fn run<E: InferenceEngine>(
        &mut self,
        engine: &mut E,
        graph: &ExportedGraph,
        method: &str,
        props: &Properties,
        pseudo_count: f64,
    ) -> Result<()> {
        let request = self.request(graph, pseudo_count)?;
        let estimates = engine.run_em(graph, &request, method, props)?;
        if estimates.len() != self.shared.len() {
            return Err(FgError::Engine(format!(
                "got {} estimates for {} shared parameter groups",
                estimates.len(),
                self.shared.len()
            )));
        }
        for (group, estimate) in self.shared.iter().zip(estimates.iter()) {
            let expected = group.total_dim().unwrap_or(0);
            if estimate.len() != expected {
                return Err(FgError::RankMismatch {
                    got: estimate.len(),
                    expected,
                });
            }
        }
        for (group, estimate) in self.shared.iter_mut().zip(estimates) {
            group.set_result(estimate)?;
        }
        info!(
            method,
            samples = request.observations.len(),
            groups = self.shared.len(),
            "EM estimates stored"
        );
        Ok(())
    }
}
