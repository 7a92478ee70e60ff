use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::{info, trace};

use crate::engine::{ExportedFactor, ExportedGraph, ExportedVariable, InferenceEngine, Properties};
use crate::generator::CptGenerator;
use crate::registry::{FactorRegistry, VariableRegistry};
use crate::table::ConditionalTable;
use crate::{Config, FactorId, FgError, Result};

/// FactorGraph
///
/// All of the data needed to set up a factor graph calculation: the variable and factor
/// registries and one [`CptGenerator`] per factor.
#[derive(Debug, Default)]
pub struct FactorGraphModel {
    variables: VariableRegistry,
    factors: FactorRegistry,
    generators: BTreeMap<FactorId, CptGenerator>,
    config: Config,
}

impl FactorGraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }
    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }
    pub fn factors(&self) -> &FactorRegistry {
        &self.factors
    }
    pub fn generator(&self, factor: FactorId) -> Option<&CptGenerator> {
        self.generators.get(&factor)
    }

    /// Registers the factor of `generator` under its name and type.
    ///
    /// Every variable bound to the generator must already be in the variable registry.
    pub fn register_table(&mut self, generator: CptGenerator) -> Result<FactorId> {
        for var in generator.variables() {
            let registered = self.variables.get_by_id(var.id())?;
            if registered != var {
                return Err(FgError::NotFound(format!(
                    "variable {} in the registry (found {})",
                    var, registered
                )));
            }
        }
        let id = self
            .factors
            .add(
                generator.name(),
                generator.kind(),
                generator.variables().to_vec(),
            )?
            .id();
        self.generators.insert(id, generator);
        Ok(id)
    }

    fn sorted_table(&self, generator: &CptGenerator) -> Result<ConditionalTable> {
        generator.generate_with_config(None, &self.config)
    }

    /// Text dump of the graph, one entry per line.
    ///
    /// Variables come in ID order, then factors in ID order, each with its table over the
    /// sorted variable IDs. The lines are collected eagerly: a rule returning no value fails
    /// the whole dump with [`FgError::NullValue`] instead of leaving a partial one.
    pub fn serialize(&self) -> Result<Vec<String>> {
        let mut out: Vec<String> = self
            .variables
            .iter()
            .map(|v| format!("# {}\t{}\t{}", v.id(), v.name(), v.kind()))
            .collect();
        out.push("## Factor Graphs".to_owned());
        out.push(self.generators.len().to_string());
        for (id, cpt) in &self.generators {
            let table = self.sorted_table(cpt)?;
            trace!(factor = id, size = table.len(), "serializing factor");
            out.push(format!("## CPT {} {}", cpt.name(), cpt.kind()));
            out.push(table.variables().len().to_string());
            out.push(table.variables().iter().join(" "));
            out.push(table.dims().iter().join(" "));
            out.push(table.len().to_string());
            out.extend(table.render(self.config.value_precision));
        }
        Ok(out)
    }

    pub fn to_text(&self) -> Result<String> {
        let mut text = self.serialize()?.join("\n");
        text.push('\n');
        Ok(text)
    }

    /// Materializes the table of every factor, over its sorted variable IDs.
    pub fn export_tables(&self) -> Result<BTreeMap<FactorId, ConditionalTable>> {
        self.factors
            .iter()
            .map(|factor| -> Result<(FactorId, ConditionalTable)> {
                let generator = self.generators.get(&factor.id()).ok_or_else(|| {
                    FgError::NotFound(format!("generator of factor {}", factor.id()))
                })?;
                Ok((factor.id(), self.sorted_table(generator)?))
            })
            .collect()
    }

    /// Payload for the inference engine.
    pub fn export(&self) -> Result<ExportedGraph> {
        let tables = self.export_tables()?;
        let factors = tables
            .into_iter()
            .map(|(id, table)| -> Result<ExportedFactor> {
                let factor = self.factors.get_by_id(id)?;
                let variables = table.variables().iter().copied().sorted().collect_vec();
                let dims = variables
                    .iter()
                    .map(|v| self.variables.get_by_id(*v).map(|var| var.dim()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ExportedFactor {
                    id,
                    name: factor.name().to_owned(),
                    kind: factor.kind().to_owned(),
                    values: table.project(&variables)?,
                    variables,
                    dims,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let variables = self
            .variables
            .iter()
            .map(|v| ExportedVariable {
                id: v.id(),
                dim: v.dim(),
            })
            .collect();
        info!(
            nvars = self.variables.len(),
            nfactors = factors.len(),
            "exported factor graph"
        );
        Ok(ExportedGraph { variables, factors })
    }

    /// Exports the graph and runs `method` on `engine`.
    pub fn infer<E: InferenceEngine>(
        &self,
        engine: &mut E,
        method: &str,
        props: &Properties,
    ) -> Result<E::Output> {
        let graph = self.export()?;
        engine.run_inference(&graph, method, props)
    }
}
