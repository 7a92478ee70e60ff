use itertools::Itertools;
use tracing::debug;

use crate::registry::Variable;
use crate::states::advance;
use crate::table::ConditionalTable;
use crate::{Assignment, Config, FgError, Result, VarId};

/// Rule giving the value of a factor for one joint assignment of its variables.
///
/// `None` means the rule has no value for that assignment, which aborts table generation.
pub trait Calculator {
    fn calculate(&self, assignment: &Assignment) -> Option<f64>;
}

impl<F> Calculator for F
where
    F: Fn(&Assignment) -> Option<f64>,
{
    fn calculate(&self, assignment: &Assignment) -> Option<f64> {
        self(assignment)
    }
}

/// Materializes the [`ConditionalTable`] of a factor from its [`Calculator`].
pub struct CptGenerator {
    variables: Vec<Variable>,
    calculator: Box<dyn Calculator>,
    name: String,
    kind: String,
}

impl std::fmt::Debug for CptGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CptGenerator")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for CptGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

impl CptGenerator {
    pub fn new(
        variables: Vec<Variable>,
        calculator: impl Calculator + 'static,
        name: &str,
        kind: &str,
    ) -> Self {
        Self {
            variables,
            calculator: Box::new(calculator),
            name: name.to_owned(),
            kind: kind.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
    /// IDs of the bound variables, in binding order.
    pub fn variable_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables.iter().map(Variable::id)
    }
    pub fn sorted_variable_ids(&self) -> Vec<VarId> {
        self.variable_ids().sorted().collect()
    }
    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id() == id)
    }

    /// Generate a table over `variable_set` (by default all the bound variables, sorted by
    /// ID), calling the calculator once for every joint state.
    pub fn generate(&self, variable_set: Option<&[VarId]>) -> Result<ConditionalTable> {
        self.generate_with_config(variable_set, &Config::default())
    }

    pub fn generate_with_config(
        &self,
        variable_set: Option<&[VarId]>,
        config: &Config,
    ) -> Result<ConditionalTable> {
        let variable_set = match variable_set {
            Some(vs) => vs.to_vec(),
            None => self.sorted_variable_ids(),
        };
        let var_dims = variable_set
            .iter()
            .map(|id| {
                self.variable(*id).map(Variable::dim).ok_or_else(|| {
                    FgError::NotFound(format!("variable {} in factor {}", id, self))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut cpt = ConditionalTable::with_config(variable_set.clone(), &var_dims, config)?;
        debug!(factor = %self, dims = ?var_dims, size = cpt.len(), "generating table");
        let mut fac_states = vec![0; variable_set.len()];
        loop {
            let c_map: Assignment = variable_set
                .iter()
                .copied()
                .zip(fac_states.iter().copied())
                .collect();
            let val = self
                .calculator
                .calculate(&c_map)
                .ok_or_else(|| FgError::NullValue {
                    factor: self.to_string(),
                    assignment: c_map.clone(),
                })?;
            cpt.set(val, &c_map)?;
            if !advance(&mut fac_states, &var_dims) {
                break;
            }
        }
        Ok(cpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VariableRegistry;

    fn vars() -> (Variable, Variable) {
        let mut reg = VariableRegistry::new();
        let a = reg.get_or_add("A", "node", 2).unwrap();
        let b = reg.get_or_add("B", "node", 3).unwrap();
        (a, b)
    }

    #[test]
    fn default_order_is_sorted_ids() {
        let (a, b) = vars();
        // bound in reverse ID order
        let gen = CptGenerator::new(
            vec![b, a],
            |m: &Assignment| Some((m[&0] + 10 * m[&1]) as f64),
            "f",
            "cpt",
        );
        let t = gen.generate(None).unwrap();
        assert_eq!(t.variables(), &[0, 1]);
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.values(), &[0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
        assert_eq!(gen.variable_ids().collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(gen.to_string(), "f:cpt");
    }

    #[test]
    fn explicit_subset() {
        let (a, b) = vars();
        let gen = CptGenerator::new(
            vec![a, b],
            |m: &Assignment| Some((m[&0] + 10 * m[&1]) as f64),
            "f",
            "cpt",
        );
        let t = gen.generate(Some(&[1, 0])).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.values(), &[0.0, 10.0, 20.0, 1.0, 11.0, 21.0]);
        assert!(matches!(
            gen.generate(Some(&[0, 7])),
            Err(FgError::NotFound(_))
        ));
    }

    #[test]
    fn null_value_aborts() {
        let (a, b) = vars();
        let gen = CptGenerator::new(
            vec![a, b],
            |m: &Assignment| (m[&0] != 1 || m[&1] != 2).then_some(0.5),
            "f",
            "cpt",
        );
        match gen.generate(None) {
            Err(FgError::NullValue { factor, assignment }) => {
                assert_eq!(factor, "f:cpt");
                assert_eq!(assignment, Assignment::from([(0, 1), (1, 2)]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn no_variables() {
        let gen = CptGenerator::new(Vec::new(), |_: &Assignment| Some(0.25), "prior", "cpt");
        let t = gen.generate(None).unwrap();
        assert_eq!(t.values(), &[0.25]);
    }
}
