use itertools::Itertools;

use crate::index::MultiDimIndex;
use crate::registry::{Factor, Variable};
use crate::states::StateEnumerator;
use crate::{FactorId, FgError, Result, VarId};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SharedBinding {
    pub variables: Vec<Variable>,
    pub factor: FactorId,
}

impl SharedBinding {
    pub fn variable_ids(&self) -> Vec<VarId> {
        self.variables.iter().map(Variable::id).collect()
    }
}

/// Factor/variable bindings that share one estimated parameter vector.
///
/// The estimation itself is done by the inference engine, see [`crate::EmSession`]; the
/// estimate is stored back in [`Self::result`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SharedParameterGroup {
    labels: Vec<String>,
    bindings: Vec<SharedBinding>,
    // taken from the first binding
    variable_dims: Option<Vec<usize>>,
    result: Option<Vec<f64>>,
}

impl SharedParameterGroup {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            bindings: Vec::new(),
            variable_dims: None,
            result: None,
        }
    }

    /// Adds a binding of `variables` (one per label) to `factor`.
    ///
    /// All bindings must have the dimensions of the first one.
    pub fn add_factor(&mut self, variables: Vec<Variable>, factor: &Factor) -> Result<()> {
        if variables.len() != self.labels.len() {
            return Err(FgError::ArityMismatch {
                got: variables.len(),
                expected: self.labels.len(),
            });
        }
        let dims = variables.iter().map(Variable::dim).collect_vec();
        match &self.variable_dims {
            Some(expected) if *expected != dims => {
                return Err(FgError::SharedDimMismatch {
                    got: dims,
                    expected: expected.clone(),
                });
            }
            Some(_) => {}
            None => self.variable_dims = Some(dims),
        }
        self.bindings.push(SharedBinding {
            variables,
            factor: factor.id(),
        });
        Ok(())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
    pub fn bindings(&self) -> &[SharedBinding] {
        &self.bindings
    }
    pub fn variable_dims(&self) -> Option<&[usize]> {
        self.variable_dims.as_deref()
    }
    /// Size of the shared parameter vector, `None` before the first binding.
    pub fn total_dim(&self) -> Option<usize> {
        self.variable_dims.as_ref().map(|d| d.iter().product())
    }
    pub fn result(&self) -> Option<&[f64]> {
        self.result.as_deref()
    }

    pub fn set_result(&mut self, result: Vec<f64>) -> Result<()> {
        let expected = self.total_dim().unwrap_or(0);
        if result.len() != expected {
            return Err(FgError::RankMismatch {
                got: result.len(),
                expected,
            });
        }
        self.result = Some(result);
        Ok(())
    }
}

impl std::fmt::Display for SharedParameterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.labels.iter().join(" "))?;
        let Some(dims) = &self.variable_dims else {
            return Ok(());
        };
        let index = MultiDimIndex::build(dims).map_err(|_| std::fmt::Error)?;
        for state in StateEnumerator::new(dims) {
            write!(f, "{}", state.iter().join(" "))?;
            if let Some(result) = &self.result {
                let pos = index.flatten(&state).map_err(|_| std::fmt::Error)?;
                // a deserialized group may carry a short result
                if let Some(value) = result.get(pos) {
                    write!(f, "\t{:?}", value)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FactorRegistry, VariableRegistry};

    fn setup() -> (VariableRegistry, FactorRegistry) {
        let mut vars = VariableRegistry::new();
        let mut factors = FactorRegistry::new();
        let x = vars.get_or_add("x", "gene", 2).unwrap();
        let y = vars.get_or_add("y", "gene", 3).unwrap();
        let z = vars.get_or_add("z", "gene", 2).unwrap();
        let w = vars.get_or_add("w", "gene", 3).unwrap();
        factors.add("f", "cpt", vec![x, y]).unwrap();
        factors.add("g", "cpt", vec![z, w]).unwrap();
        (vars, factors)
    }

    #[test]
    fn bindings() {
        let (vars, factors) = setup();
        let mut group = SharedParameterGroup::new(["child", "parent"]);
        let f = factors.get_by_id(0).unwrap();
        let g = factors.get_by_id(1).unwrap();
        group.add_factor(f.variables().to_vec(), f).unwrap();
        group.add_factor(g.variables().to_vec(), g).unwrap();
        assert_eq!(group.variable_dims(), Some(&[2, 3][..]));
        assert_eq!(group.total_dim(), Some(6));
        assert_eq!(group.bindings()[1].factor, 1);
        assert_eq!(group.bindings()[1].variable_ids(), vec![2, 3]);

        let x = vars.get_by_id(0).unwrap().clone();
        assert_eq!(
            group.add_factor(vec![x.clone()], f),
            Err(FgError::ArityMismatch {
                got: 1,
                expected: 2
            })
        );
        let y = vars.get_by_id(1).unwrap().clone();
        assert_eq!(
            group.add_factor(vec![y, x], f),
            Err(FgError::SharedDimMismatch {
                got: vec![3, 2],
                expected: vec![2, 3]
            })
        );
        assert_eq!(group.bindings().len(), 2);
    }

    #[test]
    fn render() {
        let (_, factors) = setup();
        let f = factors.get_by_id(0).unwrap();
        let mut group = SharedParameterGroup::new(["a", "b"]);
        assert_eq!(group.to_string(), "a b\n");
        group.add_factor(f.variables().to_vec(), f).unwrap();
        assert_eq!(
            group.to_string(),
            "a b\n0 0\n1 0\n0 1\n1 1\n0 2\n1 2\n"
        );
        assert!(group.set_result(vec![0.5; 3]).is_err());
        group
            .set_result(vec![0.1, 0.9, 0.2, 0.8, 0.3, 0.7])
            .unwrap();
        let lines: Vec<_> = group.to_string().lines().map(str::to_owned).collect();
        assert_eq!(lines[1], "0 0\t0.1");
        assert_eq!(lines[6], "1 2\t0.7");
    }

    #[test]
    fn render_short_result() {
        let (_, factors) = setup();
        let f = factors.get_by_id(0).unwrap();
        let mut group = SharedParameterGroup::new(["a", "b"]);
        group.add_factor(f.variables().to_vec(), f).unwrap();
        group.result = Some(vec![0.1, 0.9]);
        assert_eq!(
            group.to_string(),
            "a b\n0 0\t0.1\n1 0\t0.9\n0 1\n1 1\n0 2\n1 2\n"
        );
    }
}
