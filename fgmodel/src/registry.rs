//! Catalogs of variables and factors keyed by (name, type).
//!
//! IDs are dense, 0-based and assigned in first-insertion order. Both registries keep their
//! entries in an [`IndexMap`], whose insertion index is the ID, so iterating over a registry is
//! iterating in ascending ID order.
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{FactorId, FgError, Result, VarId};

type Key = (String, String);

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Variable {
    name: String,
    kind: String,
    id: VarId,
    dim: usize,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn id(&self) -> VarId {
        self.id
    }
    /// Number of discrete states.
    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Variable name={} type={} id={} dim={}>",
            self.name, self.kind, self.id, self.dim
        )
    }
}

fn key_matches(key: &Key, name: Option<&str>, kind: Option<&str>) -> bool {
    name.map_or(true, |n| n == key.0) && kind.map_or(true, |k| k == key.1)
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct VariableRegistry {
    vars: IndexMap<Key, Variable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variable registered under (name, kind), inserting it with the next ID if it
    /// is not there yet.
    ///
    /// The cardinality of an existing variable is never updated: a later call with a different
    /// `dim` returns the variable as first registered.
    pub fn get_or_add(&mut self, name: &str, kind: &str, dim: usize) -> Result<Variable> {
        if let Some(var) = self.get(name, kind) {
            if var.dim != dim {
                warn!(
                    var_name = name,
                    var_kind = kind,
                    registered = var.dim,
                    requested = dim,
                    "variable already registered with another cardinality"
                );
            }
            return Ok(var.clone());
        }
        if dim == 0 {
            return Err(FgError::InvalidShape(vec![dim]));
        }
        let var = Variable {
            name: name.to_owned(),
            kind: kind.to_owned(),
            id: self.vars.len(),
            dim,
        };
        debug!(id = var.id, var_name = name, var_kind = kind, dim, "new variable");
        self.vars.insert((name.to_owned(), kind.to_owned()), var.clone());
        Ok(var)
    }

    pub fn get_by_id(&self, id: VarId) -> Result<&Variable> {
        self.vars
            .get_index(id)
            .map(|(_, v)| v)
            .ok_or_else(|| FgError::NotFound(format!("variable id {}", id)))
    }

    pub fn get(&self, name: &str, kind: &str) -> Option<&Variable> {
        self.vars.get(&(name.to_owned(), kind.to_owned()))
    }

    pub fn contains(&self, name: &str, kind: &str) -> bool {
        self.get(name, kind).is_some()
    }

    /// Variables matching both filters, `None` matches anything.
    pub fn find<'a>(
        &'a self,
        name: Option<&'a str>,
        kind: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Variable> + 'a {
        self.vars
            .iter()
            .filter(move |(k, _)| key_matches(k, name, kind))
            .map(|(_, v)| v)
    }

    /// All variables in ascending ID order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Variable> {
        self.vars.values()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Factor {
    name: String,
    kind: String,
    id: FactorId,
    // axis order of the associated table
    variables: Vec<Variable>,
}

impl Factor {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn id(&self) -> FactorId {
        self.id
    }
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Factor name={} type={} id={} vars={}>",
            self.name,
            self.kind,
            self.id,
            itertools::join(self.variables.iter(), ",")
        )
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FactorRegistry {
    factors: IndexMap<Key, Factor>,
}

impl FactorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new factor, unlike variables a (name, kind) pair can only be added once.
    pub fn add(&mut self, name: &str, kind: &str, variables: Vec<Variable>) -> Result<&Factor> {
        let key = (name.to_owned(), kind.to_owned());
        if self.factors.contains_key(&key) {
            return Err(FgError::DuplicateKey(format!("factor ({}, {})", name, kind)));
        }
        let id = self.factors.len();
        debug!(id, factor_name = name, factor_kind = kind, nvars = variables.len(), "new factor");
        let (idx, _) = self.factors.insert_full(
            key,
            Factor {
                name: name.to_owned(),
                kind: kind.to_owned(),
                id,
                variables,
            },
        );
        Ok(&self.factors[idx])
    }

    pub fn get_by_id(&self, id: FactorId) -> Result<&Factor> {
        self.factors
            .get_index(id)
            .map(|(_, f)| f)
            .ok_or_else(|| FgError::NotFound(format!("factor id {}", id)))
    }

    pub fn find<'a>(
        &'a self,
        name: Option<&'a str>,
        kind: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Factor> + 'a {
        self.factors
            .iter()
            .filter(move |(k, _)| key_matches(k, name, kind))
            .map(|(_, f)| f)
    }

    /// All factors in ascending ID order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Factor> {
        self.factors.values()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
