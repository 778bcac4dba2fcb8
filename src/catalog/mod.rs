//! Procedure catalog loaded once at startup
//!
//! A `Procedure` is immutable after load. The catalog keeps procedures sorted by
//! name so compilation order (and therefore error reporting) is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored procedure as reported by the database catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Full routine body, including its documentation comment
    pub definition: String,
    /// Declared parameter names in call order
    pub parameters: Vec<String>,
}

impl Procedure {
    pub fn new(
        name: impl Into<String>,
        definition: impl Into<String>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            parameters,
        }
    }
}

/// Name-indexed set of procedures that match the route prefix
#[derive(Debug, Clone, Default)]
pub struct ProcedureCatalog {
    procedures: BTreeMap<String, Arc<Procedure>>,
}

impl ProcedureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog keeping only procedures whose name starts with `prefix`
    pub fn from_procedures(procedures: impl IntoIterator<Item = Procedure>, prefix: &str) -> Self {
        let mut catalog = Self::new();
        for procedure in procedures {
            if procedure.name.starts_with(prefix) {
                catalog.insert(procedure);
            } else {
                tracing::debug!("Skipping procedure '{}' (no '{}' prefix)", procedure.name, prefix);
            }
        }
        catalog
    }

    pub fn insert(&mut self, procedure: Procedure) {
        self.procedures
            .insert(procedure.name.clone(), Arc::new(procedure));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Procedure>> {
        self.procedures.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Procedure>> {
        self.procedures.values()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_prefix_and_sorts() {
        let catalog = ProcedureCatalog::from_procedures(
            vec![
                Procedure::new("api_post_b", "", vec![]),
                Procedure::new("internal_cleanup", "", vec![]),
                Procedure::new("api_get_a", "", vec![]),
            ],
            "api_",
        );

        let names: Vec<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["api_get_a", "api_post_b"]);
        assert!(catalog.get("internal_cleanup").is_none());
    }
}
