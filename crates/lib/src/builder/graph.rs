//! Declared dependency graph of a working set.
//!
//! Edges run from a dependency to its dependent. Ids that are declared as
//! dependencies but were not discovered are left out of the graph; the
//! dependent's initializer reports them when it runs.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::DiGraph;

use crate::discover::Discovered;

use super::types::BuildError;

pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  missing: Vec<(String, String)>,
}

impl DependencyGraph {
  pub fn from_discovered(working_set: &[Discovered]) -> Self {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut missing = Vec::new();

    for discovered in working_set {
      let id = discovered.id().to_string();
      nodes.entry(id.clone()).or_insert_with(|| graph.add_node(id));
    }

    for discovered in working_set {
      let dependent_idx = nodes[discovered.id()];
      for dependency in discovered.factory.dependencies() {
        match nodes.get(&dependency) {
          Some(&dep_idx) => {
            graph.update_edge(dep_idx, dependent_idx, ());
          }
          None => missing.push((discovered.id().to_string(), dependency)),
        }
      }
    }

    Self { graph, missing }
  }

  /// Fail with [`BuildError::CyclicDependency`] naming the ids of the first
  /// cycle found.
  pub fn verify_acyclic(&self) -> Result<(), BuildError> {
    if toposort(&self.graph, None).is_ok() {
      return Ok(());
    }

    let cycle = tarjan_scc(&self.graph)
      .into_iter()
      .find(|component| component.len() > 1 || self.graph.contains_edge(component[0], component[0]))
      .unwrap_or_default();
    let mut ids: Vec<String> = cycle.into_iter().map(|idx| self.graph[idx].clone()).collect();
    ids.sort();
    Err(BuildError::CyclicDependency { ids })
  }

  /// `(dependent, dependency)` pairs whose dependency was not discovered.
  pub fn missing(&self) -> &[(String, String)] {
    &self.missing
  }
}
