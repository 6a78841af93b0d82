// ABOUTME: Dependency graph over deployment units with cycle detection.
// ABOUTME: Iterative three-color DFS produces the topological order.

use crate::types::UnitName;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Fatal configuration error, detected before any deployment action.
    #[error("circular dependency detected at unit '{unit}'")]
    CircularDependency { unit: UnitName },

    #[error("unit '{unit}' depends on undeclared unit '{dependency}'")]
    UnknownDependency {
        unit: UnitName,
        dependency: UnitName,
    },
}

/// Mapping from unit name to the set of unit names it depends on.
///
/// Built once per run from the declaration; `BTreeMap` keys give every
/// traversal a deterministic order, so the same declaration always yields
/// the same execution plan.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<UnitName, BTreeSet<UnitName>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, unit: UnitName, dependencies: impl IntoIterator<Item = UnitName>) {
        self.edges
            .entry(unit)
            .or_default()
            .extend(dependencies);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, unit: &UnitName) -> bool {
        self.edges.contains_key(unit)
    }

    pub fn dependencies_of(&self, unit: &UnitName) -> impl Iterator<Item = &UnitName> {
        self.edges.get(unit).into_iter().flatten()
    }

    /// Topologically order the graph: every dependency precedes its
    /// dependents.
    ///
    /// Iterative depth-first visitation with three-color marking. Meeting a
    /// node already on the visiting path signals a cycle and fails fast,
    /// before any container is touched.
    ///
    /// # Errors
    ///
    /// [`GraphError::CircularDependency`] naming a unit on the cycle, or
    /// [`GraphError::UnknownDependency`] for edges pointing outside the
    /// graph.
    pub fn topological_order(&self) -> Result<Vec<UnitName>, GraphError> {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Visiting,
            Visited,
        }

        let adjacency: BTreeMap<&UnitName, Vec<&UnitName>> = self
            .edges
            .iter()
            .map(|(unit, deps)| (unit, deps.iter().collect()))
            .collect();

        let mut marks: BTreeMap<&UnitName, Mark> =
            self.edges.keys().map(|unit| (unit, Mark::Unvisited)).collect();
        let mut order: Vec<UnitName> = Vec::with_capacity(self.edges.len());

        for root in self.edges.keys() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            // Stack of (unit, index of the next dependency to visit).
            let mut stack: Vec<(&UnitName, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::Visiting);

            while let Some(frame) = stack.last_mut() {
                let (unit, next) = (frame.0, frame.1);

                match adjacency[unit].get(next) {
                    Some(&dependency) => {
                        frame.1 += 1;
                        match marks.get(dependency) {
                            None => {
                                return Err(GraphError::UnknownDependency {
                                    unit: unit.clone(),
                                    dependency: dependency.clone(),
                                });
                            }
                            Some(Mark::Visiting) => {
                                return Err(GraphError::CircularDependency {
                                    unit: dependency.clone(),
                                });
                            }
                            Some(Mark::Visited) => {}
                            Some(Mark::Unvisited) => {
                                marks.insert(dependency, Mark::Visiting);
                                stack.push((dependency, 0));
                            }
                        }
                    }
                    None => {
                        // All dependencies emitted; the unit follows them.
                        marks.insert(unit, Mark::Visited);
                        order.push(unit.clone());
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> UnitName {
        UnitName::new(name).unwrap()
    }

    fn position(order: &[UnitName], name: &str) -> usize {
        order.iter().position(|u| u.as_str() == name).unwrap()
    }

    #[test]
    fn dependencies_precede_dependents() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("db"), []);
        graph.add_unit(unit("cache"), []);
        graph.add_unit(unit("app"), [unit("db"), unit("cache")]);

        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 3);
        assert!(position(&order, "db") < position(&order, "app"));
        assert!(position(&order, "cache") < position(&order, "app"));
    }

    #[test]
    fn deterministic_across_runs() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("c"), []);
        graph.add_unit(unit("a"), []);
        graph.add_unit(unit("b"), [unit("a")]);

        let first = graph.topological_order().unwrap();
        let second = graph.topological_order().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn three_cycle_is_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("a"), [unit("b")]);
        graph.add_unit(unit("b"), [unit("c")]);
        graph.add_unit(unit("c"), [unit("a")]);

        match graph.topological_order() {
            Err(GraphError::CircularDependency { unit: at }) => {
                assert!(["a", "b", "c"].contains(&at.as_str()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_cycle_is_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("a"), [unit("a")]);

        assert!(matches!(
            graph.topological_order(),
            Err(GraphError::CircularDependency { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("app"), [unit("ghost")]);

        match graph.topological_order() {
            Err(GraphError::UnknownDependency { unit: u, dependency }) => {
                assert_eq!(u.as_str(), "app");
                assert_eq!(dependency.as_str(), "ghost");
            }
            other => panic!("expected unknown dependency, got {other:?}"),
        }
    }

    #[test]
    fn diamond_resolves_once() {
        let mut graph = DependencyGraph::new();
        graph.add_unit(unit("base"), []);
        graph.add_unit(unit("left"), [unit("base")]);
        graph.add_unit(unit("right"), [unit("base")]);
        graph.add_unit(unit("top"), [unit("left"), unit("right")]);

        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(position(&order, "base"), 0);
        assert_eq!(position(&order, "top"), 3);
    }
}
