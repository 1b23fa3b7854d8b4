//! Dependency Graph (C6): builds the inter-plugin dependency graph, detects
//! cycles, and produces a deterministic topological order, per spec §4.5.

use std::collections::{HashMap, HashSet, VecDeque};

use super::error::GraphError;

/// A directed plugin dependency graph: `plugin -> each declared dependency`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Plugin names in first-seen order, used to tie-break the topological sort.
    order_seen: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds the graph from `(plugin_name, dependency_names)` pairs. Fails
    /// with `MissingDependency` if any declared target isn't itself a
    /// declared plugin.
    pub fn build(plugins: &[(String, Vec<String>)]) -> Result<DependencyGraph, GraphError> {
        let known: HashSet<&str> = plugins.iter().map(|(name, _)| name.as_str()).collect();

        let mut graph = DependencyGraph::default();
        for (name, deps) in plugins {
            graph.order_seen.push(name.clone());
            for dep in deps {
                if !known.contains(dep.as_str()) {
                    return Err(GraphError::MissingDependency {
                        dependent: name.clone(),
                        target: dep.clone(),
                    });
                }
            }
            graph.edges.insert(name.clone(), deps.clone());
        }
        Ok(graph)
    }

    /// Detects a cycle via DFS, returning the path reconstructed from the
    /// recursion stack if one exists.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut on_stack: HashSet<&str> = HashSet::new();

        for name in &self.order_seen {
            if !visited.contains(name.as_str()) {
                if let Some(cycle) = self.visit(name, &mut visited, &mut stack, &mut on_stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        stack.push(node);
        on_stack.insert(node);

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                let dep = dep.as_str();
                if on_stack.contains(dep) {
                    let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.to_string());
                    return Some(cycle);
                }
                if !visited.contains(dep) {
                    if let Some(cycle) = self.visit(dep, visited, stack, on_stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        on_stack.remove(node);
        None
    }

    /// Topological order via Kahn's algorithm, tie-broken by first-seen
    /// order among ready nodes. Assumes `detect_cycle` has already been
    /// checked; returns `Circular` defensively if the graph cannot be fully
    /// ordered (a cycle slipped through).
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        // in_degree[x] = number of dependencies x itself declares; x is
        // ready once every dependency it points to has been emitted.
        let mut in_degree: HashMap<&str, usize> = self
            .order_seen
            .iter()
            .map(|n| (n.as_str(), self.edges.get(n).map(Vec::len).unwrap_or(0)))
            .collect();

        // dependents_of[x] = plugins that declare x as a dependency.
        let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for name in &self.order_seen {
            if let Some(deps) = self.edges.get(name) {
                for dep in deps {
                    dependents_of.entry(dep.as_str()).or_default().push(name.as_str());
                }
            }
        }

        let mut ready: VecDeque<&str> = self
            .order_seen
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
            .collect();

        let mut order = Vec::with_capacity(self.order_seen.len());
        while let Some(node) = ready.pop_front() {
            order.push(node.to_string());
            if let Some(dependents) = dependents_of.get(node) {
                let mut newly_ready: Vec<&str> = Vec::new();
                for &dependent in dependents {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        newly_ready.push(dependent);
                    }
                }
                // Preserve first-seen order among newly-ready nodes.
                newly_ready.sort_by_key(|n| self.order_seen.iter().position(|s| s == n).unwrap_or(usize::MAX));
                for n in newly_ready {
                    ready.push_back(n);
                }
            }
            let mut as_vec: Vec<&str> = ready.into_iter().collect();
            as_vec.sort_by_key(|n| self.order_seen.iter().position(|s| s == n).unwrap_or(usize::MAX));
            ready = as_vec.into();
        }

        if order.len() != self.order_seen.len() {
            let cycle = self.detect_cycle().unwrap_or_default();
            return Err(GraphError::Circular(cycle));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(input: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        input
            .iter()
            .map(|(name, deps)| (name.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn scenario_s6_topological_order() {
        let graph = DependencyGraph::build(&pairs(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
            ("d", &[]),
        ]))
        .unwrap();

        assert!(graph.detect_cycle().is_none());
        let order = graph.topological_order().unwrap();

        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("d") < pos("b"));
        assert!(pos("d") < pos("c"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("a"));
    }

    #[test]
    fn missing_dependency_is_reported() {
        let err = DependencyGraph::build(&pairs(&[("a", &["ghost"])])).unwrap_err();
        assert!(matches!(err, GraphError::MissingDependency { .. }));
    }

    #[test]
    fn cycle_is_detected() {
        let graph = DependencyGraph::build(&pairs(&[("a", &["b"]), ("b", &["a"])])).unwrap();
        let cycle = graph.detect_cycle().unwrap();
        assert!(cycle.contains(&"a".to_string()));
        assert!(cycle.contains(&"b".to_string()));

        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, GraphError::Circular(_)));
    }
}
