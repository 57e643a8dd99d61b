use std::collections::{HashMap, HashSet};

use crate::error::BuildError;

/// Labeled DAG of asset names for one family, rooted at a synthetic input
/// node.
///
/// The graph stores names only; the assets themselves live in the
/// environment's asset map, keyed by the same names. Children are kept in
/// insertion order and traversal reproduces it.
///
/// Edges may be added before their child node exists, and may reference
/// parents that are never added at all; such edges are simply never
/// reached from the root. What the graph refuses is a cycle: any
/// `add_edge` that would close one fails with the offending path.
#[derive(Debug, Clone)]
pub struct Graph {
    family: String,
    root: String,
    nodes: Vec<String>,
    node_set: HashSet<String>,
    edges: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Create an empty graph for `family` with the given synthetic root.
    pub fn new(family: impl Into<String>, root: impl Into<String>) -> Self {
        Graph {
            family: family.into(),
            root: root.into(),
            nodes: Vec::new(),
            node_set: HashSet::new(),
            edges: HashMap::new(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Name of the synthetic root node.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Insert a node. Duplicate names are an error.
    pub fn add_node(&mut self, name: &str) -> Result<(), BuildError> {
        if name == self.root || !self.node_set.insert(name.to_string()) {
            return Err(BuildError::AssetMalformed {
                asset: name.to_string(),
                reason: format!("duplicate node in '{}' graph", self.family),
            });
        }
        self.nodes.push(name.to_string());
        Ok(())
    }

    /// Add an edge `parent -> child`. Duplicate edges are idempotent; the
    /// parent need not exist as a node yet (or ever). Refuses to close a
    /// cycle.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), BuildError> {
        if self
            .edges
            .get(parent)
            .map_or(false, |children| children.iter().any(|c| c == child))
        {
            return Ok(());
        }

        if let Some(path) = self.path_between(child, parent) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(parent.to_string());
            cycle.extend(path);
            return Err(BuildError::CycleDetected {
                family: self.family.clone(),
                path: cycle,
            });
        }

        self.edges
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(())
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.node_set.contains(name)
    }

    /// Node names in insertion order, root excluded.
    pub fn node_names(&self) -> &[String] {
        &self.nodes
    }

    /// Children of `name`, in edge insertion order.
    pub fn edges_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes that cannot be reached from the root, in insertion order.
    /// These never make it into the compiled expression.
    pub fn unreachable_nodes(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack = vec![self.root.as_str()];
        seen.insert(self.root.as_str());
        while let Some(node) = stack.pop() {
            for child in self.edges_of(node) {
                if seen.insert(child) {
                    stack.push(child);
                }
            }
        }
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(|name| !seen.contains(name))
            .collect()
    }

    // Walk the existing edges from `from` looking for `to`; returns the
    // node path `from ..= to` when reachable. Iterative DFS, so deep
    // graphs cannot overflow the stack.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut came_from: HashMap<&str, &str> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack = vec![from];
        seen.insert(from);

        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![node.to_string()];
                let mut current = node;
                while let Some(&previous) = came_from.get(current) {
                    path.push(previous.to_string());
                    current = previous;
                }
                path.reverse();
                return Some(path);
            }
            if let Some(children) = self.edges.get(node) {
                for child in children {
                    if seen.insert(child.as_str()) {
                        came_from.insert(child.as_str(), node);
                        stack.push(child.as_str());
                    }
                }
            }
        }
        None
    }
}
