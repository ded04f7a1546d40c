//! Ordering of the supplies resolved onto one scope node.
//!
//! Supplies on the same node may feed each other: a derived value needs its
//! source to be in the data context first. This module builds that graph and
//! produces a topological order, detecting cycles. Supplies with no ordering
//! constraint between them keep their insertion order, so the plan is stable
//! from one resolution to the next.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::data::DataDependency;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Graph of "must be supplied before" relations between dependencies
/// supplied on one node.
pub struct SupplyGraph {
    /// Edges point from a supply to the supplies it needs.
    graph: DiGraph<DataDependency, ()>,
    /// Map from dependencies to their graph indices.
    node_map: HashMap<DataDependency, NodeIndex>,
}

impl SupplyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Add a supplied dependency. Insertion order is the tie-break order.
    pub fn add_supply(&mut self, dependency: DataDependency) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&dependency) {
            index
        } else {
            let index = self.graph.add_node(dependency.clone());
            self.node_map.insert(dependency, index);
            index
        }
    }

    /// Record that the supply of `from` reads `to`.
    ///
    /// Ignored unless both are supplied on this node: anything supplied by an
    /// ancestor is already in place when this node's context is built.
    pub fn add_need(&mut self, from: &DataDependency, to: &DataDependency) {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return;
        };
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Detect cycles using DFS with colors.
    ///
    /// Returns the cycle path, first node repeated at the end, if one exists.
    pub fn detect_cycles(&self) -> Option<Vec<DataDependency>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|node| (node, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<DataDependency>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<DataDependency> =
                        path[start..].iter().map(|n| self.graph[*n].clone()).collect();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Topological order: every supply comes after the supplies it needs.
    ///
    /// Among supplies that are ready at the same time the earliest inserted
    /// goes first. Returns the cycle as the error when no order exists.
    pub fn supply_order(&self) -> Result<Vec<DataDependency>, Vec<DataDependency>> {
        if let Some(cycle) = self.detect_cycles() {
            return Err(cycle);
        }

        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| self.graph.neighbors_directed(node, Direction::Outgoing).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut order = Vec::with_capacity(pending.len());
        while let Some(Reverse(index)) = ready.pop() {
            let node = NodeIndex::new(index);
            order.push(self.graph[node].clone());
            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                let count = &mut pending[dependent.index()];
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }
        Ok(order)
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for SupplyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str) -> DataDependency {
        DataDependency::unscoped(name)
    }

    #[test]
    fn test_needs_come_first() {
        let mut graph = SupplyGraph::new();
        // Summary reads Product, Product reads Catalog
        graph.add_supply(dep("Summary"));
        graph.add_supply(dep("Product"));
        graph.add_supply(dep("Catalog"));
        graph.add_need(&dep("Summary"), &dep("Product"));
        graph.add_need(&dep("Product"), &dep("Catalog"));

        let order = graph.supply_order().unwrap();
        assert_eq!(order, vec![dep("Catalog"), dep("Product"), dep("Summary")]);
    }

    #[test]
    fn test_independent_supplies_keep_insertion_order() {
        let mut graph = SupplyGraph::new();
        for name in ["Customer", "Basket", "Banner"] {
            graph.add_supply(dep(name));
        }
        let order = graph.supply_order().unwrap();
        assert_eq!(order, vec![dep("Customer"), dep("Basket"), dep("Banner")]);
    }

    #[test]
    fn test_diamond() {
        let mut graph = SupplyGraph::new();
        // Page reads Left and Right, both read Base
        for name in ["Page", "Left", "Right", "Base"] {
            graph.add_supply(dep(name));
        }
        graph.add_need(&dep("Page"), &dep("Left"));
        graph.add_need(&dep("Page"), &dep("Right"));
        graph.add_need(&dep("Left"), &dep("Base"));
        graph.add_need(&dep("Right"), &dep("Base"));

        let order = graph.supply_order().unwrap();
        assert_eq!(order, vec![dep("Base"), dep("Left"), dep("Right"), dep("Page")]);
    }

    #[test]
    fn test_cycle_reported_with_path() {
        let mut graph = SupplyGraph::new();
        graph.add_supply(dep("A"));
        graph.add_supply(dep("B"));
        graph.add_need(&dep("A"), &dep("B"));
        graph.add_need(&dep("B"), &dep("A"));

        let cycle = graph.supply_order().unwrap_err();
        assert_eq!(cycle, vec![dep("A"), dep("B"), dep("A")]);
    }

    #[test]
    fn test_needs_outside_node_are_ignored() {
        let mut graph = SupplyGraph::new();
        graph.add_supply(dep("Summary"));
        graph.add_need(&dep("Summary"), &dep("SuppliedByParent"));
        graph.add_need(&dep("Summary"), &dep("SuppliedByParent"));

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.is_empty());
        assert_eq!(graph.supply_order().unwrap(), vec![dep("Summary")]);
    }

    #[test]
    fn test_self_need_is_a_cycle() {
        let mut graph = SupplyGraph::new();
        graph.add_supply(dep("A"));
        graph.add_need(&dep("A"), &dep("A"));
        assert!(graph.detect_cycles().is_some());
    }
}
