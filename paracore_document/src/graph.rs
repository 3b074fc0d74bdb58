// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object dependency graph and deterministic topological ordering.

use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// Result of ordering the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Ordering {
    /// Nodes whose dependencies all come earlier, dependencies first.
    pub(crate) sorted: Vec<usize>,
    /// Nodes that could not be ordered: cycle members and everything
    /// downstream of a cycle.
    pub(crate) stalled: Vec<usize>,
}

/// "A depends on B" edges between dense node indices.
///
/// Node indices are the positions of objects in document insertion order,
/// which doubles as the tie-break among nodes that are ready at the same time.
#[derive(Clone, Debug, Default)]
pub(crate) struct DependencyGraph {
    /// `forward[a]`: nodes that `a` depends on.
    forward: Vec<Vec<usize>>,
    /// `reverse[b]`: nodes that depend on `b`.
    reverse: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            forward: vec![Vec::new(); nodes],
            reverse: vec![Vec::new(); nodes],
        }
    }

    /// Records that `from` depends on `to`. Self edges and duplicates are
    /// ignored.
    pub(crate) fn add_dependency(&mut self, from: usize, to: usize) {
        if from == to || self.forward[from].contains(&to) {
            return;
        }
        self.forward[from].push(to);
        self.reverse[to].push(from);
    }

    pub(crate) fn dependencies(&self, node: usize) -> &[usize] {
        &self.forward[node]
    }

    pub(crate) fn dependents(&self, node: usize) -> &[usize] {
        &self.reverse[node]
    }

    /// Orders the nodes with Kahn's algorithm.
    ///
    /// When several nodes are ready, the smallest index goes first, so the
    /// order is fully determined by the edges and the insertion order.
    pub(crate) fn ordering(&self) -> Ordering {
        let n = self.forward.len();
        let mut in_degree: Vec<usize> = self.forward.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&node| in_degree[node] == 0)
            .map(Reverse)
            .collect();
        let mut sorted = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            sorted.push(node);
            for &dependent in &self.reverse[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
        let stalled = (0..n).filter(|&node| in_degree[node] > 0).collect();
        Ordering { sorted, stalled }
    }

    /// Returns `true` if `node` reaches itself through nodes in `within`.
    pub(crate) fn on_cycle(&self, node: usize, within: &[bool]) -> bool {
        let mut seen = vec![false; self.forward.len()];
        let mut stack: Vec<usize> = self.forward[node]
            .iter()
            .copied()
            .filter(|&dep| within[dep])
            .collect();
        while let Some(current) = stack.pop() {
            if current == node {
                return true;
            }
            if core::mem::replace(&mut seen[current], true) {
                continue;
            }
            stack.extend(
                self.forward[current]
                    .iter()
                    .copied()
                    .filter(|&dep| within[dep] && !seen[dep]),
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_come_first() {
        // 0 <- 2 <- 1
        let mut graph = DependencyGraph::new(3);
        graph.add_dependency(2, 0);
        graph.add_dependency(1, 2);
        let ordering = graph.ordering();
        assert_eq!(ordering.sorted, [0, 2, 1]);
        assert!(ordering.stalled.is_empty());
    }

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let mut graph = DependencyGraph::new(4);
        graph.add_dependency(0, 3);
        assert_eq!(graph.ordering().sorted, [1, 2, 3, 0]);
    }

    #[test]
    fn self_and_duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new(2);
        graph.add_dependency(0, 0);
        graph.add_dependency(1, 0);
        graph.add_dependency(1, 0);
        assert_eq!(graph.dependencies(1), &[0]);
        assert_eq!(graph.dependents(0), &[1]);
        assert_eq!(graph.ordering().sorted, [0, 1]);
    }

    #[test]
    fn cycles_stall_with_their_dependents() {
        // 1 <-> 2, 3 depends on 2, 0 is free.
        let mut graph = DependencyGraph::new(4);
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 2);
        let ordering = graph.ordering();
        assert_eq!(ordering.sorted, [0]);
        assert_eq!(ordering.stalled, [1, 2, 3]);

        let mut within = vec![false; 4];
        for &node in &ordering.stalled {
            within[node] = true;
        }
        assert!(graph.on_cycle(1, &within));
        assert!(graph.on_cycle(2, &within));
        assert!(!graph.on_cycle(3, &within));
    }
}
