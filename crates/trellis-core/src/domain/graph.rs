//! Dependency graph over tasks (or template rows).
//!
//! Design:
//! - Forward edges: node -> nodes it depends on (predecessors)
//! - Reverse edges: node -> nodes that depend on it (successors)
//! - Invariant: edges and reverse_edges must be kept in sync
//!
//! Generic over the node id so the template instantiator can validate rows
//! with the same code the cascade engine uses for tasks.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::hash::Hash;

pub struct DependencyGraph<N> {
    /// All known nodes, including ones without edges.
    nodes: HashSet<N>,

    /// Forward edges: node -> nodes it depends on.
    edges: HashMap<N, HashSet<N>>,

    /// Reverse edges: node -> nodes waiting for it.
    /// Enables O(1) lookup: "who depends on this node?"
    reverse_edges: HashMap<N, HashSet<N>>,
}

impl<N: Copy + Eq + Hash> DependencyGraph<N> {
    pub fn new() -> Self {
        Self {
            nodes: HashSet::new(),
            edges: HashMap::new(),
            reverse_edges: HashMap::new(),
        }
    }

    /// Build a graph from `(predecessor, successor)` pairs.
    pub fn from_edges(edges: impl IntoIterator<Item = (N, N)>) -> Self {
        let mut graph = Self::new();
        for (predecessor, successor) in edges {
            graph.add_dependency(successor, predecessor);
        }
        graph
    }

    pub fn add_node(&mut self, node: N) {
        self.nodes.insert(node);
    }

    pub fn contains(&self, node: N) -> bool {
        self.nodes.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a dependency: `node` depends on `depends_on`.
    ///
    /// Example: add_dependency(b, a) means "B waits for A" (A -> B).
    pub fn add_dependency(&mut self, node: N, depends_on: N) {
        self.nodes.insert(node);
        self.nodes.insert(depends_on);
        self.edges.entry(node).or_default().insert(depends_on);
        self.reverse_edges.entry(depends_on).or_default().insert(node);
    }

    /// Remove a dependency: `node` no longer depends on `depends_on`.
    pub fn remove_dependency(&mut self, node: N, depends_on: N) {
        if let Entry::Occupied(mut e) = self.edges.entry(node) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&node);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Nodes `node` depends on.
    pub fn predecessors(&self, node: N) -> Vec<N> {
        self.edges
            .get(&node)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes waiting for `node`.
    pub fn successors(&self, node: N) -> Vec<N> {
        self.reverse_edges
            .get(&node)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_predecessors(&self, node: N) -> bool {
        self.edges.get(&node).is_some_and(|deps| !deps.is_empty())
    }

    /// Can `to` be reached from `from` by following successor edges?
    pub fn can_reach(&self, from: N, to: N) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Would adding `predecessor -> successor` close a cycle?
    pub fn creates_cycle(&self, predecessor: N, successor: N) -> bool {
        self.can_reach(successor, predecessor)
    }

    /// Every node transitively downstream of `node`, in BFS order, excluding
    /// `node` itself.
    pub fn downstream(&self, node: N) -> Vec<N> {
        let mut visited = HashSet::from([node]);
        let mut queue = VecDeque::from([node]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                if visited.insert(next) {
                    result.push(next);
                    queue.push_back(next);
                }
            }
        }
        result
    }

    /// Kahn's algorithm restricted to `nodes`, ties broken by `key`.
    ///
    /// Edges to nodes outside `nodes` are ignored. Returns `Err` with the
    /// nodes that could not be ordered (they sit on, or behind, a cycle).
    pub fn topological_order_by<K: Ord>(
        &self,
        nodes: &[N],
        key: impl Fn(&N) -> K,
    ) -> Result<Vec<N>, Vec<N>> {
        let members: HashSet<N> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<N, usize> = nodes
            .iter()
            .map(|n| {
                let degree = self
                    .predecessors(*n)
                    .into_iter()
                    .filter(|p| members.contains(p))
                    .count();
                (*n, degree)
            })
            .collect();

        // BTreeMap as a priority queue keyed by `key`; Vec handles equal keys.
        let mut ready: BTreeMap<K, Vec<N>> = BTreeMap::new();
        for n in nodes {
            if in_degree.get(n) == Some(&0) {
                ready.entry(key(n)).or_default().push(*n);
            }
        }

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(mut entry) = ready.first_entry() {
            let current = entry.get_mut().remove(0);
            if entry.get().is_empty() {
                entry.remove();
            }
            order.push(current);

            for next in self.successors(current) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.entry(key(&next)).or_default().push(next);
                    }
                }
            }
        }

        if order.len() == nodes.len() {
            Ok(order)
        } else {
            let placed: HashSet<N> = order.iter().copied().collect();
            Err(nodes.iter().copied().filter(|n| !placed.contains(n)).collect())
        }
    }

    /// Detect a cycle in the graph.
    ///
    /// Returns one cycle path (first node repeated at the end), or `None`
    /// if the graph is a DAG.
    pub fn detect_cycle(&self) -> Option<Vec<N>> {
        let nodes: Vec<N> = self.nodes.iter().copied().collect();
        let index: HashMap<N, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let stuck = self
            .topological_order_by(&nodes, |n| index.get(n).copied().unwrap_or(usize::MAX))
            .err()?;
        let stuck: HashSet<N> = stuck.into_iter().collect();

        // Every stuck node has a stuck predecessor, so walking predecessors
        // inside the stuck set must eventually revisit a node.
        let start = *stuck.iter().next()?;
        let mut path = vec![start];
        let mut seen = HashMap::from([(start, 0usize)]);
        let mut current = start;
        loop {
            let next = self
                .predecessors(current)
                .into_iter()
                .find(|p| stuck.contains(p))?;
            if let Some(&pos) = seen.get(&next) {
                let mut cycle: Vec<N> = path[pos..].to_vec();
                cycle.push(next);
                cycle.reverse();
                return Some(cycle);
            }
            seen.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }
}

impl<N: Copy + Eq + Hash> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_graph_is_empty() {
        let graph: DependencyGraph<u32> = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(!graph.has_predecessors(1));
    }

    #[test]
    fn add_dependency_creates_both_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(2, 1); // 2 waits for 1

        assert!(graph.has_predecessors(2));
        assert!(!graph.has_predecessors(1));
        assert_eq!(graph.predecessors(2), vec![1]);
        assert_eq!(graph.successors(1), vec![2]);
    }

    #[test]
    fn remove_dependency_removes_both_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(2, 1);
        graph.remove_dependency(2, 1);

        assert!(!graph.has_predecessors(2));
        assert!(graph.successors(1).is_empty());
    }

    #[test]
    fn reachability_and_cycle_prediction() {
        // 1 -> 2 -> 3
        let graph = DependencyGraph::from_edges([(1, 2), (2, 3)]);

        assert!(graph.can_reach(1, 3));
        assert!(!graph.can_reach(3, 1));
        assert!(graph.creates_cycle(3, 1));
        assert!(!graph.creates_cycle(1, 3));
    }

    #[test]
    fn downstream_excludes_root_and_visits_once() {
        // Diamond: 1 -> 2 -> 4, 1 -> 3 -> 4
        let graph = DependencyGraph::from_edges([(1, 2), (1, 3), (2, 4), (3, 4)]);

        let mut downstream = graph.downstream(1);
        assert_eq!(downstream.len(), 3);
        downstream.sort();
        assert_eq!(downstream, vec![2, 3, 4]);
    }

    #[test]
    fn topological_order_respects_edges_and_key() {
        // 3 -> 1, 2 is independent
        let graph = DependencyGraph::from_edges([(3, 1)]);
        let order = graph.topological_order_by(&[1, 2, 3], |n| *n).unwrap();

        // 2 and 3 are ready first; the key prefers 2.
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn topological_order_reports_cycle_members() {
        // 1 -> 2 -> 3 -> 2, 4 independent
        let graph = DependencyGraph::from_edges([(1, 2), (2, 3), (3, 2)]);
        let stuck = graph.topological_order_by(&[1, 2, 3, 4], |n| *n).unwrap_err();

        assert_eq!(stuck, vec![2, 3]);
    }

    #[test]
    fn detect_simple_cycle() {
        let graph = DependencyGraph::from_edges([(1, 2), (2, 1)]);
        let cycle = graph.detect_cycle().expect("cycle");
        assert!(cycle.len() >= 3);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn detect_self_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 1);
        assert!(graph.detect_cycle().is_some());
    }

    #[test]
    fn detect_longer_cycle() {
        // 1 -> 2 -> 3 -> 4 -> 2
        let graph = DependencyGraph::from_edges([(1, 2), (2, 3), (3, 4), (4, 2)]);
        let cycle = graph.detect_cycle().expect("cycle");
        assert!(!cycle.contains(&1));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = DependencyGraph::from_edges([(1, 2), (2, 3), (1, 3)]);
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn complex_dag_with_cross_edges() {
        //     1
        //    / \
        //   2   3
        //   |\ /|
        //   | X |
        //   |/ \|
        //   4   5
        let graph =
            DependencyGraph::from_edges([(1, 2), (1, 3), (2, 4), (2, 5), (3, 4), (3, 5)]);
        assert!(graph.detect_cycle().is_none());
    }
}
