//! The milestone graph planners build.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Write as _;

use crate::core::Config;

/// Union-find over milestone indices.
///
/// Union by size; `find` is iterative and non-compressing so connectivity
/// queries work through shared references.
#[derive(Clone, Debug, Default)]
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn add(&mut self) -> usize {
        let i = self.parent.len();
        self.parent.push(i);
        self.size.push(1);
        i
    }

    fn find(&self, mut i: usize) -> usize {
        while self.parent[i] != i {
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }

    fn num_roots(&self) -> usize {
        (0..self.parent.len())
            .filter(|&i| self.parent[i] == i)
            .count()
    }
}

/// Heap entry for shortest-path extraction.
#[derive(Clone, Copy, Debug)]
struct PathState {
    cost: f64,
    node: usize,
}

impl PartialEq for PathState {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for PathState {}

impl Ord for PathState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An undirected graph of milestones with distance-weighted edges.
///
/// Milestone indices are dense, assigned at insertion and never reused.
/// Connected components are tracked incrementally through union-find.
#[derive(Clone, Debug, Default)]
pub struct Roadmap {
    nodes: Vec<Config>,
    edges: Vec<Vec<(usize, f64)>>,
    components: DisjointSets,
}

impl Roadmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a milestone, returning its dense index.
    pub fn add_node(&mut self, q: Config) -> usize {
        self.nodes.push(q);
        self.edges.push(Vec::new());
        self.components.add()
    }

    /// Insert an undirected edge with the given length.
    pub fn add_edge(&mut self, i: usize, j: usize, length: f64) {
        debug_assert!(i != j && i < self.nodes.len() && j < self.nodes.len());
        self.edges[i].push((j, length));
        self.edges[j].push((i, length));
        self.components.union(i, j);
    }

    /// Remove the undirected edge between `i` and `j`, if present.
    ///
    /// Connected-component bookkeeping is unchanged: removal is only used
    /// when re-parenting a tree node whose connectivity is preserved through
    /// its new parent.
    pub fn remove_edge(&mut self, i: usize, j: usize) {
        self.edges[i].retain(|&(k, _)| k != j);
        self.edges[j].retain(|&(k, _)| k != i);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn num_components(&self) -> usize {
        self.components.num_roots()
    }

    pub fn node(&self, i: usize) -> Option<&Config> {
        self.nodes.get(i)
    }

    pub fn nodes(&self) -> &[Config] {
        &self.nodes
    }

    pub fn neighbors(&self, i: usize) -> &[(usize, f64)] {
        &self.edges[i]
    }

    /// True if the milestones lie in the same connected component.
    pub fn same_component(&self, i: usize, j: usize) -> bool {
        i < self.nodes.len() && j < self.nodes.len() && self.components.find(i) == self.components.find(j)
    }

    /// All edges as unordered index pairs with `src < tgt`.
    pub fn edge_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::with_capacity(self.num_edges());
        for (i, nbrs) in self.edges.iter().enumerate() {
            for &(j, _) in nbrs {
                if i < j {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Shortest milestone path from `start` to `goal` by edge length.
    pub fn shortest_path(&self, start: usize, goal: usize) -> Option<(Vec<usize>, f64)> {
        let n = self.nodes.len();
        if start >= n || goal >= n {
            return None;
        }
        if start == goal {
            return Some((vec![start], 0.0));
        }

        let mut dist: Vec<f64> = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        dist[start] = 0.0;

        let mut heap = BinaryHeap::new();
        heap.push(PathState {
            cost: 0.0,
            node: start,
        });

        while let Some(PathState { cost, node }) = heap.pop() {
            if cost > dist[node] {
                continue;
            }
            if node == goal {
                break;
            }
            for &(neighbor, length) in &self.edges[node] {
                let next = dist[node] + length;
                if next < dist[neighbor] {
                    dist[neighbor] = next;
                    prev[neighbor] = Some(node);
                    heap.push(PathState {
                        cost: next,
                        node: neighbor,
                    });
                }
            }
        }

        prev[goal]?;
        let mut path = vec![goal];
        let mut current = goal;
        while let Some(p) = prev[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Some((path, dist[goal]))
    }

    /// Serialize as Trivial Graph Format: one `index label` line per node
    /// (labels are the stringified configurations), a `#` separator, then
    /// one `src tgt` line per edge.
    pub fn to_tgf(&self) -> String {
        let mut out = String::new();
        for (i, q) in self.nodes.iter().enumerate() {
            let label: Vec<String> = q.iter().map(|x| format!("{x}")).collect();
            let _ = writeln!(out, "{} ({})", i, label.join(","));
        }
        out.push_str("#\n");
        for (i, j) in self.edge_pairs() {
            let _ = writeln!(out, "{} {}", i, j);
        }
        out
    }
}
