//! Expected-cost-optimal ordering of constraint tests.
//!
//! For a conjunction of independent tests with costs `c_k` and pass
//! probabilities `p_k`, short-circuit evaluation is cheapest in order of
//! increasing `c_k / (1 - p_k)`. With prerequisite edges between tests, each
//! node is paired with its cheapest follow-up and the chain is extracted
//! top-down through a priority queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::stats::TesterStats;

/// Heap entry for the top-down extraction.
#[derive(Clone, Copy, Debug)]
struct OrderState {
    priority: f64,
    node: usize,
}

impl PartialEq for OrderState {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.node == other.node
    }
}

impl Eq for OrderState {}

impl Ord for OrderState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for OrderState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rejection-cost priority of a single test: `cost / (1 - probability)`.
///
/// The 0/0 case (free test that always passes) maps to 0 so it sorts first
/// among equally-informative tests; a costly test that always passes maps to
/// +inf and sorts last.
#[inline]
fn base_priority(s: &TesterStats) -> f64 {
    let p = s.cost / (1.0 - s.probability);
    if p.is_nan() {
        0.0
    } else {
        p
    }
}

/// Compute an optimal test order from per-test stats and prerequisite lists.
///
/// `deps[i]` lists the indices that must be tested (and pass) before test
/// `i` is meaningful. With no dependencies at all the result is the
/// ascending sort by rejection-cost priority, ties broken by index. Cycles
/// in the dependency graph are tolerated: a warning is logged and they are
/// broken at the lowest-index unvisited node.
pub fn optimize_testing_order(stats: &[TesterStats], deps: &[Vec<usize>]) -> Vec<usize> {
    let n = stats.len();
    let mut priority: Vec<f64> = stats.iter().map(base_priority).collect();

    if deps.iter().all(|d| d.is_empty()) {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            priority[a]
                .partial_cmp(&priority[b])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        return order;
    }

    // Prerequisite edge u -> v means u gates v. Out-edges point at dependents.
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indeg = vec![0usize; n];
    for (i, prereqs) in deps.iter().enumerate().take(n) {
        for &d in prereqs {
            out[d].push(i);
            indeg[i] += 1;
        }
    }

    let (postorder, has_cycle) = dfs_postorder(&out);
    if has_cycle {
        log::warn!("test dependency graph has cycles, breaking arbitrarily");
    }

    // Bottom-up pass: fold each node's best dependent into its effective
    // cost/probability so a cheap gate inherits credit for the expensive
    // follow-up it unlocks. Post-order visits dependents before their gates.
    let mut depcost: Vec<f64> = stats.iter().map(|s| s.cost).collect();
    let mut depprob: Vec<f64> = stats.iter().map(|s| s.probability).collect();
    for &i in &postorder {
        if out[i].is_empty() {
            continue;
        }
        let mut best = usize::MAX;
        let mut best_priority = f64::INFINITY;
        for &j in &out[i] {
            if indeg[j] > 1 {
                log::warn!(
                    "test {} has multiple prerequisites including {}; chain optimization is inexact",
                    j,
                    i
                );
            }
            let pair = (depcost[i] + depcost[j]) / (1.0 - depprob[i] * depprob[j]);
            if pair < best_priority || best == usize::MAX {
                best = j;
                best_priority = pair;
            }
        }
        depcost[i] += depcost[best];
        depprob[i] *= depprob[best];
        priority[i] = best_priority;
    }

    // Top-down extraction: repeatedly take the lowest-priority test whose
    // prerequisites have all been emitted.
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut remaining = indeg;
    let mut heap = BinaryHeap::new();
    for (i, &d) in remaining.iter().enumerate() {
        if d == 0 {
            heap.push(OrderState {
                priority: priority[i],
                node: i,
            });
        }
    }
    loop {
        let i = match heap.pop() {
            Some(s) => s.node,
            // Heap exhausted with nodes left: a cycle. Break it at the
            // lowest unvisited index.
            None => match visited.iter().position(|v| !v) {
                Some(i) => i,
                None => break,
            },
        };
        if visited[i] {
            continue;
        }
        visited[i] = true;
        order.push(i);
        for &j in &out[i] {
            if visited[j] {
                continue;
            }
            remaining[j] = remaining[j].saturating_sub(1);
            if remaining[j] == 0 {
                heap.push(OrderState {
                    priority: priority[j],
                    node: j,
                });
            }
        }
    }
    order
}

/// Iterative DFS post-order over the out-edge lists, with cycle detection.
fn dfs_postorder(out: &[Vec<usize>]) -> (Vec<usize>, bool) {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let n = out.len();
    let mut color = vec![WHITE; n];
    let mut postorder = Vec::with_capacity(n);
    let mut has_cycle = false;

    for root in 0..n {
        if color[root] != WHITE {
            continue;
        }
        // (node, next out-edge index to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = GRAY;
        while let Some((node, next)) = stack.pop() {
            if next < out[node].len() {
                let child = out[node][next];
                stack.push((node, next + 1));
                match color[child] {
                    WHITE => {
                        color[child] = GRAY;
                        stack.push((child, 0));
                    }
                    GRAY => has_cycle = true,
                    _ => {}
                }
            } else {
                color[node] = BLACK;
                postorder.push(node);
            }
        }
    }
    (postorder, has_cycle)
}
