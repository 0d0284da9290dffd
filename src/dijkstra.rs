use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// One-to-all shortest paths over the finalized link set.
///
/// `set_edges` hands an implementation the two parallel endpoint arrays
/// in link-id order; `shortest_paths` is then queried once per origin
/// per outer iteration, against whatever weights the caller passes.
pub trait ShortestPathEngine {
    fn from_edges(num_nodes: usize, from_nodes: &[u32], to_nodes: &[u32]) -> Self
    where
        Self: Sized;

    /// Fill `predecessors` and `costs` with the shortest-path tree
    /// rooted at `source` under `weights`. Unreached nodes end up with
    /// `None` / `f64::INFINITY`.
    fn shortest_paths(
        &mut self,
        weights: &[f64],
        source: usize,
        predecessors: &mut [Option<u32>],
        costs: &mut [f64],
    );
}

/// Label-setting Dijkstra on a CSR adjacency built from the link arrays.
/// The queue and visit marks are kept between queries to save
/// re-allocations across the many per-origin calls of an assignment run.
pub struct Dijkstra {
    first_out: Vec<usize>,
    heads: Vec<u32>,
    link_ids: Vec<u32>,
    queue: BinaryHeap<Reverse<CostNode>>,
    visited: Vec<bool>,
}

impl ShortestPathEngine for Dijkstra {
    fn from_edges(num_nodes: usize, from_nodes: &[u32], to_nodes: &[u32]) -> Self {
        debug_assert_eq!(from_nodes.len(), to_nodes.len());
        let n_links = from_nodes.len();

        let mut degree = vec![0usize; num_nodes];
        for &from in from_nodes {
            degree[from as usize] += 1;
        }

        let mut first_out = vec![0usize; num_nodes + 1];
        for node in 0..num_nodes {
            first_out[node + 1] = first_out[node] + degree[node];
        }

        let mut next_slot = first_out[..num_nodes].to_vec();
        let mut heads = vec![0u32; n_links];
        let mut link_ids = vec![0u32; n_links];
        for link_id in 0..n_links {
            let slot = next_slot[from_nodes[link_id] as usize];
            heads[slot] = to_nodes[link_id];
            link_ids[slot] = link_id as u32;
            next_slot[from_nodes[link_id] as usize] += 1;
        }

        Self {
            first_out,
            heads,
            link_ids,
            queue: BinaryHeap::new(),
            visited: vec![false; num_nodes],
        }
    }

    fn shortest_paths(
        &mut self,
        weights: &[f64],
        source: usize,
        predecessors: &mut [Option<u32>],
        costs: &mut [f64],
    ) {
        predecessors.fill(None);
        costs.fill(f64::INFINITY);
        self.visited.fill(false);
        self.queue.clear();

        costs[source] = 0.0;
        self.queue.push(Reverse(CostNode {
            cost: 0.0,
            node: source as u32,
        }));

        while let Some(Reverse(current)) = self.queue.pop() {
            let node = current.node as usize;
            if self.visited[node] {
                continue;
            }
            self.visited[node] = true;

            for slot in self.first_out[node]..self.first_out[node + 1] {
                let head = self.heads[slot] as usize;
                let new_cost = current.cost + weights[self.link_ids[slot] as usize];
                if new_cost < costs[head] {
                    costs[head] = new_cost;
                    predecessors[head] = Some(current.node);
                    self.queue.push(Reverse(CostNode {
                        cost: new_cost,
                        node: head as u32,
                    }));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CostNode {
    cost: f64,
    node: u32,
}

impl Ord for CostNode {
    fn cmp(&self, other: &CostNode) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for CostNode {
    fn partial_cmp(&self, other: &CostNode) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for CostNode {}

impl PartialEq for CostNode {
    fn eq(&self, other: &CostNode) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
