use crate::centroid::Centroid;
use crate::dijkstra::{Dijkstra, ShortestPathEngine};
use crate::error::{AssignmentError, Result};
use crate::ledger::LinkFlowLedger;
use crate::link::Link;
use crate::subproblem::{
    SubproblemBuffers, build_equality_data, build_inequality_data, build_objective_data,
};
use log::debug;
use std::collections::HashMap;

/// Default bound on stored paths per OD pair.
pub const DEFAULT_PATHS_PER_OD: usize = 3;

/// Path-based traffic assignment state for one network.
///
/// Centroids are the nodes `0..num_centroids`; every centroid is both a
/// source and a sink of demand, addressed by its node id. The struct
/// owns the per-origin path pools, the link-flow ledger, and the
/// shortest-path engine built by [`set_edges`](Self::set_edges); the
/// outer equilibrium loop (step-size choice, convergence) belongs to
/// the caller.
pub struct TrafficAssignment<E = Dijkstra>
where
    E: ShortestPathEngine,
{
    num_nodes: usize,
    num_links: usize,
    paths_per_od: usize,
    links: Vec<Link>,
    node_to_link: HashMap<(u32, u32), usize>,
    centroids: Vec<Centroid>,
    ledger: LinkFlowLedger,
    engine: Option<E>,
    predecessors: Vec<Option<u32>>,
    sp_costs: Vec<f64>,
    path_buffer: Vec<u32>,
}

impl TrafficAssignment {
    /// Assignment over `num_links` links, `num_nodes` nodes, and
    /// centroids `0..num_centroids`, with the default Dijkstra engine
    /// and path bound.
    pub fn new(num_links: usize, num_nodes: usize, num_centroids: usize) -> Result<Self> {
        Self::with_paths_per_od(num_links, num_nodes, num_centroids, DEFAULT_PATHS_PER_OD)
    }
}

impl<E> TrafficAssignment<E>
where
    E: ShortestPathEngine,
{
    /// Like [`TrafficAssignment::new`], with an explicit bound on the
    /// paths stored per OD pair. All arenas are reserved here; path
    /// growth never allocates.
    pub fn with_paths_per_od(
        num_links: usize,
        num_nodes: usize,
        num_centroids: usize,
        paths_per_od: usize,
    ) -> Result<Self> {
        if num_centroids > num_nodes {
            return Err(AssignmentError::TooManyCentroids {
                num_centroids,
                num_nodes,
            });
        }

        let centroids = (0..num_centroids)
            .map(|node| Centroid::new(node, num_nodes, num_centroids, paths_per_od))
            .collect();

        Ok(Self {
            num_nodes,
            num_links,
            paths_per_od,
            links: Vec::with_capacity(num_links),
            node_to_link: HashMap::new(),
            centroids,
            ledger: LinkFlowLedger::new(num_links, num_centroids),
            engine: None,
            predecessors: vec![None; num_nodes],
            sp_costs: vec![0.0; num_nodes],
            path_buffer: Vec::with_capacity(num_nodes),
        })
    }

    /// Register the next link. Links carry dense sequential ids, so
    /// `link_id` must equal the number of links added so far. The
    /// free-flow travel time seeds the link's weight.
    #[allow(clippy::too_many_arguments)]
    pub fn add_link(
        &mut self,
        link_id: usize,
        t0: f64,
        alfa: f64,
        beta: i32,
        capacity: f64,
        from_node: u32,
        to_node: u32,
    ) -> Result<()> {
        if link_id != self.links.len() || link_id >= self.num_links {
            return Err(AssignmentError::InvalidLink(link_id));
        }
        if from_node as usize >= self.num_nodes {
            return Err(AssignmentError::InvalidNode(from_node as usize));
        }
        if to_node as usize >= self.num_nodes {
            return Err(AssignmentError::InvalidNode(to_node as usize));
        }

        let link = Link::new(link_id, t0, alfa, beta, capacity, from_node, to_node)?;
        self.ledger.register_link(&link);
        // parallel links share the key; the last one added wins
        self.node_to_link.insert((from_node, to_node), link_id);
        self.links.push(link);
        Ok(())
    }

    /// Record `demand` from centroid `from` to node `to`.
    pub fn insert_od(&mut self, from: usize, to: usize, demand: f64) -> Result<()> {
        if to >= self.num_nodes {
            return Err(AssignmentError::InvalidNode(to));
        }
        if !demand.is_finite() || demand < 0.0 {
            return Err(AssignmentError::InvalidDemand {
                origin: from,
                destination: to,
                demand,
            });
        }
        self.centroid_mut(from)?.insert_demand(to, demand);
        Ok(())
    }

    /// Finalize the link set and build the shortest-path engine from
    /// the endpoint arrays in link-id order.
    pub fn set_edges(&mut self) {
        let from_nodes: Vec<u32> = self.links.iter().map(|l| l.from_node).collect();
        let to_nodes: Vec<u32> = self.links.iter().map(|l| l.to_node).collect();
        self.engine = Some(E::from_edges(self.num_nodes, &from_nodes, &to_nodes));
    }

    /// Generate one shortest path per destination of `origin` under the
    /// current weights and insert the new ones into the path pool.
    pub fn compute_shortest_paths(&mut self, origin: usize) -> Result<()> {
        self.centroid(origin)?;
        let engine = self.engine.as_mut().ok_or(AssignmentError::EdgesNotSet)?;
        engine.shortest_paths(
            self.ledger.weights(),
            origin,
            &mut self.predecessors,
            &mut self.sp_costs,
        );

        let destinations: Vec<usize> = self.centroids[origin].destinations.keys().copied().collect();
        let mut discovered = 0usize;
        for destination in destinations {
            self.path_buffer.clear();
            let mut node = destination;
            while node != origin {
                let pred = self.predecessors[node].ok_or(
                    AssignmentError::UnreachableDestination {
                        origin,
                        destination,
                    },
                )?;
                let link_id = *self.node_to_link.get(&(pred, node as u32)).ok_or(
                    AssignmentError::MissingLink {
                        from: pred as usize,
                        to: node,
                    },
                )?;
                self.path_buffer.push(link_id as u32);
                node = pred as usize;
            }
            if self.centroids[origin].add_path(destination, &self.path_buffer)? {
                discovered += 1;
            }
        }
        debug!("origin {origin}: {discovered} new paths");
        Ok(())
    }

    /// Build the initial solution: one shortest path per destination
    /// under free-flow weights, with all demand on it, then fold every
    /// origin into the link flows. Overwrites any prior state.
    pub fn perform_initial_solution(&mut self) -> Result<()> {
        for origin in 0..self.centroids.len() {
            self.compute_shortest_paths(origin)?;
        }
        for centroid in &mut self.centroids {
            let node = centroid.node;
            let Centroid {
                destinations,
                path_flows,
                ..
            } = centroid;
            for dest in destinations.values() {
                let first = *dest.path_indices.first().ok_or(
                    AssignmentError::UnreachableDestination {
                        origin: node,
                        destination: dest.destination,
                    },
                )?;
                path_flows[first] = dest.demand;
            }
        }
        for origin in 0..self.centroids.len() {
            self.update_link_flows(origin)?;
        }
        debug!(
            "initial solution over {} origins, objective {}",
            self.centroids.len(),
            self.get_objective_function()
        );
        Ok(())
    }

    /// Overwrite the path flows of `origin` and immediately fold them
    /// into the link flows and derivatives.
    pub fn update_path_flows(&mut self, origin: usize, flows: &[f64]) -> Result<()> {
        let centroid = self.centroid_mut(origin)?;
        check_len("flows", centroid.path_flows.len(), flows.len())?;
        centroid.path_flows.copy_from_slice(flows);
        self.update_link_flows(origin)
    }

    /// Immediate mode: recompute `origin`'s link contributions from its
    /// path flows, updating aggregate flows and the touched
    /// derivatives. Not safe to run concurrently with anything.
    pub fn update_link_flows(&mut self, origin: usize) -> Result<()> {
        self.centroid(origin)?;
        self.ledger
            .refresh_origin(origin, &self.centroids[origin], &self.links);
        Ok(())
    }

    /// Deferred mode: store a candidate solution (typically the QP
    /// optimum) for `origin` and record the link-flow delta it implies,
    /// leaving the aggregate flows untouched.
    pub fn update_path_flows_without_link_flows(
        &mut self,
        origin: usize,
        flows: &[f64],
    ) -> Result<()> {
        let centroid = self.centroid_mut(origin)?;
        check_len("flows", centroid.path_flows_current_iter.len(), flows.len())?;
        centroid.path_flows_current_iter.copy_from_slice(flows);
        self.ledger.record_candidate(origin, &self.centroids[origin]);
        Ok(())
    }

    /// Apply `stepsize * diff` of `origin` to the aggregate link flows.
    /// Derivatives stay stale until [`update_all_link_derivatives`](Self::update_all_link_derivatives).
    pub fn update_link_flows_stepsize(&mut self, origin: usize, stepsize: f64) -> Result<()> {
        self.centroid(origin)?;
        self.ledger.apply_stepsize(origin, stepsize);
        Ok(())
    }

    /// Mix the candidate path flows of `origin` into the current ones:
    /// `p ← (1-α)·p + α·p_candidate`, then clear the candidate.
    pub fn update_path_flows_stepsize(&mut self, origin: usize, stepsize: f64) -> Result<()> {
        let centroid = self.centroid_mut(origin)?;
        for (flow, candidate) in centroid
            .path_flows
            .iter_mut()
            .zip(centroid.path_flows_current_iter.iter_mut())
        {
            *flow = (1.0 - stepsize) * *flow + stepsize * *candidate;
            *candidate = 0.0;
        }
        Ok(())
    }

    /// Refresh weights and linearization coefficients on every link.
    /// Call once per outer iteration, after all origins are stepped.
    pub fn update_all_link_derivatives(&mut self) {
        self.ledger.update_all_derivatives(&self.links);
    }

    /// Assemble the dense subproblem data of `origin` into
    /// caller-allocated buffers of sizes `n²`, `n`, `m·n`, `m`, `n²`,
    /// `n`. Buffers are zeroed before accumulation, so repeated calls
    /// on the same state produce identical output.
    #[allow(clippy::too_many_arguments)]
    pub fn get_subproblem_data(
        &self,
        origin: usize,
        q: &mut [f64],
        c: &mut [f64],
        a: &mut [f64],
        b: &mut [f64],
        g: &mut [f64],
        h: &mut [f64],
    ) -> Result<()> {
        let centroid = self.centroid(origin)?;
        let n = centroid.num_paths();
        let m = centroid.num_destinations();
        check_len("Q", n * n, q.len())?;
        check_len("c", n, c.len())?;
        check_len("A", m * n, a.len())?;
        check_len("b", m, b.len())?;
        check_len("G", n * n, g.len())?;
        check_len("h", n, h.len())?;

        build_objective_data(
            centroid,
            self.ledger.alphas_1(),
            self.ledger.alphas_2(),
            self.ledger.link_flows(),
            self.ledger.origin_row(origin),
            q,
            c,
        );
        build_equality_data(centroid, a, b);
        build_inequality_data(n, g, h);
        Ok(())
    }

    /// Allocate and assemble [`SubproblemBuffers`] for `origin`.
    pub fn subproblem(&self, origin: usize) -> Result<SubproblemBuffers> {
        let centroid = self.centroid(origin)?;
        let mut bufs = SubproblemBuffers::new(centroid.num_paths(), centroid.num_destinations());
        self.get_subproblem_data(
            origin,
            &mut bufs.q,
            &mut bufs.c,
            &mut bufs.a,
            &mut bufs.b,
            &mut bufs.g,
            &mut bufs.h,
        )?;
        Ok(bufs)
    }

    /// Aggregate link flows, indexed by link id.
    pub fn link_flows(&self) -> &[f64] {
        self.ledger.link_flows()
    }

    /// Copy the aggregate link flows into `out`.
    pub fn get_link_flows(&self, out: &mut [f64]) -> Result<()> {
        check_len("out", self.num_links, out.len())?;
        out.copy_from_slice(self.ledger.link_flows());
        Ok(())
    }

    /// Current BPR travel times, indexed by link id.
    pub fn weights(&self) -> &[f64] {
        self.ledger.weights()
    }

    /// Contribution of one origin to every link's flow.
    pub fn origin_link_flows(&self, origin: usize) -> Result<&[f64]> {
        self.centroid(origin)?;
        Ok(self.ledger.origin_row(origin))
    }

    /// Beckmann objective at the current aggregate flows.
    pub fn get_objective_function(&self) -> f64 {
        self.ledger.objective(&self.links)
    }

    /// Number of stored paths for `origin`.
    pub fn get_total_paths(&self, origin: usize) -> Result<usize> {
        Ok(self.centroid(origin)?.num_paths())
    }

    /// Number of stored paths serving one OD pair.
    pub fn get_total_paths_between(&self, origin: usize, destination: usize) -> Result<usize> {
        Ok(self
            .centroid(origin)?
            .descriptor(destination)?
            .path_indices
            .len())
    }

    /// Current travel time and assigned flow of every path serving one
    /// OD pair, in discovery order.
    pub fn get_odpath_times(
        &self,
        origin: usize,
        destination: usize,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let centroid = self.centroid(origin)?;
        let descriptor = centroid.descriptor(destination)?;
        let weights = self.ledger.weights();

        let mut times = Vec::with_capacity(descriptor.path_indices.len());
        let mut flows = Vec::with_capacity(descriptor.path_indices.len());
        for &path_id in &descriptor.path_indices {
            let time = centroid
                .path_links(path_id)
                .iter()
                .map(|&link_id| weights[link_id as usize])
                .sum();
            times.push(time);
            flows.push(centroid.path_flows[path_id]);
        }
        Ok((times, flows))
    }

    /// Read access to one origin's path pool.
    pub fn centroid(&self, origin: usize) -> Result<&Centroid> {
        self.centroids
            .get(origin)
            .ok_or(AssignmentError::InvalidOrigin(origin))
    }

    pub fn num_links(&self) -> usize {
        self.num_links
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_centroids(&self) -> usize {
        self.centroids.len()
    }

    pub fn paths_per_od(&self) -> usize {
        self.paths_per_od
    }

    fn centroid_mut(&mut self, origin: usize) -> Result<&mut Centroid> {
        self.centroids
            .get_mut(origin)
            .ok_or(AssignmentError::InvalidOrigin(origin))
    }
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(AssignmentError::BufferSize {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three nodes in series: 0 →(0)→ 1 →(1)→ 2, centroid 0 only.
    fn series() -> TrafficAssignment {
        let mut ta = TrafficAssignment::new(2, 3, 1).unwrap();
        ta.add_link(0, 1.0, 0.0, 1, 1.0, 0, 1).unwrap();
        ta.add_link(1, 1.0, 0.0, 1, 1.0, 1, 2).unwrap();
        ta.insert_od(0, 2, 10.0).unwrap();
        ta.set_edges();
        ta
    }

    #[test]
    fn test_constructor_rejects_centroid_overflow() {
        assert!(matches!(
            TrafficAssignment::new(1, 2, 3),
            Err(AssignmentError::TooManyCentroids { .. })
        ));
    }

    #[test]
    fn test_add_link_order_enforced() {
        let mut ta = TrafficAssignment::new(2, 3, 1).unwrap();
        assert!(matches!(
            ta.add_link(1, 1.0, 0.15, 4, 100.0, 0, 1),
            Err(AssignmentError::InvalidLink(1))
        ));
        ta.add_link(0, 1.0, 0.15, 4, 100.0, 0, 1).unwrap();
        assert!(ta.add_link(1, 1.0, 0.15, 4, 100.0, 1, 2).is_ok());
        // the pool is sized for exactly num_links links
        assert!(matches!(
            ta.add_link(2, 1.0, 0.15, 4, 100.0, 2, 0),
            Err(AssignmentError::InvalidLink(2))
        ));
    }

    #[test]
    fn test_series_initial_solution() {
        let mut ta = series();
        ta.perform_initial_solution().unwrap();

        assert_eq!(ta.link_flows(), &[10.0, 10.0]);
        let centroid = ta.centroid(0).unwrap();
        assert_eq!(centroid.num_paths(), 1);
        assert_eq!(centroid.path_links(0), &[1, 0]);
        for link in [0usize, 1] {
            assert_eq!(centroid.paths_through_link(link), Some(&[0usize][..]));
        }
    }

    #[test]
    fn test_compute_before_set_edges() {
        let mut ta = TrafficAssignment::new(2, 3, 1).unwrap();
        ta.add_link(0, 1.0, 0.0, 1, 1.0, 0, 1).unwrap();
        assert!(matches!(
            ta.compute_shortest_paths(0),
            Err(AssignmentError::EdgesNotSet)
        ));
    }

    #[test]
    fn test_unreachable_destination() {
        // link points the wrong way, node 2 has demand
        let mut ta = TrafficAssignment::new(2, 3, 1).unwrap();
        ta.add_link(0, 1.0, 0.0, 1, 1.0, 0, 1).unwrap();
        ta.add_link(1, 1.0, 0.0, 1, 1.0, 2, 1).unwrap();
        ta.insert_od(0, 2, 5.0).unwrap();
        ta.set_edges();
        assert!(matches!(
            ta.perform_initial_solution(),
            Err(AssignmentError::UnreachableDestination { destination: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let mut ta = TrafficAssignment::new(2, 3, 1).unwrap();
        assert!(matches!(
            ta.insert_od(1, 2, 5.0),
            Err(AssignmentError::InvalidOrigin(1))
        ));
        assert!(matches!(
            ta.insert_od(0, 9, 5.0),
            Err(AssignmentError::InvalidNode(9))
        ));
        assert!(matches!(
            ta.insert_od(0, 2, -1.0),
            Err(AssignmentError::InvalidDemand { .. })
        ));
        assert!(matches!(
            ta.get_total_paths(4),
            Err(AssignmentError::InvalidOrigin(4))
        ));
    }

    #[test]
    fn test_subproblem_buffer_validation() {
        let mut ta = series();
        ta.perform_initial_solution().unwrap();

        let mut q = vec![0.0; 4]; // wrong: one path means n² = 1
        let (mut c, mut a, mut b, mut g, mut h) =
            (vec![0.0; 1], vec![0.0; 1], vec![0.0; 1], vec![0.0; 1], vec![0.0; 1]);
        assert!(matches!(
            ta.get_subproblem_data(0, &mut q, &mut c, &mut a, &mut b, &mut g, &mut h),
            Err(AssignmentError::BufferSize { name: "Q", .. })
        ));
    }

    #[test]
    fn test_odpath_times() {
        let mut ta = series();
        ta.perform_initial_solution().unwrap();

        let (times, flows) = ta.get_odpath_times(0, 2).unwrap();
        assert_eq!(times, vec![2.0]);
        assert_eq!(flows, vec![10.0]);
        assert!(matches!(
            ta.get_odpath_times(0, 1),
            Err(AssignmentError::UnknownDestination { .. })
        ));
    }
}
