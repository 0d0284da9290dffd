use crate::centroid::Centroid;
use crate::link::Link;
use rayon::prelude::*;

/// Aggregate and per-origin link-flow bookkeeping.
///
/// Two update modes drive the outer loop. Immediate mode
/// (`refresh_origin`) folds an origin's path flows straight into the
/// aggregate and refreshes the touched derivatives; it is used once at
/// initial-solution time. Deferred mode (`record_candidate` then
/// `apply_stepsize`) stores each origin's candidate delta first so the
/// driver can pick a single step size after seeing every origin's
/// descent direction, and derivatives are refreshed once afterwards via
/// `update_all_derivatives`.
#[derive(Debug)]
pub struct LinkFlowLedger {
    n_links: usize,
    link_flows: Vec<f64>,
    /// Row-major `[origin, link]` contribution matrix.
    link_flows_origin: Vec<f64>,
    /// Pending per-origin deltas, same shape as `link_flows_origin`.
    current_iter_diff: Vec<f64>,
    weights: Vec<f64>,
    alphas_1: Vec<f64>,
    alphas_2: Vec<f64>,
}

impl LinkFlowLedger {
    pub(crate) fn new(num_links: usize, num_centroids: usize) -> Self {
        Self {
            n_links: num_links,
            link_flows: vec![0.0; num_links],
            link_flows_origin: vec![0.0; num_links * num_centroids],
            current_iter_diff: vec![0.0; num_links * num_centroids],
            weights: vec![0.0; num_links],
            alphas_1: vec![0.0; num_links],
            alphas_2: vec![0.0; num_links],
        }
    }

    /// Seed the free-flow weight and linearization of a newly added link.
    pub(crate) fn register_link(&mut self, link: &Link) {
        self.update_derivative(link);
    }

    /// Immediate mode: fold `path_flows` of one origin into the
    /// aggregate, refreshing the derivatives of every touched link.
    ///
    /// Links never traversed by any of the origin's paths carry a zero
    /// contribution and a zero previous contribution, so only the
    /// incidence keys need visiting.
    pub(crate) fn refresh_origin(&mut self, origin: usize, centroid: &Centroid, links: &[Link]) {
        let row = origin * self.n_links;
        for (&link_id, paths) in &centroid.path_link_incidence {
            let flow: f64 = paths.iter().map(|&p| centroid.path_flows[p]).sum();
            let diff = flow - self.link_flows_origin[row + link_id];
            self.link_flows[link_id] += diff;
            self.link_flows_origin[row + link_id] = flow;
            self.update_derivative(&links[link_id]);
        }
    }

    /// Deferred mode, phase one: compute the origin's would-be
    /// contribution from `path_flows_current_iter` and store the delta.
    /// The aggregate `link_flows` is left untouched.
    pub(crate) fn record_candidate(&mut self, origin: usize, centroid: &Centroid) {
        let row = origin * self.n_links;
        for (&link_id, paths) in &centroid.path_link_incidence {
            let flow: f64 = paths
                .iter()
                .map(|&p| centroid.path_flows_current_iter[p])
                .sum();
            self.current_iter_diff[row + link_id] = flow - self.link_flows_origin[row + link_id];
            self.link_flows_origin[row + link_id] = flow;
        }
    }

    /// Deferred mode, phase two: apply `stepsize * diff` for one origin
    /// to the aggregate. Derivatives stay stale until
    /// `update_all_derivatives`.
    pub(crate) fn apply_stepsize(&mut self, origin: usize, stepsize: f64) {
        let row = origin * self.n_links;
        for (link_id, flow) in self.link_flows.iter_mut().enumerate() {
            *flow += stepsize * self.current_iter_diff[row + link_id];
        }
    }

    /// Refresh travel times and linearization coefficients on every link.
    pub(crate) fn update_all_derivatives(&mut self, links: &[Link]) {
        (
            &mut self.weights,
            &mut self.alphas_1,
            &mut self.alphas_2,
            &self.link_flows,
            links,
        )
            .into_par_iter()
            .for_each(|(weight, alpha_1, alpha_2, &flow, link)| {
                *weight = link.travel_time(flow);
                let dtime = link.travel_time_derivative(flow);
                *alpha_1 = dtime / 2.0;
                *alpha_2 = *weight - flow * dtime;
            });
    }

    /// Beckmann objective over the current aggregate flows.
    pub(crate) fn objective(&self, links: &[Link]) -> f64 {
        (&self.link_flows, links)
            .into_par_iter()
            .map(|(&flow, link)| link.objective_term(flow))
            .sum()
    }

    fn update_derivative(&mut self, link: &Link) {
        let flow = self.link_flows[link.link_id];
        let weight = link.travel_time(flow);
        let dtime = link.travel_time_derivative(flow);
        self.weights[link.link_id] = weight;
        self.alphas_1[link.link_id] = dtime / 2.0;
        self.alphas_2[link.link_id] = weight - flow * dtime;
    }

    pub(crate) fn link_flows(&self) -> &[f64] {
        &self.link_flows
    }

    pub(crate) fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn alphas_1(&self) -> &[f64] {
        &self.alphas_1
    }

    pub(crate) fn alphas_2(&self) -> &[f64] {
        &self.alphas_2
    }

    pub(crate) fn origin_row(&self, origin: usize) -> &[f64] {
        &self.link_flows_origin[origin * self.n_links..(origin + 1) * self.n_links]
    }

    pub(crate) fn diff_row(&self, origin: usize) -> &[f64] {
        &self.current_iter_diff[origin * self.n_links..(origin + 1) * self.n_links]
    }
}
