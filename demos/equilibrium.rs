//! A minimal outer equilibrium loop over the assignment core.
//!
//! Run:
//! cargo run --example equilibrium
//!
//! Two origins route demand across a shared bottleneck and a pricier
//! bypass; the loop alternates path generation, per-origin subproblem
//! solves, and a unit-step mix until the Beckmann objective settles.

use traffic_assignment::{Result, TrafficAssignment, solve_subproblem};

fn build_assignment() -> Result<TrafficAssignment> {
    //   0 ─(0)→ 2 ─(2)→ 3      shared middle leg
    //   1 ─(1)→ 2
    //   0 ─(3)→ 3, 1 ─(4)→ 3   bypasses
    let mut ta = TrafficAssignment::new(5, 4, 2)?;
    ta.add_link(0, 1.0, 0.15, 4, 60.0, 0, 2)?;
    ta.add_link(1, 1.0, 0.15, 4, 60.0, 1, 2)?;
    ta.add_link(2, 1.0, 0.15, 4, 60.0, 2, 3)?;
    ta.add_link(3, 2.5, 0.15, 4, 60.0, 0, 3)?;
    ta.add_link(4, 2.5, 0.15, 4, 60.0, 1, 3)?;
    ta.insert_od(0, 3, 40.0)?;
    ta.insert_od(1, 3, 35.0)?;
    ta.set_edges();
    Ok(ta)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut ta = build_assignment()?;
    ta.perform_initial_solution()?;
    println!("initial objective: {:.4}", ta.get_objective_function());

    for iteration in 1..=20 {
        for origin in 0..ta.num_centroids() {
            ta.compute_shortest_paths(origin)?;
            let bufs = ta.subproblem(origin)?;
            let flows = solve_subproblem(&bufs)?;
            ta.update_path_flows_without_link_flows(origin, &flows)?;
        }
        for origin in 0..ta.num_centroids() {
            ta.update_path_flows_stepsize(origin, 1.0)?;
            ta.update_link_flows_stepsize(origin, 1.0)?;
        }
        ta.update_all_link_derivatives();

        println!(
            "iteration {iteration:>2}: objective {:.4}",
            ta.get_objective_function()
        );
    }

    println!("\nlink flows: {:?}", ta.link_flows());
    for origin in 0..ta.num_centroids() {
        let (times, flows) = ta.get_odpath_times(origin, 3)?;
        println!("origin {origin}: path times {times:?}, path flows {flows:?}");
    }
    Ok(())
}
