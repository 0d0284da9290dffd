use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use traffic_assignment::TrafficAssignment;

/// Build a `size × size` directed grid with rightward and downward
/// links and demand from the top-left corner to every other corner.
fn grid_assignment(size: usize) -> TrafficAssignment {
    let num_nodes = size * size;
    let num_links = 2 * size * (size - 1);
    // one centroid but three destinations, so give the pool headroom
    let mut ta = TrafficAssignment::with_paths_per_od(num_links, num_nodes, 1, 12).unwrap();

    let mut link_id = 0;
    for row in 0..size {
        for col in 0..size {
            let node = (row * size + col) as u32;
            if col + 1 < size {
                ta.add_link(link_id, 1.0, 0.15, 4, 100.0, node, node + 1)
                    .unwrap();
                link_id += 1;
            }
            if row + 1 < size {
                ta.add_link(link_id, 1.0, 0.15, 4, 100.0, node, node + size as u32)
                    .unwrap();
                link_id += 1;
            }
        }
    }

    for corner in [size - 1, size * (size - 1), size * size - 1] {
        ta.insert_od(0, corner, 50.0).unwrap();
    }
    ta.set_edges();
    ta
}

fn bench_initial_solution(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_solution");
    for size in [8usize, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut ta = grid_assignment(size);
                ta.perform_initial_solution().unwrap();
                black_box(ta.get_objective_function())
            });
        });
    }
    group.finish();
}

fn bench_subproblem_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("subproblem_assembly");
    for size in [8usize, 16, 32] {
        let mut ta = grid_assignment(size);
        ta.perform_initial_solution().unwrap();
        // a second sweep under loaded weights grows the path pool
        ta.compute_shortest_paths(0).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(ta.subproblem(0).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_initial_solution, bench_subproblem_assembly);
criterion_main!(benches);
