use crate::error::{AssignmentError, Result};
use crate::subproblem::SubproblemBuffers;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};

/// Solve one origin's subproblem with Clarabel and return the new
/// path-flow vector.
///
/// Clarabel's standard form is
///
///   minimize    ½ xᵀPx + qᵀx
///   subject to  Ax + s = b,  s ∈ K
///
/// so the dense subproblem maps onto P = Q (upper triangle), q = c,
/// and the stacked constraints [A; G] with a zero cone for the demand
/// rows and a nonnegative cone for the path-flow bounds.
pub fn solve_subproblem(bufs: &SubproblemBuffers) -> Result<Vec<f64>> {
    let n = bufs.num_paths;
    let m = bufs.num_destinations;

    let p = upper_triangle_csc(&bufs.q, n);
    let q = bufs.c.clone();

    let mut triplets = Vec::new();
    for row in 0..m {
        for col in 0..n {
            let val = bufs.a[n * row + col];
            if val != 0.0 {
                triplets.push((row, col, val));
            }
        }
    }
    for row in 0..n {
        for col in 0..n {
            let val = bufs.g[n * row + col];
            if val != 0.0 {
                triplets.push((m + row, col, val));
            }
        }
    }
    let a = csc_from_triplets(&triplets, m + n, n);

    let mut b = Vec::with_capacity(m + n);
    b.extend_from_slice(&bufs.b);
    b.extend_from_slice(&bufs.h);

    let mut cones = Vec::new();
    if m > 0 {
        cones.push(SupportedConeT::ZeroConeT(m));
    }
    if n > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(n));
    }

    let settings = DefaultSettings::<f64> {
        verbose: false,
        max_iter: 10000,
        tol_gap_abs: 1e-9,
        tol_gap_rel: 1e-9,
        tol_feas: 1e-9,
        ..Default::default()
    };

    let mut solver =
        DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            AssignmentError::QpSolveFailed {
                reason: format!("Failed to create Clarabel solver: {e}"),
            }
        })?;
    solver.solve();

    let failed = |reason: &str| AssignmentError::QpSolveFailed {
        reason: reason.to_string(),
    };

    match solver.info.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(solver.solution.x.clone()),
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Err(failed("Problem is primal infeasible"))
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            Err(failed("Problem is dual infeasible (unbounded)"))
        }
        SolverStatus::MaxIterations => Err(failed("Maximum iterations reached")),
        SolverStatus::MaxTime => Err(failed("Time limit reached")),
        SolverStatus::NumericalError => Err(failed("Numerical error in solver")),
        SolverStatus::InsufficientProgress => Err(failed("Solver made insufficient progress")),
        status => Err(AssignmentError::QpSolveFailed {
            reason: format!("Unexpected solver status: {status:?}"),
        }),
    }
}

/// Upper triangle of a dense row-major symmetric matrix as CSC.
fn upper_triangle_csc(dense: &[f64], n: usize) -> CscMatrix<f64> {
    let mut triplets = Vec::new();
    for row in 0..n {
        for col in row..n {
            let val = dense[n * row + col];
            if val != 0.0 {
                triplets.push((row, col, val));
            }
        }
    }
    csc_from_triplets(&triplets, n, n)
}

/// Build a CSC matrix from (row, col, value) triplets.
fn csc_from_triplets(triplets: &[(usize, usize, f64)], n_rows: usize, n_cols: usize) -> CscMatrix<f64> {
    let mut sorted = triplets.to_vec();
    sorted.sort_by_key(|&(row, col, _)| (col, row));

    let mut col_ptr = vec![0];
    let mut row_ind = Vec::with_capacity(sorted.len());
    let mut values = Vec::with_capacity(sorted.len());

    let mut current_col = 0;
    for &(row, col, val) in &sorted {
        while current_col < col {
            col_ptr.push(row_ind.len());
            current_col += 1;
        }
        row_ind.push(row);
        values.push(val);
    }
    while current_col < n_cols {
        col_ptr.push(row_ind.len());
        current_col += 1;
    }

    CscMatrix::new(n_rows, n_cols, col_ptr, row_ind, values)
}
