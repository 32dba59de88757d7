//! Assembly and solve of the discrete Poisson equation `Δf = div(n)` over the vertices of
//! the triangulation.

use crate::config::{DivergenceScheme, ReconstructionConfig};
use crate::error::ReconstructionError;
use crate::operators;
use crate::solver::{new_solver, SparseLinearSolver};
use crate::timing::Timed;
use crate::triangulation::{Triangulation, VertexId, VertexRole};
use crate::Real;
use fnv::FnvHashMap;
use na::DVector;
use std::time::Duration;

/// Average number of non-zero coefficients per row of the Poisson system.
pub const AVG_NNZ_PER_ROW: usize = 9;

/// Timings and size of a Poisson solve.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SystemStats {
    /// Number of unknowns of the linear system.
    pub num_unknowns: usize,
    /// Time spent assembling the system.
    pub assembly: Duration,
    /// Time spent factorizing the matrix.
    pub factorization: Duration,
    /// Time spent solving the factorized system.
    pub solve: Duration,
}

/// Solves the Poisson equation with the solver selected by `config`, and stores the
/// solution in the `f` field of the unconstrained vertices.
///
/// `lambda` is added to the diagonal of the rows of input vertices.
pub fn solve_poisson(
    tr: &mut Triangulation,
    lambda: Real,
    config: &ReconstructionConfig,
) -> Result<SystemStats, ReconstructionError> {
    let num_unknowns = index_unknowns(tr);
    let mut solver = new_solver(config, num_unknowns, AVG_NNZ_PER_ROW);
    solve_poisson_with(tr, num_unknowns, solver.as_mut(), lambda, config.divergence)
}

/// Constrains one convex-hull vertex to zero, then assigns a row of the linear system to
/// every other vertex.
///
/// Constraints left by a previous solve are released first: their values were shifted and
/// possibly negated by the normalization since then.
///
/// Returns the number of unknowns.
pub fn index_unknowns(tr: &mut Triangulation) -> usize {
    let vertices: Vec<_> = tr.finite_vertices().collect();
    for v in vertices {
        tr.vertex_mut(v).constrained = false;
    }

    let _ = constrain_one_vertex_on_convex_hull(tr);
    tr.index_unconstrained_vertices()
}

/// Fixes the value of one convex-hull vertex to zero.
pub fn constrain_one_vertex_on_convex_hull(tr: &mut Triangulation) -> Option<VertexId> {
    let v = tr.any_vertex_on_convex_hull()?;
    let vertex = tr.vertex_mut(v);
    vertex.constrained = true;
    vertex.f = 0.0;
    Some(v)
}

/// Same as [`solve_poisson`] with an explicit solver, for a triangulation already indexed
/// with [`index_unknowns`].
///
/// The vertex values are left untouched if the factorization or the solve fails.
pub fn solve_poisson_with(
    tr: &mut Triangulation,
    num_unknowns: usize,
    solver: &mut dyn SparseLinearSolver,
    lambda: Real,
    divergence: DivergenceScheme,
) -> Result<SystemStats, ReconstructionError> {
    let mut stats = SystemStats {
        num_unknowns,
        ..Default::default()
    };

    let timer = Timed::debug("Poisson system assembly");
    let b = assemble_poisson_system(tr, num_unknowns, solver, lambda, divergence);
    stats.assembly = timer.elapsed();
    drop(timer);

    let timer = Timed::debug("Poisson system factorization");
    solver
        .factorize()
        .map_err(ReconstructionError::Factorization)?;
    stats.factorization = timer.elapsed();
    drop(timer);

    let timer = Timed::debug("Poisson system solve");
    let x = solver.solve(&b).map_err(ReconstructionError::Solve)?;
    stats.solve = timer.elapsed();
    drop(timer);

    let vertices: Vec<_> = tr.finite_vertices().collect();
    for v in vertices {
        let vertex = tr.vertex_mut(v);
        if let Some(i) = vertex.index() {
            vertex.f = x[i];
        }
    }

    Ok(stats)
}

/// Hands one row per unconstrained vertex to `solver`, in the order of their indices.
///
/// Returns the right-hand side.
pub fn assemble_poisson_system(
    tr: &Triangulation,
    num_unknowns: usize,
    solver: &mut dyn SparseLinearSolver,
    lambda: Real,
    divergence: DivergenceScheme,
) -> DVector<Real> {
    let mut b = DVector::zeros(num_unknowns);
    // Each weight is computed once, and removed from the cache by the second row using it.
    let mut cotan_cache = FnvHashMap::default();

    for v in tr.finite_vertices() {
        let vertex = tr.vertex(v);

        if vertex.constrained {
            continue;
        }

        if let Some(i) = vertex.index() {
            b[i] = operators::divergence(tr, v, divergence);
            assemble_poisson_row(tr, v, i, solver, &mut b, lambda, &mut cotan_cache);
        }
    }

    b
}

fn assemble_poisson_row(
    tr: &Triangulation,
    vi: VertexId,
    i: usize,
    solver: &mut dyn SparseLinearSolver,
    b: &mut DVector<Real>,
    lambda: Real,
    cotan_cache: &mut FnvHashMap<(VertexId, VertexId), Real>,
) {
    let mut diagonal = 0.0;

    solver.begin_row();

    for vj in tr.incident_vertices(vi) {
        if tr.is_infinite_vertex(vj) {
            continue;
        }

        let cij = cotan_weight(tr, vi, vj, cotan_cache);
        let neighbor = tr.vertex(vj);

        match neighbor.index() {
            Some(j) if !neighbor.constrained => solver.add_value(j, -cij),
            _ => b[i] -= cij * neighbor.f,
        }

        diagonal += cij;
    }

    if tr.vertex(vi).role == VertexRole::Input {
        diagonal += lambda;
    }

    solver.add_value(i, diagonal);
    solver.end_row();
}

fn cotan_weight(
    tr: &Triangulation,
    vi: VertexId,
    vj: VertexId,
    cache: &mut FnvHashMap<(VertexId, VertexId), Real>,
) -> Real {
    let key = (vi.min(vj), vi.max(vj));

    if let Some(weight) = cache.remove(&key) {
        return weight;
    }

    let weight = tr
        .is_edge(key.1, key.0)
        .map(|edge| operators::cotan_geometric(tr, edge))
        .unwrap_or(0.0);
    let _ = cache.insert(key, weight);
    weight
}
