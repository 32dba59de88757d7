/*!
Poisson surface reconstruction solved on an adaptively refined 3D Delaunay triangulation,
after [Poisson Surface Reconstruction](https://hhoppe.com/poissonrecon.pdf) by Kazhdan, Bolitho,
and Hoppe, and its Delaunay-based variant by Alliez, Saboret, and Tayeb.

The input points and their oriented normals are inserted into a Delaunay triangulation,
refined with Steiner points, and a piecewise-linear implicit function is computed at its
vertices by solving `Δf = div(n)`. The function is zero at the input points and negative
inside of the reconstructed surface.
*/

#![allow(clippy::type_complexity, clippy::too_many_arguments)]
#![warn(missing_docs)]

/// Floating-point type used by this library.
pub type Real = f64;

extern crate nalgebra as na;
extern crate parry3d_f64 as parry;

pub use self::config::{DivergenceScheme, ReconstructionConfig, SolverKind};
pub use self::error::{ReconstructionError, SolverError};
pub use self::evaluator::{FieldEvaluator, UNDEFINED_VALUE};
pub use self::poisson::{PoissonReconstruction, SolveStats};
pub use self::solver::{CholeskySolver, ConjugateGradientSolver, SparseLinearSolver};
pub use self::triangulation::{Triangulation, VertexId, VertexRole};

pub mod assembly;
mod config;
mod conjugate_gradient;
mod error;
pub mod evaluator;
pub mod normalization;
pub mod operators;
mod poisson;
pub mod predicates;
pub mod refinement;
pub mod solver;
#[cfg(test)]
mod test_utils;
mod timing;
pub mod triangulation;
