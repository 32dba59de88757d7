use crate::Real;

/// Discretization of the divergence of the normal field at a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum DivergenceScheme {
    /// Flux of the averaged cell normals through the faces opposite to the vertex.
    #[default]
    Standard,
    /// Same as `Standard`, with each term scaled by `3 / (sum of the distances from the
    /// vertex to the opposite face’s vertices)`.
    Normalized,
    /// Same as `Normalized`, with each term also weighted by the solid angle subtended by
    /// the opposite face at the vertex.
    SolidAngleNormalized,
}

/// The sparse linear solver used for the Poisson system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum SolverKind {
    /// Direct sparse Cholesky factorization.
    #[default]
    Cholesky,
    /// Iterative conjugate-gradient.
    ConjugateGradient,
}

/// Parameters of the implicit function computation.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ReconstructionConfig {
    /// Regularization added to the diagonal of the rows of input vertices. It pulls the
    /// implicit function toward zero at the samples.
    pub lambda: Real,
    /// Bound on the ratio between a tetrahedron’s circumradius and its shortest edge.
    /// Ignored if zero.
    pub radius_edge_ratio_bound: Real,
    /// Bound on a tetrahedron’s circumradius, relative to the radius of the input points’
    /// bounding sphere. Ignored if zero.
    pub cell_radius_factor: Real,
    /// Refinement stops once the triangulation reaches this number of vertices.
    pub max_vertices: usize,
    /// Ratio by which the input points’ bounding sphere is enlarged to obtain the
    /// region where Steiner points may be inserted.
    pub enlarge_ratio: Real,
    /// Discretization of the right-hand side.
    pub divergence: DivergenceScheme,
    /// Sparse solver backend.
    pub solver: SolverKind,
    /// Relative residual at which the conjugate-gradient backend stops.
    pub cg_tolerance: Real,
    /// Maximum number of iterations of the conjugate-gradient backend.
    pub cg_max_iterations: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            lambda: 0.1,
            radius_edge_ratio_bound: 2.5,
            cell_radius_factor: 0.2,
            max_vertices: 10_000_000,
            enlarge_ratio: 1.5,
            divergence: DivergenceScheme::Standard,
            solver: SolverKind::Cholesky,
            cg_tolerance: 1.0e-12,
            cg_max_iterations: 10_000,
        }
    }
}
