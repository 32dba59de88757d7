/// Failure of a sparse linear solver backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    /// The factorization broke down because the matrix is not positive-definite.
    #[error("the matrix is not symmetric positive-definite")]
    NotPositiveDefinite,
    /// The iterative solver did not reach the requested tolerance.
    #[error("the solver did not converge after {iterations} iterations (relative residual: {residual:e})")]
    DidNotConverge {
        /// Number of iterations performed.
        iterations: usize,
        /// Relative residual reached after the last iteration.
        residual: f64,
    },
    /// A NaN or infinite value appeared during the solve.
    #[error("a non-finite value was encountered during the solve")]
    NonFinite,
    /// `solve` was called before a successful `factorize`.
    #[error("the system must be factorized before being solved")]
    NotFactorized,
    /// The right-hand side does not match the number of assembled rows.
    #[error("expected a right-hand side of dimension {expected}, found {found}")]
    DimensionMismatch {
        /// Number of rows of the assembled matrix.
        expected: usize,
        /// Dimension of the provided right-hand side.
        found: usize,
    },
}

/// Failure of the implicit function computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconstructionError {
    /// The factorization step of the Poisson system failed.
    #[error("cannot factorize the Poisson system: {0}")]
    Factorization(SolverError),
    /// The solve step of the Poisson system failed.
    #[error("cannot solve the Poisson system: {0}")]
    Solve(SolverError),
    /// Exactly one normal per point must be provided.
    #[error("{points} points were provided with {normals} normals")]
    MismatchedNormals {
        /// Number of points.
        points: usize,
        /// Number of normals.
        normals: usize,
    },
}
