//! Sparse symmetric linear solvers used for the Poisson system.

use crate::config::{ReconstructionConfig, SolverKind};
use crate::conjugate_gradient::solve_conjugate_gradient;
use crate::error::SolverError;
use crate::Real;
use na::DVector;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// A solver for sparse symmetric positive-definite systems `A * X = B`, assembled row by row.
pub trait SparseLinearSolver {
    /// Starts the assembly of the next row.
    fn begin_row(&mut self);
    /// Adds `value` to the coefficient at `column` of the current row.
    fn add_value(&mut self, column: usize, value: Real);
    /// Finishes the assembly of the current row.
    fn end_row(&mut self);
    /// Prepares the assembled matrix for solving.
    fn factorize(&mut self) -> Result<(), SolverError>;
    /// Solves the system for the right-hand side `b`.
    fn solve(&self, b: &DVector<Real>) -> Result<DVector<Real>, SolverError>;
}

/// Creates the solver backend selected by `config`, for a system with `num_rows` rows.
pub fn new_solver(
    config: &ReconstructionConfig,
    num_rows: usize,
    avg_nnz_per_row: usize,
) -> Box<dyn SparseLinearSolver> {
    match config.solver {
        SolverKind::Cholesky => Box::new(CholeskySolver::new(num_rows, avg_nnz_per_row)),
        SolverKind::ConjugateGradient => Box::new(ConjugateGradientSolver::new(
            num_rows,
            avg_nnz_per_row,
            config.cg_tolerance,
            config.cg_max_iterations,
        )),
    }
}

#[derive(Clone, Debug)]
struct RowAssembler {
    num_rows: usize,
    current_row: usize,
    triplets: Vec<(usize, usize, Real)>,
}

impl RowAssembler {
    fn new(num_rows: usize, avg_nnz_per_row: usize) -> Self {
        Self {
            num_rows,
            current_row: 0,
            triplets: Vec::with_capacity(num_rows * avg_nnz_per_row),
        }
    }

    fn add_value(&mut self, column: usize, value: Real) {
        debug_assert!(self.current_row < self.num_rows && column < self.num_rows);
        self.triplets.push((self.current_row, column, value));
    }

    fn end_row(&mut self) {
        self.current_row += 1;
    }

    fn has_positive_diagonal(&self) -> bool {
        let mut diagonal = vec![0.0; self.num_rows];

        for (i, j, val) in &self.triplets {
            if i == j {
                diagonal[*i] += *val;
            }
        }

        diagonal.iter().all(|d| *d > 0.0)
    }

    fn to_csc(&self) -> CscMatrix<Real> {
        let mut coo = CooMatrix::new(self.num_rows, self.num_rows);

        for (i, j, val) in &self.triplets {
            coo.push(*i, *j, *val);
        }

        // Duplicate entries are summed by the conversion.
        CscMatrix::from(&coo)
    }

    fn check_rhs(&self, b: &DVector<Real>) -> Result<(), SolverError> {
        if b.len() != self.num_rows {
            Err(SolverError::DimensionMismatch {
                expected: self.num_rows,
                found: b.len(),
            })
        } else {
            Ok(())
        }
    }
}

/// Direct solver based on a sparse Cholesky factorization `A = L Lᵀ`.
pub struct CholeskySolver {
    assembler: RowAssembler,
    factorization: Option<CscCholesky<Real>>,
    factorized: bool,
}

impl CholeskySolver {
    /// Creates a solver for a system with `num_rows` rows having, on average,
    /// `avg_nnz_per_row` non-zero coefficients.
    pub fn new(num_rows: usize, avg_nnz_per_row: usize) -> Self {
        Self {
            assembler: RowAssembler::new(num_rows, avg_nnz_per_row),
            factorization: None,
            factorized: false,
        }
    }
}

impl SparseLinearSolver for CholeskySolver {
    fn begin_row(&mut self) {}

    fn add_value(&mut self, column: usize, value: Real) {
        self.assembler.add_value(column, value);
    }

    fn end_row(&mut self) {
        self.assembler.end_row();
    }

    fn factorize(&mut self) -> Result<(), SolverError> {
        self.factorized = false;

        if self.assembler.num_rows != 0 {
            let lhs = self.assembler.to_csc();
            let chol = CscCholesky::factor(&lhs).map_err(|_| SolverError::NotPositiveDefinite)?;
            self.factorization = Some(chol);
        }

        self.factorized = true;
        Ok(())
    }

    fn solve(&self, b: &DVector<Real>) -> Result<DVector<Real>, SolverError> {
        if !self.factorized {
            return Err(SolverError::NotFactorized);
        }

        self.assembler.check_rhs(b)?;

        let mut x = b.clone();

        if let Some(chol) = &self.factorization {
            chol.solve_mut(&mut x);
        }

        if x.iter().all(|e| e.is_finite()) {
            Ok(x)
        } else {
            Err(SolverError::NonFinite)
        }
    }
}

/// Iterative conjugate-gradient solver.
#[derive(Clone, Debug)]
pub struct ConjugateGradientSolver {
    assembler: RowAssembler,
    lhs: Option<CscMatrix<Real>>,
    tolerance: Real,
    max_iters: usize,
}

impl ConjugateGradientSolver {
    /// Creates a solver for a system with `num_rows` rows having, on average,
    /// `avg_nnz_per_row` non-zero coefficients.
    pub fn new(num_rows: usize, avg_nnz_per_row: usize, tolerance: Real, max_iters: usize) -> Self {
        Self {
            assembler: RowAssembler::new(num_rows, avg_nnz_per_row),
            lhs: None,
            tolerance,
            max_iters,
        }
    }
}

impl SparseLinearSolver for ConjugateGradientSolver {
    fn begin_row(&mut self) {}

    fn add_value(&mut self, column: usize, value: Real) {
        self.assembler.add_value(column, value);
    }

    fn end_row(&mut self) {
        self.assembler.end_row();
    }

    fn factorize(&mut self) -> Result<(), SolverError> {
        self.lhs = None;

        // A necessary condition for positive-definiteness. The iterations detect the rest.
        if !self.assembler.has_positive_diagonal() {
            return Err(SolverError::NotPositiveDefinite);
        }

        self.lhs = Some(self.assembler.to_csc());
        Ok(())
    }

    fn solve(&self, b: &DVector<Real>) -> Result<DVector<Real>, SolverError> {
        let lhs = self.lhs.as_ref().ok_or(SolverError::NotFactorized)?;
        self.assembler.check_rhs(b)?;

        let mut x = DVector::zeros(b.len());
        let niters = solve_conjugate_gradient(lhs, b, &mut x, self.tolerance, self.max_iters)?;
        log::trace!("Conjugate gradient converged after {} iterations.", niters);
        Ok(x)
    }
}
