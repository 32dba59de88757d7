use crate::error::SolverError;
use crate::Real;
use na::DVector;
use nalgebra_sparse::CscMatrix;

/// Solves `a * x = b` for a symmetric positive-definite `a`, starting from the initial
/// guess stored in `x`.
///
/// Returns the number of iterations performed once the residual norm, relative to the norm
/// of `b`, falls below `tolerance`.
pub fn solve_conjugate_gradient(
    a: &CscMatrix<Real>,
    b: &DVector<Real>,
    x: &mut DVector<Real>,
    tolerance: Real,
    max_iters: usize,
) -> Result<usize, SolverError> {
    let b_norm = b.norm();

    if b_norm == 0.0 {
        x.fill(0.0);
        return Ok(0);
    }

    let mut r = b - a * &*x;
    let mut p = r.clone();
    let mut prev_rr = r.dot(&r);

    for iter in 0..max_iters {
        if prev_rr.sqrt() <= tolerance * b_norm {
            return Ok(iter);
        }

        let ap = a * &p;
        let pap = p.dot(&ap);

        if !pap.is_finite() {
            return Err(SolverError::NonFinite);
        }

        if pap <= 0.0 {
            return Err(SolverError::NotPositiveDefinite);
        }

        let alpha = prev_rr / pap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);
        let rr = r.dot(&r);
        let beta = rr / prev_rr;
        prev_rr = rr;
        p.axpy(1.0, &r, beta);
    }

    let residual = prev_rr.sqrt() / b_norm;

    if residual <= tolerance {
        Ok(max_iters)
    } else if residual.is_finite() {
        Err(SolverError::DidNotConverge {
            iterations: max_iters,
            residual,
        })
    } else {
        Err(SolverError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    // 1D Laplacian with a Dirichlet condition on its first node.
    fn laplacian(n: usize) -> CscMatrix<Real> {
        let mut coo = CooMatrix::new(n, n);

        for i in 0..n {
            coo.push(i, i, 2.0);
            if i > 0 {
                coo.push(i, i - 1, -1.0);
            }
            if i + 1 < n {
                coo.push(i, i + 1, -1.0);
            }
        }

        CscMatrix::from(&coo)
    }

    #[test]
    fn iteration_budget_is_reported() {
        let a = laplacian(20);
        let b = DVector::from_fn(20, |i, _| (i as Real * 0.37).sin());
        let mut x = DVector::zeros(20);

        match solve_conjugate_gradient(&a, &b, &mut x, 1.0e-12, 1) {
            Err(SolverError::DidNotConverge {
                iterations,
                residual,
            }) => {
                assert_eq!(iterations, 1);
                assert!(residual > 1.0e-12 && residual.is_finite());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // With enough iterations, the same system converges.
        let mut x = DVector::zeros(20);
        let niters = solve_conjugate_gradient(&a, &b, &mut x, 1.0e-12, 1_000).unwrap();
        assert!(niters > 1);
        assert!((&a * &x - &b).norm() <= 1.0e-10 * b.norm());
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let a = laplacian(5);
        let mut x = DVector::repeat(5, 3.0);
        assert_eq!(
            solve_conjugate_gradient(&a, &DVector::zeros(5), &mut x, 1.0e-12, 10),
            Ok(0)
        );
        assert_eq!(x, DVector::zeros(5));
    }
}
