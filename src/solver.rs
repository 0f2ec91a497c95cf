//! Iterative solvers for the symmetric positive definite systems of a time step.

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::error::{Result, WaveError};

/// Stopping criteria for an iterative solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverControl {
    /// Iteration budget. Running out of it is an error.
    pub max_iterations: usize,
    /// Required residual norm relative to the norm of the right-hand side.
    pub relative_tolerance: f64,
}

impl Default for SolverControl {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            relative_tolerance: 1e-8,
        }
    }
}

impl SolverControl {
    /// Absolute residual tolerance for a right-hand side with the given norm.
    #[inline]
    pub fn tolerance(&self, rhs_norm: f64) -> f64 {
        self.relative_tolerance * rhs_norm
    }
}

/// A solver for `A x = b`.
pub trait LinearSolver {
    /// Solve in place, using the incoming `x` as the initial guess.
    /// Returns the number of iterations performed.
    fn solve(
        &self,
        a: &nas::CsrMatrix<f64>,
        x: &mut na::DVector<f64>,
        b: &na::DVector<f64>,
    ) -> Result<usize>;
}

/// Unpreconditioned conjugate gradients.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConjugateGradient {
    /// Stopping criteria.
    pub control: SolverControl,
}

impl ConjugateGradient {
    /// Create a solver with the given stopping criteria.
    pub fn new(control: SolverControl) -> Self {
        Self { control }
    }
}

impl LinearSolver for ConjugateGradient {
    fn solve(
        &self,
        a: &nas::CsrMatrix<f64>,
        x: &mut na::DVector<f64>,
        b: &na::DVector<f64>,
    ) -> Result<usize> {
        if x.len() != b.len() {
            return Err(WaveError::InvalidStateSize {
                expected: b.len(),
                actual: x.len(),
            });
        }
        let b_norm = b.norm();
        if b_norm == 0. {
            x.fill(0.);
            return Ok(0);
        }
        let tolerance = self.control.tolerance(b_norm);

        let mut r = b - a * &*x;
        let mut r_norm_sq = r.norm_squared();
        if r_norm_sq.sqrt() <= tolerance {
            return Ok(0);
        }
        let mut p = r.clone();
        let mut ap = na::DVector::zeros(b.len());

        for iteration in 1..=self.control.max_iterations {
            ap.copy_from(&(a * &p));
            let p_ap = p.dot(&ap);
            if !(p_ap > 0.) {
                // loss of positive definiteness, most likely a broken operator
                return Err(WaveError::ConvergenceFailure {
                    iterations: iteration,
                    residual: r_norm_sq.sqrt(),
                    tolerance,
                });
            }
            let alpha = r_norm_sq / p_ap;
            x.axpy(alpha, &p, 1.);
            r.axpy(-alpha, &ap, 1.);

            let new_r_norm_sq = r.norm_squared();
            if new_r_norm_sq.sqrt() <= tolerance {
                return Ok(iteration);
            }
            let beta = new_r_norm_sq / r_norm_sq;
            r_norm_sq = new_r_norm_sq;
            p.axpy(1., &r, beta);
        }

        Err(WaveError::ConvergenceFailure {
            iterations: self.control.max_iterations,
            residual: r_norm_sq.sqrt(),
            tolerance,
        })
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn laplacian_1d(n: usize) -> nas::CsrMatrix<f64> {
        let mut coo = nas::CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 2.);
            if i + 1 < n {
                coo.push(i, i + 1, -1.);
                coo.push(i + 1, i, -1.);
            }
        }
        nas::CsrMatrix::from(&coo)
    }

    #[test]
    fn cg_solves_spd_system() {
        let n = 20;
        let a = laplacian_1d(n);
        let expected = na::DVector::from_fn(n, |i, _| (i as f64 * 0.3).sin());
        let b = &a * &expected;
        let mut x = na::DVector::zeros(n);
        let iterations = ConjugateGradient::default().solve(&a, &mut x, &b).unwrap();
        // exact arithmetic would need at most n iterations
        assert!(iterations > 0 && iterations <= n + 5);
        assert_relative_eq!(x, expected, epsilon = 1e-6);
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let a = laplacian_1d(4);
        let mut x = na::DVector::from_element(4, 3.);
        let b = na::DVector::zeros(4);
        assert_eq!(ConjugateGradient::default().solve(&a, &mut x, &b).unwrap(), 0);
        assert_eq!(x, na::DVector::zeros(4));
    }

    #[test]
    fn running_out_of_iterations_is_an_error() {
        let n = 50;
        let a = laplacian_1d(n);
        let b = na::DVector::from_element(n, 1.);
        let mut x = na::DVector::zeros(n);
        let solver = ConjugateGradient::new(SolverControl {
            max_iterations: 2,
            ..Default::default()
        });
        match solver.solve(&a, &mut x, &b) {
            Err(WaveError::ConvergenceFailure { iterations, .. }) => assert_eq!(iterations, 2),
            other => panic!("Expected a convergence failure, got {other:?}"),
        }
    }
}
