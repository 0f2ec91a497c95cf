//! Sparse linear operators acting on [`Field`]s,
//! and the row/column manipulations used for boundary conditions.

use std::collections::BTreeMap;

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    error::{Result, WaveError},
    field::{Field, Generation},
};

/// A sparse matrix operator tagged with the discretization generation it was assembled on.
///
/// Operators can be scaled with the usual syntax and summed with [`Operator::try_add`],
/// e.g. `mass.try_add(&(theta * theta * k * k * stiffness.clone()))`.
#[derive(Clone, Debug)]
pub struct Operator {
    mat: nas::CsrMatrix<f64>,
    generation: Generation,
}

impl Operator {
    /// Wrap a CSR matrix.
    #[inline]
    pub fn new(mat: nas::CsrMatrix<f64>, generation: Generation) -> Self {
        Self { mat, generation }
    }

    /// The generation this operator was assembled on.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The underlying CSR matrix.
    #[inline]
    pub fn csr(&self) -> &nas::CsrMatrix<f64> {
        &self.mat
    }

    /// Apply this operator to a field of the same generation.
    pub fn apply(&self, input: &Field) -> Result<Field> {
        input.check(self.generation, self.mat.ncols())?;
        Ok(Field::from_values(&self.mat * &input.values, self.generation))
    }

    /// The quadratic form `⟨x, A x⟩`.
    pub fn quadratic_form(&self, x: &Field) -> Result<f64> {
        Ok(x.dot(&self.apply(x)?))
    }

    /// Sum of two operators of the same generation.
    pub fn try_add(&self, rhs: &Operator) -> Result<Operator> {
        if self.generation != rhs.generation {
            return Err(WaveError::StaleGeneration {
                expected: self.generation,
                actual: rhs.generation,
            });
        }
        Ok(Operator::new(&self.mat + &rhs.mat, self.generation))
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.mat == other.mat
    }
}

impl std::ops::Mul<Operator> for f64 {
    type Output = Operator;

    fn mul(self, mut rhs: Operator) -> Self::Output {
        rhs.mat *= self;
        rhs
    }
}

//
// matrix utilities
//

/// Build a CSR matrix with the given diagonal.
///
/// Zero entries are stored explicitly,
/// so the sparsity pattern is always the full diagonal.
pub(crate) fn diagonal_csr(diagonal: &na::DVector<f64>) -> nas::CsrMatrix<f64> {
    // identity has exactly the diagonal pattern; overwrite its ones
    let mut csr = nas::CsrMatrix::identity(diagonal.len());
    for (&diag, mat_diag) in diagonal.iter().zip(csr.values_mut()) {
        *mat_diag = diag;
    }
    csr
}

/// Position of entry `(row, col)` in the CSR value array, if it is stored.
#[inline]
fn entry_position(offsets: &[usize], cols: &[usize], row: usize, col: usize) -> Option<usize> {
    let range = offsets[row]..offsets[row + 1];
    cols[range.clone()]
        .binary_search(&col)
        .ok()
        .map(|p| p + range.start)
}

/// Impose Dirichlet values on a linear system `matrix * solution = rhs`.
///
/// For every constrained degree of freedom `i` with value `g`,
/// row and column `i` are zeroed except for the diagonal,
/// the eliminated column is moved to the right-hand side of the other rows,
/// and `rhs[i]` is set to `diag * g`.
/// The matrix stays symmetric, so it can still be handed to CG.
/// `solution[i]` is set to `g` as well to give the solver a good start.
///
/// The sparsity pattern is assumed to be structurally symmetric
/// with every diagonal entry stored, which holds for assembled FE matrices.
pub fn apply_boundary_values(
    matrix: &mut nas::CsrMatrix<f64>,
    solution: &mut na::DVector<f64>,
    rhs: &mut na::DVector<f64>,
    values: &BTreeMap<usize, f64>,
) {
    if values.is_empty() {
        return;
    }

    // used in place of a zero diagonal, where `diag * g` would lose the value
    let nonzero_diagonal: Vec<f64> = matrix
        .diagonal_as_csr()
        .values()
        .iter()
        .map(|d| d.abs())
        .filter(|d| *d > 0.)
        .collect();
    let fallback_diag = if nonzero_diagonal.is_empty() {
        1.
    } else {
        nonzero_diagonal.iter().sum::<f64>() / nonzero_diagonal.len() as f64
    };

    let (offsets, cols, vals) = matrix.csr_data_mut();
    for (&dof, &g) in values {
        let diag_pos = entry_position(offsets, cols, dof, dof);
        debug_assert!(diag_pos.is_some(), "Missing diagonal entry in row {dof}");
        let diag = diag_pos
            .map(|p| vals[p])
            .filter(|d| *d != 0.)
            .unwrap_or(fallback_diag);

        for pos in offsets[dof]..offsets[dof + 1] {
            let col = cols[pos];
            if col == dof {
                continue;
            }
            if let Some(sym_pos) = entry_position(offsets, cols, col, dof) {
                rhs[col] -= vals[sym_pos] * g;
                vals[sym_pos] = 0.;
            }
            vals[pos] = 0.;
        }
        if let Some(p) = diag_pos {
            vals[p] = diag;
        }
        rhs[dof] = diag * g;
        solution[dof] = g;
    }
}

//
// tests
//
