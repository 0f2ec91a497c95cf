use std::collections::BTreeMap;

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::operator::diagonal_csr;

/// Linear constraints `x[i] = Σ w_j x[j]` between degrees of freedom,
/// used to keep fields continuous across hanging vertices.
///
/// Constraints are *closed* on construction:
/// no constrained degree of freedom appears on the right-hand side of another constraint,
/// so they can be applied in any order.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
    lines: BTreeMap<usize, Vec<(usize, f64)>>,
    /// matrix `C` mapping unconstrained values to the full vector,
    /// i.e. identity on free rows and the constraint weights on constrained rows
    expansion: nas::CsrMatrix<f64>,
    /// transpose of `expansion`, stored for condensing right-hand sides
    expansion_t: nas::CsrMatrix<f64>,
}

impl ConstraintSet {
    /// Build a closed constraint set for `n_dofs` degrees of freedom
    /// from lines that may refer to other constrained degrees of freedom.
    pub fn new(n_dofs: usize, mut lines: BTreeMap<usize, Vec<(usize, f64)>>) -> Self {
        // resolve chains of constraints until every right-hand side is free.
        // the hanging vertex hierarchy is acyclic so this terminates
        loop {
            let chained: Vec<usize> = lines
                .iter()
                .filter(|(_, entries)| entries.iter().any(|(m, _)| lines.contains_key(m)))
                .map(|(dof, _)| *dof)
                .collect();
            if chained.is_empty() {
                break;
            }
            for dof in chained {
                let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
                for &(master, weight) in &lines[&dof] {
                    match lines.get(&master) {
                        Some(inner) => {
                            for &(m, w) in inner {
                                *merged.entry(m).or_default() += weight * w;
                            }
                        }
                        None => *merged.entry(master).or_default() += weight,
                    }
                }
                lines.insert(dof, merged.into_iter().collect());
            }
        }

        let mut coo = nas::CooMatrix::new(n_dofs, n_dofs);
        for dof in 0..n_dofs {
            match lines.get(&dof) {
                Some(entries) => {
                    for &(master, weight) in entries {
                        coo.push(dof, master, weight);
                    }
                }
                None => coo.push(dof, dof, 1.),
            }
        }
        let expansion = nas::CsrMatrix::from(&coo);
        let expansion_t = expansion.transpose();

        Self {
            lines,
            expansion,
            expansion_t,
        }
    }

    /// Number of constrained degrees of freedom.
    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.lines.len()
    }

    /// Whether the given degree of freedom is constrained.
    #[inline]
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.lines.contains_key(&dof)
    }

    /// The closed constraint for a degree of freedom, if any.
    #[inline]
    pub fn line(&self, dof: usize) -> Option<&[(usize, f64)]> {
        self.lines.get(&dof).map(|l| l.as_slice())
    }

    /// Overwrite constrained entries of a vector with the values their constraints dictate.
    pub fn distribute(&self, values: &mut na::DVector<f64>) {
        for (&dof, entries) in &self.lines {
            values[dof] = entries.iter().map(|&(m, w)| w * values[m]).sum();
        }
    }

    /// Condense a matrix: `Cᵀ A C`, with a positive diagonal placed
    /// on the otherwise empty rows of constrained degrees of freedom
    /// so that the result stays positive definite.
    pub fn condense_matrix(&self, mat: &nas::CsrMatrix<f64>) -> nas::CsrMatrix<f64> {
        if self.lines.is_empty() {
            return mat.clone();
        }
        let condensed = &(&self.expansion_t * mat) * &self.expansion;

        // scale the placeholder diagonal like the rest of the matrix
        let free_diagonal: Vec<f64> = condensed
            .diagonal_as_csr()
            .triplet_iter()
            .filter(|(row, _, _)| !self.is_constrained(*row))
            .map(|(_, _, v)| v.abs())
            .collect();
        let scale = if free_diagonal.is_empty() {
            1.
        } else {
            free_diagonal.iter().sum::<f64>() / free_diagonal.len() as f64
        };
        let placeholder = na::DVector::from_iterator(
            mat.nrows(),
            (0..mat.nrows()).map(|i| if self.is_constrained(i) { scale } else { 0. }),
        );

        &condensed + &diagonal_csr(&placeholder)
    }

    /// Condense a right-hand side: `Cᵀ b`.
    /// Constrained entries of the result are zero.
    pub fn condense_vector(&self, rhs: &na::DVector<f64>) -> na::DVector<f64> {
        if self.lines.is_empty() {
            return rhs.clone();
        }
        &self.expansion_t * rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chains_are_resolved() {
        // 3 = (0 + 1) / 2, 4 = (3 + 2) / 2
        let lines = BTreeMap::from([
            (3, vec![(0, 0.5), (1, 0.5)]),
            (4, vec![(3, 0.5), (2, 0.5)]),
        ]);
        let constraints = ConstraintSet::new(5, lines);
        assert_eq!(constraints.n_constraints(), 2);
        assert_eq!(
            constraints.line(4).unwrap(),
            &[(0, 0.25), (1, 0.25), (2, 0.5)]
        );

        let mut v = na::DVector::from_vec(vec![4., 8., 2., 0., 0.]);
        constraints.distribute(&mut v);
        assert_relative_eq!(v[3], 6.);
        assert_relative_eq!(v[4], 4.);
    }

    #[test]
    fn condensation_preserves_energy_of_constrained_vectors() {
        // a 3-dof path graph Laplacian with the middle dof hanging
        let mut coo = nas::CooMatrix::new(3, 3);
        for (i, j, v) in [
            (0, 0, 1.),
            (0, 1, -1.),
            (1, 0, -1.),
            (1, 1, 2.),
            (1, 2, -1.),
            (2, 1, -1.),
            (2, 2, 1.),
        ] {
            coo.push(i, j, v);
        }
        let mat = nas::CsrMatrix::from(&coo);
        let constraints = ConstraintSet::new(3, BTreeMap::from([(1, vec![(0, 0.5), (2, 0.5)])]));
        let condensed = constraints.condense_matrix(&mat);

        let mut x = na::DVector::from_vec(vec![1., 0., 3.]);
        constraints.distribute(&mut x);
        let mut x_free = x.clone();
        x_free[1] = 0.;
        let full_energy = x.dot(&(&mat * &x));
        let condensed_energy = x_free.dot(&(&condensed * &x_free));
        assert_relative_eq!(full_energy, condensed_energy, epsilon = 1e-12);

        let dense = nas::convert::serial::convert_csr_dense(&condensed);
        assert_relative_eq!(dense, dense.transpose());
        assert!(dense[(1, 1)] > 0.);
        assert_relative_eq!(dense[(0, 1)], 0.);

        let b = na::DVector::from_vec(vec![1., 2., 3.]);
        let cb = constraints.condense_vector(&b);
        assert_relative_eq!(cb, na::DVector::from_vec(vec![2., 0., 4.]));
    }
}
