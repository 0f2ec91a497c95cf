//! The bilinear (Q1) Lagrange element on square cells.
//!
//! Shape functions are numbered like cell corners,
//! `0 = (0, 0), 1 = (1, 0), 2 = (0, 1), 3 = (1, 1)` in local coordinates,
//! so shape function `k` is one at corner `k` and zero at the others.

use nalgebra as na;

use crate::{quadrature::SquareRule, Vec2};

/// Values of the four shape functions at a local point in `[0, 1]²`.
#[inline]
pub fn shape_values(p: Vec2) -> [f64; 4] {
    let (x, y) = (p.x, p.y);
    [
        (1. - x) * (1. - y),
        x * (1. - y),
        (1. - x) * y,
        x * y,
    ]
}

/// Gradients of the four shape functions on the reference square.
///
/// Divide by the cell size to get physical gradients.
#[inline]
pub fn shape_gradients(p: Vec2) -> [Vec2; 4] {
    let (x, y) = (p.x, p.y);
    [
        Vec2::new(-(1. - y), -(1. - x)),
        Vec2::new(1. - y, -x),
        Vec2::new(-y, 1. - x),
        Vec2::new(y, x),
    ]
}

/// Physical gradient of the bilinear function with the given corner values
/// at local point `p` of a cell with side length `size`.
#[inline]
pub fn gradient(corner_values: &[f64; 4], p: Vec2, size: f64) -> Vec2 {
    shape_gradients(p)
        .iter()
        .zip(corner_values)
        .map(|(g, v)| g * *v)
        .sum::<Vec2>()
        / size
}

/// Value of the bilinear function with the given corner values at local point `p`.
#[inline]
pub fn value(corner_values: &[f64; 4], p: Vec2) -> f64 {
    shape_values(p)
        .iter()
        .zip(corner_values)
        .map(|(s, v)| s * v)
        .sum()
}

/// Local matrices of the element on a unit cell.
///
/// The mass matrix scales with the cell area;
/// the stiffness matrix of the Laplacian is the same on every square in 2D.
#[derive(Clone, Debug)]
pub struct ReferenceMatrices {
    /// `∫ φ_i φ_j` over the unit square.
    pub mass: na::Matrix4<f64>,
    /// `∫ ∇φ_i · ∇φ_j` over the unit square.
    pub stiffness: na::Matrix4<f64>,
}

impl ReferenceMatrices {
    /// Integrate the local matrices with a 2x2 Gauss rule, which is exact for Q1.
    pub fn new() -> Self {
        let rule = SquareRule::gauss(2);
        let mut mass = na::Matrix4::zeros();
        let mut stiffness = na::Matrix4::zeros();
        for (p, w) in rule.iter() {
            let phi = shape_values(p);
            let grad = shape_gradients(p);
            for i in 0..4 {
                for j in 0..4 {
                    mass[(i, j)] += w * phi[i] * phi[j];
                    stiffness[(i, j)] += w * grad[i].dot(&grad[j]);
                }
            }
        }
        Self { mass, stiffness }
    }
}

impl Default for ReferenceMatrices {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reference_matrices_match_closed_form() {
        let m = ReferenceMatrices::new();
        #[rustfmt::skip]
        let expected_mass = na::Matrix4::new(
            4., 2., 2., 1.,
            2., 4., 1., 2.,
            2., 1., 4., 2.,
            1., 2., 2., 4.,
        ) / 36.;
        #[rustfmt::skip]
        let expected_stiffness = na::Matrix4::new(
             4., -1., -1., -2.,
            -1.,  4., -2., -1.,
            -1., -2.,  4., -1.,
            -2., -1., -1.,  4.,
        ) / 6.;
        assert_relative_eq!(m.mass, expected_mass, epsilon = 1e-14);
        assert_relative_eq!(m.stiffness, expected_stiffness, epsilon = 1e-14);
    }

    #[test]
    fn bilinear_functions_are_reproduced() {
        // f(x, y) = 1 + 2x - 3y + 4xy on a cell of size 0.5
        let size = 0.5;
        let f = |x: f64, y: f64| 1. + 2. * x - 3. * y + 4. * x * y;
        let corners = [f(0., 0.), f(size, 0.), f(0., size), f(size, size)];
        let p = Vec2::new(0.3, 0.8);
        let (x, y) = (p.x * size, p.y * size);
        assert_relative_eq!(value(&corners, p), f(x, y), epsilon = 1e-14);
        let g = gradient(&corners, p, size);
        assert_relative_eq!(g, Vec2::new(2. + 4. * y, -3. + 4. * x), epsilon = 1e-13);
    }
}
