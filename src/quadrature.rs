//! Gauss-Legendre quadratures on line segments and squares.
//!
//! Points are given on the unit interval `[0, 1]` and the unit square `[0, 1]²`
//! with weights summing to the measure of the reference domain (1).
//! Scale by the length or area of the actual cell when integrating.
//!
//! An `n`-point rule is exact for polynomials of order `2n - 1` or less
//! in each coordinate direction.
//! Bilinear elements need two points per direction
//! for the mass matrix to be integrated exactly.

use crate::Vec2;

#[derive(Clone, Copy, Debug)]
struct GaussPoint {
    weight: f64,
    abscissa: f64,
}

// abscissae ±1/√3 on [-1, 1], mapped to [0, 1] by the rules below

const WEIGHTS_GL_2: [GaussPoint; 2] = [
    GaussPoint {
        weight: 1.0,
        abscissa: -0.5773502691896257,
    },
    GaussPoint {
        weight: 1.0,
        abscissa: 0.5773502691896257,
    },
];

const WEIGHTS_GL_3: [GaussPoint; 3] = [
    GaussPoint {
        weight: 0.8888888888888888,
        abscissa: 0.0000000000000000,
    },
    GaussPoint {
        weight: 0.5555555555555556,
        abscissa: -0.7745966692414834,
    },
    GaussPoint {
        weight: 0.5555555555555556,
        abscissa: 0.7745966692414834,
    },
];

/// A quadrature rule on the unit interval.
#[derive(Clone, Debug)]
pub struct LineRule {
    /// Positions in `[0, 1]`.
    pub points: Vec<f64>,
    /// Weights summing to 1.
    pub weights: Vec<f64>,
}

impl LineRule {
    /// Gauss-Legendre rule with `n` points. Only 2 and 3 points are available.
    pub fn gauss(n: usize) -> Self {
        let table: &[GaussPoint] = match n {
            2 => &WEIGHTS_GL_2,
            3 => &WEIGHTS_GL_3,
            _ => panic!("No {n}-point Gauss-Legendre rule available"),
        };
        Self {
            points: table.iter().map(|p| 0.5 * (p.abscissa + 1.)).collect(),
            weights: table.iter().map(|p| 0.5 * p.weight).collect(),
        }
    }

    /// Iterate over `(point, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }
}

/// A tensor-product quadrature rule on the unit square.
#[derive(Clone, Debug)]
pub struct SquareRule {
    /// Positions in `[0, 1]²`.
    pub points: Vec<Vec2>,
    /// Weights summing to 1.
    pub weights: Vec<f64>,
}

impl SquareRule {
    /// Tensor product of two `n`-point Gauss-Legendre rules.
    pub fn gauss(n: usize) -> Self {
        let line = LineRule::gauss(n);
        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for (y, wy) in line.iter() {
            for (x, wx) in line.iter() {
                points.push(Vec2::new(x, y));
                weights.push(wx * wy);
            }
        }
        Self { points, weights }
    }

    /// Iterate over `(point, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Vec2, f64)> + '_ {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }
}

//
// tests
//
