//! Per-cell error indicators that drive mesh adaptation.

use nalgebra as na;

use crate::{
    discretization::{CellData, Discretization, FaceNeighbors},
    element,
    error::Result,
    field::Field,
    mesh::Face,
    quadrature::LineRule,
    Vec2,
};

/// Something that assigns a non-negative error indicator to every active cell.
pub trait ErrorIndicator {
    /// Compute one indicator per active cell, in active cell order.
    fn estimate(&self, disc: &Discretization, field: &Field) -> Result<Vec<f64>>;
}

/// The Kelly gradient-jump indicator.
///
/// For every cell `K`,
/// `η_K² = Σ_F h_K / 24 ∫_F [∂u/∂n]²`
/// summed over the interior faces of `K`,
/// where `[∂u/∂n]` is the jump of the normal derivative across the face
/// and `h_K` is the diameter of the cell.
/// Boundary faces don't contribute.
#[derive(Clone, Copy, Debug, Default)]
pub struct KellyIndicator;

impl ErrorIndicator for KellyIndicator {
    fn estimate(&self, disc: &Discretization, field: &Field) -> Result<Vec<f64>> {
        disc.check(field)?;
        let rule = LineRule::gauss(2);
        let cells = disc.cells();

        let indicators = cells
            .iter()
            .map(|cell| {
                let values = cell.corner_values(&field.values);
                let diameter = cell.size * std::f64::consts::SQRT_2;
                let mut jump_integral = 0.;
                for (face, neighbors) in Face::ALL.iter().zip(&cell.neighbors) {
                    let [a, b] = face.corners().map(|c| cell.corner_position(c));
                    match *neighbors {
                        FaceNeighbors::Boundary => {}
                        FaceNeighbors::One(n) => {
                            jump_integral += face_jump(
                                &rule,
                                *face,
                                (cell, &values),
                                &cells[n],
                                &field.values,
                                [a, b],
                            );
                        }
                        FaceNeighbors::Two(halves) => {
                            let mid = 0.5 * (a + b);
                            for (n, segment) in halves.into_iter().zip([[a, mid], [mid, b]]) {
                                jump_integral += face_jump(
                                    &rule,
                                    *face,
                                    (cell, &values),
                                    &cells[n],
                                    &field.values,
                                    segment,
                                );
                            }
                        }
                    }
                }
                (diameter / 24. * jump_integral).sqrt()
            })
            .collect();
        Ok(indicators)
    }
}

/// `∫ [∂u/∂n]²` over the segment `[start, end]` of a face
/// shared by `cell` and `neighbor`.
fn face_jump(
    rule: &LineRule,
    face: Face,
    (cell, cell_values): (&CellData, &[f64; 4]),
    neighbor: &CellData,
    values: &na::DVector<f64>,
    [start, end]: [Vec2; 2],
) -> f64 {
    let neighbor_values = neighbor.corner_values(values);
    let normal = face.outward_normal();
    let length = (end - start).norm();
    rule.iter()
        .map(|(s, w)| {
            let x = start + s * (end - start);
            let inner = element::gradient(cell_values, cell.local_point(x), cell.size);
            let outer = element::gradient(&neighbor_values, neighbor.local_point(x), neighbor.size);
            let jump = (inner - outer).dot(&normal);
            w * length * jump * jump
        })
        .sum()
}

//
// tests
//
