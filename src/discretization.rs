//! Bilinear finite element discretizations built on a [`QuadMesh`].
//!
//! A [`Discretization`] owns everything derived from one state of the mesh:
//! the numbering of degrees of freedom (one per vertex),
//! hanging-vertex constraints, the mass and stiffness operators,
//! and a copy of the cell geometry and face adjacency
//! so that it stays usable after the mesh has moved on.
//! It is immutable once built;
//! adapting the mesh produces a new discretization with the next [`Generation`].

mod constraints;
#[doc(inline)]
pub use constraints::ConstraintSet;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fixedbitset as fb;
use itertools::Itertools;
use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    element::{self, ReferenceMatrices},
    error::Result,
    field::{Field, Generation},
    mesh::{Face, LatticePoint, Neighbor, QuadMesh},
    operator::Operator,
    quadrature::SquareRule,
    Vec2,
};

/// The active cells across one face of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceNeighbors {
    /// The face lies on the domain boundary.
    Boundary,
    /// A single cell of the same size or one level coarser.
    One(usize),
    /// Two cells one level finer, in the order they appear along the face.
    Two([usize; 2]),
}

/// Geometry and connectivity of one active cell.
#[derive(Clone, Debug)]
pub struct CellData {
    /// Arena id of the cell in the mesh.
    pub id: usize,
    /// Arena id of the parent cell.
    pub parent: Option<usize>,
    /// Which child of its parent this cell is.
    pub child_index: usize,
    /// Refinement level.
    pub level: u8,
    /// Physical position of the low corner.
    pub origin: Vec2,
    /// Physical side length.
    pub size: f64,
    /// Degrees of freedom at the four corners.
    pub dofs: [usize; 4],
    /// Neighbors across each face, in the order of [`Face::ALL`].
    pub neighbors: [FaceNeighbors; 4],
}

impl CellData {
    /// Map a physical point to local coordinates in `[0, 1]²`.
    #[inline]
    pub fn local_point(&self, p: Vec2) -> Vec2 {
        (p - self.origin) / self.size
    }

    /// Physical position of a corner.
    #[inline]
    pub fn corner_position(&self, corner: usize) -> Vec2 {
        self.origin + Vec2::new((corner & 1) as f64, (corner >> 1) as f64) * self.size
    }

    /// Values of a field at the four corners.
    #[inline]
    pub fn corner_values(&self, values: &na::DVector<f64>) -> [f64; 4] {
        self.dofs.map(|d| values[d])
    }
}

/// A Q1 discretization of one generation of the mesh.
#[derive(Clone, Debug)]
pub struct Discretization {
    generation: Generation,
    support_points: Vec<Vec2>,
    cells: Vec<CellData>,
    boundary_dofs: fb::FixedBitSet,
    constraints: ConstraintSet,
    mass: Operator,
    stiffness: Operator,
}

impl Discretization {
    /// Number the vertices of the mesh, find hanging vertices
    /// and assemble the mass and stiffness operators.
    ///
    /// The mesh must be 2:1 balanced,
    /// which is guaranteed for meshes changed only through
    /// [`QuadMesh::refine_global`] and
    /// [`QuadMesh::execute_coarsening_and_refinement`].
    pub fn build(mesh: &QuadMesh, generation: Generation) -> Self {
        let vertices: BTreeSet<LatticePoint> = mesh
            .active_cells()
            .flat_map(|cell| cell.corners())
            .collect();
        let vertex_dofs: BTreeMap<LatticePoint, usize> = vertices
            .iter()
            .enumerate()
            .map(|(dof, v)| (*v, dof))
            .collect();
        let n_dofs = vertex_dofs.len();
        let support_points = vertices.iter().map(|v| mesh.position(*v)).collect_vec();

        let mut boundary_dofs = fb::FixedBitSet::with_capacity(n_dofs);
        for (v, dof) in &vertex_dofs {
            if mesh.is_boundary_point(*v) {
                boundary_dofs.insert(*dof);
            }
        }

        let cell_index: HashMap<usize, usize> = mesh
            .active_cells()
            .enumerate()
            .map(|(index, cell)| (cell.id(), index))
            .collect();

        let mut hanging: BTreeMap<usize, Vec<(usize, f64)>> = BTreeMap::new();
        let mut cells = Vec::with_capacity(mesh.n_active_cells());
        for cell in mesh.active_cells() {
            let corners = cell.corners();
            let dofs = corners.map(|c| vertex_dofs[&c]);

            // every cell adjacent to an active cell is active itself
            // or has active children along the shared face (2:1 balance)
            let neighbors = Face::ALL.map(|face| match mesh.neighbor(cell.id(), face) {
                Neighbor::Boundary => FaceNeighbors::Boundary,
                Neighbor::Coarser(n) => FaceNeighbors::One(cell_index[&n]),
                Neighbor::Same(n) => match mesh.face_children(n, face.opposite()) {
                    None => FaceNeighbors::One(cell_index[&n]),
                    Some([a, b]) => {
                        // the midpoint of this face is a vertex of the finer side only
                        let [ca, cb] = face.corners();
                        let mid = [
                            (corners[ca][0] + corners[cb][0]) / 2,
                            (corners[ca][1] + corners[cb][1]) / 2,
                        ];
                        hanging
                            .entry(vertex_dofs[&mid])
                            .or_insert_with(|| vec![(dofs[ca], 0.5), (dofs[cb], 0.5)]);
                        FaceNeighbors::Two([cell_index[&a], cell_index[&b]])
                    }
                },
            });

            cells.push(CellData {
                id: cell.id(),
                parent: cell.parent(),
                child_index: cell.child_index(),
                level: cell.level(),
                origin: cell.origin(),
                size: cell.size(),
                dofs,
                neighbors,
            });
        }
        let constraints = ConstraintSet::new(n_dofs, hanging);

        let reference = ReferenceMatrices::new();
        let mut mass = nas::CooMatrix::new(n_dofs, n_dofs);
        let mut stiffness = nas::CooMatrix::new(n_dofs, n_dofs);
        for cell in &cells {
            let area = cell.size * cell.size;
            for (i, &row) in cell.dofs.iter().enumerate() {
                for (j, &col) in cell.dofs.iter().enumerate() {
                    mass.push(row, col, area * reference.mass[(i, j)]);
                    stiffness.push(row, col, reference.stiffness[(i, j)]);
                }
            }
        }

        Self {
            generation,
            support_points,
            cells,
            boundary_dofs,
            constraints,
            mass: Operator::new(nas::CsrMatrix::from(&mass), generation),
            stiffness: Operator::new(nas::CsrMatrix::from(&stiffness), generation),
        }
    }

    /// The generation tag of this discretization.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of degrees of freedom, including constrained ones.
    #[inline]
    pub fn n_dofs(&self) -> usize {
        self.support_points.len()
    }

    /// Number of active cells the discretization was built on.
    #[inline]
    pub fn n_active_cells(&self) -> usize {
        self.cells.len()
    }

    /// Per-cell data in active cell order.
    #[inline]
    pub fn cells(&self) -> &[CellData] {
        &self.cells
    }

    /// Positions of the degrees of freedom.
    #[inline]
    pub fn support_points(&self) -> &[Vec2] {
        &self.support_points
    }

    /// Degrees of freedom on the domain boundary.
    #[inline]
    pub fn boundary_dofs(&self) -> &fb::FixedBitSet {
        &self.boundary_dofs
    }

    /// Hanging vertex constraints.
    #[inline]
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The mass operator `M_ij = ∫ φ_i φ_j`.
    #[inline]
    pub fn mass(&self) -> &Operator {
        &self.mass
    }

    /// The stiffness operator `A_ij = ∫ ∇φ_i · ∇φ_j`.
    #[inline]
    pub fn stiffness(&self) -> &Operator {
        &self.stiffness
    }

    /// Check that a field belongs to this discretization.
    #[inline]
    pub fn check(&self, field: &Field) -> Result<()> {
        field.check(self.generation, self.n_dofs())
    }

    /// A field of zeros.
    #[inline]
    pub fn new_zero_field(&self) -> Field {
        Field::zeros(self.n_dofs(), self.generation)
    }

    /// Evaluate a function at every degree of freedom,
    /// then make hanging values consistent with their constraints.
    pub fn interpolate(&self, f: impl Fn(Vec2) -> f64) -> Field {
        let mut values =
            na::DVector::from_iterator(self.n_dofs(), self.support_points.iter().map(|p| f(*p)));
        self.constraints.distribute(&mut values);
        Field::from_values(values, self.generation)
    }

    /// Evaluate a function at the boundary degrees of freedom.
    pub fn interpolate_boundary_values(&self, f: impl Fn(Vec2) -> f64) -> BTreeMap<usize, f64> {
        self.boundary_dofs
            .ones()
            .map(|dof| (dof, f(self.support_points[dof])))
            .collect()
    }

    /// Assemble the load vector `b_i = ∫ f φ_i` with a 2x2 Gauss rule per cell.
    pub fn assemble_forcing(&self, f: impl Fn(Vec2) -> f64) -> Field {
        let rule = SquareRule::gauss(2);
        let mut values = na::DVector::zeros(self.n_dofs());
        for cell in &self.cells {
            let area = cell.size * cell.size;
            for (p, w) in rule.iter() {
                let fx = f(cell.origin + p * cell.size) * w * area;
                if fx == 0. {
                    continue;
                }
                for (&dof, phi) in cell.dofs.iter().zip(element::shape_values(p)) {
                    values[dof] += phi * fx;
                }
            }
        }
        Field::from_values(values, self.generation)
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CellSubset;
    use approx::assert_relative_eq;

    fn uniform(levels: u8) -> QuadMesh {
        let mut mesh = QuadMesh::hyper_cube(0., 1.);
        mesh.refine_global(levels);
        mesh
    }

    /// A 2x2 mesh with the low-left cell refined once.
    fn locally_refined() -> QuadMesh {
        let mut mesh = uniform(1);
        mesh.execute_coarsening_and_refinement(
            &CellSubset::from_indices([0]),
            &CellSubset::new_empty(),
        );
        mesh
    }

    #[test]
    fn uniform_mesh_operators() {
        let disc = Discretization::build(&uniform(2), Generation(0));
        assert_eq!(disc.n_dofs(), 25);
        assert_eq!(disc.n_active_cells(), 16);
        assert_eq!(disc.boundary_dofs().count_ones(..), 16);
        assert_eq!(disc.constraints().n_constraints(), 0);

        let ones = disc.interpolate(|_| 1.);
        // the mass matrix integrates to the area of the domain
        assert_relative_eq!(disc.mass().quadratic_form(&ones).unwrap(), 1., epsilon = 1e-12);
        // constants are in the kernel of the Laplacian
        let a1 = disc.stiffness().apply(&ones).unwrap();
        assert!(a1.values.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn hanging_vertices_are_constrained() {
        let mesh = locally_refined();
        let disc = Discretization::build(&mesh, Generation(3));
        assert_eq!(disc.generation(), Generation(3));
        assert_eq!(disc.n_active_cells(), 7);
        assert_eq!(disc.n_dofs(), 9 + 5);
        // midpoints of the two refined faces that border coarse cells
        assert_eq!(disc.constraints().n_constraints(), 2);

        for (dof, p) in disc.support_points().iter().enumerate() {
            if let Some(line) = disc.constraints().line(dof) {
                assert!(p.x == 0.5 || p.y == 0.5);
                assert_eq!(line.len(), 2);
                for (master, weight) in line {
                    assert_relative_eq!(*weight, 0.5);
                    let m = disc.support_points()[*master];
                    assert_relative_eq!((m - p).norm(), 0.25);
                }
            }
        }

        // linear functions are represented exactly, hanging vertices included
        let linear = disc.interpolate(|p| 2. * p.x - p.y);
        for (dof, p) in disc.support_points().iter().enumerate() {
            assert_relative_eq!(linear.values[dof], 2. * p.x - p.y, epsilon = 1e-14);
        }

        let ones = disc.interpolate(|_| 1.);
        assert_relative_eq!(disc.mass().quadratic_form(&ones).unwrap(), 1., epsilon = 1e-12);
    }

    #[test]
    fn face_neighbors_across_levels() {
        let disc = Discretization::build(&locally_refined(), Generation(0));
        let cells = disc.cells();
        // active order: the four fine cells first, then the three coarse ones
        assert!(cells[..4].iter().all(|c| c.level == 2));
        assert!(cells[4..].iter().all(|c| c.level == 1));

        let east = Face::ALL.iter().position(|f| *f == Face::East).unwrap();
        let west = Face::ALL.iter().position(|f| *f == Face::West).unwrap();
        // the fine cell at the low right borders the coarse low-right cell
        assert_eq!(cells[1].neighbors[east], FaceNeighbors::One(4));
        // which sees two fine cells to its west
        assert_eq!(cells[4].neighbors[west], FaceNeighbors::Two([1, 3]));
        assert_eq!(cells[4].neighbors[east], FaceNeighbors::Boundary);
    }

    #[test]
    fn forcing_integrates_linear_functions() {
        let disc = Discretization::build(&locally_refined(), Generation(0));
        let b = disc.assemble_forcing(|p| p.x);
        // Σ_i ∫ x φ_i = ∫ x over the unit square
        assert_relative_eq!(b.values.sum(), 0.5, epsilon = 1e-12);

        let boundary = disc.interpolate_boundary_values(|p| p.y);
        assert_eq!(boundary.len(), 10);
        for (dof, value) in boundary {
            assert_relative_eq!(value, disc.support_points()[dof].y);
        }
    }
}
