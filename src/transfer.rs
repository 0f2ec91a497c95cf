//! Carrying fields across a change of mesh topology.
//!
//! Usage follows the mesh change:
//! [`prepare`][SolutionTransfer::prepare] on the old discretization
//! before the mesh is touched,
//! then [`interpolate`][SolutionTransfer::interpolate] once the mesh has changed
//! and the new discretization is built.

use std::collections::HashMap;

use nalgebra as na;

use crate::{
    discretization::Discretization,
    element,
    error::{Result, WaveError},
    field::Field,
    mesh::QuadMesh,
    Vec2,
};

/// Corner values of every transferred field on one formerly active cell.
#[derive(Clone, Debug)]
struct CellSnapshot<const N: usize> {
    origin: Vec2,
    size: f64,
    values: [[f64; 4]; N],
}

/// Per-cell snapshot of `N` fields, taken before a mesh change.
#[derive(Clone, Debug)]
pub struct SolutionTransfer<const N: usize> {
    /// keyed by cell id
    cells: HashMap<usize, CellSnapshot<N>>,
    /// corner values for the parents of snapshotted cells,
    /// i.e. the cells that may be re-activated by coarsening
    parents: HashMap<usize, [[f64; 4]; N]>,
}

impl<const N: usize> SolutionTransfer<N> {
    /// Take a snapshot of `fields`, which must all belong to `old`.
    pub fn prepare(old: &Discretization, fields: [&Field; N]) -> Result<Self> {
        for field in fields {
            old.check(field)?;
        }

        let mut cells = HashMap::with_capacity(old.n_active_cells());
        let mut parents: HashMap<usize, [[f64; 4]; N]> = HashMap::new();
        for cell in old.cells() {
            let values = fields.map(|f| cell.corner_values(&f.values));
            // child k shares corner k with its parent
            if let Some(parent) = cell.parent {
                let k = cell.child_index;
                let entry = parents.entry(parent).or_insert([[0.; 4]; N]);
                for (parent_values, child_values) in entry.iter_mut().zip(&values) {
                    parent_values[k] = child_values[k];
                }
            }
            cells.insert(
                cell.id,
                CellSnapshot {
                    origin: cell.origin,
                    size: cell.size,
                    values,
                },
            );
        }

        Ok(Self { cells, parents })
    }

    /// Restore the snapshot on a new discretization of the changed mesh.
    ///
    /// Fields come back in the order they were given to `prepare`,
    /// with hanging-vertex constraints of `new` applied.
    pub fn interpolate(self, mesh: &QuadMesh, new: &Discretization) -> Result<[Field; N]> {
        let mut vectors: [na::DVector<f64>; N] =
            std::array::from_fn(|_| na::DVector::zeros(new.n_dofs()));

        for cell in new.cells() {
            let corner_values = if let Some(snapshot) = self.cells.get(&cell.id) {
                snapshot.values
            } else if let Some(values) = self.parents.get(&cell.id) {
                *values
            } else {
                let ancestor = std::iter::successors(cell.parent, |&id| mesh.cell(id).parent())
                    .find_map(|id| self.cells.get(&id))
                    .ok_or(WaveError::TransferIncomplete { cell: cell.id })?;
                let local_corners =
                    [0, 1, 2, 3].map(|c| (cell.corner_position(c) - ancestor.origin) / ancestor.size);
                ancestor
                    .values
                    .map(|values| local_corners.map(|p| element::value(&values, p)))
            };

            for (vector, values) in vectors.iter_mut().zip(&corner_values) {
                for (&dof, value) in cell.dofs.iter().zip(values) {
                    vector[dof] = *value;
                }
            }
        }

        Ok(vectors.map(|mut values| {
            new.constraints().distribute(&mut values);
            Field::from_values(values, new.generation())
        }))
    }
}

//
// tests
//
