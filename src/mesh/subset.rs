//! Sets of active cells identified by active index.

use fixedbitset as fb;

use super::QuadMesh;

/// A subset of the active cells of a mesh,
/// e.g. the cells flagged for refinement.
///
/// Indices are *active indices*, i.e. positions in [`QuadMesh::active_cells`],
/// so a subset is only meaningful for the mesh state it was created from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellSubset {
    /// A bitset containing the active indices of the cells in the subset.
    ///
    /// Iterate over the indices with `indices.ones()`.
    pub indices: fb::FixedBitSet,
}

impl CellSubset {
    /// Create a subset from an iterator of active cell indices.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: fb::FixedBitSet::from_iter(indices),
        }
    }

    /// Create an empty subset.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Create a subset containing every active cell of the mesh.
    pub fn new_full(mesh: &QuadMesh) -> Self {
        let mut indices = fb::FixedBitSet::with_capacity(mesh.n_active_cells());
        indices.set_range(.., true);
        Self { indices }
    }

    /// Whether the cell with the given active index is in the subset.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(index)
    }

    /// Add a cell to the subset.
    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.indices.grow(index + 1);
        self.indices.insert(index);
    }

    /// Remove a cell from the subset.
    #[inline]
    pub fn remove(&mut self, index: usize) {
        if index < self.indices.len() {
            self.indices.set(index, false);
        }
    }

    /// Iterate over the active indices in the subset in ascending order.
    #[inline]
    pub fn iter(&self) -> fb::Ones<'_> {
        self.indices.ones()
    }

    /// Take the difference (i.e. set of cells that are in `self` but not in `other`)
    /// of this subset with another.
    #[inline]
    pub fn difference(&self, other: &Self) -> Self {
        let mut indices = self.indices.clone();
        indices.difference_with(&other.indices);
        Self { indices }
    }

    /// Get the number of cells in this subset.
    #[inline]
    pub fn count(&self) -> usize {
        self.indices.count_ones(..)
    }

    /// Whether the subset has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_operations() {
        let mut mesh = QuadMesh::hyper_cube(0., 1.);
        mesh.refine_global(2);

        let full = CellSubset::new_full(&mesh);
        assert_eq!(full.count(), 16);

        let mut some = CellSubset::from_indices([1, 4, 9]);
        assert!(some.contains(4));
        assert!(!some.contains(5));
        some.insert(20);
        some.remove(4);
        some.remove(100);
        assert_eq!(some.iter().collect::<Vec<_>>(), vec![1, 9, 20]);

        let rest = full.difference(&some);
        assert_eq!(rest.count(), 14);
        assert!(CellSubset::new_empty().is_empty());
    }
}
