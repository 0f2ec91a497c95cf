use std::collections::BTreeSet;

use super::{CellSubset, Face, Neighbor, QuadMesh};

/// Summary of what a call to
/// [`execute_coarsening_and_refinement`][QuadMesh::execute_coarsening_and_refinement]
/// actually did after balancing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopologyChange {
    /// Number of cells that were split into four.
    pub refined: usize,
    /// Number of cell families that were merged back into their parent.
    pub coarsened: usize,
}

impl TopologyChange {
    /// Whether the set of active cells changed.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.refined == 0 && self.coarsened == 0
    }
}

impl QuadMesh {
    /// Refine and coarsen the flagged active cells.
    ///
    /// Flags are adjusted before execution so that
    /// face-adjacent active cells differ by at most one level afterwards:
    /// additional coarser cells may get refined,
    /// and coarsening is dropped wherever it would break the balance.
    /// A cell family is only coarsened
    /// if all four siblings are active and flagged,
    /// and a cell flagged for both is only refined.
    pub fn execute_coarsening_and_refinement(
        &mut self,
        refine: &CellSubset,
        coarsen: &CellSubset,
    ) -> TopologyChange {
        let mut to_refine: BTreeSet<usize> = refine.iter().map(|i| self.active[i]).collect();
        let coarsen_ids: BTreeSet<usize> = coarsen
            .difference(refine)
            .iter()
            .map(|i| self.active[i])
            .collect();

        // families where every child is active and flagged
        let mut to_coarsen: BTreeSet<usize> = coarsen_ids
            .iter()
            .filter_map(|&id| self.nodes[id].parent)
            .filter(|&parent| {
                self.nodes[parent].children.is_some_and(|children| {
                    children
                        .iter()
                        .all(|c| coarsen_ids.contains(c) && self.nodes[*c].children.is_none())
                })
            })
            .collect();

        self.balance(&mut to_refine, &mut to_coarsen);

        for &parent in &to_coarsen {
            // the children stay in the arena but are detached from the tree
            self.nodes[parent].children = None;
        }
        for &id in &to_refine {
            self.split(id);
        }
        self.rebuild_active();

        TopologyChange {
            refined: to_refine.len(),
            coarsened: to_coarsen.len(),
        }
    }

    /// Grow the refinement set and shrink the coarsening set
    /// until the result is 2:1 balanced across faces.
    fn balance(&self, to_refine: &mut BTreeSet<usize>, to_coarsen: &mut BTreeSet<usize>) {
        loop {
            let mut changed = false;

            let refining: Vec<usize> = to_refine.iter().copied().collect();
            for id in refining {
                for face in Face::ALL {
                    match self.neighbor(id, face) {
                        Neighbor::Coarser(n) => {
                            // children of `id` would sit two levels below `n`
                            if to_refine.insert(n) {
                                changed = true;
                            }
                            if let Some(p) = self.nodes[n].parent {
                                changed |= to_coarsen.remove(&p);
                            }
                        }
                        Neighbor::Same(n) if self.nodes[n].children.is_none() => {
                            // coarsening n's family would leave it two levels
                            // above the children of `id`
                            if let Some(p) = self.nodes[n].parent {
                                changed |= to_coarsen.remove(&p);
                            }
                        }
                        _ => {}
                    }
                }
            }

            let coarsening: Vec<usize> = to_coarsen.iter().copied().collect();
            for parent in coarsening {
                let blocked = Face::ALL.iter().any(|&face| match self.neighbor(parent, face) {
                    Neighbor::Same(n) => self
                        .face_children(n, face.opposite())
                        .is_some_and(|children| {
                            children.iter().any(|c| {
                                self.nodes[*c].children.is_some() || to_refine.contains(c)
                            })
                        }),
                    _ => false,
                });
                if blocked {
                    to_coarsen.remove(&parent);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
    }

    /// Whether all face-adjacent active cells differ by at most one level.
    pub fn is_balanced(&self) -> bool {
        self.active_cells().all(|cell| {
            Face::ALL.iter().all(|&face| match self.neighbor(cell.id(), face) {
                Neighbor::Same(n) => self
                    .face_children(n, face.opposite())
                    .map_or(true, |children| {
                        children.iter().all(|c| self.nodes[*c].children.is_none())
                    }),
                _ => true,
            })
        })
    }
}

//
// tests
//
