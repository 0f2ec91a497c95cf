//! Quadtree meshes of axis-aligned square cells.
//!
//! The mesh starts from a single square root cell
//! which is split into four children at every refinement.
//! Cells that have no children are *active*;
//! these are the cells the discretization is built on.
//! Coarsening removes the children of a cell again,
//! making the parent active.
//!
//! Cells are stored in an arena and never removed from it,
//! so a cell id stays valid (and unique) for the lifetime of the mesh
//! even after the cell has been coarsened away.
//! This lets data be keyed by cell id across a mesh change.
//!
//! Vertices are identified by integer coordinates on a lattice
//! with the resolution of a cell at level [`MAX_LEVEL`],
//! which makes vertex identity exact regardless of refinement depth.

/// Refinement, coarsening and 2:1 balancing.
mod refinement;
pub use refinement::TopologyChange;

pub mod subset;
#[doc(inline)]
pub use subset::CellSubset;

use crate::Vec2;

/// The deepest refinement level representable in lattice coordinates.
pub const MAX_LEVEL: u8 = 24;

/// Integer coordinates of a vertex on the finest lattice.
pub type LatticePoint = [u32; 2];

/// One of the four faces of a square cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    /// The face at minimum x.
    West,
    /// The face at maximum x.
    East,
    /// The face at minimum y.
    South,
    /// The face at maximum y.
    North,
}

impl Face {
    /// All faces in a fixed order.
    pub const ALL: [Face; 4] = [Face::West, Face::East, Face::South, Face::North];

    /// The face on the other side of the cell.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Face::West => Face::East,
            Face::East => Face::West,
            Face::South => Face::North,
            Face::North => Face::South,
        }
    }

    /// Local indices of the corners (and of the children) lying on this face.
    ///
    /// Corners and children are both numbered
    /// `0 = (low x, low y), 1 = (high x, low y), 2 = (low x, high y), 3 = (high x, high y)`.
    #[inline]
    pub fn corners(self) -> [usize; 2] {
        match self {
            Face::West => [0, 2],
            Face::East => [1, 3],
            Face::South => [0, 1],
            Face::North => [2, 3],
        }
    }

    /// Unit normal pointing out of the cell through this face.
    #[inline]
    pub fn outward_normal(self) -> Vec2 {
        match self {
            Face::West => Vec2::new(-1., 0.),
            Face::East => Vec2::new(1., 0.),
            Face::South => Vec2::new(0., -1.),
            Face::North => Vec2::new(0., 1.),
        }
    }

    #[inline]
    fn offset(self) -> [i64; 2] {
        match self {
            Face::West => [-1, 0],
            Face::East => [1, 0],
            Face::South => [0, -1],
            Face::North => [0, 1],
        }
    }
}

/// What lies across a face of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    /// The face is on the domain boundary.
    Boundary,
    /// A cell on the same level. It may be active or refined further.
    Same(usize),
    /// An active cell on a coarser level.
    Coarser(usize),
}

#[derive(Clone, Debug)]
pub(crate) struct CellNode {
    level: u8,
    /// position of the cell in units of its own size
    coords: [u32; 2],
    parent: Option<usize>,
    children: Option<[usize; 4]>,
}

/// A square domain subdivided into a quadtree of square cells.
#[derive(Clone, Debug)]
pub struct QuadMesh {
    nodes: Vec<CellNode>,
    /// ids of active cells in depth-first order
    active: Vec<usize>,
    origin: Vec2,
    extent: f64,
}

impl QuadMesh {
    /// Create a mesh consisting of the single cell `[lower, upper]²`.
    pub fn hyper_cube(lower: f64, upper: f64) -> Self {
        assert!(lower < upper, "Empty domain [{lower}, {upper}]");
        Self {
            nodes: vec![CellNode {
                level: 0,
                coords: [0, 0],
                parent: None,
                children: None,
            }],
            active: vec![0],
            origin: Vec2::new(lower, lower),
            extent: upper - lower,
        }
    }

    /// Refine every active cell `times` times.
    pub fn refine_global(&mut self, times: u8) {
        for _ in 0..times {
            let to_refine = self.active.clone();
            for id in to_refine {
                self.split(id);
            }
            self.rebuild_active();
        }
    }

    /// Get the number of active cells.
    #[inline]
    pub fn n_active_cells(&self) -> usize {
        self.active.len()
    }

    /// Iterate over the active cells in depth-first order.
    ///
    /// The position of a cell in this iteration is its *active index*,
    /// which is what [`CellSubset`]s and per-cell data are indexed by.
    pub fn active_cells(&self) -> impl ExactSizeIterator<Item = CellView<'_>> + '_ {
        self.active.iter().map(move |&id| CellView { mesh: self, id })
    }

    /// Get a view of any cell in the arena, active or not.
    #[inline]
    pub fn cell(&self, id: usize) -> CellView<'_> {
        CellView { mesh: self, id }
    }

    /// Get the active cell with the given active index.
    #[inline]
    pub fn active_cell(&self, index: usize) -> CellView<'_> {
        self.cell(self.active[index])
    }

    /// Deepest level among the active cells.
    pub fn max_level(&self) -> u8 {
        self.active_cells().map(|c| c.level()).max().unwrap_or(0)
    }

    /// Shallowest level among the active cells.
    pub fn min_level(&self) -> u8 {
        self.active_cells().map(|c| c.level()).min().unwrap_or(0)
    }

    /// Whether the cell with the given id is currently a leaf of the tree.
    ///
    /// Cells that were coarsened away are detached from the tree
    /// and are not active.
    pub fn is_active(&self, id: usize) -> bool {
        self.nodes[id].children.is_none() && self.is_attached(id)
    }

    fn is_attached(&self, id: usize) -> bool {
        match self.nodes[id].parent {
            None => id == 0,
            Some(p) => self.nodes[p].children.is_some_and(|ch| ch.contains(&id)),
        }
    }

    /// Find what lies across the given face of a cell.
    pub fn neighbor(&self, id: usize, face: Face) -> Neighbor {
        let node = &self.nodes[id];
        let [di, dj] = face.offset();
        let n = 1i64 << node.level;
        let ni = node.coords[0] as i64 + di;
        let nj = node.coords[1] as i64 + dj;
        if ni < 0 || nj < 0 || ni >= n || nj >= n {
            return Neighbor::Boundary;
        }

        let found = self.descend(node.level, [ni as u32, nj as u32]);
        if self.nodes[found].level == node.level {
            Neighbor::Same(found)
        } else {
            Neighbor::Coarser(found)
        }
    }

    /// The two children of a cell that touch the given face of it,
    /// or `None` if the cell is active.
    pub fn face_children(&self, id: usize, face: Face) -> Option<[usize; 2]> {
        let children = self.nodes[id].children?;
        let [a, b] = face.corners();
        Some([children[a], children[b]])
    }

    /// Physical position of a lattice point.
    #[inline]
    pub fn position(&self, point: LatticePoint) -> Vec2 {
        let scale = self.extent / (1u64 << MAX_LEVEL) as f64;
        self.origin + Vec2::new(point[0] as f64, point[1] as f64) * scale
    }

    /// Whether a lattice point lies on the boundary of the domain.
    #[inline]
    pub fn is_boundary_point(&self, point: LatticePoint) -> bool {
        let end = 1u32 << MAX_LEVEL;
        point.iter().any(|&c| c == 0 || c == end)
    }

    /// Find the deepest cell covering the cell at `level, coords`
    /// whose level is at most `level`.
    fn descend(&self, level: u8, coords: [u32; 2]) -> usize {
        let mut id = 0;
        loop {
            let node = &self.nodes[id];
            if node.level >= level {
                return id;
            }
            let Some(children) = node.children else {
                return id;
            };
            let shift = level - node.level - 1;
            let ci = ((coords[0] >> shift) & 1) as usize;
            let cj = ((coords[1] >> shift) & 1) as usize;
            id = children[ci + 2 * cj];
        }
    }

    /// Give an active cell four children.
    fn split(&mut self, id: usize) {
        let node = &self.nodes[id];
        debug_assert!(node.children.is_none(), "Splitting a refined cell");
        assert!(node.level < MAX_LEVEL, "Cannot refine past level {MAX_LEVEL}");
        let level = node.level + 1;
        let base = [node.coords[0] * 2, node.coords[1] * 2];

        let first = self.nodes.len();
        for child in 0..4u32 {
            self.nodes.push(CellNode {
                level,
                coords: [base[0] + (child & 1), base[1] + (child >> 1)],
                parent: Some(id),
                children: None,
            });
        }
        self.nodes[id].children = Some([first, first + 1, first + 2, first + 3]);
    }

    fn rebuild_active(&mut self) {
        self.active.clear();
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            match self.nodes[id].children {
                // push in reverse so that child 0 is visited first
                Some(children) => stack.extend(children.iter().rev()),
                None => self.active.push(id),
            }
        }
    }
}

/// A view into a single cell of a [`QuadMesh`].
#[derive(Clone, Copy, Debug)]
pub struct CellView<'a> {
    mesh: &'a QuadMesh,
    id: usize,
}

impl<'a> CellView<'a> {
    /// Arena id of the cell.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Refinement level of the cell; the root is on level 0.
    #[inline]
    pub fn level(&self) -> u8 {
        self.mesh.nodes[self.id].level
    }

    /// Id of the parent cell, if any.
    #[inline]
    pub fn parent(&self) -> Option<usize> {
        self.mesh.nodes[self.id].parent
    }

    /// Ids of the children, if the cell has been refined.
    #[inline]
    pub fn children(&self) -> Option<[usize; 4]> {
        self.mesh.nodes[self.id].children
    }

    /// Which child of its parent this cell is (0..4).
    #[inline]
    pub fn child_index(&self) -> usize {
        let [i, j] = self.mesh.nodes[self.id].coords;
        ((i & 1) + 2 * (j & 1)) as usize
    }

    /// Side length of the cell in lattice units.
    #[inline]
    pub fn lattice_size(&self) -> u32 {
        1 << (MAX_LEVEL - self.level())
    }

    /// Lattice coordinates of the four corners.
    pub fn corners(&self) -> [LatticePoint; 4] {
        let node = &self.mesh.nodes[self.id];
        let s = self.lattice_size();
        let [x, y] = [node.coords[0] * s, node.coords[1] * s];
        [[x, y], [x + s, y], [x, y + s], [x + s, y + s]]
    }

    /// Physical position of the low corner.
    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.mesh.position(self.corners()[0])
    }

    /// Physical side length.
    #[inline]
    pub fn size(&self) -> f64 {
        self.mesh.extent / (1u64 << self.level()) as f64
    }

    /// Physical position of the cell center.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.origin() + Vec2::new(0.5, 0.5) * self.size()
    }
}

//
// tests
//
