//! Deciding where to refine and coarsen, and carrying the state along.

use itertools::Itertools;

use crate::{
    discretization::Discretization,
    error::{Result, WaveError},
    estimator::ErrorIndicator,
    mesh::{CellSubset, QuadMesh, MAX_LEVEL},
    state::SimulationState,
    transfer::SolutionTransfer,
};

/// Limits and fractions controlling mesh adaptation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefinementPolicy {
    /// Cells are never coarsened below this level.
    pub min_level: u8,
    /// Cells are never refined above this level.
    pub max_level: u8,
    /// Fraction of the total indicator to cover with refinement.
    pub refine_fraction: f64,
    /// Fraction of the total indicator to cover with coarsening.
    pub coarsen_fraction: f64,
    /// Number of adaptations performed at the first step before the main loop.
    pub pre_refinement_steps: usize,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            min_level: 4,
            max_level: 8,
            refine_fraction: 0.6,
            coarsen_fraction: 0.4,
            pre_refinement_steps: 4,
        }
    }
}

impl RefinementPolicy {
    /// Check the policy for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.min_level > self.max_level || self.max_level > MAX_LEVEL {
            return Err(WaveError::InvalidConfig(format!(
                "refinement levels {}..={} must be ordered and at most {MAX_LEVEL}",
                self.min_level, self.max_level
            )));
        }
        for (name, fraction) in [
            ("refine", self.refine_fraction),
            ("coarsen", self.coarsen_fraction),
        ] {
            if !(0. ..=1.).contains(&fraction) {
                return Err(WaveError::InvalidConfig(format!(
                    "{name} fraction {fraction} is outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Fixed-fraction marking.
///
/// The refinement set is the smallest set of cells with the largest indicators
/// whose indicators sum to at least `refine_fraction` of the total,
/// and the coarsening set the smallest set of cells with the smallest indicators
/// summing to at least `coarsen_fraction` of it.
/// Ties are broken by cell index.
/// Cells in both sets are only refined.
/// If every indicator is zero, nothing is marked.
pub fn mark_fixed_fraction(
    indicators: &[f64],
    refine_fraction: f64,
    coarsen_fraction: f64,
) -> (CellSubset, CellSubset) {
    let total: f64 = indicators.iter().sum();
    if !(total > 0.) {
        return (CellSubset::new_empty(), CellSubset::new_empty());
    }

    // stable sorts keep index order among equal indicators
    let descending = (0..indicators.len())
        .sorted_by(|&a, &b| indicators[b].total_cmp(&indicators[a]))
        .collect_vec();
    let ascending = (0..indicators.len())
        .sorted_by(|&a, &b| indicators[a].total_cmp(&indicators[b]))
        .collect_vec();

    let refine = CellSubset::from_indices(shortest_prefix(
        &descending,
        indicators,
        refine_fraction * total,
    ));
    let coarsen = CellSubset::from_indices(shortest_prefix(
        &ascending,
        indicators,
        coarsen_fraction * total,
    ));
    let coarsen = coarsen.difference(&refine);
    (refine, coarsen)
}

/// The shortest prefix of `order` whose indicators sum to at least `target`.
fn shortest_prefix<'a>(
    order: &'a [usize],
    indicators: &'a [f64],
    target: f64,
) -> impl Iterator<Item = usize> + 'a {
    let mut sum = 0.;
    order
        .iter()
        .copied()
        .take_while(move |&i| {
            let needed = sum < target;
            sum += indicators[i];
            needed
        })
}

/// Remove refinement flags from cells at or above `max_level`
/// and coarsening flags from cells at or below `min_level`.
pub fn clamp_to_levels(
    mesh: &QuadMesh,
    refine: &mut CellSubset,
    coarsen: &mut CellSubset,
    min_level: u8,
    max_level: u8,
) {
    for (index, cell) in mesh.active_cells().enumerate() {
        if cell.level() >= max_level {
            refine.remove(index);
        }
        if cell.level() <= min_level {
            coarsen.remove(index);
        }
    }
}

/// Check that every active cell is within the level band.
fn check_levels(mesh: &QuadMesh, min_level: u8, max_level: u8) -> Result<()> {
    match mesh
        .active_cells()
        .map(|c| c.level())
        .find(|l| *l < min_level || *l > max_level)
    {
        Some(level) => Err(WaveError::RefinementBoundsViolated {
            level,
            min_level,
            max_level,
        }),
        None => Ok(()),
    }
}

/// Summary of one adaptation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdaptReport {
    /// Cells flagged for refinement after clamping.
    pub flagged_refine: usize,
    /// Cells flagged for coarsening after clamping.
    pub flagged_coarsen: usize,
    /// Cells actually refined, including those refined to keep the mesh balanced.
    pub refined: usize,
    /// Cell families actually coarsened.
    pub coarsened: usize,
    /// Active cells on the new mesh.
    pub n_active_cells: usize,
    /// Degrees of freedom of the new discretization.
    pub n_dofs: usize,
}

/// Adapts the mesh to an error indicator of the current displacement.
#[derive(Clone, Debug)]
pub struct MeshController<E: ErrorIndicator> {
    /// The indicator that drives marking.
    pub indicator: E,
    /// Levels and fractions.
    pub policy: RefinementPolicy,
}

impl<E: ErrorIndicator> MeshController<E> {
    /// Create a controller.
    pub fn new(indicator: E, policy: RefinementPolicy) -> Self {
        Self { indicator, policy }
    }

    /// Mark, refine and coarsen the mesh,
    /// and move the state onto a discretization of the new mesh.
    ///
    /// On return the state belongs to the returned discretization,
    /// with the previous time level equal to the current one.
    /// A new generation is produced even if the mesh didn't change.
    pub fn adapt(
        &self,
        mesh: &mut QuadMesh,
        disc: &Discretization,
        state: &mut SimulationState,
    ) -> Result<(Discretization, AdaptReport)> {
        state.validate(disc)?;
        let RefinementPolicy {
            min_level,
            max_level,
            refine_fraction,
            coarsen_fraction,
            ..
        } = self.policy;

        let indicators = self.indicator.estimate(disc, &state.u)?;
        let (mut refine, mut coarsen) =
            mark_fixed_fraction(&indicators, refine_fraction, coarsen_fraction);
        clamp_to_levels(mesh, &mut refine, &mut coarsen, min_level, max_level);
        log::debug!(
            "Flagged {} cells for refinement and {} for coarsening (levels {min_level}..={max_level})",
            refine.count(),
            coarsen.count(),
        );

        let transfer = SolutionTransfer::prepare(disc, [&state.u, &state.v])?;
        let change = mesh.execute_coarsening_and_refinement(&refine, &coarsen);
        check_levels(mesh, min_level, max_level)?;
        let new_disc = Discretization::build(mesh, disc.generation().next());
        let [u, v] = transfer.interpolate(mesh, &new_disc)?;

        state.u_prev = u.clone();
        state.v_prev = v.clone();
        state.u = u;
        state.v = v;
        state.generation = new_disc.generation();

        let report = AdaptReport {
            flagged_refine: refine.count(),
            flagged_coarsen: coarsen.count(),
            refined: change.refined,
            coarsened: change.coarsened,
            n_active_cells: new_disc.n_active_cells(),
            n_dofs: new_disc.n_dofs(),
        };
        Ok((new_disc, report))
    }
}

//
// tests
//
