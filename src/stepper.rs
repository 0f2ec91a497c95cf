//! The theta method for the wave equation written as a system
//! of first-order equations in displacement `U` and velocity `V`.
//!
//! One step of size `k` solves
//!
//! ```text
//! (M + θ²k²A) Uⁿ = M Uⁿ⁻¹ + k M Vⁿ⁻¹ − θ(1−θ)k² A Uⁿ⁻¹ + θk F
//!          M Vⁿ  = M Vⁿ⁻¹ − θk A Uⁿ − (1−θ)k A Uⁿ⁻¹ + F
//! ```
//!
//! with `F = θk f(tⁿ) + (1−θ)k f(tⁿ⁻¹)`.
//! `θ = 1/2` conserves the discrete energy;
//! larger values damp it.

use std::collections::BTreeMap;

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    discretization::Discretization,
    error::{Result, WaveError},
    field::Generation,
    operator::apply_boundary_values,
    problem::WaveProblem,
    solver::LinearSolver,
    state::SimulationState,
};

/// Time step and implicitness of the theta method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThetaParameters {
    /// Time step `k`.
    pub time_step: f64,
    /// Implicitness `θ`.
    pub theta: f64,
}

impl ThetaParameters {
    /// Validate a time step and theta.
    ///
    /// `θ > 1` is allowed (the scheme stays stable but damps strongly)
    /// and is reported with a warning.
    pub fn new(time_step: f64, theta: f64) -> Result<Self> {
        if !(time_step > 0.) || !time_step.is_finite() {
            return Err(WaveError::InvalidConfig(format!(
                "time step must be positive, got {time_step}"
            )));
        }
        if !(theta > 0.) || !theta.is_finite() {
            return Err(WaveError::InvalidConfig(format!(
                "theta must be positive, got {theta}"
            )));
        }
        if theta > 1. {
            log::warn!("theta = {theta} is greater than 1; the scheme will be strongly dissipative");
        }
        Ok(Self { time_step, theta })
    }

    /// `θ = 1/2 + bias · k`,
    /// i.e. Crank-Nicolson with damping proportional to the time step.
    pub fn from_time_step(time_step: f64, bias: f64) -> Result<Self> {
        Self::new(time_step, 0.5 + bias * time_step)
    }
}

/// What happened during one time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Solver iterations for the displacement.
    pub iterations_u: usize,
    /// Solver iterations for the velocity.
    pub iterations_v: usize,
    /// Total energy after the step.
    pub energy: f64,
}

/// Condensed system matrices of one discretization generation.
#[derive(Clone, Debug)]
struct SystemMatrices {
    generation: Generation,
    n_dofs: usize,
    /// `M + θ²k²A`
    displacement: nas::CsrMatrix<f64>,
    /// `M`
    velocity: nas::CsrMatrix<f64>,
}

impl SystemMatrices {
    fn build(disc: &Discretization, params: &ThetaParameters) -> Result<Self> {
        let ThetaParameters { time_step: k, theta } = *params;
        let constraints = disc.constraints();
        let displacement = disc
            .mass()
            .try_add(&((theta * theta * k * k) * disc.stiffness().clone()))?;
        Ok(Self {
            generation: disc.generation(),
            n_dofs: disc.n_dofs(),
            displacement: constraints.condense_matrix(displacement.csr()),
            velocity: constraints.condense_matrix(disc.mass().csr()),
        })
    }

    /// Whether these matrices were built for `disc`.
    fn matches(&self, disc: &Discretization) -> bool {
        self.generation == disc.generation() && self.n_dofs == disc.n_dofs()
    }
}

/// Advances a [`SimulationState`] with the theta method.
#[derive(Clone, Debug)]
pub struct TimeStepper<S: LinearSolver> {
    params: ThetaParameters,
    solver: S,
    /// rebuilt whenever the discretization generation or size changes
    matrices: Option<SystemMatrices>,
}

impl<S: LinearSolver> TimeStepper<S> {
    /// Create a stepper.
    pub fn new(params: ThetaParameters, solver: S) -> Self {
        Self {
            params,
            solver,
            matrices: None,
        }
    }

    /// The time step and theta in use.
    #[inline]
    pub fn params(&self) -> ThetaParameters {
        self.params
    }

    /// Take one step of size `k`.
    ///
    /// The state is only modified if both solves succeed.
    pub fn step(
        &mut self,
        disc: &Discretization,
        problem: &impl WaveProblem,
        state: &mut SimulationState,
    ) -> Result<StepReport> {
        state.validate(disc)?;
        let ThetaParameters { time_step: k, theta } = self.params;
        let t_new = state.time + k;

        let matrices = match self.matrices.take() {
            Some(m) if m.matches(disc) => self.matrices.insert(m),
            _ => {
                log::debug!(
                    "Building system matrices for generation {} ({} dofs)",
                    disc.generation(),
                    disc.n_dofs()
                );
                self.matrices
                    .insert(SystemMatrices::build(disc, &self.params)?)
            }
        };

        let mass = disc.mass();
        let stiffness = disc.stiffness();

        let forcing_terms = theta * k * disc.assemble_forcing(|p| problem.forcing(p, t_new))
            + (1. - theta) * k * disc.assemble_forcing(|p| problem.forcing(p, t_new - k));

        // displacement
        let mut rhs = mass.apply(&state.u_prev)? + k * mass.apply(&state.v_prev)?;
        let a_u_prev = stiffness.apply(&state.u_prev)?;
        rhs -= theta * (1. - theta) * k * k * &a_u_prev;
        rhs += &(theta * k * &forcing_terms);

        let mut u = state.u.clone();
        let boundary_u = disc.interpolate_boundary_values(|p| problem.boundary_displacement(p, t_new));
        let iterations_u = solve_constrained(
            &self.solver,
            &matrices.displacement,
            disc,
            &mut u.values,
            &rhs.values,
            &boundary_u,
        )?;

        // velocity
        let mut rhs = mass.apply(&state.v_prev)? + forcing_terms;
        rhs -= theta * k * stiffness.apply(&u)?;
        rhs -= (1. - theta) * k * a_u_prev;

        let mut v = state.v.clone();
        let boundary_v = disc.interpolate_boundary_values(|p| problem.boundary_velocity(p, t_new));
        let iterations_v = solve_constrained(
            &self.solver,
            &matrices.velocity,
            disc,
            &mut v.values,
            &rhs.values,
            &boundary_v,
        )?;
        log::debug!("CG iterations: {iterations_u} for U, {iterations_v} for V");

        state.u_prev = u.clone();
        state.v_prev = v.clone();
        state.u = u;
        state.v = v;
        state.time = t_new;
        state.step += 1;

        Ok(StepReport {
            iterations_u,
            iterations_v,
            energy: energy(disc, state)?,
        })
    }
}

/// Total energy `(⟨V, M V⟩ + ⟨U, A U⟩) / 2` of the current time level.
pub fn energy(disc: &Discretization, state: &SimulationState) -> Result<f64> {
    let kinetic = disc.mass().quadratic_form(&state.v)?;
    let potential = disc.stiffness().quadratic_form(&state.u)?;
    Ok(0.5 * (kinetic + potential))
}

/// Solve `matrix x = rhs` subject to hanging-vertex constraints
/// and Dirichlet values on the boundary.
/// `matrix` must already be condensed.
fn solve_constrained(
    solver: &impl LinearSolver,
    matrix: &nas::CsrMatrix<f64>,
    disc: &Discretization,
    x: &mut na::DVector<f64>,
    rhs: &na::DVector<f64>,
    boundary_values: &BTreeMap<usize, f64>,
) -> Result<usize> {
    let mut matrix = matrix.clone();
    let mut rhs = disc.constraints().condense_vector(rhs);
    apply_boundary_values(&mut matrix, x, &mut rhs, boundary_values);
    let iterations = solver.solve(&matrix, x, &rhs)?;
    disc.constraints().distribute(x);
    Ok(iterations)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mesh::{CellSubset, QuadMesh},
        problem::{BoundaryPulse, Homogeneous},
        solver::ConjugateGradient,
        Vec2,
    };
    use approx::assert_relative_eq;
    use std::{cell::Cell, f64::consts::PI};

    fn standing_wave() -> Homogeneous<impl Fn(Vec2) -> f64> {
        Homogeneous::new(|p: Vec2| (PI * (p.x + 1.) / 2.).sin() * (PI * (p.y + 1.) / 2.).sin())
    }

    /// Solves with CG until the given call, which fails.
    struct FailingOnCall {
        call: usize,
        calls: Cell<usize>,
    }

    impl LinearSolver for FailingOnCall {
        fn solve(
            &self,
            a: &nas::CsrMatrix<f64>,
            x: &mut na::DVector<f64>,
            b: &na::DVector<f64>,
        ) -> Result<usize> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == self.call {
                x.fill(f64::NAN);
                return Err(WaveError::ConvergenceFailure {
                    iterations: 1,
                    residual: 1.,
                    tolerance: 1e-8,
                });
            }
            ConjugateGradient::default().solve(a, x, b)
        }
    }

    fn mesh() -> QuadMesh {
        let mut mesh = QuadMesh::hyper_cube(-1., 1.);
        mesh.refine_global(3);
        // some hanging vertices for good measure
        mesh.execute_coarsening_and_refinement(
            &CellSubset::from_indices([0, 1, 2, 3, 20]),
            &CellSubset::new_empty(),
        );
        mesh
    }

    #[test]
    fn theta_parameters() {
        let params = ThetaParameters::from_time_step(1. / 64., 50.).unwrap();
        assert_relative_eq!(params.theta, 0.5 + 50. / 64.);
        // theta above 1 is kept as is
        assert!(params.theta > 1.);
        assert!(ThetaParameters::new(0.1, 0.).is_err());
        assert!(ThetaParameters::new(0., 0.5).is_err());
        assert!(ThetaParameters::new(-0.1, 0.5).is_err());
        assert!(ThetaParameters::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn crank_nicolson_conserves_energy() {
        let mesh = mesh();
        let disc = Discretization::build(&mesh, Generation(0));
        let problem = standing_wave();
        let mut state = SimulationState::new(&disc, &problem);
        let initial = energy(&disc, &state).unwrap();
        assert!(initial > 0.);

        let params = ThetaParameters::new(1. / 32., 0.5).unwrap();
        let mut stepper = TimeStepper::new(params, ConjugateGradient::default());
        for n in 1..=20 {
            let report = stepper.step(&disc, &problem, &mut state).unwrap();
            assert_eq!(state.step, n);
            assert!(report.iterations_u > 0 && report.iterations_v > 0);
            assert_relative_eq!(report.energy, initial, max_relative = 1e-5);
        }
        assert_relative_eq!(state.time, 20. / 32., epsilon = 1e-14);
        assert_eq!(state.u, state.u_prev);
    }

    #[test]
    fn larger_theta_dissipates_energy() {
        let mesh = mesh();
        let disc = Discretization::build(&mesh, Generation(0));
        let problem = standing_wave();
        let mut state = SimulationState::new(&disc, &problem);
        let mut previous = energy(&disc, &state).unwrap();

        let params = ThetaParameters::new(1. / 32., 0.75).unwrap();
        let mut stepper = TimeStepper::new(params, ConjugateGradient::default());
        for _ in 0..10 {
            let report = stepper.step(&disc, &problem, &mut state).unwrap();
            assert!(report.energy < previous);
            previous = report.energy;
        }
    }

    #[test]
    fn boundary_pulse_enters_the_domain() {
        let mesh = mesh();
        let disc = Discretization::build(&mesh, Generation(0));
        let problem = BoundaryPulse::default();
        let mut state = SimulationState::new(&disc, &problem);
        let params = ThetaParameters::from_time_step(1. / 64., 50.).unwrap();
        let mut stepper = TimeStepper::new(params, ConjugateGradient::default());

        let report = stepper.step(&disc, &problem, &mut state).unwrap();
        assert!(report.energy > 0.);
        let expected = (4. * PI / 64.).sin();
        for dof in disc.boundary_dofs().ones() {
            let p = disc.support_points()[dof];
            if p.x < 0. && p.y.abs() < 1. / 3. {
                assert_relative_eq!(state.u.values[dof], expected, epsilon = 1e-12);
            } else {
                assert_eq!(state.u.values[dof], 0.);
            }
        }
        // hanging vertices stay consistent
        for dof in 0..disc.n_dofs() {
            if let Some(line) = disc.constraints().line(dof) {
                let value: f64 = line.iter().map(|(m, w)| w * state.u.values[*m]).sum();
                assert_relative_eq!(state.u.values[dof], value, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn new_generations_rebuild_matrices() {
        let mesh = mesh();
        let first = Discretization::build(&mesh, Generation(0));
        let problem = standing_wave();
        let mut state = SimulationState::new(&first, &problem);
        let params = ThetaParameters::new(1. / 32., 0.5).unwrap();
        let mut stepper = TimeStepper::new(params, ConjugateGradient::default());
        stepper.step(&first, &problem, &mut state).unwrap();

        let second = Discretization::build(&mesh, Generation(1));
        // the state still belongs to the first generation
        assert!(matches!(
            stepper.step(&second, &problem, &mut state),
            Err(WaveError::StaleGeneration { .. })
        ));
        assert_eq!(state.step, 1);

        state.reset(&second, &problem);
        stepper.step(&second, &problem, &mut state).unwrap();
        assert_eq!(state.generation, Generation(1));
        assert_eq!(state.u.generation(), Generation(1));
    }

    #[test]
    fn failed_velocity_solve_leaves_state_untouched() {
        let mesh = mesh();
        let disc = Discretization::build(&mesh, Generation(0));
        let problem = standing_wave();
        let mut state = SimulationState::new(&disc, &problem);
        let params = ThetaParameters::new(1. / 32., 0.5).unwrap();
        let solver = FailingOnCall {
            call: 2,
            calls: Cell::new(0),
        };
        let mut stepper = TimeStepper::new(params, solver);
        let before = state.clone();

        let result = stepper.step(&disc, &problem, &mut state);
        assert!(matches!(result, Err(WaveError::ConvergenceFailure { .. })));
        // the displacement solve went through before the failure
        assert_eq!(stepper.solver.calls.get(), 2);
        assert_eq!(state.step, before.step);
        assert_eq!(state.time, before.time);
        assert_eq!(state.u, before.u);
        assert_eq!(state.v, before.v);
        assert_eq!(state.u_prev, before.u_prev);
        assert_eq!(state.v_prev, before.v_prev);
    }

    #[test]
    fn same_generation_on_a_different_mesh_rebuilds_matrices() {
        let problem = standing_wave();
        let params = ThetaParameters::new(1. / 32., 0.5).unwrap();
        let mut stepper = TimeStepper::new(params, ConjugateGradient::default());

        let mut coarse_mesh = QuadMesh::hyper_cube(-1., 1.);
        coarse_mesh.refine_global(2);
        let coarse = Discretization::build(&coarse_mesh, Generation(0));
        let mut state = SimulationState::new(&coarse, &problem);
        stepper.step(&coarse, &problem, &mut state).unwrap();

        let fine = Discretization::build(&mesh(), Generation(0));
        assert_ne!(fine.n_dofs(), coarse.n_dofs());
        let mut state = SimulationState::new(&fine, &problem);
        let initial = energy(&fine, &state).unwrap();
        let report = stepper.step(&fine, &problem, &mut state).unwrap();
        assert_eq!(state.u.len(), fine.n_dofs());
        assert_relative_eq!(report.energy, initial, max_relative = 1e-5);
    }
}
