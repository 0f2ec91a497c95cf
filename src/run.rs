//! The top-level time loop with adaptive pre-refinement restarts.
//!
//! A run goes through the phases of [`Phase`] in order.
//! During pre-refinement the first time step is taken,
//! the mesh is adapted to the solution it produced,
//! and time is reset to zero on the adapted mesh.
//! This repeats `pre_refinement_steps` times
//! so that the mesh is already fine where the initial transient needs it
//! when the main loop starts.

use crate::{
    adapt::{AdaptReport, MeshController},
    config::SimulationConfig,
    discretization::Discretization,
    error::Result,
    estimator::KellyIndicator,
    field::Generation,
    mesh::QuadMesh,
    output::OutputSink,
    problem::WaveProblem,
    solver::ConjugateGradient,
    state::SimulationState,
    stepper::{StepReport, TimeStepper},
};

/// Where a run is in its life cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Building the globally refined starting mesh.
    InitialMesh,
    /// Taking the first step and adapting to it, then starting over.
    PreRefining {
        /// Number of restarts performed so far.
        pass: usize,
    },
    /// Stepping until the end time, adapting at a fixed cadence.
    MainLoop,
    /// Done.
    Terminated,
}

/// One completed time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepRecord {
    /// Time after the step.
    pub time: f64,
    /// Step number after the step.
    pub step: usize,
    /// Discretization generation the step was computed on.
    pub generation: Generation,
    /// Total energy after the step.
    pub energy: f64,
}

/// Outcome of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Every step taken, including the discarded pre-refinement ones.
    pub history: Vec<StepRecord>,
    /// Number of restarts after pre-refinement.
    pub pre_refinement_passes: usize,
    /// Number of mesh adaptations, pre-refinement included.
    pub adaptations: usize,
    /// Time at the end of the run.
    pub final_time: f64,
    /// Step number at the end of the run.
    pub final_step: usize,
    /// Discretization generation at the end of the run.
    pub final_generation: Generation,
    /// Active cells of the final mesh.
    pub n_active_cells: usize,
    /// Degrees of freedom of the final discretization.
    pub n_dofs: usize,
}

/// A wave simulation on an adaptive mesh.
pub struct Simulation<P: WaveProblem, O: OutputSink> {
    config: SimulationConfig,
    problem: P,
    sink: O,
    mesh: QuadMesh,
    disc: Discretization,
    state: SimulationState,
    stepper: TimeStepper<ConjugateGradient>,
    controller: MeshController<KellyIndicator>,
    history: Vec<StepRecord>,
    adaptations: usize,
}

impl<P: WaveProblem, O: OutputSink> Simulation<P, O> {
    /// Validate the configuration and set up the initial mesh.
    pub fn new(config: SimulationConfig, problem: P, sink: O) -> Result<Self> {
        config.validate()?;
        let (mesh, disc) = initial_mesh(&config);
        let state = SimulationState::new(&disc, &problem);
        let stepper = TimeStepper::new(
            config.theta_parameters()?,
            ConjugateGradient::new(config.solver_control()),
        );
        let controller = MeshController::new(KellyIndicator, config.refinement_policy());
        Ok(Self {
            config,
            problem,
            sink,
            mesh,
            disc,
            state,
            stepper,
            controller,
            history: Vec::new(),
            adaptations: 0,
        })
    }

    /// The output sink.
    #[inline]
    pub fn sink(&self) -> &O {
        &self.sink
    }

    /// The current mesh.
    #[inline]
    pub fn mesh(&self) -> &QuadMesh {
        &self.mesh
    }

    /// The current discretization.
    #[inline]
    pub fn discretization(&self) -> &Discretization {
        &self.disc
    }

    /// The current state.
    #[inline]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Run from the initial mesh until the end time.
    ///
    /// Every run starts over from the globally refined mesh,
    /// so running twice gives the same result.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut phase = Phase::InitialMesh;
        let mut pre_refinement_passes = 0;
        loop {
            phase = match phase {
                Phase::InitialMesh => {
                    self.reset_mesh()?;
                    Phase::PreRefining { pass: 0 }
                }
                Phase::PreRefining { pass } => {
                    self.state.reset(&self.disc, &self.problem);
                    self.write_snapshot()?;
                    self.advance()?;
                    if pass < self.controller.policy.pre_refinement_steps {
                        self.adapt()?;
                        pre_refinement_passes = pass + 1;
                        log::info!(
                            "Restarting at t = 0 after pre-refinement pass {pre_refinement_passes}"
                        );
                        Phase::PreRefining { pass: pass + 1 }
                    } else {
                        self.adapt_on_cadence()?;
                        Phase::MainLoop
                    }
                }
                Phase::MainLoop => {
                    while self.state.time <= self.config.end_time {
                        self.advance()?;
                        self.adapt_on_cadence()?;
                    }
                    Phase::Terminated
                }
                Phase::Terminated => break,
            };
        }

        Ok(RunSummary {
            history: std::mem::take(&mut self.history),
            pre_refinement_passes,
            adaptations: self.adaptations,
            final_time: self.state.time,
            final_step: self.state.step,
            final_generation: self.disc.generation(),
            n_active_cells: self.mesh.n_active_cells(),
            n_dofs: self.disc.n_dofs(),
        })
    }

    fn reset_mesh(&mut self) -> Result<()> {
        let (mesh, disc) = initial_mesh(&self.config);
        self.mesh = mesh;
        self.disc = disc;
        self.state = SimulationState::new(&self.disc, &self.problem);
        // generations restart at zero, so cached matrices can't be trusted
        self.stepper = TimeStepper::new(
            self.config.theta_parameters()?,
            ConjugateGradient::new(self.config.solver_control()),
        );
        self.history.clear();
        self.adaptations = 0;

        let params = self.stepper.params();
        log::info!(
            "Initial mesh: {} active cells, {} degrees of freedom; k = {}, theta = {}",
            self.mesh.n_active_cells(),
            self.disc.n_dofs(),
            params.time_step,
            params.theta,
        );
        Ok(())
    }

    /// Take one step and report it.
    fn advance(&mut self) -> Result<StepReport> {
        let report = self
            .stepper
            .step(&self.disc, &self.problem, &mut self.state)?;
        log::info!(
            "Time step {} at t = {:.6}: total energy {:.6e}",
            self.state.step,
            self.state.time,
            report.energy
        );
        self.write_snapshot()?;
        self.history.push(StepRecord {
            time: self.state.time,
            step: self.state.step,
            generation: self.disc.generation(),
            energy: report.energy,
        });
        Ok(report)
    }

    fn adapt_on_cadence(&mut self) -> Result<()> {
        let step = self.state.step;
        if step > 0 && step % self.config.refine_interval == 0 {
            self.adapt()?;
        }
        Ok(())
    }

    fn adapt(&mut self) -> Result<AdaptReport> {
        let (disc, report) = self
            .controller
            .adapt(&mut self.mesh, &self.disc, &mut self.state)?;
        self.disc = disc;
        self.adaptations += 1;
        log::info!(
            "Adapted mesh at step {}: {} cells refined, {} families coarsened, \
             {} active cells, {} degrees of freedom (generation {})",
            self.state.step,
            report.refined,
            report.coarsened,
            report.n_active_cells,
            report.n_dofs,
            self.disc.generation(),
        );
        Ok(report)
    }

    fn write_snapshot(&mut self) -> Result<()> {
        self.sink.write_snapshot(
            self.state.step,
            &self.disc,
            &[("U", &self.state.u), ("V", &self.state.v)],
        )
    }
}

/// The globally refined starting mesh and its generation-0 discretization.
fn initial_mesh(config: &SimulationConfig) -> (QuadMesh, Discretization) {
    let (lower, upper) = config.domain;
    let mut mesh = QuadMesh::hyper_cube(lower, upper);
    mesh.refine_global(config.initial_refinement);
    let disc = Discretization::build(&mesh, Generation(0));
    (mesh, disc)
}

//
// tests
//
