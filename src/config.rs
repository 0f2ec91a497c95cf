//! Simulation parameters.

use std::path::PathBuf;

use crate::{
    adapt::RefinementPolicy,
    error::{Result, WaveError},
    mesh::MAX_LEVEL,
    solver::SolverControl,
    stepper::ThetaParameters,
};

/// Everything needed to set up a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Number of global refinements of the initial mesh.
    /// Also the coarsest level adaptation may return to.
    pub initial_refinement: u8,
    /// Number of adaptations at the first time step before the main loop.
    /// Also the number of levels adaptation may add on top of `initial_refinement`.
    pub pre_refinement_steps: u8,
    /// `θ = 1/2 + theta_bias · time_step`.
    pub theta_bias: f64,
    /// The main loop steps while the time is at most this.
    pub end_time: f64,
    /// Time step `k`.
    pub time_step: f64,
    /// Fixed-fraction refinement share of the total error.
    pub refine_fraction: f64,
    /// Fixed-fraction coarsening share of the total error.
    pub coarsen_fraction: f64,
    /// Adapt the mesh every this many steps in the main loop.
    pub refine_interval: usize,
    /// Iteration budget of the linear solver.
    pub solver_max_iterations: usize,
    /// Residual tolerance of the linear solver relative to the right-hand side.
    pub solver_tolerance: f64,
    /// The domain is the square `[domain.0, domain.1]²`.
    pub domain: (f64, f64),
    /// Directory for snapshot files.
    pub output_dir: PathBuf,
    /// Whether to write snapshot files at all.
    pub write_output: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_refinement: 4,
            pre_refinement_steps: 4,
            theta_bias: 50.,
            end_time: 5.,
            time_step: 1. / 64.,
            refine_fraction: 0.6,
            coarsen_fraction: 0.4,
            refine_interval: 5,
            solver_max_iterations: 1000,
            solver_tolerance: 1e-8,
            domain: (-1., 1.),
            output_dir: PathBuf::from("."),
            write_output: true,
        }
    }
}

impl SimulationConfig {
    /// Check every parameter, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(WaveError::InvalidConfig(msg));

        let (lower, upper) = self.domain;
        if !(lower < upper) || !lower.is_finite() || !upper.is_finite() {
            return invalid(format!("empty domain [{lower}, {upper}]"));
        }
        if !(self.end_time >= 0.) || !self.end_time.is_finite() {
            return invalid(format!("end time must be non-negative, got {}", self.end_time));
        }
        if self.refine_interval == 0 {
            return invalid("refinement interval must be at least 1".into());
        }
        if self.solver_max_iterations == 0 {
            return invalid("solver needs at least one iteration".into());
        }
        if !(self.solver_tolerance > 0.) {
            return invalid(format!(
                "solver tolerance must be positive, got {}",
                self.solver_tolerance
            ));
        }
        if self.initial_refinement as usize + self.pre_refinement_steps as usize
            > MAX_LEVEL as usize
        {
            return invalid(format!(
                "refinement up to level {} exceeds the maximum of {MAX_LEVEL}",
                self.initial_refinement as usize + self.pre_refinement_steps as usize
            ));
        }
        self.refinement_policy().validate()?;
        self.theta_parameters()?;
        Ok(())
    }

    /// Time step and theta.
    pub fn theta_parameters(&self) -> Result<ThetaParameters> {
        ThetaParameters::from_time_step(self.time_step, self.theta_bias)
    }

    /// Level band and fractions for mesh adaptation.
    pub fn refinement_policy(&self) -> RefinementPolicy {
        RefinementPolicy {
            min_level: self.initial_refinement,
            max_level: self.initial_refinement.saturating_add(self.pre_refinement_steps),
            refine_fraction: self.refine_fraction,
            coarsen_fraction: self.coarsen_fraction,
            pre_refinement_steps: self.pre_refinement_steps as usize,
        }
    }

    /// Stopping criteria of the linear solver.
    pub fn solver_control(&self) -> SolverControl {
        SolverControl {
            max_iterations: self.solver_max_iterations,
            relative_tolerance: self.solver_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());

        let params = config.theta_parameters().unwrap();
        assert_relative_eq!(params.theta, 0.5 + 50. / 64.);
        let policy = config.refinement_policy();
        assert_eq!((policy.min_level, policy.max_level), (4, 8));
        assert_eq!(policy.pre_refinement_steps, 4);
        assert_eq!(config.solver_control(), SolverControl::default());
    }

    #[test]
    fn bad_values_are_rejected() {
        let bad = [
            SimulationConfig {
                time_step: 0.,
                ..Default::default()
            },
            SimulationConfig {
                refine_fraction: -0.1,
                ..Default::default()
            },
            SimulationConfig {
                coarsen_fraction: 1.1,
                ..Default::default()
            },
            SimulationConfig {
                refine_interval: 0,
                ..Default::default()
            },
            SimulationConfig {
                domain: (1., -1.),
                ..Default::default()
            },
            SimulationConfig {
                theta_bias: -100.,
                ..Default::default()
            },
            SimulationConfig {
                initial_refinement: 20,
                pre_refinement_steps: 10,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(WaveError::InvalidConfig(_))),
                "{config:?} should be invalid"
            );
        }
    }
}
