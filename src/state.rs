//! The time-dependent state of a simulation.

use crate::{
    discretization::Discretization,
    error::{Result, WaveError},
    field::{Field, Generation},
    problem::WaveProblem,
};

/// Displacement and velocity at the current and previous time levels.
///
/// Outside of a mesh change all four fields belong to `generation`.
#[derive(Clone, Debug)]
pub struct SimulationState {
    /// Displacement at `time`.
    pub u: Field,
    /// Velocity at `time`.
    pub v: Field,
    /// Displacement at the previous time level.
    pub u_prev: Field,
    /// Velocity at the previous time level.
    pub v_prev: Field,
    /// Current time.
    pub time: f64,
    /// Number of steps taken since the last reset.
    pub step: usize,
    /// Generation of the discretization the fields belong to.
    pub generation: Generation,
}

impl SimulationState {
    /// Initial state of a problem at `t = 0`.
    pub fn new(disc: &Discretization, problem: &impl WaveProblem) -> Self {
        let u = disc.interpolate(|p| problem.initial_displacement(p));
        let v = disc.interpolate(|p| problem.initial_velocity(p));
        Self {
            u_prev: u.clone(),
            v_prev: v.clone(),
            u,
            v,
            time: 0.,
            step: 0,
            generation: disc.generation(),
        }
    }

    /// Return to `t = 0` with the initial values interpolated on `disc`.
    pub fn reset(&mut self, disc: &Discretization, problem: &impl WaveProblem) {
        *self = Self::new(disc, problem);
    }

    /// Check that the state can be used with the given discretization.
    pub fn validate(&self, disc: &Discretization) -> Result<()> {
        if self.generation != disc.generation() {
            return Err(WaveError::StaleGeneration {
                expected: disc.generation(),
                actual: self.generation,
            });
        }
        for field in [&self.u, &self.v, &self.u_prev, &self.v_prev] {
            disc.check(field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::QuadMesh, problem::Homogeneous};

    #[test]
    fn reset_and_validate() {
        let mut mesh = QuadMesh::hyper_cube(-1., 1.);
        mesh.refine_global(2);
        let disc = Discretization::build(&mesh, Generation(5));
        let problem = Homogeneous::new(|p: crate::Vec2| p.x);

        let mut state = SimulationState::new(&disc, &problem);
        assert_eq!(state.generation, Generation(5));
        assert_eq!(state.u, state.u_prev);
        assert!(state.validate(&disc).is_ok());

        state.time = 1.;
        state.step = 64;
        state.v_prev = Field::zeros(disc.n_dofs() + 1, Generation(5));
        assert!(matches!(
            state.validate(&disc),
            Err(WaveError::InvalidStateSize { .. })
        ));

        state.reset(&disc, &problem);
        assert_eq!(state.step, 0);
        assert_eq!(state.time, 0.);
        assert!(state.validate(&disc).is_ok());

        let next = Discretization::build(&mesh, Generation(6));
        assert!(matches!(
            state.validate(&next),
            Err(WaveError::StaleGeneration { .. })
        ));
    }
}
