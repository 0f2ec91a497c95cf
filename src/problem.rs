//! Initial values, boundary values and forcing of a wave problem.

use crate::Vec2;

/// The data defining a wave problem `u_tt = Δu + f`.
///
/// Every method is a pure function of position (and time),
/// so the same problem can be evaluated on any discretization.
/// All of them default to zero.
pub trait WaveProblem {
    /// Displacement at `t = 0`.
    fn initial_displacement(&self, _p: Vec2) -> f64 {
        0.
    }

    /// Velocity at `t = 0`.
    fn initial_velocity(&self, _p: Vec2) -> f64 {
        0.
    }

    /// Displacement prescribed on the boundary.
    fn boundary_displacement(&self, _p: Vec2, _t: f64) -> f64 {
        0.
    }

    /// Velocity prescribed on the boundary.
    /// Should be the time derivative of the boundary displacement.
    fn boundary_velocity(&self, _p: Vec2, _t: f64) -> f64 {
        0.
    }

    /// The right-hand side `f`.
    fn forcing(&self, _p: Vec2, _t: f64) -> f64 {
        0.
    }
}

/// A wave entering the domain at rest through part of its left edge.
///
/// For `t <= duration`, boundary points with `x < 0` and `|y| < half_width`
/// move with `u = sin(ω t)`;
/// everything else is zero.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryPulse {
    /// Angular frequency `ω`.
    pub angular_frequency: f64,
    /// Time after which the boundary is at rest.
    pub duration: f64,
    /// Half the height of the excited part of the edge.
    pub half_width: f64,
}

impl Default for BoundaryPulse {
    fn default() -> Self {
        Self {
            angular_frequency: 4. * std::f64::consts::PI,
            duration: 0.5,
            half_width: 1. / 3.,
        }
    }
}

impl BoundaryPulse {
    #[inline]
    fn is_active(&self, p: Vec2, t: f64) -> bool {
        t <= self.duration && p.x < 0. && p.y.abs() < self.half_width
    }
}

impl WaveProblem for BoundaryPulse {
    fn boundary_displacement(&self, p: Vec2, t: f64) -> f64 {
        if self.is_active(p, t) {
            (self.angular_frequency * t).sin()
        } else {
            0.
        }
    }

    fn boundary_velocity(&self, p: Vec2, t: f64) -> f64 {
        if self.is_active(p, t) {
            self.angular_frequency * (self.angular_frequency * t).cos()
        } else {
            0.
        }
    }
}

/// Zero boundary values and forcing with a given initial displacement.
pub struct Homogeneous<F> {
    initial_displacement: F,
}

impl<F> Homogeneous<F>
where
    F: Fn(Vec2) -> f64,
{
    /// Create a problem starting from the given displacement at rest.
    pub fn new(initial_displacement: F) -> Self {
        Self {
            initial_displacement,
        }
    }
}

impl<F> WaveProblem for Homogeneous<F>
where
    F: Fn(Vec2) -> f64,
{
    fn initial_displacement(&self, p: Vec2) -> f64 {
        (self.initial_displacement)(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pulse_is_local_in_space_and_time() {
        let pulse = BoundaryPulse::default();
        let left = Vec2::new(-1., 0.1);
        assert_relative_eq!(pulse.boundary_displacement(left, 0.125), 1., epsilon = 1e-14);
        assert_relative_eq!(
            pulse.boundary_velocity(left, 0.),
            4. * std::f64::consts::PI
        );
        // outside the excited strip
        assert_eq!(pulse.boundary_displacement(Vec2::new(-1., 0.5), 0.125), 0.);
        assert_eq!(pulse.boundary_displacement(Vec2::new(1., 0.), 0.125), 0.);
        // after the pulse
        assert_eq!(pulse.boundary_velocity(left, 0.51), 0.);
        assert_eq!(pulse.initial_displacement(left), 0.);
        assert_eq!(pulse.forcing(left, 0.1), 0.);
    }

    #[test]
    fn homogeneous_problem_uses_given_initial_value() {
        let problem = Homogeneous::new(|p: Vec2| p.x + p.y);
        assert_eq!(problem.initial_displacement(Vec2::new(1., 2.)), 3.);
        assert_eq!(problem.initial_velocity(Vec2::new(1., 2.)), 0.);
        assert_eq!(problem.boundary_displacement(Vec2::new(1., 2.), 1.), 0.);
    }
}
