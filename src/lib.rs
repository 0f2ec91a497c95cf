//! Wave equation `u_tt = Δu + f` on an adaptively refined quadtree mesh,
//! integrated in time with the theta method.
//!
//! The pieces, from the bottom up:
//! a [`QuadMesh`] of square cells with 2:1 balanced refinement and coarsening,
//! a bilinear finite element [`Discretization`] of it
//! with hanging-vertex constraints,
//! a [`TimeStepper`] advancing displacement and velocity,
//! a [`MeshController`] adapting the mesh to the Kelly error indicator
//! and carrying the solution over with [`SolutionTransfer`],
//! and a [`Simulation`] running the whole thing with pre-refinement restarts.
//!
//! Every discretization has a [`Generation`] tag,
//! and so does every [`Field`] and [`Operator`] built from it.
//! Mixing generations is an error rather than silent garbage.

#![warn(missing_docs)]

pub mod error;
#[doc(inline)]
pub use error::{Result, WaveError};

pub mod mesh;
#[doc(inline)]
pub use mesh::{CellSubset, Face, QuadMesh};

pub mod quadrature;

pub mod element;

pub mod field;
#[doc(inline)]
pub use field::{Field, Generation};

pub mod operator;
#[doc(inline)]
pub use operator::Operator;

pub mod discretization;
#[doc(inline)]
pub use discretization::{ConstraintSet, Discretization};

pub mod solver;
#[doc(inline)]
pub use solver::{ConjugateGradient, LinearSolver, SolverControl};

pub mod estimator;
#[doc(inline)]
pub use estimator::{ErrorIndicator, KellyIndicator};

pub mod transfer;
#[doc(inline)]
pub use transfer::SolutionTransfer;

pub mod adapt;
#[doc(inline)]
pub use adapt::{MeshController, RefinementPolicy};

pub mod problem;
#[doc(inline)]
pub use problem::{BoundaryPulse, Homogeneous, WaveProblem};

pub mod state;
#[doc(inline)]
pub use state::SimulationState;

pub mod stepper;
#[doc(inline)]
pub use stepper::{ThetaParameters, TimeStepper};

pub mod output;
#[doc(inline)]
pub use output::{NullSink, OutputSink, VtuWriter};

pub mod config;
#[doc(inline)]
pub use config::SimulationConfig;

pub mod run;
#[doc(inline)]
pub use run::{Phase, RunSummary, Simulation};

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 2D `nalgebra` vector.
pub type Vec2 = na::Vector2<f64>;
