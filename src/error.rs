//! The error type shared by every stage of a simulation run.
//!
//! Nothing here is retried: any of these aborts the run
//! and is reported at the top level.

use crate::field::Generation;

/// Error raised while setting up or running a simulation.
#[derive(thiserror::Error, Debug)]
pub enum WaveError {
    /// The linear solver did not reach its tolerance within its iteration budget.
    #[error(
        "linear solver did not converge after {iterations} iterations \
         (residual {residual:.3e}, tolerance {tolerance:.3e})"
    )]
    ConvergenceFailure {
        /// Iterations performed before giving up.
        iterations: usize,
        /// Residual norm at the last iteration.
        residual: f64,
        /// Absolute residual tolerance that was requested.
        tolerance: f64,
    },
    /// A field vector does not match the degree-of-freedom count of its discretization.
    #[error("field has {actual} entries but the discretization has {expected} degrees of freedom")]
    InvalidStateSize {
        /// Degrees of freedom in the discretization.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// A field or operator from one discretization generation
    /// was used together with another generation.
    #[error("field belongs to generation {actual} but generation {expected} is active")]
    StaleGeneration {
        /// The generation the operation was built for.
        expected: Generation,
        /// The generation the field carries.
        actual: Generation,
    },
    /// A cell ended up outside the configured refinement level band.
    #[error("cell at level {level} is outside the allowed levels {min_level}..={max_level}")]
    RefinementBoundsViolated {
        /// Level of the offending cell.
        level: u8,
        /// Lowest permitted level.
        min_level: u8,
        /// Highest permitted level.
        max_level: u8,
    },
    /// Solution transfer could not find values for a cell of the new mesh.
    #[error("no transferred values available for cell {cell}")]
    TransferIncomplete {
        /// Arena id of the cell without data.
        cell: usize,
    },
    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, WaveError>`.
pub type Result<T> = std::result::Result<T, WaveError>;
