//! Solvers for Cutting Stock
//!
//! The linear and integer programs are built with `good_lp` and handed to the
//! backend selected by the `solver-microlp` (default) or `solver-highs`
//! features.

use std::fmt;

use good_lp::ResolutionError;
use num_traits::ToPrimitive;
use thiserror::Error;

#[cfg(feature = "solver-highs")]
pub(crate) use good_lp::solvers::highs::highs as default_solver;
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
pub(crate) use good_lp::solvers::microlp::microlp as default_solver;

use crate::instance::InstanceError;

pub mod column_generation;
pub mod master;
pub mod pricing;

/// Objective coefficient of every pattern variable: one stock roll.
pub const ROLL_COST: f64 = 1.0;

/// Distance from an integer within which solver output is treated as that
/// integer.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Sub-model a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Restricted master linear relaxation
    Master,

    /// Knapsack pricing subproblem
    Pricing,

    /// Integer re-solve of the master over the generated columns
    Rounding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Master => "master",
            Stage::Pricing => "pricing",
            Stage::Rounding => "rounding",
        })
    }
}

/// Solver Errors
#[derive(Debug, Error)]
pub enum SolverError {
    /// The instance violates a configuration invariant.
    #[error(transparent)]
    Instance(#[from] InstanceError),

    /// Wrapped solver resolution error (infeasible, unbounded, backend failure).
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Integer cannot be represented exactly as a solver coefficient.
    #[error("value cannot be represented exactly as a solver coefficient: {value}")]
    CoefficientNotRepresentable {
        /// The offending value
        value: u64,
    },

    /// Internal solver invariant was violated (this is a bug).
    #[error("solver invariant violated: {message}")]
    InvariantViolation {
        /// What invariant was violated
        message: &'static str,
    },

    /// Column generation was still finding columns when the limit was hit.
    #[error("column generation did not converge within {limit} iterations")]
    IterationLimit {
        /// Configured iteration limit
        limit: usize,
    },

    /// Columns cannot be added once the master has integer variables.
    #[error("master problem has been finalised as integer; no further columns can be added")]
    MasterFinalised,

    /// A solve failed inside the column generation loop.
    #[error("{stage} failed at iteration {iteration}: {source}")]
    Aborted {
        /// Sub-model that failed
        stage: Stage,

        /// Number of columns generated before the failure
        iteration: usize,

        /// Underlying failure
        #[source]
        source: Box<SolverError>,
    },
}

impl SolverError {
    /// Wrap a failure with the stage and iteration it happened in.
    pub(crate) fn aborted(stage: Stage, iteration: usize, source: SolverError) -> Self {
        SolverError::Aborted {
            stage,
            iteration,
            source: Box::new(source),
        }
    }
}

/// Convert a `u64` to an `f64` coefficient if it can be represented exactly.
///
/// `good_lp` stores coefficients as `f64`. Only integers with absolute value
/// <= 2^53 can be represented exactly in an IEEE-754 `f64` mantissa; enforce
/// that via a round-trip check so we never silently change the model.
pub(crate) fn coefficient(value: u64) -> Result<f64, SolverError> {
    value
        .to_f64()
        .filter(|f| f.to_u64() == Some(value))
        .ok_or(SolverError::CoefficientNotRepresentable { value })
}

/// Snap a value to the nearest integer if it is within tolerance of it.
pub(crate) fn snap(value: f64) -> f64 {
    let rounded = value.round();

    if (value - rounded).abs() <= INTEGRALITY_TOLERANCE {
        rounded
    } else {
        value
    }
}

/// Interpret the value of an integer variable as a count.
///
/// Values are snapped first; anything below one half is zero, so only
/// strictly positive counts survive.
pub(crate) fn to_count(value: f64) -> Result<u64, SolverError> {
    let snapped = snap(value);

    if snapped < 0.5 {
        return Ok(0);
    }

    if (snapped - snapped.round()).abs() > INTEGRALITY_TOLERANCE {
        return Err(SolverError::InvariantViolation {
            message: "integer variable returned a fractional value",
        });
    }

    snapped.round().to_u64().ok_or(SolverError::InvariantViolation {
        message: "integer variable value does not fit in a count",
    })
}
