//! Pricing Subproblem
//!
//! Bounded knapsack that searches for the most valuable single-roll pattern
//! under the master's current dual prices:
//!
//! ```text
//! max  Σ_i π_i * y_i
//! s.t. Σ_i width[i] * y_i <= W
//!      y_i ∈ {0, ..., floor(W / width[i])}
//! ```

use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable, variable};
use smallvec::SmallVec;

use crate::{
    instance::Instance,
    patterns::Pattern,
    solvers::{
        ROLL_COST, SolverError, coefficient, default_solver, master::DualPrices, snap, to_count,
    },
};

/// Best pattern found by a pricing solve.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingSolution {
    objective: f64,
    pattern: Pattern,
}

impl PricingSolution {
    /// Value of the pattern under the prices it was solved with
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Candidate pattern
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Reduced cost of the candidate column, `1 - objective`.
    pub fn reduced_cost(&self) -> f64 {
        ROLL_COST - self.objective
    }

    /// Whether adding the candidate can lower the master objective, i.e. the
    /// objective is strictly greater than the cost of one roll.
    pub fn prices_out(&self) -> bool {
        self.objective > ROLL_COST
    }
}

/// Knapsack pricing model with overwritable objective coefficients.
#[derive(Debug, Clone)]
pub struct PricingSubproblem {
    instance: Instance,
    widths: SmallVec<[f64; 8]>,
    bounds: SmallVec<[f64; 8]>,
    roll_width: f64,
    prices: SmallVec<[f64; 8]>,
    prices_fresh: bool,
}

impl PricingSubproblem {
    /// Build the knapsack for an instance.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if a width or bound cannot be represented
    /// exactly as a solver coefficient.
    pub fn new(instance: &Instance) -> Result<Self, SolverError> {
        let widths = instance
            .widths()
            .map(coefficient)
            .collect::<Result<SmallVec<[f64; 8]>, _>>()?;

        let bounds = (0..instance.len())
            .map(|idx| {
                instance
                    .max_copies(idx)
                    .ok_or(SolverError::InvariantViolation {
                        message: "item index out of range",
                    })
                    .and_then(coefficient)
            })
            .collect::<Result<SmallVec<[f64; 8]>, _>>()?;

        Ok(Self {
            instance: instance.clone(),
            widths,
            bounds,
            roll_width: coefficient(instance.roll_width())?,
            prices: SmallVec::from_elem(0.0, instance.len()),
            prices_fresh: false,
        })
    }

    /// Overwrite every objective coefficient with the matching dual price.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvariantViolation`] if the number of prices does
    /// not match the number of items.
    pub fn set_prices(&mut self, duals: &DualPrices) -> Result<(), SolverError> {
        if duals.len() != self.prices.len() {
            return Err(SolverError::InvariantViolation {
                message: "dual price count does not match the number of items",
            });
        }

        self.prices.copy_from_slice(duals.as_slice());
        self.prices_fresh = true;

        Ok(())
    }

    /// Solve the knapsack under the prices from the last [`set_prices`] call.
    ///
    /// The objective is recomputed from the accepted integer counts and
    /// snapped, so jitter in the solver output cannot push it across the
    /// profitability threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvariantViolation`] if prices were not set since
    /// the previous solve or the solver returns a pattern that does not fit,
    /// and a wrapped resolution error if the backend fails.
    ///
    /// [`set_prices`]: PricingSubproblem::set_prices
    pub fn solve(&mut self) -> Result<PricingSolution, SolverError> {
        if !self.prices_fresh {
            return Err(SolverError::InvariantViolation {
                message: "pricing solved without fresh dual prices",
            });
        }

        self.prices_fresh = false;

        let mut pb = ProblemVariables::new();

        let y: SmallVec<[Variable; 8]> = self
            .bounds
            .iter()
            .map(|&bound| pb.add(variable().integer().min(0).max(bound)))
            .collect();

        let mut value = Expression::default();
        let mut used = Expression::default();

        for ((var, price), width) in y.iter().copied().zip(&self.prices).zip(&self.widths) {
            value += var * *price;
            used += var * *width;
        }

        let solution = pb
            .maximise(value)
            .using(default_solver)
            .with(used.leq(self.roll_width))
            .solve()?;

        let counts = y
            .iter()
            .map(|var| to_count(solution.value(*var)))
            .collect::<Result<SmallVec<[u64; 8]>, _>>()?;

        let pattern = Pattern::new(counts);

        if !pattern.fits(&self.instance) {
            return Err(SolverError::InvariantViolation {
                message: "pricing returned a pattern that exceeds the roll width",
            });
        }

        let objective = snap(
            pattern
                .counts()
                .iter()
                .zip(&self.prices)
                .map(|(&count, price)| coefficient(count).map(|count| count * price))
                .sum::<Result<f64, _>>()?,
        );

        Ok(PricingSolution { objective, pattern })
    }
}
