//! Master Problem
//!
//! The restricted master selects how many rolls to cut to each known pattern:
//!
//! ```text
//! min  Σ_p x_p
//! s.t. Σ_p count[j][p] * x_p >= demand[j]    for every item j    [π_j]
//!      x_p >= 0
//! ```
//!
//! `good_lp` builds models functionally, so the master keeps its own column
//! list and rebuilds a fresh solver model on each solve. Every mutation is
//! recorded as a [`MasterTransition`].
//!
//! The integer re-solve keeps each variable between the floor and the ceiling
//! of its value in the last relaxation. Rounding every fractional value up is
//! feasible, so the window always contains a cutting plan, and the search only
//! branches on the fractional columns of a basic solution.

use std::fmt;

use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable, variable};
use num_traits::ToPrimitive;
use smallvec::SmallVec;
use tracing::warn;

use crate::{
    instance::Instance,
    patterns::Pattern,
    solvers::{
        INTEGRALITY_TOLERANCE, ROLL_COST, SolverError, coefficient, default_solver, snap,
        to_count,
    },
};

/// Most fractional columns the integer re-solve branches on. Further
/// fractional columns are fixed at their rounded-up value.
pub const MAX_ROUNDING_BRANCHES: usize = 12;

/// Handle to a master column (pattern variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(usize);

impl ColumnId {
    /// Position of the column in the master's column list
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x_{}", self.0)
    }
}

/// Handle to a demand row, one per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DemandRow(usize);

impl DemandRow {
    /// Item index the row enforces demand for
    pub fn index(self) -> usize {
        self.0
    }
}

/// Domain of every pattern variable in the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableDomain {
    /// Linear relaxation, `x_p >= 0`
    Continuous,

    /// Integral cutting plan, `x_p ∈ ℤ, x_p >= 0`
    Integer,
}

/// Recorded structural change to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterTransition {
    /// A generated column was appended.
    ColumnAdded(ColumnId),

    /// Every variable was switched to the integer domain.
    FinalisedAsInteger,
}

/// Dual prices of the demand rows from a solved relaxation.
#[derive(Debug, Clone, PartialEq)]
pub struct DualPrices {
    values: SmallVec<[f64; 8]>,
}

impl DualPrices {
    /// Create dual prices from per-row values.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Dual price of a row
    pub fn get(&self, row: DemandRow) -> Option<f64> {
        self.values.get(row.0).copied()
    }

    /// Dual prices in row order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no rows
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

}

/// Result of a master solve.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSolution {
    objective: f64,
    values: Vec<f64>,
    duals: Option<DualPrices>,
    domain: VariableDomain,
}

impl MasterSolution {
    /// Objective value (rolls used)
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Value of a column variable
    pub fn value(&self, column: ColumnId) -> Option<f64> {
        self.values.get(column.0).copied()
    }

    /// Column values in column order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Columns with a value above tolerance, as `(column, value)`.
    pub fn nonzero(&self) -> impl Iterator<Item = (ColumnId, f64)> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, value)| value > INTEGRALITY_TOLERANCE)
            .map(|(idx, value)| (ColumnId(idx), value))
    }

    /// Dual prices of the demand rows; only present for the linear relaxation.
    pub fn duals(&self) -> Option<&DualPrices> {
        self.duals.as_ref()
    }

    /// Domain the solve was performed in
    pub fn domain(&self) -> VariableDomain {
        self.domain
    }
}

/// Restricted master problem over an append-only list of patterns.
#[derive(Debug, Clone)]
pub struct MasterProblem {
    instance: Instance,
    demands: SmallVec<[f64; 8]>,
    columns: Vec<Pattern>,
    domain: VariableDomain,
    transitions: Vec<MasterTransition>,
    relaxation: Option<MasterSolution>,
    window: Vec<(u64, u64)>,
}

impl MasterProblem {
    /// Build the master with one identity pattern per item.
    ///
    /// Row `j` starts out as `floor(W / width[j]) * x_j >= demand[j]`, which is
    /// satisfiable for every item on its own.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if a demand or identity count cannot be
    /// represented exactly as a solver coefficient.
    pub fn new(instance: &Instance) -> Result<Self, SolverError> {
        let demands = instance
            .demands()
            .map(coefficient)
            .collect::<Result<SmallVec<[f64; 8]>, _>>()?;

        let columns = (0..instance.len())
            .map(|idx| {
                Pattern::single(instance, idx).ok_or(SolverError::InvariantViolation {
                    message: "identity pattern index out of range",
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for pattern in &columns {
            pattern.counts().iter().try_for_each(|&count| coefficient(count).map(drop))?;
        }

        Ok(Self {
            instance: instance.clone(),
            demands,
            columns,
            domain: VariableDomain::Continuous,
            transitions: Vec::new(),
            relaxation: None,
            window: Vec::new(),
        })
    }

    /// Append a column for `pattern` with objective coefficient one.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::MasterFinalised`] after [`finalise_as_integer`],
    /// and [`SolverError::InvariantViolation`] if the pattern does not cover
    /// every item or does not fit on a roll.
    ///
    /// [`finalise_as_integer`]: MasterProblem::finalise_as_integer
    pub fn add_column(&mut self, pattern: Pattern) -> Result<ColumnId, SolverError> {
        if self.domain == VariableDomain::Integer {
            return Err(SolverError::MasterFinalised);
        }

        if pattern.len() != self.instance.len() {
            return Err(SolverError::InvariantViolation {
                message: "pattern length does not match the number of demand rows",
            });
        }

        if !pattern.fits(&self.instance) {
            return Err(SolverError::InvariantViolation {
                message: "pattern exceeds the roll width",
            });
        }

        pattern.counts().iter().try_for_each(|&count| coefficient(count).map(drop))?;

        let id = ColumnId(self.columns.len());

        self.columns.push(pattern);
        self.transitions.push(MasterTransition::ColumnAdded(id));

        Ok(id)
    }

    /// Solve the master in its current domain.
    ///
    /// In the continuous domain the solution carries dual prices for every
    /// demand row.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the backend fails or reports the model
    /// infeasible, which the identity patterns rule out for a valid instance.
    pub fn solve(&mut self) -> Result<MasterSolution, SolverError> {
        match self.domain {
            VariableDomain::Continuous => {
                let solution = self.solve_relaxation()?;

                self.relaxation = Some(solution.clone());

                Ok(solution)
            }
            VariableDomain::Integer => self.solve_integer(),
        }
    }

    /// Switch every pattern variable to the integer domain and re-solve.
    ///
    /// No variables or rows are added or removed. The integer solve searches
    /// between the floor and the ceiling of the latest relaxation, which is
    /// re-solved first if columns were added since. Calling this again
    /// records no further transition and only re-solves.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the relaxation or the integer solve fails,
    /// or the integer solution does not cover demand.
    pub fn finalise_as_integer(&mut self) -> Result<MasterSolution, SolverError> {
        if self.domain == VariableDomain::Continuous {
            let stale = self
                .relaxation
                .as_ref()
                .is_none_or(|relaxation| relaxation.values.len() != self.columns.len());

            if stale {
                self.solve()?;
            }

            let relaxation = self.relaxation.as_ref().ok_or(SolverError::InvariantViolation {
                message: "master finalised without a relaxation",
            })?;

            self.window = rounding_window(relaxation.values())?;
            self.domain = VariableDomain::Integer;
            self.transitions.push(MasterTransition::FinalisedAsInteger);
        }

        self.solve()
    }

    /// Patterns in column order
    pub fn columns(&self) -> &[Pattern] {
        &self.columns
    }

    /// Pattern of a column
    pub fn column(&self, id: ColumnId) -> Option<&Pattern> {
        self.columns.get(id.0)
    }

    /// Column handles in order
    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + use<> {
        (0..self.columns.len()).map(ColumnId)
    }

    /// Demand row handles in order
    pub fn rows(&self) -> impl Iterator<Item = DemandRow> + use<> {
        (0..self.demands.len()).map(DemandRow)
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of demand rows
    pub fn num_rows(&self) -> usize {
        self.demands.len()
    }

    /// Current variable domain
    pub fn domain(&self) -> VariableDomain {
        self.domain
    }

    /// Recorded structural changes, oldest first
    pub fn transitions(&self) -> &[MasterTransition] {
        &self.transitions
    }

    /// Number of recorded structural changes
    pub fn revision(&self) -> usize {
        self.transitions.len()
    }

    /// Instance the master was built for
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    fn solve_relaxation(&self) -> Result<MasterSolution, SolverError> {
        let mut pb = ProblemVariables::new();

        let x: Vec<Variable> = self
            .columns
            .iter()
            .map(|_| pb.add(variable().min(0)))
            .collect();

        let values = self.solve_primal(pb, &x)?;
        let objective = values.iter().sum::<f64>() * ROLL_COST;
        let (duals, dual_objective) = self.solve_dual()?;

        // Strong duality: both programs share an optimum.
        if (objective - dual_objective).abs() > INTEGRALITY_TOLERANCE * objective.abs().max(1.0) {
            warn!(
                primal = objective,
                dual = dual_objective,
                "master primal and dual objectives disagree"
            );
        }

        Ok(MasterSolution {
            objective,
            values,
            duals: Some(duals),
            domain: VariableDomain::Continuous,
        })
    }

    fn solve_integer(&self) -> Result<MasterSolution, SolverError> {
        let mut pb = ProblemVariables::new();

        if self.window.len() != self.columns.len() {
            return Err(SolverError::InvariantViolation {
                message: "rounding window does not match the master columns",
            });
        }

        let x = self
            .window
            .iter()
            .map(|&(lower, upper)| {
                Ok(pb.add(
                    variable()
                        .integer()
                        .min(coefficient(lower)?)
                        .max(coefficient(upper)?),
                ))
            })
            .collect::<Result<Vec<Variable>, SolverError>>()?;

        let raw = self.solve_primal(pb, &x)?;

        let counts = raw
            .iter()
            .copied()
            .map(to_count)
            .collect::<Result<Vec<u64>, _>>()?;

        if !self.covers_demand(&counts) {
            return Err(SolverError::InvariantViolation {
                message: "integer cutting plan does not cover demand",
            });
        }

        let values = counts
            .iter()
            .copied()
            .map(coefficient)
            .collect::<Result<Vec<f64>, _>>()?;

        let objective = values.iter().sum::<f64>() * ROLL_COST;

        Ok(MasterSolution {
            objective,
            values,
            duals: None,
            domain: VariableDomain::Integer,
        })
    }

    /// Minimise total rolls subject to the demand rows and read back `x`.
    fn solve_primal(&self, pb: ProblemVariables, x: &[Variable]) -> Result<Vec<f64>, SolverError> {
        let mut rolls = Expression::default();

        for var in x.iter().copied() {
            rolls += var * ROLL_COST;
        }

        let mut model = pb.minimise(rolls).using(default_solver);

        for (row, demand) in self.demands.iter().copied().enumerate() {
            let mut yield_expr = Expression::default();

            for (var, pattern) in x.iter().copied().zip(&self.columns) {
                let count = pattern.count(row);

                if count > 0 {
                    yield_expr += var * coefficient(count)?;
                }
            }

            model = model.with(yield_expr.geq(demand));
        }

        let solution = model.solve()?;

        Ok(x.iter().map(|var| solution.value(*var)).collect())
    }

    /// Solve the dual of the relaxation for the demand-row prices:
    ///
    /// ```text
    /// max  Σ_j demand[j] * π_j
    /// s.t. Σ_j count[j][p] * π_j <= 1    for every pattern p
    ///      π_j >= 0
    /// ```
    fn solve_dual(&self) -> Result<(DualPrices, f64), SolverError> {
        let mut pb = ProblemVariables::new();

        let prices: SmallVec<[Variable; 8]> = self
            .demands
            .iter()
            .map(|_| pb.add(variable().min(0)))
            .collect();

        let mut value = Expression::default();

        for (price, demand) in prices.iter().copied().zip(self.demands.iter().copied()) {
            value += price * demand;
        }

        let mut model = pb.maximise(value).using(default_solver);

        for pattern in &self.columns {
            let mut priced = Expression::default();

            for (price, count) in prices.iter().copied().zip(pattern.counts().iter().copied()) {
                if count > 0 {
                    priced += price * coefficient(count)?;
                }
            }

            model = model.with(priced.leq(ROLL_COST));
        }

        let solution = model.solve()?;

        let duals = DualPrices::new(prices.iter().map(|price| solution.value(*price).max(0.0)));

        let objective = duals
            .as_slice()
            .iter()
            .zip(self.demands.iter())
            .map(|(price, demand)| price * demand)
            .sum();

        Ok((duals, objective))
    }

    /// Check integer roll counts against demand with exact arithmetic.
    fn covers_demand(&self, counts: &[u64]) -> bool {
        self.instance.items().iter().enumerate().all(|(idx, item)| {
            let produced = self
                .columns
                .iter()
                .zip(counts)
                .try_fold(0u64, |acc, (pattern, &rolls)| {
                    acc.checked_add(pattern.count(idx).checked_mul(rolls)?)
                });

            produced.is_some_and(|produced| produced >= item.demand)
        })
    }
}

/// Per-column `(lower, upper)` bounds for the integer re-solve.
///
/// Integral values are fixed. Fractional values may round either way, except
/// that only the [`MAX_ROUNDING_BRANCHES`] columns closest to their floor keep
/// that choice; the others are fixed at their ceiling.
fn rounding_window(values: &[f64]) -> Result<Vec<(u64, u64)>, SolverError> {
    let mut window = Vec::with_capacity(values.len());
    let mut fractional = Vec::new();

    for (idx, value) in values.iter().copied().enumerate() {
        let value = snap(value).max(0.0);
        let floor = value.floor();

        let bounds = (to_bound(floor)?, to_bound(value.ceil())?);

        if bounds.1 > bounds.0 {
            fractional.push((value - floor, idx));
        }

        window.push(bounds);
    }

    fractional.sort_by(|a, b| a.0.total_cmp(&b.0));

    for &(_, idx) in fractional.iter().skip(MAX_ROUNDING_BRANCHES) {
        if let Some(bounds) = window.get_mut(idx) {
            bounds.0 = bounds.1;
        }
    }

    Ok(window)
}

fn to_bound(value: f64) -> Result<u64, SolverError> {
    value.to_u64().ok_or(SolverError::InvariantViolation {
        message: "relaxation value does not fit in a roll count",
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn classic() -> Result<Instance, crate::instance::InstanceError> {
        Instance::from_widths_and_demands(100, &[45, 36, 31, 14], &[97, 610, 395, 211])
    }

    #[test]
    fn new_builds_identity_columns_and_rows() -> TestResult {
        let master = MasterProblem::new(&classic()?)?;

        assert_eq!(master.num_columns(), 4);
        assert_eq!(master.num_rows(), 4);
        assert_eq!(master.domain(), VariableDomain::Continuous);
        assert_eq!(master.revision(), 0);

        let counts: Vec<_> = master.columns().iter().map(|p| p.counts().to_vec()).collect();

        assert_eq!(
            counts,
            vec![
                vec![2, 0, 0, 0],
                vec![0, 2, 0, 0],
                vec![0, 0, 3, 0],
                vec![0, 0, 0, 7]
            ]
        );

        Ok(())
    }

    #[test]
    fn relaxation_of_identity_master_divides_demand_by_copies() -> TestResult {
        let mut master = MasterProblem::new(&classic()?)?;
        let solution = master.solve()?;

        // 97/2 + 610/2 + 395/3 + 211/7
        let expected = 48.5 + 305.0 + 395.0 / 3.0 + 211.0 / 7.0;

        assert!(
            (solution.objective() - expected).abs() < 1e-6,
            "objective {} != {expected}",
            solution.objective()
        );

        let duals = solution.duals().ok_or("relaxation has duals")?;
        let expected_duals = [0.5, 0.5, 1.0 / 3.0, 1.0 / 7.0];

        for (dual, expected) in duals.as_slice().iter().zip(expected_duals) {
            assert!((dual - expected).abs() < 1e-6, "dual {dual} != {expected}");
        }

        Ok(())
    }

    #[test]
    fn add_column_appends_and_records_transition() -> TestResult {
        let mut master = MasterProblem::new(&classic()?)?;
        let before = master.solve()?.objective();

        let id = master.add_column(Pattern::new([0, 2, 0, 2]))?;

        assert_eq!(id.index(), 4);
        assert_eq!(master.num_columns(), 5);
        assert_eq!(master.transitions(), &[MasterTransition::ColumnAdded(id)]);

        let after = master.solve()?.objective();

        assert!(after <= before + 1e-9, "objective increased: {before} -> {after}");

        Ok(())
    }

    #[test]
    fn add_column_rejects_overfull_pattern() -> TestResult {
        let mut master = MasterProblem::new(&classic()?)?;
        let result = master.add_column(Pattern::new([1, 1, 1, 0]));

        assert!(matches!(result, Err(SolverError::InvariantViolation { .. })));
        assert_eq!(master.num_columns(), 4);

        Ok(())
    }

    #[test]
    fn add_column_rejects_wrong_length() -> TestResult {
        let mut master = MasterProblem::new(&classic()?)?;
        let result = master.add_column(Pattern::new([1]));

        assert!(matches!(result, Err(SolverError::InvariantViolation { .. })));

        Ok(())
    }

    #[test]
    fn finalise_as_integer_is_idempotent() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30], &[7])?;
        let mut master = MasterProblem::new(&instance)?;

        master.solve()?;

        let first = master.finalise_as_integer()?;
        let columns = master.num_columns();
        let revision = master.revision();

        let second = master.finalise_as_integer()?;

        assert_eq!(master.num_columns(), columns);
        assert_eq!(master.num_rows(), 1);
        assert_eq!(master.revision(), revision);
        assert_eq!(master.transitions(), &[MasterTransition::FinalisedAsInteger]);
        assert!((first.objective() - 3.0).abs() < 1e-9, "expected 3 rolls");
        assert!((second.objective() - first.objective()).abs() < 1e-9, "re-solve changed");
        assert!(second.duals().is_none());

        Ok(())
    }

    #[test]
    fn add_column_after_finalise_is_rejected() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30, 20], &[7, 4])?;
        let mut master = MasterProblem::new(&instance)?;

        master.finalise_as_integer()?;

        let result = master.add_column(Pattern::new([2, 2]));

        assert!(matches!(result, Err(SolverError::MasterFinalised)));

        Ok(())
    }

    #[test]
    fn integer_solution_covers_demand() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30, 20], &[7, 9])?;
        let mut master = MasterProblem::new(&instance)?;

        master.add_column(Pattern::new([2, 2]))?;

        let solution = master.finalise_as_integer()?;
        let counts: Vec<u64> = solution
            .values()
            .iter()
            .map(|value| to_count(*value))
            .collect::<Result<_, _>>()?;

        assert!(master.covers_demand(&counts));
        assert_eq!(solution.domain(), VariableDomain::Integer);

        Ok(())
    }

    #[test]
    fn dual_prices_lookup_by_row() {
        let duals = DualPrices::new([0.5, 0.25]);

        assert_eq!(duals.len(), 2);
        assert_eq!(duals.get(DemandRow(1)), Some(0.25));
        assert_eq!(duals.get(DemandRow(2)), None);
    }

    #[test]
    fn rounding_window_fixes_integral_values_and_brackets_fractions() -> TestResult {
        let window = rounding_window(&[2.0, 0.999_999_9, 3.25, 0.0, -1e-9])?;

        assert_eq!(window, vec![(2, 2), (1, 1), (3, 4), (0, 0), (0, 0)]);

        Ok(())
    }

    #[test]
    fn rounding_window_caps_branching_columns() -> TestResult {
        let columns = u32::try_from(MAX_ROUNDING_BRANCHES + 2)?;
        let values: Vec<f64> = (1..=columns).map(|k| 1.0 + 0.01 * f64::from(k)).collect();

        let window = rounding_window(&values)?;
        let branching = window.iter().filter(|(lower, upper)| lower < upper).count();

        assert_eq!(branching, MAX_ROUNDING_BRANCHES);

        // The columns furthest from their floor are rounded up.
        assert_eq!(window.last(), Some(&(2, 2)));
        assert_eq!(window.first(), Some(&(1, 2)));

        Ok(())
    }

    #[test]
    fn finalise_without_prior_solve_solves_the_relaxation_first() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30, 20], &[7, 9])?;
        let mut master = MasterProblem::new(&instance)?;

        master.solve()?;
        master.add_column(Pattern::new([2, 2]))?;

        // The stored relaxation predates the new column.
        let solution = master.finalise_as_integer()?;

        assert_eq!(solution.values().len(), 3);
        assert_eq!(master.window.len(), 3);

        Ok(())
    }

    #[test]
    fn column_and_row_handles_display_and_index() -> TestResult {
        let master = MasterProblem::new(&classic()?)?;
        let ids: Vec<_> = master.column_ids().collect();
        let rows: Vec<_> = master.rows().map(DemandRow::index).collect();

        assert_eq!(ids.first().map(ToString::to_string), Some("x_0".to_string()));
        assert_eq!(rows, vec![0, 1, 2, 3]);
        assert!(master.column(ColumnId(3)).is_some());
        assert!(master.column(ColumnId(4)).is_none());

        Ok(())
    }
}
