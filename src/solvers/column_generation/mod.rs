//! Column Generation
//!
//! Alternates between the restricted master relaxation and the knapsack
//! pricing subproblem until no pattern has negative reduced cost, then
//! re-solves the master over the generated columns with integer variables.
//!
//! The final integer solve is a rounding heuristic: it yields a feasible
//! cutting plan that is not guaranteed optimal.

use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::{
    instance::Instance,
    patterns::Pattern,
    solvers::{
        INTEGRALITY_TOLERANCE, SolverError, Stage,
        master::{DualPrices, MasterProblem, MasterSolution},
        pricing::{PricingSolution, PricingSubproblem},
    },
};

pub mod observer;
pub mod plan;

pub use observer::{ColumnGenerationObserver, NoopObserver, ProgressWriter};
pub use plan::{CuttingPlan, PatternAllocation};

/// Default cap on generated columns.
pub const DEFAULT_MAX_ITERATIONS: usize = 1_000;

/// Column generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnGenerationConfig {
    /// Maximum number of columns pricing may generate; `None` for no limit.
    pub max_iterations: Option<usize>,
}

impl Default for ColumnGenerationConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
        }
    }
}

/// Phase of a column generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Models are built; the run has not started.
    Initialising,

    /// Alternating master and pricing solves.
    Iterating,

    /// Pricing found no improving column; the LP bound is final.
    TerminatingLp,

    /// Re-solving the master with integer variables.
    Rounding,

    /// The cutting plan is available.
    Done,

    /// A solve failed; the master is left as it was for inspection.
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initialising => "initialising",
            Phase::Iterating => "iterating",
            Phase::TerminatingLp => "terminating-lp",
            Phase::Rounding => "rounding",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        })
    }
}

/// Column generation engine for one instance.
///
/// An engine runs once. After a run, successful or not, the master and the
/// LP objective history stay available for inspection.
#[derive(Debug)]
pub struct ColumnGeneration {
    instance: Instance,
    config: ColumnGenerationConfig,
    master: MasterProblem,
    pricing: PricingSubproblem,
    phase: Phase,
    iteration: usize,
    lp_history: Vec<f64>,
    known_patterns: FxHashSet<Pattern>,
}

impl ColumnGeneration {
    /// Build the master and pricing models with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the instance data cannot be represented
    /// exactly as solver coefficients.
    pub fn new(instance: Instance) -> Result<Self, SolverError> {
        Self::with_config(instance, ColumnGenerationConfig::default())
    }

    /// Build the master and pricing models.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the instance data cannot be represented
    /// exactly as solver coefficients.
    pub fn with_config(
        instance: Instance,
        config: ColumnGenerationConfig,
    ) -> Result<Self, SolverError> {
        let master = MasterProblem::new(&instance)?;
        let pricing = PricingSubproblem::new(&instance)?;
        let known_patterns = master.columns().iter().cloned().collect();

        Ok(Self {
            instance,
            config,
            master,
            pricing,
            phase: Phase::Initialising,
            iteration: 0,
            lp_history: Vec::new(),
            known_patterns,
        })
    }

    /// Run column generation and rounding to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Aborted`] naming the failing stage and iteration
    /// if any solve fails, [`SolverError::IterationLimit`] if pricing keeps
    /// finding columns past the configured limit, and
    /// [`SolverError::InvariantViolation`] if the engine has already run.
    pub fn run(&mut self) -> Result<CuttingPlan, SolverError> {
        self.run_with_observer(&mut NoopObserver)
    }

    /// Run column generation and rounding, reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// See [`ColumnGeneration::run`].
    pub fn run_with_observer(
        &mut self,
        observer: &mut dyn ColumnGenerationObserver,
    ) -> Result<CuttingPlan, SolverError> {
        if self.phase != Phase::Initialising {
            return Err(SolverError::InvariantViolation {
                message: "column generation engine has already run",
            });
        }

        let result = self.run_phases(observer);

        if let Err(error) = &result {
            self.phase = Phase::Aborted;

            warn!(
                %error,
                iteration = self.iteration,
                columns = self.master.num_columns(),
                lp_bound = ?self.lp_bound(),
                "column generation aborted"
            );
        }

        result
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of columns generated so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The master problem, including every column generated so far
    pub fn master(&self) -> &MasterProblem {
        &self.master
    }

    /// The instance being solved
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// LP objective after each master solve, oldest first
    pub fn lp_history(&self) -> &[f64] {
        &self.lp_history
    }

    /// Objective of the latest relaxation solve, if the master has been solved
    pub fn lp_bound(&self) -> Option<f64> {
        self.lp_history.last().copied()
    }

    fn run_phases(
        &mut self,
        observer: &mut dyn ColumnGenerationObserver,
    ) -> Result<CuttingPlan, SolverError> {
        info!(
            items = self.instance.len(),
            roll_width = self.instance.roll_width(),
            "starting column generation"
        );

        self.phase = Phase::Iterating;

        let mut relaxation = self.solve_master(observer)?;

        loop {
            let duals = relaxation.duals().ok_or_else(|| {
                SolverError::aborted(
                    Stage::Master,
                    self.iteration,
                    SolverError::InvariantViolation {
                        message: "relaxation returned no dual prices",
                    },
                )
            })?;

            let candidate = self.price(duals, observer)?;

            if !candidate.prices_out() {
                debug!(
                    iteration = self.iteration,
                    objective = candidate.objective(),
                    "no pattern prices out"
                );

                break;
            }

            if self.known_patterns.contains(candidate.pattern()) {
                warn!(
                    iteration = self.iteration,
                    pattern = %candidate.pattern(),
                    reduced_cost = candidate.reduced_cost(),
                    "pricing returned a known pattern; stopping"
                );

                break;
            }

            if let Some(limit) = self.config.max_iterations
                && self.iteration >= limit
            {
                return Err(SolverError::IterationLimit { limit });
            }

            let column = self
                .master
                .add_column(candidate.pattern().clone())
                .map_err(|error| SolverError::aborted(Stage::Master, self.iteration, error))?;

            self.known_patterns.insert(candidate.pattern().clone());
            self.iteration += 1;

            debug!(
                iteration = self.iteration,
                %column,
                pattern = %candidate.pattern(),
                reduced_cost = candidate.reduced_cost(),
                "column added"
            );

            observer.on_column_added(self.iteration, column, &candidate);

            let next = self.solve_master(observer)?;

            if next.objective() > relaxation.objective() + INTEGRALITY_TOLERANCE {
                warn!(
                    iteration = self.iteration,
                    previous = relaxation.objective(),
                    current = next.objective(),
                    "master objective increased after adding a column"
                );
            }

            relaxation = next;
        }

        self.phase = Phase::TerminatingLp;

        info!(
            lp_bound = relaxation.objective(),
            columns = self.master.num_columns(),
            iterations = self.iteration,
            "column generation converged"
        );

        self.phase = Phase::Rounding;

        let integral = self.round(&relaxation, observer)?;

        let plan = CuttingPlan::new(
            &self.master,
            &relaxation,
            &integral,
            self.iteration,
            self.lp_history.clone(),
        )
        .map_err(|error| SolverError::aborted(Stage::Rounding, self.iteration, error))?;

        self.phase = Phase::Done;

        info!(
            rolls = plan.rolls(),
            lp_bound = plan.lp_bound(),
            gap = plan.gap(),
            "cutting plan found"
        );

        Ok(plan)
    }

    fn solve_master(
        &mut self,
        observer: &mut dyn ColumnGenerationObserver,
    ) -> Result<MasterSolution, SolverError> {
        let solution = self
            .master
            .solve()
            .map_err(|error| SolverError::aborted(Stage::Master, self.iteration, error))?;

        self.lp_history.push(solution.objective());

        debug!(
            iteration = self.iteration,
            objective = solution.objective(),
            "master solved"
        );

        observer.on_master_solved(self.iteration, &self.master, &solution);

        Ok(solution)
    }

    fn price(
        &mut self,
        duals: &DualPrices,
        observer: &mut dyn ColumnGenerationObserver,
    ) -> Result<PricingSolution, SolverError> {
        let iteration = self.iteration;

        self.pricing
            .set_prices(duals)
            .and_then(|()| self.pricing.solve())
            .inspect(|solution| observer.on_pricing_solved(iteration, duals, solution))
            .map_err(|error| SolverError::aborted(Stage::Pricing, iteration, error))
    }

    fn round(
        &mut self,
        relaxation: &MasterSolution,
        observer: &mut dyn ColumnGenerationObserver,
    ) -> Result<MasterSolution, SolverError> {
        let iteration = self.iteration;
        let abort = |error| SolverError::aborted(Stage::Rounding, iteration, error);

        let integral = self.master.finalise_as_integer().map_err(abort)?;

        // Rounding can never beat the relaxation it started from.
        if integral.objective() < relaxation.objective() - INTEGRALITY_TOLERANCE {
            return Err(abort(SolverError::InvariantViolation {
                message: "integer plan uses fewer rolls than the LP bound",
            }));
        }

        observer.on_finalised(&self.master, &integral);

        Ok(integral)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::solvers::master::{ColumnId, MasterTransition, VariableDomain};

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingObserver {
        master_solves: Vec<(usize, f64)>,
        pricing_objectives: Vec<f64>,
        added: Vec<(usize, ColumnId)>,
        finalised: Option<f64>,
    }

    impl ColumnGenerationObserver for RecordingObserver {
        fn on_master_solved(
            &mut self,
            iteration: usize,
            _master: &MasterProblem,
            solution: &MasterSolution,
        ) {
            self.master_solves.push((iteration, solution.objective()));
        }

        fn on_pricing_solved(
            &mut self,
            _iteration: usize,
            _prices: &DualPrices,
            solution: &PricingSolution,
        ) {
            self.pricing_objectives.push(solution.objective());
        }

        fn on_column_added(&mut self, iteration: usize, column: ColumnId, _: &PricingSolution) {
            self.added.push((iteration, column));
        }

        fn on_finalised(&mut self, _master: &MasterProblem, solution: &MasterSolution) {
            self.finalised = Some(solution.objective());
        }
    }

    fn classic() -> Result<Instance, crate::instance::InstanceError> {
        Instance::from_widths_and_demands(100, &[45, 36, 31, 14], &[97, 610, 395, 211])
    }

    #[test]
    fn single_item_needs_no_generated_columns() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30], &[7])?;
        let mut engine = ColumnGeneration::new(instance)?;

        let plan = engine.run()?;

        assert_eq!(plan.iterations(), 0);
        assert_eq!(plan.total_columns(), 1);
        assert_eq!(plan.rolls(), 3);
        assert!((plan.lp_bound() - 7.0 / 3.0).abs() < 1e-6, "lp bound");
        assert_eq!(engine.phase(), Phase::Done);

        Ok(())
    }

    #[test]
    fn classic_instance_generates_columns_and_rounds() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;
        let mut observer = RecordingObserver::default();

        let plan = engine.run_with_observer(&mut observer)?;

        assert!(plan.iterations() > 0, "pricing should add columns");
        assert!(plan.covers(engine.instance()));
        assert!(
            plan.rolls() >= plan.lower_bound(),
            "integer {} below bound {}",
            plan.rolls(),
            plan.lp_bound()
        );

        // Every accepted column priced out, the last pricing solve did not.
        let (last, accepted) = observer
            .pricing_objectives
            .split_last()
            .ok_or("pricing never ran")?;

        assert!(*last <= 1.0, "loop exits once pricing objective <= 1");
        assert!(accepted.iter().all(|objective| *objective > 1.0));
        assert_eq!(accepted.len(), plan.iterations());

        assert_eq!(observer.added.len(), plan.iterations());
        assert_eq!(observer.master_solves.len(), plan.iterations() + 1);
        assert_eq!(
            observer.finalised.and_then(|rolls| num_traits::ToPrimitive::to_u64(&rolls)),
            Some(plan.rolls())
        );

        Ok(())
    }

    #[test]
    fn lp_history_is_non_increasing() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;
        let plan = engine.run()?;

        assert_eq!(plan.lp_history().len(), plan.iterations() + 1);

        for pair in plan.lp_history().windows(2) {
            if let [before, after] = pair {
                assert!(after <= &(before + 1e-6), "objective rose: {before} -> {after}");
            }
        }

        Ok(())
    }

    #[test]
    fn generated_patterns_fit_and_are_unique() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;

        engine.run()?;

        let master = engine.master();
        let unique: FxHashSet<_> = master.columns().iter().collect();

        assert_eq!(unique.len(), master.num_columns());
        assert!(master.columns().iter().all(|p| p.fits(engine.instance())));
        assert_eq!(master.domain(), VariableDomain::Integer);
        assert_eq!(
            master.transitions().last(),
            Some(&MasterTransition::FinalisedAsInteger)
        );

        Ok(())
    }

    #[test]
    fn engine_runs_only_once() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30], &[7])?;
        let mut engine = ColumnGeneration::new(instance)?;

        engine.run()?;

        assert!(matches!(
            engine.run(),
            Err(SolverError::InvariantViolation { .. })
        ));

        Ok(())
    }

    #[test]
    fn iteration_limit_aborts_and_keeps_progress() -> TestResult {
        let config = ColumnGenerationConfig {
            max_iterations: Some(1),
        };
        let mut engine = ColumnGeneration::with_config(classic()?, config)?;

        let result = engine.run();

        assert!(matches!(result, Err(SolverError::IterationLimit { limit: 1 })));
        assert_eq!(engine.phase(), Phase::Aborted);
        assert_eq!(engine.iteration(), 1);
        assert_eq!(engine.master().num_columns(), 5);
        assert_eq!(engine.lp_history().len(), 2);

        Ok(())
    }

    #[test]
    fn pricing_failure_aborts_with_pricing_stage() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;

        // Pricing built for a different item count rejects the master's duals.
        let mismatched = Instance::from_widths_and_demands(100, &[45, 36, 31], &[1, 1, 1])?;
        engine.pricing = PricingSubproblem::new(&mismatched)?;

        let result = engine.run();

        assert!(
            matches!(
                result,
                Err(SolverError::Aborted {
                    stage: Stage::Pricing,
                    iteration: 0,
                    ..
                })
            ),
            "unexpected result: {result:?}"
        );
        assert_eq!(engine.phase(), Phase::Aborted);
        assert_eq!(engine.lp_history().len(), 1);
        assert_eq!(engine.master().num_columns(), 4);

        Ok(())
    }

    #[test]
    fn master_without_duals_aborts_with_master_stage() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;

        // An integer master reports no dual prices to price with.
        engine.master.finalise_as_integer()?;

        let result = engine.run();

        assert!(
            matches!(
                result,
                Err(SolverError::Aborted {
                    stage: Stage::Master,
                    iteration: 0,
                    ..
                })
            ),
            "unexpected result: {result:?}"
        );
        assert_eq!(engine.phase(), Phase::Aborted);
        assert!(engine.lp_bound().is_some(), "the failed solve is recorded");

        Ok(())
    }

    #[test]
    fn lp_bound_tracks_the_latest_master_solve() -> TestResult {
        let mut engine = ColumnGeneration::new(classic()?)?;

        assert_eq!(engine.lp_bound(), None);

        engine.run()?;

        assert_eq!(engine.lp_bound(), engine.lp_history().last().copied());

        Ok(())
    }

    #[test]
    fn zero_demand_instance_uses_no_rolls() -> TestResult {
        let instance = Instance::from_widths_and_demands(100, &[30, 20], &[0, 0])?;
        let mut engine = ColumnGeneration::new(instance)?;

        let plan = engine.run()?;

        assert_eq!(plan.rolls(), 0);
        assert!(plan.allocations().is_empty());
        assert!(plan.is_proven_optimal());

        Ok(())
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::TerminatingLp.to_string(), "terminating-lp");
        assert_eq!(Phase::Aborted.to_string(), "aborted");
    }
}
