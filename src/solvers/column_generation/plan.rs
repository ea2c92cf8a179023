//! Cutting Plan

use decimal_percentage::Percentage;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::{
    instance::Instance,
    patterns::Pattern,
    solvers::{
        INTEGRALITY_TOLERANCE, SolverError,
        master::{ColumnId, MasterProblem, MasterSolution},
        to_count,
    },
};

/// Rolls cut to one pattern in the integer plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternAllocation {
    /// Master column the pattern belongs to
    pub column: ColumnId,

    /// The pattern
    pub pattern: Pattern,

    /// Number of rolls cut to the pattern
    pub rolls: u64,
}

/// Terminal result of a column generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingPlan {
    lp_bound: f64,
    rolls: u64,
    allocations: Vec<PatternAllocation>,
    iterations: usize,
    total_columns: usize,
    lp_history: Vec<f64>,
}

impl CuttingPlan {
    /// Assemble the plan from the final relaxation and integer solutions.
    pub(crate) fn new(
        master: &MasterProblem,
        relaxation: &MasterSolution,
        integral: &MasterSolution,
        iterations: usize,
        lp_history: Vec<f64>,
    ) -> Result<Self, SolverError> {
        let mut allocations = Vec::new();

        for (column, value) in master.column_ids().zip(integral.values().iter().copied()) {
            let rolls = to_count(value)?;

            if rolls == 0 {
                continue;
            }

            let pattern = master
                .column(column)
                .ok_or(SolverError::InvariantViolation {
                    message: "integer solution refers to a missing column",
                })?
                .clone();

            allocations.push(PatternAllocation {
                column,
                pattern,
                rolls,
            });
        }

        Ok(Self {
            lp_bound: relaxation.objective(),
            rolls: allocations.iter().map(|allocation| allocation.rolls).sum(),
            allocations,
            iterations,
            total_columns: master.num_columns(),
            lp_history,
        })
    }

    /// Objective of the final linear relaxation: the column generation lower
    /// bound on the number of rolls.
    pub fn lp_bound(&self) -> f64 {
        self.lp_bound
    }

    /// Smallest integer roll count consistent with the LP bound.
    pub fn lower_bound(&self) -> u64 {
        (self.lp_bound - INTEGRALITY_TOLERANCE)
            .ceil()
            .to_u64()
            .unwrap_or(0)
    }

    /// Rolls used by the integer plan
    pub fn rolls(&self) -> u64 {
        self.rolls
    }

    /// Distance between the integer plan and the LP bound.
    pub fn gap(&self) -> f64 {
        self.rolls.to_f64().unwrap_or(f64::INFINITY) - self.lp_bound
    }

    /// Whether the integer plan meets the rounded-up LP bound, which proves
    /// it optimal.
    pub fn is_proven_optimal(&self) -> bool {
        self.rolls == self.lower_bound()
    }

    /// Patterns used by the integer plan, in column order
    pub fn allocations(&self) -> &[PatternAllocation] {
        &self.allocations
    }

    /// Number of columns generated by pricing
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of columns in the final master, identity patterns included
    pub fn total_columns(&self) -> usize {
        self.total_columns
    }

    /// LP objective after each master solve, oldest first
    pub fn lp_history(&self) -> &[f64] {
        &self.lp_history
    }

    /// Pieces of item `idx` produced by the plan.
    pub fn produced(&self, idx: usize) -> u64 {
        self.allocations
            .iter()
            .map(|allocation| allocation.pattern.count(idx).saturating_mul(allocation.rolls))
            .fold(0, u64::saturating_add)
    }

    /// Pieces of item `idx` produced beyond its demand.
    pub fn surplus(&self, instance: &Instance, idx: usize) -> u64 {
        let demand = instance.item(idx).map_or(0, |item| item.demand);

        self.produced(idx).saturating_sub(demand)
    }

    /// Whether every item's demand is met.
    pub fn covers(&self, instance: &Instance) -> bool {
        instance
            .items()
            .iter()
            .enumerate()
            .all(|(idx, item)| self.produced(idx) >= item.demand)
    }

    /// Total width of stock consumed by the plan.
    pub fn stock_width(&self, instance: &Instance) -> u64 {
        self.rolls.saturating_mul(instance.roll_width())
    }

    /// Total trim loss across all rolls.
    pub fn waste(&self, instance: &Instance) -> u64 {
        self.allocations
            .iter()
            .map(|allocation| {
                allocation
                    .pattern
                    .waste(instance)
                    .unwrap_or(0)
                    .saturating_mul(allocation.rolls)
            })
            .fold(0, u64::saturating_add)
    }

    /// Fraction of the consumed stock that ends up in cut pieces.
    pub fn utilisation(&self, instance: &Instance) -> Percentage {
        let stock = self.stock_width(instance);

        if stock == 0 {
            return Percentage::from(0.0);
        }

        let used = stock.saturating_sub(self.waste(instance));

        Percentage::from(Decimal::from(used) / Decimal::from(stock))
    }
}
