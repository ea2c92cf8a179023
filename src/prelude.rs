//! Cutting stock prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    fixtures::{Fixture, FixtureError, InstanceFormat},
    instance::{Instance, InstanceError, Item},
    patterns::Pattern,
    report::{PlanReport, ReportError},
    solvers::{
        SolverError, Stage,
        column_generation::{
            ColumnGeneration, ColumnGenerationConfig, ColumnGenerationObserver, CuttingPlan,
            NoopObserver, PatternAllocation, Phase, ProgressWriter,
        },
        master::{ColumnId, DemandRow, DualPrices, MasterProblem, MasterSolution},
        pricing::{PricingSolution, PricingSubproblem},
    },
};
