//! Plan Report

use std::{io, ops::Range};

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{instance::Instance, solvers::column_generation::CuttingPlan};

/// Errors that can occur when writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error
    #[error("IO error")]
    IO,
}

/// Renders a [`CuttingPlan`] for the terminal.
#[derive(Debug, Clone, Copy)]
pub struct PlanReport<'a> {
    plan: &'a CuttingPlan,
    instance: &'a Instance,
}

impl<'a> PlanReport<'a> {
    /// Create a report for `plan`, which must have been solved for `instance`.
    pub fn new(plan: &'a CuttingPlan, instance: &'a Instance) -> Self {
        Self { plan, instance }
    }

    /// Utilisation of the consumed stock in percent points, to two places.
    pub fn utilisation_points(&self) -> Decimal {
        percent_points_from_fractional_percentage(self.plan.utilisation(self.instance))
    }

    /// Writes the pattern table, the item coverage table and the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        write_table(&mut out, self.pattern_rows(), Columns::new(2..5))?;
        write_table(&mut out, self.item_rows(), Columns::new(2..6))?;

        write_summary(&mut out, self)
    }

    fn pattern_rows(&self) -> Builder {
        let mut builder = Builder::default();

        builder.push_record(["", "Pattern", "Rolls", "Used Width", "Waste / Roll"]);

        for allocation in self.plan.allocations() {
            let used = allocation.pattern.used_width(self.instance).unwrap_or(0);
            let waste = allocation.pattern.waste(self.instance).unwrap_or(0);

            builder.push_record([
                allocation.column.to_string(),
                allocation.pattern.describe(self.instance),
                allocation.rolls.to_string(),
                used.to_string(),
                waste.to_string(),
            ]);
        }

        builder
    }

    fn item_rows(&self) -> Builder {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Width", "Demand", "Produced", "Surplus"]);

        for (idx, item) in self.instance.items().iter().enumerate() {
            builder.push_record([
                idx.to_string(),
                self.instance.display_name(idx),
                item.width.to_string(),
                item.demand.to_string(),
                self.plan.produced(idx).to_string(),
                self.plan.surplus(self.instance, idx).to_string(),
            ]);
        }

        builder
    }
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric: Columns<Range<usize>>,
) -> Result<(), ReportError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(numeric, Alignment::right());

    writeln!(out, "\n{table}").map_err(|_err| ReportError::IO)
}

fn write_summary(out: &mut impl io::Write, report: &PlanReport<'_>) -> Result<(), ReportError> {
    let plan = report.plan;

    let optimality = if plan.is_proven_optimal() {
        "proven optimal"
    } else {
        "within gap"
    };

    let lines = [
        (" LP bound:", format!("{:.4}", plan.lp_bound())),
        (" Lower bound:", plan.lower_bound().to_string()),
        (
            " \x1b[1mRolls used:\x1b[0m",
            format!("\x1b[1m{}\x1b[0m", plan.rolls()),
        ),
        (" Gap:", format!("{:.4} ({optimality})", plan.gap())),
        (
            " Utilisation:",
            format!("{:.2}%", report.utilisation_points()),
        ),
        (" Columns generated:", plan.iterations().to_string()),
        (" Total columns:", plan.total_columns().to_string()),
    ];

    let label_width = lines
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or(0);

    for (label, value) in &lines {
        let padding = label_width.saturating_sub(visible_width(label));

        writeln!(out, "{label}{:padding$}  {value}", "").map_err(|_err| ReportError::IO)?;
    }

    writeln!(out).map_err(|_err| ReportError::IO)
}

/// Converts a fractional percentage to percent points for display.
fn percent_points_from_fractional_percentage(percentage: Percentage) -> Decimal {
    // `Percentage` is a fraction (e.g. 0.9), so multiply by 100 to print percent points.
    ((percentage * Decimal::ONE) * Decimal::from_i64(100).unwrap_or(Decimal::ZERO)).round_dp(2)
}

/// Width of a string with ANSI escape sequences removed.
fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;

    for ch in s.chars() {
        match (in_escape, ch) {
            (false, '\x1b') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => width += 1,
        }
    }

    width
}
