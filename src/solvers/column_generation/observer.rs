//! Column Generation Observer

use std::io;

use crate::solvers::{
    master::{ColumnId, DualPrices, MasterProblem, MasterSolution},
    pricing::PricingSolution,
};

/// Observer trait for following a column generation run.
///
/// Callbacks fire after each solve with read access to the models, so
/// reporting never has to duplicate solver logic. Every method defaults to
/// doing nothing.
pub trait ColumnGenerationObserver {
    /// Called after every master solve during column generation.
    ///
    /// # Parameters
    ///
    /// - `iteration`: Number of columns generated so far
    /// - `master`: The master that was solved
    /// - `solution`: Its linear relaxation solution
    fn on_master_solved(
        &mut self,
        _iteration: usize,
        _master: &MasterProblem,
        _solution: &MasterSolution,
    ) {
    }

    /// Called after every pricing solve, whether or not it prices out.
    ///
    /// # Parameters
    ///
    /// - `iteration`: Number of columns generated so far
    /// - `prices`: Dual prices the knapsack was solved under
    /// - `solution`: The most valuable pattern under those prices
    fn on_pricing_solved(
        &mut self,
        _iteration: usize,
        _prices: &DualPrices,
        _solution: &PricingSolution,
    ) {
    }

    /// Called when a priced-out pattern has been added to the master.
    ///
    /// # Parameters
    ///
    /// - `iteration`: Number of columns generated, including this one
    /// - `column`: Handle of the new column
    /// - `solution`: Pricing solution the column came from
    fn on_column_added(&mut self, _iteration: usize, _column: ColumnId, _solution: &PricingSolution) {
    }

    /// Called once the master has been re-solved with integer variables.
    fn on_finalised(&mut self, _master: &MasterProblem, _solution: &MasterSolution) {}
}

/// No-op observer for unobserved runs.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ColumnGenerationObserver for NoopObserver {}

/// Writes a human-readable progress log of the run.
///
/// The first write error is kept and returned from [`ProgressWriter::finish`];
/// nothing further is written after it.
#[derive(Debug)]
pub struct ProgressWriter<W: io::Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: io::Write> ProgressWriter<W> {
    /// Create a progress writer over `out`.
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    /// Return the writer, or the first error encountered while writing.
    ///
    /// # Errors
    ///
    /// Returns the first [`io::Error`] raised by the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.out),
        }
    }

    fn write_with(&mut self, write: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.error.is_some() {
            return;
        }

        if let Err(error) = write(&mut self.out) {
            self.error = Some(error);
        }
    }

    fn write_solution(
        out: &mut W,
        heading: &str,
        master: &MasterProblem,
        solution: &MasterSolution,
    ) -> io::Result<()> {
        writeln!(out, "-----------")?;
        writeln!(out, "{heading}")?;
        writeln!(out, "-----------")?;
        writeln!(out, "Rolls used: {}", solution.objective())?;

        for (column, value) in solution.nonzero() {
            let pattern = master
                .column(column)
                .map(|pattern| pattern.describe(master.instance()))
                .unwrap_or_default();

            writeln!(out, "{column} = {value}  ({pattern})")?;
        }

        writeln!(out, "-----------")
    }
}

impl<W: io::Write> ColumnGenerationObserver for ProgressWriter<W> {
    fn on_master_solved(
        &mut self,
        iteration: usize,
        master: &MasterProblem,
        solution: &MasterSolution,
    ) {
        self.write_with(|out| {
            Self::write_solution(out, &format!("Iteration: {iteration}"), master, solution)
        });
    }

    fn on_pricing_solved(
        &mut self,
        _iteration: usize,
        prices: &DualPrices,
        solution: &PricingSolution,
    ) {
        self.write_with(|out| {
            let prices = prices
                .as_slice()
                .iter()
                .map(|price| format!("{price:.6}"))
                .collect::<Vec<_>>()
                .join(", ");

            writeln!(out, "Dual prices: [{prices}]")?;
            writeln!(out, "Pricing objective: {}", solution.objective())
        });
    }

    fn on_column_added(&mut self, _iteration: usize, column: ColumnId, solution: &PricingSolution) {
        self.write_with(|out| {
            writeln!(
                out,
                "New column {column} found with reduced cost {}",
                solution.reduced_cost()
            )?;

            for (item, count) in solution.pattern().nonzero() {
                writeln!(out, "{count} pieces of item {item}")?;
            }

            Ok(())
        });
    }

    fn on_finalised(&mut self, master: &MasterProblem, solution: &MasterSolution) {
        self.write_with(|out| Self::write_solution(out, "Integer plan", master, solution));
    }
}
