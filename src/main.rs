//! Cutting Stock CLI
//!
//! Solves the instance given on the command line and prints the cutting plan.
//!
//! Use `--progress` to print the master solution after every iteration
//! Use `--max-iterations` to cap the number of generated columns

use std::{
    io::{self, Write},
    time::Instant,
};

use anyhow::{Context, Result};
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing::{error, info};

use cutting_stock::{
    config::CliConfig,
    fixtures::Fixture,
    logging::init_subscriber,
    report::PlanReport,
    solvers::column_generation::{ColumnGeneration, ProgressWriter},
};

/// Cutting Stock CLI entry point
pub fn main() -> Result<()> {
    let config = CliConfig::load().unwrap_or_else(|error| error.exit());

    init_subscriber(&config.logging)?;

    let instance = Fixture::load_path(&config.instance, config.instance_format())
        .with_context(|| format!("failed to load {}", config.instance.display()))?;

    info!(
        path = %config.instance.display(),
        items = instance.len(),
        roll_width = instance.roll_width(),
        "instance loaded"
    );

    let mut engine = ColumnGeneration::with_config(instance, config.column_generation())?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let start = Instant::now();

    let result = if config.solve.progress {
        let mut progress = ProgressWriter::new(&mut handle);
        let result = engine.run_with_observer(&mut progress);

        progress.finish()?;

        result
    } else {
        engine.run()
    };

    let plan = result.with_context(|| {
        let columns = engine.master().num_columns();
        let lp_bound = engine
            .lp_bound()
            .map_or_else(|| "none".to_string(), |bound| format!("{bound:.4}"));

        error!(
            iteration = engine.iteration(),
            columns,
            lp_bound = %lp_bound,
            "no cutting plan produced"
        );

        format!(
            "column generation aborted after {} generated columns ({columns} columns in the master, last LP bound {lp_bound})",
            engine.iteration()
        )
    })?;

    let elapsed = start.elapsed();

    PlanReport::new(&plan, engine.instance()).write_to(&mut handle)?;

    writeln!(
        handle,
        " {} ({}s)",
        elapsed.human(Truncate::Nano),
        elapsed.as_secs_f32()
    )?;

    Ok(())
}
