//! Command line configuration

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::{
    fixtures::InstanceFormat,
    solvers::column_generation::{ColumnGenerationConfig, DEFAULT_MAX_ITERATIONS},
};

/// Instance file format selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FormatArg {
    /// Pick from the file extension.
    Auto,

    /// Whitespace-delimited text.
    Text,

    /// YAML fixture.
    Yaml,
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Column generation settings.
#[derive(Debug, Args)]
pub struct SolveConfig {
    /// Maximum number of columns pricing may generate
    #[arg(
        short,
        long,
        env = "CUTTING_STOCK_MAX_ITERATIONS",
        default_value_t = DEFAULT_MAX_ITERATIONS,
        value_parser = parse_iteration_limit
    )]
    pub max_iterations: usize,

    /// Disable the iteration limit; takes precedence over `--max-iterations`
    #[arg(long)]
    pub no_iteration_limit: bool,

    /// Print the master solution after every iteration
    #[arg(short, long)]
    pub progress: bool,
}

/// Cutting stock solver configuration
#[derive(Debug, Parser)]
#[command(
    name = "cutting-stock",
    about = "Solve a one-dimensional cutting stock instance by column generation",
    long_about = None
)]
pub struct CliConfig {
    /// Instance file to solve
    pub instance: PathBuf,

    /// Instance file format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Auto)]
    pub format: FormatArg,

    /// Column generation settings.
    #[command(flatten)]
    pub solve: SolveConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// Format to read the instance file in.
    pub fn instance_format(&self) -> InstanceFormat {
        match self.format {
            FormatArg::Auto => InstanceFormat::from_path(&self.instance),
            FormatArg::Text => InstanceFormat::Text,
            FormatArg::Yaml => InstanceFormat::Yaml,
        }
    }

    /// Engine settings for the run.
    pub fn column_generation(&self) -> ColumnGenerationConfig {
        ColumnGenerationConfig {
            max_iterations: (!self.solve.no_iteration_limit).then_some(self.solve.max_iterations),
        }
    }
}

fn parse_iteration_limit(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("iteration limit must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(error) => Err(error.to_string()),
    }
}
