use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::DEFAULT_CONFIG_FILE, output::OutputMode, task::TaskId};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Config path plus whether the user named it explicitly.
    pub fn config_path(&self) -> (&str, bool) {
        match &self.config {
            Some(path) => (path, true),
            None => (DEFAULT_CONFIG_FILE, false),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Find dependency cycles and tasks blocked by failures in a backlog snapshot
    Deps(DepsArgs),
    /// Check whether worker outputs describe work that was actually done
    Validate(ValidateArgs),
    /// Score the complexity of a task from its metrics
    Score(ScoreArgs),
    /// Validate worker outputs and print an execution report
    Report(ReportArgs),
}

#[derive(Args)]
pub struct DepsArgs {
    /// Backlog snapshot (JSON)
    pub snapshot: PathBuf,

    /// Failed task ids; defaults to tasks whose status is "failed"
    #[arg(long = "failed", num_args = 1.., value_delimiter = ',')]
    pub failed: Vec<TaskId>,

    /// Also write the report as a JSON artifact
    #[arg(long = "json")]
    pub json: Option<PathBuf>,

    /// How to print the report
    #[arg(long = "output", value_enum, default_value_t = OutputMode::Text)]
    pub output: OutputMode,
}

#[derive(Args)]
pub struct ValidatorArgs {
    /// Worker output files or glob patterns
    #[arg(required = true)]
    pub outputs: Vec<PathBuf>,

    /// Task type recorded with each result
    #[arg(long = "task-type")]
    pub task_type: Option<String>,

    /// Directory that relative file claims are resolved against
    #[arg(long = "root")]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub validator: ValidatorArgs,

    /// How to print results
    #[arg(long = "output", value_enum, default_value_t = OutputMode::Text)]
    pub output: OutputMode,
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub validator: ValidatorArgs,

    /// Post a summary to this webhook (overrides the config file)
    #[arg(long = "webhook")]
    pub webhook: Option<String>,

    /// Number of follow-up tasks to mention in the notification
    #[arg(long = "follow-ups")]
    pub follow_ups: Option<usize>,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Size of the task input
    #[arg(long = "input-size", default_value_t = 0)]
    pub input_size: u64,

    /// Compute intensity, 1-10
    #[arg(long = "compute", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub compute_intensity: u8,

    /// Size of the expected output
    #[arg(long = "output-size", default_value_t = 0)]
    pub output_size: u64,

    /// Time sensitivity, 1-10
    #[arg(long = "time", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub time_sensitivity: u8,

    /// Number of external resources the task depends on
    #[arg(long = "resources", default_value_t = 0)]
    pub resource_dependencies: u32,

    /// How to print the result
    #[arg(long = "output", value_enum, default_value_t = OutputMode::Text)]
    pub output: OutputMode,
}
