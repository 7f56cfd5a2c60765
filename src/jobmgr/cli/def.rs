use std::path::PathBuf;

use clap::ArgAction;
use clap::Parser;

/// Structure of the main command (jobmgr).
#[derive(Parser, Debug, Default)]
#[command(
    about = "Query jobs through the job manager detected on this host",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Print the status of the given jobs, a comma separated list of ids.
    #[arg(long, value_name = "IDS")]
    pub job_status: Option<String>,

    /// Print how many of your jobs are in the given partition.
    #[arg(long, value_name = "PARTITION")]
    pub running_jobs: Option<String>,

    /// The path to a system configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose mode, displays debug info. For even more try: -vv.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
