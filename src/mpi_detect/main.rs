//! `mpi_detect` reports which MPI implementation is installed in a directory,
//! or provides the `mpirun` in `PATH`.

use std::path::PathBuf;
use std::process::exit;

use anyhow::Result;
use clap::ArgAction;
use clap::Parser;
use jobmgr_lib::constants::ERROR_STYLE;
use jobmgr_lib::implem::detect;
use jobmgr_lib::implem::detect_from_dir;
use jobmgr_lib::implem::ImplementationInfo;
use jobmgr_lib::logging::setup_logging;

/// Structure of the `mpi_detect` command.
#[derive(Parser, Debug)]
#[command(about = "Detect the MPI implementation of an install directory")]
struct Cli {
    /// The install directory to inspect, the `mpirun` in `PATH` if not given.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Verbose mode, displays debug info. For even more try: -vv.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(info) => println!("Detected MPI:\n{} {}", info.id(), info.version()),
        Err(e) => {
            eprintln!("{}error:{:#} {}", ERROR_STYLE, ERROR_STYLE, e.root_cause());
            eprint!("{}", e);
            exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<ImplementationInfo> {
    setup_logging(cli.verbose)?;

    match &cli.dir {
        Some(dir) => detect_from_dir(dir).await,
        None => detect().await,
    }
}
