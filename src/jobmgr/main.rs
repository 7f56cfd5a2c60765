//! `jobmgr` asks the job manager of this host about submitted jobs.

/// The command line interface and relevant structures.
pub mod cli;

/// The main CLI entry-point of the `jobmgr` utility.
#[tokio::main]
async fn main() {
    cli::process::parse_command().await;
}
