use std::env;
use std::process::exit;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::CommandFactory;
use clap::FromArgMatches;
use jobmgr_lib::constants::ERROR_STYLE;
use jobmgr_lib::ctx;
use jobmgr_lib::error::JobError;
use jobmgr_lib::file_system::FileSystemInteractor;
use jobmgr_lib::jm::squeue::current_user;
use jobmgr_lib::launcher::load_with;
use jobmgr_lib::logging::setup_logging;
use log::debug;

use super::printing::format_statuses;
use super::printing::get_styles;
use crate::cli::def::Cli;

/// This function parses command that jobmgr was run with.
pub async fn parse_command() {
    let mut command = Cli::command().styles(get_styles());

    let matches = match command.try_get_matches_from_mut(env::args_os()) {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            // help goes to stdout and is not a failure
            exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    if cli.job_status.is_none() && cli.running_jobs.is_none() {
        let _ = command.print_help();
        return;
    }

    if let Err(e) = process_command(&cli).await {
        eprintln!("{}error:{:#} {}", ERROR_STYLE, ERROR_STYLE, e.root_cause());
        eprint!("{}", e);
        exit(1);
    }
}

/// CLAP has parsed the command, now we process it.
pub async fn process_command(cmd: &Cli) -> Result<()> {
    setup_logging(cmd.verbose)?;

    let (sys_cfg, jm) = load_with(cmd.config.as_deref(), &FileSystemInteractor)?;
    let jm = jm.load(&sys_cfg);
    debug!("Using the {} job manager from {:?}", jm.backend(), sys_cfg.cur_path);

    if let Some(list) = &cmd.job_status {
        let ids = parse_job_ids(list)?;
        let statuses = jm.job_status(&ids).await.with_context(ctx!(
          "Could not query the status of {}", list;
          "Job status is only available through Slurm",
        ))?;

        print!("{}", format_statuses(&ids, &statuses));
    }

    if let Some(partition) = &cmd.running_jobs {
        let user = current_user()?;
        let count = jm.num_jobs(partition, &user).await.with_context(ctx!(
          "Could not count the jobs of {user} in {partition}", ;
          "Counting jobs is only available through Slurm",
        ))?;

        println!("Number of running jobs: {count}");
    }

    Ok(())
}

/// Parse `1,2, 3` into job ids.
pub fn parse_job_ids(list: &str) -> Result<Vec<u64>> {
    let ids = list
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| anyhow!(JobError::parse("a job id", id)))
        })
        .collect::<Result<Vec<u64>>>()?;

    if ids.is_empty() {
        return Err(anyhow!(JobError::configuration("no job id given"))).with_context(ctx!(
          "--job-status expects a comma separated list of ids", ;
          "Try {}--job-status 1234,1235{:#}", ERROR_STYLE, ERROR_STYLE,
        ));
    }

    Ok(ids)
}

#[cfg(test)]
#[path = "tests/process.rs"]
mod tests;
