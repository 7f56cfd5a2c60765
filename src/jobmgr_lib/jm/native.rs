use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use log::debug;

use super::Backend;
use super::JobManager;
use super::JobManagerBackend;
use crate::config::SystemConfig;
use crate::error::ctx;
use crate::error::JobError;
use crate::exec::Cmd;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::job::OutputSource;
use crate::mpi::launch_command;
use crate::mpi::mpi_env;

/// Starts jobs directly, through `mpirun` when they use MPI.
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

impl JobManagerBackend for Native {
    const ID: Backend = Backend::Native;

    async fn submit(
        &self,
        _jm: &JobManager,
        job: &mut Job,
        sys_cfg: &SystemConfig,
        _fs: &impl FileOperations,
    ) -> Result<ExecOutput> {
        let mut cmd = command_for(job, sys_cfg)?
            .current_dir(job.run_dir.as_deref())
            .timeout(sys_cfg.timeout);

        if let Some(cfg) = &job.mpi {
            for (key, value) in mpi_env(&cfg.implem) {
                cmd = cmd.env(key, value);
            }
        }

        for (key, value) in &job.env {
            cmd = cmd.env(key.clone(), value.clone());
        }

        job.output = OutputSource::Buffers;
        job.touch();

        let out = cmd.run().await?;
        job.stdout = out.stdout.clone();
        job.stderr = out.stderr.clone();

        Ok(out)
    }
}

/// `mpirun ... <app>` for MPI jobs, the application alone otherwise. A job
/// with only a batch script runs the script.
fn command_for(job: &Job, sys_cfg: &SystemConfig) -> Result<Cmd> {
    let words = match (&job.mpi, job.app.invocation(), &job.batch_script) {
        (Some(cfg), Some(_), _) => {
            launch_command(cfg, &job.app, job.np, job.nnodes, &job.args, sys_cfg)?
        }
        (None, Some(invocation), _) => invocation,
        (_, None, Some(script)) => vec![script.display().to_string()],
        (_, None, None) => {
            return Err(JobError::configuration(format!(
                "{} has neither an application binary nor a batch script",
                job.name
            )))
            .with_context(ctx!(
              "Nothing to start for {}", job.name;
              "Set the application binary of the job",
            ));
        }
    };

    debug!("Native launch: {}", words.join(" "));

    let mut words = words.into_iter();
    let bin = words.next().map(PathBuf::from).unwrap_or_default();

    Ok(Cmd::new(bin).args(words))
}
