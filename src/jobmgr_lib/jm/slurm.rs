use anyhow::Context;
use anyhow::Result;
use log::info;

use super::script;
use super::squeue;
use super::Backend;
use super::JobManager;
use super::JobManagerBackend;
use crate::config::SystemConfig;
use crate::constants::SBATCH_DIRECTIVE;
use crate::constants::SLURM_WAIT_FLAG;
use crate::error::ctx;
use crate::error::JobError;
use crate::exec::Cmd;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::job::JobStatus;
use crate::job::OutputSource;

/// Slurm, submitting batch scripts with `sbatch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slurm;

impl JobManagerBackend for Slurm {
    const ID: Backend = Backend::Slurm;

    fn load_args(&self, _sys_cfg: &SystemConfig) -> Vec<String> {
        vec![SLURM_WAIT_FLAG.to_string()]
    }

    async fn submit(
        &self,
        jm: &JobManager,
        job: &mut Job,
        sys_cfg: &SystemConfig,
        fs: &impl FileOperations,
    ) -> Result<ExecOutput> {
        submit_batch(jm, job, sys_cfg, fs, SBATCH_DIRECTIVE).await
    }

    async fn job_status(&self, jm: &JobManager, ids: &[u64]) -> Result<Vec<JobStatus>> {
        squeue::job_status(jm, ids).await
    }

    async fn num_jobs(&self, jm: &JobManager, partition: &str, user: &str) -> Result<usize> {
        squeue::num_jobs(jm, partition, user).await
    }

    fn post_run(&self, job: &Job, fs: &impl FileOperations) -> Result<ExecOutput> {
        collect_output(job, fs)
    }
}

/// Submission shared by the Slurm family: generate the script, hand it to
/// the submission binary, remember the job id.
pub(super) async fn submit_batch(
    jm: &JobManager,
    job: &mut Job,
    sys_cfg: &SystemConfig,
    fs: &impl FileOperations,
    directive: &str,
) -> Result<ExecOutput> {
    let bin = jm.require_bin()?.to_path_buf();

    if !fs.is_dir(&sys_cfg.scratch_dir) {
        return Err(JobError::configuration(format!(
            "the scratch directory {} does not exist",
            sys_cfg.scratch_dir.display()
        )))
        .with_context(ctx!(
          "Job output is written to the scratch directory", ;
          "Create it or set `scratch_dir` in the configuration",
        ));
    }

    let batch_script = script::prepare(job, sys_cfg, fs, directive)?;

    let (out, err) = script::output_files(job, sys_cfg);
    job.output = OutputSource::Files { out, err };

    let args = jm
        .args()
        .iter()
        .filter(|a| !(job.non_blocking && a.as_str() == SLURM_WAIT_FLAG))
        .cloned()
        .collect::<Vec<_>>();

    let cmd = Cmd::new(bin)
        .args(args)
        .arg(&batch_script)
        .current_dir(job.run_dir.as_deref())
        .timeout(sys_cfg.timeout);

    job.touch();
    let submitted = cmd.run().await?;
    job.stdout = submitted.stdout.clone();
    job.stderr = submitted.stderr.clone();

    let id = squeue::parse_submission(&submitted.stdout)?;
    job.id = Some(id);
    info!("Job {} submitted", job);

    if job.non_blocking {
        return Ok(submitted);
    }

    let collected = collect_output(job, fs)?;

    Ok(ExecOutput {
        exit_code: submitted.exit_code,
        ..collected
    })
}

/// Read the `.out` and `.err` files the scheduler wrote for `job`.
pub(super) fn collect_output(job: &Job, fs: &impl FileOperations) -> Result<ExecOutput> {
    Ok(ExecOutput {
        stdout: job.get_output(fs)?,
        stderr: job.get_error(fs)?,
        exit_code: None,
    })
}
