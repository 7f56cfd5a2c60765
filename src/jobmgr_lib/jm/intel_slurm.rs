use anyhow::Result;

use super::slurm::collect_output;
use super::slurm::submit_batch;
use super::squeue;
use super::Backend;
use super::JobManager;
use super::JobManagerBackend;
use crate::config::SystemConfig;
use crate::constants::SBATCH_DIRECTIVE;
use crate::constants::SLURM_WAIT_FLAG;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::job::JobStatus;

/// The directive prefix of Intel-Slurm batch scripts.
pub const DIRECTIVE: &str = SBATCH_DIRECTIVE;

/// Slurm as deployed behind `bsub`: submission through `bsub`, everything
/// else through the Slurm tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntelSlurm;

impl JobManagerBackend for IntelSlurm {
    const ID: Backend = Backend::IntelSlurm;

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
        submit_batch(jm, job, sys_cfg, fs, DIRECTIVE).await
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
