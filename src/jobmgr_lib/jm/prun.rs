use anyhow::Result;

use super::Backend;
use super::JobManager;
use super::JobManagerBackend;
use crate::config::SystemConfig;
use crate::error::JobError;
use crate::exec::Cmd;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::job::OutputSource;

/// Exported to every rank so the application finds its tools.
const EXPORTED_ENV: &str = "PATH";

/// The `prun` resource manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prun;

impl JobManagerBackend for Prun {
    const ID: Backend = Backend::Prun;

    async fn submit(
        &self,
        jm: &JobManager,
        job: &mut Job,
        sys_cfg: &SystemConfig,
        _fs: &impl FileOperations,
    ) -> Result<ExecOutput> {
        let invocation = job.app.invocation().ok_or_else(|| {
            JobError::configuration(format!("{} has no application binary", job.name))
        })?;
        let prun = jm.require_bin()?.to_path_buf();

        let cmd = Cmd::new(prun)
            .args(&job.args)
            .args(["-x", EXPORTED_ENV])
            .args(invocation)
            .current_dir(job.run_dir.as_deref())
            .timeout(sys_cfg.timeout);

        job.output = OutputSource::Buffers;
        job.touch();

        let out = cmd.run().await?;
        job.stdout = out.stdout.clone();
        job.stderr = out.stderr.clone();

        Ok(out)
    }
}
