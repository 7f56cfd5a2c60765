use std::env;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use log::error;
use log::info;

use crate::config::SystemConfig;
use crate::constants::DEFAULT_NNODES;
use crate::constants::DEFAULT_NP;
use crate::error::ctx;
use crate::error::job_error;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::jm::JobManager;
use crate::job::Job;
use crate::mpi::MpiConfig;

/// Whether a launch went through, and what went wrong if it did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// True unless submission failed.
    pub pass: bool,

    /// Diagnostics for a failed launch, empty on success.
    pub note: String,
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            pass: true,
            note: String::new(),
        }
    }
}

/// The default system configuration and the job manager of this host.
pub fn load() -> Result<(SystemConfig, JobManager)> {
    load_with(None, &crate::file_system::FileSystemInteractor)
}

/// Like [load], reading the system configuration from `config` if given.
pub fn load_with(
    config: Option<&Path>,
    fs: &impl FileOperations,
) -> Result<(SystemConfig, JobManager)> {
    let mut sys_cfg = match config {
        Some(path) => SystemConfig::from_file(path, fs)?,
        None => SystemConfig::default(),
    };

    sys_cfg.cur_path = env::current_dir().with_context(ctx!(
      "Could not determine the current directory", ;
      "Ensure the directory you are running from still exists",
    ))?;

    Ok((sys_cfg, JobManager::detect()))
}

/// Submit `job` through `jm` and judge the result.
///
/// Without `extra_args` a job that asked for neither processes nor nodes
/// gets the launcher defaults. Otherwise `extra_args` are handed to the
/// launcher.
pub async fn run(
    job: &mut Job,
    host_mpi: Option<&MpiConfig>,
    jm: &JobManager,
    sys_cfg: &SystemConfig,
    extra_args: &[String],
    fs: &impl FileOperations,
) -> (Verdict, Result<ExecOutput>) {
    if let Some(mpi) = host_mpi {
        job.mpi = Some(mpi.clone());
    }

    if extra_args.is_empty() {
        if job.np == 0 && job.nnodes == 0 {
            job.np = DEFAULT_NP;
            job.nnodes = DEFAULT_NNODES;
        }
    } else {
        job.args.extend(extra_args.iter().cloned());
    }

    let loaded = jm.load(sys_cfg);
    let result = loaded.submit(job, sys_cfg, fs).await;

    let verdict = match &result {
        Ok(_) => {
            info!("{} ran through {}", job, loaded.backend());
            Verdict::default()
        }
        Err(e) => {
            let note = failure_note(job, e);
            error!("{}", note.trim_end());
            Verdict { pass: false, note }
        }
    };

    (verdict, result)
}

fn failure_note(job: &Job, err: &anyhow::Error) -> String {
    let kind = job_error(err);
    let (stdout, stderr) = kind
        .and_then(|k| k.captured_output())
        .unwrap_or((job.stdout.as_str(), job.stderr.as_str()));

    if kind.map(|k| k.is_timeout()).unwrap_or(false) {
        format!("[ERROR] Command timed out - stdout: {stdout} - stderr: {stderr}\n")
    } else {
        format!("[ERROR] Command failed - stdout: {stdout} - stderr: {stderr} - err: {err:#}\n")
    }
}

#[cfg(test)]
#[path = "tests/launcher.rs"]
mod tests;
