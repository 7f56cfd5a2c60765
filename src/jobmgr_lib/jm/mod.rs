use std::env;
use std::ffi::OsString;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use log::debug;
use log::info;

use crate::config::SystemConfig;
use crate::constants::CMD_TIMEOUT;
use crate::error::JobError;
use crate::exec::ExecOutput;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::job::JobStatus;

/// Direct launch, through `mpirun` or the bare application.
pub mod native;

/// Slurm, through `sbatch`.
pub mod slurm;

/// Intel-Slurm, through `bsub` with `squeue` for queries.
pub mod intel_slurm;

/// The `prun` resource manager.
pub mod prun;

/// Batch script generation.
pub mod script;

/// Talking to `squeue` and `sacct`.
pub mod squeue;

/// The job managers we know.
///
/// Native is the default, it can always launch something.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Start the application directly.
    #[default]
    Native,

    /// Slurm.
    Slurm,

    /// Slurm behind an LSF style `bsub`.
    IntelSlurm,

    /// `prun`.
    Prun,
}

impl Backend {
    /// The identifier of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Slurm => "slurm",
            Self::IntelSlurm => "intel-slurm",
            Self::Prun => "prun",
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "slurm" => Ok(Self::Slurm),
            "intel-slurm" => Ok(Self::IntelSlurm),
            "prun" => Ok(Self::Prun),
            other => Err(JobError::parse("a job manager identifier", other)),
        }
    }
}

/// The capabilities of a job manager.
///
/// Everything but submission is optional, the defaults report
/// [JobError::NotSupported].
#[allow(async_fn_in_trait)]
pub trait JobManagerBackend {
    /// Which backend this is.
    const ID: Backend;

    /// Arguments every submission through this backend gets.
    fn load_args(&self, _sys_cfg: &SystemConfig) -> Vec<String> {
        Vec::new()
    }

    /// Submit `job`, blocking until it completes unless it is non-blocking.
    async fn submit(
        &self,
        jm: &JobManager,
        job: &mut Job,
        sys_cfg: &SystemConfig,
        fs: &impl FileOperations,
    ) -> Result<ExecOutput>;

    /// The status of every job in `ids`, in order.
    async fn job_status(&self, _jm: &JobManager, _ids: &[u64]) -> Result<Vec<JobStatus>> {
        Err(not_supported(Self::ID, "job status"))
    }

    /// How many jobs `user` has in `partition`.
    async fn num_jobs(&self, _jm: &JobManager, _partition: &str, _user: &str) -> Result<usize> {
        Err(not_supported(Self::ID, "counting jobs"))
    }

    /// Collect the output of a job that already ran.
    fn post_run(&self, _job: &Job, _fs: &impl FileOperations) -> Result<ExecOutput> {
        Err(not_supported(Self::ID, "post-run collection"))
    }
}

/// The error for a capability `backend` lacks.
pub fn not_supported(backend: Backend, capability: &'static str) -> anyhow::Error {
    JobError::NotSupported {
        backend: backend.to_string(),
        capability,
    }
    .into()
}

/// A detected job manager, ready to be loaded and used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobManager {
    backend: Backend,
    bin_path: Option<PathBuf>,
    args: Vec<String>,
    search_path: Option<OsString>,
    query_timeout: Option<Duration>,
}

macro_rules! dispatch {
    ($self: ident, $method: ident($($arg: expr),*)) => {
        match $self.backend {
            Backend::Native => native::Native.$method($($arg),*),
            Backend::Slurm => slurm::Slurm.$method($($arg),*),
            Backend::IntelSlurm => intel_slurm::IntelSlurm.$method($($arg),*),
            Backend::Prun => prun::Prun.$method($($arg),*),
        }
    };
}

macro_rules! dispatch_async {
    ($self: ident, $method: ident($($arg: expr),*)) => {
        match $self.backend {
            Backend::Native => native::Native.$method($($arg),*).await,
            Backend::Slurm => slurm::Slurm.$method($($arg),*).await,
            Backend::IntelSlurm => intel_slurm::IntelSlurm.$method($($arg),*).await,
            Backend::Prun => prun::Prun.$method($($arg),*).await,
        }
    };
}

impl JobManager {
    /// Pick the job manager to use on this host from `PATH`.
    pub fn detect() -> JobManager {
        Self::detect_in(env::var_os("PATH"))
    }

    /// Pick the job manager to use, searching `search_path` for binaries.
    ///
    /// Slurm is preferred, then prun, then Intel-Slurm. Native is used when
    /// none of them is installed.
    pub fn detect_in(search_path: Option<OsString>) -> JobManager {
        let native = JobManager {
            search_path,
            ..Default::default()
        };

        if let Ok(sbatch) = native.lookup("sbatch") {
            info!("Detected Slurm at {:?}", sbatch);
            return native.with_backend(Backend::Slurm, sbatch);
        }
        debug!("Slurm not detected");

        if let Ok(prun) = native.lookup("prun") {
            info!("Detected prun at {:?}", prun);
            return native.with_backend(Backend::Prun, prun);
        }
        debug!("prun not detected");

        if let (Ok(bsub), Ok(_)) = (native.lookup("bsub"), native.lookup("squeue")) {
            info!("Detected Intel-Slurm at {:?}", bsub);
            return native.with_backend(Backend::IntelSlurm, bsub);
        }
        debug!("Intel-Slurm not detected");

        info!("Using the native job manager");
        native
    }

    fn with_backend(self, backend: Backend, bin_path: PathBuf) -> JobManager {
        JobManager {
            backend,
            bin_path: Some(bin_path),
            ..self
        }
    }

    /// A handle for `backend` with an explicit submission binary.
    pub fn new(backend: Backend, bin_path: Option<PathBuf>) -> JobManager {
        JobManager {
            backend,
            bin_path,
            ..Default::default()
        }
    }

    /// Search `search_path` instead of `PATH` for helper binaries.
    pub fn with_search_path(self, search_path: Option<OsString>) -> JobManager {
        JobManager {
            search_path,
            ..self
        }
    }

    /// Which backend this is.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The submission binary, if the backend has one.
    pub fn bin_path(&self) -> Option<&Path> {
        self.bin_path.as_deref()
    }

    /// The arguments every submission gets.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The deadline of status and count queries, the configured one once
    /// loaded.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout.unwrap_or(CMD_TIMEOUT)
    }

    /// A new handle carrying the backend's submission arguments and the
    /// configured command deadline.
    pub fn load(&self, sys_cfg: &SystemConfig) -> JobManager {
        JobManager {
            args: dispatch!(self, load_args(sys_cfg)),
            query_timeout: Some(sys_cfg.timeout),
            ..self.clone()
        }
    }

    /// Submit `job`.
    ///
    /// Blocking submissions return the job's own output. Non-blocking ones
    /// return whatever the submission command printed, the job id is then
    /// set on `job`.
    pub async fn submit(
        &self,
        job: &mut Job,
        sys_cfg: &SystemConfig,
        fs: &impl FileOperations,
    ) -> Result<ExecOutput> {
        info!("Submitting {} through the {} job manager", job, self.backend);
        dispatch_async!(self, submit(self, job, sys_cfg, fs))
    }

    /// The status of every job in `ids`, in the same order.
    pub async fn job_status(&self, ids: &[u64]) -> Result<Vec<JobStatus>> {
        dispatch_async!(self, job_status(self, ids))
    }

    /// How many jobs `user` has in `partition`.
    pub async fn num_jobs(&self, partition: &str, user: &str) -> Result<usize> {
        dispatch_async!(self, num_jobs(self, partition, user))
    }

    /// Read back the output of a submitted job.
    pub fn post_run(&self, job: &Job, fs: &impl FileOperations) -> Result<ExecOutput> {
        dispatch!(self, post_run(job, fs))
    }

    /// Resolve `binary` the way this handle was detected, through `PATH` if
    /// no search path was given.
    pub fn lookup(&self, binary: &str) -> Result<PathBuf> {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let search_path = self.search_path.clone().or_else(|| env::var_os("PATH"));

        which::which_in(binary, search_path, cwd).map_err(|e| {
            JobError::configuration(format!("{binary} is not available: {e}")).into()
        })
    }

    /// The submission binary, which must still exist.
    pub(crate) fn require_bin(&self) -> Result<&Path> {
        match self.bin_path.as_deref() {
            Some(path) if path.is_file() => Ok(path),
            Some(path) => Err(JobError::configuration(format!(
                "the {} binary {} does not exist",
                self.backend,
                path.display()
            ))
            .into()),
            None => Err(JobError::configuration(format!(
                "the {} job manager has no submission binary",
                self.backend
            ))
            .into()),
        }
    }
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
