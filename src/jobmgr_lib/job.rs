use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::Local;
use log::debug;

use crate::app::AppInfo;
use crate::constants::DEFAULT_WALLTIME;
use crate::error::ctx;
use crate::file_system::FileOperations;
use crate::mpi::MpiConfig;

/// Where the output of a submitted job can be read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputSource {
    /// The captured stdout/stderr of the submitting process.
    #[default]
    Buffers,

    /// The files the scheduler wrote the job's streams to.
    Files {
        /// Standard output.
        out: PathBuf,

        /// Standard error.
        err: PathBuf,
    },
}

/// A job to submit, and what we learned while submitting it.
#[derive(Debug, Clone, Default)]
pub struct Job {
    /// A human readable name, also used in generated file names.
    pub name: String,

    /// The number of processes.
    pub np: usize,

    /// The number of nodes.
    pub nnodes: usize,

    /// The partition to run in, the scheduler's default if unset.
    pub partition: Option<String>,

    /// The wall time to request, [DEFAULT_WALLTIME] if unset.
    pub walltime: Option<Duration>,

    /// Variables exported before the application starts.
    pub env: BTreeMap<String, String>,

    /// Environment modules to load, in order.
    pub modules: Vec<String>,

    /// Set when the application is started through `mpirun`.
    pub mpi: Option<MpiConfig>,

    /// The application itself.
    pub app: AppInfo,

    /// Extra arguments for the launcher (`mpirun` or `prun`).
    pub args: Vec<String>,

    /// The batch script to submit, generated when unset.
    pub batch_script: Option<PathBuf>,

    /// The directory the job is submitted from.
    pub run_dir: Option<PathBuf>,

    /// When the job was last submitted.
    pub timestamp: Option<DateTime<Local>>,

    /// Return as soon as the job is queued.
    pub non_blocking: bool,

    /// The scheduler's job id, once submitted.
    pub id: Option<u64>,

    /// Captured standard output of the submitting process.
    pub stdout: String,

    /// Captured standard error of the submitting process.
    pub stderr: String,

    pub(crate) generated_script: bool,
    pub(crate) output: OutputSource,
    pub(crate) cleanup: Vec<PathBuf>,
}

impl Job {
    /// A job starting `app`.
    pub fn new(name: impl Into<String>, app: AppInfo) -> Self {
        Self {
            name: name.into(),
            app,
            ..Default::default()
        }
    }

    /// The wall time to request.
    pub fn walltime(&self) -> Duration {
        self.walltime.unwrap_or(DEFAULT_WALLTIME)
    }

    /// True once the batch script was written by us and not the caller.
    pub fn has_generated_script(&self) -> bool {
        self.generated_script
    }

    /// Where the output is read from.
    pub fn output_source(&self) -> &OutputSource {
        &self.output
    }

    /// Stamp the job as submitted now.
    pub(crate) fn touch(&mut self) {
        self.timestamp = Some(Local::now());
    }

    /// Record a script we generated and delete it on [Job::cleanup].
    pub(crate) fn adopt_script(&mut self, path: &Path) {
        self.batch_script = Some(path.to_path_buf());
        self.generated_script = true;

        if !self.cleanup.iter().any(|p| p == path) {
            self.cleanup.push(path.to_path_buf());
        }
    }

    /// The job's standard output.
    pub fn get_output(&self, fs: &impl FileOperations) -> Result<String> {
        match &self.output {
            OutputSource::Buffers => Ok(self.stdout.clone()),
            OutputSource::Files { out, .. } => fs.read_utf8(out).with_context(ctx!(
              "Could not read the output of job {}", self;
              "The scheduler may not have flushed {out:?} yet",
            )),
        }
    }

    /// The job's standard error.
    pub fn get_error(&self, fs: &impl FileOperations) -> Result<String> {
        match &self.output {
            OutputSource::Buffers => Ok(self.stderr.clone()),
            OutputSource::Files { err, .. } => fs.read_utf8(err).with_context(ctx!(
              "Could not read the error output of job {}", self;
              "The scheduler may not have flushed {err:?} yet",
            )),
        }
    }

    /// Delete the files generated while submitting this job.
    ///
    /// Never called by the job managers themselves, the owner decides when
    /// the results have been collected.
    pub fn cleanup(&mut self, fs: &impl FileOperations) -> Result<()> {
        for path in self.cleanup.drain(..) {
            debug!("Cleaning up {:?}", path);
            fs.remove_file(&path)?;
        }

        Ok(())
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({})", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The state of a job as far as the scheduler tells us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// The scheduler said something we do not understand.
    #[default]
    Unknown,

    /// Not handed to the scheduler yet.
    Pending,

    /// Waiting in the queue.
    Queued,

    /// Running.
    Running,

    /// Stopped without completing.
    Stopped,

    /// Completed or no longer known to the scheduler.
    Done,
}

impl JobStatus {
    /// The display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Done => "DONE",
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "tests/job.rs"]
mod tests;
