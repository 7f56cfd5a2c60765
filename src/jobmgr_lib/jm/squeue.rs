use std::env;

use anyhow::Result;
use futures::future::join_all;
use log::debug;
use log::trace;

use super::JobManager;
use crate::constants::SLURM_INVALID_JOB_ID;
use crate::constants::SLURM_JOB_ID_PREFIX;
use crate::error::JobError;
use crate::exec::Cmd;
use crate::job::JobStatus;

/// The job id from `sbatch`'s `Submitted batch job <id>`.
pub fn parse_submission(stdout: &str) -> Result<u64> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(SLURM_JOB_ID_PREFIX.trim_end()))
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| JobError::parse("the job submission acknowledgment", stdout).into())
}

/// The state code in `squeue --format=%t` output, `None` once the job has
/// left the queue.
pub fn state_code(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .find(|line| !line.is_empty())
}

/// Map a `squeue` state code. `ST` needs `sacct` to tell whether the job
/// completed, it maps to [JobStatus::Stopped] here.
pub fn map_state(code: &str) -> JobStatus {
    match code {
        "R" => JobStatus::Running,
        "PD" => JobStatus::Queued,
        "ST" => JobStatus::Stopped,
        _ => JobStatus::Unknown,
    }
}

/// The number of jobs in a `squeue` listing.
pub fn count_jobs(stdout: &str) -> usize {
    stdout
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .count()
}

/// The user we count jobs for.
pub fn current_user() -> Result<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .map_err(|_| JobError::configuration("neither USER nor USERNAME is set").into())
}

/// The status of one job.
pub async fn status_of(jm: &JobManager, id: u64) -> Result<JobStatus> {
    let squeue = jm.lookup("squeue")?;

    let out = Cmd::new(squeue)
        .args(["-j".to_string(), id.to_string(), "--format=%t".to_string()])
        .timeout(jm.query_timeout())
        .output()
        .await?;

    if !out.success() {
        if out.stderr.to_lowercase().contains(SLURM_INVALID_JOB_ID) {
            debug!("Job {id} is no longer known to squeue");
            return Ok(JobStatus::Done);
        }

        return Err(JobError::Execution {
            command: format!("squeue -j {id} --format=%t"),
            code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
        }
        .into());
    }

    let status = match state_code(&out.stdout) {
        None => JobStatus::Done,
        Some("ST") => accounted_state(jm, id).await,
        Some(code) => map_state(code),
    };

    trace!("Job {id}: {status}");
    Ok(status)
}

/// Tell a completed job from a stopped one with `sacct`.
async fn accounted_state(jm: &JobManager, id: u64) -> JobStatus {
    let Ok(sacct) = jm.lookup("sacct") else {
        return JobStatus::Stopped;
    };

    let out = Cmd::new(sacct)
        .args([
            "-j".to_string(),
            id.to_string(),
            "-X".to_string(),
            "-n".to_string(),
            "-o".to_string(),
            "State".to_string(),
        ])
        .timeout(jm.query_timeout())
        .run()
        .await;

    match out {
        Ok(out) if out.stdout.split_whitespace().next() == Some("COMPLETED") => JobStatus::Done,
        Ok(_) => JobStatus::Stopped,
        Err(e) => {
            debug!("sacct could not tell the state of {id}: {e:#}");
            JobStatus::Stopped
        }
    }
}

/// The status of every job in `ids`, queried concurrently.
pub async fn job_status(jm: &JobManager, ids: &[u64]) -> Result<Vec<JobStatus>> {
    join_all(ids.iter().map(|id| status_of(jm, *id)))
        .await
        .into_iter()
        .collect()
}

/// How many jobs `user` has in `partition`.
pub async fn num_jobs(jm: &JobManager, partition: &str, user: &str) -> Result<usize> {
    let squeue = jm.lookup("squeue")?;

    let out = Cmd::new(squeue)
        .args(["-p", partition, "-u", user])
        .timeout(jm.query_timeout())
        .run()
        .await?;

    Ok(count_jobs(&out.stdout))
}

#[cfg(test)]
#[path = "tests/squeue.rs"]
mod tests;
