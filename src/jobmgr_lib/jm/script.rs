use std::fmt::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::info;

use crate::config::SystemConfig;
use crate::constants::BATCH_SCRIPT_PREFIX;
use crate::error::ctx;
use crate::error::JobError;
use crate::file_system::FileOperations;
use crate::job::Job;
use crate::mpi::launch_command;

/// Formats a wall time the way `sbatch -t` reads it.
///
/// `H:M:S` without padding, or `D-H:M:S` from one day on.
pub fn format_walltime(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (mins, secs) = (secs / 60, secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);

    if hours < 24 {
        format!("{hours}:{mins}:{secs}")
    } else {
        format!("{}-{}:{mins}:{secs}", hours / 24, hours % 24)
    }
}

/// The stem shared by the job's `.out` and `.err` files.
pub fn output_prefix(job: &Job) -> String {
    let name = if job.name.is_empty() { "job" } else { &job.name };

    match &job.mpi {
        Some(cfg) => format!("{name}-{}-{}", cfg.implem.id(), cfg.implem.version()),
        None => name.to_string(),
    }
}

/// Where the scheduler writes the job's stdout and stderr.
pub fn output_files(job: &Job, sys_cfg: &SystemConfig) -> (PathBuf, PathBuf) {
    let prefix = output_prefix(job);

    (
        sys_cfg.scratch_dir.join(format!("{prefix}.out")),
        sys_cfg.scratch_dir.join(format!("{prefix}.err")),
    )
}

/// The full batch script for `job`, directives prefixed with `directive`.
pub fn render(job: &Job, sys_cfg: &SystemConfig, directive: &str) -> Result<String> {
    let (out, err) = output_files(job, sys_cfg);

    let mut text = String::from("#!/bin/bash\n#\n");

    // writing to a String cannot fail
    let mut line = |s: String| {
        let _ = writeln!(text, "{s}");
    };

    if let Some(partition) = job.partition.as_deref().filter(|p| !p.is_empty()) {
        line(format!("{directive} -p {partition}"));
    }

    if job.nnodes > 0 {
        line(format!("{directive} -N {}", job.nnodes));
    }

    if job.np > 0 {
        line(format!("{directive} -n {}", job.np));
    }

    line(format!("{directive} -t {}", format_walltime(job.walltime())));
    line(format!("{directive} --error={}", err.display()));
    line(format!("{directive} --output={}", out.display()));

    if !job.modules.is_empty() {
        line(String::new());
        line("module purge".to_string());
        line(format!("module load {}", quote_all(&job.modules)?));
    }

    if !job.env.is_empty() {
        line(String::new());
        for (key, value) in &job.env {
            line(format!("export {key}={}", quote(value)?));
        }
    }

    let command = match &job.mpi {
        Some(cfg) => launch_command(cfg, &job.app, job.np, job.nnodes, &job.args, sys_cfg)?,
        None => job.app.invocation().ok_or_else(|| {
            JobError::configuration(format!("{} has no application binary", job.name))
        })?,
    };

    line(String::new());
    line(quote_all(&command)?);

    Ok(text)
}

/// `word` as the shell reads it back, quoted only when it has to be.
fn quote(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| {
            JobError::configuration(format!("{word:?} cannot be written to a shell script"))
                .into()
        })
}

fn quote_all(words: &[String]) -> Result<String> {
    Ok(words
        .iter()
        .map(|w| quote(w))
        .collect::<Result<Vec<_>>>()?
        .join(" "))
}

/// Pick the file a new batch script for `job` is written to.
///
/// In persistent mode the name is deterministic and an existing file is an
/// error. Otherwise a fresh file is created in the scratch directory.
pub fn allocate(job: &Job, sys_cfg: &SystemConfig, fs: &impl FileOperations) -> Result<PathBuf> {
    let stem = format!("{BATCH_SCRIPT_PREFIX}{}", job.name);

    if let Some(persistent) = &sys_cfg.persistent {
        let dir = job.run_dir.as_deref().unwrap_or(persistent);
        let path = dir.join(format!("{stem}.sh"));

        // not atomic, a concurrent submission can still race us to the file
        if fs.exists(&path) {
            return Err(JobError::configuration(format!(
                "{} already exists",
                path.display()
            )))
            .with_context(ctx!(
              "Refusing to overwrite a batch script we did not generate", ;
              "Remove the file or give the job a different name",
            ));
        }

        return Ok(path);
    }

    let (_, path) = tempfile::Builder::new()
        .prefix(&format!("{stem}-"))
        .suffix(".sh")
        .tempfile_in(&sys_cfg.scratch_dir)
        .and_then(|file| file.keep().map_err(|e| e.error))
        .with_context(ctx!(
          "Could not create a batch script in {:?}", sys_cfg.scratch_dir;
          "Ensure that the scratch directory is writable",
        ))?;

    Ok(path)
}

/// Make sure `job` has a batch script on disk and return its path.
///
/// A script the caller supplied is used as is. One we generated before is
/// rendered again at the same path.
pub fn prepare(
    job: &mut Job,
    sys_cfg: &SystemConfig,
    fs: &impl FileOperations,
    directive: &str,
) -> Result<PathBuf> {
    match &job.batch_script {
        Some(path) if !job.has_generated_script() => {
            debug!("Using the provided batch script {:?}", path);
            return Ok(path.clone());
        }
        None if job.app.bin_path.is_none() => {
            return Err(JobError::configuration(format!(
                "{} has neither an application binary nor a batch script",
                job.name
            )))
            .with_context(ctx!(
              "Cannot generate a batch script for {}", job.name;
              "Set the application binary or provide your own batch script",
            ));
        }
        _ => {}
    }

    let text = render(job, sys_cfg, directive)?;

    let path = match job.batch_script.clone() {
        Some(path) => path,
        None => allocate(job, sys_cfg, fs)?,
    };

    write_script(&path, &text, fs)?;
    job.adopt_script(&path);

    info!("Batch script ready: {:?}", path);
    Ok(path)
}

fn write_script(path: &Path, text: &str, fs: &impl FileOperations) -> Result<()> {
    debug!("Batch script {:?}:\n{}", path, text);

    fs.write_utf8_truncate(path, text)?;
    fs.set_permissions(path, 0o755)
}

#[cfg(test)]
#[path = "tests/script.rs"]
mod tests;
