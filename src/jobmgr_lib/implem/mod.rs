use std::env;
use std::ffi::OsString;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::info;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ctx;
use crate::error::JobError;
use crate::exec::Cmd;

/// Version banners come back instantly, anything slower is a broken install.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open MPI.
pub mod openmpi;

/// MPICH, with the HYDRA process manager.
pub mod mpich;

/// MVAPICH2, which installs MPICH-named binaries.
pub mod mvapich2;

/// The MPI implementations we know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplementationId {
    /// Open MPI.
    #[serde(rename = "openmpi")]
    OpenMpi,

    /// MPICH.
    Mpich,

    /// MVAPICH2.
    Mvapich2,
}

impl ImplementationId {
    /// The identifier used in file names and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenMpi => openmpi::ID,
            Self::Mpich => mpich::ID,
            Self::Mvapich2 => mvapich2::ID,
        }
    }
}

impl Display for ImplementationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplementationId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            openmpi::ID => Ok(Self::OpenMpi),
            mpich::ID => Ok(Self::Mpich),
            mvapich2::ID => Ok(Self::Mvapich2),
            other => Err(JobError::parse("an MPI implementation identifier", other)),
        }
    }
}

/// One detected MPI implementation.
///
/// Only detection creates these, so the install directory always held a
/// working version probe at some point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImplementationInfo {
    id: ImplementationId,
    version: String,
    install_dir: PathBuf,
}

impl ImplementationInfo {
    pub(crate) fn new(
        id: ImplementationId,
        version: impl Into<String>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            version: version.into(),
            install_dir: install_dir.into(),
        }
    }

    /// Which implementation this is.
    pub fn id(&self) -> ImplementationId {
        self.id
    }

    /// The version string reported by the implementation.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The root of the installation, the parent of its `bin` directory.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// `<install>/bin`.
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    /// `<install>/lib`.
    pub fn lib_dir(&self) -> PathBuf {
        self.install_dir.join("lib")
    }
}

impl Display for ImplementationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Whether `info` describes a known MPI implementation.
pub fn is_mpi(info: Option<&ImplementationInfo>) -> bool {
    info.is_some()
}

/// `PATH` and `LD_LIBRARY_PATH` with the install's `bin` and `lib`
/// directories in front of what this process inherited.
pub fn install_env(install_dir: &Path) -> Vec<(String, String)> {
    let prefixed = |var: &str, dir: PathBuf| {
        let mut value = dir.display().to_string();
        if let Some(current) = env::var_os(var).filter(|v| !v.is_empty()) {
            value.push(':');
            value.push_str(&current.to_string_lossy());
        }
        (var.to_string(), value)
    };

    vec![
        prefixed("PATH", install_dir.join("bin")),
        prefixed("LD_LIBRARY_PATH", install_dir.join("lib")),
    ]
}

/// Run `<install>/bin/<binary> <args>` in the install's environment and
/// return its stdout.
pub(crate) async fn probe(install_dir: &Path, binary: &str, args: &[&str]) -> Result<String> {
    let bin = install_dir.join("bin").join(binary);
    if !bin.is_file() {
        return Err(JobError::detection(format!("{} does not exist", bin.display())).into());
    }

    let mut cmd = Cmd::new(bin).args(args).timeout(PROBE_TIMEOUT);
    for (key, value) in install_env(install_dir) {
        cmd = cmd.env(key, value);
    }

    Ok(cmd.run().await?.stdout)
}

/// Figure out which MPI implementation is installed in `dir`.
///
/// Open MPI is probed first, then MVAPICH2, then MPICH. MVAPICH2 has to come
/// before MPICH since it ships the same binaries. A probe that fails (missing
/// binary, unreadable banner) only moves detection on to the next candidate.
pub async fn detect_from_dir(dir: &Path) -> Result<ImplementationInfo> {
    let probes = [
        ImplementationId::OpenMpi,
        ImplementationId::Mvapich2,
        ImplementationId::Mpich,
    ];

    for id in probes {
        let probed = match id {
            ImplementationId::OpenMpi => openmpi::detect_from_dir(dir).await,
            ImplementationId::Mvapich2 => mvapich2::detect_from_dir(dir).await,
            ImplementationId::Mpich => mpich::detect_from_dir(dir).await,
        };

        match probed {
            Ok(version) => {
                info!("Detected {} {} in {:?}", id, version, dir);
                return Ok(ImplementationInfo::new(id, version, dir));
            }
            Err(e) => debug!("{:?} is not {}: {:#}", dir, id, e),
        }
    }

    Err(JobError::detection(format!(
        "no supported MPI implementation detected in {}",
        dir.display()
    )))
    .with_context(ctx!(
      "Probed {:?} for Open MPI, MVAPICH2 and MPICH", dir;
      "Point to the prefix of an MPI install, the directory containing `bin/mpirun`",
    ))
}

/// Figure out which MPI implementation provides the `mpirun` in `PATH`.
pub async fn detect() -> Result<ImplementationInfo> {
    detect_in(env::var_os("PATH")).await
}

/// Like [detect], searching `search_path` instead of `PATH`.
pub async fn detect_in(search_path: Option<OsString>) -> Result<ImplementationInfo> {
    let cwd = env::current_dir()?;
    let mpirun = which::which_in("mpirun", search_path, cwd)
        .map_err(|e| anyhow!(JobError::detection(format!("mpirun not found: {e}"))))?;

    let bin_dir = mpirun
        .parent()
        .ok_or_else(|| JobError::detection(format!("{} has no parent", mpirun.display())))?;

    // binaries and libraries of system-wide installs live in unrelated
    // directories, we only accept `<prefix>/bin/mpirun`
    if bin_dir.file_name().map(|n| n != "bin").unwrap_or(true) {
        return Err(JobError::detection(format!(
            "{} is not a valid MPI installation",
            bin_dir.display()
        )))
        .with_context(ctx!(
          "Found mpirun at {:?}", mpirun;
          "Put the `bin` directory of a self-contained MPI install first in your PATH",
        ));
    }

    let install_dir = bin_dir
        .parent()
        .ok_or_else(|| JobError::detection(format!("{} has no parent", bin_dir.display())))?;

    detect_from_dir(install_dir).await
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
