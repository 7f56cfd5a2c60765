use std::path::PathBuf;

use anyhow::Result;
use log::warn;

use crate::app::AppInfo;
use crate::config::SystemConfig;
use crate::constants::MPI_MANIFEST;
use crate::error::JobError;
use crate::file_system::FileOperations;
use crate::implem::install_env;
use crate::implem::mpich;
use crate::implem::mvapich2;
use crate::implem::openmpi;
use crate::implem::ImplementationId;
use crate::implem::ImplementationInfo;
use crate::network::NetworkConfig;

/// How a job uses MPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpiConfig {
    /// The implementation whose `mpirun` starts the job.
    pub implem: ImplementationInfo,

    /// Extra `mpirun` arguments, appended after the implementation's own.
    pub user_args: Vec<String>,
}

impl MpiConfig {
    /// Use `implem` without extra arguments.
    pub fn new(implem: ImplementationInfo) -> Self {
        Self {
            implem,
            user_args: Vec::new(),
        }
    }
}

/// The implementation specific `mpirun` flags followed by `user_args`.
///
/// The caller's flags come last so they override ours in launchers where the
/// last occurrence wins.
pub fn get_mpirun_args(
    implem: &ImplementationInfo,
    net_cfg: &NetworkConfig,
    user_args: &[String],
) -> Vec<String> {
    let mut args = match implem.id() {
        ImplementationId::OpenMpi => openmpi::mpirun_args(net_cfg),
        ImplementationId::Mvapich2 => mvapich2::mpirun_args(),
        ImplementationId::Mpich => mpich::mpirun_args(),
    };

    args.extend(user_args.iter().cloned());
    args
}

/// Flags spreading `np` ranks evenly over `nnodes` nodes, nothing when
/// either is unknown.
pub fn placement_args(implem: &ImplementationInfo, np: usize, nnodes: usize) -> Vec<String> {
    if np == 0 || nnodes == 0 {
        return Vec::new();
    }

    let ranks_per_node = np.div_ceil(nnodes);

    match implem.id() {
        ImplementationId::OpenMpi => openmpi::placement_args(ranks_per_node),
        ImplementationId::Mvapich2 => mvapich2::placement_args(ranks_per_node),
        ImplementationId::Mpich => mpich::placement_args(ranks_per_node),
    }
}

/// `<install>/bin/mpirun`, and whether the install still matches its
/// manifest.
///
/// A failed integrity check does not make the path unusable, it is up to the
/// caller to decide how much it trusts a modified install.
pub fn get_path_to_mpirun(
    implem: &ImplementationInfo,
    fs: &impl FileOperations,
) -> (PathBuf, Result<()>) {
    let mpirun = implem.bin_dir().join("mpirun");
    let integrity = crate::manifest::check(&implem.install_dir().join(MPI_MANIFEST), fs);

    if let Err(e) = &integrity {
        warn!("{} at {:?}: {:#}", implem, implem.install_dir(), e);
    }

    (mpirun, integrity)
}

/// The environment making the install's binaries and libraries visible.
pub fn mpi_env(implem: &ImplementationInfo) -> Vec<(String, String)> {
    install_env(implem.install_dir())
}

/// The full `mpirun` invocation for an application:
/// `mpirun -np <np> <placement> <mpi args> <launcher args> <app> <app args>`.
pub fn launch_command(
    cfg: &MpiConfig,
    app: &AppInfo,
    np: usize,
    nnodes: usize,
    launcher_args: &[String],
    sys_cfg: &SystemConfig,
) -> Result<Vec<String>> {
    let invocation = app.invocation().ok_or_else(|| {
        JobError::configuration(format!("application {:?} has no binary", app.name))
    })?;

    let mut words = vec![cfg.implem.bin_dir().join("mpirun").display().to_string()];

    if np > 0 {
        words.push("-np".to_string());
        words.push(np.to_string());
    }

    words.extend(placement_args(&cfg.implem, np, nnodes));
    words.extend(get_mpirun_args(
        &cfg.implem,
        &sys_cfg.network,
        &cfg.user_args,
    ));
    words.extend(launcher_args.iter().cloned());
    words.extend(invocation);

    Ok(words)
}

#[cfg(test)]
#[path = "tests/mpi.rs"]
mod tests;
