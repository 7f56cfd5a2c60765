use std::path::Path;

use anyhow::Result;

use super::probe;
use crate::error::JobError;
use crate::network::NetworkConfig;

/// The identifier of Open MPI.
pub const ID: &str = "openmpi";

const OMPI_INFO_BANNER: &str = "Open MPI";
const MPIRUN_BANNER: &str = "(Open MPI)";

/// The version of the Open MPI install in `dir`.
///
/// `ompi_info` is authoritative. Installs shipping without it still answer
/// `mpirun --version`.
pub(super) async fn detect_from_dir(dir: &Path) -> Result<String> {
    for info in ["ompi_info", "ompi-info"] {
        if dir.join("bin").join(info).is_file() {
            return parse_version(&probe(dir, info, &["--version"]).await?);
        }
    }

    parse_version(&probe(dir, "mpirun", &["--version"]).await?)
}

/// Read the version from either `Open MPI v4.1.1` (`ompi_info`) or
/// `mpirun (Open MPI) 4.1.1` (`mpirun`).
pub fn parse_version(output: &str) -> Result<String> {
    let first = output.lines().next().unwrap_or_default().trim();

    let version = if let Some(rest) = first.strip_prefix(OMPI_INFO_BANNER) {
        rest.trim().trim_start_matches('v')
    } else if let Some((_, rest)) = first.split_once(MPIRUN_BANNER) {
        rest.trim()
    } else {
        ""
    };

    if version.is_empty() {
        Err(JobError::parse("the Open MPI version banner", output).into())
    } else {
        Ok(version.to_string())
    }
}

/// Transport selection, plus the UCX device when one is configured.
pub fn mpirun_args(net: &NetworkConfig) -> Vec<String> {
    let mut args: Vec<String> = ["--mca", "btl", "^openib", "--mca", "pml", "ucx"]
        .map(String::from)
        .to_vec();

    if let Some(device) = &net.device {
        args.push("-x".to_string());
        args.push(format!("UCX_NET_DEVICES={device}"));
    }

    args
}

/// Place `ranks_per_node` ranks on every node, one core each.
pub fn placement_args(ranks_per_node: usize) -> Vec<String> {
    vec![
        "--map-by".to_string(),
        format!("ppr:{ranks_per_node}:node"),
        "-rank-by".to_string(),
        "core".to_string(),
        "-bind-to".to_string(),
        "core".to_string(),
    ]
}
