use std::path::Path;

use anyhow::Result;

use super::probe;
use crate::error::JobError;

/// The identifier of MPICH.
pub const ID: &str = "mpich";

const VERSION_TOKEN: &str = "Version:";

pub(super) async fn detect_from_dir(dir: &Path) -> Result<String> {
    parse_version(&probe(dir, "mpirun", &["--version"]).await?)
}

/// Read the version out of a HYDRA banner:
///
/// ```text
/// HYDRA build details:
///     Version:                                 3.4.2
///     Release Date:                            Wed May 26 15:51:40 CDT 2021
/// ```
pub fn parse_version(output: &str) -> Result<String> {
    output
        .lines()
        .nth(1)
        .and_then(|line| line.split_once(VERSION_TOKEN))
        .map(|(_, version)| version.trim())
        .filter(|version| !version.is_empty())
        .map(String::from)
        .ok_or_else(|| JobError::parse("the MPICH version banner", output).into())
}

/// MPICH needs no extra flags.
pub fn mpirun_args() -> Vec<String> {
    Vec::new()
}

/// HYDRA's processes-per-node flag.
pub fn placement_args(ranks_per_node: usize) -> Vec<String> {
    vec!["-ppn".to_string(), ranks_per_node.to_string()]
}
