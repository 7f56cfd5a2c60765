use std::path::Path;

use anyhow::Result;

use super::probe;
use crate::constants::MVAPICH2_DEFAULT_VERSION;
use crate::error::JobError;

/// The identifier of MVAPICH2.
pub const ID: &str = "mvapich2";

/// Banner prefixes seen across MVAPICH2 releases, longest first.
const VERSION_PREFIXES: [&str; 3] = ["MVAPICH2 Version:", "Version:", "mvapich2-"];

const GLOBAL_ENV: [(&str, &str); 4] = [
    ("MV2_HOMOGENEOUS_CLUSTER", "1"),
    ("MV2_USE_RDMA_CM", "0"),
    ("MV2_CPU_BINDING_POLICY", "hybrid"),
    ("MV2_HYBRID_BINDING_POLICY", "spread"),
];

pub(super) async fn detect_from_dir(dir: &Path) -> Result<String> {
    parse_version(&probe(dir, "mpichversion", &[]).await?)
}

/// Read the version from the first line of `mpichversion`.
///
/// Some builds print nothing at all, those report
/// [MVAPICH2_DEFAULT_VERSION]. A banner without any MVAPICH2 prefix belongs
/// to some other MPICH derivative and is rejected.
pub fn parse_version(output: &str) -> Result<String> {
    let first = output.lines().next().unwrap_or_default().trim();

    if first.is_empty() {
        return Ok(MVAPICH2_DEFAULT_VERSION.to_string());
    }

    let version = VERSION_PREFIXES
        .iter()
        .find_map(|prefix| first.strip_prefix(prefix))
        .map(str::trim)
        .ok_or_else(|| JobError::parse("the MVAPICH2 version banner", output))?;

    if version.is_empty() {
        Ok(MVAPICH2_DEFAULT_VERSION.to_string())
    } else {
        Ok(version.to_string())
    }
}

/// `-genv` settings every MVAPICH2 launch gets.
pub fn mpirun_args() -> Vec<String> {
    GLOBAL_ENV
        .iter()
        .flat_map(|(key, value)| ["-genv".to_string(), key.to_string(), value.to_string()])
        .collect()
}

/// Same flag as MPICH, both use HYDRA.
pub fn placement_args(ranks_per_node: usize) -> Vec<String> {
    super::mpich::placement_args(ranks_per_node)
}
