use serde::Deserialize;
use serde::Serialize;

/// The network configuration to use when starting MPI applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The device the transport layer should bind to, e.g. `mlx5_0:1`.
    pub device: Option<String>,
}
