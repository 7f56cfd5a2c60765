use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::PRIMARY_STYLE;
use crate::constants::SCRATCH_DEFAULT;
use crate::constants::TIMEOUT_DEFAULT;
use crate::error::ctx;
use crate::file_system::FileOperations;
use crate::network::NetworkConfig;

/// The system configuration shared by every job submitted from this host.
//
// changing this struct? the `config_file_all_values` test spells out every
// field a user may write, keep it in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Where transient per-job artifacts (generated scripts, job output) go.
    ///
    /// Most HPC systems have a dedicated scratch file system.
    #[serde(default = "SCRATCH_DEFAULT")]
    pub scratch_dir: PathBuf,

    /// Set when running from a persistent install, in which case generated
    /// batch scripts get deterministic names instead of temporary ones.
    #[serde(default)]
    pub persistent: Option<PathBuf>,

    /// The directory the process was started from.
    #[serde(skip)]
    pub cur_path: PathBuf,

    /// How long a single external command may take before it is killed.
    #[serde(
        default = "TIMEOUT_DEFAULT",
        deserialize_with = "human_duration::deserialize",
        serialize_with = "human_duration::serialize"
    )]
    pub timeout: Duration,

    /// Network settings for MPI transports.
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            scratch_dir: SCRATCH_DEFAULT(),
            persistent: None,
            cur_path: PathBuf::new(),
            timeout: TIMEOUT_DEFAULT(),
            network: NetworkConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Load a `SystemConfig` from a TOML file at the provided path.
    pub fn from_file<F: FileOperations>(path: &Path, fs: &F) -> Result<SystemConfig> {
        toml::from_str(&fs.read_utf8(path)?).with_context(ctx!(
          "Could not parse {path:?}", ;
          "The configuration accepts {PRIMARY_STYLE}scratch_dir{PRIMARY_STYLE:#}, \
          {PRIMARY_STYLE}persistent{PRIMARY_STYLE:#}, {PRIMARY_STYLE}timeout{PRIMARY_STYLE:#} \
          and a {PRIMARY_STYLE}[network]{PRIMARY_STYLE:#} table",
        ))
    }

    /// True when batch scripts should get deterministic names.
    pub fn is_persistent(&self) -> bool {
        self.persistent.is_some()
    }
}

/// Durations written the way people write them, `"90s"` or `"1h 30m"`.
mod human_duration {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;

        humantime::parse_duration(&text).map_err(|parse_err| {
            serde::de::Error::custom(format!("{text:?} is not a valid duration: {parse_err}"))
        })
    }

    pub fn serialize<S: Serializer>(duration: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&humantime::format_duration(*duration).to_string())
    }
}
