use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// The application a job starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// A human readable name.
    pub name: String,

    /// The path to the binary, if any.
    pub bin_path: Option<PathBuf>,

    /// The arguments passed to the binary.
    #[serde(default)]
    pub bin_args: Vec<String>,
}

impl AppInfo {
    /// An application with no arguments.
    pub fn new(name: impl Into<String>, bin_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            bin_path: Some(bin_path.into()),
            bin_args: Vec::new(),
        }
    }

    /// The binary followed by its arguments, ready to be joined into a shell
    /// line or passed to a command.
    pub fn invocation(&self) -> Option<Vec<String>> {
        let bin = self.bin_path.as_ref()?;

        let mut words = vec![bin.display().to_string()];
        words.extend(self.bin_args.iter().cloned());

        Some(words)
    }
}
