use std::path::Path;

use anyhow::Result;
use log::debug;
use log::trace;
use sha2::Digest;
use sha2::Sha256;

use crate::error::JobError;
use crate::file_system::FileOperations;

/// One line of a manifest: a file relative to the manifest's directory and
/// the SHA-256 digest it should have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the install root.
    pub path: String,

    /// Lowercase hex digest.
    pub sha256: String,
}

/// Parse manifest text, `<relative path>: <sha256>` per line.
///
/// Blank lines and `#` comments are skipped.
pub fn parse(manifest: &Path, text: &str) -> Result<Vec<ManifestEntry>, JobError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| -> Result<ManifestEntry, JobError> {
            let (path, digest) = line.rsplit_once(':').ok_or_else(|| JobError::Integrity {
                manifest: manifest.to_path_buf(),
                reason: format!("malformed line {line:?}"),
            })?;

            Ok(ManifestEntry {
                path: path.trim().to_string(),
                sha256: digest.trim().to_ascii_lowercase(),
            })
        })
        .collect()
}

/// Hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Verify every file listed in `manifest` against its digest.
///
/// Paths are resolved against the directory holding the manifest.
pub fn check(manifest: &Path, fs: &impl FileOperations) -> Result<()> {
    let integrity = |reason: String| JobError::Integrity {
        manifest: manifest.to_path_buf(),
        reason,
    };

    if !fs.exists(manifest) {
        return Err(integrity("the manifest does not exist".to_string()).into());
    }

    let root = manifest.parent().unwrap_or(Path::new("."));
    let text = fs
        .read_utf8(manifest)
        .map_err(|e| integrity(format!("unreadable: {e:#}")))?;
    let entries = parse(manifest, &text)?;

    debug!("Checking {} files listed in {:?}", entries.len(), manifest);

    for entry in entries {
        let file = root.join(&entry.path);
        let bytes = fs
            .read_bytes(&file)
            .map_err(|_| integrity(format!("{} is missing", entry.path)))?;

        let actual = digest(&bytes);
        trace!("{:?}: {}", file, actual);

        if actual != entry.sha256 {
            return Err(integrity(format!(
                "{} has digest {actual}, expected {}",
                entry.path, entry.sha256
            ))
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/manifest.rs"]
mod tests;
