use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::trace;

use crate::error::ctx;

/// Interactor with the actual physical file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSystemInteractor;

/// This defines all interactions of the job managers with the filesystem.
pub trait FileOperations {
    /// Read a file into raw bytes.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read a file into a utf8 string.
    fn read_utf8(&self, path: &Path) -> Result<String>;

    /// Write all bytes to a file, replacing what was there.
    fn write_bytes_truncate(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Write a [String] to a file.
    fn write_utf8_truncate(&self, path: &Path, data: &str) -> Result<()> {
        self.write_bytes_truncate(path, data.as_bytes())
    }

    /// Change the permission bits of a file.
    fn set_permissions(&self, path: &Path, perms: u32) -> Result<()>;

    /// Remove a file if it is there.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Whether `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

impl FileOperations for FileSystemInteractor {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(ctx!(
          "Could not read the file {path:?}", ;
          "Ensure that the file exists and you have permissions to access it",
        ))
    }

    fn read_utf8(&self, path: &Path) -> Result<String> {
        String::from_utf8(self.read_bytes(path)?).with_context(ctx!(
          "{path:?} is not valid UTF-8", ;
          "The file doesn't seem to be human readable?",
        ))
    }

    fn write_bytes_truncate(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating directories for {:?}", parent);

                fs::create_dir_all(parent).with_context(ctx!(
                  "Could not create parent directories for {parent:?}", ;
                  "Ensure that you have sufficient permissions",
                ))?;
            }
        }

        trace!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, bytes).with_context(ctx!(
          "Could not write to the file {path:?}", ;
          "Ensure that you have permissions to write it",
        ))
    }

    fn set_permissions(&self, path: &Path, perms: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, Permissions::from_mode(perms)).with_context(ctx!(
              "Could not change the permissions of {path:?} to {perms:o}", ;
              "Ensure that you have sufficient permissions",
            ))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, perms);
            Ok(())
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        debug!("Removing {:?}", path);
        fs::remove_file(path).with_context(ctx!(
          "Unable to delete {path:?}", ;
          "Ensure that you have sufficient permissions",
        ))
    }
}

#[cfg(test)]
#[path = "tests/file_system.rs"]
mod tests;
