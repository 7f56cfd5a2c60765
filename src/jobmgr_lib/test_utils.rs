use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;

use crate::file_system::FileOperations;
use crate::file_system::FileSystemInteractor;

pub const REAL_FS: FileSystemInteractor = FileSystemInteractor;

/// A file system where every operation fails.
pub struct EmptyFilesystem;

impl FileOperations for EmptyFilesystem {
    fn read_bytes(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        bail!("File not found: {path:?}")
    }

    fn read_utf8(&self, path: &Path) -> anyhow::Result<String> {
        bail!("File not found: {path:?}")
    }

    fn write_bytes_truncate(&self, _: &Path, _: &[u8]) -> anyhow::Result<()> {
        bail!("Read-only file system")
    }

    fn set_permissions(&self, _: &Path, _: u32) -> anyhow::Result<()> {
        bail!("Read-only file system")
    }

    fn remove_file(&self, _: &Path) -> anyhow::Result<()> {
        bail!("Read-only file system")
    }
}

/// Write an executable shell script called `name` into `dir`.
///
/// Used to stand in for `sbatch`, `squeue`, `ompi_info` and friends.
pub fn fake_binary(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    REAL_FS
        .write_utf8_truncate(&path, &format!("#!/bin/sh\n{body}\n"))
        .unwrap();
    REAL_FS.set_permissions(&path, 0o755).unwrap();
    path
}

/// A fake MPI install rooted at `root` whose `bin/` holds the given scripts.
pub fn fake_mpi_install(root: &Path, binaries: &[(&str, &str)]) -> PathBuf {
    let bin = root.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::create_dir_all(root.join("lib")).unwrap();

    for (name, body) in binaries {
        fake_binary(&bin, name, body);
    }

    root.to_path_buf()
}

/// True if `output` starts like the output of `date`.
pub fn is_date_output(output: &str) -> bool {
    matches!(
        output.split(' ').next(),
        Some("Mon" | "Tue" | "Wed" | "Thu" | "Fri" | "Sat" | "Sun")
    )
}
