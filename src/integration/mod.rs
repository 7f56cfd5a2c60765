//! # Integration tests for the command lines of `jobmgr` and `mpi_detect`.
//!
//! Schedulers and MPI installs are shell scripts in a temporary directory.
//! `PATH` of the binaries under test points only at that directory, so the
//! job manager they detect is the one the test set up.

mod jobmgr;
mod mpi_detect;

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use jobmgr_lib::file_system::FileOperations;
use jobmgr_lib::file_system::FileSystemInteractor;
use tempdir::TempDir;

/// The testing environment passed to individual #[test](s)
struct TestEnv {
    jobmgr_path: PathBuf,
    mpi_detect_path: PathBuf,
    temp_dir: TempDir,
    fs: FileSystemInteractor,
}

impl TestEnv {
    fn new() -> TestEnv {
        TestEnv {
            jobmgr_path: PathBuf::from(env!("CARGO_BIN_EXE_jobmgr")),
            mpi_detect_path: PathBuf::from(env!("CARGO_BIN_EXE_mpi_detect")),
            temp_dir: TempDir::new("jobmgr_integration").unwrap(),
            fs: FileSystemInteractor,
        }
    }

    /// The directory the binaries see as their whole `PATH`.
    fn bin_dir(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("path");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Put an executable shell script on the test `PATH`.
    fn install(&self, name: &str, body: &str) -> PathBuf {
        script(&self.fs, &self.bin_dir().join(name), body)
    }

    fn jobmgr(&self, args: &[&str]) -> Output {
        self.run(&self.jobmgr_path, args)
    }

    fn mpi_detect(&self, args: &[&str]) -> Output {
        self.run(&self.mpi_detect_path, args)
    }

    fn run(&self, bin: &Path, args: &[&str]) -> Output {
        Command::new(bin)
            .args(args)
            .env("PATH", self.bin_dir())
            .env("USER", "tester")
            .env("RUST_BACKTRACE", "0")
            .output()
            .unwrap()
    }
}

fn script(fs: &impl FileOperations, path: &Path, body: &str) -> PathBuf {
    fs.write_utf8_truncate(path, &format!("#!/bin/sh\n{body}\n"))
        .unwrap();
    fs.set_permissions(path, 0o755).unwrap();
    path.to_path_buf()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}
