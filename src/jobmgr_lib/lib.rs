//! Job submission across HPC job managers, shared by `jobmgr` and
//! `mpi_detect`.

/// The system configuration and how to load it.
pub mod config;

/// Constant values.
pub mod constants;

/// The error handling for the job managers.
pub mod error;

/// Running external commands under a deadline.
pub mod exec;

/// Common file operations.
pub mod file_system;

/// The application a job starts.
pub mod app;

/// The job descriptor and its status.
pub mod job;

/// Detection of installed MPI implementations.
pub mod implem;

/// Verification of MPI install manifests.
pub mod manifest;

/// Building `mpirun` command lines.
pub mod mpi;

/// Network settings passed down to MPI.
pub mod network;

/// The job manager dispatch table: detection, scripts, submission, status.
pub mod jm;

/// Detection, submission and the pass/fail verdict in one place.
pub mod launcher;

/// colog setup for the command line tools.
pub mod logging;

/// Helper functions for testing, only compiled in test mode.
#[cfg(test)]
mod test_utils;
