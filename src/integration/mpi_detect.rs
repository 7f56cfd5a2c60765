use std::fs;

use crate::script;
use crate::stderr;
use crate::stdout;
use crate::TestEnv;

/// Only shell builtins, `PATH` holds nothing else.
const HYDRA: &str = "echo 'HYDRA build details:'
echo '    Version:                                 3.4.2'
echo '    Release Date:                            Wed May 26 15:51:40 CDT 2021'";

fn mpich_install(env: &TestEnv) -> std::path::PathBuf {
    let root = env.temp_dir.path().join("mpich-3.4.2");
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("lib")).unwrap();
    script(&env.fs, &root.join("bin/mpirun"), HYDRA);
    root
}

#[test]
fn detects_an_install_directory() {
    let env = TestEnv::new();
    let root = mpich_install(&env);

    let out = env.mpi_detect(&["--dir", root.to_str().unwrap()]);

    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "Detected MPI:\nmpich 3.4.2\n");
}

#[test]
fn detects_openmpi_without_ompi_info() {
    let env = TestEnv::new();
    let root = env.temp_dir.path().join("ompi");
    fs::create_dir_all(root.join("bin")).unwrap();
    script(
        &env.fs,
        &root.join("bin/mpirun"),
        "echo 'mpirun (Open MPI) 4.1.5'",
    );

    let out = env.mpi_detect(&["--dir", root.to_str().unwrap()]);

    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "Detected MPI:\nopenmpi 4.1.5\n");
}

#[test]
fn empty_directory_fails() {
    let env = TestEnv::new();

    let out = env.mpi_detect(&["--dir", env.temp_dir.path().to_str().unwrap()]);

    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("no supported MPI implementation"));
}

#[test]
fn no_mpirun_in_path_fails() {
    let env = TestEnv::new();

    let out = env.mpi_detect(&[]);

    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("mpirun not found"));
}

#[test]
fn verbosity_is_capped_like_jobmgr() {
    let env = TestEnv::new();
    let root = mpich_install(&env);

    let out = env.mpi_detect(&["-vvv", "--dir", root.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Only two levels of verbosity"));

    let out = env.jobmgr(&["-vvv", "--job-status", "1"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Only two levels of verbosity"));
}
