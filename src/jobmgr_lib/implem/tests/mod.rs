use std::ffi::OsString;

use tempdir::TempDir;

use super::*;
use crate::error::job_error;
use crate::network::NetworkConfig;
use crate::test_utils::fake_binary;
use crate::test_utils::fake_mpi_install;

const MPICH_342: &str = "HYDRA build details:
    Version:                                 3.4.2
    Release Date:                            Wed May 26 15:51:40 CDT 2021
    CC:                              gcc
";

const MPICH_40B1: &str = "HYDRA build details:
    Version:                                 4.0b1
    Release Date:                            Fri Jul 16 12:22:37 CDT 2021
";

#[test]
fn mpich_banners() {
    assert_eq!(mpich::parse_version(MPICH_342).unwrap(), "3.4.2");
    assert_eq!(mpich::parse_version(MPICH_40B1).unwrap(), "4.0b1");
}

#[test]
fn mpich_banner_without_version_line() {
    let err = mpich::parse_version("HYDRA build details:\n").unwrap_err();
    assert!(matches!(job_error(&err), Some(JobError::Parse { .. })));
}

#[test]
fn openmpi_banners() {
    assert_eq!(
        openmpi::parse_version("Open MPI v3.0.4\n\nhttp://www.open-mpi.org/community/help/\n")
            .unwrap(),
        "3.0.4"
    );
    assert_eq!(
        openmpi::parse_version("mpirun (Open MPI) 4.1.1\n\nReport bugs to ...\n").unwrap(),
        "4.1.1"
    );
    assert!(openmpi::parse_version(MPICH_342).is_err());
}

#[test]
fn mvapich2_banners() {
    assert_eq!(
        mvapich2::parse_version("MVAPICH2 Version:       2.3.7\n").unwrap(),
        "2.3.7"
    );
    assert_eq!(mvapich2::parse_version("mvapich2-2.3.6\n").unwrap(), "2.3.6");
    assert_eq!(mvapich2::parse_version("\n").unwrap(), "0.0.0");
    assert_eq!(mvapich2::parse_version("").unwrap(), "0.0.0");
}

#[test]
fn mvapich2_rejects_plain_mpich() {
    assert!(mvapich2::parse_version("MPICH Version:    \t3.4.2\n").is_err());
}

#[test]
fn implementation_ids() {
    assert_eq!(ImplementationId::OpenMpi.to_string(), "openmpi");
    assert_eq!(
        "mvapich2".parse::<ImplementationId>().unwrap(),
        ImplementationId::Mvapich2
    );
    assert!("lam".parse::<ImplementationId>().is_err());
}

#[test]
fn extra_args_per_implementation() {
    let net = NetworkConfig {
        device: Some("mlx5_0:1".to_string()),
    };

    assert_eq!(
        openmpi::mpirun_args(&net),
        [
            "--mca",
            "btl",
            "^openib",
            "--mca",
            "pml",
            "ucx",
            "-x",
            "UCX_NET_DEVICES=mlx5_0:1"
        ]
    );
    assert_eq!(openmpi::mpirun_args(&NetworkConfig::default()).len(), 6);
    assert!(mpich::mpirun_args().is_empty());
    assert_eq!(
        mvapich2::mpirun_args()[..3],
        ["-genv", "MV2_HOMOGENEOUS_CLUSTER", "1"]
    );
    assert_eq!(mvapich2::mpirun_args().len(), 12);
}

#[tokio::test]
async fn detects_mpich_install() {
    let dir = TempDir::new("mpich").unwrap();
    let root = fake_mpi_install(
        dir.path(),
        &[("mpirun", &format!("cat <<'BANNER'\n{MPICH_342}BANNER"))],
    );

    let info = detect_from_dir(&root).await.unwrap();

    assert_eq!(info.id(), ImplementationId::Mpich);
    assert_eq!(info.version(), "3.4.2");
    assert_eq!(info.install_dir(), root.as_path());
}

#[tokio::test]
async fn detects_openmpi_install() {
    let dir = TempDir::new("ompi").unwrap();
    let root = fake_mpi_install(
        dir.path(),
        &[
            ("ompi_info", "echo 'Open MPI v4.1.5'"),
            ("mpirun", "echo 'mpirun (Open MPI) 4.1.5'"),
        ],
    );

    let info = detect_from_dir(&root).await.unwrap();

    assert_eq!(info.to_string(), "openmpi 4.1.5");
}

#[tokio::test]
async fn mvapich2_wins_over_mpich() {
    let dir = TempDir::new("mv2").unwrap();
    let root = fake_mpi_install(
        dir.path(),
        &[
            ("mpichversion", "echo 'MVAPICH2 Version:       2.3.7'"),
            ("mpirun", &format!("cat <<'BANNER'\n{MPICH_342}BANNER")),
        ],
    );

    let info = detect_from_dir(&root).await.unwrap();

    assert_eq!(info.id(), ImplementationId::Mvapich2);
    assert_eq!(info.version(), "2.3.7");
}

#[tokio::test]
async fn plain_mpich_falls_through_mvapich2() {
    let dir = TempDir::new("mpich").unwrap();
    let root = fake_mpi_install(
        dir.path(),
        &[
            ("mpichversion", "echo 'MPICH Version:    3.4.2'"),
            ("mpirun", &format!("cat <<'BANNER'\n{MPICH_40B1}BANNER")),
        ],
    );

    let info = detect_from_dir(&root).await.unwrap();

    assert_eq!(info.id(), ImplementationId::Mpich);
    assert_eq!(info.version(), "4.0b1");
}

#[tokio::test]
async fn detection_is_idempotent() {
    let dir = TempDir::new("mpich").unwrap();
    let root = fake_mpi_install(
        dir.path(),
        &[("mpirun", &format!("cat <<'BANNER'\n{MPICH_342}BANNER"))],
    );

    let first = detect_from_dir(&root).await.unwrap();
    let second = detect_from_dir(&root).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_dir_is_not_mpi() {
    let dir = TempDir::new("nothing").unwrap();

    let err = detect_from_dir(dir.path()).await.unwrap_err();

    assert!(matches!(job_error(&err), Some(JobError::Detection(_))));
    assert!(!is_mpi(None));
}

#[tokio::test]
async fn probes_see_the_install_path() {
    let dir = TempDir::new("env").unwrap();
    let root = fake_mpi_install(dir.path(), &[("mpirun", "echo \"$PATH\"")]);

    let out = probe(&root, "mpirun", &[]).await.unwrap();

    assert!(out.starts_with(&root.join("bin").display().to_string()));
}

#[tokio::test]
async fn detect_uses_the_search_path() {
    let dir = TempDir::new("path").unwrap();
    let root = fake_mpi_install(
        &dir.path().join("mpich-3.4.2"),
        &[("mpirun", &format!("cat <<'BANNER'\n{MPICH_342}BANNER"))],
    );

    let info = detect_in(Some(OsString::from(root.join("bin"))))
        .await
        .unwrap();

    assert_eq!(info.id(), ImplementationId::Mpich);
    assert!(is_mpi(Some(&info)));
}

#[tokio::test]
async fn detect_requires_a_bin_directory() {
    let dir = TempDir::new("path").unwrap();
    let tools = dir.path().join("tools");
    std::fs::create_dir_all(&tools).unwrap();
    fake_binary(&tools, "mpirun", "exit 0");

    let err = detect_in(Some(OsString::from(&tools))).await.unwrap_err();

    assert!(matches!(job_error(&err), Some(JobError::Detection(_))));
}
