use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use tempdir::TempDir;

use super::*;
use crate::app::AppInfo;
use crate::error::job_error;
use crate::implem::ImplementationId;
use crate::implem::ImplementationInfo;
use crate::job::OutputSource;
use crate::mpi::MpiConfig;
use crate::test_utils::fake_binary;
use crate::test_utils::fake_mpi_install;
use crate::test_utils::is_date_output;
use crate::test_utils::REAL_FS;

/// `sbatch` that plays the job: writes the `--output` file and acknowledges.
const FAKE_SBATCH: &str = r#"for last; do :; done
out=$(sed -n 's/^#SBATCH --output=//p' "$last")
err=$(sed -n 's/^#SBATCH --error=//p' "$last")
echo "hello from the job" > "$out"
: > "$err"
echo "$@" > "$(dirname "$0")/sbatch.args"
echo "Submitted batch job 4242""#;

const FAKE_SQUEUE: &str = r#"if [ "$1" = "-p" ]; then
  printf 'JOBID PARTITION NAME USER\n  11 gpu a me\n  12 gpu b me\n\n'
  exit 0
fi
case "$2" in
  1) printf 'ST\nR\n' ;;
  2) printf 'ST\nPD\n' ;;
  3) echo "slurm_load_jobs error: Invalid job id specified" 1>&2; exit 1 ;;
  4) printf 'ST\n' ;;
  5) printf 'ST\nCG\n' ;;
  6) printf 'ST\nST\n' ;;
  4242) printf 'ST\nR\n' ;;
  *) echo "squeue: error: connection refused" 1>&2; exit 1 ;;
esac"#;

fn search_path(dir: &Path) -> Option<OsString> {
    Some(OsString::from(dir))
}

fn scheduler(dir: &Path) -> JobManager {
    fake_binary(dir, "sbatch", FAKE_SBATCH);
    fake_binary(dir, "squeue", FAKE_SQUEUE);
    JobManager::detect_in(search_path(dir))
}

fn scratch_config(dir: &Path) -> SystemConfig {
    let scratch = dir.join("scratch");
    std::fs::create_dir_all(&scratch).unwrap();

    SystemConfig {
        scratch_dir: scratch,
        ..Default::default()
    }
}

#[test]
fn detection_prefers_slurm() {
    let dir = TempDir::new("detect").unwrap();
    fake_binary(dir.path(), "prun", "exit 0");
    fake_binary(dir.path(), "sbatch", "exit 0");

    let jm = JobManager::detect_in(search_path(dir.path()));

    assert_eq!(jm.backend(), Backend::Slurm);
    assert_eq!(jm.bin_path(), Some(dir.path().join("sbatch").as_path()));
}

#[test]
fn detection_falls_back_to_prun() {
    let dir = TempDir::new("detect").unwrap();
    fake_binary(dir.path(), "prun", "exit 0");
    fake_binary(dir.path(), "bsub", "exit 0");
    fake_binary(dir.path(), "squeue", "exit 0");

    assert_eq!(
        JobManager::detect_in(search_path(dir.path())).backend(),
        Backend::Prun
    );
}

#[test]
fn intel_slurm_needs_squeue() {
    let dir = TempDir::new("detect").unwrap();
    fake_binary(dir.path(), "bsub", "exit 0");

    assert_eq!(
        JobManager::detect_in(search_path(dir.path())).backend(),
        Backend::Native
    );

    fake_binary(dir.path(), "squeue", "exit 0");

    assert_eq!(
        JobManager::detect_in(search_path(dir.path())).backend(),
        Backend::IntelSlurm
    );
}

#[test]
fn native_when_nothing_is_installed() {
    let dir = TempDir::new("detect").unwrap();

    let jm = JobManager::detect_in(search_path(dir.path()));

    assert_eq!(jm.backend(), Backend::Native);
    assert_eq!(jm.bin_path(), None);
}

#[test]
fn load_returns_a_new_handle() {
    let dir = TempDir::new("load").unwrap();
    let detected = scheduler(dir.path());

    let loaded = detected.load(&SystemConfig::default());

    assert!(detected.args().is_empty());
    assert_eq!(loaded.args(), ["-W"]);
    assert_eq!(loaded.backend(), detected.backend());
}

#[test]
fn handles_built_by_hand_search_path() {
    let dir = TempDir::new("new").unwrap();
    let sbatch = fake_binary(dir.path(), "sbatch", FAKE_SBATCH);

    let jm = JobManager::new(Backend::Slurm, Some(sbatch));

    assert!(jm.lookup("sh").is_ok());
    assert!(jm.lookup("definitely-not-a-scheduler").is_err());
}

#[tokio::test]
async fn handles_built_by_hand_can_query() {
    let dir = TempDir::new("new").unwrap();
    let sbatch = fake_binary(dir.path(), "sbatch", FAKE_SBATCH);
    fake_binary(dir.path(), "squeue", FAKE_SQUEUE);

    let jm = JobManager::new(Backend::Slurm, Some(sbatch))
        .with_search_path(search_path(dir.path()));

    assert_eq!(jm.job_status(&[1]).await.unwrap(), [JobStatus::Running]);
}

#[tokio::test]
async fn queries_use_the_configured_deadline() {
    let dir = TempDir::new("deadline").unwrap();
    fake_binary(dir.path(), "sbatch", FAKE_SBATCH);
    fake_binary(dir.path(), "squeue", "exec sleep 30");

    let cfg = SystemConfig {
        timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let jm = JobManager::detect_in(search_path(dir.path())).load(&cfg);

    assert_eq!(jm.query_timeout(), Duration::from_millis(300));

    let err = jm.job_status(&[1]).await.unwrap_err();
    assert!(job_error(&err).unwrap().is_timeout());

    let err = jm.num_jobs("gpu", "me").await.unwrap_err();
    assert!(job_error(&err).unwrap().is_timeout());
}

#[test]
fn backend_names() {
    assert_eq!(Backend::IntelSlurm.to_string(), "intel-slurm");
    assert_eq!("prun".parse::<Backend>().unwrap(), Backend::Prun);
    assert!("pbs".parse::<Backend>().is_err());
}

#[tokio::test]
async fn native_cannot_query() {
    let jm = JobManager::default();

    let err = jm.job_status(&[1]).await.unwrap_err();
    assert!(matches!(
        job_error(&err),
        Some(JobError::NotSupported {
            capability: "job status",
            ..
        })
    ));

    assert!(jm.num_jobs("gpu", "me").await.is_err());
    assert!(jm.post_run(&Job::default(), &REAL_FS).is_err());
}

#[tokio::test]
async fn native_runs_date() {
    let mut job = Job::new("date", AppInfo::new("date", "/bin/date"));
    job.env.insert("LC_ALL".to_string(), "C".to_string());

    let out = JobManager::default()
        .submit(&mut job, &SystemConfig::default(), &REAL_FS)
        .await
        .unwrap();

    assert!(is_date_output(&out.stdout), "got {:?}", out.stdout);
    assert_eq!(job.get_output(&REAL_FS).unwrap(), out.stdout);
    assert!(job.timestamp.is_some());
}

#[tokio::test]
async fn native_goes_through_mpirun() {
    let dir = TempDir::new("native").unwrap();
    let root = fake_mpi_install(dir.path(), &[("mpirun", "echo \"$@\"")]);

    let mut job = Job::new("hello", AppInfo::new("echo", "/bin/echo"));
    job.app.bin_args = vec!["hi".to_string()];
    job.np = 4;
    job.nnodes = 2;
    job.mpi = Some(MpiConfig::new(ImplementationInfo::new(
        ImplementationId::Mpich,
        "3.4.2",
        &root,
    )));

    let out = JobManager::default()
        .submit(&mut job, &SystemConfig::default(), &REAL_FS)
        .await
        .unwrap();

    assert_eq!(out.stdout, "-np 4 -ppn 2 /bin/echo hi\n");
}

#[tokio::test]
async fn native_needs_something_to_run() {
    let mut job = Job::new("empty", AppInfo::default());

    let err = JobManager::default()
        .submit(&mut job, &SystemConfig::default(), &REAL_FS)
        .await
        .unwrap_err();

    assert!(matches!(job_error(&err), Some(JobError::Configuration(_))));
}

#[tokio::test]
async fn prun_exports_path() {
    let dir = TempDir::new("prun").unwrap();
    fake_binary(dir.path(), "prun", "echo \"$@\"");
    let jm = JobManager::detect_in(search_path(dir.path()));

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));
    job.args = vec!["-np".to_string(), "2".to_string()];

    let out = jm
        .submit(&mut job, &SystemConfig::default(), &REAL_FS)
        .await
        .unwrap();

    assert_eq!(out.stdout, "-np 2 -x PATH /bin/hostname\n");
    assert_eq!(job.output_source(), &OutputSource::Buffers);
}

#[tokio::test]
async fn slurm_blocking_submission_reads_the_output_files() {
    let dir = TempDir::new("slurm").unwrap();
    let jm = scheduler(dir.path()).load(&SystemConfig::default());
    let cfg = scratch_config(dir.path());

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));

    let out = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap();

    assert_eq!(out.stdout, "hello from the job\n");
    assert_eq!(out.stderr, "");
    assert_eq!(job.id, Some(4242));

    let args = REAL_FS.read_utf8(&dir.path().join("sbatch.args")).unwrap();
    assert!(args.starts_with("-W "));

    let script = job.batch_script.clone().unwrap();
    assert!(script.starts_with(&cfg.scratch_dir));
    job.cleanup(&REAL_FS).unwrap();
    assert!(!script.exists());
}

#[tokio::test]
async fn slurm_non_blocking_then_poll() {
    let dir = TempDir::new("slurm").unwrap();
    let jm = scheduler(dir.path()).load(&SystemConfig::default());
    let cfg = scratch_config(dir.path());

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));
    job.non_blocking = true;

    let out = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap();
    assert_eq!(out.stdout, "Submitted batch job 4242\n");

    let args = REAL_FS.read_utf8(&dir.path().join("sbatch.args")).unwrap();
    assert!(!args.contains("-W"));

    let status = jm.job_status(&[job.id.unwrap()]).await.unwrap();
    assert_eq!(status, [JobStatus::Running]);

    let collected = jm.post_run(&job, &REAL_FS).unwrap();
    assert_eq!(collected.stdout, "hello from the job\n");
}

#[tokio::test]
async fn slurm_checks_before_running_anything() {
    let dir = TempDir::new("slurm").unwrap();
    fake_binary(dir.path(), "sbatch", "touch \"$(dirname \"$0\")/ran\"");
    let jm = JobManager::detect_in(search_path(dir.path()));
    let cfg = scratch_config(dir.path());

    let mut job = Job::new("nothing", AppInfo::default());

    let err = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap_err();

    assert!(matches!(job_error(&err), Some(JobError::Configuration(_))));
    assert!(!dir.path().join("ran").exists());
    assert!(job.batch_script.is_none());
}

#[tokio::test]
async fn slurm_needs_a_scratch_directory() {
    let dir = TempDir::new("slurm").unwrap();
    let jm = scheduler(dir.path());
    let cfg = SystemConfig {
        scratch_dir: dir.path().join("missing"),
        ..Default::default()
    };

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));

    let err = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap_err();
    assert!(matches!(job_error(&err), Some(JobError::Configuration(_))));
}

#[tokio::test]
async fn slurm_needs_its_binary() {
    let dir = TempDir::new("slurm").unwrap();
    let jm = JobManager::new(Backend::Slurm, Some(dir.path().join("sbatch")));
    let cfg = scratch_config(dir.path());

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));

    let err = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap_err();
    assert!(matches!(job_error(&err), Some(JobError::Configuration(_))));
}

#[tokio::test]
async fn malformed_acknowledgment_is_a_parse_error() {
    let dir = TempDir::new("slurm").unwrap();
    fake_binary(dir.path(), "sbatch", "echo 'sbatch: queued, maybe'");
    let jm = JobManager::detect_in(search_path(dir.path()));
    let cfg = scratch_config(dir.path());

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));
    job.non_blocking = true;

    let err = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap_err();

    match job_error(&err) {
        Some(JobError::Parse { raw, .. }) => assert_eq!(raw, "sbatch: queued, maybe\n"),
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert_eq!(job.id, None);
}

#[tokio::test]
async fn statuses_map_to_the_closed_set() {
    let dir = TempDir::new("squeue").unwrap();
    let jm = scheduler(dir.path());

    let status = jm.job_status(&[1, 2, 3, 4, 5, 6]).await.unwrap();

    assert_eq!(
        status,
        [
            JobStatus::Running,
            JobStatus::Queued,
            JobStatus::Done,
            JobStatus::Done,
            JobStatus::Unknown,
            JobStatus::Stopped,
        ]
    );
}

#[tokio::test]
async fn sacct_tells_completed_from_stopped() {
    let dir = TempDir::new("squeue").unwrap();
    let jm = scheduler(dir.path());
    fake_binary(dir.path(), "sacct", "echo '  COMPLETED '");

    assert_eq!(jm.job_status(&[6]).await.unwrap(), [JobStatus::Done]);

    fake_binary(dir.path(), "sacct", "echo ' CANCELLED by 1000'");

    assert_eq!(jm.job_status(&[6]).await.unwrap(), [JobStatus::Stopped]);
}

#[tokio::test]
async fn squeue_failures_surface() {
    let dir = TempDir::new("squeue").unwrap();
    let jm = scheduler(dir.path());

    let err = jm.job_status(&[1, 99]).await.unwrap_err();

    assert!(matches!(job_error(&err), Some(JobError::Execution { .. })));
}

#[tokio::test]
async fn counts_running_jobs() {
    let dir = TempDir::new("squeue").unwrap();
    let jm = scheduler(dir.path());

    assert_eq!(jm.num_jobs("gpu", "me").await.unwrap(), 2);
}

#[tokio::test]
async fn intel_slurm_submits_through_bsub() {
    let dir = TempDir::new("intel").unwrap();
    fake_binary(dir.path(), "bsub", FAKE_SBATCH);
    fake_binary(dir.path(), "squeue", FAKE_SQUEUE);
    let jm = JobManager::detect_in(search_path(dir.path())).load(&SystemConfig::default());
    let cfg = scratch_config(dir.path());

    assert_eq!(jm.backend(), Backend::IntelSlurm);

    let mut job = Job::new("hello", AppInfo::new("hostname", "/bin/hostname"));
    let out = jm.submit(&mut job, &cfg, &REAL_FS).await.unwrap();

    assert_eq!(out.stdout, "hello from the job\n");
    assert_eq!(jm.job_status(&[4242]).await.unwrap(), [JobStatus::Running]);
}
