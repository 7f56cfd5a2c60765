use crate::stderr;
use crate::stdout;
use crate::TestEnv;

const SQUEUE: &str = r#"if [ "$1" = "-p" ]; then
  [ "$4" = "tester" ] || exit 3
  printf 'JOBID PARTITION NAME USER\n  11 debug a tester\n  12 debug b tester\n  13 debug c tester\n'
  exit 0
fi
case "$2" in
  1) printf 'ST\nR\n' ;;
  2) printf 'ST\nPD\n' ;;
  *) echo "slurm_load_jobs error: Invalid job id specified" 1>&2; exit 1 ;;
esac"#;

#[test]
fn help_exits_cleanly() {
    let env = TestEnv::new();

    let out = env.jobmgr(&["--help"]);

    assert!(out.status.success());
    assert!(stdout(&out).contains("--job-status"));
    assert!(stdout(&out).contains("--running-jobs"));
}

#[test]
fn no_arguments_prints_help() {
    let env = TestEnv::new();

    let out = env.jobmgr(&[]);

    assert!(out.status.success());
    assert!(stdout(&out).contains("Usage"));
}

#[test]
fn statuses_through_slurm() {
    let env = TestEnv::new();
    env.install("sbatch", "exit 0");
    env.install("squeue", SQUEUE);

    let out = env.jobmgr(&["--job-status", "1,2,3"]);

    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "1: RUNNING\n2: QUEUED\n3: DONE\n");
}

#[test]
fn running_jobs_through_slurm() {
    let env = TestEnv::new();
    env.install("sbatch", "exit 0");
    env.install("squeue", SQUEUE);

    let out = env.jobmgr(&["--running-jobs", "debug"]);

    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "Number of running jobs: 3\n");
}

#[test]
fn malformed_job_id_fails() {
    let env = TestEnv::new();
    env.install("sbatch", "exit 0");
    env.install("squeue", SQUEUE);

    let out = env.jobmgr(&["--job-status", "abc"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("error:"));
    assert!(stdout(&out).is_empty());
}

#[test]
fn native_cannot_report_status() {
    let env = TestEnv::new();

    let out = env.jobmgr(&["--job-status", "1"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("not supported"));
}

#[test]
fn unknown_flag_fails() {
    let env = TestEnv::new();

    let out = env.jobmgr(&["--frobnicate"]);

    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn bad_config_file_fails() {
    let env = TestEnv::new();
    let config = env.temp_dir.path().join("jobmgr.toml");
    std::fs::write(&config, "scratch = 1\n").unwrap();

    let out = env.jobmgr(&["-c", config.to_str().unwrap(), "--job-status", "1"]);

    assert_eq!(out.status.code(), Some(1));
}
