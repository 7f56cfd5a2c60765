use std::time::Duration;

use anstyle::AnsiColor;
use anstyle::Color;
use anstyle::Style;

/// Create a style with a defined foreground color.
pub const fn style_from_fg(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

/// The styling for the program name.
pub const PRIMARY_STYLE: Style = style_from_fg(AnsiColor::Green).bold();

/// The styling for error messages.
pub const ERROR_STYLE: Style = style_from_fg(AnsiColor::Red).bold().blink();

/// The styling for help messages.
pub const HELP_STYLE: Style = style_from_fg(AnsiColor::Green).bold().underline();

/// How long an external command may run before it is killed.
pub const CMD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Wall time requested when a job does not specify one.
pub const DEFAULT_WALLTIME: Duration = Duration::from_secs(30 * 60);

/// Ranks and nodes used by the launcher when the caller gave neither.
pub const DEFAULT_NP: usize = 2;

/// See [DEFAULT_NP].
pub const DEFAULT_NNODES: usize = 2;

/// The directive prefix of Slurm batch scripts.
pub const SBATCH_DIRECTIVE: &str = "#SBATCH";

/// What `sbatch` prints once a job is queued.
pub const SLURM_JOB_ID_PREFIX: &str = "Submitted batch job ";

/// Flag asking `sbatch` to wait for the job to terminate.
pub const SLURM_WAIT_FLAG: &str = "-W";

/// `squeue` stderr when the job already left the queue.
pub const SLURM_INVALID_JOB_ID: &str = "invalid job id";

/// Prefix of generated batch script names.
pub const BATCH_SCRIPT_PREFIX: &str = "sbatch-";

/// The file name of the manifest of an MPI installation.
pub const MPI_MANIFEST: &str = "mpi.MANIFEST";

/// Version reported for MVAPICH2 installs with an empty banner.
pub const MVAPICH2_DEFAULT_VERSION: &str = "0.0.0";

/// The default scratch directory.
pub const SCRATCH_DEFAULT: fn() -> std::path::PathBuf = std::env::temp_dir;

/// The default command deadline.
pub const TIMEOUT_DEFAULT: fn() -> Duration = || CMD_TIMEOUT;
