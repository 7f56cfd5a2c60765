use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::ERROR_STYLE;
use crate::constants::HELP_STYLE;

/// The error context structure, provides an explanation and help.
///
/// The first element of the structure is the error's "context".
/// The second element is the help message displayed to the user.
///
/// Both have to implement [Display], and will be displayed when the error is
/// printed.
///
/// # Example
///
/// ```should_panic
/// # use jobmgr_lib::error::Ctx;
/// # use anyhow::anyhow;
/// # use anyhow::Result;
/// # use anyhow::Context;
/// # fn main() -> Result<()> {
/// Err(anyhow!("Any struct implementing std::error::Error")).context(Ctx("context", "help"))
/// # }
/// ```
#[derive(Debug)]
pub struct Ctx<A, B>(pub A, pub B)
where
    A: Display,
    B: Display;

impl<A: Display, B: Display> Display for Ctx<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !format!("{}", self.0).is_empty() {
            writeln!(f, "{}caused by:{:#} {}", ERROR_STYLE, ERROR_STYLE, self.0)?;
        }

        if !format!("{}", self.1).is_empty() {
            writeln!(f, "\n{}help:{:#} {}", HELP_STYLE, HELP_STYLE, self.1)?;
        }

        Ok(())
    }
}

/// This is a shorthand for returning the context of a error.
///
/// A macro invocation like so:
/// ```ignore
/// ctx!([context], [context arg 1], [context arg 2], ...; [help], [help args], ...)
/// ```
/// Will desugar to:
/// ```ignore
/// || Ctx(format!([context], [context args]), format!([help], [help args]))
/// ```
///
/// Note the placement of the `;` and `,`. They are required and otherwise the
/// macro will not parse.
///
/// ```no_run
/// # use jobmgr_lib::error::Ctx;
/// # use jobmgr_lib::ctx;
/// # use std::path::PathBuf;
/// # use anyhow::Context;
/// # let path: PathBuf = "/".parse().unwrap();
/// std::fs::read(&path).with_context(ctx!(
///   "Could not read the file {path:?}", ;
///   "Ensure that the file exists and you have permissions to access it",
/// ));
/// ```
#[macro_export]
macro_rules! ctx {
    {$cause: expr,  $($arg_cause: expr)*; $help: expr, $($arg_help: tt)*} => {
      || $crate::error::Ctx(format!($cause, $($arg_cause)*), format!($help, $($arg_help)*))
    };
}

/// This is a shorthand for the [anyhow::bail] macro, now with context.
///
/// ```no_run
/// # use jobmgr_lib::error::Ctx;
/// # use jobmgr_lib::bailc;
/// # use anyhow::Context;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// bailc!("Something", ; "Something", ; "Help", );
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! bailc {
    {$text: expr,  $($arg_text: expr)*; $cause: expr,  $($arg_cause: expr)*; $help: expr, $($arg_help: tt)*} => {
        return Err(anyhow::anyhow!($text, $($arg_text)*)).with_context($crate::error::ctx!($cause, $($arg_cause)*; $help, $($arg_help)*));
    };
    {$text: expr $(,$arg_text: expr)*} => {
        return Err(anyhow::anyhow!($text, $($arg_text)*)).with_context($crate::error::ctx!("",;"",));
    };
}

pub use ctx;

/// The kinds of failure a job manager operation can end in.
///
/// These travel as the root cause of an [anyhow::Error], so callers that need
/// to branch on the kind can `downcast_ref::<JobError>()` while the usual
/// context/help chain is still printed for users.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JobError {
    /// The caller or the system configuration is missing something the
    /// operation needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Nothing usable was detected on this host.
    #[error("detection failure: {0}")]
    Detection(String),

    /// Some tool printed text we do not understand.
    #[error("could not parse {what}: {raw:?}")]
    Parse {
        /// What we were trying to read.
        what: String,

        /// The offending text, verbatim.
        raw: String,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed with exit code {code:?}")]
    Execution {
        /// The command line that was run.
        command: String,

        /// The exit code, if the process exited normally.
        code: Option<i32>,

        /// Captured standard output.
        stdout: String,

        /// Captured standard error.
        stderr: String,
    },

    /// An external command was killed because it ran past its deadline.
    #[error("`{command}` did not complete within {}", humantime::format_duration(*.timeout))]
    Timeout {
        /// The command line that was run.
        command: String,

        /// The deadline that was exceeded.
        timeout: Duration,

        /// Standard output captured before the process was killed.
        stdout: String,

        /// Standard error captured before the process was killed.
        stderr: String,
    },

    /// The install manifest does not match what is on disk.
    #[error("integrity check of {manifest:?} failed: {reason}")]
    Integrity {
        /// The manifest that was checked.
        manifest: PathBuf,

        /// What did not match.
        reason: String,
    },

    /// The backend does not implement this capability.
    #[error("{capability} is not supported by the {backend} job manager")]
    NotSupported {
        /// The job manager that was asked.
        backend: String,

        /// The capability that was requested.
        capability: &'static str,
    },
}

impl JobError {
    /// Create a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a detection error with the given message.
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Create a parse error for `raw`.
    pub fn parse(what: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            raw: raw.into(),
        }
    }

    /// The output captured from the failing process, if any.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Execution { stdout, stderr, .. } | Self::Timeout { stdout, stderr, .. } => {
                Some((stdout, stderr))
            }
            _ => None,
        }
    }

    /// True if this is the deadline variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Find the [JobError] at the bottom of an error chain, if there is one.
pub fn job_error(err: &anyhow::Error) -> Option<&JobError> {
    err.chain().find_map(|e| e.downcast_ref::<JobError>())
}

#[cfg(test)]
#[path = "tests/error.rs"]
mod tests;
