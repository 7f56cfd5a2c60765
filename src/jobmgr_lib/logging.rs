use anstyle::AnsiColor;
use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use colog::default_builder;
use colog::format::CologStyle;
use colog::formatter;
use log::Level;
use log::LevelFilter;

use crate::constants::style_from_fg;
use crate::error::ctx;

/// Level prefixes for `colog`, shared by `jobmgr` and `mpi_detect`.
#[derive(Debug, Clone, Copy)]
pub struct LogTokens;

fn color_of(level: Level) -> AnsiColor {
    match level {
        Level::Error => AnsiColor::Red,
        Level::Warn => AnsiColor::Yellow,
        Level::Info => AnsiColor::Green,
        Level::Debug => AnsiColor::Blue,
        Level::Trace => AnsiColor::Magenta,
    }
}

impl CologStyle for LogTokens {
    fn level_token(&self, level: &Level) -> &str {
        match *level {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }

    fn prefix_token(&self, level: &Level) -> String {
        let token = self.level_token(level);
        format!("[{}]", self.level_color(level, token))
    }

    fn level_color(&self, level: &Level, msg: &str) -> String {
        let style = style_from_fg(color_of(*level));
        format!("{style}{msg}{style:#}")
    }
}

/// The log level for a `-v` count.
pub fn level_filter(verbose: u8) -> Result<LevelFilter> {
    match verbose {
        0 => Ok(LevelFilter::Warn),
        1 => Ok(LevelFilter::Debug),
        2 => Ok(LevelFilter::Trace),
        _ => Err(anyhow!("Only two levels of verbosity supported (ie. -vv)")),
    }
}

/// Install colog with [LogTokens] at the level `verbose` asks for.
pub fn setup_logging(verbose: u8) -> Result<()> {
    let mut log_build = default_builder();
    log_build.format(formatter(LogTokens));
    log_build.filter(None, level_filter(verbose)?);

    log_build.try_init().with_context(ctx!(
      "Failed to initialize the command line interface", ;
      "Make sure you are using a supported terminal",
    ))
}

#[cfg(test)]
#[path = "tests/logging.rs"]
mod tests;
