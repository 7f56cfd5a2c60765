use anstyle::AnsiColor;
use jobmgr_lib::constants::style_from_fg;
use jobmgr_lib::constants::ERROR_STYLE;
use jobmgr_lib::constants::HELP_STYLE;
use jobmgr_lib::job::JobStatus;

/// Util function for getting the style for the CLI
pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(style_from_fg(AnsiColor::Yellow).bold())
        .header(style_from_fg(AnsiColor::Green).bold().underline())
        .literal(style_from_fg(AnsiColor::Cyan).bold())
        .invalid(style_from_fg(AnsiColor::Blue).bold())
        .error(ERROR_STYLE)
        .valid(HELP_STYLE)
        .placeholder(style_from_fg(AnsiColor::White))
}

/// One `<id>: <STATUS>` line per job.
pub fn format_statuses(ids: &[u64], statuses: &[JobStatus]) -> String {
    ids.iter()
        .zip(statuses)
        .map(|(id, status)| format!("{id}: {status}\n"))
        .collect()
}

#[cfg(test)]
#[path = "tests/printing.rs"]
mod tests;
