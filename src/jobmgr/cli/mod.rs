/// CLI Definition.
pub mod def;

/// Main processing module.
pub mod process;

/// Styling of the help output.
pub mod printing;
