//! Structured CLI errors with meaningful exit codes.
//!
//! Exit code scheme:
//! - 0:  success
//! - 2:  clap arg parse error (automatic, before our code runs)
//! - 10: grid error (bad dimensions, unknown palette, unusable brushes)
//! - 11: I/O error (file read/write, snapshot)
//! - 12: input error (bad JSON params, bad catalog or trigger script)
//! - 13: serialization error

use brushgrid_core::GridError;
use std::fmt;

/// Errors produced by CLI operations, each mapped to a distinct exit code.
#[derive(Debug)]
pub enum CliError {
    /// A core error (bad dimensions, unknown palette, missing brushes).
    Grid(GridError),
    /// An I/O error (file read or write, snapshot rendering).
    Io(String),
    /// A user input error (bad JSON params, malformed catalog or script).
    Input(String),
    /// A serialization error (JSON output failure).
    Serialization(String),
}

impl CliError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Grid(_) => 10,
            CliError::Io(_) => 11,
            CliError::Input(_) => 12,
            CliError::Serialization(_) => 13,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Grid(e) => write!(f, "{e}"),
            CliError::Io(msg) => write!(f, "{msg}"),
            CliError::Input(msg) => write!(f, "{msg}"),
            CliError::Serialization(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<GridError> for CliError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::Io(msg) => CliError::Io(msg),
            GridError::InvalidColor(msg) | GridError::InvalidPalette(msg) => CliError::Input(msg),
            other => CliError::Grid(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}
