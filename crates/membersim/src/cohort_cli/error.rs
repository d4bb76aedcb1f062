//! Error types for the cohort CLI.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::error::{CohortError, ConstraintsError};

/// Errors surfaced by CLI parsing and cohort runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CliError {
    /// The cohort size was not supplied.
    #[error("missing required flag: --count")]
    MissingCount,
    /// A flag expected a value but none was provided.
    #[error("missing value for {flag}")]
    MissingValue {
        /// Flag that was missing its value.
        flag: &'static str,
    },
    /// An unsupported argument was supplied.
    #[error("unknown argument: {value}")]
    UnknownArgument {
        /// Argument value that was not recognised.
        value: String,
    },
    /// A numeric value failed to parse.
    #[error("invalid number for {flag}: '{value}' ({message})")]
    InvalidNumber {
        /// Flag associated with the invalid number.
        flag: &'static str,
        /// Raw value supplied for the flag.
        value: String,
        /// Parser error message.
        message: String,
    },
    /// The constraints file could not be loaded.
    #[error("constraints error: {source}")]
    Constraints {
        /// Underlying loading error.
        #[from]
        #[source]
        source: ConstraintsError,
    },
    /// The generator rejected the constraints.
    #[error("cohort error: {source}")]
    Cohort {
        /// Underlying construction error.
        #[from]
        #[source]
        source: CohortError,
    },
    /// A member could not be serialised.
    #[error("failed to serialise member: {message}")]
    Serialize {
        /// Serialiser error message.
        message: String,
    },
    /// The output file could not be written.
    #[error("failed to write cohort to '{path}': {message}")]
    WriteError {
        /// Output path.
        path: Utf8PathBuf,
        /// Description of the I/O error.
        message: String,
    },
    /// Writing to the output stream failed.
    #[error("failed to write cohort output: {message}")]
    OutputError {
        /// Description of the I/O error.
        message: String,
    },
}
