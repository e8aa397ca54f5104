//! Error types for the Connectomist wrappers.

use std::path::{Path, PathBuf};

use crate::manufacturer::Manufacturer;

/// Errors raised while preparing or running Connectomist and PTK commands.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The Connectomist executable or a PTK tool cannot be found.
    #[error("Connectomist command '{command}' not found.")]
    CommandNotFound {
        /// The command that could not be resolved
        command: String,
    },

    /// A wrapped command exited with a non-zero status.
    #[error(
        "Connectomist call for '{algorithm}' failed, with parameters: '{command}'. \
         Error:: STDOUT\n----\n{stdout}\nSTDERR\n----\n{stderr}."
    )]
    Runtime {
        /// Connectomist tab name, or "PTK" for the command line tools
        algorithm: String,
        /// The full command line that was executed
        command: String,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The manufacturer name is not one of the supported scanners.
    #[error("Incorrect manufacturer name: '{name}', should be in {{{}}}.", Manufacturer::names().join(", "))]
    BadManufacturer {
        /// The rejected name
        name: String,
    },

    /// A manufacturer-specific parameter was not provided.
    #[error("Missing parameters for '{algorithm}': {parameters:?}.")]
    MissingParameters {
        /// Connectomist tab name
        algorithm: String,
        /// Names of the missing parameters
        parameters: Vec<String>,
    },

    /// An input file is missing or its content cannot be interpreted.
    #[error("Missing or corrupted file: '{}'.", .path.display())]
    BadFile {
        /// Path of the offending file
        path: PathBuf,
    },

    /// An option value is not supported by the wrapped tool.
    #[error("Validation error: {message}")]
    Validation {
        /// Option that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A Python literal file could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line of the failure
        line: usize,
        /// What was expected
        message: String,
    },

    /// I/O error on a known path
    #[error("I/O error on '{}': {source}", .path.display())]
    IoPath {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error (process spawning, pipes, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type alias for Connectomist operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether the error comes from the caller's inputs rather than
    /// from the toolkit or the filesystem.
    pub fn is_user_error(&self) -> bool {
        match self {
            Error::BadManufacturer { .. } => true,
            Error::MissingParameters { .. } => true,
            Error::Validation { .. } => true,
            Error::Config { .. } => true,
            Error::BadFile { .. } => true,
            Error::CommandNotFound { .. } => false,
            Error::Runtime { .. } => false,
            Error::Parse { .. } => false,
            Error::IoPath { .. } => false,
            Error::Io(_) => false,
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a missing-or-corrupted file error.
    pub fn bad_file<P: AsRef<Path>>(path: P) -> Self {
        Error::BadFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Wraps an I/O error with the path it happened on.
    pub fn io_with_path<P: AsRef<Path>>(source: std::io::Error, path: P) -> Self {
        Error::IoPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Fails with [`Error::BadFile`] unless every path is an existing file.
pub fn require_files<I, P>(paths: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for path in paths {
        if !path.as_ref().is_file() {
            return Err(Error::bad_file(path));
        }
    }
    Ok(())
}
