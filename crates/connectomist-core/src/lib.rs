#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Connectomist Core Library
//!
//! Wrappers, parameter files and file tools for the Connectomist/PTK suite.

pub mod config;
pub mod dwi;
pub mod error;
pub mod filetools;
pub mod literal;
pub mod manufacturer;
pub mod params;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wrapper;

// Re-exports for convenience
pub use config::{ConfigManager, Settings};
pub use dwi::{DiffusionScheme, read_bvals_bvecs};
pub use error::{Error, Result, require_files};
pub use manufacturer::Manufacturer;
pub use params::{ParamValue, ParameterSet, connectomist_flag, create_parameter_file};
pub use wrapper::{
    CommandOutput, CommandRunner, Connectomist, DEFAULT_CONNECTOMIST_PATH, ProcessRunner, Ptk,
    SUPPORTED_PTK_RELEASE,
};
