#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Connectomist Preprocessing
//!
//! One module per preprocessing tab, and the pipeline chaining them.

pub mod eddy;
pub mod mask;
pub mod outliers;
pub mod pipeline;
pub mod qc;
pub mod qspace;
pub mod registration;
pub mod susceptibility;

// Re-exports for convenience
pub use eddy::{
    PreprocessedDwi, eddy_and_motion_correction, export_eddy_motion_results_to_nifti,
};
pub use mask::{MaskStrategy, RoughMaskOptions, rough_mask_extraction};
pub use outliers::outlying_slice_detection;
pub use pipeline::{
    PreprocessingOutputs, PreprocessingRequest, QcReport, STEPS, complete_preprocessing,
};
pub use qc::{QcDirectories, qc_reporting};
pub use qspace::{DwiInputs, InvertAxes, data_import_and_qspace_sampling};
pub use registration::{AffineRegistration, dwi_to_anatomy};
pub use susceptibility::{SusceptibilityOptions, susceptibility_correction};
