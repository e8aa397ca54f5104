#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Connectomist Tractography
//!
//! One module per tab run on a preprocessed subject, and the pipelines
//! chaining them.

mod choice;
pub mod clustering;
pub mod labeling;
pub mod mask;
pub mod model;
pub mod pipeline;
pub mod tracking;

// Re-exports for convenience
pub use clustering::{
    ClusterCentroid, ClusteringInputs, ClusteringOptions, RoiSelection, SubjectType,
    intrasubject_fiber_clustering,
};
pub use labeling::{
    Atlas, BUNDLE_NAMES, LabelingOptions, export_bundles_to_trk, fast_bundle_labeling,
};
pub use mask::{TractographyMaskOptions, export_mask_to_nifti, tractography_mask};
pub use model::{
    DiffusionScalars, DtiEstimator, LocalModel, ModelOptions, SdKernel, dwi_local_modeling,
    export_scalars_to_nifti,
};
pub use pipeline::{
    TractographyOutputs, TractographyRequest, complete_labeling, complete_tractography,
};
pub use tracking::{BundleMapFormat, TrackingOptions, TrackingType, tractography};
