//! The 'Tractography' tab.

use std::path::{Path, PathBuf};

use connectomist_core::{Connectomist, ParameterSet, Result, params, require_files};

use crate::choice::connectomist_choice;
use crate::model::LocalModel;

/// Algorithm name of the 'Tractography' tab.
pub const ALGORITHM: &str = "DWI-Tractography";

connectomist_choice! {
    /// File format of the tracked bundle maps.
    pub enum BundleMapFormat ("bundle format") {
        /// AIMS `.bundles`
        AimsBundleMap = ("aimsbundlemap", 0),
        /// Connectomist bundle map
        BundleMap = ("bundlemap", 1),
        /// VTK
        #[default]
        VtkBundleMap = ("vtkbundlemap", 2),
        /// TrackVis `.trk`
        TrkBundleMap = ("trkbundlemap", 3),
    }
}

connectomist_choice! {
    /// Streamline tracking algorithm.
    pub enum TrackingType ("tracking algorithm") {
        /// Deterministic streamlines
        Deterministic = ("streamline_deterministic" | "deterministic", 0),
        /// Regularized deterministic streamlines
        #[default]
        RegularizedDeterministic = ("streamline_regularize_deterministic" | "regularized", 1),
        /// Probabilistic streamlines
        Probabilistic = ("streamline_probabilistic" | "probabilistic", 2),
    }
}

/// Settings of the 'Tractography' tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingOptions {
    /// Tracking algorithm.
    pub tracking_type: TrackingType,
    /// Output format.
    pub bundle_map_format: BundleMapFormat,
    /// Shortest kept fiber, in mm.
    pub min_fiber_length: f64,
    /// Longest kept fiber, in mm.
    pub max_fiber_length: f64,
    /// Largest angle between two consecutive steps, in degrees.
    pub aperture_angle: f64,
    /// Step length, in mm.
    pub forward_step: f64,
    /// Number of seeds per voxel.
    pub voxel_sampler_point_count: i64,
    /// Temperature of the Gibbs sampler, probabilistic tracking only.
    pub gibbs_temperature: f64,
    /// Keeps one fiber point every `storing_increment` steps.
    pub storing_increment: i64,
    /// Number of sphere points; 500 is a 2 degree resolution.
    pub output_orientation_count: i64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            tracking_type: TrackingType::default(),
            bundle_map_format: BundleMapFormat::default(),
            min_fiber_length: 5.0,
            max_fiber_length: 300.0,
            aperture_angle: 30.0,
            forward_step: 0.2,
            voxel_sampler_point_count: 1,
            gibbs_temperature: 1.0,
            storing_increment: 10,
            output_orientation_count: 500,
        }
    }
}

/// Outputs of the previous steps read by the tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingInputs {
    /// `<mask_dir>/tractography_mask.ima`
    pub mask: PathBuf,
    /// `<model_dir>/<model>_odf_site_map.sitemap`
    pub odf_site_map: PathBuf,
    /// `<model_dir>/<model>_odf_texture_map.texturemap`
    pub odf_texture_map: PathBuf,
    /// `<model_dir>/<model>_rgb.ima`
    pub rgb: PathBuf,
    /// `<registration_dir>/t1.ima`
    pub t1: PathBuf,
    /// `<registration_dir>/dw_to_t1.trm`
    pub dw_to_t1: PathBuf,
    /// `<registration_dir>/t1_to_dw.trm`
    pub mask_to_dw: PathBuf,
}

impl TrackingInputs {
    /// Locates the inputs; each one must exist.
    pub fn locate(
        mask_dir: &Path,
        model: LocalModel,
        model_dir: &Path,
        registration_dir: &Path,
    ) -> Result<Self> {
        let inputs = Self {
            mask: mask_dir.join("tractography_mask.ima"),
            odf_site_map: model_dir.join(format!("{model}_odf_site_map.sitemap")),
            odf_texture_map: model_dir.join(format!("{model}_odf_texture_map.texturemap")),
            rgb: model_dir.join(format!("{model}_rgb.ima")),
            t1: registration_dir.join("t1.ima"),
            dw_to_t1: registration_dir.join("dw_to_t1.trm"),
            mask_to_dw: registration_dir.join("t1_to_dw.trm"),
        };
        require_files([
            &inputs.mask,
            &inputs.odf_site_map,
            &inputs.odf_texture_map,
            &inputs.rgb,
            &inputs.t1,
            &inputs.dw_to_t1,
            &inputs.mask_to_dw,
        ])?;
        Ok(inputs)
    }
}

/// Builds the parameters of the 'Tractography' tab.
///
/// The three algorithm sections share the same settings; Connectomist reads
/// the one selected by `trackingType`.
pub fn tractography_parameters(
    outdir: &Path,
    inputs: &TrackingInputs,
    subject_id: &str,
    options: &TrackingOptions,
) -> ParameterSet {
    let mut parameters = params! {
        "_subjectName" => subject_id,
        "bundleMapFormat" => options.bundle_map_format.id(),
        "fileNameMask" => &inputs.mask,
        "fileNameOdfSiteMap" => &inputs.odf_site_map,
        "fileNameOdfTextureMap" => &inputs.odf_texture_map,
        "fileNameRgb" => &inputs.rgb,
        "fileNameT1" => &inputs.t1,
        "fileNameTransformationDwToT1" => &inputs.dw_to_t1,
        "fileNameTransformationMaskToDw" => &inputs.mask_to_dw,
        "outputOrientationCount" => options.output_orientation_count,
        "outputWorkDirectory" => outdir,
        "stepCount" => options.voxel_sampler_point_count,
        "trackingType" => options.tracking_type.id(),
    };
    for prefix in ["deterministic", "probabilistic", "regularizedDeterministic"] {
        parameters
            .insert(format!("{prefix}ApertureAngle"), options.aperture_angle)
            .insert(format!("{prefix}ForwardStep"), options.forward_step)
            .insert(format!("{prefix}MaximumFiberLength"), options.max_fiber_length)
            .insert(format!("{prefix}MinimumFiberLength"), options.min_fiber_length)
            .insert(format!("{prefix}StoringIncrement"), options.storing_increment)
            .insert(
                format!("{prefix}VoxelSamplerPointCount"),
                options.voxel_sampler_point_count,
            );
    }
    parameters
        .insert("probabilisticGibbsTemperature", options.gibbs_temperature)
        .insert("regularizedDeterministicLowerGFABoundary", -1.0)
        .insert("regularizedDeterministicUpperGFABoundary", -1.0);
    parameters
}

/// Runs the 'Tractography' tab.
///
/// `mask_dir`, `model_dir` and `registration_dir` are the outputs of the
/// 'Tractography mask', 'Local modeling' and 'Anatomy & Talairach' tabs.
#[allow(clippy::too_many_arguments)]
pub async fn tractography(
    connectomist: &Connectomist,
    outdir: &Path,
    subject_id: &str,
    mask_dir: &Path,
    model: LocalModel,
    model_dir: &Path,
    registration_dir: &Path,
    options: &TrackingOptions,
) -> Result<PathBuf> {
    let inputs = TrackingInputs::locate(mask_dir, model, model_dir, registration_dir)?;
    tracing::info!(
        subject = subject_id,
        tracking = %options.tracking_type,
        format = %options.bundle_map_format,
        "Tracking fibers"
    );
    let parameters = tractography_parameters(outdir, &inputs, subject_id, options);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
