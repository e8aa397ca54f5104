//! Affine registration settings and the 'Anatomy & Talairach' tab.

use std::path::{Path, PathBuf};

use connectomist_core::{Connectomist, ParamValue, ParameterSet, Result, params, require_files};

/// Algorithm name of the 'Anatomy & Talairach' tab.
pub const ALGORITHM: &str = "DWI-To-Anatomy-Matching";

/// Affine registration settings embedded in several tabs
/// (`dwToT1RegistrationParameter`, `DwToB0RegistrationParameter`).
///
/// Only the values that differ between tabs are exposed; the optimizer
/// scaling and shearing steps, tolerances and initial transform are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineRegistration {
    /// Smooth the images before the histogram analysis.
    pub apply_smoothing: bool,
    /// Write `applySmoothing` as Python `True`/`False` rather than 1/0.
    pub smoothing_as_bool: bool,
    /// Lower threshold applied to the floating image.
    pub floating_lower_threshold: f64,
    /// Initialize the transform with the centers of gravity.
    pub center_of_gravity: bool,
    /// Number of histogram bins.
    pub level_count: i64,
    /// Optimizer step for rotations, in degrees.
    pub rotation_step: i64,
    /// Optimizer step for translations, in mm.
    pub translation_step: i64,
    /// Sub-sampling pyramid sizes, e.g. "64" or "64 128".
    pub sub_sampling: String,
}

impl Default for AffineRegistration {
    fn default() -> Self {
        Self {
            apply_smoothing: true,
            smoothing_as_bool: false,
            floating_lower_threshold: 0.0,
            center_of_gravity: true,
            level_count: 32,
            rotation_step: 5,
            translation_step: 30,
            sub_sampling: "64".to_string(),
        }
    }
}

impl AffineRegistration {
    /// Settings of the DW to B0 map registration of the susceptibility tab.
    pub fn dw_to_b0() -> Self {
        Self {
            rotation_step: 10,
            translation_step: 10,
            sub_sampling: "56".to_string(),
            ..Self::default()
        }
    }

    /// Renders the nested parameter dict.
    pub fn to_parameters(&self) -> ParameterSet {
        let smoothing: ParamValue = if self.smoothing_as_bool {
            self.apply_smoothing.into()
        } else {
            i64::from(self.apply_smoothing).into()
        };
        let mut set = params! {
            "applySmoothing" => smoothing,
            "floatingLowerThreshold" => self.floating_lower_threshold,
            "initializeCoefficientsUsingCenterOfGravity" => self.center_of_gravity,
            "levelCount" => self.level_count,
            "maximumIterationCount" => 1000,
            "maximumTestGradient" => 1000.0,
            "maximumTolerance" => 0.01,
            "optimizerName" => 0,
            "referenceLowerThreshold" => 0.0,
            "resamplingOrder" => 1,
            "similarityMeasureName" => 1,
            "stepSize" => 0.1,
            "stoppingCriterionError" => 0.01,
            "subSamplingMaximumSizes" => self.sub_sampling.as_str(),
            "transform3DType" => 0,
        };
        for axis in ["X", "Y", "Z"] {
            set.insert(format!("initialParametersRotation{axis}"), 0)
                .insert(format!("initialParametersScaling{axis}"), 1.0)
                .insert(format!("initialParametersTranslation{axis}"), 0)
                .insert(format!("optimizerParametersRotation{axis}"), self.rotation_step)
                .insert(format!("optimizerParametersScaling{axis}"), 0.05)
                .insert(
                    format!("optimizerParametersTranslation{axis}"),
                    self.translation_step,
                );
        }
        for plane in ["XY", "XZ", "YZ"] {
            set.insert(format!("initialParametersShearing{plane}"), 0.0)
                .insert(format!("optimizerParametersShearing{plane}"), 0.05);
        }
        set
    }
}

/// Morphologist outputs of a subject: the AC/PC file and the T1 image.
pub fn morphologist_t1_files(morphologist_dir: &Path, subject_id: &str) -> (PathBuf, PathBuf) {
    let acquisition = morphologist_dir
        .join(subject_id)
        .join("t1mri")
        .join("default_acquisition");
    (
        acquisition.join(format!("{subject_id}.APC")),
        acquisition.join(format!("{subject_id}.nii.gz")),
    )
}

/// Builds the parameters of the 'Anatomy & Talairach' tab.
pub fn anatomy_parameters(
    outdir: &Path,
    corrected_dwi_dir: &Path,
    rough_mask_dir: &Path,
    apc_file: &Path,
    t1_file: &Path,
    subject_id: &str,
) -> ParameterSet {
    params! {
        "dwToT1RegistrationParameter" => AffineRegistration::default().to_parameters(),
        "_subjectName" => subject_id,
        "anteriorPosteriorAdditionSliceCount" => 0,
        "correctedDwiDirectory" => corrected_dwi_dir,
        "fileNameACP" => apc_file,
        "fileNameDwToT1Transformation" => "",
        "fileNameT1" => t1_file,
        "generateDwToT1Transformation" => 1,
        "headFootAdditionSliceCount" => 0,
        "importDwToT1Transformation" => 0,
        "leftRightAdditionSliceCount" => 0,
        "outputWorkDirectory" => outdir,
        "roughMaskDirectory" => rough_mask_dir,
        "t1AnteriorYCropping" => 0,
        "t1FootZCropping" => 0,
        "t1HeadZCropping" => 0,
        "t1LeftXCropping" => 0,
        "t1PosteriorYCropping" => 0,
        "t1RightXCropping" => 0,
    }
}

/// Runs the 'Anatomy & Talairach' tab: registers the corrected diffusion
/// data on the Morphologist T1 of the subject.
///
/// # Errors
///
/// Returns [`connectomist_core::Error::BadFile`] when the subject's
/// `<subject>.APC` or `<subject>.nii.gz` is missing from
/// `<morphologist_dir>/<subject>/t1mri/default_acquisition`.
pub async fn dwi_to_anatomy(
    connectomist: &Connectomist,
    outdir: &Path,
    corrected_dwi_dir: &Path,
    rough_mask_dir: &Path,
    morphologist_dir: &Path,
    subject_id: &str,
) -> Result<PathBuf> {
    let (apc_file, t1_file) = morphologist_t1_files(morphologist_dir, subject_id);
    require_files([&apc_file, &t1_file])?;

    let parameters = anatomy_parameters(
        outdir,
        corrected_dwi_dir,
        rough_mask_dir,
        &apc_file,
        &t1_file,
        subject_id,
    );
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
