//! The 'Eddy current & motion' tab and the export of its results.

use std::path::{Path, PathBuf};

use serde::Serialize;

use connectomist_core::dwi::{normalize, write_bvals, write_bvecs};
use connectomist_core::filetools::{concatenate_volumes, gis_to_nifti};
use connectomist_core::literal::read_assignments;
use connectomist_core::{
    Connectomist, Error, ParamValue, ParameterSet, Ptk, Result, params, require_files,
};

/// Algorithm name of the 'Eddy current & motion' tab.
pub const ALGORITHM: &str = "DWI-Eddy-Current-And-Motion-Correction";

/// A diffusion series in NIfTI with its b-values and b-vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessedDwi {
    /// `<name>.nii.gz`
    pub dwi: PathBuf,
    /// `<name>.bval`
    pub bval: PathBuf,
    /// `<name>.bvec`
    pub bvec: PathBuf,
}

/// Registration settings shared by the eddy current and motion options.
fn registration_options() -> ParameterSet {
    let mut set = params! {
        "applySmoothing" => 1,
        "backgroundResamplingLevel" => 0,
        "levelCount" => 32,
        "lowerThreshold" => 0.0,
        "maximumIterationCount" => 1000,
        "maximumTestGradient" => 1000.0,
        "maximumTolerance" => 0.01,
        "optimizerName" => 0,
        "outputResamplingOrder" => 3,
        "registrationResamplingOrder" => 1,
        "similarityMeasureName" => 1,
        "stepSize" => 0.1,
        "stoppingCriterionError" => 0.01,
        "subSamplingMaximumSizes" => "64",
    };
    for axis in ["X", "Y", "Z"] {
        set.insert(format!("initialParametersRotation{axis}"), 0)
            .insert(format!("initialParametersTranslation{axis}"), 0)
            .insert(format!("optimizerParametersRotation{axis}"), 2)
            .insert(format!("optimizerParametersTranslation{axis}"), 2);
    }
    set
}

/// The eddy current model also optimizes scaling and shearing.
fn eddy_current_options() -> ParameterSet {
    let mut set = registration_options();
    for axis in ["X", "Y", "Z"] {
        set.insert(format!("initialParametersScaling{axis}"), 1.0)
            .insert(format!("optimizerParametersScaling{axis}"), 0.01);
    }
    for plane in ["XY", "XZ", "YZ"] {
        set.insert(format!("initialParametersShearing{plane}"), 0.0)
            .insert(format!("optimizerParametersShearing{plane}"), 0.01);
    }
    set
}

/// Builds the parameters of the 'Eddy current & motion' tab.
pub fn eddy_parameters(
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    corrected_dir: &Path,
    subject_id: &str,
) -> ParameterSet {
    params! {
        "rawDwiDirectory" => raw_dwi_dir,
        "roughMaskDirectory" => rough_mask_dir,
        "correctedDwiDirectory" => corrected_dir,
        "outputWorkDirectory" => outdir,
        "eddyCurrentCorrection" => 2,
        "motionCorrection" => 1,
        "_subjectName" => subject_id,
        "fileNameMotionTransform" => "",
        "eddyCurrentCorrectionOptions" => eddy_current_options(),
        "motionCorrectionOptions" => registration_options(),
    }
}

/// Runs the 'Eddy current & motion' tab.
///
/// `corrected_dir` is the susceptibility or the outliers directory,
/// depending on whether eddy currents are corrected after or before the
/// susceptibility artifacts.
pub async fn eddy_and_motion_correction(
    connectomist: &Connectomist,
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    corrected_dir: &Path,
    subject_id: &str,
) -> Result<PathBuf> {
    tracing::info!(subject = subject_id, "Correcting eddy currents and motion");
    let parameters = eddy_parameters(
        outdir,
        raw_dwi_dir,
        rough_mask_dir,
        corrected_dir,
        subject_id,
    );
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}

/// b-values and gradient directions of the corrected diffusion volumes,
/// read from the `.minf` header of `dw_wo_eddy_current_and_motion.ima`.
pub fn read_corrected_scheme(minf: &Path) -> Result<(Vec<f64>, Vec<[f64; 3]>)> {
    let assignments = read_assignments(minf)?;
    let attributes = assignments
        .get("attributes")
        .ok_or_else(|| Error::bad_file(minf))?;

    let bvalues = attributes
        .get("bvalues")
        .and_then(ParamValue::as_list)
        .ok_or_else(|| Error::bad_file(minf))?
        .iter()
        .map(|b| b.as_f64().map(f64::trunc))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| Error::bad_file(minf))?;

    let directions = attributes
        .get("diffusion_gradient_orientations")
        .and_then(ParamValue::as_list)
        .ok_or_else(|| Error::bad_file(minf))?
        .iter()
        .map(|vector| {
            let components = vector
                .as_list()?
                .iter()
                .map(ParamValue::as_f64)
                .collect::<Option<Vec<f64>>>()?;
            <[f64; 3]>::try_from(components.as_slice()).ok()
        })
        .collect::<Option<Vec<[f64; 3]>>>()
        .ok_or_else(|| Error::bad_file(minf))?;

    Ok((bvalues, directions))
}

/// Converts the results of the 'Eddy current & motion' tab to NIfTI.
///
/// The corrected T2 and diffusion weighted volumes are concatenated and
/// written to `<outdir>/<filename>.nii.gz`. The `.bval` and `.bvec` are
/// rebuilt from the corrected gradient directions, normalized, with a
/// leading b = 0 entry for the T2 volume. `outdir` defaults to
/// `eddy_motion_dir` and is created when missing.
///
/// # Errors
///
/// Returns [`Error::BadFile`] when a corrected volume is missing or when
/// its `.minf` lacks `bvalues` or `diffusion_gradient_orientations`.
pub async fn export_eddy_motion_results_to_nifti(
    ptk: &Ptk,
    eddy_motion_dir: &Path,
    outdir: Option<&Path>,
    filename: &str,
) -> Result<PreprocessedDwi> {
    let outdir = match outdir {
        Some(dir) => {
            if !dir.is_dir() {
                std::fs::create_dir_all(dir).map_err(|e| Error::io_with_path(e, dir))?;
            }
            dir
        }
        None => eddy_motion_dir,
    };

    let t2 = eddy_motion_dir.join("t2_wo_eddy_current_and_motion.ima");
    let dw = eddy_motion_dir.join("dw_wo_eddy_current_and_motion.ima");
    require_files([&t2, &dw])?;
    let t2_dw = concatenate_volumes(
        ptk,
        &[t2, dw],
        &eddy_motion_dir.join("t2_dw_wo_eddy_current_and_motion.ima"),
        "t",
    )
    .await?;
    let dwi = gis_to_nifti(ptk, &t2_dw, &outdir.join(format!("{filename}.nii.gz"))).await?;

    let minf = eddy_motion_dir.join("dw_wo_eddy_current_and_motion.ima.minf");
    let (bvalues, directions) = read_corrected_scheme(&minf)?;

    let bvals: Vec<f64> = std::iter::once(0.0).chain(bvalues).collect();
    let bvecs: Vec<[f64; 3]> = std::iter::once([0.0; 3])
        .chain(directions.into_iter().map(normalize))
        .collect();
    let bval = outdir.join(format!("{filename}.bval"));
    let bvec = outdir.join(format!("{filename}.bvec"));
    write_bvals(&bval, &bvals)?;
    write_bvecs(&bvec, &bvecs)?;

    tracing::info!(dwi = %dwi.display(), volumes = bvals.len(), "Exported corrected series");
    Ok(PreprocessedDwi { dwi, bval, bvec })
}
