//! The 'Rough mask' tab.

use std::path::{Path, PathBuf};

use connectomist_core::filetools::nifti_shape;
use connectomist_core::{Connectomist, Error, ParameterSet, Result, params, require_files};

use crate::registration::AffineRegistration;

/// Algorithm name of the 'Rough mask' tab.
pub const ALGORITHM: &str = "DWI-Rough-Mask-Extraction";

/// Image the rough mask is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MaskStrategy {
    /// Threshold the T2 (b = 0) volume of the imported series.
    #[default]
    FromT2,
    /// Register the diffusion data on the Morphologist brain mask.
    FromT1 {
        /// 'Anatomy & Talairach' directory holding `t1.ima` and
        /// `Morphologist/brain_t1.ima`
        registration_dir: PathBuf,
        /// Morphologist database root
        morphologist_dir: PathBuf,
    },
}

/// Histogram settings of the DW to T1 registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RoughMaskOptions {
    /// Number of bins in the histogram.
    pub level_count: i64,
    /// Lower threshold removing noise from the image.
    pub lower_threshold: f64,
    /// Smooth the image before the histogram analysis.
    pub apply_smoothing: bool,
}

impl Default for RoughMaskOptions {
    fn default() -> Self {
        Self {
            level_count: 32,
            lower_threshold: 0.0,
            apply_smoothing: true,
        }
    }
}

/// Inputs resolved for the T1 strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct T1Inputs {
    t1: PathBuf,
    brain: PathBuf,
    min_dim: usize,
}

/// Finds the NIfTI T1 of a subject in a Morphologist database: exactly one
/// `<dir>/<subject>/t1mri/*/<subject>.nii[.gz]` must exist.
pub fn find_morphologist_t1(morphologist_dir: &Path, subject_id: &str) -> Result<PathBuf> {
    let acquisitions = morphologist_dir.join(subject_id).join("t1mri").join("*");
    let patterns: Vec<String> = [".nii.gz", ".nii"]
        .iter()
        .map(|ext| {
            acquisitions
                .join(format!("{subject_id}{ext}"))
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    let mut files = Vec::new();
    for pattern in &patterns {
        let paths = glob::glob(pattern).map_err(|_| Error::bad_file(pattern))?;
        files.extend(paths.filter_map(|entry| entry.ok()));
    }
    match files.as_slice() {
        [file] if file.is_file() => Ok(file.clone()),
        _ => {
            tracing::debug!(matches = files.len(), "Expected a single Morphologist T1");
            Err(Error::bad_file(format!("{patterns:?}")))
        }
    }
}

fn resolve_t1_inputs(
    registration_dir: &Path,
    morphologist_dir: &Path,
    subject_id: &str,
) -> Result<T1Inputs> {
    let t1 = registration_dir.join("t1.ima");
    let brain = registration_dir.join("Morphologist").join("brain_t1.ima");
    require_files([&t1, &brain])?;

    let nifti_t1 = find_morphologist_t1(morphologist_dir, subject_id)?;
    let min_dim = nifti_shape(&nifti_t1)?
        .into_iter()
        .min()
        .ok_or_else(|| Error::bad_file(&nifti_t1))?;
    Ok(T1Inputs { t1, brain, min_dim })
}

/// Builds the parameters of the 'Rough mask' tab.
///
/// `t1` is `None` for the T2 strategy; otherwise it holds the GIS T1, the
/// Morphologist brain mask and the smallest T1 dimension.
pub fn rough_mask_parameters(
    outdir: &Path,
    raw_dwi_dir: &Path,
    subject_id: &str,
    t1: Option<(&Path, &Path, usize)>,
    options: &RoughMaskOptions,
) -> ParameterSet {
    let registration = AffineRegistration {
        apply_smoothing: options.apply_smoothing,
        smoothing_as_bool: true,
        floating_lower_threshold: options.lower_threshold,
        center_of_gravity: false,
        level_count: options.level_count,
        sub_sampling: match t1 {
            Some((_, _, min_dim)) => format!("64 {min_dim}"),
            None => "64".to_string(),
        },
        ..AffineRegistration::default()
    };
    let (anatomy, brain_mask, from_t1) = match t1 {
        Some((t1, brain, _)) => (
            t1.to_string_lossy().into_owned(),
            brain.to_string_lossy().into_owned(),
            true,
        ),
        None => (String::new(), String::new(), false),
    };
    params! {
        "outputWorkDirectory" => outdir,
        "rawDwiDirectory" => raw_dwi_dir,
        "_subjectName" => subject_id,
        "anatomy" => anatomy,
        "dwToT1RegistrationParameter" => registration.to_parameters(),
        "maskClosingRadius" => 0.0,
        "maskDilationRadius" => 4.0,
        "morphologistBrainMask" => brain_mask,
        "noiseThresholdPercentage" => 2.0,
        "strategyRoughMaskFromT1" => i64::from(from_t1),
        "strategyRoughMaskFromT2" => i64::from(!from_t1),
    }
}

/// Runs the 'Rough mask' tab.
///
/// # Errors
///
/// With [`MaskStrategy::FromT1`], returns [`Error::BadFile`] when
/// `t1.ima` or `Morphologist/brain_t1.ima` is missing from the registration
/// directory, or when the Morphologist database does not hold exactly one
/// NIfTI T1 for the subject.
pub async fn rough_mask_extraction(
    connectomist: &Connectomist,
    outdir: &Path,
    raw_dwi_dir: &Path,
    subject_id: &str,
    strategy: &MaskStrategy,
    options: &RoughMaskOptions,
) -> Result<PathBuf> {
    let t1_inputs = match strategy {
        MaskStrategy::FromT2 => None,
        MaskStrategy::FromT1 {
            registration_dir,
            morphologist_dir,
        } => Some(resolve_t1_inputs(registration_dir, morphologist_dir, subject_id)?),
    };
    tracing::info!(
        subject = subject_id,
        from_t1 = t1_inputs.is_some(),
        "Extracting rough mask"
    );

    let parameters = rough_mask_parameters(
        outdir,
        raw_dwi_dir,
        subject_id,
        t1_inputs
            .as_ref()
            .map(|t1| (t1.t1.as_path(), t1.brain.as_path(), t1.min_dim)),
        options,
    );
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
