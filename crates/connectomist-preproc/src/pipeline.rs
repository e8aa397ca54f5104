//! Runs every preprocessing tab in order.

use std::path::{Path, PathBuf};

use serde::Serialize;

use connectomist_core::{Connectomist, Error, Manufacturer, Result, require_files};

use crate::eddy::{eddy_and_motion_correction, export_eddy_motion_results_to_nifti};
use crate::mask::{MaskStrategy, RoughMaskOptions, rough_mask_extraction};
use crate::outliers::outlying_slice_detection;
use crate::qc::{QcDirectories, qc_reporting};
use crate::qspace::{DwiInputs, InvertAxes, data_import_and_qspace_sampling};
use crate::registration::dwi_to_anatomy;
use crate::susceptibility::{SusceptibilityOptions, susceptibility_correction};

/// Step directories, in execution order.
pub const STEPS: [&str; 6] = [
    "01-Import_and_qspace_model",
    "02-Rough_mask",
    "03-Outliers",
    "04-Suceptibility",
    "05-Eddy_current_and_motion",
    "06-Anatomy_Talairach",
];

/// Directory of the optional quality check report.
pub const QC_STEP: &str = "QC_reporting";

/// Labels of the quality check report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcReport {
    /// Name of the study
    pub project_name: String,
    /// Time step of the acquisition, e.g. "M0"
    pub timestep: String,
}

/// Everything [`complete_preprocessing`] needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingRequest {
    /// Directory receiving the step directories and the exported files.
    pub outdir: PathBuf,
    /// Subject identifier.
    pub subject_id: String,
    /// Diffusion series and field maps.
    pub inputs: DwiInputs,
    /// Scanner manufacturer.
    pub manufacturer: Manufacturer,
    /// Axes to invert in the diffusion model.
    pub invert: InvertAxes,
    /// Field map and readout settings.
    pub susceptibility: SusceptibilityOptions,
    /// Morphologist database; enables the 'Anatomy & Talairach' tab.
    pub morphologist_dir: Option<PathBuf>,
    /// Writes a quality check report; requires `morphologist_dir`.
    pub qc: Option<QcReport>,
    /// Removes the step directories 01 to 05 once the results are exported.
    pub delete_steps: bool,
}

impl PreprocessingRequest {
    /// A request with the default options.
    pub fn new(
        outdir: impl Into<PathBuf>,
        subject_id: impl Into<String>,
        inputs: DwiInputs,
        manufacturer: Manufacturer,
        susceptibility: SusceptibilityOptions,
    ) -> Self {
        Self {
            outdir: outdir.into(),
            subject_id: subject_id.into(),
            inputs,
            manufacturer,
            invert: InvertAxes::default(),
            susceptibility,
            morphologist_dir: None,
            qc: None,
            delete_steps: false,
        }
    }

    /// Directory of step `index` in [`STEPS`].
    pub fn step_dir(&self, index: usize) -> PathBuf {
        self.outdir.join(STEPS[index])
    }

    fn validate(&self) -> Result<()> {
        if self.qc.is_some() && self.morphologist_dir.is_none() {
            return Err(Error::validation_field(
                "qc",
                "The quality check report needs the registration on the anatomy: \
                 a Morphologist directory is required.",
            ));
        }
        Ok(())
    }
}

/// Files produced by [`complete_preprocessing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessingOutputs {
    /// Corrected series, `<outdir>/dwi.nii.gz`
    pub dwi: PathBuf,
    /// `<outdir>/dwi.bval`
    pub bval: PathBuf,
    /// `<outdir>/dwi.bvec`
    pub bvec: PathBuf,
    /// Outliers summary, `<outdir>/outliers.py`
    pub outliers: PathBuf,
    /// 'Anatomy & Talairach' directory, when run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_dir: Option<PathBuf>,
    /// Quality check report directory, when run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qc_dir: Option<PathBuf>,
}

/// Runs the preprocessing tabs in order.
///
/// 1. import the series and set the q-space model,
/// 2. extract a rough brain mask from the T2 volume,
/// 3. detect and correct outlying slices,
/// 4. correct susceptibility artifacts,
/// 5. correct eddy currents and motion,
/// 6. export `dwi.nii.gz`, `dwi.bval`, `dwi.bvec` and `outliers.py`,
/// 7. register on the Morphologist T1 when a database is given,
/// 8. write the quality check report when requested,
/// 9. remove the step directories 01 to 05 when requested.
pub async fn complete_preprocessing(
    connectomist: &Connectomist,
    request: &PreprocessingRequest,
) -> Result<PreprocessingOutputs> {
    request.validate()?;
    let outdir = request.outdir.as_path();
    let subject_id = request.subject_id.as_str();
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }
    tracing::info!(subject = subject_id, outdir = %outdir.display(), "Starting preprocessing");

    let raw_dwi_dir = request.step_dir(0);
    data_import_and_qspace_sampling(
        connectomist,
        &raw_dwi_dir,
        subject_id,
        &request.inputs,
        request.manufacturer,
        request.invert,
    )
    .await?;

    let rough_mask_dir = request.step_dir(1);
    rough_mask_extraction(
        connectomist,
        &rough_mask_dir,
        &raw_dwi_dir,
        subject_id,
        &MaskStrategy::FromT2,
        &RoughMaskOptions::default(),
    )
    .await?;

    let outliers_dir = request.step_dir(2);
    outlying_slice_detection(
        connectomist,
        &outliers_dir,
        &raw_dwi_dir,
        &rough_mask_dir,
        subject_id,
    )
    .await?;

    let susceptibility_dir = request.step_dir(3);
    susceptibility_correction(
        connectomist,
        &susceptibility_dir,
        &raw_dwi_dir,
        &rough_mask_dir,
        &outliers_dir,
        subject_id,
        &request.susceptibility,
    )
    .await?;

    let eddy_motion_dir = request.step_dir(4);
    eddy_and_motion_correction(
        connectomist,
        &eddy_motion_dir,
        &raw_dwi_dir,
        &rough_mask_dir,
        &susceptibility_dir,
        subject_id,
    )
    .await?;

    let exported = export_eddy_motion_results_to_nifti(
        &connectomist.ptk(),
        &eddy_motion_dir,
        Some(outdir),
        "dwi",
    )
    .await?;
    let outliers = copy_outliers(&outliers_dir, outdir)?;

    let registration_dir = match &request.morphologist_dir {
        Some(morphologist_dir) => Some(
            dwi_to_anatomy(
                connectomist,
                &request.step_dir(5),
                &eddy_motion_dir,
                &rough_mask_dir,
                morphologist_dir,
                subject_id,
            )
            .await?,
        ),
        None => None,
    };

    let qc_dir = match (&request.qc, &registration_dir) {
        (Some(report), Some(registration)) => {
            let directories = QcDirectories {
                raw_dwi: raw_dwi_dir.clone(),
                rough_mask: rough_mask_dir.clone(),
                outliers: outliers_dir.clone(),
                susceptibility: susceptibility_dir.clone(),
                eddy_motion: eddy_motion_dir.clone(),
                registration: registration.clone(),
            };
            Some(
                qc_reporting(
                    connectomist,
                    &outdir.join(QC_STEP),
                    &directories,
                    subject_id,
                    &report.project_name,
                    &report.timestep,
                )
                .await?,
            )
        }
        _ => None,
    };

    if request.delete_steps {
        for directory in [
            &raw_dwi_dir,
            &rough_mask_dir,
            &outliers_dir,
            &susceptibility_dir,
            &eddy_motion_dir,
        ] {
            tracing::debug!(path = %directory.display(), "Removing step directory");
            std::fs::remove_dir_all(directory).map_err(|e| Error::io_with_path(e, directory))?;
        }
    }

    tracing::info!(subject = subject_id, dwi = %exported.dwi.display(), "Preprocessing done");
    Ok(PreprocessingOutputs {
        dwi: exported.dwi,
        bval: exported.bval,
        bvec: exported.bvec,
        outliers,
        registration_dir,
        qc_dir,
    })
}

fn copy_outliers(outliers_dir: &Path, outdir: &Path) -> Result<PathBuf> {
    let source = outliers_dir.join("outliers.py");
    require_files([&source])?;
    let target = outdir.join("outliers.py");
    std::fs::copy(&source, &target).map_err(|e| Error::io_with_path(e, &target))?;
    Ok(target)
}
