//! The 'Tractography mask' tab.

use std::path::{Path, PathBuf};

use connectomist_core::filetools::gis_to_nifti;
use connectomist_core::{
    Connectomist, Error, ParameterSet, Ptk, Result, connectomist_flag, params, require_files,
};

/// Algorithm name of the 'Tractography mask' tab.
pub const ALGORITHM: &str = "DWI-Tractography-Mask";

/// Morphologist results the mask is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphologistFiles {
    /// AC/PC coordinates, `<subject>.APC`
    pub commissure_coordinates: PathBuf,
    /// Histogram analysis, `nobias_<subject>.han`
    pub histogram_analysis: PathBuf,
    /// Bias corrected T1, `nobias_<subject>.nii.gz`
    pub unbiased_t1: PathBuf,
    /// Hemisphere segmentation, `voronoi_<subject>.nii.gz`
    pub voronoi_mask: PathBuf,
}

impl MorphologistFiles {
    /// Locates the files of `subject_id` in a Morphologist database; each
    /// one must exist.
    pub fn locate(morphologist_dir: &Path, subject_id: &str) -> Result<Self> {
        let acquisition = morphologist_dir
            .join(subject_id)
            .join("t1mri")
            .join("default_acquisition");
        let analysis = acquisition.join("default_analysis");
        let files = Self {
            commissure_coordinates: acquisition.join(format!("{subject_id}.APC")),
            histogram_analysis: analysis.join(format!("nobias_{subject_id}.han")),
            unbiased_t1: analysis.join(format!("nobias_{subject_id}.nii.gz")),
            voronoi_mask: analysis
                .join("segmentation")
                .join(format!("voronoi_{subject_id}.nii.gz")),
        };
        require_files([
            &files.commissure_coordinates,
            &files.histogram_analysis,
            &files.unbiased_t1,
            &files.voronoi_mask,
        ])?;
        Ok(files)
    }
}

/// Transformation from the raw T1 of `subject_id` to the Talairach ACPC
/// space, as registered by Morphologist.
pub fn t1_to_talairach_transform(morphologist_dir: &Path, subject_id: &str) -> PathBuf {
    morphologist_dir
        .join(subject_id)
        .join("t1mri")
        .join("default_acquisition")
        .join("registration")
        .join(format!(
            "RawT1-{subject_id}_default_acquisition_TO_Talairach-ACPC.trm"
        ))
}

/// Structures added to the white matter mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TractographyMaskOptions {
    /// Add the cerebellum.
    pub add_cerebellum: bool,
    /// Add the commissures.
    pub add_commissures: bool,
}

impl Default for TractographyMaskOptions {
    fn default() -> Self {
        Self {
            add_cerebellum: false,
            add_commissures: true,
        }
    }
}

/// Builds the parameters of the 'Tractography mask' tab.
pub fn tractography_mask_parameters(
    outdir: &Path,
    files: &MorphologistFiles,
    subject_id: &str,
    options: TractographyMaskOptions,
) -> ParameterSet {
    params! {
        "_subjectName" => subject_id,
        "addCerebellum" => connectomist_flag(options.add_cerebellum),
        "addCommissures" => connectomist_flag(options.add_commissures),
        "addROIMask" => 0,
        "fileNameCommissureCoordinates" => &files.commissure_coordinates,
        "fileNameHistogramAnalysis" => &files.histogram_analysis,
        "fileNameROIMaskToAdd" => "",
        "fileNameROIMaskToRemove" => "",
        "fileNameUnbiasedT1" => &files.unbiased_t1,
        "fileNameVoronoiMask" => &files.voronoi_mask,
        "outputWorkDirectory" => outdir,
        "removeROIMask" => 0,
        "removeTemporaryFiles" => 2,
    }
}

/// Runs the 'Tractography mask' tab on the Morphologist segmentation.
pub async fn tractography_mask(
    connectomist: &Connectomist,
    outdir: &Path,
    subject_id: &str,
    morphologist_dir: &Path,
    options: TractographyMaskOptions,
) -> Result<PathBuf> {
    let files = MorphologistFiles::locate(morphologist_dir, subject_id)?;
    tracing::info!(subject = subject_id, "Building tractography mask");
    let parameters = tractography_mask_parameters(outdir, &files, subject_id, options);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}

/// Converts `<mask_dir>/tractography_mask.ima` to
/// `<outdir>/<filename>.nii.gz`; `outdir` defaults to `mask_dir`.
pub async fn export_mask_to_nifti(
    ptk: &Ptk,
    mask_dir: &Path,
    outdir: Option<&Path>,
    filename: &str,
) -> Result<PathBuf> {
    let outdir = match outdir {
        Some(dir) => {
            if !dir.is_dir() {
                std::fs::create_dir_all(dir).map_err(|e| Error::io_with_path(e, dir))?;
            }
            dir
        }
        None => mask_dir,
    };
    let mask = mask_dir.join("tractography_mask.ima");
    require_files([&mask])?;
    gis_to_nifti(ptk, &mask, &outdir.join(format!("{filename}.nii.gz"))).await
}
