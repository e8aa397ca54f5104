//! The 'Outliers' tab.

use std::path::{Path, PathBuf};

use connectomist_core::{Connectomist, ParameterSet, Result, params};

/// Algorithm name of the 'Outliers' tab.
pub const ALGORITHM: &str = "DWI-Outlier-Detection";

/// Default outlier factor.
pub const DEFAULT_OUTLIER_FACTOR: f64 = 3.0;

/// Builds the parameters of the 'Outliers' tab.
pub fn outliers_parameters(
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    subject_id: &str,
) -> ParameterSet {
    params! {
        "rawDwiDirectory" => raw_dwi_dir,
        "roughMaskDirectory" => rough_mask_dir,
        "outputWorkDirectory" => outdir,
        "discardedOrientationList" => "",
        "outlierFactor" => DEFAULT_OUTLIER_FACTOR,
        "_subjectName" => subject_id,
    }
}

/// Runs the 'Outliers' tab: detects and corrects outlying slices.
///
/// The detected slices are summarized in `<outdir>/outliers.py`.
pub async fn outlying_slice_detection(
    connectomist: &Connectomist,
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    subject_id: &str,
) -> Result<PathBuf> {
    tracing::info!(subject = subject_id, "Detecting outlying slices");
    let parameters = outliers_parameters(outdir, raw_dwi_dir, rough_mask_dir, subject_id);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
