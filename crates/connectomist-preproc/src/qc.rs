//! The 'QC Reporting' tab.

use std::path::{Path, PathBuf};

use connectomist_core::{Connectomist, ParameterSet, Result, params};

/// Algorithm name of the 'QC Reporting' tab.
pub const ALGORITHM: &str = "DWI-Quality-Check-Reporting";

/// Output directories of the preprocessing tabs summarized in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcDirectories {
    /// 'DWI & Q-space'
    pub raw_dwi: PathBuf,
    /// 'Rough mask'
    pub rough_mask: PathBuf,
    /// 'Outliers'
    pub outliers: PathBuf,
    /// 'Susceptibility'
    pub susceptibility: PathBuf,
    /// 'Eddy current & motion'
    pub eddy_motion: PathBuf,
    /// 'Anatomy & Talairach'
    pub registration: PathBuf,
}

/// Builds the parameters of the 'QC Reporting' tab.
pub fn qc_parameters(
    outdir: &Path,
    directories: &QcDirectories,
    subject_id: &str,
    project_name: &str,
    timestep: &str,
) -> ParameterSet {
    params! {
        "_subjectName" => subject_id,
        "directoryNameDataImportAndQSpaceSampling" => &directories.raw_dwi,
        "directoryNameEddyCurrentAndMotion" => &directories.eddy_motion,
        "directoryNameOutlierDetection" => &directories.outliers,
        "directoryNameRoughMask" => &directories.rough_mask,
        "directoryNameSusceptibilityArtifactCorrection" => &directories.susceptibility,
        "directoryNameToAnatomyMatching" => &directories.registration,
        "outputWorkDirectory" => outdir,
        "projectName" => project_name,
        "subjectName" => subject_id,
        "timeStep" => timestep,
    }
}

/// Runs the 'QC Reporting' tab.
pub async fn qc_reporting(
    connectomist: &Connectomist,
    outdir: &Path,
    directories: &QcDirectories,
    subject_id: &str,
    project_name: &str,
    timestep: &str,
) -> Result<PathBuf> {
    tracing::info!(
        subject = subject_id,
        project = project_name,
        timestep,
        "Writing quality check report"
    );
    let parameters = qc_parameters(outdir, directories, subject_id, project_name, timestep);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
