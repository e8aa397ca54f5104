//! The 'DWI & Q-space' tab: data import and q-space model.

use std::path::{Path, PathBuf};

use connectomist_core::dwi::{DEFAULT_MIN_BVAL, read_bvals_bvecs};
use connectomist_core::filetools::{extract_volume, nifti_shape, nifti_to_gis};
use connectomist_core::{
    Connectomist, Error, Manufacturer, ParameterSet, Ptk, Result, connectomist_flag, params,
    require_files,
};

/// Algorithm name of the 'DWI & Q-space' tab.
pub const ALGORITHM: &str = "DWI-Data-Import-And-QSpace-Sampling";

/// The diffusion series and optional field maps of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwiInputs {
    /// NIfTI diffusion weighted series
    pub dwi: PathBuf,
    /// Associated `.bval`
    pub bval: PathBuf,
    /// Associated `.bvec`
    pub bvec: PathBuf,
    /// B0 magnitude map; may hold the phase as a second volume
    pub b0_magnitude: Option<PathBuf>,
    /// B0 phase map
    pub b0_phase: Option<PathBuf>,
}

impl DwiInputs {
    /// Inputs without field maps.
    pub fn new(dwi: impl Into<PathBuf>, bval: impl Into<PathBuf>, bvec: impl Into<PathBuf>) -> Self {
        Self {
            dwi: dwi.into(),
            bval: bval.into(),
            bvec: bvec.into(),
            b0_magnitude: None,
            b0_phase: None,
        }
    }

    /// Adds field maps.
    pub fn with_b0_maps(mut self, magnitude: Option<PathBuf>, phase: Option<PathBuf>) -> Self {
        self.b0_magnitude = magnitude;
        self.b0_phase = phase;
        self
    }

    fn files(&self) -> Vec<&Path> {
        let mut files = vec![self.dwi.as_path(), self.bval.as_path(), self.bvec.as_path()];
        files.extend(self.b0_magnitude.as_deref());
        files.extend(self.b0_phase.as_deref());
        files
    }
}

/// Axes of the diffusion model to invert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvertAxes {
    /// Invert the x axis
    pub x: bool,
    /// Invert the y axis
    pub y: bool,
    /// Invert the z axis
    pub z: bool,
}

impl Default for InvertAxes {
    fn default() -> Self {
        Self {
            x: true,
            y: false,
            z: false,
        }
    }
}

/// Files of the import directory, in the formats Connectomist reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredInputs {
    /// GIS diffusion series
    pub dwi: PathBuf,
    /// Copy of the `.bval`
    pub bval: PathBuf,
    /// Copy of the `.bvec`
    pub bvec: PathBuf,
    /// GIS magnitude map
    pub b0_magnitude: Option<PathBuf>,
    /// GIS phase map
    pub b0_phase: Option<PathBuf>,
}

/// Copies and converts the inputs of the preprocessing into `outdir`.
///
/// Images are converted to GIS, b-values and b-vectors are copied as
/// `dwi.bval` and `dwi.bvec`. A magnitude map given alone with two volumes
/// is split into `b0_magnitude.ima` and `b0_phase.ima`.
pub async fn gather_and_format_input_files(
    ptk: &Ptk,
    outdir: &Path,
    inputs: &DwiInputs,
) -> Result<GatheredInputs> {
    require_files(inputs.files())?;
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }

    let dwi = nifti_to_gis(ptk, &inputs.dwi, &outdir.join("dwi.ima")).await?;

    let bval = outdir.join("dwi.bval");
    let bvec = outdir.join("dwi.bvec");
    std::fs::copy(&inputs.bval, &bval).map_err(|e| Error::io_with_path(e, &bval))?;
    std::fs::copy(&inputs.bvec, &bvec).map_err(|e| Error::io_with_path(e, &bvec))?;

    let magnitude_target = outdir.join("b0_magnitude.ima");
    let phase_target = outdir.join("b0_phase.ima");
    let packed_maps = match (&inputs.b0_magnitude, &inputs.b0_phase) {
        (Some(magnitude), None) => {
            let shape = nifti_shape(magnitude)?;
            shape.len() == 4 && shape[3] == 2
        }
        _ => false,
    };
    let (b0_magnitude, b0_phase) = match &inputs.b0_magnitude {
        Some(maps) if packed_maps => {
            tracing::debug!(path = %maps.display(), "Splitting magnitude and phase B0 maps");
            let maps = nifti_to_gis(ptk, maps, &outdir.join("b0_maps.ima")).await?;
            let magnitude = extract_volume(ptk, &maps, &magnitude_target, 0).await?;
            let phase = extract_volume(ptk, &maps, &phase_target, 1).await?;
            (Some(magnitude), Some(phase))
        }
        _ => {
            let magnitude = match &inputs.b0_magnitude {
                Some(path) => Some(nifti_to_gis(ptk, path, &magnitude_target).await?),
                None => None,
            };
            let phase = match &inputs.b0_phase {
                Some(path) => Some(nifti_to_gis(ptk, path, &phase_target).await?),
                None => None,
            };
            (magnitude, phase)
        }
    };

    Ok(GatheredInputs {
        dwi,
        bval,
        bvec,
        b0_magnitude,
        b0_phase,
    })
}

/// Builds the parameters of the 'DWI & Q-space' tab.
pub fn qspace_parameters(
    outdir: &Path,
    subject_id: &str,
    dwi: &Path,
    bvec: &Path,
    manufacturer: Manufacturer,
    nb_nodiff: usize,
    invert: InvertAxes,
) -> ParameterSet {
    let mut set = params! {
        "fileNameDwi" => dwi,
        "sliceAxis" => 2,
        "phaseAxis" => 1,
        "manufacturer" => manufacturer.id(),
        "flipAlongX" => 0,
        "flipAlongY" => 0,
        "flipAlongZ" => 0,
        "numberOfDiscarded" => 0,
        "numberOfT2" => nb_nodiff,
        "numberOfRepetitions" => 1,
        "qSpaceSamplingType" => 4,
        "qSpaceChoice5BValue" => 1300,
        "qSpaceChoice5OrientationFileNames" => bvec,
        "invertXAxis" => connectomist_flag(invert.x),
        "invertYAxis" => connectomist_flag(invert.y),
        "invertZAxis" => connectomist_flag(invert.z),
        "qSpaceChoice1MaximumBValue" => 1000,
        "qSpaceChoice1NumberOfSteps" => 11,
        "qSpaceChoice9OrientationFileNames" => "",
        "qSpaceChoice13OrientationFileNames" => "",
        "diffusionTime" => 1.0,
        "outputWorkDirectory" => outdir,
        "_subjectName" => subject_id,
    };
    for (row, a) in ["x", "y", "z"].iter().enumerate() {
        for (col, b) in ["x", "y", "z"].iter().enumerate() {
            let identity = if row == col { 1.0 } else { 0.0 };
            set.insert(format!("qSpaceTransform_{a}{b}"), identity);
        }
    }
    for choice in 2..=4 {
        set.insert(format!("qSpaceChoice{choice}BValue"), 1000);
    }
    for choice in 6..=13 {
        set.insert(format!("qSpaceChoice{choice}BValues"), "");
    }
    for choice in [2, 3, 4, 6, 7, 8] {
        set.insert(format!("qSpaceChoice{choice}NumberOfOrientations"), 6);
    }
    for choice in 10..=12 {
        set.insert(format!("qSpaceChoice{choice}NumberOfOrientations"), "");
    }
    set
}

/// Runs the 'DWI & Q-space' tab.
///
/// After the run, when the series holds several b = 0 volumes, the copied
/// `dwi.bval` and `dwi.bvec` are rewritten with a single leading b = 0
/// entry, matching the volumes Connectomist keeps.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the acquisition is not single-shell.
pub async fn data_import_and_qspace_sampling(
    connectomist: &Connectomist,
    outdir: &Path,
    subject_id: &str,
    inputs: &DwiInputs,
    manufacturer: Manufacturer,
    invert: InvertAxes,
) -> Result<PathBuf> {
    let gathered = gather_and_format_input_files(&connectomist.ptk(), outdir, inputs).await?;

    let scheme = read_bvals_bvecs(&gathered.bval, &gathered.bvec, DEFAULT_MIN_BVAL)?;
    let nb_shells = scheme.nb_shells();
    if nb_shells != 1 {
        return Err(Error::validation_field(
            "bval",
            format!(
                "'{nb_shells}' shell model(s) not handled yet: path to .bval file: '{}'",
                gathered.bval.display()
            ),
        ));
    }
    let nb_nodiff = scheme.nb_nodiff();
    tracing::info!(subject = subject_id, %manufacturer, nb_nodiff, "Importing diffusion data");

    let parameters = qspace_parameters(
        outdir,
        subject_id,
        &gathered.dwi,
        &gathered.bvec,
        manufacturer,
        nb_nodiff,
        invert,
    );
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;

    if nb_nodiff > 1 {
        scheme
            .merge_nodiff()
            .write(&gathered.bval, &gathered.bvec)?;
    }
    Ok(outdir.to_path_buf())
}
