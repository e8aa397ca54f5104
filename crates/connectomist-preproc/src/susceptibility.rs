//! The 'Susceptibility' tab.
//!
//! The tab exposes one group of fields per manufacturer. Every group is
//! written with its defaults and the group of the scanner found in the
//! import directory is filled from [`SusceptibilityOptions`].

use std::path::{Path, PathBuf};

use connectomist_core::literal::read_assignments;
use connectomist_core::{
    Connectomist, Error, Manufacturer, ParamValue, ParameterSet, Result, connectomist_flag,
    params,
};

use crate::registration::AffineRegistration;

/// Algorithm name of the 'Susceptibility' tab.
pub const ALGORITHM: &str = "DWI-Susceptibility-Artifact-Correction";

/// Acquisition settings of the B0 field map and of the EPI readout.
#[derive(Debug, Clone, PartialEq)]
pub struct SusceptibilityOptions {
    /// Difference between the two echoes of the B0 magnitude map.
    pub delta_te: Option<f64>,
    /// Fraction of the k-space plane acquired, in ]0, 1].
    pub partial_fourier_factor: Option<f64>,
    /// Number of parallel acquisitions in the k-space plane.
    pub parallel_acceleration_factor: Option<i64>,
    /// Invert the unwarping direction.
    pub negative_sign: bool,
    /// Time in ms between the centers of two consecutive k-space lines.
    /// Not used for Philips.
    pub echo_spacing: Option<f64>,
    /// Echo train length. Philips only.
    pub epi_factor: Option<i64>,
    /// B0 field intensity in tesla. Philips only.
    pub b0_field: f64,
    /// Water fat shift in pixels. Philips only.
    pub water_fat_shift: f64,
}

impl Default for SusceptibilityOptions {
    fn default() -> Self {
        Self {
            delta_te: None,
            partial_fourier_factor: None,
            parallel_acceleration_factor: None,
            negative_sign: false,
            echo_spacing: None,
            epi_factor: None,
            b0_field: 3.0,
            water_fat_shift: 4.68,
        }
    }
}

/// Reads the scanner manufacturer recorded by the 'DWI & Q-space' tab in
/// `<raw_dwi_dir>/acquisition_parameters.py`.
///
/// # Errors
///
/// Returns [`Error::BadFile`] when the file cannot be read or has no
/// `acquisitionParameters['manufacturer']` string, and
/// [`Error::BadManufacturer`] for an unknown scanner.
pub fn read_manufacturer(raw_dwi_dir: &Path) -> Result<Manufacturer> {
    let path = raw_dwi_dir.join("acquisition_parameters.py");
    let assignments = read_assignments(&path)?;
    let label = assignments
        .get("acquisitionParameters")
        .and_then(|value| value.get("manufacturer"))
        .and_then(ParamValue::as_str)
        .ok_or_else(|| Error::bad_file(&path))?;
    Manufacturer::from_acquisition_label(label)
}

/// Fields of every manufacturer group, with the tab defaults.
fn manufacturer_defaults() -> ParameterSet {
    let mut set = ParameterSet::new();
    for manufacturer in Manufacturer::ALL {
        let prefix = manufacturer.parameter_prefix();
        set.insert(format!("{prefix}DeltaTE"), 2.46)
            .insert(format!("{prefix}EchoSpacing"), 0.75)
            .insert(format!("{prefix}PartialFourierFactor"), 1.0)
            .insert(format!("{prefix}ParallelAccelerationFactor"), 1);
    }
    set.insert("brukerPhaseNegativeSign", 0)
        .insert("brukerFileNameFirstEchoB0Magnitude", "")
        .insert("brukerFileNameB0PhaseDifference", "")
        .insert("gePhaseNegativeSign", 0)
        .insert("geFileNameDoubleEchoB0MagnitudePhaseRealImaginary", "")
        .insert("philipsPhaseNegativeSign", 0)
        .insert("philipsFileNameFirstEchoB0Magnitude", "")
        .insert("philipsFileNameB0PhaseDifference", "")
        .insert("philipsEPIFactor", 128)
        .insert("philipsStaticB0Field", 3.0)
        .insert("philipsWaterFatShiftPerPixel", 0.0)
        .insert("siemensPhaseNegativeSign", 2)
        .insert("siemensFileNameDoubleEchoB0Magnitude", "")
        .insert("siemensFileNameB0PhaseDifference", "");
    set
}

/// The fields the caller must provide for `manufacturer`, with their
/// values. Unset options are [`ParamValue::None`].
pub fn manufacturer_arguments(
    manufacturer: Manufacturer,
    options: &SusceptibilityOptions,
    b0_magnitude: &Path,
    b0_phase: &Path,
) -> ParameterSet {
    let prefix = manufacturer.parameter_prefix();
    let mut set = params! {
        format!("{prefix}DeltaTE") => options.delta_te,
        format!("{prefix}PartialFourierFactor") => options.partial_fourier_factor,
        format!("{prefix}ParallelAccelerationFactor") => options.parallel_acceleration_factor,
        format!("{prefix}PhaseNegativeSign") => connectomist_flag(options.negative_sign),
    };
    match manufacturer {
        Manufacturer::Bruker => {
            set.insert("brukerFileNameFirstEchoB0Magnitude", b0_magnitude)
                .insert("brukerFileNameB0PhaseDifference", b0_phase)
                .insert("brukerEchoSpacing", options.echo_spacing);
        }
        Manufacturer::Ge => {
            set.insert(
                "geFileNameDoubleEchoB0MagnitudePhaseRealImaginary",
                b0_magnitude,
            )
            .insert("geEchoSpacing", options.echo_spacing);
        }
        Manufacturer::Philips => {
            set.insert("philipsFileNameFirstEchoB0Magnitude", b0_magnitude)
                .insert("philipsFileNameB0PhaseDifference", b0_phase)
                .insert("philipsEPIFactor", options.epi_factor)
                .insert("philipsStaticB0Field", options.b0_field)
                .insert("philipsWaterFatShiftPerPixel", options.water_fat_shift);
        }
        Manufacturer::Siemens => {
            set.insert("siemensFileNameDoubleEchoB0Magnitude", b0_magnitude)
                .insert("siemensFileNameB0PhaseDifference", b0_phase)
                .insert("siemensEchoSpacing", options.echo_spacing);
        }
    }
    set
}

/// Builds the parameters of the 'Susceptibility' tab.
///
/// # Errors
///
/// Returns [`Error::MissingParameters`], listing the field names in
/// alphabetical order, when an option required by `manufacturer` is unset.
#[allow(clippy::too_many_arguments)]
pub fn susceptibility_parameters(
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    outliers_dir: &Path,
    subject_id: &str,
    manufacturer: Manufacturer,
    options: &SusceptibilityOptions,
) -> Result<ParameterSet> {
    let arguments = manufacturer_arguments(
        manufacturer,
        options,
        &raw_dwi_dir.join("b0_magnitude.ima"),
        &raw_dwi_dir.join("b0_phase.ima"),
    );
    let missing: Vec<String> = arguments
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| key.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingParameters {
            algorithm: ALGORITHM.to_string(),
            parameters: missing,
        });
    }

    let mut set = params! {
        "rawDwiDirectory" => raw_dwi_dir,
        "roughMaskDirectory" => rough_mask_dir,
        "outlierFilteredDwiDirectory" => outliers_dir,
        "outputWorkDirectory" => outdir,
        "correctionStrategy" => 0,
        "importDwToB0Transformation" => 0,
        "generateDwToB0Transformation" => 1,
        "fileNameDwToB0Transformation" => "",
        "_subjectName" => subject_id,
        "DwToB0RegistrationParameter" => AffineRegistration::dw_to_b0().to_parameters(),
    };
    set.extend(manufacturer_defaults()).extend(arguments);
    Ok(set)
}

/// Runs the 'Susceptibility' tab.
///
/// The manufacturer is read from the import directory; the field maps are
/// the `b0_magnitude.ima` and `b0_phase.ima` written there by the import.
pub async fn susceptibility_correction(
    connectomist: &Connectomist,
    outdir: &Path,
    raw_dwi_dir: &Path,
    rough_mask_dir: &Path,
    outliers_dir: &Path,
    subject_id: &str,
    options: &SusceptibilityOptions,
) -> Result<PathBuf> {
    let manufacturer = read_manufacturer(raw_dwi_dir)?;
    tracing::info!(subject = subject_id, %manufacturer, "Correcting susceptibility artifacts");

    let parameters = susceptibility_parameters(
        outdir,
        raw_dwi_dir,
        rough_mask_dir,
        outliers_dir,
        subject_id,
        manufacturer,
        options,
    )?;
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
