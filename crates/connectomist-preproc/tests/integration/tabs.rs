//! Integration tests for the individual preprocessing tabs.

use std::path::PathBuf;

use connectomist_core::literal::read_assignments;
use connectomist_core::testing::{ScriptedRunner, write_nifti_header};
use connectomist_core::{CommandOutput, Error, Manufacturer, ParamValue};
use connectomist_preproc::mask::{MaskStrategy, RoughMaskOptions, rough_mask_extraction};
use connectomist_preproc::qspace::{
    InvertAxes, data_import_and_qspace_sampling, gather_and_format_input_files,
};
use connectomist_preproc::{
    SusceptibilityOptions, dwi_to_anatomy, export_eddy_motion_results_to_nifti,
    susceptibility_correction,
};

use crate::common::{TestHarness, emulate_tab, fake_toolkit};

fn parameter_values(file: PathBuf) -> ParamValue {
    read_assignments(&file)
        .unwrap()
        .remove("parameterValues")
        .unwrap()
}

fn siemens_options() -> SusceptibilityOptions {
    SusceptibilityOptions {
        delta_te: Some(2.46),
        partial_fourier_factor: Some(0.75),
        parallel_acceleration_factor: Some(2),
        echo_spacing: Some(0.65),
        ..SusceptibilityOptions::default()
    }
}

// ----------------------------------------------------------------
// DWI & Q-space
// ----------------------------------------------------------------

#[tokio::test]
async fn test_qspace_import_merges_b0_volumes() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let inputs = harness.with_field_maps(harness.dwi_inputs());
    let outdir = harness.path().join("01");

    data_import_and_qspace_sampling(
        &connectomist,
        &outdir,
        "jp110183",
        &inputs,
        Manufacturer::Siemens,
        InvertAxes::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        harness.runner.algorithms(),
        vec!["DWI-Data-Import-And-QSpace-Sampling".to_string()]
    );
    assert_eq!(harness.runner.calls_to("PtkNifti2GisConverter").len(), 3);

    let values = parameter_values(outdir.join("DWI-Data-Import-And-QSpace-Sampling.py"));
    assert_eq!(values.get("numberOfT2"), Some(&ParamValue::Int(2)));
    assert_eq!(values.get("manufacturer"), Some(&ParamValue::Int(3)));
    assert_eq!(values.get("invertXAxis"), Some(&ParamValue::Int(2)));

    assert_eq!(
        std::fs::read_to_string(outdir.join("dwi.bval")).unwrap(),
        "0 1000 1000 1000\n"
    );
}

#[tokio::test]
async fn test_qspace_rejects_multi_shell() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let inputs = harness.dwi_inputs();
    std::fs::write(&inputs.bval, "0 1000 2000 1000 2000\n").unwrap();

    let err = data_import_and_qspace_sampling(
        &connectomist,
        &harness.path().join("01"),
        "jp110183",
        &inputs,
        Manufacturer::Ge,
        InvertAxes::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.to_string().contains("'2' shell model(s)"));
    assert!(harness.runner.algorithms().is_empty());
}

#[tokio::test]
async fn test_packed_field_map_is_split() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let maps = harness.path().join("b0_maps.nii");
    write_nifti_header(&maps, &[64, 64, 32, 2]).unwrap();
    let inputs = harness.dwi_inputs().with_b0_maps(Some(maps), None);
    let outdir = harness.path().join("01");

    let gathered = gather_and_format_input_files(&connectomist.ptk(), &outdir, &inputs)
        .await
        .unwrap();

    assert_eq!(gathered.b0_magnitude, Some(outdir.join("b0_magnitude.ima")));
    assert_eq!(gathered.b0_phase, Some(outdir.join("b0_phase.ima")));
    let sub_volumes = harness.runner.calls_to("PtkSubVolume");
    assert_eq!(sub_volumes.len(), 2);
    assert!(sub_volumes[1].args.contains(&"1".to_string()));
}

#[tokio::test]
async fn test_missing_input_is_bad_file() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mut inputs = harness.dwi_inputs();
    inputs.bvec = harness.path().join("missing.bvec");

    let err = gather_and_format_input_files(&connectomist.ptk(), harness.path(), &inputs)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadFile { path } if path.ends_with("missing.bvec")));
}

// ----------------------------------------------------------------
// Rough mask
// ----------------------------------------------------------------

#[tokio::test]
async fn test_rough_mask_from_t1() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    harness.touch("06/t1.ima");
    harness.touch("06/Morphologist/brain_t1.ima");
    let t1 = harness.touch("morpho/s1/t1mri/default_acquisition/s1.nii");
    write_nifti_header(&t1, &[256, 240, 160]).unwrap();
    let outdir = harness.path().join("02");

    rough_mask_extraction(
        &connectomist,
        &outdir,
        &harness.path().join("01"),
        "s1",
        &MaskStrategy::FromT1 {
            registration_dir: harness.path().join("06"),
            morphologist_dir: harness.path().join("morpho"),
        },
        &RoughMaskOptions::default(),
    )
    .await
    .unwrap();

    let values = parameter_values(outdir.join("DWI-Rough-Mask-Extraction.py"));
    assert_eq!(values.get("strategyRoughMaskFromT1"), Some(&ParamValue::Int(1)));
    let registration = values.get("dwToT1RegistrationParameter").unwrap();
    assert_eq!(
        registration
            .get("subSamplingMaximumSizes")
            .and_then(ParamValue::as_str),
        Some("64 160")
    );
    assert_eq!(
        registration.get("applySmoothing"),
        Some(&ParamValue::Bool(true))
    );
}

// ----------------------------------------------------------------
// Susceptibility
// ----------------------------------------------------------------

#[tokio::test]
async fn test_susceptibility_uses_recorded_manufacturer() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let raw_dwi_dir = harness.path().join("01");
    std::fs::create_dir_all(&raw_dwi_dir).unwrap();
    std::fs::write(
        raw_dwi_dir.join("acquisition_parameters.py"),
        "acquisitionParameters = {'manufacturer': 'Siemens HealthCare'}\n",
    )
    .unwrap();
    let outdir = harness.path().join("04");

    susceptibility_correction(
        &connectomist,
        &outdir,
        &raw_dwi_dir,
        &harness.path().join("02"),
        &harness.path().join("03"),
        "s1",
        &siemens_options(),
    )
    .await
    .unwrap();

    let values = parameter_values(outdir.join("DWI-Susceptibility-Artifact-Correction.py"));
    assert_eq!(
        values.get("siemensEchoSpacing"),
        Some(&ParamValue::Float(0.65))
    );
    assert_eq!(
        values
            .get("siemensFileNameB0PhaseDifference")
            .and_then(ParamValue::as_str),
        Some(raw_dwi_dir.join("b0_phase.ima").to_str().unwrap())
    );
}

#[tokio::test]
async fn test_susceptibility_missing_parameters_stops_before_run() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let raw_dwi_dir = harness.path().join("01");
    std::fs::create_dir_all(&raw_dwi_dir).unwrap();
    std::fs::write(
        raw_dwi_dir.join("acquisition_parameters.py"),
        "acquisitionParameters = {'manufacturer': 'Bruker BioSpin'}\n",
    )
    .unwrap();
    let options = SusceptibilityOptions {
        echo_spacing: None,
        ..siemens_options()
    };

    let err = susceptibility_correction(
        &connectomist,
        &harness.path().join("04"),
        &raw_dwi_dir,
        &harness.path().join("02"),
        &harness.path().join("03"),
        "s1",
        &options,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        Error::MissingParameters { ref parameters, .. } if parameters == &["brukerEchoSpacing"]
    ));
    assert!(harness.runner.algorithms().is_empty());
}

#[tokio::test]
async fn test_susceptibility_without_acquisition_file() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;

    let err = susceptibility_correction(
        &connectomist,
        &harness.path().join("04"),
        &harness.path().join("01"),
        &harness.path().join("02"),
        &harness.path().join("03"),
        "s1",
        &siemens_options(),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, Error::BadFile { path } if path.ends_with("acquisition_parameters.py"))
    );
}

// ----------------------------------------------------------------
// Eddy current & motion export
// ----------------------------------------------------------------

#[tokio::test]
async fn test_export_rebuilds_bval_bvec() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let eddy_dir = harness.path().join("05");
    std::fs::create_dir_all(&eddy_dir).unwrap();
    emulate_tab(
        "connectomist",
        &[
            "-p".to_string(),
            "DWI-Eddy-Current-And-Motion-Correction".to_string(),
            "-f".to_string(),
            eddy_dir.join("params.py").to_string_lossy().into_owned(),
        ],
    )
    .unwrap();
    let outdir = harness.path().join("export");

    let exported =
        export_eddy_motion_results_to_nifti(&connectomist.ptk(), &eddy_dir, Some(&outdir), "dwi")
            .await
            .unwrap();

    assert_eq!(exported.dwi, outdir.join("dwi.nii.gz"));
    assert!(exported.dwi.is_file());
    assert!(!outdir.join("dwi.nii").exists());
    assert_eq!(
        std::fs::read_to_string(&exported.bval).unwrap(),
        "0 1000 1000 1000\n"
    );
    let bvec = std::fs::read_to_string(&exported.bvec).unwrap();
    let rows: Vec<&str> = bvec.lines().collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], "0.0000000000 1.0000000000 0.0000000000 0.0000000000");
    assert_eq!(rows[2], "0.0000000000 0.0000000000 0.0000000000 1.0000000000");

    let concatenations = harness.runner.calls_to("PtkCat");
    assert_eq!(concatenations.len(), 1);
}

#[tokio::test]
async fn test_export_requires_corrected_volumes() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;

    let err = export_eddy_motion_results_to_nifti(&connectomist.ptk(), harness.path(), None, "dwi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadFile { .. }));
}

// ----------------------------------------------------------------
// Anatomy & Talairach, failures
// ----------------------------------------------------------------

#[tokio::test]
async fn test_registration_requires_morphologist_files() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;

    let err = dwi_to_anatomy(
        &connectomist,
        &harness.path().join("06"),
        &harness.path().join("05"),
        &harness.path().join("02"),
        &harness.path().join("morpho"),
        "s1",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::BadFile { path } if path.ends_with("s1.APC")));
}

#[tokio::test]
async fn test_failing_tab_reports_runtime_error() {
    let runner = ScriptedRunner::new()
        .on_args("-p", |_, _| Ok(CommandOutput::failure(1, "license expired")));
    let harness = TestHarness::with_runner(runner);
    let connectomist = harness.connect().await;
    harness.touch("morpho/s1/t1mri/default_acquisition/s1.APC");
    harness.touch("morpho/s1/t1mri/default_acquisition/s1.nii.gz");

    let err = dwi_to_anatomy(
        &connectomist,
        &harness.path().join("06"),
        &harness.path().join("05"),
        &harness.path().join("02"),
        &harness.path().join("morpho"),
        "s1",
    )
    .await
    .unwrap_err();

    assert!(matches!(
        &err,
        Error::Runtime { algorithm, stderr, .. }
            if algorithm == "DWI-To-Anatomy-Matching" && stderr == "license expired"
    ));
    assert!(!err.is_user_error());
}

#[tokio::test]
async fn test_fake_toolkit_answers_help() {
    let harness = TestHarness::with_runner(fake_toolkit());
    let connectomist = harness.connect().await;
    assert_eq!(connectomist.release(), "5.0");
}
