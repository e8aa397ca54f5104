//! Integration tests for the complete preprocessing.

use connectomist_core::{Error, Manufacturer};
use connectomist_preproc::{
    PreprocessingRequest, QcReport, STEPS, SusceptibilityOptions, complete_preprocessing,
};

use crate::common::TestHarness;

fn request(harness: &TestHarness) -> PreprocessingRequest {
    let inputs = harness.with_field_maps(harness.dwi_inputs());
    PreprocessingRequest::new(
        harness.path().join("preproc"),
        "jp110183",
        inputs,
        Manufacturer::Siemens,
        SusceptibilityOptions {
            delta_te: Some(2.46),
            partial_fourier_factor: Some(0.75),
            parallel_acceleration_factor: Some(2),
            echo_spacing: Some(0.65),
            ..SusceptibilityOptions::default()
        },
    )
}

fn add_morphologist(harness: &TestHarness, request: &mut PreprocessingRequest) {
    harness.touch("morpho/jp110183/t1mri/default_acquisition/jp110183.APC");
    harness.touch("morpho/jp110183/t1mri/default_acquisition/jp110183.nii.gz");
    request.morphologist_dir = Some(harness.path().join("morpho"));
}

#[tokio::test]
async fn test_complete_preprocessing_runs_tabs_in_order() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);

    let outputs = complete_preprocessing(&connectomist, &request)
        .await
        .unwrap();

    assert_eq!(
        harness.runner.algorithms(),
        vec![
            "DWI-Data-Import-And-QSpace-Sampling",
            "DWI-Rough-Mask-Extraction",
            "DWI-Outlier-Detection",
            "DWI-Susceptibility-Artifact-Correction",
            "DWI-Eddy-Current-And-Motion-Correction",
        ]
    );
    let outdir = harness.path().join("preproc");
    assert_eq!(outputs.dwi, outdir.join("dwi.nii.gz"));
    assert_eq!(outputs.outliers, outdir.join("outliers.py"));
    for file in [&outputs.dwi, &outputs.bval, &outputs.bvec, &outputs.outliers] {
        assert!(file.is_file(), "{} is missing", file.display());
    }
    assert!(outputs.registration_dir.is_none());
    assert!(outdir.join(STEPS[0]).is_dir());
    assert!(!outdir.join(STEPS[5]).exists());
}

#[tokio::test]
async fn test_eddy_correction_reads_susceptibility_output() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);

    complete_preprocessing(&connectomist, &request)
        .await
        .unwrap();

    let parameter_file = request
        .step_dir(4)
        .join("DWI-Eddy-Current-And-Motion-Correction.py");
    let content = std::fs::read_to_string(parameter_file).unwrap();
    let susceptibility_dir = request.step_dir(3);
    assert!(content.contains(&format!(
        "'correctedDwiDirectory': '{}'",
        susceptibility_dir.display()
    )));
}

#[tokio::test]
async fn test_registration_and_report() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mut request = request(&harness);
    add_morphologist(&harness, &mut request);
    request.qc = Some(QcReport {
        project_name: "study".to_string(),
        timestep: "M0".to_string(),
    });

    let outputs = complete_preprocessing(&connectomist, &request)
        .await
        .unwrap();

    let algorithms = harness.runner.algorithms();
    assert_eq!(algorithms.len(), 7);
    assert_eq!(algorithms[5], "DWI-To-Anatomy-Matching");
    assert_eq!(algorithms[6], "DWI-Quality-Check-Reporting");
    assert_eq!(outputs.registration_dir, Some(request.step_dir(5)));
    assert!(outputs.qc_dir.unwrap().is_dir());
}

#[tokio::test]
async fn test_report_without_registration_is_rejected() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mut request = request(&harness);
    request.qc = Some(QcReport {
        project_name: "study".to_string(),
        timestep: "M0".to_string(),
    });

    let err = complete_preprocessing(&connectomist, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert!(harness.runner.algorithms().is_empty());
}

#[tokio::test]
async fn test_delete_steps_keeps_exported_files() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mut request = request(&harness);
    add_morphologist(&harness, &mut request);
    request.delete_steps = true;

    let outputs = complete_preprocessing(&connectomist, &request)
        .await
        .unwrap();

    for index in 0..5 {
        assert!(!request.step_dir(index).exists(), "{} kept", STEPS[index]);
    }
    assert!(request.step_dir(5).is_dir());
    assert!(outputs.dwi.is_file());
    assert!(outputs.outliers.is_file());
}
