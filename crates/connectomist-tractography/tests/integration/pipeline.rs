//! Integration tests for the complete tractography and labeling.

use connectomist_core::literal::read_assignments;
use connectomist_core::testing::ScriptedRunner;
use connectomist_core::{CommandOutput, Error, ParamValue};
use connectomist_preproc::STEPS;
use connectomist_tractography::mask::t1_to_talairach_transform;
use connectomist_tractography::{
    LabelingOptions, TractographyRequest, complete_labeling, complete_tractography,
};

use crate::common::{LABELED_BUNDLES, SUBJECT, TestHarness, fake_toolkit};

fn request(harness: &TestHarness) -> TractographyRequest {
    let preproc = harness.preprocessed();
    let morphologist = harness.morphologist();
    TractographyRequest::new(
        harness.path().join("tractography"),
        preproc,
        SUBJECT,
        morphologist,
    )
}

#[tokio::test]
async fn test_complete_tractography_runs_tabs_in_order() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);

    let outputs = complete_tractography(&connectomist, &request)
        .await
        .unwrap();

    assert_eq!(
        harness.runner.algorithms(),
        vec![
            "DWI-Local-Modeling",
            "DWI-Tractography-Mask",
            "DWI-Tractography",
            "DWI-Fast-Bundle-Labelling",
        ]
    );
    let outdir = harness.path().join("tractography");
    assert_eq!(outputs.gfa, outdir.join("gfa.nii.gz"));
    assert_eq!(outputs.md, outdir.join("md.nii.gz"));
    assert_eq!(outputs.mask, Some(outdir.join("mask.nii.gz")));
    let bundles = outputs.bundles.unwrap();
    assert_eq!(bundles.len(), LABELED_BUNDLES.len());
    for file in bundles.iter().chain([&outputs.gfa, &outputs.md]) {
        assert!(file.is_file(), "{} is missing", file.display());
    }
    assert!(outdir.join("07-Local_modeling_aqbi").is_dir());
    assert!(
        outdir
            .join("09-Tractography_streamline_regularize_deterministic")
            .is_dir()
    );
}

#[tokio::test]
async fn test_labeling_reads_tracked_bundles() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);

    complete_tractography(&connectomist, &request)
        .await
        .unwrap();

    let values = read_assignments(
        &request
            .labeling_dir()
            .join("DWI-Fast-Bundle-Labelling.py"),
    )
    .unwrap()
    .remove("parameterValues")
    .unwrap();
    let tracking_dir = request.tracking_dir();
    let expected = format!(
        "{} {}",
        tracking_dir.join("fibers_00.bundles").display(),
        tracking_dir.join("fibers_01.bundles").display()
    );
    assert_eq!(
        values
            .get("inputBundleMapFileNames")
            .and_then(ParamValue::as_str),
        Some(expected.as_str())
    );
    let to_talairach = harness.path().join(format!(
        "morpho/{SUBJECT}/t1mri/default_acquisition/registration/\
         RawT1-{SUBJECT}_default_acquisition_TO_Talairach-ACPC.trm"
    ));
    assert_eq!(
        values
            .get("fileNameT1ToTalairachTransformation")
            .and_then(ParamValue::as_str),
        Some(to_talairach.to_str().unwrap())
    );
    assert_eq!(values.get("atlasName"), Some(&ParamValue::Int(0)));
}

#[tokio::test]
async fn test_missing_talairach_transform() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);
    let to_talairach = t1_to_talairach_transform(&request.morphologist_dir, SUBJECT);
    std::fs::remove_file(&to_talairach).unwrap();

    let err = complete_tractography(&connectomist, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BadFile { ref path } if *path == to_talairach));
    assert_eq!(
        harness.runner.algorithms(),
        vec!["DWI-Local-Modeling", "DWI-Tractography-Mask", "DWI-Tractography"]
    );
}

#[tokio::test]
async fn test_model_only() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mut request = request(&harness);
    request.model_only = true;

    let outputs = complete_tractography(&connectomist, &request)
        .await
        .unwrap();

    assert_eq!(harness.runner.algorithms(), vec!["DWI-Local-Modeling"]);
    assert!(outputs.gfa.is_file());
    assert!(outputs.mask.is_none());
    assert!(outputs.bundles.is_none());
}

#[tokio::test]
async fn test_missing_preprocessing_step() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let request = request(&harness);
    std::fs::remove_dir_all(request.preproc_dir.join(STEPS[4])).unwrap();

    let err = complete_tractography(&connectomist, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.to_string().contains("05-Eddy_current_and_motion"));
    assert!(harness.runner.algorithms().is_empty());
}

#[tokio::test]
async fn test_failing_tab_stops_pipeline() {
    let runner = ScriptedRunner::new().on_args("DWI-Tractography", |_, _| {
        Ok(CommandOutput::failure(1, "Segmentation fault"))
    });
    let harness = TestHarness::with_runner(fake_toolkit(runner));
    let connectomist = harness.connect().await;
    let request = request(&harness);

    let err = complete_tractography(&connectomist, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Runtime { ref algorithm, .. } if algorithm == "DWI-Tractography"));
    assert!(!err.is_user_error());
    assert_eq!(
        harness.runner.algorithms().last().map(String::as_str),
        Some("DWI-Tractography")
    );
    assert!(!request.labeling_dir().exists());
}

#[tokio::test]
async fn test_complete_labeling() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let bundle = harness.touch("tracks/subject.bundles");
    let to_t1 = harness.touch("reg/dw_to_t1.trm");
    let to_talairach = harness.touch("reg/t1_to_talairach.trm");
    let outdir = harness.path().join("labels");

    let bundles = complete_labeling(
        &connectomist,
        &outdir,
        &[bundle],
        &to_t1,
        &to_talairach,
        Some(SUBJECT),
        &LabelingOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(harness.runner.algorithms(), vec!["DWI-Fast-Bundle-Labelling"]);
    assert!(outdir.join("10-Fast_bundle_labeling").is_dir());
    assert_eq!(
        bundles,
        vec![
            outdir.join("bundles/Arcuate_Left/Arcuate_Left.trk"),
            outdir.join("bundles/CorpusCallosum_Body/CorpusCallosum_Body.trk"),
        ]
    );
}
