//! Integration tests for the individual tractography tabs.

use std::path::PathBuf;

use connectomist_core::literal::read_assignments;
use connectomist_core::{Error, ParamValue};
use connectomist_tractography::{
    Atlas, ClusteringInputs, ClusteringOptions, LabelingOptions, LocalModel, ModelOptions,
    RoiSelection, TrackingOptions, TractographyMaskOptions, dwi_local_modeling,
    export_bundles_to_trk, export_mask_to_nifti, export_scalars_to_nifti, fast_bundle_labeling,
    intrasubject_fiber_clustering, tractography, tractography_mask,
};

use crate::common::{SUBJECT, TestHarness};

fn parameter_values(file: PathBuf) -> ParamValue {
    read_assignments(&file)
        .unwrap()
        .remove("parameterValues")
        .unwrap()
}

// ----------------------------------------------------------------
// Local modeling
// ----------------------------------------------------------------

#[tokio::test]
async fn test_local_modeling_reads_registration_outputs() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    harness.preprocessed();
    let outdir = harness.path().join("07");
    let options = ModelOptions {
        model: LocalModel::Dti,
        ..ModelOptions::default()
    };

    dwi_local_modeling(
        &connectomist,
        &outdir,
        &harness.registration_dir(),
        SUBJECT,
        &options,
    )
    .await
    .unwrap();

    let values = parameter_values(outdir.join("DWI-Local-Modeling.py"));
    assert_eq!(values.get("odfType"), Some(&ParamValue::Int(7)));
    let dw = harness.registration_dir().join("dw_talairach.ima");
    assert_eq!(
        values.get("fileNameDw").and_then(ParamValue::as_str),
        Some(dw.to_str().unwrap())
    );
}

#[tokio::test]
async fn test_local_modeling_without_registration() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;

    let err = dwi_local_modeling(
        &connectomist,
        &harness.path().join("07"),
        &harness.path().join("missing"),
        SUBJECT,
        &ModelOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BadFile { .. }));
    assert!(harness.runner.algorithms().is_empty());
}

#[tokio::test]
async fn test_export_scalars_converts_and_compresses() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let model_dir = harness.path().join("07");
    harness.touch("07/sdt_gfa.ima");
    harness.touch("07/sdt_adc.ima");
    let outdir = harness.path().join("export");

    let scalars = export_scalars_to_nifti(
        &connectomist.ptk(),
        &model_dir,
        LocalModel::Sdt,
        &outdir,
        "gfa",
        "md",
    )
    .await
    .unwrap();

    assert_eq!(scalars.gfa, outdir.join("gfa.nii.gz"));
    assert_eq!(scalars.md, outdir.join("md.nii.gz"));
    assert!(scalars.gfa.is_file());
    assert!(!outdir.join("gfa.nii").exists());
    assert_eq!(harness.runner.calls_to("PtkGis2NiftiConverter").len(), 2);
}

// ----------------------------------------------------------------
// Tractography mask
// ----------------------------------------------------------------

#[tokio::test]
async fn test_tractography_mask_reads_morphologist() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let morphologist = harness.morphologist();
    let outdir = harness.path().join("08");
    let options = TractographyMaskOptions {
        add_cerebellum: true,
        add_commissures: false,
    };

    tractography_mask(&connectomist, &outdir, SUBJECT, &morphologist, options)
        .await
        .unwrap();

    let values = parameter_values(outdir.join("DWI-Tractography-Mask.py"));
    assert_eq!(values.get("addCerebellum"), Some(&ParamValue::Int(2)));
    assert_eq!(values.get("addCommissures"), Some(&ParamValue::Int(0)));
    assert!(
        values
            .get("fileNameCommissureCoordinates")
            .and_then(ParamValue::as_str)
            .unwrap()
            .ends_with("jp110183/t1mri/default_acquisition/jp110183.APC")
    );
}

#[tokio::test]
async fn test_tractography_mask_missing_segmentation() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let morphologist = harness.morphologist();
    std::fs::remove_file(morphologist.join(format!(
        "{SUBJECT}/t1mri/default_acquisition/default_analysis/segmentation/voronoi_{SUBJECT}.nii.gz"
    )))
    .unwrap();

    let err = tractography_mask(
        &connectomist,
        &harness.path().join("08"),
        SUBJECT,
        &morphologist,
        TractographyMaskOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BadFile { .. }));
}

#[tokio::test]
async fn test_export_mask_defaults_to_mask_dir() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let mask_dir = harness.path().join("08");
    harness.touch("08/tractography_mask.ima");

    let mask = export_mask_to_nifti(&connectomist.ptk(), &mask_dir, None, "mask")
        .await
        .unwrap();

    assert_eq!(mask, mask_dir.join("mask.nii.gz"));
    assert!(mask.is_file());
}

#[tokio::test]
async fn test_export_mask_without_mask() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;

    let err = export_mask_to_nifti(
        &connectomist.ptk(),
        &harness.path().join("08"),
        Some(&harness.path().join("out")),
        "mask",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BadFile { path } if path.ends_with("tractography_mask.ima")));
}

// ----------------------------------------------------------------
// Tractography
// ----------------------------------------------------------------

#[tokio::test]
async fn test_tractography_after_modeling() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    harness.preprocessed();
    let model_dir = harness.path().join("07");
    dwi_local_modeling(
        &connectomist,
        &model_dir,
        &harness.registration_dir(),
        SUBJECT,
        &ModelOptions::default(),
    )
    .await
    .unwrap();
    harness.touch("08/tractography_mask.ima");
    let outdir = harness.path().join("09");
    let options = TrackingOptions {
        tracking_type: "probabilistic".parse().unwrap(),
        gibbs_temperature: 0.5,
        ..TrackingOptions::default()
    };

    tractography(
        &connectomist,
        &outdir,
        SUBJECT,
        &harness.path().join("08"),
        LocalModel::Aqbi,
        &model_dir,
        &harness.registration_dir(),
        &options,
    )
    .await
    .unwrap();

    let values = parameter_values(outdir.join("DWI-Tractography.py"));
    assert_eq!(values.get("trackingType"), Some(&ParamValue::Int(2)));
    assert_eq!(
        values.get("probabilisticGibbsTemperature"),
        Some(&ParamValue::Float(0.5))
    );
    assert!(
        values
            .get("fileNameRgb")
            .and_then(ParamValue::as_str)
            .unwrap()
            .ends_with("aqbi_rgb.ima")
    );
}

#[tokio::test]
async fn test_tractography_without_model() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    harness.preprocessed();
    harness.touch("08/tractography_mask.ima");

    let err = tractography(
        &connectomist,
        &harness.path().join("09"),
        SUBJECT,
        &harness.path().join("08"),
        LocalModel::Aqbi,
        &harness.path().join("07"),
        &harness.registration_dir(),
        &TrackingOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BadFile { path } if path.ends_with("aqbi_odf_site_map.sitemap")));
    assert!(harness.runner.algorithms().is_empty());
}

// ----------------------------------------------------------------
// Fast bundle labeling
// ----------------------------------------------------------------

#[tokio::test]
async fn test_labeling_checks_options_before_files() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let options = LabelingOptions {
        bundle_names: vec!["Arcuate".to_string()],
        ..LabelingOptions::default()
    };

    let err = fast_bundle_labeling(
        &connectomist,
        &harness.path().join("10"),
        &[harness.path().join("missing.bundles")],
        &harness.path().join("missing.trm"),
        &harness.path().join("missing.trm"),
        Some(SUBJECT),
        &options,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_labeling_with_custom_atlas() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let bundle = harness.touch("09/fibers.bundles");
    let to_t1 = harness.touch("reg/dw_to_t1.trm");
    let to_talairach = harness.touch("reg/t1_to_talairach.trm");
    let atlas_dir = harness.path().join("atlas");
    std::fs::create_dir_all(&atlas_dir).unwrap();
    let outdir = harness.path().join("10");
    let options = LabelingOptions {
        atlas: Atlas::Custom,
        custom_atlas_dir: Some(atlas_dir.clone()),
        resample_fibers: false,
        ..LabelingOptions::default()
    };

    fast_bundle_labeling(
        &connectomist,
        &outdir,
        &[bundle],
        &to_t1,
        &to_talairach,
        None,
        &options,
    )
    .await
    .unwrap();

    let values = parameter_values(outdir.join("DWI-Fast-Bundle-Labelling.py"));
    assert_eq!(values.get("atlasName"), Some(&ParamValue::Int(2)));
    assert_eq!(values.get("doResampling"), Some(&ParamValue::Int(0)));
    assert_eq!(
        values.get("customAtlasDirectory").and_then(ParamValue::as_str),
        Some(atlas_dir.to_str().unwrap())
    );
}

#[tokio::test]
async fn test_export_bundles_keeps_group_layout() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let labeling_dir = harness.path().join("10");
    for group in ["Uncinate_Left", "Fornix_Right"] {
        harness.touch(&format!("10/bundleMapsReferential/{group}/{group}.bundles"));
        harness.touch(&format!("10/bundleMapsReferential/{group}/{group}.bundlesdata"));
    }
    let outdir = harness.path().join("out");

    let bundles = export_bundles_to_trk(&connectomist.ptk(), &labeling_dir, &outdir)
        .await
        .unwrap();

    assert_eq!(
        bundles,
        vec![
            outdir.join("bundles/Fornix_Right/Fornix_Right.trk"),
            outdir.join("bundles/Uncinate_Left/Uncinate_Left.trk"),
        ]
    );
    let conversions = harness.runner.calls_to("PtkDwiBundleOperator");
    assert_eq!(conversions.len(), 2);
    let fornix = labeling_dir.join("bundleMapsReferential/Fornix_Right/Fornix_Right.bundles");
    assert!(
        conversions[0]
            .args
            .contains(&fornix.to_string_lossy().into_owned())
    );
}

// ----------------------------------------------------------------
// Intra-subject clustering
// ----------------------------------------------------------------

fn clustering_inputs(harness: &TestHarness) -> ClusteringInputs {
    ClusteringInputs {
        bundle_map: harness.touch("09/fibers.bundles"),
        dw_to_t1: harness.touch("06/dw_to_t1.trm"),
        t1_to_talairach: harness.touch("06/t1_to_talairach.trm"),
        t2: harness.touch("06/t2.ima"),
        unbiased_t1: harness.touch("morpho/nobias.nii.gz"),
        voronoi_mask: harness.touch("morpho/voronoi.nii.gz"),
    }
}

#[tokio::test]
async fn test_clustering_runs_tab() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let inputs = clustering_inputs(&harness);
    let outdir = harness.path().join("11");

    intrasubject_fiber_clustering(
        &connectomist,
        &outdir,
        SUBJECT,
        &inputs,
        &ClusteringOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        harness.runner.algorithms(),
        vec!["DWI-Intra-Subject-Fiber-Clustering"]
    );
    let values = parameter_values(outdir.join("DWI-Intra-Subject-Fiber-Clustering.py"));
    assert_eq!(values.get("useROIMask"), Some(&ParamValue::Int(0)));
}

#[tokio::test]
async fn test_clustering_missing_roi_mask() {
    let harness = TestHarness::new();
    let connectomist = harness.connect().await;
    let inputs = clustering_inputs(&harness);
    let options = ClusteringOptions {
        roi: Some(RoiSelection {
            mask: harness.path().join("roi.nii.gz"),
            labels: vec![1],
            names: vec!["thalamus".to_string()],
        }),
        ..ClusteringOptions::default()
    };

    let err = intrasubject_fiber_clustering(
        &connectomist,
        &harness.path().join("11"),
        SUBJECT,
        &inputs,
        &options,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::BadFile { path } if path.ends_with("roi.nii.gz")));
    assert!(harness.runner.algorithms().is_empty());
}
