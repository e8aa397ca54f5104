//! Runs the tractography steps on a preprocessed subject.

use std::path::{Path, PathBuf};

use serde::Serialize;

use connectomist_core::{Connectomist, Error, Result};
use connectomist_preproc::STEPS as PREPROC_STEPS;

use crate::labeling::{LabelingOptions, export_bundles_to_trk, fast_bundle_labeling};
use crate::mask::{
    TractographyMaskOptions, export_mask_to_nifti, t1_to_talairach_transform, tractography_mask,
};
use crate::model::{LocalModel, ModelOptions, dwi_local_modeling, export_scalars_to_nifti};
use crate::tracking::{TrackingOptions, TrackingType, tractography};

/// Step directory of the local model, `07-Local_modeling_<model>`.
pub fn model_step(model: LocalModel) -> String {
    format!("07-Local_modeling_{model}")
}

/// Step directory of the tractography mask.
pub const MASK_STEP: &str = "08-Tractography_mask";

/// Step directory of the tracking, `09-Tractography_<tracking type>`.
pub fn tracking_step(tracking_type: TrackingType) -> String {
    format!("09-Tractography_{tracking_type}")
}

/// Step directory of the bundle labeling.
pub const LABELING_STEP: &str = "10-Fast_bundle_labeling";

/// Transformation from the tracked bundle maps to the T1, in the
/// 'Anatomy & Talairach' directory.
pub const BUNDLE_MAP_TO_T1: &str = "dw_to_t1.trm";

/// Everything [`complete_tractography`] needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TractographyRequest {
    /// Directory receiving the step directories and the exported files.
    pub outdir: PathBuf,
    /// Output directory of `complete_preprocessing`.
    pub preproc_dir: PathBuf,
    /// Subject identifier.
    pub subject_id: String,
    /// Morphologist database, for the tractography mask and the Talairach
    /// transformation of the labeling.
    pub morphologist_dir: PathBuf,
    /// 'Local modeling' settings.
    pub model: ModelOptions,
    /// 'Tractography mask' settings.
    pub mask: TractographyMaskOptions,
    /// 'Tractography' settings.
    pub tracking: TrackingOptions,
    /// Stops after the local model.
    pub model_only: bool,
}

impl TractographyRequest {
    /// A request with the default options.
    pub fn new(
        outdir: impl Into<PathBuf>,
        preproc_dir: impl Into<PathBuf>,
        subject_id: impl Into<String>,
        morphologist_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            outdir: outdir.into(),
            preproc_dir: preproc_dir.into(),
            subject_id: subject_id.into(),
            morphologist_dir: morphologist_dir.into(),
            model: ModelOptions::default(),
            mask: TractographyMaskOptions::default(),
            tracking: TrackingOptions::default(),
            model_only: false,
        }
    }

    /// 'Local modeling' directory.
    pub fn model_dir(&self) -> PathBuf {
        self.outdir.join(model_step(self.model.model))
    }

    /// 'Tractography mask' directory.
    pub fn mask_dir(&self) -> PathBuf {
        self.outdir.join(MASK_STEP)
    }

    /// 'Tractography' directory.
    pub fn tracking_dir(&self) -> PathBuf {
        self.outdir.join(tracking_step(self.tracking.tracking_type))
    }

    /// 'Fast bundle labeling' directory.
    pub fn labeling_dir(&self) -> PathBuf {
        self.outdir.join(LABELING_STEP)
    }

    /// Preprocessing step directory `index` in its `STEPS`; it must exist.
    fn preproc_step(&self, index: usize, what: &str) -> Result<PathBuf> {
        let dir = self.preproc_dir.join(PREPROC_STEPS[index]);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::validation_field(
                "preproc_dir",
                format!(
                    "In '{}' can't detect Connectomist {what} folder '{}'.",
                    self.preproc_dir.display(),
                    PREPROC_STEPS[index]
                ),
            ))
        }
    }
}

/// Files produced by [`complete_tractography`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TractographyOutputs {
    /// Generalized fractional anisotropy, `<outdir>/gfa.nii.gz`
    pub gfa: PathBuf,
    /// Mean diffusivity, `<outdir>/md.nii.gz`
    pub md: PathBuf,
    /// Tractography mask, `<outdir>/mask.nii.gz`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<PathBuf>,
    /// Labeled bundles, `<outdir>/bundles/<group>/<name>.trk`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundles: Option<Vec<PathBuf>>,
}

/// Tracked bundle maps of a 'Tractography' directory: the `.bundles`
/// header of every `.bundlesdata` file, sorted.
pub fn tracked_bundle_maps(tracking_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = tracking_dir
        .join("*.bundlesdata")
        .to_string_lossy()
        .into_owned();
    let mut maps: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|_| Error::bad_file(&pattern))?
        .filter_map(|entry| entry.ok())
        .map(|data| data.with_extension("bundles"))
        .collect();
    maps.sort();
    Ok(maps)
}

/// Runs the tractography steps on the output of `complete_preprocessing`.
///
/// 1. detect the 'Anatomy & Talairach', 'Eddy current & motion' and
///    'Rough mask' preprocessing directories,
/// 2. estimate the local model,
/// 3. build the tractography mask from the Morphologist segmentation,
/// 4. track the fibers,
/// 5. label the bundles with the Guevara long bundle atlas, using the
///    Morphologist T1 to Talairach transformation,
/// 6. export `gfa.nii.gz`, `md.nii.gz`, `mask.nii.gz` and the labeled
///    bundles in TrackVis format.
///
/// Steps 3 to 5 and their exports are skipped with `model_only`.
pub async fn complete_tractography(
    connectomist: &Connectomist,
    request: &TractographyRequest,
) -> Result<TractographyOutputs> {
    let outdir = request.outdir.as_path();
    let subject_id = request.subject_id.as_str();
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }

    let registration_dir = request.preproc_step(5, "registration")?;
    request.preproc_step(4, "eddy motion correction")?;
    request.preproc_step(1, "rough mask")?;
    tracing::info!(
        subject = subject_id,
        model = %request.model.model,
        model_only = request.model_only,
        "Starting tractography"
    );

    let model_dir = request.model_dir();
    dwi_local_modeling(
        connectomist,
        &model_dir,
        &registration_dir,
        subject_id,
        &request.model,
    )
    .await?;

    let tracked_dirs = if request.model_only {
        None
    } else {
        let mask_dir = request.mask_dir();
        tractography_mask(
            connectomist,
            &mask_dir,
            subject_id,
            &request.morphologist_dir,
            request.mask,
        )
        .await?;

        let tracking_dir = request.tracking_dir();
        tractography(
            connectomist,
            &tracking_dir,
            subject_id,
            &mask_dir,
            request.model.model,
            &model_dir,
            &registration_dir,
            &request.tracking,
        )
        .await?;

        let labeling_dir = request.labeling_dir();
        fast_bundle_labeling(
            connectomist,
            &labeling_dir,
            &tracked_bundle_maps(&tracking_dir)?,
            &registration_dir.join(BUNDLE_MAP_TO_T1),
            &t1_to_talairach_transform(&request.morphologist_dir, subject_id),
            Some(subject_id),
            &LabelingOptions::default(),
        )
        .await?;
        Some((mask_dir, labeling_dir))
    };

    let ptk = connectomist.ptk();
    let scalars =
        export_scalars_to_nifti(&ptk, &model_dir, request.model.model, outdir, "gfa", "md")
            .await?;
    let (mask, bundles) = match tracked_dirs {
        Some((mask_dir, labeling_dir)) => (
            Some(export_mask_to_nifti(&ptk, &mask_dir, Some(outdir), "mask").await?),
            Some(export_bundles_to_trk(&ptk, &labeling_dir, outdir).await?),
        ),
        None => (None, None),
    };

    tracing::info!(subject = subject_id, gfa = %scalars.gfa.display(), "Tractography done");
    Ok(TractographyOutputs {
        gfa: scalars.gfa,
        md: scalars.md,
        mask,
        bundles,
    })
}

/// Labels bundle maps tracked outside [`complete_tractography`] and exports
/// the labeled bundles to `<outdir>/bundles`.
///
/// The labeling runs in `<outdir>/10-Fast_bundle_labeling`.
pub async fn complete_labeling(
    connectomist: &Connectomist,
    outdir: &Path,
    bundle_maps: &[PathBuf],
    bundle_map_to_t1: &Path,
    t1_to_talairach: &Path,
    subject_id: Option<&str>,
    options: &LabelingOptions,
) -> Result<Vec<PathBuf>> {
    let labeling_dir = outdir.join(LABELING_STEP);
    fast_bundle_labeling(
        connectomist,
        &labeling_dir,
        bundle_maps,
        bundle_map_to_t1,
        t1_to_talairach,
        subject_id,
        options,
    )
    .await?;
    export_bundles_to_trk(&connectomist.ptk(), &labeling_dir, outdir).await
}
