//! The 'Fast bundle labeling' tab and the export of the labeled bundles.

use std::path::{Path, PathBuf};

use connectomist_core::filetools::bundle_to_trk;
use connectomist_core::{
    Connectomist, Error, ParameterSet, Ptk, Result, connectomist_flag, params, require_files,
};

use crate::choice::connectomist_choice;

/// Algorithm name of the 'Fast bundle labeling' tab.
pub const ALGORITHM: &str = "DWI-Fast-Bundle-Labelling";

/// Subdirectory of the labeling output holding one directory per bundle.
pub const LABELED_BUNDLES_DIR: &str = "bundleMapsReferential";

/// Bundles known to the Guevara atlases.
pub const BUNDLE_NAMES: [&str; 36] = [
    "Arcuate_Anterior_Left",
    "Arcuate_Anterior_Right",
    "Arcuate_Left",
    "Arcuate_Posterior_Left",
    "Arcuate_Posterior_Right",
    "Arcuate_Right",
    "Cingulum_Long_Left",
    "Cingulum_Long_Right",
    "Cingulum_Short_Left",
    "Cingulum_Short_Right",
    "Cingulum_Temporal_Left",
    "Cingulum_Temporal_Right",
    "CorpusCallosum_Body",
    "CorpusCallosum_Genu",
    "CorpusCallosum_Rostrum",
    "CorpusCallosum_Splenium",
    "CorticoSpinalTract_Left",
    "CorticoSpinalTract_Right",
    "Fornix_Left",
    "Fornix_Right",
    "InferiorFrontoOccipital_Left",
    "InferiorFrontoOccipital_Right",
    "InferiorLongitudinal_Left",
    "InferiorLongitudinal_Right",
    "ThalamicRadiations_Anterior_Left",
    "ThalamicRadiations_Anterior_Right",
    "ThalamicRadiations_Inferior_Left",
    "ThalamicRadiations_Inferior_Right",
    "ThalamicRadiations_Motor_Left",
    "ThalamicRadiations_Motor_Right",
    "ThalamicRadiations_Parietal_Left",
    "ThalamicRadiations_Parietal_Right",
    "ThalamicRadiations_Posterior_Left",
    "ThalamicRadiations_Posterior_Right",
    "Uncinate_Left",
    "Uncinate_Right",
];

connectomist_choice! {
    /// Bundle atlas.
    pub enum Atlas ("atlas name") {
        /// Long association bundles
        #[default]
        GuevaraLong = ("Guevara long bundle", 0),
        /// Short association bundles
        GuevaraShort = ("Guevara short bundle", 1),
        /// Atlas read from `custom_atlas_dir`
        Custom = ("custom", 2),
    }
}

/// Settings of the 'Fast bundle labeling' tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelingOptions {
    /// Atlas to label with.
    pub atlas: Atlas,
    /// Directory of the custom atlas; requires [`Atlas::Custom`].
    pub custom_atlas_dir: Option<PathBuf>,
    /// Bundles to extract, from [`BUNDLE_NAMES`]; empty keeps them all.
    pub bundle_names: Vec<String>,
    /// Fibers processed at once, bounds the memory use.
    pub fibers_per_batch: i64,
    /// Resample the fibers; needed unless they already have 21 points.
    pub resample_fibers: bool,
    /// Remove the temporary files.
    pub remove_temporary_files: bool,
}

impl Default for LabelingOptions {
    fn default() -> Self {
        Self {
            atlas: Atlas::default(),
            custom_atlas_dir: None,
            bundle_names: Vec::new(),
            fibers_per_batch: 50_000,
            resample_fibers: true,
            remove_temporary_files: true,
        }
    }
}

impl LabelingOptions {
    /// Checks the atlas and the bundle selection.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.custom_atlas_dir {
            if self.atlas != Atlas::Custom {
                return Err(Error::validation_field(
                    "atlas",
                    "'atlas' argument has to be set to 'custom' when setting 'custom_atlas_dir'.",
                ));
            }
            if !dir.is_dir() {
                return Err(Error::validation_field(
                    "custom_atlas_dir",
                    format!("'{}' is not a valid atlas directory.", dir.display()),
                ));
            }
        }
        if let Some(name) = self
            .bundle_names
            .iter()
            .find(|name| !BUNDLE_NAMES.contains(&name.as_str()))
        {
            return Err(Error::validation_field(
                "bundle_names",
                format!("'{name}' bundle name not supported (must be in {BUNDLE_NAMES:?})."),
            ));
        }
        Ok(())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the parameters of the 'Fast bundle labeling' tab.
pub fn labeling_parameters(
    outdir: &Path,
    bundle_maps: &[PathBuf],
    bundle_map_to_t1: &Path,
    t1_to_talairach: &Path,
    subject_id: Option<&str>,
    options: &LabelingOptions,
) -> ParameterSet {
    let custom_atlas_dir = options
        .custom_atlas_dir
        .as_deref()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    params! {
        "inputBundleMapFileNames" => join_paths(bundle_maps),
        "fileNameBundleMapToTalairachTransformation" => bundle_map_to_t1,
        "fileNameT1ToTalairachTransformation" => t1_to_talairach,
        "atlasName" => options.atlas.id(),
        "customAtlasDirectory" => custom_atlas_dir,
        "bundleNameSelection" => options.bundle_names.join(" "),
        "fiberCount" => options.fibers_per_batch,
        "doResampling" => connectomist_flag(options.resample_fibers),
        "removeTemporaryFiles" => options.remove_temporary_files,
        "outputWorkDirectory" => outdir,
        "_subjectName" => subject_id.unwrap_or_default(),
    }
}

/// Runs the 'Fast bundle labeling' tab on tracked bundle maps.
///
/// `bundle_map_to_t1` and `t1_to_talairach` are the transformations from
/// the bundle maps to the T1 and from the T1 to the Talairach space.
pub async fn fast_bundle_labeling(
    connectomist: &Connectomist,
    outdir: &Path,
    bundle_maps: &[PathBuf],
    bundle_map_to_t1: &Path,
    t1_to_talairach: &Path,
    subject_id: Option<&str>,
    options: &LabelingOptions,
) -> Result<PathBuf> {
    options.validate()?;
    require_files(bundle_maps)?;
    require_files([bundle_map_to_t1, t1_to_talairach])?;

    tracing::info!(
        subject = subject_id.unwrap_or_default(),
        atlas = %options.atlas,
        bundle_maps = bundle_maps.len(),
        "Labeling bundles"
    );
    let parameters = labeling_parameters(
        outdir,
        bundle_maps,
        bundle_map_to_t1,
        t1_to_talairach,
        subject_id,
        options,
    );
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}

/// Converts every labeled bundle to TrackVis.
///
/// `<labeling_dir>/bundleMapsReferential/<group>/<name>.bundles` becomes
/// `<outdir>/bundles/<group>/<name>.trk`. Returns the `.trk` files, sorted.
pub async fn export_bundles_to_trk(
    ptk: &Ptk,
    labeling_dir: &Path,
    outdir: &Path,
) -> Result<Vec<PathBuf>> {
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }
    let pattern = labeling_dir
        .join(LABELED_BUNDLES_DIR)
        .join("*")
        .join("*.bundlesdata")
        .to_string_lossy()
        .into_owned();
    let mut data_files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|_| Error::bad_file(&pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    data_files.sort();

    let mut trk_files = Vec::with_capacity(data_files.len());
    for data_file in data_files {
        let (Some(group), Some(name)) = (
            data_file.parent().and_then(Path::file_name),
            data_file.file_stem(),
        ) else {
            continue;
        };
        let group_dir = outdir.join("bundles").join(group);
        if !group_dir.is_dir() {
            std::fs::create_dir_all(&group_dir).map_err(|e| Error::io_with_path(e, &group_dir))?;
        }
        let bundle = data_file.with_extension("bundles");
        trk_files.push(bundle_to_trk(ptk, &bundle, &group_dir.join(name)).await?);
    }
    tracing::debug!(count = trk_files.len(), "Exported labeled bundles");
    Ok(trk_files)
}
