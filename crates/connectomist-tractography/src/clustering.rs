//! The 'Intra-subject fiber clustering' tab.
//!
//! Fibers are split in length groups, each group is parcellated with a
//! watershed on its connectivity matrix and the parcels are merged into
//! fascicles. Connectomist does the work; this module checks the settings
//! and writes them.
//!
//! The parameter keys of this tab have not been checked against a
//! Connectomist installation. They follow the naming of the other tabs
//! (`fileName*`, `minimum*`, `maximum*`, `*Count`), so a release using other
//! names will ignore them and run with its own defaults.

use std::path::{Path, PathBuf};

use connectomist_core::{
    Connectomist, Error, ParamValue, ParameterSet, Result, connectomist_flag, params,
    require_files,
};

use crate::choice::connectomist_choice;

/// Algorithm name of the 'Intra-subject fiber clustering' tab.
pub const ALGORITHM: &str = "DWI-Intra-Subject-Fiber-Clustering";

connectomist_choice! {
    /// Population the clustering thresholds are tuned for.
    pub enum SubjectType ("subject type") {
        /// Adult brain
        #[default]
        Adult = ("adult", 0),
        /// Child brain
        Child = ("child", 1),
    }
}

connectomist_choice! {
    /// Fiber representing each cluster.
    pub enum ClusterCentroid ("centroid type") {
        /// The cluster fiber closest to every other
        #[default]
        ClosestFiber = ("closest_fiber", 0),
        /// The point-wise mean of the cluster fibers
        MeanFiber = ("mean_fiber", 1),
    }
}

/// Files the clustering reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusteringInputs {
    /// Tracked bundle map (`.bundles`)
    pub bundle_map: PathBuf,
    /// DW to T1 transformation
    pub dw_to_t1: PathBuf,
    /// T1 to Talairach transformation
    pub t1_to_talairach: PathBuf,
    /// T2 (b = 0) volume
    pub t2: PathBuf,
    /// Bias corrected T1
    pub unbiased_t1: PathBuf,
    /// Morphologist hemisphere segmentation
    pub voronoi_mask: PathBuf,
}

/// Restricts the clustering to labeled regions of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiSelection {
    /// Label volume
    pub mask: PathBuf,
    /// Labels to keep
    pub labels: Vec<i64>,
    /// One name per label
    pub names: Vec<String>,
}

/// Settings of the 'Intra-subject fiber clustering' tab.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringOptions {
    /// Population the thresholds are tuned for.
    pub subject_type: SubjectType,
    /// Shortest fiber clustered, in mm.
    pub min_fiber_length: f64,
    /// Longest fiber clustered, in mm.
    pub max_fiber_length: f64,
    /// Length intervals clustered separately, in mm.
    pub length_groups: Vec<(f64, f64)>,
    /// Drop the fibers crossing the corpus callosum.
    pub discard_corpus_callosum_fibers: bool,
    /// Cluster the left hemisphere.
    pub segment_left_hemisphere: bool,
    /// Cluster the right hemisphere.
    pub segment_right_hemisphere: bool,
    /// Cluster the interhemispheric fibers.
    pub segment_interhemispheric: bool,
    /// Cluster the cerebellum.
    pub segment_cerebellum: bool,
    /// Points resampled along each fiber.
    pub voxel_sampler_point_count: i64,
    /// Fibers kept per voxel.
    pub fibers_per_voxel: i64,
    /// Connectivity below this value is ignored by the watershed.
    pub connectivity_matrix_threshold: f64,
    /// Smallest watershed parcel, in voxels.
    pub min_parcel_size: i64,
    /// Expected cluster size, in fibers.
    pub average_cluster_size: i64,
    /// Expected number of clusters per length group.
    pub average_cluster_count: i64,
    /// Smallest cluster kept, in fibers.
    pub min_cluster_size: i64,
    /// Fascicles closer than this are merged, in mm.
    pub max_distance_for_fascicle_merging: f64,
    /// Smallest bundle before the watershed, in fibers.
    pub min_fibers_per_bundle_before_watershed: i64,
    /// Smallest bundle after the watershed, in fibers.
    pub min_fibers_per_bundle_after_watershed: i64,
    /// Smallest bundle written out, in fibers.
    pub min_fibers_per_output_bundle: i64,
    /// Cluster each fascicle a second time.
    pub perform_second_clustering: bool,
    /// Share of each bundle extracted by the first clustering, in percent.
    pub first_clustering_extraction_percent: f64,
    /// Share of each bundle extracted by the second clustering, in percent.
    pub second_clustering_extraction_percent: f64,
    /// Clusters under this size are isolated, in fibers.
    pub isolated_cluster_size: i64,
    /// Representative fiber of each cluster.
    pub centroid: ClusterCentroid,
    /// Optional regions of interest.
    pub roi: Option<RoiSelection>,
    /// Remove the temporary files.
    pub remove_temporary_files: bool,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            subject_type: SubjectType::default(),
            min_fiber_length: 30.0,
            max_fiber_length: 300.0,
            length_groups: vec![(30.0, 50.0), (50.0, 80.0), (80.0, 120.0), (120.0, 300.0)],
            discard_corpus_callosum_fibers: false,
            segment_left_hemisphere: true,
            segment_right_hemisphere: true,
            segment_interhemispheric: true,
            segment_cerebellum: false,
            voxel_sampler_point_count: 21,
            fibers_per_voxel: 1,
            connectivity_matrix_threshold: 0.05,
            min_parcel_size: 100,
            average_cluster_size: 100,
            average_cluster_count: 100,
            min_cluster_size: 20,
            max_distance_for_fascicle_merging: 6.0,
            min_fibers_per_bundle_before_watershed: 20,
            min_fibers_per_bundle_after_watershed: 20,
            min_fibers_per_output_bundle: 20,
            perform_second_clustering: false,
            first_clustering_extraction_percent: 100.0,
            second_clustering_extraction_percent: 100.0,
            isolated_cluster_size: 5,
            centroid: ClusterCentroid::default(),
            roi: None,
            remove_temporary_files: true,
        }
    }
}

impl ClusteringOptions {
    /// Checks the length groups, the percentages and the ROI selection.
    pub fn validate(&self) -> Result<()> {
        if self.min_fiber_length >= self.max_fiber_length {
            return Err(Error::validation_field(
                "min_fiber_length",
                format!(
                    "Minimum fiber length {} must be below the maximum {}.",
                    self.min_fiber_length, self.max_fiber_length
                ),
            ));
        }
        if self.length_groups.is_empty() {
            return Err(Error::validation_field(
                "length_groups",
                "At least one length group is required.",
            ));
        }
        for &(lower, upper) in &self.length_groups {
            if lower >= upper || lower < self.min_fiber_length || upper > self.max_fiber_length {
                return Err(Error::validation_field(
                    "length_groups",
                    format!(
                        "Length group [{lower}, {upper}] is empty or outside [{}, {}].",
                        self.min_fiber_length, self.max_fiber_length
                    ),
                ));
            }
        }
        for (field, percent) in [
            (
                "first_clustering_extraction_percent",
                self.first_clustering_extraction_percent,
            ),
            (
                "second_clustering_extraction_percent",
                self.second_clustering_extraction_percent,
            ),
        ] {
            if !(percent > 0.0 && percent <= 100.0) {
                return Err(Error::validation_field(
                    field,
                    format!("{percent} is not a percentage in ]0, 100]."),
                ));
            }
        }
        if let Some(roi) = &self.roi {
            if roi.labels.is_empty() || roi.labels.len() != roi.names.len() {
                return Err(Error::validation_field(
                    "roi",
                    format!(
                        "Expected one name per ROI label, got {} labels and {} names.",
                        roi.labels.len(),
                        roi.names.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn length_groups_value(groups: &[(f64, f64)]) -> String {
    groups
        .iter()
        .map(|(lower, upper)| format!("{lower} {upper}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the parameters of the 'Intra-subject fiber clustering' tab.
pub fn clustering_parameters(
    outdir: &Path,
    inputs: &ClusteringInputs,
    subject_id: &str,
    options: &ClusteringOptions,
) -> ParameterSet {
    let mut parameters = params! {
        "_subjectName" => subject_id,
        "outputWorkDirectory" => outdir,
        "fileNameBundleMap" => &inputs.bundle_map,
        "fileNameDwToT1Transformation" => &inputs.dw_to_t1,
        "fileNameT1ToTalairachTransformation" => &inputs.t1_to_talairach,
        "fileNameT2" => &inputs.t2,
        "fileNameUnbiasedT1" => &inputs.unbiased_t1,
        "fileNameVoronoiMask" => &inputs.voronoi_mask,
        "subjectType" => options.subject_type.id(),
        "minimumFiberLength" => options.min_fiber_length,
        "maximumFiberLength" => options.max_fiber_length,
        "lengthGroups" => length_groups_value(&options.length_groups),
        "discardCorpusCallosumFibers" => connectomist_flag(options.discard_corpus_callosum_fibers),
        "segmentLeftHemisphere" => connectomist_flag(options.segment_left_hemisphere),
        "segmentRightHemisphere" => connectomist_flag(options.segment_right_hemisphere),
        "segmentInterhemispheric" => connectomist_flag(options.segment_interhemispheric),
        "segmentCerebellum" => connectomist_flag(options.segment_cerebellum),
        "voxelSamplerPointCount" => options.voxel_sampler_point_count,
        "fiberCountPerVoxel" => options.fibers_per_voxel,
        "connectivityMatrixThreshold" => options.connectivity_matrix_threshold,
        "minimumParcelSize" => options.min_parcel_size,
        "averageClusterSize" => options.average_cluster_size,
        "averageClusterCount" => options.average_cluster_count,
        "minimumClusterSize" => options.min_cluster_size,
        "maximumDistanceForFascicleMerging" => options.max_distance_for_fascicle_merging,
        "minimumFiberCountPerBundleBeforeWatershed" =>
            options.min_fibers_per_bundle_before_watershed,
        "minimumFiberCountPerBundleAfterWatershed" =>
            options.min_fibers_per_bundle_after_watershed,
        "minimumFiberCountPerOutputBundle" => options.min_fibers_per_output_bundle,
        "performSecondClustering" => connectomist_flag(options.perform_second_clustering),
        "firstClusteringBundleExtractionPercentage" =>
            options.first_clustering_extraction_percent,
        "secondClusteringBundleExtractionPercentage" =>
            options.second_clustering_extraction_percent,
        "isolatedClusterSmallSize" => options.isolated_cluster_size,
        "clusterCentroidType" => options.centroid.id(),
        "removeTemporaryFiles" => connectomist_flag(options.remove_temporary_files),
    };
    match &options.roi {
        Some(roi) => parameters
            .insert("useROIMask", connectomist_flag(true))
            .insert("fileNameROIMask", &roi.mask)
            .insert(
                "roiLabels",
                roi.labels.iter().map(|&label| ParamValue::Int(label)).collect::<Vec<_>>(),
            )
            .insert("roiNames", roi.names.clone()),
        None => parameters
            .insert("useROIMask", connectomist_flag(false))
            .insert("fileNameROIMask", "")
            .insert("roiLabels", Vec::<ParamValue>::new())
            .insert("roiNames", Vec::<String>::new()),
    };
    parameters
}

/// Runs the 'Intra-subject fiber clustering' tab on one bundle map.
pub async fn intrasubject_fiber_clustering(
    connectomist: &Connectomist,
    outdir: &Path,
    subject_id: &str,
    inputs: &ClusteringInputs,
    options: &ClusteringOptions,
) -> Result<PathBuf> {
    options.validate()?;
    require_files([
        &inputs.bundle_map,
        &inputs.dw_to_t1,
        &inputs.t1_to_talairach,
        &inputs.t2,
        &inputs.unbiased_t1,
        &inputs.voronoi_mask,
    ])?;
    if let Some(roi) = &options.roi {
        require_files([&roi.mask])?;
    }

    tracing::info!(
        subject = subject_id,
        length_groups = options.length_groups.len(),
        "Clustering fibers"
    );
    let parameters = clustering_parameters(outdir, inputs, subject_id, options);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}
