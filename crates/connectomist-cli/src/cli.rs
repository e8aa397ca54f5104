//! Command-line arguments of the `connectomist` binary.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use connectomist_core::Manufacturer;
use connectomist_tractography::{
    Atlas, BundleMapFormat, DtiEstimator, LocalModel, SdKernel, TrackingType,
};

/// Connectomist/PTK diffusion pipelines
#[derive(Parser, Debug)]
#[command(name = "connectomist", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Connectomist launcher, overriding the configuration
    #[arg(long, global = true)]
    pub connectomist_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the preprocessing tabs on a diffusion series
    Preproc(PreprocArgs),
    /// Run the local model, tractography and labeling on a preprocessed subject
    Tractography(TractographyArgs),
    /// Label bundle maps and export them in TrackVis format
    Labeling(LabelingArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,
    /// Get a configuration value by dotted key
    Get {
        /// Dotted key, e.g. "logging.level"
        key: String,
    },
    /// Set a configuration value by dotted key
    Set {
        /// Dotted key, e.g. "environment.PTK_DIR"
        key: String,
        /// New value; booleans and numbers are detected
        value: String,
    },
    /// Create a default configuration file
    Init {
        /// Target file instead of the platform default
        #[arg(long)]
        file: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration as environment variables
    Export {
        /// Format as `--env KEY=VALUE` for `docker run`
        #[arg(long)]
        docker_env: bool,
    },
}

/// Arguments of `connectomist preproc`.
#[derive(Args, Debug)]
pub struct PreprocArgs {
    /// Directory receiving the step directories and the exported files
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Subject identifier
    #[arg(short, long)]
    pub subject_id: String,

    /// NIfTI diffusion weighted series
    #[arg(long)]
    pub dwi: PathBuf,

    /// Associated b-values
    #[arg(long)]
    pub bval: PathBuf,

    /// Associated b-vectors
    #[arg(long)]
    pub bvec: PathBuf,

    /// Scanner manufacturer: Bruker, GE, Philips or Siemens
    #[arg(short, long)]
    pub manufacturer: Manufacturer,

    /// B0 magnitude map; may hold the phase as a second volume
    #[arg(long)]
    pub b0_magnitude: Option<PathBuf>,

    /// B0 phase map
    #[arg(long)]
    pub b0_phase: Option<PathBuf>,

    /// Difference between the two echoes of the B0 magnitude map
    #[arg(long = "delta-te")]
    pub delta_te: Option<f64>,

    /// Fraction of the k-space plane acquired
    #[arg(long)]
    pub partial_fourier_factor: Option<f64>,

    /// Number of parallel acquisitions in the k-space plane
    #[arg(long)]
    pub parallel_acceleration_factor: Option<i64>,

    /// Time in ms between two consecutive k-space lines
    #[arg(long)]
    pub echo_spacing: Option<f64>,

    /// Echo train length (Philips)
    #[arg(long)]
    pub epi_factor: Option<i64>,

    /// B0 field intensity in tesla (Philips)
    #[arg(long, default_value_t = 3.0)]
    pub b0_field: f64,

    /// Water fat shift in pixels (Philips)
    #[arg(long, default_value_t = 4.68)]
    pub water_fat_shift: f64,

    /// Invert the unwarping direction
    #[arg(long)]
    pub negative_sign: bool,

    /// Invert the x axis of the diffusion model
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub invert_x: bool,

    /// Invert the y axis of the diffusion model
    #[arg(long)]
    pub invert_y: bool,

    /// Invert the z axis of the diffusion model
    #[arg(long)]
    pub invert_z: bool,

    /// Morphologist database; enables the registration on the anatomy
    #[arg(long)]
    pub morphologist_dir: Option<PathBuf>,

    /// Study name; writes the quality check report
    #[arg(long, requires = "qc_timestep", requires = "morphologist_dir")]
    pub qc_project: Option<String>,

    /// Acquisition time step of the quality check report, e.g. "M0"
    #[arg(long, requires = "qc_project")]
    pub qc_timestep: Option<String>,

    /// Remove the intermediate step directories
    #[arg(long)]
    pub delete_steps: bool,
}

/// Arguments of `connectomist tractography`.
#[derive(Args, Debug)]
pub struct TractographyArgs {
    /// Directory receiving the step directories and the exported files
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Output directory of `connectomist preproc`
    #[arg(short, long)]
    pub preproc_dir: PathBuf,

    /// Subject identifier
    #[arg(short, long)]
    pub subject_id: String,

    /// Morphologist database
    #[arg(short, long)]
    pub morphologist_dir: PathBuf,

    /// Local model: dot, sd, sdt, aqbi, sa-aqbi or dti
    #[arg(long, default_value_t = LocalModel::default())]
    pub model: LocalModel,

    /// Spherical harmonics order
    #[arg(long, default_value_t = 4)]
    pub order: i64,

    /// Laplace-Beltrami sharpening of the aQBI models
    #[arg(long, default_value_t = 0.0)]
    pub aqbi_sharpening: f64,

    /// L-curve regularization factor
    #[arg(long, default_value_t = 0.006)]
    pub lcurve_factor: f64,

    /// DTI estimator: linear or positive
    #[arg(long, default_value_t = DtiEstimator::default())]
    pub dti_estimator: DtiEstimator,

    /// Constrained spherical deconvolution
    #[arg(long)]
    pub constrained_sd: bool,

    /// Spherical deconvolution kernel: symmetric_tensor or normal
    #[arg(long, default_value_t = SdKernel::default())]
    pub sd_kernel_type: SdKernel,

    /// Lower FA bound of the kernel voxels
    #[arg(long, default_value_t = 0.65)]
    pub sd_kernel_lower_fa: f64,

    /// Upper FA bound of the kernel voxels
    #[arg(long, default_value_t = 0.85)]
    pub sd_kernel_upper_fa: f64,

    /// Number of kernel voxels
    #[arg(long, default_value_t = 300)]
    pub sd_kernel_voxel_count: i64,

    /// Add the cerebellum to the tractography mask
    #[arg(long)]
    pub add_cerebellum: bool,

    /// Add the commissures to the tractography mask
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub add_commissures: bool,

    /// Tracking algorithm: deterministic, regularized or probabilistic
    #[arg(long, default_value_t = TrackingType::default())]
    pub tracking_type: TrackingType,

    /// Format of the tracked bundle maps
    #[arg(long, default_value_t = BundleMapFormat::default())]
    pub bundle_map_format: BundleMapFormat,

    /// Shortest kept fiber, in mm
    #[arg(long, default_value_t = 5.0)]
    pub min_fiber_length: f64,

    /// Longest kept fiber, in mm
    #[arg(long, default_value_t = 300.0)]
    pub max_fiber_length: f64,

    /// Tracking aperture angle, in degrees
    #[arg(long, default_value_t = 30.0)]
    pub aperture_angle: f64,

    /// Tracking step, in mm
    #[arg(long, default_value_t = 0.2)]
    pub forward_step: f64,

    /// Seeds per voxel
    #[arg(long, default_value_t = 1)]
    pub voxel_sampler_point_count: i64,

    /// Temperature of the probabilistic tracking
    #[arg(long, default_value_t = 1.0)]
    pub gibbs_temperature: f64,

    /// Keep one point every `storing_increment` steps
    #[arg(long, default_value_t = 10)]
    pub storing_increment: i64,

    /// Number of sampled orientations of the model
    #[arg(long, default_value_t = 500)]
    pub output_orientation_count: i64,

    /// Scale of the RGB map
    #[arg(long, default_value_t = 1.0)]
    pub rgb_scale: f64,

    /// Stop after the local model
    #[arg(long)]
    pub model_only: bool,
}

/// Arguments of `connectomist labeling`.
#[derive(Args, Debug)]
pub struct LabelingArgs {
    /// Directory receiving the labeling directory and the TrackVis bundles
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Bundle map to label; repeat for several maps
    #[arg(short, long = "bundle-map", required = true)]
    pub bundle_maps: Vec<PathBuf>,

    /// Transformation from the bundle maps to the T1
    #[arg(long)]
    pub bundle_map_to_t1: PathBuf,

    /// Transformation from the T1 to the Talairach space
    #[arg(long)]
    pub t1_to_talairach: PathBuf,

    /// Subject identifier
    #[arg(short, long)]
    pub subject_id: Option<String>,

    /// Atlas: "Guevara long bundle", "Guevara short bundle" or "custom"
    #[arg(long, default_value_t = Atlas::default())]
    pub atlas: Atlas,

    /// Atlas directory, with `--atlas custom`
    #[arg(long)]
    pub custom_atlas_dir: Option<PathBuf>,

    /// Bundles to keep, comma separated; all of them when empty
    #[arg(long = "bundle-names", value_delimiter = ',')]
    pub bundle_names: Vec<String>,

    /// Fibers labeled per batch
    #[arg(long, default_value_t = 50_000)]
    pub fibers_per_batch: i64,

    /// Resample the fibers before labeling
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub resample_fibers: bool,

    /// Keep the temporary files of the labeling
    #[arg(long)]
    pub keep_temporary_files: bool,
}
