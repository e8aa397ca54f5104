//! The 'Local modeling' tab and the export of its scalar maps.

use std::path::{Path, PathBuf};

use serde::Serialize;

use connectomist_core::filetools::gis_to_nifti;
use connectomist_core::{Connectomist, Error, ParameterSet, Ptk, Result, params, require_files};

use crate::choice::connectomist_choice;

/// Algorithm name of the 'Local modeling' tab.
pub const ALGORITHM: &str = "DWI-Local-Modeling";

/// Spherical deconvolution filter, passed verbatim to Connectomist.
const SD_FILTER_COEFFICIENTS: &str = "1 1 1 0.5 0.1 0.02 0.002 0.0005 0.0001 0.00010.00001 \
                                      0.00001 0.00001 0.00001 0.00001 0.00001 0.00001";

connectomist_choice! {
    /// Local diffusion model (ODF type).
    pub enum LocalModel ("local DWI model") {
        /// Diffusion orientation transform
        Dot = ("dot", 0),
        /// Spherical deconvolution
        Sd = ("sd", 3),
        /// Sharpening deconvolution transform
        Sdt = ("sdt", 4),
        /// Analytical Q-ball imaging
        #[default]
        Aqbi = ("aqbi", 5),
        /// Solid angle analytical Q-ball imaging
        SaAqbi = ("sa-aqbi", 6),
        /// Diffusion tensor
        Dti = ("dti", 7),
    }
}

connectomist_choice! {
    /// Tensor estimator of the DTI model.
    pub enum DtiEstimator ("dti estimator") {
        /// Linear least squares
        #[default]
        Linear = ("linear", 0),
        /// Positive definite
        Positive = ("positive", 1),
    }
}

connectomist_choice! {
    /// Response kernel of the deconvolution models.
    pub enum SdKernel ("kernel") {
        /// Kernel estimated from a symmetric tensor
        #[default]
        SymmetricTensor = ("symmetric_tensor", 0),
        /// Normal kernel
        Normal = ("normal", 1),
    }
}

/// Settings of the 'Local modeling' tab.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    /// Model to estimate.
    pub model: LocalModel,
    /// Maximum spherical harmonic order of the ODF decomposition.
    pub order: i64,
    /// Laplace-Beltrami sharpening factor of the (sa-)aqbi models.
    pub aqbi_laplace_beltrami_sharpening: f64,
    /// L-curve regularization factor of the aqbi, sa-aqbi and sdt models.
    pub regularization_lcurve_factor: f64,
    /// DTI estimator.
    pub dti_estimator: DtiEstimator,
    /// Constrained spherical deconvolution.
    pub constrained_sd: bool,
    /// Deconvolution kernel.
    pub sd_kernel_type: SdKernel,
    /// Lower FA bound of the voxels used to estimate the kernel.
    pub sd_kernel_lower_fa: f64,
    /// Upper FA bound of the voxels used to estimate the kernel.
    pub sd_kernel_upper_fa: f64,
    /// Number of voxels used to estimate the kernel.
    pub sd_kernel_voxel_count: i64,
    /// Scale of the anisotropy RGB map drawn over the T1.
    pub rgb_scale: f64,
    /// Number of sphere points; 500 is a 2 degree resolution.
    pub output_orientation_count: i64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model: LocalModel::default(),
            order: 4,
            aqbi_laplace_beltrami_sharpening: 0.0,
            regularization_lcurve_factor: 0.006,
            dti_estimator: DtiEstimator::default(),
            constrained_sd: false,
            sd_kernel_type: SdKernel::default(),
            sd_kernel_lower_fa: 0.65,
            sd_kernel_upper_fa: 0.85,
            sd_kernel_voxel_count: 300,
            rgb_scale: 1.0,
            output_orientation_count: 500,
        }
    }
}

/// Files of the 'Anatomy & Talairach' directory the model is fitted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDwi {
    /// `dw_talairach.ima`
    pub dw: PathBuf,
    /// `mask_talairach.ima`
    pub mask: PathBuf,
    /// `t1.ima`
    pub t1: PathBuf,
    /// `t2_talairach.ima`
    pub t2: PathBuf,
    /// `talairach_to_t1.trm`
    pub dw_to_t1: PathBuf,
}

impl RegisteredDwi {
    /// Locates the files in `registered_dwi_dir`; each one must exist.
    pub fn locate(registered_dwi_dir: &Path) -> Result<Self> {
        let files = Self {
            dw: registered_dwi_dir.join("dw_talairach.ima"),
            mask: registered_dwi_dir.join("mask_talairach.ima"),
            t1: registered_dwi_dir.join("t1.ima"),
            t2: registered_dwi_dir.join("t2_talairach.ima"),
            dw_to_t1: registered_dwi_dir.join("talairach_to_t1.trm"),
        };
        require_files([&files.dw, &files.mask, &files.t1, &files.t2, &files.dw_to_t1])?;
        Ok(files)
    }
}

/// Builds the parameters of the 'Local modeling' tab.
///
/// Every model section is filled; Connectomist reads the one selected by
/// `odfType`.
pub fn local_modeling_parameters(
    outdir: &Path,
    inputs: &RegisteredDwi,
    subject_id: &str,
    options: &ModelOptions,
) -> ParameterSet {
    let order = options.order;
    let sharpening = options.aqbi_laplace_beltrami_sharpening;
    let lcurve = options.regularization_lcurve_factor;
    let constrained_sd = i64::from(options.constrained_sd);
    let kernel = options.sd_kernel_type.id();

    let mut parameters = params! {
        "_subjectName" => subject_id,
        "odfType" => options.model.id(),
        "viewType" => options.model.id(),
        "computeOdfVolume" => 0,
        "rgbScale" => options.rgb_scale,
        "outputOrientationCount" => options.output_orientation_count,
        "outputWorkDirectory" => outdir,
        "fileNameDw" => &inputs.dw,
        "fileNameMask" => &inputs.mask,
        "fileNameT1" => &inputs.t1,
        "fileNameT2" => &inputs.t2,
        "fileNameTransformationDwToT1" => &inputs.dw_to_t1,
    };
    parameters
        .extend(params! {
            "aqbiLaplaceBeltramiSharpeningFactor" => sharpening,
            "aqbiMaximumSHOrder" => order,
            "aqbiRegularizationLcurveFactor" => lcurve,
        })
        .extend(params! {
            "dotEffectiveDiffusionTime" => 25.0,
            "dotMaximumSHOrder" => order,
            "dotOdfComputation" => 2,
            "dotR0" => 12.0,
        })
        .extend(params! {
            "dsiFilteringDataBeforeFFT" => 2,
            "dsiMarginalOdf" => 2,
            "dsiMaximumR0" => 15.0,
            "dsiMinimumR0" => 1.0,
        })
        .extend(params! {
            "dtiEstimatorType" => options.dti_estimator.id(),
        })
        .extend(params! {
            "qbiEquatorPointCount" => 50,
            "qbiPhiFunctionAngle" => 0.0,
            "qbiPhiFunctionMaximumAngle" => 0.0,
            "qbiPhiFunctionType" => 0,
        })
        .extend(params! {
            "saAqbiLaplaceBeltramiSharpeningFactor" => sharpening,
            "saAqbiMaximumSHOrder" => order,
            "saAqbiRegularizationLcurveFactor" => lcurve,
        })
        .extend(params! {
            "sdFilterCoefficients" => SD_FILTER_COEFFICIENTS,
            "sdKernelLowerFAThreshold" => options.sd_kernel_lower_fa,
            "sdKernelType" => kernel,
            "sdKernelUpperFAThreshold" => options.sd_kernel_upper_fa,
            "sdKernelVoxelCount" => options.sd_kernel_voxel_count,
            "sdMaximumSHOrder" => order,
            "sdUseCSD" => constrained_sd,
        })
        .extend(params! {
            "sdtKernelLowerFAThreshold" => options.sd_kernel_lower_fa,
            "sdtKernelType" => kernel,
            "sdtKernelUpperFAThreshold" => options.sd_kernel_upper_fa,
            "sdtKernelVoxelCount" => options.sd_kernel_voxel_count,
            "sdtMaximumSHOrder" => order,
            "sdtRegularizationLcurveFactor" => lcurve,
            "sdtUseCSD" => constrained_sd,
        });
    parameters
}

/// Runs the 'Local modeling' tab on the output of the 'Anatomy & Talairach'
/// tab.
pub async fn dwi_local_modeling(
    connectomist: &Connectomist,
    outdir: &Path,
    registered_dwi_dir: &Path,
    subject_id: &str,
    options: &ModelOptions,
) -> Result<PathBuf> {
    let inputs = RegisteredDwi::locate(registered_dwi_dir)?;
    tracing::info!(
        subject = subject_id,
        model = %options.model,
        order = options.order,
        "Estimating local diffusion model"
    );
    let parameters = local_modeling_parameters(outdir, &inputs, subject_id, options);
    connectomist.run_tab(ALGORITHM, &parameters, outdir).await?;
    Ok(outdir.to_path_buf())
}

/// Scalar maps exported from a 'Local modeling' directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffusionScalars {
    /// Generalized fractional anisotropy
    pub gfa: PathBuf,
    /// Mean diffusivity
    pub md: PathBuf,
}

/// Converts the GFA (`<model>_gfa.ima`) and mean diffusivity
/// (`<model>_adc.ima`) maps to `<outdir>/<name>.nii.gz`.
pub async fn export_scalars_to_nifti(
    ptk: &Ptk,
    model_dir: &Path,
    model: LocalModel,
    outdir: &Path,
    gfa_filename: &str,
    md_filename: &str,
) -> Result<DiffusionScalars> {
    let gfa_gis = model_dir.join(format!("{model}_gfa.ima"));
    let md_gis = model_dir.join(format!("{model}_adc.ima"));
    require_files([&gfa_gis, &md_gis])?;
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }

    let gfa = gis_to_nifti(ptk, &gfa_gis, &outdir.join(format!("{gfa_filename}.nii.gz"))).await?;
    let md = gis_to_nifti(ptk, &md_gis, &outdir.join(format!("{md_filename}.nii.gz"))).await?;
    tracing::debug!(gfa = %gfa.display(), md = %md.display(), "Exported diffusion scalars");
    Ok(DiffusionScalars { gfa, md })
}
