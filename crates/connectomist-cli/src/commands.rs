//! Pipeline subcommands: argument mapping and execution.

use std::io::Write;

use serde::Serialize;

use connectomist_core::Connectomist;
use connectomist_preproc::{
    DwiInputs, InvertAxes, PreprocessingRequest, QcReport, SusceptibilityOptions,
    complete_preprocessing,
};
use connectomist_tractography::{
    LabelingOptions, ModelOptions, TrackingOptions, TractographyMaskOptions, TractographyRequest,
    complete_labeling, complete_tractography,
};

use crate::cli::{LabelingArgs, PreprocArgs, TractographyArgs};

/// Builds the preprocessing request of `connectomist preproc`.
pub fn preprocessing_request(args: PreprocArgs) -> PreprocessingRequest {
    let inputs = DwiInputs::new(args.dwi, args.bval, args.bvec)
        .with_b0_maps(args.b0_magnitude, args.b0_phase);
    let susceptibility = SusceptibilityOptions {
        delta_te: args.delta_te,
        partial_fourier_factor: args.partial_fourier_factor,
        parallel_acceleration_factor: args.parallel_acceleration_factor,
        negative_sign: args.negative_sign,
        echo_spacing: args.echo_spacing,
        epi_factor: args.epi_factor,
        b0_field: args.b0_field,
        water_fat_shift: args.water_fat_shift,
    };
    let mut request = PreprocessingRequest::new(
        args.outdir,
        args.subject_id,
        inputs,
        args.manufacturer,
        susceptibility,
    );
    request.invert = InvertAxes {
        x: args.invert_x,
        y: args.invert_y,
        z: args.invert_z,
    };
    request.morphologist_dir = args.morphologist_dir;
    request.qc = args
        .qc_project
        .zip(args.qc_timestep)
        .map(|(project_name, timestep)| QcReport {
            project_name,
            timestep,
        });
    request.delete_steps = args.delete_steps;
    request
}

/// Builds the tractography request of `connectomist tractography`.
pub fn tractography_request(args: TractographyArgs) -> TractographyRequest {
    let mut request = TractographyRequest::new(
        args.outdir,
        args.preproc_dir,
        args.subject_id,
        args.morphologist_dir,
    );
    request.model = ModelOptions {
        model: args.model,
        order: args.order,
        aqbi_laplace_beltrami_sharpening: args.aqbi_sharpening,
        regularization_lcurve_factor: args.lcurve_factor,
        dti_estimator: args.dti_estimator,
        constrained_sd: args.constrained_sd,
        sd_kernel_type: args.sd_kernel_type,
        sd_kernel_lower_fa: args.sd_kernel_lower_fa,
        sd_kernel_upper_fa: args.sd_kernel_upper_fa,
        sd_kernel_voxel_count: args.sd_kernel_voxel_count,
        rgb_scale: args.rgb_scale,
        output_orientation_count: args.output_orientation_count,
    };
    request.mask = TractographyMaskOptions {
        add_cerebellum: args.add_cerebellum,
        add_commissures: args.add_commissures,
    };
    request.tracking = TrackingOptions {
        tracking_type: args.tracking_type,
        bundle_map_format: args.bundle_map_format,
        min_fiber_length: args.min_fiber_length,
        max_fiber_length: args.max_fiber_length,
        aperture_angle: args.aperture_angle,
        forward_step: args.forward_step,
        voxel_sampler_point_count: args.voxel_sampler_point_count,
        gibbs_temperature: args.gibbs_temperature,
        storing_increment: args.storing_increment,
        output_orientation_count: args.output_orientation_count,
    };
    request.model_only = args.model_only;
    request
}

/// Labeling options of `connectomist labeling`.
pub fn labeling_options(args: &LabelingArgs) -> LabelingOptions {
    LabelingOptions {
        atlas: args.atlas,
        custom_atlas_dir: args.custom_atlas_dir.clone(),
        bundle_names: args.bundle_names.clone(),
        fibers_per_batch: args.fibers_per_batch,
        resample_fibers: args.resample_fibers,
        remove_temporary_files: !args.keep_temporary_files,
    }
}

/// Runs `connectomist preproc` and prints the exported files.
pub async fn preproc(
    connectomist: &Connectomist,
    args: PreprocArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let request = preprocessing_request(args);
    let outputs = complete_preprocessing(connectomist, &request).await?;
    print_json(out, &outputs)
}

/// Runs `connectomist tractography` and prints the exported files.
pub async fn tractography(
    connectomist: &Connectomist,
    args: TractographyArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let request = tractography_request(args);
    let outputs = complete_tractography(connectomist, &request).await?;
    print_json(out, &outputs)
}

/// Runs `connectomist labeling` and prints the TrackVis bundles.
pub async fn labeling(
    connectomist: &Connectomist,
    args: LabelingArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let options = labeling_options(&args);
    let bundles = complete_labeling(
        connectomist,
        &args.outdir,
        &args.bundle_maps,
        &args.bundle_map_to_t1,
        &args.t1_to_talairach,
        args.subject_id.as_deref(),
        &options,
    )
    .await?;
    print_json(out, &bundles)
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
