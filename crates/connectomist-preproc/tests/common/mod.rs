//! Common test utilities for the preprocessing integration tests.
//!
//! The harness fakes a Connectomist installation: the launcher is a plain
//! file declaring its PTK release and every command goes through a
//! [`ScriptedRunner`] that writes the files the real tabs would produce.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use connectomist_core::testing::{ScriptedRunner, arg_after};
use connectomist_core::{CommandOutput, Connectomist, Result};
use connectomist_preproc::DwiInputs;
use tempfile::TempDir;

/// Test harness owning a temporary work area and the scripted toolkit.
pub struct TestHarness {
    /// Temporary directory holding inputs, launcher and outputs
    pub dir: TempDir,
    /// The scripted toolkit, shared with the wrapper
    pub runner: Arc<ScriptedRunner>,
}

impl TestHarness {
    /// Creates a harness answering like a working installation.
    pub fn new() -> Self {
        Self::with_runner(fake_toolkit())
    }

    /// Creates a harness around a custom runner.
    pub fn with_runner(runner: ScriptedRunner) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            runner: Arc::new(runner),
        }
    }

    /// Root of the work area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a launcher declaring PTK 5.0 and connects to it.
    pub async fn connect(&self) -> Connectomist {
        let launcher = self.path().join("connectomist");
        std::fs::write(&launcher, "#!/bin/bash\nexport PTK_RELEASE=5.0\n").unwrap();
        Connectomist::connect(&launcher, self.runner.clone())
            .await
            .unwrap()
    }

    /// Writes a single-shell series with two b = 0 volumes.
    pub fn dwi_inputs(&self) -> DwiInputs {
        let inputs = self.path().join("inputs");
        std::fs::create_dir_all(&inputs).unwrap();
        std::fs::write(inputs.join("dwi.nii.gz"), b"nifti").unwrap();
        std::fs::write(inputs.join("dwi.bval"), "0 1000 0 1000 1000\n").unwrap();
        std::fs::write(
            inputs.join("dwi.bvec"),
            "0 1 0 0 0\n0 0 0 1 0\n0 0 0 0 1\n",
        )
        .unwrap();
        DwiInputs::new(
            inputs.join("dwi.nii.gz"),
            inputs.join("dwi.bval"),
            inputs.join("dwi.bvec"),
        )
    }

    /// Adds separate magnitude and phase maps to `inputs`.
    pub fn with_field_maps(&self, inputs: DwiInputs) -> DwiInputs {
        let magnitude = self.path().join("inputs").join("b0_magnitude.nii.gz");
        let phase = self.path().join("inputs").join("b0_phase.nii.gz");
        std::fs::write(&magnitude, b"nifti").unwrap();
        std::fs::write(&phase, b"nifti").unwrap();
        inputs.with_b0_maps(Some(magnitude), Some(phase))
    }

    /// Creates an empty file, and its parent directories.
    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A toolkit where every tab and PTK tool succeeds and writes its outputs.
pub fn fake_toolkit() -> ScriptedRunner {
    ScriptedRunner::new()
        .on_args("-p", emulate_tab)
        .on_args("-o", write_output)
}

/// Writes the file named after `-o`, as the PTK converters do.
pub fn write_output(_program: &str, args: &[String]) -> Result<CommandOutput> {
    if let Some(output) = arg_after(args, "-o") {
        std::fs::write(output, b"volume")?;
    }
    Ok(CommandOutput::success(""))
}

/// Writes the files later steps read from each tab's output directory.
pub fn emulate_tab(_program: &str, args: &[String]) -> Result<CommandOutput> {
    let algorithm = arg_after(args, "-p").unwrap_or_default();
    let outdir = arg_after(args, "-f")
        .and_then(|file| Path::new(file).parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    match algorithm {
        "DWI-Data-Import-And-QSpace-Sampling" => {
            std::fs::write(
                outdir.join("acquisition_parameters.py"),
                "acquisitionParameters = {\n    'manufacturer': 'Siemens HealthCare',\n}\n",
            )?;
        }
        "DWI-Outlier-Detection" => {
            std::fs::write(outdir.join("outliers.py"), "outliers = {}\n")?;
        }
        "DWI-Eddy-Current-And-Motion-Correction" => {
            std::fs::write(outdir.join("t2_wo_eddy_current_and_motion.ima"), b"t2")?;
            std::fs::write(outdir.join("dw_wo_eddy_current_and_motion.ima"), b"dw")?;
            std::fs::write(
                outdir.join("dw_wo_eddy_current_and_motion.ima.minf"),
                "attributes = {\n    'bvalues': [1000.0, 1000.0, 1000.0],\n    \
                 'diffusion_gradient_orientations': [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], \
                 [0.0, 0.0, 0.5]],\n}\n",
            )?;
        }
        _ => {}
    }
    Ok(CommandOutput::success(""))
}
