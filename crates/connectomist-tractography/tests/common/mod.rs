//! Common test utilities for the tractography integration tests.
//!
//! The harness lays out a preprocessed subject and a Morphologist database,
//! and fakes the toolkit with a [`ScriptedRunner`] writing the files each
//! tab would produce.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use connectomist_core::testing::{ScriptedRunner, arg_after};
use connectomist_core::{CommandOutput, Connectomist, Result};
use connectomist_preproc::STEPS;
use connectomist_tractography::LocalModel;
use tempfile::TempDir;

/// Subject used across the suite.
pub const SUBJECT: &str = "jp110183";

/// Files written by the 'Anatomy & Talairach' tab.
pub const REGISTRATION_FILES: [&str; 7] = [
    "dw_talairach.ima",
    "mask_talairach.ima",
    "t1.ima",
    "t2_talairach.ima",
    "talairach_to_t1.trm",
    "dw_to_t1.trm",
    "t1_to_dw.trm",
];

/// Labeled bundles written by the fake labeling tab.
pub const LABELED_BUNDLES: [&str; 2] = ["Arcuate_Left", "CorpusCallosum_Body"];

/// Test harness owning a temporary work area and the scripted toolkit.
pub struct TestHarness {
    /// Temporary directory holding the inputs, launcher and outputs
    pub dir: TempDir,
    /// The scripted toolkit, shared with the wrapper
    pub runner: Arc<ScriptedRunner>,
}

impl TestHarness {
    /// Creates a harness answering like a working installation.
    pub fn new() -> Self {
        Self::with_runner(fake_toolkit(ScriptedRunner::new()))
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

    /// Creates an empty file, and its parent directories.
    pub fn touch(&self, relative: &str) -> PathBuf {
        let path = self.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();
        path
    }

    /// Lays out a `complete_preprocessing` output directory.
    pub fn preprocessed(&self) -> PathBuf {
        let preproc = self.path().join("preproc");
        for step in STEPS {
            std::fs::create_dir_all(preproc.join(step)).unwrap();
        }
        for name in REGISTRATION_FILES {
            std::fs::write(preproc.join(STEPS[5]).join(name), b"").unwrap();
        }
        preproc
    }

    /// The 'Anatomy & Talairach' directory of [`preprocessed`](Self::preprocessed).
    pub fn registration_dir(&self) -> PathBuf {
        self.path().join("preproc").join(STEPS[5])
    }

    /// Lays out the Morphologist files of [`SUBJECT`].
    pub fn morphologist(&self) -> PathBuf {
        let acquisition = format!("morpho/{SUBJECT}/t1mri/default_acquisition");
        self.touch(&format!("{acquisition}/{SUBJECT}.APC"));
        self.touch(&format!("{acquisition}/default_analysis/nobias_{SUBJECT}.han"));
        self.touch(&format!(
            "{acquisition}/default_analysis/nobias_{SUBJECT}.nii.gz"
        ));
        self.touch(&format!(
            "{acquisition}/default_analysis/segmentation/voronoi_{SUBJECT}.nii.gz"
        ));
        self.touch(&format!(
            "{acquisition}/registration/RawT1-{SUBJECT}_default_acquisition_TO_Talairach-ACPC.trm"
        ));
        self.path().join("morpho")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds the tab and PTK emulation rules after the rules of `runner`.
pub fn fake_toolkit(runner: ScriptedRunner) -> ScriptedRunner {
    runner
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

fn write_bundle(stem: &Path) -> Result<()> {
    std::fs::write(stem.with_extension("bundles"), b"attributes = {}\n")?;
    std::fs::write(stem.with_extension("bundlesdata"), b"fibers")?;
    Ok(())
}

/// Writes the files later steps read from each tab's output directory.
pub fn emulate_tab(_program: &str, args: &[String]) -> Result<CommandOutput> {
    let algorithm = arg_after(args, "-p").unwrap_or_default();
    let outdir = arg_after(args, "-f")
        .and_then(|file| Path::new(file).parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    match algorithm {
        "DWI-Local-Modeling" => {
            for model in LocalModel::ALL {
                for suffix in [
                    "gfa.ima",
                    "adc.ima",
                    "rgb.ima",
                    "odf_site_map.sitemap",
                    "odf_texture_map.texturemap",
                ] {
                    std::fs::write(outdir.join(format!("{model}_{suffix}")), b"map")?;
                }
            }
        }
        "DWI-Tractography-Mask" => {
            std::fs::write(outdir.join("tractography_mask.ima"), b"mask")?;
        }
        "DWI-Tractography" => {
            write_bundle(&outdir.join("fibers_00"))?;
            write_bundle(&outdir.join("fibers_01"))?;
        }
        "DWI-Fast-Bundle-Labelling" => {
            for bundle in LABELED_BUNDLES {
                let group = outdir.join("bundleMapsReferential").join(bundle);
                std::fs::create_dir_all(&group)?;
                write_bundle(&group.join(bundle))?;
            }
        }
        _ => {}
    }
    Ok(CommandOutput::success(""))
}
