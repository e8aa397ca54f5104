//! Conversion, compression, splitting and concatenation of image files.
//!
//! Connectomist works on GIS volumes (`.ima` + `.dim` + `.minf`); data enter
//! and leave the pipeline as NIfTI. The conversions go through the PTK
//! command line tools.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::wrapper::Ptk;

const QUIET_ARGS: [&str; 4] = ["-verbose", "False", "-verbosePluginLoading", "False"];

fn quiet_args() -> impl Iterator<Item = String> {
    QUIET_ARGS.iter().map(|s| s.to_string())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Appends `suffix` to the file name unless it already ends with it.
pub fn ensure_suffix(path: &Path, suffix: &str) -> PathBuf {
    let text = path_arg(path);
    if text.ends_with(suffix) {
        path.to_path_buf()
    } else {
        PathBuf::from(format!("{text}{suffix}"))
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::bad_file(path))
    }
}

/// Converts a NIfTI volume to GIS with `PtkNifti2GisConverter`.
///
/// `.ima` is appended to `gis` when missing. Returns the GIS path.
pub async fn nifti_to_gis(ptk: &Ptk, nifti: &Path, gis: &Path) -> Result<PathBuf> {
    require_file(nifti)?;
    let gis = ensure_suffix(gis, ".ima");
    let args: Vec<String> = ["-i".to_string(), path_arg(nifti), "-o".to_string(), path_arg(&gis)]
        .into_iter()
        .chain(quiet_args())
        .collect();
    ptk.run("PtkNifti2GisConverter", &args).await?;
    Ok(gis)
}

/// Converts a GIS volume to NIfTI with `PtkGis2NiftiConverter`.
///
/// When `nifti` ends with `.gz` the converted file is gzip-compressed
/// afterwards. Returns the path of the final file.
pub async fn gis_to_nifti(ptk: &Ptk, gis: &Path, nifti: &Path) -> Result<PathBuf> {
    require_file(gis)?;
    let text = path_arg(nifti);
    let (stem, compress) = match text.strip_suffix(".gz") {
        Some(stem) => (stem.to_string(), true),
        None => (text, false),
    };
    let nifti = ensure_suffix(Path::new(&stem), ".nii");
    let args: Vec<String> = ["-i".to_string(), path_arg(gis), "-o".to_string(), path_arg(&nifti)]
        .into_iter()
        .chain(quiet_args())
        .collect();
    ptk.run("PtkGis2NiftiConverter", &args).await?;
    if compress {
        gz_compress(&nifti, true)
    } else {
        Ok(nifti)
    }
}

/// Gzips `file` to `<file>.gz`, removing the original when `clean` is set.
pub fn gz_compress(file: &Path, clean: bool) -> Result<PathBuf> {
    require_file(file)?;
    let gz_file = PathBuf::from(format!("{}.gz", file.display()));
    {
        let mut input = File::open(file).map_err(|e| Error::io_with_path(e, file))?;
        let output = File::create(&gz_file).map_err(|e| Error::io_with_path(e, &gz_file))?;
        let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
        std::io::copy(&mut input, &mut encoder).map_err(|e| Error::io_with_path(e, &gz_file))?;
        encoder
            .finish()
            .map_err(|e| Error::io_with_path(e, &gz_file))?;
    }
    if clean {
        std::fs::remove_file(file).map_err(|e| Error::io_with_path(e, file))?;
    }
    require_file(&gz_file)?;
    Ok(gz_file)
}

/// Concatenates volumes along `axis` with `PtkCat`.
///
/// Returns the output GIS path (`.ima` appended when missing).
pub async fn concatenate_volumes(
    ptk: &Ptk,
    inputs: &[PathBuf],
    output: &Path,
    axis: &str,
) -> Result<PathBuf> {
    for input in inputs {
        require_file(input)?;
    }
    let output = ensure_suffix(output, ".ima");
    let mut args = vec!["-i".to_string()];
    args.extend(inputs.iter().map(|p| path_arg(p)));
    args.extend([
        "-o".to_string(),
        path_arg(&output),
        "-t".to_string(),
        axis.to_string(),
    ]);
    args.extend(quiet_args());
    ptk.run("PtkCat", &args).await?;
    Ok(output)
}

/// Extracts the volume at `index` of a 4D GIS file with `PtkSubVolume`.
pub async fn extract_volume(
    ptk: &Ptk,
    input: &Path,
    output: &Path,
    index: usize,
) -> Result<PathBuf> {
    require_file(input)?;
    let output = ensure_suffix(output, ".ima");
    let args = sub_volume_args(input, &output, "-tIndices", &index.to_string());
    ptk.run("PtkSubVolume", &args).await?;
    Ok(output)
}

fn sub_volume_args(input: &Path, output: &Path, selector: &str, value: &str) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-o".to_string(),
        path_arg(output),
        selector.to_string(),
        value.to_string(),
        "-verbose".to_string(),
        "false".to_string(),
        "-verbosePluginLoading".to_string(),
        "false".to_string(),
    ]
}

/// Splits a GIS file holding the T2 volume followed by the diffusion
/// weighted volumes into two GIS files.
///
/// Returns the `(t2, dw)` output paths.
pub async fn split_t2_and_diffusion(
    ptk: &Ptk,
    t2_dw: &Path,
    t2_output: &Path,
    dw_output: &Path,
) -> Result<(PathBuf, PathBuf)> {
    require_file(t2_dw)?;
    if !path_arg(t2_dw).ends_with(".ima") {
        return Err(Error::bad_file(t2_dw));
    }
    let t2_output = ensure_suffix(t2_output, ".ima");
    let dw_output = ensure_suffix(dw_output, ".ima");

    ptk.run("PtkSubVolume", &sub_volume_args(t2_dw, &t2_output, "-tIndices", "0"))
        .await?;
    ptk.run("PtkSubVolume", &sub_volume_args(t2_dw, &dw_output, "-t", "1"))
        .await?;
    Ok((t2_output, dw_output))
}

/// Converts a Connectomist bundle map to a TrackVis `.trk` file with
/// `PtkDwiBundleOperator`.
pub async fn bundle_to_trk(ptk: &Ptk, bundle: &Path, trk: &Path) -> Result<PathBuf> {
    require_file(bundle)?;
    let trk = ensure_suffix(trk, ".trk");
    let args: Vec<String> = [
        "-i".to_string(),
        path_arg(bundle),
        "-o".to_string(),
        path_arg(&trk),
        "-op".to_string(),
        "fusion".to_string(),
        "-of".to_string(),
        "trkbundlemap".to_string(),
    ]
    .into_iter()
    .chain(quiet_args())
    .collect();
    ptk.run("PtkDwiBundleOperator", &args).await?;
    Ok(trk)
}

/// Reads the shape of a NIfTI image (`.nii` or `.nii.gz`) from its header.
pub fn nifti_shape(path: &Path) -> Result<Vec<usize>> {
    require_file(path)?;
    let header = nifti::NiftiHeader::from_file(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Unreadable NIfTI header");
        Error::bad_file(path)
    })?;
    let ndim = usize::from(header.dim[0]).min(7);
    Ok(header.dim[1..=ndim].iter().map(|&d| usize::from(d)).collect())
}
