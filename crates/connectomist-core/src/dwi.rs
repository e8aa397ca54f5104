//! Diffusion acquisition schemes: b-values and b-vectors.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};

/// Default threshold under which a non-zero b-value is rejected.
pub const DEFAULT_MIN_BVAL: f64 = 100.0;

/// A diffusion acquisition scheme read from FSL-style `.bval`/`.bvec` files.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionScheme {
    /// One b-value per volume
    pub bvals: Vec<f64>,
    /// One gradient direction per volume
    pub bvecs: Vec<[f64; 3]>,
}

impl DiffusionScheme {
    /// Number of volumes without diffusion weighting (b = 0).
    pub fn nb_nodiff(&self) -> usize {
        self.bvals.iter().filter(|&&b| b == 0.0).count()
    }

    /// Distinct non-zero b-values, in increasing order.
    pub fn shells(&self) -> Vec<f64> {
        let set: BTreeSet<u64> = self
            .bvals
            .iter()
            .filter(|&&b| b != 0.0)
            .map(|b| b.to_bits())
            .collect();
        let mut shells: Vec<f64> = set.into_iter().map(f64::from_bits).collect();
        shells.sort_by(f64::total_cmp);
        shells
    }

    /// Number of distinct non-zero b-values.
    pub fn nb_shells(&self) -> usize {
        self.shells().len()
    }

    /// Keeps a single b = 0 volume, first, followed by the diffusion
    /// weighted volumes in acquisition order.
    pub fn merge_nodiff(&self) -> DiffusionScheme {
        let mut bvals = vec![0.0];
        let mut bvecs = vec![[0.0; 3]];
        for (bval, bvec) in self.bvals.iter().zip(&self.bvecs) {
            if *bval != 0.0 {
                bvals.push(*bval);
                bvecs.push(*bvec);
            }
        }
        DiffusionScheme { bvals, bvecs }
    }

    /// Writes the scheme to `.bval` and `.bvec` files.
    pub fn write(&self, bval_path: &Path, bvec_path: &Path) -> Result<()> {
        write_bvals(bval_path, &self.bvals)?;
        write_bvecs(bvec_path, &self.bvecs)
    }
}

/// Parses a whitespace separated numeric table, one row per non-empty line.
fn load_table(path: &Path) -> Result<Vec<Vec<f64>>> {
    let content = std::fs::read_to_string(path).map_err(|_| Error::bad_file(path))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .map(|token| token.parse::<f64>().map_err(|_| Error::bad_file(path)))
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

/// Reads b-values and b-vectors and checks that they describe the same
/// volumes.
///
/// b-vectors may be stored as N rows of 3 or as 3 rows of N; a 3 by 3 table
/// is read as one row per volume.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the tables have the wrong dimensions,
/// when their lengths differ, when there is no diffusion weighted volume or
/// when a non-zero b-value is under `min_bval`.
pub fn read_bvals_bvecs(bval_path: &Path, bvec_path: &Path, min_bval: f64) -> Result<DiffusionScheme> {
    let bval_table = load_table(bval_path)?;
    let bvec_table = load_table(bvec_path)?;

    let bvec_rows = bvec_table.len();
    let bvec_cols = bvec_table.first().map_or(0, Vec::len);
    if bvec_rows < 2 || bvec_cols < 2 || bvec_table.iter().any(|row| row.len() != bvec_cols) {
        return Err(Error::validation_field(
            "bvec",
            format!(
                "b-vectors file should be saved as a two dimensional array: '{}'.",
                bvec_path.display()
            ),
        ));
    }
    let is_column = bval_table.iter().all(|row| row.len() == 1);
    if !(bval_table.len() == 1 || is_column) {
        return Err(Error::validation_field(
            "bval",
            format!(
                "b-values file should be saved as a one dimensional array: '{}'.",
                bval_path.display()
            ),
        ));
    }
    let bvals: Vec<f64> = bval_table.into_iter().flatten().collect();

    let rows: Vec<Vec<f64>> = if bvec_cols > bvec_rows || (bvec_rows == 3 && bvec_cols != 3) {
        (0..bvec_cols)
            .map(|col| bvec_table.iter().map(|row| row[col]).collect())
            .collect()
    } else {
        bvec_table
    };
    if rows.len() != bvals.len() {
        return Err(Error::validation(
            "b-values and b-vectors shapes do not correspond.",
        ));
    }
    let bvecs = rows
        .into_iter()
        .map(|row| <[f64; 3]>::try_from(row.as_slice()))
        .collect::<std::result::Result<Vec<[f64; 3]>, _>>()
        .map_err(|_| {
            Error::validation_field("bvec", "b-vectors should have three components.")
        })?;

    let scheme = DiffusionScheme { bvals, bvecs };
    let smallest = scheme.shells().first().copied().ok_or_else(|| {
        Error::validation_field(
            "bval",
            format!("No diffusion weighted volume in '{}'.", bval_path.display()),
        )
    })?;
    if smallest < min_bval {
        return Err(Error::validation_field(
            "bval",
            format!(
                "Small b-values detected (<{min_bval}) in '{}'.",
                bval_path.display()
            ),
        ));
    }
    tracing::debug!(
        volumes = scheme.bvals.len(),
        nb_nodiff = scheme.nb_nodiff(),
        nb_shells = scheme.nb_shells(),
        "Read diffusion scheme"
    );
    Ok(scheme)
}

/// Writes b-values as integers on a single line.
pub fn write_bvals(path: &Path, bvals: &[f64]) -> Result<()> {
    let line = bvals
        .iter()
        .map(|b| format!("{}", *b as i64))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(path, format!("{line}\n")).map_err(|e| Error::io_with_path(e, path))
}

/// Writes b-vectors as three rows (x, y, z) with ten decimals.
pub fn write_bvecs(path: &Path, bvecs: &[[f64; 3]]) -> Result<()> {
    let mut content = String::new();
    for axis in 0..3 {
        let row = bvecs
            .iter()
            .map(|v| format!("{:.10}", v[axis]))
            .collect::<Vec<_>>()
            .join(" ");
        content.push_str(&row);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| Error::io_with_path(e, path))
}

/// Scales a direction to unit length.
pub fn normalize(vector: [f64; 3]) -> [f64; 3] {
    let norm = vector.iter().map(|c| c * c).sum::<f64>().sqrt();
    vector.map(|c| c / norm)
}
