//! C4: tension-disagreement and curvature quality control.
//!
//! Grounded on `original_source/field2d_earth.py`'s `eikonal_operator`,
//! which zeroes a field value wherever the tension-0 and tension-0.2
//! interpolations disagree by more than a fixed threshold, before any
//! gradient is taken.

use nalgebra::DMatrix;

use crate::grid::{GeodeticGrid, Shape};

/// Tension-disagreement reject code (§4.4 rule 1).
pub(crate) const CODE_TENSION_DISAGREEMENT: u8 = 1;
/// Curvature (Laplacian) reject code (§4.4 rule 2).
pub(crate) const CODE_CURVATURE: u8 = 6;

/// Result of the tension-disagreement pass: a full-shape `reason_n` array
/// (row-major, `0` everywhere the cell survives) and the tension-0 surface
/// with rejected cells zeroed, ready for gradient computation.
pub(crate) struct TensionQc {
    pub reason_n: Vec<u8>,
    pub t_qc: DMatrix<f64>,
}

/// Applies §4.4 rule 1: zero any cell where `|t0 - t02|` exceeds
/// `threshold`. Use [`Constants::TENSION_DISAGREEMENT_S`](crate::constants::Constants::TENSION_DISAGREEMENT_S)
/// for travel-time fields, or `0.01 * median(amplitude)` for amplitude
/// fields.
pub(crate) fn tension_disagreement(t0: &DMatrix<f64>, t02: &DMatrix<f64>, threshold: f64) -> TensionQc {
    let (rows, cols) = t0.shape();
    let mut reason_n = vec![0u8; rows * cols];
    let mut t_qc = t0.clone();
    for i in 0..rows {
        for j in 0..cols {
            if (t0[(i, j)] - t02[(i, j)]).abs() > threshold {
                reason_n[i * cols + j] = CODE_TENSION_DISAGREEMENT;
                t_qc[(i, j)] = 0.0;
            }
        }
    }
    TensionQc { reason_n, t_qc }
}

/// Applies §4.4 rule 2 in place: cells still coded `0` whose
/// Laplacian-interior magnitude exceeds `lplc_threshold` are coded 6.
/// `lplc` is indexed on [`Shape::LaplacianInterior`].
pub(crate) fn apply_curvature_threshold(
    grid: &GeodeticGrid,
    reason_n: &mut [u8],
    lplc: &DMatrix<f64>,
    lplc_threshold: f64,
) {
    let n_lon = grid.n_lon();
    let (rows, cols) = grid.shape_dims(Shape::LaplacianInterior);
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::LaplacianInterior, i, j);
            let idx = fi * n_lon + fj;
            if reason_n[idx] == 0 && lplc[(i, j)].abs() > lplc_threshold {
                reason_n[idx] = CODE_CURVATURE;
            }
        }
    }
}

/// Median of a slice of finite values, used to derive the amplitude-field
/// tension-disagreement threshold (§4.4 rule 1).
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}
