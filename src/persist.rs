//! Plain-data persistence views (§6 "Persisted state").
//!
//! This core does not implement the HDF5 schema — that mechanics lives
//! outside this crate (§1 Non-goals) — but it exposes flat, full-shape,
//! row-major views whose field names and reason-code integers match the
//! hierarchical contract in §6 verbatim, so a downstream persistence layer
//! can serialize them without this crate knowing about HDF5 or any other
//! container format.

use nalgebra::{DMatrix, Scalar};

use crate::eikonal::EikonalField;
use crate::grid::{GeodeticGrid, Shape};
use crate::stack::anisotropic::AnisotropicMap;
use crate::stack::isotropic::StackedMap;

/// Sentinel for promoted `reason_n`/`reason_n_helm` border cells: no
/// component of this core ever reasons about a border cell, so a border
/// read only ever sees this value, never a real reason code (§3 closed
/// enumeration tops out at 10).
pub const BORDER_REASON: u8 = u8::MAX;

fn matrix_row_major<T: Scalar + Copy>(m: &DMatrix<T>) -> Vec<T> {
    let (rows, cols) = m.shape();
    let mut out = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            out.push(m[(i, j)]);
        }
    }
    out
}

/// Promotes a row-major interior-shape slice to full shape, filling the
/// border with `fill`. Generic sibling of [`GeodeticGrid::interior_to_full`]
/// for non-`f64` element types (`u8` reason codes, `usize` counts, `bool`
/// masks).
fn promote_full<T: Copy>(grid: &GeodeticGrid, interior: &[T], shape: Shape, fill: T) -> Vec<T> {
    let (full_lat, full_lon) = grid.shape_dims(Shape::Full);
    let (rows, cols) = grid.shape_dims(shape);
    let mut full = vec![fill; full_lat * full_lon];
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(shape, i, j);
            full[fi * full_lon + fj] = interior[i * cols + j];
        }
    }
    full
}

/// Flat, full-shape, row-major view of one [`EikonalField`]. Field names
/// mirror §6's persisted contract: `{az, appV, reason_n, proAngle, baz, T,
/// n_total, n_valid, corV?, lplc_amp?, reason_n_helm?}`.
#[derive(Debug, Clone)]
pub struct PersistableEikonalField {
    pub n_lat: usize,
    pub n_lon: usize,
    pub az: Vec<f64>,
    pub app_v: Vec<f64>,
    /// Full-shape, border cells read [`BORDER_REASON`].
    pub reason_n: Vec<u8>,
    pub pro_angle: Vec<f64>,
    pub baz: Vec<f64>,
    /// The QC'd interpolated travel-time surface, already full shape.
    pub t: Vec<f64>,
    pub n_total: usize,
    pub n_valid: usize,
    pub cor_v: Option<Vec<f64>>,
    pub lplc_amp: Option<Vec<f64>>,
    /// Full-shape, border cells read [`BORDER_REASON`].
    pub reason_n_helm: Option<Vec<u8>>,
}

impl From<&EikonalField> for PersistableEikonalField {
    fn from(field: &EikonalField) -> Self {
        let grid = field.grid();
        let (n_lat, n_lon) = grid.shape_dims(Shape::Full);

        let (cor_v, lplc_amp, reason_n_helm) = match &field.helmholtz {
            Some(h) => (
                Some(matrix_row_major(&grid.interior_to_full(
                    &h.cor_v,
                    Shape::GradientInterior,
                    0.0,
                ))),
                Some(matrix_row_major(&grid.interior_to_full(
                    &h.lplc_amp,
                    Shape::GradientInterior,
                    0.0,
                ))),
                Some(promote_full(
                    grid,
                    &h.reason_n_helm,
                    Shape::GradientInterior,
                    BORDER_REASON,
                )),
            ),
            None => (None, None, None),
        };

        Self {
            n_lat,
            n_lon,
            az: matrix_row_major(&grid.interior_to_full(&field.az, Shape::GradientInterior, 0.0)),
            app_v: matrix_row_major(&grid.interior_to_full(&field.app_v, Shape::GradientInterior, 0.0)),
            reason_n: promote_full(grid, &field.reason_n, Shape::GradientInterior, BORDER_REASON),
            pro_angle: matrix_row_major(&grid.interior_to_full(&field.pro_angle, Shape::GradientInterior, 0.0)),
            baz: matrix_row_major(&grid.interior_to_full(&field.baz, Shape::GradientInterior, 0.0)),
            t: matrix_row_major(&field.t),
            n_total: field.n_total_grd(),
            n_valid: field.n_valid_grd(),
            cor_v,
            lplc_amp,
            reason_n_helm,
        }
    }
}

/// Flat, full-shape, row-major view of one [`StackedMap`] (§6: `{slowness,
/// slowness_std, Nmeasure, NmeasureQC, mask, vel_iso, vel_sem}`).
#[derive(Debug, Clone)]
pub struct PersistableStackedMap {
    pub n_lat: usize,
    pub n_lon: usize,
    pub slowness: Vec<f64>,
    pub slowness_std: Vec<f64>,
    pub n_measure: Vec<usize>,
    pub n_measure_qc: Vec<usize>,
    pub mask: Vec<bool>,
    pub vel_iso: Vec<f64>,
    pub vel_sem: Vec<f64>,
}

impl From<&StackedMap> for PersistableStackedMap {
    fn from(stacked: &StackedMap) -> Self {
        let grid = stacked.grid();
        let (n_lat, n_lon) = grid.shape_dims(Shape::Full);
        Self {
            n_lat,
            n_lon,
            slowness: matrix_row_major(&grid.interior_to_full(&stacked.slowness, Shape::GradientInterior, 0.0)),
            slowness_std: matrix_row_major(&grid.interior_to_full(
                &stacked.slowness_std,
                Shape::GradientInterior,
                0.0,
            )),
            n_measure: promote_full(grid, &stacked.raw_count, Shape::GradientInterior, 0usize),
            n_measure_qc: promote_full(grid, &stacked.qc_count, Shape::GradientInterior, 0usize),
            mask: promote_full(grid, &stacked.mask, Shape::GradientInterior, true),
            vel_iso: matrix_row_major(&grid.interior_to_full(&stacked.velocity, Shape::GradientInterior, 0.0)),
            vel_sem: matrix_row_major(&grid.interior_to_full(&stacked.sem, Shape::GradientInterior, 0.0)),
        }
    }
}

/// Flat, row-major view of one [`AnisotropicMap`] over its own coarsened
/// grid (§6: `{slownessAni, slownessAni_sem, velAni_sem, histArr,
/// NmeasureAni}`). Per-bin arrays are concatenated bin-major: bin `b`'s
/// `(n_coarse_lat, n_coarse_lon)` slice starts at offset
/// `b * n_coarse_lat * n_coarse_lon`.
#[derive(Debug, Clone)]
pub struct PersistableAnisotropicMap {
    pub n_coarse_lat: usize,
    pub n_coarse_lon: usize,
    pub n_bin: usize,
    pub slowness_ani: Vec<f64>,
    pub slowness_ani_sem: Vec<f64>,
    pub vel_ani_sem: Vec<f64>,
    pub hist_arr: Vec<usize>,
    pub n_measure_ani: Vec<usize>,
}

impl From<&AnisotropicMap> for PersistableAnisotropicMap {
    fn from(m: &AnisotropicMap) -> Self {
        let n_cells = m.n_coarse_lat * m.n_coarse_lon;
        let mut slowness_ani = Vec::with_capacity(m.n_bin * n_cells);
        let mut slowness_ani_sem = Vec::with_capacity(m.n_bin * n_cells);
        let mut vel_ani_sem = Vec::with_capacity(m.n_bin * n_cells);
        let mut hist_arr = Vec::with_capacity(m.n_bin * n_cells);
        for b in 0..m.n_bin {
            slowness_ani.extend(matrix_row_major(&m.delta_slowness[b]));
            slowness_ani_sem.extend(matrix_row_major(&m.slowness_sem[b]));
            vel_ani_sem.extend(matrix_row_major(&m.velocity_sem[b]));
            hist_arr.extend(matrix_row_major(&m.histogram[b]));
        }
        Self {
            n_coarse_lat: m.n_coarse_lat,
            n_coarse_lon: m.n_coarse_lon,
            n_bin: m.n_bin,
            slowness_ani,
            slowness_ani_sem,
            vel_ani_sem,
            hist_arr,
            n_measure_ani: matrix_row_major(&m.n_total),
        }
    }
}
