//! C7: Helmholtz amplitude correction.
//!
//! Grounded on `original_source/field2d_earth.py`'s `get_lplc_amp`, which
//! normalizes the amplitude surface's Green's-Laplacian by `A * omega^2`
//! to produce a dimensionless correction term subtracted from `1/appV^2`.

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::error::Error;
use crate::fd;
use crate::grid::{GeodeticGrid, Shape};
use crate::qc::curvature;
use crate::sample::{Period, ScatterSample};

use crate::eikonal::ReasonCode;

/// Amplitude-corrected output of the Helmholtz equation, all arrays on
/// [`Shape::GradientInterior`].
pub struct HelmholtzResult {
    pub lplc_amp: DMatrix<f64>,
    pub cor_v: DMatrix<f64>,
    /// `reason_n_helm`, sized to [`Shape::GradientInterior`], row-major.
    pub reason_n_helm: Vec<u8>,
}

/// Runs §4.7: interpolates the amplitude surface, tension-QCs it with the
/// amplitude-specific threshold, then corrects `appV` cell by cell.
pub(crate) fn correct(
    grid: &GeodeticGrid,
    amplitude: &[ScatterSample],
    period: Period,
    app_v: &DMatrix<f64>,
    _travel_time_reason: &[u8],
) -> Result<HelmholtzResult, Error> {
    let interpolated = crate::interp::interpolate(grid, amplitude)?;

    let values: Vec<f64> = amplitude.iter().map(|s| s.value).collect();
    let threshold = 0.01 * curvature::median(&values);
    let tension_qc = curvature::tension_disagreement(&interpolated.t0, &interpolated.t02, threshold);
    let amp_reason_full = tension_qc.reason_n;
    let a_full = tension_qc.t_qc;

    let grad_a = fd::gradient(grid, &a_full);
    let lplc_amp = fd::laplacian_green(grid, &grad_a);

    let omega = 2.0 * PI / period.seconds();
    let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
    let n_lon = grid.n_lon();

    let mut cor_v = DMatrix::zeros(rows, cols);
    let mut reason_n_helm = vec![0u8; rows * cols];

    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
            let a = a_full[(fi, fj)];
            let idx = i * cols + j;

            if a == 0.0 || amp_reason_full[fi * n_lon + fj] != 0 {
                reason_n_helm[idx] = ReasonCode::HelmholtzAmplitudeRejected.code();
                cor_v[(i, j)] = app_v[(i, j)];
                continue;
            }

            let l = lplc_amp[(i, j)] / (a * omega * omega);
            if (l.abs() * 4.5) > 0.2 {
                reason_n_helm[idx] = ReasonCode::HelmholtzAmplitudeRejected.code();
                cor_v[(i, j)] = app_v[(i, j)];
                continue;
            }

            let app_v_cell = app_v[(i, j)];
            let radicand = if app_v_cell > 0.0 { 1.0 / (app_v_cell * app_v_cell) - l } else { f64::NEG_INFINITY };
            if radicand <= 0.0 {
                reason_n_helm[idx] = ReasonCode::HelmholtzNonPositiveRadicand.code();
                cor_v[(i, j)] = app_v_cell;
            } else {
                cor_v[(i, j)] = 1.0 / radicand.sqrt();
            }
        }
    }

    Ok(HelmholtzResult {
        lplc_amp,
        cor_v,
        reason_n_helm,
    })
}
