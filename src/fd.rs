//! C3: gradient and Laplacian finite-difference operators.

use nalgebra::DMatrix;

use crate::grid::{GeodeticGrid, Shape};

/// Gradient components on the gradient-interior shape.
pub(crate) struct Gradient {
    pub d_dlat: DMatrix<f64>,
    pub d_dlon: DMatrix<f64>,
}

/// Default 2nd-order central-difference gradient (§4.3).
pub(crate) fn gradient(grid: &GeodeticGrid, full: &DMatrix<f64>) -> Gradient {
    let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
    let mut d_dlat = DMatrix::zeros(rows, cols);
    let mut d_dlon = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
            d_dlat[(i, j)] = (full[(fi + 1, fj)] - full[(fi - 1, fj)]) / (2.0 * grid.dlat_km(fi));
            d_dlon[(i, j)] = (full[(fi, fj + 1)] - full[(fi, fj - 1)]) / (2.0 * grid.dlon_km(fi));
        }
    }
    Gradient { d_dlat, d_dlon }
}

/// 4th-order central-difference gradient, exposed as a diagnostic
/// alternative (§4.3); not wired into the default pipeline.
pub(crate) fn gradient_fourth_order(grid: &GeodeticGrid, full: &DMatrix<f64>) -> Gradient {
    let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
    let n_lat_grad = grid.n_lat_grad();
    let n_lon_grad = grid.n_lon_grad();
    let mut d_dlat = DMatrix::zeros(rows, cols);
    let mut d_dlon = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
            if fi >= 2 && fi + 2 < grid.n_lat() && n_lat_grad >= 2 {
                d_dlat[(i, j)] = (-full[(fi + 2, fj)] + 8.0 * full[(fi + 1, fj)]
                    - 8.0 * full[(fi - 1, fj)]
                    + full[(fi - 2, fj)])
                    / (12.0 * grid.dlat_km(fi));
            } else {
                d_dlat[(i, j)] = (full[(fi + 1, fj)] - full[(fi - 1, fj)]) / (2.0 * grid.dlat_km(fi));
            }
            if fj >= 2 && fj + 2 < grid.n_lon() && n_lon_grad >= 2 {
                d_dlon[(i, j)] = (-full[(fi, fj + 2)] + 8.0 * full[(fi, fj + 1)]
                    - 8.0 * full[(fi, fj - 1)]
                    + full[(fi, fj - 2)])
                    / (12.0 * grid.dlon_km(fi));
            } else {
                d_dlon[(i, j)] = (full[(fi, fj + 1)] - full[(fi, fj - 1)]) / (2.0 * grid.dlon_km(fi));
            }
        }
    }
    Gradient { d_dlat, d_dlon }
}

/// Converts a gradient-interior `(i, j)` index to the index that same
/// full-grid cell would have within gradient-interior shape, given an
/// arbitrary full-shape index.
fn gradient_interior_index(grid: &GeodeticGrid, full_i: usize, full_j: usize) -> (usize, usize) {
    (full_i - grid.n_lat_grad(), full_j - grid.n_lon_grad())
}

/// The default and normative Laplacian: Green's-theorem on a one-cell
/// rectangular loop (§4.3). Takes the gradient-interior arrays and
/// produces the Laplacian-interior shape.
pub(crate) fn laplacian_green(grid: &GeodeticGrid, grad: &Gradient) -> DMatrix<f64> {
    let (rows, cols) = grid.shape_dims(Shape::LaplacianInterior);
    let mut lplc = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::LaplacianInterior, i, j);
            let (gi_n, gj_n) = gradient_interior_index(grid, fi + 1, fj);
            let (gi_s, gj_s) = gradient_interior_index(grid, fi - 1, fj);
            let (gi_e, gj_e) = gradient_interior_index(grid, fi, fj + 1);
            let (gi_w, gj_w) = gradient_interior_index(grid, fi, fj - 1);

            let d_dlon_e = grad.d_dlon[(gi_e, gj_e)];
            let d_dlon_w = grad.d_dlon[(gi_w, gj_w)];
            let d_dlat_n = grad.d_dlat[(gi_n, gj_n)];
            let d_dlat_s = grad.d_dlat[(gi_s, gj_s)];

            let dlat_km = grid.dlat_km(fi);
            let dlon_km = grid.dlon_km(fi);

            lplc[(i, j)] = ((d_dlon_e - d_dlon_w) * dlat_km + (d_dlat_n - d_dlat_s) * dlon_km)
                / (dlat_km * dlon_km);
        }
    }
    lplc
}

/// Direct second-difference Laplacian, exposed purely as a diagnostic
/// (§4.3); never wired into the default QC path.
pub(crate) fn laplacian_direct(grid: &GeodeticGrid, full: &DMatrix<f64>) -> DMatrix<f64> {
    let (rows, cols) = grid.shape_dims(Shape::LaplacianInterior);
    let mut lplc = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let (fi, fj) = grid.full_index(Shape::LaplacianInterior, i, j);
            let dlat_km = grid.dlat_km(fi);
            let dlon_km = grid.dlon_km(fi);
            let d2_dlat2 = (full[(fi + 1, fj)] - 2.0 * full[(fi, fj)] + full[(fi - 1, fj)])
                / (dlat_km * dlat_km);
            let d2_dlon2 = (full[(fi, fj + 1)] - 2.0 * full[(fi, fj)] + full[(fi, fj - 1)])
                / (dlon_km * dlon_km);
            lplc[(i, j)] = d2_dlat2 + d2_dlon2;
        }
    }
    lplc
}
