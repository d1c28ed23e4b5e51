//! C10: azimuth-binned anisotropic stacking on a coarsened grid.

use nalgebra::{DMatrix, DVector};

use crate::cfg::Config;
use crate::ensemble::EventEnsemble;
use crate::grid::Shape;
use crate::stack::{isotropic::StackedMap, sample_std};

/// A₀ + A₂·cos(2(θ − φ₂)) fit for one coarsened cell (§4.10, downstream fit).
#[derive(Debug, Clone, Copy)]
pub struct AnisotropicFit {
    pub a0: f64,
    pub a2: f64,
    pub phi2_deg: f64,
}

/// Azimuth-binned anisotropic stack (§4.10).
pub struct AnisotropicMap {
    pub n_coarse_lat: usize,
    pub n_coarse_lon: usize,
    pub n_bin: usize,
    /// Per-bin mean slowness perturbation, one `(n_coarse_lat, n_coarse_lon)` matrix per bin.
    pub delta_slowness: Vec<DMatrix<f64>>,
    /// Per-bin slowness standard error.
    pub slowness_sem: Vec<DMatrix<f64>>,
    /// Per-bin velocity standard error.
    pub velocity_sem: Vec<DMatrix<f64>>,
    /// Per-bin contributing-event histogram.
    pub histogram: Vec<DMatrix<usize>>,
    /// Total near-neighbor measurement count across all bins, per coarsened cell.
    pub n_total: DMatrix<usize>,
    /// Downstream `A0 + A2cos(2(theta-phi2))` fit, `None` where `Nbin_valid < 5`.
    pub fit: Vec<Option<AnisotropicFit>>,
}

/// Chooses the smallest odd window `>= 1` so `factor * cell_deg`
/// approximates `spacing_ani` (§4.10).
fn odd_factor(cell_deg: f64, spacing_ani: f64) -> usize {
    let raw = (spacing_ani / cell_deg).round().max(1.0) as usize;
    if raw % 2 == 0 {
        raw + 1
    } else {
        raw
    }
}

fn bin_of(az_deg: f64, n_bin: usize) -> usize {
    let width = 360.0 / n_bin as f64;
    let shifted = (az_deg + 180.0).rem_euclid(360.0);
    ((shifted / width) as usize).min(n_bin - 1)
}

/// Runs §4.10 against the ensemble that produced `isotropic`.
pub fn stack(ensemble: &EventEnsemble, isotropic: &StackedMap, cfg: &Config) -> AnisotropicMap {
    let grid = ensemble.grid();
    let (rows, cols) = grid.shape_dims(Shape::GradientInterior);

    let gy = odd_factor(grid.dlat(), cfg.spacing_ani);
    let gx = odd_factor(grid.dlon(), cfg.spacing_ani);
    let n_coarse_lat = rows.div_ceil(gy);
    let n_coarse_lon = cols.div_ceil(gx);
    let n_bin = cfg.n_bin;

    let mut delta_slowness = vec![DMatrix::zeros(n_coarse_lat, n_coarse_lon); n_bin];
    let mut slowness_sem = vec![DMatrix::zeros(n_coarse_lat, n_coarse_lon); n_bin];
    let mut velocity_sem = vec![DMatrix::zeros(n_coarse_lat, n_coarse_lon); n_bin];
    let mut histogram = vec![DMatrix::zeros(n_coarse_lat, n_coarse_lon); n_bin];
    let mut n_total = DMatrix::zeros(n_coarse_lat, n_coarse_lon);
    let mut fit = vec![None; n_coarse_lat * n_coarse_lon];

    for ci in 0..n_coarse_lat {
        for cj in 0..n_coarse_lon {
            let i0 = ci * gy;
            let i1 = (i0 + gy).min(rows);
            let j0 = cj * gx;
            let j1 = (j0 + gx).min(cols);

            // §4.10: accumulate contributing (non-outlier) events per bin.
            let mut bins: Vec<Vec<(f64, f64)>> = vec![Vec::new(); n_bin]; // (delta_s, appV)
            for i in i0..i1 {
                for j in j0..j1 {
                    let sbar_qc = isotropic.slowness[(i, j)];
                    if sbar_qc <= 0.0 {
                        continue;
                    }
                    for field in ensemble.fields() {
                        let idx = i * cols + j;
                        if field.reason_n[idx] != 0 {
                            continue;
                        }
                        let s = field.slowness[(i, j)];
                        // §9 Open Question: azi_amp_thresh is a *fractional*
                        // slowness-deviation reject, applied per contributing
                        // event before it is binned by azimuth.
                        if (s - sbar_qc).abs() / sbar_qc > cfg.azi_amp_thresh {
                            continue;
                        }
                        let az = field.az[(i, j)];
                        let b = bin_of(az, n_bin);
                        bins[b].push((s - sbar_qc, if s > 0.0 { 1.0 / s } else { 0.0 }));
                    }
                }
            }

            let mut total = 0usize;
            let mut valid_bins = 0usize;
            let mut design_rows: Vec<(f64, f64, f64, f64)> = Vec::new(); // (theta_rad, v_b, weight, _)

            for b in 0..n_bin {
                let n_b = bins[b].len();
                histogram[b][(ci, cj)] = n_b;
                total += n_b;

                if n_b < 2 {
                    continue;
                }

                let delta_s_vals: Vec<f64> = bins[b].iter().map(|&(d, _)| d).collect();
                let v_vals: Vec<f64> = bins[b].iter().map(|&(_, v)| v).collect();
                let delta_s_mean = delta_s_vals.iter().sum::<f64>() / n_b as f64;
                let v_mean = v_vals.iter().sum::<f64>() / n_b as f64;
                let s_std = sample_std(&delta_s_vals);
                let v_std = sample_std(&v_vals);
                let n_b_f = n_b as f64;

                if n_b < cfg.n_thresh {
                    continue;
                }

                delta_slowness[b][(ci, cj)] = delta_s_mean;
                slowness_sem[b][(ci, cj)] = s_std / n_b_f.sqrt();
                velocity_sem[b][(ci, cj)] = v_std / n_b_f.sqrt();
                valid_bins += 1;

                let width = 360.0 / n_bin as f64;
                let theta_deg = -180.0 + (b as f64 + 0.5) * width;
                let sem_b = velocity_sem[b][(ci, cj)];
                let weight = if sem_b > 0.0 { 1.0 / sem_b } else { 1.0 };
                design_rows.push((theta_deg.to_radians(), v_mean, weight, 0.0));
            }

            n_total[(ci, cj)] = total;
            if total < cfg.ntotal_thresh {
                for b in 0..n_bin {
                    delta_slowness[b][(ci, cj)] = 0.0;
                    slowness_sem[b][(ci, cj)] = 0.0;
                    velocity_sem[b][(ci, cj)] = 0.0;
                }
                continue;
            }

            if valid_bins >= 5 {
                fit[ci * n_coarse_lon + cj] = fit_anisotropy(&design_rows);
            }
        }
    }

    AnisotropicMap {
        n_coarse_lat,
        n_coarse_lon,
        n_bin,
        delta_slowness,
        slowness_sem,
        velocity_sem,
        histogram,
        n_total,
        fit,
    }
}

/// Weighted least-squares fit of `v(theta) = A0 + A2*cos(2(theta - phi2))`,
/// linearized as `A0 + C*cos(2 theta) + S*sin(2 theta)`.
///
/// Rows are pre-scaled by `sqrt(weight)` so that minimizing the ordinary
/// (unweighted) residual of the scaled system is equivalent to minimizing
/// the weighted residual of the original one; the scaled design matrix is
/// then solved via `nalgebra`'s QR decomposition, per §4.10.
fn fit_anisotropy(rows: &[(f64, f64, f64, f64)]) -> Option<AnisotropicFit> {
    let n = rows.len();
    if n < 3 {
        return None;
    }
    let mut design = DMatrix::zeros(n, 3);
    let mut y = DVector::zeros(n);
    for (row, &(theta, v, weight, _)) in rows.iter().enumerate() {
        let sqrt_w = weight.max(0.0).sqrt();
        design[(row, 0)] = sqrt_w;
        design[(row, 1)] = sqrt_w * (2.0 * theta).cos();
        design[(row, 2)] = sqrt_w * (2.0 * theta).sin();
        y[row] = sqrt_w * v;
    }

    let qr = design.qr();
    let q_t_y = qr.q().transpose() * &y;
    let solution = qr.r().solve_upper_triangular(&q_t_y)?;

    let a0 = solution[0];
    let c = solution[1];
    let s = solution[2];
    let a2 = c.hypot(s);
    let phi2_deg = 0.5 * s.atan2(c).to_degrees();

    Some(AnisotropicFit { a0, a2, phi2_deg })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_factor_rounds_up_even_choices() {
        assert_eq!(odd_factor(0.1, 0.3), 3);
        assert_eq!(odd_factor(0.2, 0.4), 1);
    }

    #[test]
    fn bin_of_wraps_around_180() {
        assert_eq!(bin_of(-180.0, 20), 0);
        assert_eq!(bin_of(179.9, 20), 19);
    }

    #[test]
    fn fit_recovers_pure_cos2theta_anisotropy() {
        let mut rows = Vec::new();
        for k in 0..12 {
            let theta = -std::f64::consts::PI + k as f64 * std::f64::consts::PI / 6.0;
            let v = 3.0 + 0.1 * (2.0 * theta).cos();
            rows.push((theta, v, 1.0, 0.0));
        }
        let fit = fit_anisotropy(&rows).unwrap();
        assert!((fit.a0 - 3.0).abs() < 1e-6);
        assert!((fit.a2 - 0.1).abs() < 1e-6);
    }
}
