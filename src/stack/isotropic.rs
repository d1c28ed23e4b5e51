//! C9: two-pass azimuth-balanced weighted stacking.

use nalgebra::DMatrix;

use crate::constants::Constants;
use crate::ensemble::EventEnsemble;
use crate::grid::{GeodeticGrid, Shape};
use crate::sample::Period;
use crate::stack::within_azimuth_window;

/// Per-period isotropic stack (§4.9), all arrays on
/// [`Shape::GradientInterior`].
pub struct StackedMap {
    grid: GeodeticGrid,
    period: Period,
    /// QC'd weighted-mean slowness, s/km.
    pub slowness: DMatrix<f64>,
    /// Weighted standard deviation of slowness.
    pub slowness_std: DMatrix<f64>,
    /// Standard error of the mean of the isotropic velocity.
    pub sem: DMatrix<f64>,
    /// Isotropic velocity, km/s; `0.0` where masked.
    pub velocity: DMatrix<f64>,
    /// Raw (pre-outlier-rejection) contributing event count.
    pub raw_count: Vec<usize>,
    /// QC'd (post-outlier-rejection) contributing event count.
    pub qc_count: Vec<usize>,
    /// `true` where the cell has no surviving weight.
    pub mask: Vec<bool>,
}

impl StackedMap {
    pub fn grid(&self) -> &GeodeticGrid {
        &self.grid
    }

    pub fn period(&self) -> Period {
        self.period
    }
}

/// Runs §4.9 over every cell of the ensemble's shared gradient-interior
/// grid.
pub fn stack(ensemble: &EventEnsemble) -> StackedMap {
    let grid = ensemble.grid();
    let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
    let n_cells = rows * cols;

    let mut slowness = DMatrix::zeros(rows, cols);
    let mut slowness_std = DMatrix::zeros(rows, cols);
    let mut sem = DMatrix::zeros(rows, cols);
    let mut velocity = DMatrix::zeros(rows, cols);
    let mut raw_count = vec![0usize; n_cells];
    let mut qc_count = vec![0usize; n_cells];
    let mut mask = vec![true; n_cells];

    for i in 0..rows {
        for j in 0..cols {
            let idx = i * cols + j;
            let valid: Vec<usize> = ensemble
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| f.reason_n[idx] == 0)
                .map(|(k, _)| k)
                .collect();

            raw_count[idx] = valid.len();
            if valid.is_empty() {
                continue;
            }

            let az: Vec<f64> = valid.iter().map(|&k| ensemble.fields()[k].az[(i, j)]).collect();
            let s: Vec<f64> = valid.iter().map(|&k| ensemble.fields()[k].slowness[(i, j)]).collect();

            // Pass 1: azimuthal weights.
            let n = valid.len();
            let mut w: Vec<f64> = (0..n)
                .map(|a| {
                    let peers = (0..n)
                        .filter(|&b| within_azimuth_window(az[a], az[b], Constants::AZI_NEIGHBOR_WINDOW_DEG))
                        .count();
                    if peers <= 1 {
                        0.0
                    } else {
                        1.0 / peers as f64
                    }
                })
                .collect();

            // Pass 2: clamp tails and renormalize.
            let wbar = w.iter().sum::<f64>() / n as f64;
            let sigma_w = (w.iter().map(|v| (v - wbar).powi(2)).sum::<f64>() / n as f64).sqrt();
            let clamp = wbar + 3.0 * sigma_w;
            for v in w.iter_mut() {
                *v = v.min(clamp);
            }
            let wsum: f64 = w.iter().sum();
            if wsum > 0.0 {
                for v in w.iter_mut() {
                    *v /= wsum;
                }
            }

            let sbar = w.iter().zip(&s).map(|(wi, si)| wi * si).sum::<f64>();
            let m = w.iter().filter(|&&wi| wi > 0.0).count();

            let num = w.iter().zip(&s).map(|(wi, si)| wi * (si - sbar).powi(2)).sum::<f64>();
            let sigma_s = crate::qc::numeric::kish_variance(num, m).map(f64::sqrt).unwrap_or(0.0);

            // Outlier rejection and final recompute.
            let survivors: Vec<usize> = (0..n)
                .filter(|&a| w[a] > 0.0 && (sigma_s == 0.0 || (s[a] - sbar).abs() <= Constants::OUTLIER_SIGMA * sigma_s))
                .collect();
            qc_count[idx] = survivors.len();

            if survivors.is_empty() {
                continue;
            }

            let w_qc_sum: f64 = survivors.iter().map(|&a| w[a]).sum();
            let sbar_qc = if w_qc_sum > 0.0 {
                survivors.iter().map(|&a| w[a] * s[a]).sum::<f64>() / w_qc_sum
            } else {
                sbar
            };

            let vbar = if sbar_qc > 0.0 { 1.0 / sbar_qc } else { 0.0 };
            let m_qc = survivors.len();
            let sem_num = survivors
                .iter()
                .map(|&a| (w[a] * (1.0 / s[a] - vbar)).powi(2))
                .sum::<f64>();
            let sem_val = crate::qc::numeric::kish_sem(sem_num, w_qc_sum, m_qc).unwrap_or(0.0);

            slowness[(i, j)] = sbar_qc;
            slowness_std[(i, j)] = sigma_s;
            velocity[(i, j)] = vbar;
            sem[(i, j)] = sem_val;
            mask[idx] = w_qc_sum == 0.0;
        }
    }

    StackedMap {
        grid: grid.clone(),
        period: ensemble.period(),
        slowness,
        slowness_std,
        sem,
        velocity,
        raw_count,
        qc_count,
        mask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Config;
    use crate::eikonal::EikonalField;
    use crate::sample::{ScatterSample, SourceObservation};

    fn dense_grid() -> GeodeticGrid {
        GeodeticGrid::new(0.0, 4.0, 0.0, 4.0, 0.2, 0.2, 1, 1, 2, 2).unwrap()
    }

    fn dense_samples(slowness: f64) -> Vec<ScatterSample> {
        let mut out = Vec::new();
        for i in 0..=20 {
            for j in 0..=20 {
                let lat = 0.2 * i as f64;
                let lon = 0.2 * j as f64;
                out.push(ScatterSample::new(lon, lat, slowness * lon * 111.0));
            }
        }
        out
    }

    #[test]
    fn stacking_identical_sources_recovers_their_common_slowness() {
        let grid = dense_grid();
        let mut cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        cfg.threshmeasure = 1;
        cfg.min_raw_measurements = 0;
        let mut fields = Vec::new();
        for k in 0..6 {
            let evlo = -10.0 - 30.0 * k as f64;
            let obs = SourceObservation::new(format!("evt{k}"), evlo, 40.0, dense_samples(0.3), vec![]);
            if let Ok(field) = EikonalField::build(&grid, &cfg, crate::sample::Period::new(20.0), &obs) {
                fields.push(field);
            }
        }
        let ensemble = crate::ensemble::EventEnsemble::new(&grid, crate::sample::Period::new(20.0), fields, &cfg).unwrap();
        let stacked = stack(&ensemble);

        let any_unmasked = stacked.mask.iter().any(|m| !m);
        assert!(any_unmasked);
        for (idx, &masked) in stacked.mask.iter().enumerate() {
            if !masked {
                let i = idx / stacked.velocity.ncols();
                let j = idx % stacked.velocity.ncols();
                assert!((stacked.slowness[(i, j)] - 0.3).abs() < 0.05);
            }
        }
    }
}
