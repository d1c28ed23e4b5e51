//! C6: per-source Eikonal pipeline.
//!
//! Grounded on `original_source/field2d_earth.py`'s `eikonal_operator`:
//! interpolate twice, reject on tension disagreement and curvature,
//! reject on near-neighbor support, take the gradient of what survives,
//! derive slowness/azimuth/deflection, and gate on distance and physical
//! slowness range.

use log::{debug, info};
use nalgebra::DMatrix;

use crate::cfg::Config;
use crate::constants::Constants;
use crate::error::Error;
use crate::fd;
use crate::geo;
use crate::grid::{GeodeticGrid, Shape};
use crate::helmholtz::{self, HelmholtzResult};
use crate::interp;
use crate::qc::curvature;
use crate::qc::near_neighbor;
use crate::sample::{Period, SourceObservation};

/// Closed enumeration of `reason_n` codes (§3 data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReasonCode {
    Accepted = 0,
    TensionDisagreement = 1,
    NearNeighborInsufficient = 2,
    SlownessOutOfRange = 3,
    ZeroNeighbor = 4,
    EpicentralDistanceTooSmall = 5,
    CurvatureExceeded = 6,
    HelmholtzAmplitudeRejected = 7,
    HelmholtzNonPositiveRadicand = 8,
    SourceGloballyInvalidated = 9,
    CellGloballyDisabled = 10,
}

impl ReasonCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        use ReasonCode::*;
        Some(match code {
            0 => Accepted,
            1 => TensionDisagreement,
            2 => NearNeighborInsufficient,
            3 => SlownessOutOfRange,
            4 => ZeroNeighbor,
            5 => EpicentralDistanceTooSmall,
            6 => CurvatureExceeded,
            7 => HelmholtzAmplitudeRejected,
            8 => HelmholtzNonPositiveRadicand,
            9 => SourceGloballyInvalidated,
            10 => CellGloballyDisabled,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A fully QC'd per-source, per-period apparent-velocity field (C6).
///
/// All `DMatrix` fields here live on [`Shape::GradientInterior`].
pub struct EikonalField {
    grid: GeodeticGrid,
    pub evlo: f64,
    pub evla: f64,
    pub period: Period,

    /// The QC'd interpolated travel-time surface, full shape (§3: "carries
    /// the interpolated travel-time surface T").
    pub t: DMatrix<f64>,
    pub pro_angle: DMatrix<f64>,
    pub slowness: DMatrix<f64>,
    pub app_v: DMatrix<f64>,
    pub az: DMatrix<f64>,
    pub baz: DMatrix<f64>,
    pub delta_az: DMatrix<f64>,
    /// `reason_n`, sized to [`Shape::GradientInterior`], row-major.
    pub reason_n: Vec<u8>,
    /// Full-shape reject mask; `true` on the border and wherever
    /// `reason_n != 0` in the interior (§4.6 step 9).
    pub mask: Vec<bool>,

    pub helmholtz: Option<HelmholtzResult>,

    n_total_grd: usize,
    n_valid_grd: usize,
}

impl EikonalField {
    /// Runs the full per-source pipeline (§4.6 steps 1-10).
    pub fn build(grid: &GeodeticGrid, cfg: &Config, period: Period, obs: &SourceObservation) -> Result<Self, Error> {
        if obs.travel_time.len() < cfg.min_data_points {
            return Err(Error::InsufficientData {
                period_s: period.seconds(),
                have: obs.travel_time.len(),
                need: cfg.min_data_points,
            });
        }

        let interpolated = interp::interpolate(grid, &obs.travel_time)?;

        // §4.4 rule 1: tension disagreement.
        let tension_qc = curvature::tension_disagreement(
            &interpolated.t0,
            &interpolated.t02,
            Constants::TENSION_DISAGREEMENT_S,
        );
        let mut reason_n = tension_qc.reason_n;
        let mut t_qc = tension_qc.t_qc;

        // §4.4 rule 2: curvature, computed from the raw (pre-QC) surface.
        let raw_gradient = fd::gradient(grid, &interpolated.t0);
        let raw_lplc = fd::laplacian_green(grid, &raw_gradient);
        curvature::apply_curvature_threshold(grid, &mut reason_n, &raw_lplc, cfg.lplc_threshold);

        // §4.5: near-neighbor support.
        let cdist_km = cfg.cdist_km(period.seconds());
        near_neighbor::apply(grid, &obs.travel_time, &mut reason_n, &mut t_qc, cdist_km);

        // §4.6 step 4: gradient of the QC'd surface.
        let gradient = fd::gradient(grid, &t_qc);
        let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
        let pro_angle = DMatrix::from_fn(rows, cols, |i, j| gradient.d_dlat[(i, j)].atan2(gradient.d_dlon[(i, j)]));

        // §4.6 step 5: zero-guard.
        let n_lon = grid.n_lon();
        let n_lat = grid.n_lat();
        for i in 0..rows {
            for j in 0..cols {
                let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
                if t_qc[(fi, fj)] != 0.0 {
                    continue;
                }
                for (di, dj) in [(1_i64, 0_i64), (-1, 0), (0, 1), (0, -1)] {
                    let ni = fi as i64 + di;
                    let nj = fj as i64 + dj;
                    if ni >= 0 && nj >= 0 && (ni as usize) < n_lat && (nj as usize) < n_lon {
                        reason_n[ni as usize * n_lon + nj as usize] = ReasonCode::ZeroNeighbor.code();
                    }
                }
            }
        }

        // §4.6 step 6: slowness gate.
        let mut slowness = DMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
                let s = gradient.d_dlat[(i, j)].hypot(gradient.d_dlon[(i, j)]);
                slowness[(i, j)] = s;
                let idx = fi * n_lon + fj;
                if reason_n[idx] == 0 && !(Constants::SLOWNESS_MIN..=Constants::SLOWNESS_MAX).contains(&s) {
                    reason_n[idx] = ReasonCode::SlownessOutOfRange.code();
                }
            }
        }

        // §4.6 step 7: azimuth and deflection.
        let mut az = DMatrix::zeros(rows, cols);
        let mut baz = DMatrix::zeros(rows, cols);
        let mut delta_az = DMatrix::zeros(rows, cols);
        let distance_gate_km = cdist_km + 50.0;
        for i in 0..rows {
            for j in 0..cols {
                let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
                let idx = fi * n_lon + fj;
                if reason_n[idx] != 0 {
                    continue;
                }
                let lat = grid.lat_at(fi);
                let lon = grid.lon_at(fj);
                let inv = geo::vincenty_inverse(lat, lon, obs.evla, obs.evlo);
                let (dist_km, az1_deg, az2_deg) = match inv {
                    Some(r) => (r.distance_km, r.azimuth1_deg, r.azimuth2_deg),
                    None => {
                        debug!("vincenty did not converge for cell ({lat}, {lon}); falling back to haversine");
                        (geo::haversine_km(lat, lon, obs.evla, obs.evlo), 0.0, 0.0)
                    }
                };
                let az_seis = geo::normalize_pm180(90.0 - (az1_deg + 180.0));
                az[(i, j)] = az_seis;
                baz[(i, j)] = az2_deg;
                delta_az[(i, j)] = geo::normalize_pm180(pro_angle[(i, j)].to_degrees() - az_seis);

                if dist_km < distance_gate_km {
                    reason_n[idx] = ReasonCode::EpicentralDistanceTooSmall.code();
                    delta_az[(i, j)] = 0.0;
                }
            }
        }

        // §4.6 step 8: apparent velocity.
        let app_v = slowness.map(|s| if s > 0.0 { 1.0 / s } else { 0.0 });

        // §4.6 step 9: full-shape mask.
        let mut interior_reason = vec![0u8; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                let (fi, fj) = grid.full_index(Shape::GradientInterior, i, j);
                interior_reason[i * cols + j] = reason_n[fi * n_lon + fj];
            }
        }
        let mask = grid.interior_mask_to_full(
            &interior_reason.iter().map(|&c| c != 0).collect::<Vec<_>>(),
            Shape::GradientInterior,
        );

        let n_total_grd = rows * cols;
        let n_valid_grd = interior_reason.iter().filter(|&&c| c == 0).count();

        info!(
            "source {}: period {period} n_total_grd={n_total_grd} n_valid_grd={n_valid_grd}",
            obs.source_id
        );

        // §4.6 step 10: optional Helmholtz correction.
        let helmholtz = match &obs.amplitude {
            Some(amp_samples) => Some(helmholtz::correct(
                grid,
                amp_samples,
                period,
                &app_v,
                &interior_reason,
            )?),
            None => None,
        };

        Ok(Self {
            grid: grid.clone(),
            evlo: obs.evlo,
            evla: obs.evla,
            period,
            t: t_qc,
            pro_angle,
            slowness,
            app_v,
            az,
            baz,
            delta_az,
            reason_n: interior_reason,
            mask,
            helmholtz,
            n_total_grd,
            n_valid_grd,
        })
    }

    pub fn grid(&self) -> &GeodeticGrid {
        &self.grid
    }

    pub fn n_total_grd(&self) -> usize {
        self.n_total_grd
    }

    pub fn n_valid_grd(&self) -> usize {
        self.n_valid_grd
    }

    pub fn coverage_ratio(&self) -> f64 {
        if self.n_total_grd == 0 {
            0.0
        } else {
            self.n_valid_grd as f64 / self.n_total_grd as f64
        }
    }

    /// Invalidates every cell (§4.8 coverage-ratio gate, code 9).
    pub(crate) fn invalidate_globally(&mut self) {
        for code in self.reason_n.iter_mut() {
            *code = ReasonCode::SourceGloballyInvalidated.code();
        }
        self.n_valid_grd = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ScatterSample;

    fn dense_grid() -> GeodeticGrid {
        GeodeticGrid::new(0.0, 4.0, 0.0, 4.0, 0.2, 0.2, 1, 1, 2, 2).unwrap()
    }

    fn dense_samples(slowness: f64) -> Vec<ScatterSample> {
        let mut out = Vec::new();
        for i in 0..=20 {
            for j in 0..=20 {
                let lat = 0.2 * i as f64;
                let lon = 0.2 * j as f64;
                // a plane wave travel time field with the given slowness,
                // in seconds, increasing with longitude.
                out.push(ScatterSample::new(lon, lat, slowness * lon * 111.0));
            }
        }
        out
    }

    #[test]
    fn accepts_well_covered_interior_cells() {
        let grid = dense_grid();
        let cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        let obs = SourceObservation::new(
            "evt1",
            -10.0,
            2.0,
            dense_samples(0.3),
            vec![],
        );
        let field = EikonalField::build(&grid, &cfg, Period::new(20.0), &obs).unwrap();
        assert!(field.n_valid_grd() > 0);
        assert!(field.n_valid_grd() <= field.n_total_grd());
    }

    #[test]
    fn rejects_when_too_few_samples() {
        let grid = dense_grid();
        let mut cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        cfg.min_data_points = 9999;
        let obs = SourceObservation::new("evt1", -10.0, 2.0, dense_samples(0.3), vec![]);
        let err = EikonalField::build(&grid, &cfg, Period::new(20.0), &obs).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }
}
