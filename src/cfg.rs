//! C11: recognized configuration options (§6) and their defaults.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::Constants;
use crate::error::Error;

fn default_true() -> bool {
    false
}

fn default_min_data_points_earthquake() -> usize {
    50
}

fn default_coverage_threshold() -> f64 {
    Constants::DEFAULT_COVERAGE_THRESHOLD
}

fn default_threshmeasure() -> usize {
    Constants::DEFAULT_THRESHMEASURE
}

fn default_min_raw_measurements() -> usize {
    Constants::DEFAULT_MIN_RAW_MEASUREMENTS
}

fn default_lplc_threshold() -> f64 {
    Constants::DEFAULT_LPLC_THRESHOLD
}

fn default_n_bin() -> usize {
    Constants::DEFAULT_N_BIN
}

fn default_spacing_ani() -> f64 {
    Constants::DEFAULT_SPACING_ANI_DEG
}

fn default_ntotal_thresh() -> usize {
    Constants::DEFAULT_NTOTAL_THRESH
}

fn default_n_thresh() -> usize {
    Constants::DEFAULT_N_THRESH
}

fn default_azi_amp_thresh() -> f64 {
    Constants::DEFAULT_AZI_AMP_THRESH
}

fn default_n_grad() -> usize {
    1
}

fn default_n_lplc() -> usize {
    2
}

/// Engine-wide configuration. Every field here corresponds one-to-one to
/// an entry in §6's "Configuration (recognized options and their effects)"
/// table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Bounding box, degrees.
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    /// Nominal grid spacing, degrees.
    pub dlon: f64,
    pub dlat: f64,
    /// When true, `dlat` is adjusted so `dlat_km ≈ dlon_km` at the
    /// mid-box latitude instead of using `dlat` verbatim.
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub optimize_spacing: bool,
    /// Border widths lost to first/second derivatives.
    #[cfg_attr(feature = "serde", serde(default = "default_n_grad"))]
    pub n_lat_grad: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_n_grad"))]
    pub n_lon_grad: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_n_lplc"))]
    pub n_lat_lplc: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_n_lplc"))]
    pub n_lon_lplc: usize,
    /// Near-neighbor QC radius, km. `None` selects the period-dependent
    /// default `max(12*period/3, 150)`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cdist: Option<f64>,
    /// Minimum scatter samples required per source (50 for earthquakes,
    /// 10 for ambient-noise virtual sources — this core does not
    /// distinguish data provenance, callers pick the right default).
    #[cfg_attr(feature = "serde", serde(default = "default_min_data_points_earthquake"))]
    pub min_data_points: usize,
    /// Fraction of interior cells a source must validly cover (§4.8).
    #[cfg_attr(feature = "serde", serde(default = "default_coverage_threshold"))]
    pub coverage_threshold: f64,
    /// Minimum per-cell event count required to stack a period at all.
    #[cfg_attr(feature = "serde", serde(default = "default_threshmeasure"))]
    pub threshmeasure: usize,
    /// Minimum raw (`reason_n == 0`) measurements per cell before it is
    /// globally disabled (code 10).
    #[cfg_attr(feature = "serde", serde(default = "default_min_raw_measurements"))]
    pub min_raw_measurements: usize,
    /// Curvature (Laplacian) reject level, s/km^2.
    #[cfg_attr(feature = "serde", serde(default = "default_lplc_threshold"))]
    pub lplc_threshold: f64,
    /// Azimuth binning for anisotropic stacking.
    #[cfg_attr(feature = "serde", serde(default))]
    pub minazi: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub maxazi: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default = "default_n_bin"))]
    pub n_bin: usize,
    /// Coarsened anisotropic cell side, degrees.
    #[cfg_attr(feature = "serde", serde(default = "default_spacing_ani"))]
    pub spacing_ani: f64,
    /// Anisotropic count gates.
    #[cfg_attr(feature = "serde", serde(default = "default_ntotal_thresh"))]
    pub ntotal_thresh: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_n_thresh"))]
    pub n_thresh: usize,
    /// Fractional slowness-deviation threshold for azimuthal outlier
    /// rejection (§9 Open Question: fractional, not absolute).
    #[cfg_attr(feature = "serde", serde(default = "default_azi_amp_thresh"))]
    pub azi_amp_thresh: f64,
}

impl Config {
    /// A preset tuned for earthquake-sourced phase travel times, matching
    /// the defaults named throughout §4 and §6 of the spec.
    pub fn earthquake_preset(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, dlon: f64, dlat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
            dlon,
            dlat,
            optimize_spacing: false,
            n_lat_grad: default_n_grad(),
            n_lon_grad: default_n_grad(),
            n_lat_lplc: default_n_lplc(),
            n_lon_lplc: default_n_lplc(),
            cdist: None,
            min_data_points: default_min_data_points_earthquake(),
            coverage_threshold: default_coverage_threshold(),
            threshmeasure: default_threshmeasure(),
            min_raw_measurements: default_min_raw_measurements(),
            lplc_threshold: default_lplc_threshold(),
            minazi: -180.0,
            maxazi: None,
            n_bin: default_n_bin(),
            spacing_ani: default_spacing_ani(),
            ntotal_thresh: default_ntotal_thresh(),
            n_thresh: default_n_thresh(),
            azi_amp_thresh: default_azi_amp_thresh(),
        }
    }

    /// Near-neighbor QC radius for a given period, applying the
    /// period-dependent default when `cdist` is unset (§4.5).
    pub fn cdist_km(&self, period_s: f64) -> f64 {
        self.cdist.unwrap_or_else(|| (12.0 * period_s / 3.0).max(150.0))
    }

    pub fn maxazi(&self) -> f64 {
        self.maxazi.unwrap_or(self.minazi + 360.0)
    }

    /// Validates threshold/grid combinations that are cheap to catch
    /// before any computation begins.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dlon <= 0.0 || self.dlat <= 0.0 {
            return Err(Error::Config("dlon/dlat must be positive".to_string()));
        }
        if self.max_lon <= self.min_lon || self.max_lat <= self.min_lat {
            return Err(Error::Config("degenerate bounding box".to_string()));
        }
        if self.n_lat_lplc < self.n_lat_grad + 1 || self.n_lon_lplc < self.n_lon_grad + 1 {
            return Err(Error::Config(
                "n_lplc must be >= n_grad + 1 in both dimensions".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(Error::Config(
                "coverage_threshold must lie in [0, 1]".to_string(),
            ));
        }
        if self.n_bin == 0 {
            return Err(Error::Config("n_bin must be positive".to_string()));
        }
        if self.spacing_ani <= 0.0 {
            return Err(Error::Config("spacing_ani must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdist_uses_period_dependent_default() {
        let cfg = Config::earthquake_preset(0.0, 2.0, 0.0, 2.0, 0.2, 0.2);
        assert_eq!(cfg.cdist_km(10.0), 150.0);
        assert!((cfg.cdist_km(100.0) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_bad_coverage_threshold() {
        let mut cfg = Config::earthquake_preset(0.0, 2.0, 0.0, 2.0, 0.2, 0.2);
        cfg.coverage_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }
}
