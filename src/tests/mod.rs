//! Cross-module end-to-end fixtures (§8 scenarios S1-S6) and the
//! testable-property suite that does not fit naturally inside a single
//! component's own `#[cfg(test)]` block.
//!
//! Placed here rather than per-module, mirroring the teacher's dedicated
//! `src/tests/pvt/spp.rs` tree for its own end-to-end scenario.

mod scenarios;

use crate::cfg::Config;
use crate::grid::GeodeticGrid;
use crate::sample::ScatterSample;

/// Shared fixture: a small dense grid with a fully-bracketing station
/// layout, used throughout both `scenarios` and `properties`.
pub(super) fn small_grid(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, d: f64) -> GeodeticGrid {
    GeodeticGrid::new(min_lon, max_lon, min_lat, max_lat, d, d, 1, 1, 2, 2).unwrap()
}

/// A dense regular lattice of stations covering `[min, max]` in both
/// dimensions at spacing `d`, useful to drive near-neighbor and curvature
/// QC to their "everything survives" baseline.
pub(super) fn dense_lattice(min: f64, max: f64, d: f64, mut value_at: impl FnMut(f64, f64) -> f64) -> Vec<ScatterSample> {
    let n = ((max - min) / d).round() as i64;
    let mut out = Vec::new();
    for i in 0..=n {
        for j in 0..=n {
            let lat = min + i as f64 * d;
            let lon = min + j as f64 * d;
            out.push(ScatterSample::new(lon, lat, value_at(lon, lat)));
        }
    }
    out
}

pub(super) fn default_cfg(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, d: f64) -> Config {
    let mut cfg = Config::earthquake_preset(min_lon, max_lon, min_lat, max_lat, d, d);
    cfg.min_data_points = 4;
    cfg.threshmeasure = 1;
    cfg.min_raw_measurements = 0;
    cfg
}

/// Brings up `log` for the duration of the test process, so the `warn!`/
/// `debug!` diagnostics emitted by the pipeline surface under
/// `cargo test -- --nocapture`. Safe to call from multiple tests.
pub(super) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
