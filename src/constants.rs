/// WGS84 ellipsoid and domain constants shared across modules.
pub(crate) struct Constants;

impl Constants {
    /// WGS84 semi-major axis, km.
    pub const WGS84_A_KM: f64 = 6378.137;
    /// WGS84 flattening.
    pub const WGS84_F: f64 = 1.0 / 298.257223563;

    /// Physical slowness acceptance band, s/km (§4.6 step 6).
    pub const SLOWNESS_MIN: f64 = 0.2;
    pub const SLOWNESS_MAX: f64 = 0.5;

    /// Default curvature (Laplacian) reject threshold, s/km^2.
    pub const DEFAULT_LPLC_THRESHOLD: f64 = 0.002;

    /// Tension disagreement threshold, seconds, for travel-time fields.
    pub const TENSION_DISAGREEMENT_S: f64 = 2.0;

    /// Default source coverage ratio gate.
    pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.1;

    /// Default minimum raw measurement count per cell (code 10 gate).
    pub const DEFAULT_MIN_RAW_MEASUREMENTS: usize = 50;

    /// Default minimum per-cell event count to stack at all.
    pub const DEFAULT_THRESHMEASURE: usize = 80;

    /// Azimuthal neighbor half-window, degrees (§4.9 pass 1).
    pub const AZI_NEIGHBOR_WINDOW_DEG: f64 = 20.0;

    /// Outlier-rejection tail multiplier on slowness std. dev (§4.9 pass 2 / outlier test).
    pub const OUTLIER_SIGMA: f64 = 2.0;

    /// Default anisotropic-bin count over [-180, 180).
    pub const DEFAULT_N_BIN: usize = 20;

    /// Default coarsened anisotropic cell side, degrees.
    pub const DEFAULT_SPACING_ANI_DEG: f64 = 0.3;

    /// Default minimum measurements per azimuth bin to keep it.
    pub const DEFAULT_N_THRESH: usize = 10;

    /// Default minimum total near-neighbor measurements per coarsened cell.
    pub const DEFAULT_NTOTAL_THRESH: usize = 45;

    /// Default fractional azimuthal-outlier slowness-deviation threshold.
    pub const DEFAULT_AZI_AMP_THRESH: f64 = 0.1;
}
