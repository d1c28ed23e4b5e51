//! C9/C10: azimuth-weighted stacking across an [`EventEnsemble`](crate::ensemble::EventEnsemble).

pub mod anisotropic;
pub mod isotropic;

/// Angular separation test shared by both stackers: `true` when `az_a` and
/// `az_b` (degrees) fall within 20 degrees of each other, wrapping at 360.
pub(crate) fn within_azimuth_window(az_a: f64, az_b: f64, window_deg: f64) -> bool {
    let diff = (az_a - az_b).rem_euclid(360.0);
    diff < window_deg || diff > 360.0 - window_deg
}

/// Sample standard deviation (Bessel-corrected), `0.0` for `n < 2`.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}
