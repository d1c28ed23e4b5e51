//! WGS84 geodetic primitives.
//!
//! The inverse problem is Vincenty's iterative formula, following the same
//! auxiliary-sphere construction used throughout classical geodesy
//! references (reduced latitude, angular separation on the sphere, the
//! 1976 correction terms `A`/`B`). Near-antipodal pairs can fail to
//! converge; callers get `None` back and decide locally whether that is
//! fatal (grid construction) or merely degrades to a spherical estimate
//! (per-cell azimuth during the eikonal pipeline).

use crate::constants::Constants;

const MAX_ITER: usize = 50;
const CONVERGENCE_TOL_RAD: f64 = 1e-12;

/// Result of the WGS84 inverse geodetic problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InverseResult {
    /// Distance between the two points, km.
    pub distance_km: f64,
    /// Forward azimuth at point 1, degrees in `[0, 360)`, measured from
    /// north, clockwise (standard geodetic convention).
    pub azimuth1_deg: f64,
    /// Forward azimuth at point 2 (arriving direction), same convention.
    pub azimuth2_deg: f64,
}

/// Reduced latitude `atan((1-f) tan(lat))`.
fn reduced_latitude(lat_rad: f64, f: f64) -> f64 {
    ((1.0 - f) * lat_rad.tan()).atan()
}

/// Vincenty inverse: distance and forward/backward azimuth between two
/// geographic points (degrees in, km + degrees out) on the WGS84 ellipsoid.
///
/// Returns `None` if the iteration does not converge within
/// [`MAX_ITER`] steps (near-antipodal pairs).
pub(crate) fn vincenty_inverse(
    lat1_deg: f64,
    lon1_deg: f64,
    lat2_deg: f64,
    lon2_deg: f64,
) -> Option<InverseResult> {
    let a = Constants::WGS84_A_KM;
    let f = Constants::WGS84_F;
    let b = a * (1.0 - f);

    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let l = (lon2_deg - lon1_deg).to_radians();

    if l.hypot(lat2 - lat1) < 1e-15 {
        return Some(InverseResult {
            distance_km: 0.0,
            azimuth1_deg: 0.0,
            azimuth2_deg: 0.0,
        });
    }

    let u1 = reduced_latitude(lat1, f);
    let u2 = reduced_latitude(lat2, f);
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut cos_sq_alpha;
    let mut sin_sigma;
    let mut cos_sigma;
    let mut sigma;
    let mut cos_2sigma_m;

    let mut converged = false;
    for _ in 0..MAX_ITER {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = t1.hypot(t2);
        if sin_sigma == 0.0 {
            // coincident points on the auxiliary sphere
            return Some(InverseResult {
                distance_km: 0.0,
                azimuth1_deg: 0.0,
                azimuth2_deg: 0.0,
            });
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;

        cos_2sigma_m = if cos_sq_alpha.abs() < 1e-15 {
            0.0 // equatorial line
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let lambda_next = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda_next - lambda).abs() < CONVERGENCE_TOL_RAD {
            lambda = lambda_next;
            converged = true;
            break;
        }
        lambda = lambda_next;
    }

    if !converged {
        return None;
    }

    let (sin_lambda, cos_lambda) = lambda.sin_cos();
    let t1 = cos_u2 * sin_lambda;
    let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
    let sin_sigma = t1.hypot(t2);
    let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
    let sigma = sin_sigma.atan2(cos_sigma);
    let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let cos_2sigma_m = if cos_sq_alpha.abs() < 1e-15 {
        0.0
    } else {
        cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
    };

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

    let distance_km = b * big_a * (sigma - delta_sigma);

    let azimuth1 = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
    let azimuth2 = (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda);

    Some(InverseResult {
        distance_km,
        azimuth1_deg: normalize_0_360(azimuth1.to_degrees()),
        azimuth2_deg: normalize_0_360(azimuth2.to_degrees() + 180.0),
    })
}

/// Great-circle (spherical) fallback used only when Vincenty fails to
/// converge (near-antipodal pairs), per §4.0 of the expanded spec.
pub(crate) fn haversine_km(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let r = Constants::WGS84_A_KM;
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2_deg - lon1_deg).to_radians();
    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * r * h.sqrt().asin()
}

fn normalize_0_360(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

/// Normalize an angle to `(-180, 180]`, the convention used throughout
/// §4.6 step 7 for azimuth and deflection.
pub(crate) fn normalize_pm180(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn copenhagen_paris() {
        // Cross-checked against Karney's GeodSolve reference values.
        let r = vincenty_inverse(55.0, 12.0, 49.0, 2.0).unwrap();
        assert!((r.distance_km - 956.066_231_959).abs() < 1e-3);
    }

    #[test]
    fn coincident_points() {
        let r = vincenty_inverse(10.0, 20.0, 10.0, 20.0).unwrap();
        assert_eq!(r.distance_km, 0.0);
    }

    #[test]
    fn normalize_wraps_into_range() {
        assert!((normalize_pm180(181.0) - (-179.0)).abs() < 1e-9);
        assert!((normalize_pm180(-181.0) - 179.0).abs() < 1e-9);
        assert_eq!(normalize_pm180(180.0), 180.0);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(360.0, 0.0)]
    #[case(-360.0, 0.0)]
    #[case(540.0, 180.0)]
    #[case(-540.0, 180.0)]
    #[case(720.1, 0.1)]
    fn normalize_is_periodic_in_360(#[case] input: f64, #[case] expected: f64) {
        assert!((normalize_pm180(input) - expected).abs() < 1e-9);
    }
}
