//! C5: near-neighbor quality control.
//!
//! Grounded on `original_source/field2d_earth.py`'s `eikonal_operator`
//! near-neighbor loop: a grid cell only survives if scattered stations
//! bracket it from all four quadrants within a period-dependent radius.

use std::collections::HashMap;

use crate::geo;
use crate::grid::GeodeticGrid;
use crate::sample::ScatterSample;

/// Near-neighbor reject code (§4.5).
pub(crate) const CODE_NEAR_NEIGHBOR: u8 = 2;

/// Quadrant of a candidate station relative to a grid cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Quadrant {
    Ne,
    Nw,
    Se,
    Sw,
}

fn quadrant(d_lon: f64, d_lat: f64) -> Quadrant {
    match (d_lon >= 0.0, d_lat >= 0.0) {
        (true, true) => Quadrant::Ne,
        (false, true) => Quadrant::Nw,
        (true, false) => Quadrant::Se,
        (false, false) => Quadrant::Sw,
    }
}

/// Coarse spatial bucket over scatter samples, keyed by a cell size large
/// enough that any point within `radius_deg` of a query point is
/// guaranteed to fall in the query bucket or one of its 8 neighbors
/// (§4.5's "quadrant-keyed early exit").
struct Bucket {
    size_deg: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl Bucket {
    fn build(samples: &[ScatterSample], radius_deg: f64) -> Self {
        let size_deg = radius_deg.max(1e-6);
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, s) in samples.iter().enumerate() {
            let key = (
                (s.lon / size_deg).floor() as i64,
                (s.lat / size_deg).floor() as i64,
            );
            cells.entry(key).or_default().push(idx);
        }
        Bucket { size_deg, cells }
    }

    fn candidates(&self, lon: f64, lat: f64) -> Vec<usize> {
        let ci = (lon / self.size_deg).floor() as i64;
        let cj = (lat / self.size_deg).floor() as i64;
        let mut out = Vec::new();
        for di in -1..=1 {
            for dj in -1..=1 {
                if let Some(idxs) = self.cells.get(&(ci + di, cj + dj)) {
                    out.extend_from_slice(idxs);
                }
            }
        }
        out
    }
}

/// Applies §4.5 in place over every full-shape cell still coded `0`:
/// zeroes `t_qc` and codes 2 any cell lacking a station in each of the
/// four quadrants within `2 * cdist_km` (and `>= 1 km` away).
pub(crate) fn apply(
    grid: &GeodeticGrid,
    samples: &[ScatterSample],
    reason_n: &mut [u8],
    t_qc: &mut nalgebra::DMatrix<f64>,
    cdist_km: f64,
) {
    if samples.is_empty() {
        for code in reason_n.iter_mut() {
            if *code == 0 {
                *code = CODE_NEAR_NEIGHBOR;
            }
        }
        return;
    }

    // km-per-degree is roughly constant across the short lon/lat spans this
    // engine operates over; a generous radius keeps the bucket conservative,
    // true acceptance is always re-checked against the geodesic distance.
    let km_per_deg = grid.dlat_km(0).max(1e-6) / grid.dlat().max(1e-6);
    let radius_deg = (2.0 * cdist_km / km_per_deg).max(grid.dlat()).max(grid.dlon());
    let bucket = Bucket::build(samples, radius_deg);

    let n_lon = grid.n_lon();
    for i in 0..grid.n_lat() {
        let lat = grid.lat_at(i);
        for j in 0..n_lon {
            let idx = i * n_lon + j;
            if reason_n[idx] != 0 {
                continue;
            }
            let lon = grid.lon_at(j);
            let mut seen = [false; 4];
            let mut remaining = 4;
            for &s_idx in bucket.candidates(lon, lat).iter() {
                let s = &samples[s_idx];
                let q = quadrant(s.lon - lon, s.lat - lat);
                let slot = match q {
                    Quadrant::Ne => 0,
                    Quadrant::Nw => 1,
                    Quadrant::Se => 2,
                    Quadrant::Sw => 3,
                };
                if seen[slot] {
                    continue;
                }
                let dist = geo::vincenty_inverse(lat, lon, s.lat, s.lon)
                    .map(|r| r.distance_km)
                    .unwrap_or_else(|| geo::haversine_km(lat, lon, s.lat, s.lon));
                if dist < 2.0 * cdist_km && dist >= 1.0 {
                    seen[slot] = true;
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
            if remaining > 0 {
                reason_n[idx] = CODE_NEAR_NEIGHBOR;
                t_qc[(i, j)] = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeodeticGrid;

    fn bracketed_samples() -> Vec<ScatterSample> {
        // four stations, one per quadrant, well inside cdist
        vec![
            ScatterSample::new(1.2, 1.2, 1.0),
            ScatterSample::new(0.8, 1.2, 1.0),
            ScatterSample::new(1.2, 0.8, 1.0),
            ScatterSample::new(0.8, 0.8, 1.0),
        ]
    }

    #[test]
    fn passes_cell_bracketed_from_all_quadrants() {
        let grid = GeodeticGrid::new(0.0, 2.0, 0.0, 2.0, 0.2, 0.2, 1, 1, 2, 2).unwrap();
        let samples = bracketed_samples();
        let mut reason_n = vec![0u8; grid.n_lat() * grid.n_lon()];
        let mut t_qc = grid.zeros(crate::grid::Shape::Full);
        apply(&grid, &samples, &mut reason_n, &mut t_qc, 150.0);

        let i = (1.0 / grid.dlat()).round() as usize;
        let j = (1.0 / grid.dlon()).round() as usize;
        assert_eq!(reason_n[i * grid.n_lon() + j], 0);
    }

    #[test]
    fn rejects_cell_missing_a_quadrant() {
        let grid = GeodeticGrid::new(0.0, 2.0, 0.0, 2.0, 0.2, 0.2, 1, 1, 2, 2).unwrap();
        // no SW station
        let samples = vec![
            ScatterSample::new(1.2, 1.2, 1.0),
            ScatterSample::new(0.8, 1.2, 1.0),
            ScatterSample::new(1.2, 0.8, 1.0),
        ];
        let mut reason_n = vec![0u8; grid.n_lat() * grid.n_lon()];
        let mut t_qc = grid.zeros(crate::grid::Shape::Full);
        apply(&grid, &samples, &mut reason_n, &mut t_qc, 150.0);

        let i = (1.0 / grid.dlat()).round() as usize;
        let j = (1.0 / grid.dlon()).round() as usize;
        assert_eq!(reason_n[i * grid.n_lon() + j], CODE_NEAR_NEIGHBOR);
    }
}
