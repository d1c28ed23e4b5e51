//! C1: regular lat/lon grid with per-row km-scaled spacing.

use nalgebra::DMatrix;

use crate::cfg::Config;
use crate::error::Error;
use crate::geo;

/// Which of the three shapes a per-grid array inhabits (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `(Nlat, Nlon)`
    Full,
    /// `(Nlat - 2*n_lat_grad, Nlon - 2*n_lon_grad)`
    GradientInterior,
    /// `(Nlat - 2*n_lat_lplc, Nlon - 2*n_lon_lplc)`
    LaplacianInterior,
}

/// A regular geographic grid with WGS84 row-spacing in km (C1).
#[derive(Debug, Clone)]
pub struct GeodeticGrid {
    min_lat: f64,
    min_lon: f64,
    dlat: f64,
    dlon: f64,
    n_lat: usize,
    n_lon: usize,
    /// km spacing between adjacent latitude rows, indexed by row.
    dlat_km: Vec<f64>,
    /// km spacing between adjacent longitude columns, indexed by row
    /// (varies with latitude).
    dlon_km: Vec<f64>,
    n_lat_grad: usize,
    n_lon_grad: usize,
    n_lat_lplc: usize,
    n_lon_lplc: usize,
}

impl GeodeticGrid {
    /// Builds a grid from a bounding box and nominal spacing, with
    /// symmetric border widths for gradient/Laplacian interiors.
    ///
    /// Fails with [`Error::Config`] if spacings are non-positive, the
    /// bounding box is degenerate, or `n_lplc < n_grad + 1` in either
    /// dimension.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
        dlon: f64,
        dlat: f64,
        n_lat_grad: usize,
        n_lon_grad: usize,
        n_lat_lplc: usize,
        n_lon_lplc: usize,
    ) -> Result<Self, Error> {
        if dlon <= 0.0 || dlat <= 0.0 {
            return Err(Error::Config("grid spacing must be positive".to_string()));
        }
        if max_lon <= min_lon || max_lat <= min_lat {
            return Err(Error::Config("degenerate bounding box".to_string()));
        }
        if n_lat_lplc < n_lat_grad + 1 || n_lon_lplc < n_lon_grad + 1 {
            return Err(Error::Config(
                "n_lplc must be >= n_grad + 1 in both dimensions".to_string(),
            ));
        }

        let n_lat = ((max_lat - min_lat) / dlat).round() as usize + 1;
        let n_lon = ((max_lon - min_lon) / dlon).round() as usize + 1;

        if n_lat <= 2 * n_lat_lplc || n_lon <= 2 * n_lon_lplc {
            return Err(Error::Config(
                "grid too small for requested Laplacian border".to_string(),
            ));
        }

        let mut dlat_km = Vec::with_capacity(n_lat);
        let mut dlon_km = Vec::with_capacity(n_lat);
        for i in 0..n_lat {
            let lat = min_lat + i as f64 * dlat;
            let lat_step = geo::vincenty_inverse(lat, min_lon, lat + dlat, min_lon)
                .ok_or_else(|| Error::Config("dlat_km geodesic did not converge".to_string()))?;
            let lon_step = geo::vincenty_inverse(lat, min_lon, lat, min_lon + dlon)
                .ok_or_else(|| Error::Config("dlon_km geodesic did not converge".to_string()))?;
            dlat_km.push(lat_step.distance_km);
            dlon_km.push(lon_step.distance_km);
        }

        Ok(Self {
            min_lat,
            min_lon,
            dlat,
            dlon,
            n_lat,
            n_lon,
            dlat_km,
            dlon_km,
            n_lat_grad,
            n_lon_grad,
            n_lat_lplc,
            n_lon_lplc,
        })
    }

    /// Builds a grid with `optimize_spacing`: adjusts `dlat` so that
    /// `dlat_km ≈ dlon_km` at the mid-box latitude, by one secant
    /// correction against the nominal row spacing (§4.1).
    #[allow(clippy::too_many_arguments)]
    pub fn new_optimized_spacing(
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
        dlon: f64,
        n_lat_grad: usize,
        n_lon_grad: usize,
        n_lat_lplc: usize,
        n_lon_lplc: usize,
    ) -> Result<Self, Error> {
        let mid_lat = 0.5 * (min_lat + max_lat);
        let lon_step = geo::vincenty_inverse(mid_lat, min_lon, mid_lat, min_lon + dlon)
            .ok_or_else(|| Error::Config("optimize_spacing geodesic did not converge".to_string()))?
            .distance_km;

        // Secant: dlat such that vincenty(mid_lat, mid_lat+dlat) ~= lon_step.
        let mut dlat = dlon;
        for _ in 0..8 {
            let probe = geo::vincenty_inverse(mid_lat, min_lon, mid_lat + dlat, min_lon)
                .ok_or_else(|| {
                    Error::Config("optimize_spacing geodesic did not converge".to_string())
                })?
                .distance_km;
            if probe <= 0.0 {
                break;
            }
            dlat *= lon_step / probe;
        }

        Self::new(
            min_lon,
            max_lon,
            min_lat,
            max_lat,
            dlon,
            dlat,
            n_lat_grad,
            n_lon_grad,
            n_lat_lplc,
            n_lon_lplc,
        )
    }

    /// Builds a grid from a validated [`Config`] (§4.11): runs
    /// [`Config::validate`] first, then dispatches to
    /// [`Self::new_optimized_spacing`] or [`Self::new`] depending on
    /// `cfg.optimize_spacing`.
    pub fn from_config(cfg: &Config) -> Result<Self, Error> {
        cfg.validate()?;
        if cfg.optimize_spacing {
            Self::new_optimized_spacing(
                cfg.min_lon,
                cfg.max_lon,
                cfg.min_lat,
                cfg.max_lat,
                cfg.dlon,
                cfg.n_lat_grad,
                cfg.n_lon_grad,
                cfg.n_lat_lplc,
                cfg.n_lon_lplc,
            )
        } else {
            Self::new(
                cfg.min_lon,
                cfg.max_lon,
                cfg.min_lat,
                cfg.max_lat,
                cfg.dlon,
                cfg.dlat,
                cfg.n_lat_grad,
                cfg.n_lon_grad,
                cfg.n_lat_lplc,
                cfg.n_lon_lplc,
            )
        }
    }

    pub fn n_lat(&self) -> usize {
        self.n_lat
    }
    pub fn n_lon(&self) -> usize {
        self.n_lon
    }
    pub fn dlat(&self) -> f64 {
        self.dlat
    }
    pub fn dlon(&self) -> f64 {
        self.dlon
    }
    pub fn n_lat_grad(&self) -> usize {
        self.n_lat_grad
    }
    pub fn n_lon_grad(&self) -> usize {
        self.n_lon_grad
    }
    pub fn n_lat_lplc(&self) -> usize {
        self.n_lat_lplc
    }
    pub fn n_lon_lplc(&self) -> usize {
        self.n_lon_lplc
    }

    pub fn lat_at(&self, i: usize) -> f64 {
        self.min_lat + i as f64 * self.dlat
    }
    pub fn lon_at(&self, j: usize) -> f64 {
        self.min_lon + j as f64 * self.dlon
    }

    pub fn dlat_km(&self, i: usize) -> f64 {
        self.dlat_km[i]
    }
    pub fn dlon_km(&self, i: usize) -> f64 {
        self.dlon_km[i]
    }

    pub fn shape_dims(&self, shape: Shape) -> (usize, usize) {
        match shape {
            Shape::Full => (self.n_lat, self.n_lon),
            Shape::GradientInterior => (
                self.n_lat - 2 * self.n_lat_grad,
                self.n_lon - 2 * self.n_lon_grad,
            ),
            Shape::LaplacianInterior => (
                self.n_lat - 2 * self.n_lat_lplc,
                self.n_lon - 2 * self.n_lon_lplc,
            ),
        }
    }

    fn edge_widths(&self, shape: Shape) -> (usize, usize) {
        match shape {
            Shape::Full => (0, 0),
            Shape::GradientInterior => (self.n_lat_grad, self.n_lon_grad),
            Shape::LaplacianInterior => (self.n_lat_lplc, self.n_lon_lplc),
        }
    }

    /// Full-shape row/column index corresponding to interior cell `(i, j)`
    /// at the given shape.
    pub fn full_index(&self, shape: Shape, i: usize, j: usize) -> (usize, usize) {
        let (ei, ej) = self.edge_widths(shape);
        (i + ei, j + ej)
    }

    /// Extracts the interior sub-array out of a full-shape array.
    pub fn full_to_interior(&self, full: &DMatrix<f64>, shape: Shape) -> DMatrix<f64> {
        let (ei, ej) = self.edge_widths(shape);
        let (rows, cols) = self.shape_dims(shape);
        full.view((ei, ej), (rows, cols)).into_owned()
    }

    /// Promotes an interior-shape array to full shape, filling the border
    /// with `fill`.
    pub fn interior_to_full(&self, interior: &DMatrix<f64>, shape: Shape, fill: f64) -> DMatrix<f64> {
        let (ei, ej) = self.edge_widths(shape);
        let mut full = DMatrix::from_element(self.n_lat, self.n_lon, fill);
        let (rows, cols) = self.shape_dims(shape);
        for i in 0..rows {
            for j in 0..cols {
                full[(i + ei, j + ej)] = interior[(i, j)];
            }
        }
        full
    }

    /// Promotes an interior-shape boolean mask to full shape; the border
    /// is always `true` (§4.6 step 9).
    pub fn interior_mask_to_full(&self, interior: &[bool], shape: Shape) -> Vec<bool> {
        let (ei, ej) = self.edge_widths(shape);
        let (rows, cols) = self.shape_dims(shape);
        let mut full = vec![true; self.n_lat * self.n_lon];
        for i in 0..rows {
            for j in 0..cols {
                full[(i + ei) * self.n_lon + (j + ej)] = interior[i * cols + j];
            }
        }
        full
    }

    pub fn zeros(&self, shape: Shape) -> DMatrix<f64> {
        let (rows, cols) = self.shape_dims(shape);
        DMatrix::zeros(rows, cols)
    }
}
