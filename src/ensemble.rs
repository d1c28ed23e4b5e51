//! C8: per-period collection of [`EikonalField`]s with ensemble-level
//! coverage and measurement-count gates.
//!
//! Grounded on `original_source/field2d_earth.py`'s stacking driver, which
//! discards whole events below a coverage ratio and globally disables
//! cells that never accumulate enough raw measurements.

use itertools::Itertools;
use log::{error, info, warn};
use rayon::prelude::*;

use crate::cfg::Config;
use crate::eikonal::{EikonalField, ReasonCode};
use crate::error::Error;
use crate::grid::{GeodeticGrid, Shape};
use crate::sample::{Period, SourceObservation};

/// An ordered collection of [`EikonalField`]s sharing one grid and period
/// (C8). Built once per period; the coverage-ratio and
/// minimum-raw-measurement gates are applied during construction.
pub struct EventEnsemble {
    grid: GeodeticGrid,
    period: Period,
    fields: Vec<EikonalField>,
}

impl EventEnsemble {
    /// Applies §4.8's gates and assembles the ensemble.
    ///
    /// Fails with [`Error::InsufficientData`] if the maximum per-cell raw
    /// event count across the whole period falls below `cfg.threshmeasure`.
    pub fn new(grid: &GeodeticGrid, period: Period, mut fields: Vec<EikonalField>, cfg: &Config) -> Result<Self, Error> {
        for field in fields.iter_mut() {
            if field.coverage_ratio() < cfg.coverage_threshold {
                warn!(
                    "period {period}: source at ({}, {}) globally invalidated, coverage {:.3} < {:.3}",
                    field.evlo,
                    field.evla,
                    field.coverage_ratio(),
                    cfg.coverage_threshold
                );
                field.invalidate_globally();
            }
        }

        let (rows, cols) = grid.shape_dims(Shape::GradientInterior);
        let n_cells = rows * cols;
        let mut raw_counts = vec![0usize; n_cells];
        for field in &fields {
            for (idx, &code) in field.reason_n.iter().enumerate() {
                if code == 0 {
                    raw_counts[idx] += 1;
                }
            }
        }

        let max_count = raw_counts.iter().copied().max().unwrap_or(0);
        if max_count < cfg.threshmeasure {
            return Err(Error::InsufficientData {
                period_s: period.seconds(),
                have: max_count,
                need: cfg.threshmeasure,
            });
        }

        for (idx, &count) in raw_counts.iter().enumerate() {
            if count < cfg.min_raw_measurements {
                for field in fields.iter_mut() {
                    if field.reason_n[idx] == 0 {
                        field.reason_n[idx] = ReasonCode::CellGloballyDisabled.code();
                    }
                }
            }
        }

        info!(
            "period {period}: assembled ensemble of {} sources, max per-cell raw count {max_count}",
            fields.len()
        );

        Ok(Self {
            grid: grid.clone(),
            period,
            fields,
        })
    }

    /// Builds one [`EikonalField`] per source in parallel over a `rayon`
    /// worker pool (§5: "parallel worker pool over sources within a
    /// period"), then assembles the ensemble exactly as [`Self::new`]
    /// would. Output order matches `observations` regardless of which
    /// worker finishes first.
    ///
    /// `Error::Config`/`Error::Input` abort the whole call; a source whose
    /// build fails with `Error::Interpolation` or `Error::InsufficientData`
    /// is dropped with a `warn!` and does not contribute to the ensemble.
    pub fn build_period(
        grid: &GeodeticGrid,
        cfg: &Config,
        period: Period,
        observations: &[SourceObservation],
    ) -> Result<Self, Error> {
        validate_observations(observations)?;

        let results: Vec<Result<EikonalField, Error>> = observations
            .par_iter()
            .map(|obs| EikonalField::build(grid, cfg, period, obs))
            .collect();

        let mut fields = Vec::with_capacity(results.len());
        for (obs, result) in observations.iter().zip(results) {
            match result {
                Ok(field) => fields.push(field),
                Err(Error::Interpolation(msg)) => {
                    warn!(
                        "period {period}: source {} dropped, interpolation failed: {msg}",
                        obs.source_id
                    );
                }
                Err(Error::InsufficientData { have, need, .. }) => {
                    warn!(
                        "period {period}: source {} dropped, {have} raw samples < {need} required",
                        obs.source_id
                    );
                }
                Err(e) => {
                    error!("period {period}: aborting run, {e}");
                    return Err(e);
                }
            }
        }

        Self::new(grid, period, fields, cfg)
    }

    pub fn grid(&self) -> &GeodeticGrid {
        &self.grid
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn fields(&self) -> &[EikonalField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// §7 `Error::Input`: rejects duplicate source identifiers and non-finite
/// source coordinates before any per-source work begins.
fn validate_observations(observations: &[SourceObservation]) -> Result<(), Error> {
    let dupes: Vec<&str> = observations
        .iter()
        .map(|o| o.source_id.as_str())
        .duplicates()
        .collect();
    if !dupes.is_empty() {
        return Err(Error::Input(format!(
            "duplicate source id(s) in ensemble: {dupes:?}"
        )));
    }
    for obs in observations {
        if !obs.evlo.is_finite() || !obs.evla.is_finite() {
            return Err(Error::Input(format!(
                "source {} has non-finite coordinates",
                obs.source_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn aborts_period_below_threshmeasure() {
        let grid = dense_grid();
        let mut cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        cfg.threshmeasure = 2;
        let obs = SourceObservation::new("evt1", -10.0, 2.0, dense_samples(0.3), vec![]);
        let field = EikonalField::build(&grid, &cfg, Period::new(20.0), &obs).unwrap();
        let err = EventEnsemble::new(&grid, Period::new(20.0), vec![field], &cfg).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn assembles_when_measurement_counts_suffice() {
        let grid = dense_grid();
        let mut cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        cfg.threshmeasure = 1;
        cfg.min_raw_measurements = 0;
        let mut fields = Vec::new();
        for k in 0..3 {
            let obs = SourceObservation::new(
                format!("evt{k}"),
                -10.0 - k as f64,
                2.0,
                dense_samples(0.3),
                vec![],
            );
            fields.push(EikonalField::build(&grid, &cfg, Period::new(20.0), &obs).unwrap());
        }
        let ensemble = EventEnsemble::new(&grid, Period::new(20.0), fields, &cfg).unwrap();
        assert_eq!(ensemble.len(), 3);
    }

    #[test]
    fn build_period_assembles_via_rayon_worker_pool() {
        let grid = dense_grid();
        let mut cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        cfg.threshmeasure = 1;
        cfg.min_raw_measurements = 0;
        let observations: Vec<SourceObservation> = (0..4)
            .map(|k| SourceObservation::new(format!("evt{k}"), -10.0 - k as f64, 2.0, dense_samples(0.3), vec![]))
            .collect();
        let ensemble = EventEnsemble::build_period(&grid, &cfg, Period::new(20.0), &observations).unwrap();
        assert_eq!(ensemble.len(), 4);
    }

    #[test]
    fn build_period_rejects_duplicate_source_ids() {
        let grid = dense_grid();
        let cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        let observations = vec![
            SourceObservation::new("evt1", -10.0, 2.0, dense_samples(0.3), vec![]),
            SourceObservation::new("evt1", -11.0, 2.0, dense_samples(0.3), vec![]),
        ];
        let err = EventEnsemble::build_period(&grid, &cfg, Period::new(20.0), &observations).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn build_period_rejects_non_finite_source_coordinates() {
        let grid = dense_grid();
        let cfg = Config::earthquake_preset(0.0, 4.0, 0.0, 4.0, 0.2, 0.2);
        let observations = vec![SourceObservation::new(
            "evt1",
            f64::NAN,
            2.0,
            dense_samples(0.3),
            vec![],
        )];
        let err = EventEnsemble::build_period(&grid, &cfg, Period::new(20.0), &observations).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}
