#![doc = include_str!("../README.md")]

// private modules
mod constants;
mod fd;
mod geo;
mod interp;
mod qc;

pub(crate) mod cfg;
pub(crate) mod error;

pub mod eikonal;
pub mod ensemble;
pub mod grid;
pub mod helmholtz;
pub mod persist;
pub mod sample;
pub mod stack;

#[cfg(test)]
mod tests;

use cfg::Config;
use ensemble::EventEnsemble;
use error::Error;
use grid::GeodeticGrid;
use sample::{Period, SourceObservation};
use stack::anisotropic::{self, AnisotropicMap};
use stack::isotropic::{self, StackedMap};

/// Runs one period end to end: builds the per-source [`EikonalField`]s over
/// a `rayon` worker pool, assembles the [`EventEnsemble`], and produces the
/// isotropic [`StackedMap`] (§7).
///
/// Mirrors the teacher's `Solver::resolve` shape: one call per independent
/// unit of work (here, a period), left to an outer driver to loop over the
/// full period sequence. `Ok(None)` means this period produced no stacked
/// output (`Error::InsufficientData` was absorbed, per §7) but the run
/// itself should continue with the next period. `Err` means the whole run
/// aborts (`Error::Config`/`Error::Input`).
pub fn run_period(
    grid: &GeodeticGrid,
    cfg: &Config,
    period: Period,
    observations: &[SourceObservation],
) -> Result<Option<StackedMap>, Error> {
    match EventEnsemble::build_period(grid, cfg, period, observations) {
        Ok(ensemble) => Ok(Some(isotropic::stack(&ensemble))),
        Err(Error::InsufficientData { period_s, have, need }) => {
            log::warn!(
                "period {period_s}s: no stacked output, {have} covered cells < {need} required"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Runs one period end to end, same as [`run_period`], but additionally
/// produces the optional azimuthally-anisotropic stack (C10) from the same
/// [`EventEnsemble`] rather than rebuilding it.
///
/// Use this entry point instead of [`run_period`] when the caller wants
/// per-bin azimuthal velocity perturbations in addition to the isotropic
/// map; skip it (and the extra per-bin work it does) when only the
/// isotropic map is needed.
pub fn run_period_with_anisotropy(
    grid: &GeodeticGrid,
    cfg: &Config,
    period: Period,
    observations: &[SourceObservation],
) -> Result<Option<(StackedMap, AnisotropicMap)>, Error> {
    match EventEnsemble::build_period(grid, cfg, period, observations) {
        Ok(ensemble) => {
            let iso = isotropic::stack(&ensemble);
            let ani = anisotropic::stack(&ensemble, &iso, cfg);
            Ok(Some((iso, ani)))
        }
        Err(Error::InsufficientData { period_s, have, need }) => {
            log::warn!(
                "period {period_s}s: no stacked output, {have} covered cells < {need} required"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Common imports for downstream users of this crate.
pub mod prelude {
    pub use crate::cfg::Config;
    pub use crate::eikonal::{EikonalField, ReasonCode};
    pub use crate::ensemble::EventEnsemble;
    pub use crate::error::Error;
    pub use crate::grid::GeodeticGrid;
    pub use crate::persist::{PersistableAnisotropicMap, PersistableEikonalField, PersistableStackedMap};
    pub use crate::{run_period, run_period_with_anisotropy};
    pub use crate::sample::{Period, ScatterSample, SourceObservation};
    pub use crate::stack::anisotropic::{AnisotropicFit, AnisotropicMap};
    pub use crate::stack::isotropic::StackedMap;
}
