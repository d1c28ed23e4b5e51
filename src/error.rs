use thiserror::Error;

/// Core failure taxonomy.
///
/// `Config` and `Input` abort the entire run. `Interpolation` aborts only
/// the offending source. `InsufficientData` aborts only the offending
/// period. Numeric degeneracies (a vanishing Kish denominator) are never
/// surfaced here: they are absorbed locally into a cell's mask, see
/// [`crate::stack::isotropic`].
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Invalid grid, spacing, or threshold combination detected at
    /// construction time.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Upstream samples carried non-finite values, inconsistent period
    /// arrays, or a source identifier collided across runs.
    #[error("invalid input: {0}")]
    Input(String),
    /// The scatter-to-grid operator failed to converge or produced
    /// non-finite cells.
    #[error("interpolation failed: {0}")]
    Interpolation(String),
    /// A period had fewer than `threshmeasure` covered cells after all
    /// quality-control gates were applied.
    #[error("insufficient data at period {period_s}s: {have} covered cells, need {need}")]
    InsufficientData {
        period_s: f64,
        have: usize,
        need: usize,
    },
}
