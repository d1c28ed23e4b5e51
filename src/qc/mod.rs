//! Quality-control passes applied to a per-source interpolated surface.

pub(crate) mod curvature;
pub(crate) mod near_neighbor;
pub(crate) mod numeric;
