//! Scatter-point input types consumed from upstream collaborators (§6).

/// A wave period, seconds.
///
/// Periods are specified upstream as a sorted finite `f64` sequence with
/// 1e-3 s resolution (§6). Internally this type quantizes to a millihertz
/// integer key so it can be used as a `HashMap`/`BTreeMap` key without the
/// usual `f64` equality pitfalls (§9 Design Notes: "string-keyed period
/// lookup... becomes integer-microsecond or millihertz keys").
#[derive(Debug, Clone, Copy)]
pub struct Period(f64);

impl Period {
    pub fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Quantized key at 1e-3 s resolution, suitable for `Eq`/`Hash`.
    fn key(self) -> i64 {
        (self.0 * 1000.0).round() as i64
    }
}

impl PartialEq for Period {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Period {}

impl std::hash::Hash for Period {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// A single scattered `(lon, lat, value)` observation (§3).
///
/// `value` is a travel time in seconds or an amplitude in arbitrary units,
/// depending on which surface is being interpolated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

impl ScatterSample {
    pub fn new(lon: f64, lat: f64, value: f64) -> Self {
        Self { lon, lat, value }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.value.is_finite()
    }
}

/// All scattered data contributed by one source for one period (§6
/// injection boundary).
#[derive(Debug, Clone)]
pub struct SourceObservation {
    /// Stable source identifier (e.g. event id or virtual-source station code).
    pub source_id: String,
    /// Source longitude, degrees, normalized to `[0, 360)` by [`Self::new`].
    pub evlo: f64,
    /// Source latitude, degrees.
    pub evla: f64,
    /// Travel-time samples.
    pub travel_time: Vec<ScatterSample>,
    /// Optional amplitude samples (enables Helmholtz correction, §4.7).
    pub amplitude: Option<Vec<ScatterSample>>,
    /// Per-sample epicentral distance, km, aligned with `travel_time`.
    pub distance_km: Vec<f64>,
}

impl SourceObservation {
    pub fn new(
        source_id: impl Into<String>,
        evlo: f64,
        evla: f64,
        travel_time: Vec<ScatterSample>,
        distance_km: Vec<f64>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            evlo: normalize_lon_0_360(evlo),
            evla,
            travel_time,
            amplitude: None,
            distance_km,
        }
    }

    pub fn with_amplitude(mut self, amplitude: Vec<ScatterSample>) -> Self {
        self.amplitude = Some(amplitude);
        self
    }
}

pub(crate) fn normalize_lon_0_360(lon: f64) -> f64 {
    let mut l = lon % 360.0;
    if l < 0.0 {
        l += 360.0;
    }
    l
}
