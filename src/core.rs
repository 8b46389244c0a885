pub use kurbo::Point;

/// Simulation time in epoch milliseconds.
pub type TimeMs = i64;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// One raw sample as produced by a track source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    /// Degrees, positive north.
    pub lat: f64,
    /// Degrees, positive east.
    pub lon: f64,
    /// Epoch milliseconds; `None` when the source carried no time for this sample.
    pub time: Option<TimeMs>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, time: Option<TimeMs>) -> Self {
        Self { lat, lon, time }
    }

    pub fn timed(lat: f64, lon: f64, time: TimeMs) -> Self {
        Self::new(lat, lon, Some(time))
    }

    /// Latitude within ±90° and longitude within ±180°.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Raw segments of one track, in the order the source produced them.
pub type RawTrack = Vec<Vec<GeoPoint>>;
