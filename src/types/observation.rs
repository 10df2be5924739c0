//! Observation rows: one manual solar reading per sensor-app screenshot.

use chrono::NaiveDateTime;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use solar_enrich::LatLon;
///
/// let gary = LatLon(41.5934, -87.3464);
/// assert_eq!(gary.0, 41.5934); // Latitude
/// assert_eq!(gary.1, -87.3464); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Builds a coordinate from raw extractor output, mapping the "not detected"
    /// sentinels to `None`.
    ///
    /// `(0, 0)`, a `-1` in either position, non-finite values and values outside
    /// the valid latitude/longitude ranges are all treated as unresolved.
    ///
    /// ```
    /// use solar_enrich::LatLon;
    ///
    /// assert_eq!(LatLon::from_raw(0.0, 0.0), None);
    /// assert_eq!(LatLon::from_raw(-1.0, -87.3), None);
    /// assert_eq!(LatLon::from_raw(41.6, -87.3), Some(LatLon(41.6, -87.3)));
    /// ```
    pub fn from_raw(latitude: f64, longitude: f64) -> Option<LatLon> {
        let is_sentinel =
            (latitude == 0.0 && longitude == 0.0) || latitude == -1.0 || longitude == -1.0;
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        (!is_sentinel && in_range).then_some(LatLon(latitude, longitude))
    }

    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }
}

/// One manual reading, as produced by the vision extractor and joined with the
/// screenshot's creation time.
///
/// Fields the extractor could not read are `None` rather than a magic number.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Screenshot file name. Unique per reading.
    pub filename: String,
    /// When the reading was taken, naive local time.
    pub timestamp: NaiveDateTime,
    /// Solar irradiance in W/m².
    pub measurement: Option<f64>,
    pub coordinates: Option<LatLon>,
}

impl Observation {
    pub fn new(filename: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            filename: filename.into(),
            timestamp,
            measurement: None,
            coordinates: None,
        }
    }

    pub fn with_measurement(mut self, measurement: f64) -> Self {
        self.measurement = Some(measurement);
        self
    }

    pub fn with_coordinates(mut self, coordinates: LatLon) -> Self {
        self.coordinates = Some(coordinates);
        self
    }
}
