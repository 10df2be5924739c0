use crate::types::observation::LatLon;

/// A named, known measurement site used to put names on coordinate clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationLabel {
    pub name: String,
    pub location: LatLon,
}

impl LocationLabel {
    pub fn new(name: impl Into<String>, location: LatLon) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}
