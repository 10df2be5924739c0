use chrono::NaiveDateTime;

/// A hand-logged sky condition (e.g. "clear", "overcast") for one grid
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyState {
    pub timestamp: NaiveDateTime,
    pub sky: String,
}
