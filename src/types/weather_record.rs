use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// One hourly reading from the weather provider.
///
/// `values` holds one entry per weather field the provider returned a number
/// for; a field the provider left out or reported as null has no entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeatherRecord {
    /// Hour-aligned provider timestamp, naive local time.
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, f64>,
}

impl WeatherRecord {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}
