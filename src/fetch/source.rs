use crate::fetch::error::FetchError;
use crate::types::weather_record::WeatherRecord;
use chrono::NaiveDate;
use std::future::Future;

/// A remote provider of hourly weather data, queried one calendar day at a
/// time.
///
/// Implementations return the provider's hourly rows for `day` with
/// timestamps already converted to naive local time. A failure only concerns
/// that day.
pub trait WeatherSource {
    /// The weather fields requested from the provider.
    fn fields(&self) -> &[String];

    fn fetch_day(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<WeatherRecord>, FetchError>> + Send;
}
