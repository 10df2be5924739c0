//! Client for the Visual Crossing timeline API, the paid provider behind the
//! weather archive.
//!
//! One request returns the hourly rows of a single day. Each row carries the
//! provider's epoch timestamp, which is converted to naive local time before
//! it leaves this module.

use crate::fetch::error::FetchError;
use crate::fetch::source::WeatherSource;
use crate::types::weather_record::WeatherRecord;
use bon::bon;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const EPOCH_ELEMENT: &str = "datetimeEpoch";

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    days: Vec<TimelineDay>,
}

#[derive(Debug, Deserialize)]
struct TimelineDay {
    #[serde(default)]
    hours: Vec<TimelineHour>,
}

#[derive(Debug, Deserialize)]
struct TimelineHour {
    #[serde(rename = "datetimeEpoch")]
    datetime_epoch: i64,
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

/// Fetches hourly weather for one location from Visual Crossing.
///
/// # Examples
///
/// ```no_run
/// use solar_enrich::{VisualCrossingClient, WeatherSource, FetchError};
/// use chrono::NaiveDate;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), FetchError> {
/// let client = VisualCrossingClient::builder()
///     .api_key("MY_KEY")
///     .location("46404")
///     .fields(vec!["cloudcover".to_string(), "solarradiation".to_string()])
///     .timeout(Duration::from_secs(10))
///     .build()?;
///
/// let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
/// let hours = client.fetch_day(day).await?;
/// println!("{} hourly rows for {}", hours.len(), day);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct VisualCrossingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    location: String,
    fields: Vec<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for VisualCrossingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualCrossingClient")
            .field("base_url", &self.base_url)
            .field("location", &self.location)
            .field("fields", &self.fields)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[bon]
impl VisualCrossingClient {
    /// Creates a client.
    ///
    /// # Arguments
    ///
    /// * `.api_key(..)`: **Required.** Visual Crossing API key.
    /// * `.location(..)`: **Required.** ZIP code or other location accepted by the API.
    /// * `.fields(Vec<String>)`: **Required.** Weather elements to request, e.g. `cloudcover`.
    /// * `.timeout(Duration)`: Optional. Per-request timeout. Defaults to 30 seconds.
    /// * `.max_retries(u32)`: Optional. Extra attempts for transient failures. Defaults to 2.
    /// * `.retry_delay(Duration)`: Optional. Base delay between attempts, multiplied by the attempt number.
    /// * `.base_url(String)`: Optional. Overrides the API endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be created.
    #[builder]
    pub fn new(
        #[builder(into)] api_key: String,
        #[builder(into)] location: String,
        fields: Vec<String>,
        timeout: Option<Duration>,
        max_retries: Option<u32>,
        retry_delay: Option<Duration>,
        base_url: Option<String>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            location,
            fields,
            max_retries: max_retries.unwrap_or(2),
            retry_delay: retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

impl VisualCrossingClient {
    /// URL for one day, without the API key.
    fn day_url(&self, day: NaiveDate) -> String {
        format!("{}/{}/{}", self.base_url, self.location, day.format("%Y-%m-%d"))
    }

    async fn fetch_once(&self, day: NaiveDate) -> Result<Vec<WeatherRecord>, FetchError> {
        let elements = std::iter::once(EPOCH_ELEMENT)
            .chain(self.fields.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",");
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { day }
            } else {
                // The URL carries the API key.
                FetchError::Network {
                    day,
                    source: e.without_url(),
                }
            }
        };

        let response = self
            .http
            .get(self.day_url(day))
            .query(&[
                ("key", self.api_key.as_str()),
                ("contentType", "json"),
                ("include", "hours"),
                ("elements", elements.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus { day, status });
        }
        let body = response.bytes().await.map_err(request_error)?;
        let timeline: TimelineResponse = serde_json::from_slice(&body)
            .map_err(|source| FetchError::Payload { day, source })?;

        let hours = timeline
            .days
            .into_iter()
            .next()
            .ok_or(FetchError::MissingDay { day })?
            .hours;
        hours
            .into_iter()
            .map(|hour| self.to_record(day, hour))
            .collect()
    }

    fn to_record(&self, day: NaiveDate, hour: TimelineHour) -> Result<WeatherRecord, FetchError> {
        let timestamp = epoch_to_local(hour.datetime_epoch).ok_or(FetchError::InvalidEpoch {
            day,
            epoch: hour.datetime_epoch,
        })?;
        let mut record = WeatherRecord::new(timestamp);
        for field in &self.fields {
            match hour.values.get(field) {
                Some(value) => match value.as_f64() {
                    Some(number) => {
                        record.values.insert(field.clone(), number);
                    }
                    None if value.is_null() => {}
                    None => debug!(
                        "Ignoring non-numeric value {} for '{}' at {}",
                        value, field, timestamp
                    ),
                },
                None => debug!("Provider omitted '{}' at {}", field, timestamp),
            }
        }
        Ok(record)
    }
}

impl WeatherSource for VisualCrossingClient {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<WeatherRecord>, FetchError> {
        let mut attempt = 0;
        loop {
            info!("Requesting weather for {} from {}", day, self.day_url(day));
            match self.fetch_once(day).await {
                Ok(records) => {
                    info!("Received {} hourly rows for {}", records.len(), day);
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Attempt {} for {} failed ({}), retrying",
                        attempt, day, e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => {
                    warn!("Giving up on weather for {}: {}", day, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Converts provider epoch seconds to naive local time, the representation
/// used everywhere else in the pipeline.
pub fn epoch_to_local(epoch: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(epoch, 0).map(|utc| utc.with_timezone(&Local).naive_local())
}
