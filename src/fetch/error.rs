use chrono::NaiveDate;
use thiserror::Error;

/// Failure to obtain one day of weather data.
///
/// Every variant that happens during a request names the day, so the caller
/// can report it and carry on with the other days. Messages never contain the
/// API key.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client for the weather provider")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request for {day} failed")]
    Network {
        day: NaiveDate,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request for {day} timed out")]
    Timeout { day: NaiveDate },

    #[error("Weather provider answered the request for {day} with status {status}")]
    HttpStatus {
        day: NaiveDate,
        status: reqwest::StatusCode,
    },

    #[error("Malformed weather payload for {day}")]
    Payload {
        day: NaiveDate,
        #[source]
        source: serde_json::Error,
    },

    #[error("Weather payload for {day} contained no day entry")]
    MissingDay { day: NaiveDate },

    #[error("Weather payload for {day} has out-of-range epoch timestamp {epoch}")]
    InvalidEpoch { day: NaiveDate, epoch: i64 },
}

impl FetchError {
    pub fn day(&self) -> Option<NaiveDate> {
        match self {
            FetchError::ClientBuild(_) => None,
            FetchError::Network { day, .. }
            | FetchError::Timeout { day }
            | FetchError::HttpStatus { day, .. }
            | FetchError::Payload { day, .. }
            | FetchError::MissingDay { day }
            | FetchError::InvalidEpoch { day, .. } => Some(*day),
        }
    }

    /// Network failures, timeouts, rate limiting and server errors may succeed
    /// on a later attempt. Everything else will not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
