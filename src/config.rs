//! Run configuration, read from environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_FIELDS: &str = "cloudcover,solarradiation";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_RETRIES: u32 = 2;
const CACHE_DIR_NAME: &str = "solar_enrich";
const ARCHIVE_FILE_NAME: &str = "api_archive.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),

    #[error("Environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("Could not determine system cache directory; set ARCHIVE_PATH")]
    CacheDirResolution,
}

/// Everything the remote fetcher and the archive need.
#[derive(Clone)]
pub struct EnrichConfig {
    pub api_key: String,
    /// ZIP code or other location string understood by the provider.
    pub location: String,
    pub fields: Vec<String>,
    pub archive_path: PathBuf,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
    pub fetch_retries: u32,
}

impl std::fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("api_key", &"<redacted>")
            .field("location", &self.location)
            .field("fields", &self.fields)
            .field("archive_path", &self.archive_path)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("fetch_retries", &self.fetch_retries)
            .finish()
    }
}

/// Default archive location inside the user cache directory.
pub fn default_archive_path() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME).join(ARCHIVE_FILE_NAME))
        .ok_or(ConfigError::CacheDirResolution)
}

impl EnrichConfig {
    /// Reads `API_KEY`, `ZIPCODE`, `DATA`, `ARCHIVE_PATH`,
    /// `FETCH_TIMEOUT_SECS`, `FETCH_CONCURRENCY` and `FETCH_RETRIES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), with variables taken from
    /// `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let api_key = required("API_KEY")?;
        let location = required("ZIPCODE")?;

        let fields: Vec<String> = get("DATA")
            .unwrap_or_else(|| DEFAULT_FIELDS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            return Err(ConfigError::Invalid {
                name: "DATA",
                value: get("DATA").unwrap_or_default(),
            });
        }

        let archive_path = match get("ARCHIVE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_archive_path()?,
        };

        Ok(Self {
            api_key,
            location,
            fields,
            archive_path,
            fetch_timeout: Duration::from_secs(parse_or(
                &get,
                "FETCH_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            fetch_concurrency: parse_or(&get, "FETCH_CONCURRENCY", DEFAULT_CONCURRENCY)?.max(1),
            fetch_retries: parse_or(&get, "FETCH_RETRIES", DEFAULT_RETRIES)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
