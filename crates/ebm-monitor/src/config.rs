use std::path::Path;
use std::time::Duration;

use ebm_core::client::DEFAULT_ENDPOINT;
use ebm_core::{Credential, MonitoredResource};
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::interval::{MAX_INTERVAL, MIN_INTERVAL, parse_interval};

/// Default poll cadence: 5 seconds.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound on a single HTTP call: 10 seconds.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const ACCESS_KEY_ENV: &str = "EOP_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "EOP_SECRET_KEY";

/// Config file as written on disk.
#[derive(Debug, Deserialize)]
struct RawConfig {
    endpoint: Option<String>,
    interval: Option<String>,
    request_timeout: Option<String>,
    #[serde(default)]
    resources: Vec<MonitoredResource>,
    #[serde(default)]
    recipients: Vec<String>,
}

/// Validated monitor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    /// Base poll interval before jitter.
    pub interval: Duration,
    pub request_timeout: Duration,
    pub resources: Vec<MonitoredResource>,
    pub recipients: Vec<String>,
}

impl Config {
    /// Read and validate the TOML config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        if raw.resources.is_empty() {
            return Err(ConfigError::NoResources);
        }
        for (index, resource) in raw.resources.iter().enumerate() {
            validate_resource(index, resource)?;
        }

        let recipients: Vec<String> = raw
            .recipients
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }

        Ok(Self {
            endpoint: raw
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            interval: duration_field("interval", raw.interval, DEFAULT_INTERVAL)?,
            request_timeout: duration_field(
                "request_timeout",
                raw.request_timeout,
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            resources: raw.resources,
            recipients,
        })
    }
}

fn validate_resource(index: usize, resource: &MonitoredResource) -> Result<(), ConfigError> {
    let fields = [
        ("region_id", &resource.region_id),
        ("az_name", &resource.az_name),
        ("device_type", &resource.device_type),
        ("display_name", &resource.display_name),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidResource { index, field });
        }
    }
    Ok(())
}

fn duration_field(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match parse_interval(&value) {
        Some(d) if (MIN_INTERVAL..=MAX_INTERVAL).contains(&d) => Ok(d),
        _ => Err(ConfigError::InvalidInterval { name, value }),
    }
}

/// Load the access key pair from the environment.
pub fn credential_from_env() -> Result<Credential, ConfigError> {
    let access_key =
        std::env::var(ACCESS_KEY_ENV).map_err(|_| ConfigError::MissingEnv(ACCESS_KEY_ENV))?;
    let secret_key =
        std::env::var(SECRET_KEY_ENV).map_err(|_| ConfigError::MissingEnv(SECRET_KEY_ENV))?;
    Ok(Credential::new(access_key, secret_key)?)
}

/// SMTP settings for the email notifier.
#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl SmtpSettings {
    /// Read `SMTP_SERVER`, `SMTP_PORT`, `SENDER_EMAIL` and `SENDER_PASSWORD`.
    ///
    /// Returns `Ok(None)` if any of them is unset; the notifier then reports
    /// every delivery as failed. A port that is set but not a number is an
    /// error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (Some(server), Some(port), Some(sender), Some(password)) = (
            get("SMTP_SERVER"),
            get("SMTP_PORT"),
            get("SENDER_EMAIL"),
            get("SENDER_PASSWORD"),
        ) else {
            return Ok(None);
        };

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;

        Ok(Some(Self {
            server,
            port,
            sender,
            password,
        }))
    }
}
