use std::path::PathBuf;

use ebm_core::{CoreError, CredentialError};

/// Errors from loading configuration. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML or has the wrong shape.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no resources found in config")]
    NoResources,
    #[error("no email addresses found in config")]
    NoRecipients,
    #[error("resource #{index} has an empty `{field}`")]
    InvalidResource { index: usize, field: &'static str },
    #[error("invalid {name}: {value}")]
    InvalidInterval { name: &'static str, value: String },
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid SMTP port: {0}")]
    InvalidPort(String),
    #[error("invalid credential: {0}")]
    Credential(#[from] CredentialError),
}

/// Errors from the SMTP notifier.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP settings are absent from the environment.
    #[error("SMTP configuration missing, cannot send email")]
    MissingSettings,
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("cannot build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Errors from the monitor process.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor config error: {0}")]
    Config(#[from] ConfigError),
    #[error("monitor core error: {0}")]
    Core(#[from] CoreError),
    #[error("monitor mail error: {0}")]
    Mail(#[from] MailError),
}
