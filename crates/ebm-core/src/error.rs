use thiserror::Error;

/// Core errors for the EBM stock API client.
///
/// Every variant is a poll failure from the monitor's point of view.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Stock API error: status={status}, message={message}")]
    Api { status: u16, message: String },

    #[error("No results in API response for {region_id}, {az_name}")]
    NoResults { region_id: String, az_name: String },

    #[error("Device type '{0}' not found in stocks list")]
    DeviceNotFound(String),

    #[error("Malformed API response: {0}")]
    Malformed(String),

    #[error("Signing key error: {0}")]
    SigningKey(String),
}

impl CoreError {
    /// Whether the API answered but simply had nothing matching the query.
    ///
    /// Only used to pick a log level; these are still poll failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoResults { .. } | Self::DeviceNotFound(_))
    }
}
