use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT_GROUP: &str = "default_group";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse client config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid client config: {0}")]
    Invalid(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Settings shared by every channel payment a client signs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Escrow contract the channels live in; part of every signed payload.
    pub mpe_contract_address: Address,
    /// Blocks a channel must stay open past the current block. When unset
    /// the payment group's own threshold applies.
    #[serde(default)]
    pub expiration_threshold: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub org_id: String,
    pub service_id: String,
    #[serde(default = "default_endpoint_group")]
    pub endpoint_group: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub payment: PaymentConfig,
}

fn default_endpoint_group() -> String {
    DEFAULT_ENDPOINT_GROUP.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
        }
        if self.org_id.is_empty() || self.service_id.is_empty() {
            return Err(ConfigError::Invalid(
                "org_id and service_id must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
