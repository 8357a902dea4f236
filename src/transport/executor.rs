//! Authenticated HTTP client for the repository service

use super::action::Action;
use super::destination::RepositoryDestination;
use crate::core::error::{PublishError, Result};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// Overall timeout applied to every request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Transport settings of the HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Disable TLS certificate validation
    ///
    /// Only for servers with a self-signed or internal certificate. This
    /// turns off protection against man-in-the-middle attacks.
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Executes one [`Action`] per call against a repository destination
///
/// The executor adds no retry behavior; failures of the action are
/// returned unchanged.
#[derive(Debug, Clone)]
pub struct TransportExecutor {
    client: Client,
    base_address: String,
}

impl TransportExecutor {
    pub fn new(destination: &RepositoryDestination, options: &TransportOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&destination.authorization_header())
            .map_err(|_| PublishError::InvalidConfiguration {
                field: "credentials".to_string(),
                message: "cannot be sent as an HTTP header".to_string(),
            })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if options.accept_invalid_certs {
            warn!(
                server = destination.server(),
                "TLS certificate validation is disabled"
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| PublishError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_address: destination.base_address(),
        })
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Perform exactly one round trip for `action`
    pub async fn execute(&self, action: &Action) -> Result<String> {
        let result = action.execute(&self.client, &self.base_address).await;
        if let Err(e) = &result {
            debug!(action = action.name(), error = %e, "action failed");
        }
        result
    }
}
