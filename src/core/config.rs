//! Configuration structures for repo-publisher
//!
//! Every field is optional so a configuration file, environment variables
//! and command-line flags can each contribute a layer. The password is
//! never part of this structure.

use crate::core::error::{PublishError, Result};
use crate::core::retry::{Backoff, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::orchestration::{POLL_DESCRIPTION, PackageDescriptor};
use crate::transport::{RepositoryDestination, TransportOptions};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublishConfig {
    /// Repository server host (or base URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Target repository id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,

    /// Service username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Artifact to publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageConfig>,

    /// Processing job polling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollConfig>,

    /// HTTP transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,
}

/// Artifact settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Polling settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollConfig {
    /// Attempt budget (default: 5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// First backoff interval in seconds, doubled on every attempt (default: 5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_secs: Option<u64>,
}

/// Transport settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransportConfig {
    /// Disable TLS certificate validation (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_invalid_certs: Option<bool>,

    /// Request timeout in seconds (default: 600)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn pick<T>(higher: Option<T>, lower: Option<T>) -> Option<T> {
    higher.or(lower)
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PublishError::InvalidConfiguration {
            field: field.to_string(),
            message: "is required".to_string(),
        }),
    }
}

impl PublishConfig {
    /// Layer `higher` over `self`; values set in `higher` win
    pub fn merge(self, higher: PublishConfig) -> PublishConfig {
        PublishConfig {
            server: pick(higher.server, self.server),
            repository_id: pick(higher.repository_id, self.repository_id),
            username: pick(higher.username, self.username),
            package: merge_section(self.package, higher.package, |lower, higher| PackageConfig {
                file: pick(higher.file, lower.file),
                name: pick(higher.name, lower.name),
                version: pick(higher.version, lower.version),
            }),
            poll: merge_section(self.poll, higher.poll, |lower, higher| PollConfig {
                max_attempts: pick(higher.max_attempts, lower.max_attempts),
                initial_delay_secs: pick(higher.initial_delay_secs, lower.initial_delay_secs),
            }),
            transport: merge_section(self.transport, higher.transport, |lower, higher| {
                TransportConfig {
                    accept_invalid_certs: pick(
                        higher.accept_invalid_certs,
                        lower.accept_invalid_certs,
                    ),
                    timeout_secs: pick(higher.timeout_secs, lower.timeout_secs),
                }
            }),
        }
    }

    /// Destination built from the configured server, repository and username
    pub fn destination(&self, password: SecretString) -> Result<RepositoryDestination> {
        RepositoryDestination::new(
            required(&self.username, "username")?,
            password,
            required(&self.server, "server")?,
            required(&self.repository_id, "repository_id")?,
        )
    }

    pub fn package(&self) -> Result<PackageDescriptor> {
        let package = self.package.clone().unwrap_or_default();
        let file = package
            .file
            .ok_or_else(|| PublishError::InvalidConfiguration {
                field: "file".to_string(),
                message: "is required".to_string(),
            })?;

        PackageDescriptor::new(
            file,
            required(&package.name, "package_name")?,
            required(&package.version, "package_version")?,
        )
    }

    pub fn poll_policy(&self) -> Result<RetryPolicy> {
        let poll = self.poll.clone().unwrap_or_default();
        let backoff = match poll.initial_delay_secs {
            Some(secs) => Backoff::Exponential {
                base: Duration::from_secs(secs),
            },
            None => Backoff::default(),
        };

        RetryPolicy::new(
            poll.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff,
            POLL_DESCRIPTION,
        )
    }

    pub fn transport_options(&self) -> TransportOptions {
        let transport = self.transport.clone().unwrap_or_default();
        let defaults = TransportOptions::default();

        TransportOptions {
            accept_invalid_certs: transport
                .accept_invalid_certs
                .unwrap_or(defaults.accept_invalid_certs),
            timeout: transport
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

fn merge_section<T, F>(lower: Option<T>, higher: Option<T>, merge: F) -> Option<T>
where
    F: FnOnce(T, T) -> T,
{
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(merge(lower, higher)),
        (lower, higher) => higher.or(lower),
    }
}
