//! Target server, repository and credentials of a publish run

use crate::core::error::{PublishError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Basic-auth identity for the repository service
///
/// The password is held in a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Result<Self> {
        let username = username.into();
        if username.is_empty() {
            return Err(PublishError::empty_field("username"));
        }
        if password.expose_secret().is_empty() {
            return Err(PublishError::empty_field("password"));
        }

        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// base64 of `username:password`
    pub fn basic_token(&self) -> String {
        STANDARD.encode(format!(
            "{}:{}",
            self.username,
            self.password.expose_secret()
        ))
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: SecretString::new(self.password.expose_secret().into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Repository service and target repository of a publish run
///
/// # Examples
///
/// ```
/// use repo_publisher::transport::RepositoryDestination;
/// use secrecy::SecretString;
///
/// let destination = RepositoryDestination::new(
///     "ci",
///     SecretString::new("hunter2".into()),
///     "packages.example.com",
///     "stable",
/// )
/// .unwrap();
/// assert_eq!(destination.base_address(), "https://packages.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryDestination {
    credentials: Credentials,
    server: String,
    repository_id: String,
}

impl RepositoryDestination {
    /// Fails with [`PublishError::InvalidConfiguration`] if any input is empty
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        server: impl Into<String>,
        repository_id: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(username, password)?;
        let server = server.into();
        let repository_id = repository_id.into();

        if server.trim().is_empty() {
            return Err(PublishError::empty_field("server"));
        }
        if repository_id.trim().is_empty() {
            return Err(PublishError::empty_field("repository_id"));
        }

        Ok(Self {
            credentials,
            server,
            repository_id,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// `https://{server}`, or the server itself when it already has a scheme
    pub fn base_address(&self) -> String {
        if self.server.starts_with("https://") || self.server.starts_with("http://") {
            self.server.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.server)
        }
    }

    /// Opaque Basic-auth token derived from the credentials
    pub fn auth_token(&self) -> String {
        self.credentials.basic_token()
    }

    /// Value of the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.auth_token())
    }
}
