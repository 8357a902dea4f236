//! Publish Orchestrator - end-to-end publishing workflow
//!
//! Manages the three remote phases of a publish:
//! - Upload of the artifact bytes
//! - Registration of the package against the uploaded file
//! - Polling of the processing job until the package is ready

use crate::core::error::{PublishError, Result};
use crate::core::retry::{Backoff, DEFAULT_MAX_ATTEMPTS, RetryPolicy, retry_until};
use crate::transport::action::parse_file_id;
use crate::transport::{
    Action, RegisterRequest, RepositoryDestination, TransportExecutor, TransportOptions,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Status reported by the processing job once the package is published
pub const READY_STATUS: &str = "fileReady";

/// Description of the polling phase in retry diagnostics
pub const POLL_DESCRIPTION: &str = "wait for package processing";

/// Artifact being published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    file_path: PathBuf,
    name: String,
    version: String,
}

impl PackageDescriptor {
    pub fn new(
        file_path: impl Into<PathBuf>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let file_path = file_path.into();
        let name = name.into();
        let version = version.into();

        if file_path.as_os_str().is_empty() {
            return Err(PublishError::empty_field("file"));
        }
        if name.trim().is_empty() {
            return Err(PublishError::empty_field("package_name"));
        }
        if version.trim().is_empty() {
            return Err(PublishError::empty_field("package_version"));
        }

        Ok(Self {
            file_path,
            name,
            version,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// File id returned by the upload phase
#[derive(Debug, PartialEq, Eq)]
pub struct UploadedFileHandle(String);

impl UploadedFileHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Path of the processing job returned by the register phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLocation(String);

impl QueueLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of a successful publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub success: bool,
    pub package_name: String,
    /// Version as registered, revision suffix included
    pub version: String,
    pub repository_id: String,
    pub file_id: String,
    pub queue_location: String,
    pub poll_attempts: u32,
    /// Milliseconds
    pub duration: u64,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Main publish orchestrator
pub struct PublishOrchestrator {
    executor: TransportExecutor,
    repository_id: String,
    poll_policy: RetryPolicy,
}

impl PublishOrchestrator {
    /// Create an orchestrator with the default polling policy
    pub fn new(destination: &RepositoryDestination, options: &TransportOptions) -> Result<Self> {
        Ok(Self {
            executor: TransportExecutor::new(destination, options)?,
            repository_id: destination.repository_id().to_string(),
            poll_policy: Self::default_poll_policy(DEFAULT_MAX_ATTEMPTS)?,
        })
    }

    /// Polling policy with the default backoff and the given attempt budget
    pub fn default_poll_policy(max_attempts: u32) -> Result<RetryPolicy> {
        RetryPolicy::new(max_attempts, Backoff::default(), POLL_DESCRIPTION)
    }

    pub fn with_poll_policy(mut self, policy: RetryPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn poll_policy(&self) -> &RetryPolicy {
        &self.poll_policy
    }

    /// Publish a package and wait until the service has processed it
    ///
    /// Upload and register failures abort immediately. Only the polling
    /// phase is retried.
    pub async fn publish(&self, package: &PackageDescriptor) -> Result<PublishReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "publish",
            %run_id,
            package = package.name(),
            version = package.version(),
            repository = %self.repository_id,
        );

        self.run(package).instrument(span).await
    }

    async fn run(&self, package: &PackageDescriptor) -> Result<PublishReport> {
        let start_time = Instant::now();

        // 1. Upload
        let handle = self.upload(package).await?;
        let file_id = handle.as_str().to_string();

        // 2. Register
        let register = self.register_request(handle, package);
        let version = register.body().version;
        let location = self.register(register).await?;

        // 3. Poll
        let poll_attempts = self.wait_until_ready(&location).await?;

        let duration = start_time.elapsed().as_millis() as u64;
        info!(poll_attempts, duration_ms = duration, "package published");

        Ok(PublishReport {
            success: true,
            package_name: package.name().to_string(),
            version,
            repository_id: self.repository_id.clone(),
            file_id,
            queue_location: location.to_string(),
            poll_attempts,
            duration,
            published_at: chrono::Utc::now(),
        })
    }

    async fn upload(&self, package: &PackageDescriptor) -> Result<UploadedFileHandle> {
        info!(file = %package.file_path().display(), "uploading artifact");

        let body = self
            .executor
            .execute(&Action::Upload {
                file_path: package.file_path().to_path_buf(),
            })
            .await?;
        let file_id = parse_file_id(&body)?;

        info!(file_id = %file_id, "artifact uploaded");
        Ok(UploadedFileHandle(file_id))
    }

    fn register_request(
        &self,
        handle: UploadedFileHandle,
        package: &PackageDescriptor,
    ) -> RegisterRequest {
        RegisterRequest {
            file_id: handle.0,
            package_name: package.name().to_string(),
            package_version: package.version().to_string(),
            repository_id: self.repository_id.clone(),
        }
    }

    async fn register(&self, request: RegisterRequest) -> Result<QueueLocation> {
        info!(file_id = %request.file_id, "registering package");

        let location = self.executor.execute(&Action::Register(request)).await?;

        info!(queue_location = %location, "package queued for processing");
        Ok(QueueLocation(location))
    }

    async fn wait_until_ready(&self, location: &QueueLocation) -> Result<u32> {
        let action = Action::PollStatus {
            queue_location: location.as_str().to_string(),
        };

        let outcome = retry_until(
            &self.poll_policy,
            || self.executor.execute(&action),
            |status: &String| status == READY_STATUS,
        )
        .await?;

        Ok(outcome.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_descriptor_validation() {
        assert!(PackageDescriptor::new("out/foo.deb", "foo", "1.0.0").is_ok());

        for (path, name, version, field) in [
            ("", "foo", "1.0.0", "file"),
            ("out/foo.deb", "", "1.0.0", "package_name"),
            ("out/foo.deb", "foo", " ", "package_version"),
        ] {
            match PackageDescriptor::new(path, name, version) {
                Err(PublishError::InvalidConfiguration { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected InvalidConfiguration, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_default_poll_policy() {
        let policy = PublishOrchestrator::default_poll_policy(DEFAULT_MAX_ATTEMPTS).unwrap();

        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.backoff(), &Backoff::default());
        assert_eq!(policy.description(), POLL_DESCRIPTION);
    }

    #[test]
    fn test_version_not_mutated_before_registration() {
        let package = PackageDescriptor::new("out/foo.deb", "foo", "2.0.0").unwrap();

        assert_eq!(package.version(), "2.0.0");
    }
}
