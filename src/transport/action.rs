//! The three remote actions of the publish workflow
//!
//! Each [`Action`] turns one workflow phase into exactly one HTTP call and
//! extracts the textual result that phase produces:
//! - `Upload`: raw response body carrying the file id
//! - `Register`: the `Location` header of the queued processing job
//! - `PollStatus`: the job's `status` field, or `""` when absent

use crate::core::error::{PublishError, Result};
use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Debian revision appended to the package version at registration
pub const DEBIAN_REVISION_SUFFIX: &str = "-1";

/// Multipart field carrying the artifact bytes
pub const UPLOAD_FIELD_NAME: &str = "file";

pub const FILES_ENDPOINT: &str = "/v1/files";
pub const PACKAGES_ENDPOINT: &str = "/v1/packages";

/// Package registration data sent to `/v1/packages`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub file_id: String,
    pub package_name: String,
    pub package_version: String,
    pub repository_id: String,
}

/// JSON body of a package registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPackageBody {
    pub name: String,
    pub version: String,
    pub file_id: String,
    pub repository_id: String,
}

impl RegisterRequest {
    /// Build the request body, appending the Debian revision to the version
    pub fn body(&self) -> RegisterPackageBody {
        RegisterPackageBody {
            name: self.package_name.clone(),
            version: format!("{}{}", self.package_version, DEBIAN_REVISION_SUFFIX),
            file_id: self.file_id.clone(),
            repository_id: self.repository_id.clone(),
        }
    }
}

/// One remote step of the publish workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Upload { file_path: PathBuf },
    Register(RegisterRequest),
    PollStatus { queue_location: String },
}

impl Action {
    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Register(_) => "register",
            Self::PollStatus { .. } => "poll",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Upload { .. } | Self::Register(_) => Method::POST,
            Self::PollStatus { .. } => Method::GET,
        }
    }

    /// Full URL of the call against `base_address`
    pub fn url(&self, base_address: &str) -> String {
        match self {
            Self::Upload { .. } => format!("{}{}", base_address, FILES_ENDPOINT),
            Self::Register(_) => format!("{}{}", base_address, PACKAGES_ENDPOINT),
            Self::PollStatus { queue_location } => format!("{}{}", base_address, queue_location),
        }
    }

    /// Perform the HTTP call and extract the phase result
    pub async fn execute(&self, client: &Client, base_address: &str) -> Result<String> {
        let url = self.url(base_address);
        debug!(action = self.name(), method = %self.method(), url = %url, "sending request");

        match self {
            Self::Upload { file_path } => {
                let bytes = tokio::fs::read(file_path)
                    .await
                    .map_err(|source| PublishError::FileRead {
                        path: file_path.clone(),
                        source,
                    })?;
                let file_name = upload_file_name(file_path)?;
                debug!(file_name = %file_name, size = bytes.len(), "uploading artifact");

                let form = Form::new().part(
                    UPLOAD_FIELD_NAME,
                    Part::bytes(bytes).file_name(file_name),
                );
                let response = self.send(client.post(&url).multipart(form), &url).await?;
                let response = self.ensure_success(response, &url).await?;
                self.read_body(response, &url).await
            }
            Self::Register(request) => {
                let response = self
                    .send(client.post(&url).json(&request.body()), &url)
                    .await?;
                let response = self.ensure_success(response, &url).await?;
                self.single_location(&response, &url)
            }
            Self::PollStatus { .. } => {
                let response = self.send(client.get(&url), &url).await?;
                let response = self.ensure_success(response, &url).await?;
                let body = self.read_body(response, &url).await?;
                Ok(extract_status(&body))
            }
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| self.failure(url, None, e.to_string()))
    }

    async fn ensure_success(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.failure(url, Some(status.as_u16()), body))
    }

    async fn read_body(&self, response: Response, url: &str) -> Result<String> {
        let status = response.status().as_u16();
        response
            .text()
            .await
            .map_err(|e| self.failure(url, Some(status), e.to_string()))
    }

    fn single_location(&self, response: &Response, url: &str) -> Result<String> {
        let status = response.status().as_u16();
        let values: Vec<_> = response.headers().get_all(LOCATION).iter().collect();

        match values.as_slice() {
            [value] => value.to_str().map(str::to_string).map_err(|_| {
                self.failure(url, Some(status), "Location header is not valid text".to_string())
            }),
            [] => Err(self.failure(
                url,
                Some(status),
                "response has no Location header".to_string(),
            )),
            many => Err(self.failure(
                url,
                Some(status),
                format!("response has {} Location headers, expected one", many.len()),
            )),
        }
    }

    fn failure(&self, url: &str, status: Option<u16>, message: String) -> PublishError {
        PublishError::ActionFailed {
            action: self.name().to_string(),
            method: self.method().to_string(),
            url: url.to_string(),
            status,
            message,
        }
    }
}

/// Base name of the artifact path, sent as the multipart filename
pub fn upload_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| PublishError::InvalidConfiguration {
            field: "file".to_string(),
            message: format!("{} has no file name", path.display()),
        })
}

/// `status` of a poll response body, or `""` when the body has none
pub fn extract_status(body: &str) -> String {
    if !body.contains("\"status\"") {
        return String::new();
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("status")
            .and_then(|status| status.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "poll response is not valid JSON, treating as not ready");
            String::new()
        }
    }
}

/// `id` of an upload response body
pub fn parse_file_id(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct UploadResponse {
        id: String,
    }

    serde_json::from_str::<UploadResponse>(body)
        .map(|response| response.id)
        .map_err(|e| PublishError::InvalidResponse {
            action: "upload".to_string(),
            message: format!("missing file id in {:?}: {}", body, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn register_request(version: &str) -> RegisterRequest {
        RegisterRequest {
            file_id: "F1".to_string(),
            package_name: "foo".to_string(),
            package_version: version.to_string(),
            repository_id: "R1".to_string(),
        }
    }

    #[test]
    fn test_register_appends_revision_once() {
        for (input, expected) in [
            ("1.2.3", "1.2.3-1"),
            ("2.0.0-rc1", "2.0.0-rc1-1"),
            ("20240101", "20240101-1"),
            ("1.0-1", "1.0-1-1"),
        ] {
            assert_eq!(register_request(input).body().version, expected);
        }
    }

    #[test]
    fn test_register_body_uses_camel_case() {
        let body = serde_json::to_value(register_request("2.0.0").body()).unwrap();

        assert_eq!(
            body,
            json!({
                "name": "foo",
                "version": "2.0.0-1",
                "fileId": "F1",
                "repositoryId": "R1"
            })
        );
    }

    #[test]
    fn test_upload_file_name_is_base_name() {
        assert_eq!(
            upload_file_name(Path::new("/build/out/deep/pkg_1.0_amd64.deb")).unwrap(),
            "pkg_1.0_amd64.deb"
        );
        assert_eq!(upload_file_name(Path::new("pkg.deb")).unwrap(), "pkg.deb");
        assert!(upload_file_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_extract_status() {
        assert_eq!(extract_status(r#"{"status":"fileReady"}"#), "fileReady");
        assert_eq!(extract_status(r#"{"state":"processing"}"#), "");
        assert_eq!(extract_status(""), "");
        assert_eq!(extract_status(r#"{"status": 3}"#), "");
        assert_eq!(extract_status(r#"{"status":"queu"#), "");
    }

    #[test]
    fn test_parse_file_id() {
        assert_eq!(parse_file_id(r#"{"id":"F1","size":12}"#).unwrap(), "F1");
        assert!(matches!(
            parse_file_id(r#"{"name":"x"}"#),
            Err(PublishError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_urls() {
        let base = "https://repo.example.com";

        assert_eq!(
            Action::Upload {
                file_path: PathBuf::from("a.deb")
            }
            .url(base),
            "https://repo.example.com/v1/files"
        );
        assert_eq!(
            Action::Register(register_request("1")).url(base),
            "https://repo.example.com/v1/packages"
        );
        assert_eq!(
            Action::PollStatus {
                queue_location: "/v1/queue/Q1".to_string()
            }
            .url(base),
            "https://repo.example.com/v1/queue/Q1"
        );
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(body_string_contains(
                "name=\"file\"; filename=\"demo_1.0_amd64.deb\"",
            ))
            .and(body_string_contains("artifact-bytes"))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"F1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("dir");
        std::fs::create_dir_all(&nested).unwrap();
        let file_path = nested.join("demo_1.0_amd64.deb");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"artifact-bytes").unwrap();

        let body = Action::Upload { file_path }
            .execute(&Client::new(), &server.uri())
            .await
            .unwrap();

        assert_eq!(parse_file_id(&body).unwrap(), "F1");
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let result = Action::Upload {
            file_path: PathBuf::from("/nonexistent/artifact.deb"),
        }
        .execute(&Client::new(), "http://127.0.0.1:9")
        .await;

        assert!(matches!(result, Err(PublishError::FileRead { .. })));
    }

    #[tokio::test]
    async fn test_register_returns_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/packages"))
            .and(body_json(json!({
                "name": "foo",
                "version": "2.0.0-1",
                "fileId": "F1",
                "repositoryId": "R1"
            })))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", "/v1/queue/Q1"))
            .expect(1)
            .mount(&server)
            .await;

        let location = Action::Register(register_request("2.0.0"))
            .execute(&Client::new(), &server.uri())
            .await
            .unwrap();

        assert_eq!(location, "/v1/queue/Q1");
    }

    #[tokio::test]
    async fn test_register_without_location_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/packages"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let result = Action::Register(register_request("2.0.0"))
            .execute(&Client::new(), &server.uri())
            .await;

        match result {
            Err(PublishError::ActionFailed {
                action, message, ..
            }) => {
                assert_eq!(action, "register");
                assert!(message.contains("no Location"));
            }
            other => panic!("expected ActionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_with_two_locations_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/packages"))
            .respond_with(
                ResponseTemplate::new(202)
                    .append_header("Location", "/v1/queue/Q1")
                    .append_header("Location", "/v1/queue/Q2"),
            )
            .mount(&server)
            .await;

        let result = Action::Register(register_request("2.0.0"))
            .execute(&Client::new(), &server.uri())
            .await;

        match result {
            Err(PublishError::ActionFailed { message, .. }) => {
                assert!(message.contains("2 Location headers"));
            }
            other => panic!("expected ActionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_carries_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/packages"))
            .respond_with(ResponseTemplate::new(409).set_body_string("version already exists"))
            .mount(&server)
            .await;

        let result = Action::Register(register_request("2.0.0"))
            .execute(&Client::new(), &server.uri())
            .await;

        match result {
            Err(PublishError::ActionFailed {
                method,
                status,
                message,
                url,
                ..
            }) => {
                assert_eq!(method, "POST");
                assert_eq!(status, Some(409));
                assert_eq!(message, "version already exists");
                assert!(url.ends_with("/v1/packages"));
            }
            other => panic!("expected ActionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_status_without_status_field_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/queue/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"progress":40}"#))
            .mount(&server)
            .await;

        let status = Action::PollStatus {
            queue_location: "/v1/queue/Q1".to_string(),
        }
        .execute(&Client::new(), &server.uri())
        .await
        .unwrap();

        assert_eq!(status, "");
    }

    #[tokio::test]
    async fn test_poll_status_reads_status_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/queue/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"processing"}"#))
            .mount(&server)
            .await;

        let status = Action::PollStatus {
            queue_location: "/v1/queue/Q1".to_string(),
        }
        .execute(&Client::new(), &server.uri())
        .await
        .unwrap();

        assert_eq!(status, "processing");
    }
}
