//! Rucio REST client.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;
use urc_core::{CatalogClient, CatalogResult, DatasetId, FileId, ReplicaRecord};

use crate::{
    config::RucioConfig,
    error::{RucioError, RucioResult, Subject},
    types::{
        ApiErrorBody, DatasetContent, DatasetReplica, Did, ListReplicasRequest, ReplicaAnswer,
        parse_json_lines,
    },
};

/// Header carrying the session token, both ways.
pub const AUTH_TOKEN_HEADER: &str = "X-Rucio-Auth-Token";

const JSON_STREAM: &str = "application/x-json-stream";

/// Rucio REST API client.
///
/// Safe to share between tasks. The session token is fetched on first use,
/// cached, and refreshed once when the server rejects it.
pub struct RucioClient {
    http: Client,
    config: RucioConfig,
    base: Url,
    auth_base: Url,
    token: Mutex<Option<String>>,
}

impl fmt::Debug for RucioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RucioClient")
            .field("base", &self.base.as_str())
            .field("auth_base", &self.auth_base.as_str())
            .field("account", &self.config.account)
            .finish_non_exhaustive()
    }
}

impl RucioClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`RucioError::Config`] for an invalid configuration and
    /// [`RucioError::Http`] if the HTTP client cannot be built.
    pub fn new(config: RucioConfig) -> RucioResult<Self> {
        config.validate()?;
        let base = parse_base(&config.host)?;
        let auth_base = parse_base(config.auth_host())?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("urc/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: Mutex::new(config.auth_token.clone()),
            config,
            base,
            auth_base,
        })
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &RucioConfig {
        &self.config
    }

    /// Dataset replicas stored at `rse`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the last attempt.
    #[instrument(skip(self))]
    pub async fn list_dataset_replicas(&self, rse: &str) -> RucioResult<Vec<DatasetReplica>> {
        let url = endpoint(&self.base, &["replicas", "rse", rse])?;
        let body = self.fetch(|http| http.get(url.clone())).await?;
        parse_json_lines(&body)
    }

    /// Files attached to a dataset.
    ///
    /// # Errors
    ///
    /// Returns the failure of the last attempt.
    #[instrument(skip(self))]
    pub async fn list_content_files(
        &self,
        scope: &str,
        name: &str,
    ) -> RucioResult<Vec<DatasetContent>> {
        let url = endpoint(&self.base, &["dids", scope, name, "files"])?;
        let body = self.fetch(|http| http.get(url.clone())).await?;
        parse_json_lines(&body)
    }

    /// Replica locations and states for a set of files.
    ///
    /// # Errors
    ///
    /// Returns the failure of the last attempt.
    #[instrument(skip(self, dids), fields(dids = dids.len()))]
    pub async fn list_file_replicas(
        &self,
        dids: Vec<Did>,
        all_states: bool,
    ) -> RucioResult<Vec<ReplicaAnswer>> {
        let url = endpoint(&self.base, &["replicas", "list"])?;
        let request = ListReplicasRequest {
            dids,
            all_states,
            ignore_availability: false,
        };
        let body = self
            .fetch(|http| http.post(url.clone()).json(&request))
            .await?;
        parse_json_lines(&body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch<F>(&self, request: F) -> RucioResult<Bytes>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let retry = &self.config.retry;
        let mut attempts = 0;
        let mut reauthenticated = false;

        loop {
            attempts += 1;
            let token = self.token().await?;
            debug!(attempt = attempts, "Making Rucio API request");

            match self.send(&request, &token).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_unauthorized() && !reauthenticated && self.config.has_userpass() => {
                    warn!(error = %e, "Auth token rejected, re-authenticating");
                    self.invalidate(&token).await;
                    reauthenticated = true;
                }
                Err(e) if e.is_retryable() && attempts < retry.max_attempts => {
                    let delay = retry.delay_for(attempts);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retrying Rucio API request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send<F>(&self, request: &F, token: &str) -> RucioResult<Bytes>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = request(&self.http)
            .header(AUTH_TOKEN_HEADER, token)
            .header(ACCEPT, JSON_STREAM)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(api_error(response).await)
        }
    }

    async fn token(&self) -> RucioResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let fresh = self.authenticate().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    async fn invalidate(&self, stale: &str) {
        let mut cached = self.token.lock().await;
        if cached.as_deref() == Some(stale) {
            *cached = None;
        }
    }

    #[instrument(skip(self))]
    async fn authenticate(&self) -> RucioResult<String> {
        let (Some(account), Some(username), Some(password)) = (
            self.config.account.as_deref(),
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) else {
            return Err(RucioError::Auth(
                "no valid token and no userpass credentials configured".into(),
            ));
        };

        let url = endpoint(&self.auth_base, &["auth", "userpass"])?;
        debug!(account, username, "Requesting auth token");
        let response = self
            .http
            .get(url)
            .header("X-Rucio-Account", account)
            .header("X-Rucio-Username", username)
            .header("X-Rucio-Password", password)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RucioError::Auth(format!("no {AUTH_TOKEN_HEADER} header in response")))
    }
}

#[async_trait]
impl CatalogClient for RucioClient {
    async fn list_datasets_at(&self, endpoint: &str) -> CatalogResult<Vec<DatasetId>> {
        self.list_dataset_replicas(endpoint)
            .await
            .map(|rows| rows.into_iter().map(DatasetId::from).collect())
            .map_err(|e| e.into_catalog_error(Subject::Endpoint(endpoint)))
    }

    async fn list_files(&self, dataset: &DatasetId) -> CatalogResult<Vec<FileId>> {
        self.list_content_files(&dataset.scope, &dataset.name)
            .await
            .map(|rows| rows.into_iter().map(FileId::from).collect())
            .map_err(|e| e.into_catalog_error(Subject::Dataset(dataset)))
    }

    async fn list_replicas(
        &self,
        files: &[FileId],
        include_all_states: bool,
    ) -> CatalogResult<Vec<ReplicaRecord>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let dids = files.iter().map(Did::from).collect();
        self.list_file_replicas(dids, include_all_states)
            .await
            .map(|rows| rows.into_iter().map(ReplicaRecord::from).collect())
            .map_err(|e| e.into_catalog_error(Subject::Replicas))
    }
}

fn parse_base(raw: &str) -> RucioResult<Url> {
    let url = Url::parse(raw).map_err(|e| RucioError::Config(format!("invalid URL {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(RucioError::Config(format!("{raw} cannot be a base URL")));
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> RucioResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| RucioError::Config(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn api_error(response: Response) -> RucioError {
    let status = response.status();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let exception = header("ExceptionClass");
    let message = header("ExceptionMessage");

    let body = response.bytes().await.unwrap_or_default();
    let parsed: ApiErrorBody = serde_json::from_slice(&body).unwrap_or_default();
    let message = message
        .or(parsed.exception_message)
        .or_else(|| {
            let text = String::from_utf8_lossy(&body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    RucioError::Api {
        status: status.as_u16(),
        exception: exception.or(parsed.exception_class),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use urc_core::{CatalogError, ReplicaState};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    /// Create a test config pointing to the mock server.
    fn test_config(mock_server: &MockServer) -> RucioConfig {
        let mut config = RucioConfig::new(mock_server.uri());
        config.auth_token = Some("test_token".into());
        config.retry = crate::config::RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        };
        config
    }

    fn stream(lines: &[serde_json::Value]) -> String {
        lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn endpoint_encodes_segments() {
        let base = parse_base("https://rucio.example.org/api/").unwrap();
        let url = endpoint(&base, &["dids", "user.jdoe", "data set#1", "files"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://rucio.example.org/api/dids/user.jdoe/data%20set%231/files"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(parse_base("not a url"), Err(RucioError::Config(_))));
        assert!(matches!(parse_base("mailto:x@y"), Err(RucioError::Config(_))));
    }

    #[test]
    fn debug_omits_token() {
        let mut config = RucioConfig::new("https://rucio.example.org");
        config.auth_token = Some("secret-token".into());
        let client = RucioClient::new(config).unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_list_datasets_at() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/replicas/rse/SITE_DATADISK"))
            .and(header(AUTH_TOKEN_HEADER, "test_token"))
            .and(header("accept", JSON_STREAM))
            .respond_with(ResponseTemplate::new(200).set_body_string(stream(&[
                serde_json::json!({"scope": "mc16", "name": "ds1", "bytes": 10}),
                serde_json::json!({"scope": "data18", "name": "ds2", "bytes": 20}),
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let datasets = client.list_datasets_at("SITE_DATADISK").await.unwrap();

        assert_eq!(
            datasets,
            vec![DatasetId::new("mc16", "ds1"), DatasetId::new("data18", "ds2")]
        );
    }

    #[tokio::test]
    async fn test_list_files_encodes_name() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/dids/user.jdoe/run%201/files"))
            .respond_with(ResponseTemplate::new(200).set_body_string(stream(&[
                serde_json::json!({"scope": "user.jdoe", "name": "f1", "bytes": 1}),
                serde_json::json!({"scope": "user.jdoe", "name": "f2", "bytes": 2}),
            ])))
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let files = client
            .list_files(&DatasetId::new("user.jdoe", "run 1"))
            .await
            .unwrap();

        assert_eq!(
            files,
            vec![FileId::new("user.jdoe", "f1"), FileId::new("user.jdoe", "f2")]
        );
    }

    #[tokio::test]
    async fn test_list_replicas_posts_batch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/replicas/list"))
            .and(body_json(serde_json::json!({
                "dids": [
                    {"scope": "s", "name": "f1"},
                    {"scope": "s", "name": "f2"}
                ],
                "all_states": true,
                "ignore_availability": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(stream(&[
                serde_json::json!({
                    "scope": "s", "name": "f1",
                    "rses": {"X": ["root://x/f1"]},
                    "states": {"X": "AVAILABLE"}
                }),
                serde_json::json!({
                    "scope": "s", "name": "f2",
                    "rses": {"X": ["root://x/f2"], "Y": ["root://y/f2"]},
                    "states": {"X": "AVAILABLE", "Y": "UNAVAILABLE"}
                }),
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let records = client
            .list_replicas(&[FileId::new("s", "f1"), FileId::new("s", "f2")], true)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].state_at("Y"), Some(&ReplicaState::Unavailable));
    }

    #[tokio::test]
    async fn test_empty_replica_batch_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        assert!(client.list_replicas(&[], true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_rse_maps_to_endpoint_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/replicas/rse/NOPE"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("ExceptionClass", "RSENotFound")
                    .set_body_json(serde_json::json!({
                        "ExceptionClass": "RSENotFound",
                        "ExceptionMessage": "RSE 'NOPE' cannot be found"
                    })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client.list_datasets_at("NOPE").await.unwrap_err();

        assert_eq!(
            err,
            CatalogError::EndpointNotFound {
                endpoint: "NOPE".into()
            }
        );
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ExceptionClass": "InvalidObject",
                "ExceptionMessage": "bad scope"
            })))
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client.list_content_files("s", "d").await.unwrap_err();

        match err {
            RucioError::Api {
                status,
                exception,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(exception.as_deref(), Some("InvalidObject"));
                assert_eq!(message, "bad scope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/dids/s/d/files"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dids/s/d/files"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"scope":"s","name":"f"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let files = client.list_files(&DatasetId::new("s", "d")).await.unwrap();

        assert_eq!(files, vec![FileId::new("s", "f")]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/replicas/list"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client
            .list_replicas(&[FileId::new("s", "f")], true)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Transient { .. }));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/dids/s/gone/files"))
            .respond_with(
                ResponseTemplate::new(404).insert_header("ExceptionClass", "DataIdentifierNotFound"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client
            .list_files(&DatasetId::new("s", "gone"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_stream_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"scope\":"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client.list_datasets_at("X").await.unwrap_err();

        assert!(matches!(err, CatalogError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_userpass_login_and_token_reuse() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/userpass"))
            .and(header("X-Rucio-Account", "root"))
            .and(header("X-Rucio-Username", "ddmadmin"))
            .and(header("X-Rucio-Password", "secret"))
            .respond_with(ResponseTemplate::new(200).insert_header(AUTH_TOKEN_HEADER, "fresh"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/replicas/rse/X"))
            .and(header(AUTH_TOKEN_HEADER, "fresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server);
        config.auth_token = None;
        config.account = Some("root".into());
        config.username = Some("ddmadmin".into());
        config.password = Some("secret".into());
        let client = RucioClient::new(config).unwrap();

        assert!(client.list_datasets_at("X").await.unwrap().is_empty());
        assert!(client.list_datasets_at("X").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reauthenticates_once_on_rejected_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/replicas/rse/X"))
            .and(header(AUTH_TOKEN_HEADER, "test_token"))
            .respond_with(
                ResponseTemplate::new(401).insert_header("ExceptionClass", "CannotAuthenticate"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/userpass"))
            .respond_with(ResponseTemplate::new(200).insert_header(AUTH_TOKEN_HEADER, "renewed"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/replicas/rse/X"))
            .and(header(AUTH_TOKEN_HEADER, "renewed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"scope":"s","name":"d"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server);
        config.account = Some("root".into());
        config.username = Some("ddmadmin".into());
        config.password = Some("secret".into());
        let client = RucioClient::new(config).unwrap();

        let datasets = client.list_datasets_at("X").await.unwrap();
        assert_eq!(datasets, vec![DatasetId::new("s", "d")]);
    }

    #[tokio::test]
    async fn test_rejected_token_without_userpass_is_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RucioClient::new(test_config(&mock_server)).unwrap();
        let err = client.list_datasets_at("X").await.unwrap_err();

        assert!(matches!(err, CatalogError::Unauthorized { .. }));
    }
}
