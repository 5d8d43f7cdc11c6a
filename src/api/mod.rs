//! HTTP client for the Conditional Access policy manager backend
//!
//! Most backend routes answer with a JSON envelope of the shape
//! `{"success": bool, "error": "...", ...}`. The client retries transient
//! failures, checks the envelope and hands typed payloads to callers.
//! Named locations and the AI routes return bare JSON (`get_plain`) and
//! the findings export returns a file (`download`).

pub mod ai;
pub mod groups;
pub mod locations;
pub mod policies;
pub mod report;
pub mod templates;

use crate::config::Credentials;
use crate::error::{CapmError, Result};
use crate::model::PolicyItem;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Default retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Operations the table and the bulk runner need from the backend
pub trait PolicyApi {
    fn list_items(&self) -> impl Future<Output = Result<Vec<PolicyItem>>> + Send;

    fn delete_item(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns the created policy as reported by the backend
    fn deploy_template(&self, template: &Value) -> impl Future<Output = Result<Value>> + Send;

    fn deploy_recommendation(&self, index: usize) -> impl Future<Output = Result<()>> + Send;
}

/// Retry behaviour for transient failures (429, 5xx, connection errors)
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with jitter for the given attempt
    fn backoff(&self, attempt: u32) -> Duration {
        use std::hash::{Hash, Hasher};

        let initial_ms = self.initial_backoff.as_millis() as u64;
        let base_backoff = initial_ms.saturating_mul(2u64.saturating_pow(attempt));
        let capped_backoff = base_backoff.min(self.max_backoff.as_millis() as u64);

        let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
        let jitter = if jitter_range > 0 {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::time::SystemTime::now().hash(&mut hasher);
            (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped_backoff as i64 + jitter).max(0) as u64)
    }
}

/// Minimal envelope fields shared by every response
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Response of `GET /api/health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response of `POST /api/connect`
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub policy_count: usize,
}

#[derive(Debug, Deserialize)]
struct Disconnected {
    #[serde(default)]
    message: String,
}

/// Policy manager API client with retry support
///
/// The backend keeps the Graph connection in its session, so the cookie
/// store lives as long as the client does.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("capm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self.send_with_retry(Method::GET, endpoint, None).await?;
        read_envelope(resp).await
    }

    pub async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        let resp = self.send_with_retry(Method::POST, endpoint, Some(body)).await?;
        read_envelope(resp).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self.send_with_retry(Method::DELETE, endpoint, None).await?;
        read_envelope(resp).await
    }

    /// GET a route that answers with bare JSON instead of the envelope
    pub async fn get_plain<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self.send_with_retry(Method::GET, endpoint, None).await?;
        let status = resp.status();
        let text = resp.text().await?;
        parse_plain(status, &text)
    }

    /// GET a file download; returns the suggested file name and the bytes
    pub async fn download(&self, endpoint: &str) -> Result<(Option<String>, Vec<u8>)> {
        let resp = self.send_with_retry(Method::GET, endpoint, None).await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(status_error(status, &text));
        }

        let file_name = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name);
        let bytes = resp.bytes().await?;
        Ok((file_name, bytes.to_vec()))
    }

    /// Send a request, retrying transient failures
    ///
    /// GET and DELETE retry on 429, 5xx and any transport error. POST creates
    /// policies and groups, so it only retries on 429 and on failures to
    /// connect, where the backend never saw the request.
    async fn send_with_retry(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(endpoint);
        let max_retries = self.retry.max_retries.max(1);
        let idempotent = matches!(method, Method::GET | Method::DELETE);
        let mut last_error: Option<CapmError> = None;

        for attempt in 0..max_retries {
            let last_attempt = attempt == max_retries - 1;
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if !last_attempt && (idempotent || e.is_connect()) {
                        let wait_time = self.retry.backoff(attempt);
                        tracing::warn!(
                            "Connection error: {}. Retrying in {:?}... (attempt {}/{})",
                            e,
                            wait_time,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(e.into());
                        continue;
                    }
                    return Err(e.into());
                }
            };

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && !last_attempt {
                let wait_time = resp
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.retry.backoff(attempt));

                tracing::warn!(
                    "Rate limited (429). Retrying in {:?}... (attempt {}/{})",
                    wait_time,
                    attempt + 1,
                    max_retries
                );
                tokio::time::sleep(wait_time).await;
                last_error = Some(CapmError::ApiError(format!("{} {} was rate limited", method, url)));
                continue;
            }

            if status.is_server_error() && idempotent && !last_attempt {
                let wait_time = self.retry.backoff(attempt);
                tracing::warn!(
                    "Server error ({}). Retrying in {:?}... (attempt {}/{})",
                    status,
                    wait_time,
                    attempt + 1,
                    max_retries
                );
                tokio::time::sleep(wait_time).await;
                last_error = Some(CapmError::ApiError(format!("HTTP {}", status)));
                continue;
            }

            return Ok(resp);
        }

        Err(last_error.unwrap_or_else(|| {
            CapmError::ApiError(format!(
                "{} {} failed after {} retries",
                method, url, max_retries
            ))
        }))
    }

    /// Upload a file as multipart form data (single attempt, the form is not replayable)
    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .multipart(form)
            .send()
            .await?;
        read_envelope(resp).await
    }

    /// Check that the backend is up and whether it holds a Graph connection
    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("api/health").await
    }

    /// Connect the backend session to a tenant with client credentials
    pub async fn connect(&self, credentials: &Credentials, verify_ssl: bool) -> Result<ConnectResult> {
        let body = serde_json::json!({
            "tenant_id": credentials.tenant_id,
            "client_id": credentials.client_id,
            "client_secret": credentials.client_secret,
            "verify_ssl": verify_ssl,
        });
        self.post("api/connect", &body).await
    }

    /// Drop the backend's Graph connection for this session
    pub async fn disconnect(&self) -> Result<String> {
        let result: Disconnected = self.post("api/disconnect", &serde_json::json!({})).await?;
        Ok(result.message)
    }
}

fn status_error(status: StatusCode, text: &str) -> CapmError {
    CapmError::ApiError(format!(
        "HTTP {}: {}",
        status.as_u16(),
        crate::error::enhance_api_error(status.as_u16(), text)
    ))
}

async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await?;
    parse_envelope(status, &text)
}

/// Check status and envelope, then deserialize the payload
fn parse_envelope<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    if !status.is_success() {
        return Err(status_error(status, text));
    }

    let body: Value = serde_json::from_str(text)?;
    let envelope: Envelope = serde_json::from_value(body.clone())?;

    if !envelope.success {
        return Err(CapmError::ApiError(
            envelope
                .error
                .unwrap_or_else(|| "backend reported failure without a reason".to_string()),
        ));
    }

    Ok(serde_json::from_value(body)?)
}

/// Status check for routes without an envelope; an explicit
/// `"success": false` is still honoured
fn parse_plain<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    if !status.is_success() {
        return Err(status_error(status, text));
    }

    let body: Value = serde_json::from_str(text)?;
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("backend reported failure without a reason");
        return Err(CapmError::ApiError(reason.to_string()));
    }

    Ok(serde_json::from_value(body)?)
}

/// `filename` from a `Content-Disposition: attachment; filename=...` header
fn attachment_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

impl PolicyApi for ApiClient {
    async fn list_items(&self) -> Result<Vec<PolicyItem>> {
        policies::list_policies(self).await
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        policies::delete_policy(self, id).await
    }

    async fn deploy_template(&self, template: &Value) -> Result<Value> {
        templates::deploy_template(self, template).await
    }

    async fn deploy_recommendation(&self, index: usize) -> Result<()> {
        report::deploy_recommendation(self, index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped_and_jittered() {
        let retry = RetryPolicy::default();
        for attempt in 0..8 {
            let wait = retry.backoff(attempt);
            assert!(wait <= Duration::from_millis((MAX_BACKOFF_MS as f64 * 1.3) as u64));
        }
        let first = retry.backoff(0).as_millis() as u64;
        assert!((700..=1300).contains(&first));
    }

    #[test]
    fn test_envelope_failure_becomes_api_error() {
        let err = parse_envelope::<Value>(StatusCode::OK, r#"{"success": false, "error": "Not connected"}"#)
            .unwrap_err();
        assert!(matches!(err, CapmError::ApiError(ref m) if m == "Not connected"));
    }

    #[test]
    fn test_non_success_status_carries_backend_reason() {
        let err = parse_envelope::<Value>(
            StatusCode::CONFLICT,
            r#"{"success": false, "error": "already exists"}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP 409"));
        assert!(msg.contains("already exists"));
    }

    #[test]
    fn test_envelope_success_deserializes_payload() {
        let health: HealthStatus = parse_envelope(
            StatusCode::OK,
            r#"{"success": true, "connected": true, "session_id": "abc"}"#,
        )
        .unwrap();
        assert!(health.connected);
        assert_eq!(health.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_plain_body_needs_no_envelope() {
        let body: Value = parse_plain(StatusCode::OK, r#"{"locations": []}"#).unwrap();
        assert!(body["locations"].is_array());

        let err = parse_plain::<Value>(StatusCode::OK, r#"{"success": false, "error": "No findings"}"#)
            .unwrap_err();
        assert!(matches!(err, CapmError::ApiError(ref m) if m == "No findings"));

        let err = parse_plain::<Value>(StatusCode::UNAUTHORIZED, r#"{"error": "Not authenticated"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 401: Not authenticated"));
    }

    #[test]
    fn test_attachment_file_name() {
        assert_eq!(
            attachment_file_name("attachment; filename=security_findings_20240101_120000.xlsx"),
            Some("security_findings_20240101_120000.xlsx".to_string())
        );
        assert_eq!(
            attachment_file_name(r#"attachment; filename="report.xlsx""#),
            Some("report.xlsx".to_string())
        );
        assert_eq!(attachment_file_name("inline"), None);
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.url("/api/policies"), "http://localhost:5000/api/policies");
    }
}
