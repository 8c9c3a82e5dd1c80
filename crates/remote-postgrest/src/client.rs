//! REST client for the hosted row store.
//!
//! Rows live behind PostgREST-style table endpoints under `/rest/v1`; the
//! owning user is resolved through `/auth/v1/user` with the session's access
//! token. Every filter the sync core needs is expressed as query operators
//! (`eq.`, `gte.`, `lt.`).

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use saldo_core::entities::EntityKind;
use saldo_core::store::{RemoteStore, TimeRange};

use crate::error::{RemoteError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Client for the hosted database's REST surface.
///
/// Constructed once at startup with the project base URL and anon API key;
/// the session access token is installed after login and cleared on logout.
#[derive(Debug)]
pub struct PostgrestClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl PostgrestClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The project origin (e.g., "https://xyz.supabase.co")
    /// * `api_key` - The public (anon) API key
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    /// Install or clear the session access token (login/logout).
    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut slot) => *slot = token,
            Err(_) => log::error!("access token lock poisoned"),
        }
    }

    fn bearer(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|slot| slot.clone())
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteError::auth("Invalid API key format"))?;
        headers.insert("apikey", api_key_value);

        let token = self.bearer().unwrap_or_else(|| self.api_key.clone());
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| RemoteError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn table_url(&self, table: &str) -> Result<String> {
        if EntityKind::from_table(table).is_none() {
            return Err(RemoteError::invalid_request(format!(
                "Unknown table '{}'",
                table
            )));
        }
        Ok(format!("{}/rest/v1/{}", self.base_url, table))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
                let code = error.code.unwrap_or_else(|| "error".to_string());
                return Err(RemoteError::api(
                    status.as_u16(),
                    format!("{}: {}", code, error.message),
                ));
            }
            return Err(RemoteError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check a body-less response for success while preserving API errors.
    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
            let code = error.code.unwrap_or_else(|| "error".to_string());
            return Err(RemoteError::api(
                status.as_u16(),
                format!("{}: {}", code, error.message),
            ));
        }
        Err(RemoteError::api(
            status.as_u16(),
            format!("Request failed: {}", body),
        ))
    }

    /// Resolve the authenticated user, if a session is installed.
    ///
    /// GET /auth/v1/user
    pub async fn current_user_id(&self) -> Result<Option<String>> {
        if self.bearer().is_none() {
            return Ok(None);
        }
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;
        if matches!(response.status().as_u16(), 401 | 403) {
            debug!("session token rejected, treating as signed out");
            return Ok(None);
        }
        let user: AuthUser = Self::parse_response(response).await?;
        Ok(Some(user.id))
    }

    /// Fetch the owner's rows.
    ///
    /// GET /rest/v1/{table}?select=*&user_id=eq.{owner}
    pub async fn select_rows(
        &self,
        table: &str,
        owner_id: &str,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Value>> {
        let url = self.table_url(table)?;
        let mut query: Vec<(String, String)> = vec![
            ("select".to_string(), "*".to_string()),
            ("user_id".to_string(), format!("eq.{}", owner_id)),
        ];
        if let Some(range) = range {
            query.push((
                range.column.to_string(),
                format!("gte.{}", range.start.to_rfc3339()),
            ));
            query.push((
                range.column.to_string(),
                format!("lt.{}", range.end.to_rfc3339()),
            ));
        }

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&query)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Insert a row and return its canonical representation.
    ///
    /// POST /rest/v1/{table}
    pub async fn insert_row(&self, table: &str, row: Value) -> Result<Value> {
        let url = self.table_url(table)?;
        let mut headers = self.headers()?;
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Value> = Self::parse_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::api(200, "Insert returned no representation"))
    }

    /// Patch a row and return its canonical representation.
    ///
    /// PATCH /rest/v1/{table}?id=eq.{id}&user_id=eq.{owner}
    pub async fn update_row(
        &self,
        table: &str,
        id: &str,
        owner_id: &str,
        changes: Value,
    ) -> Result<Value> {
        let url = self.table_url(table)?;
        let mut headers = self.headers()?;
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        let query = [
            ("id".to_string(), format!("eq.{}", id)),
            ("user_id".to_string(), format!("eq.{}", owner_id)),
        ];

        let response = self
            .client
            .patch(&url)
            .headers(headers)
            .query(&query)
            .json(&changes)
            .send()
            .await?;
        let rows: Vec<Value> = Self::parse_response(response).await?;
        rows.into_iter().next().ok_or_else(|| {
            RemoteError::api(200, format!("No row '{}' matched the update", id))
        })
    }

    /// Delete a row.
    ///
    /// DELETE /rest/v1/{table}?id=eq.{id}&user_id=eq.{owner}
    pub async fn delete_row(&self, table: &str, id: &str, owner_id: &str) -> Result<()> {
        let url = self.table_url(table)?;
        let query = [
            ("id".to_string(), format!("eq.{}", id)),
            ("user_id".to_string(), format!("eq.{}", owner_id)),
        ];

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .query(&query)
            .send()
            .await?;
        Self::expect_success(response).await
    }
}

fn to_core_error(err: RemoteError) -> saldo_core::Error {
    saldo_core::Error::remote(err.to_string())
}

#[async_trait]
impl RemoteStore for PostgrestClient {
    async fn current_owner_id(&self) -> saldo_core::Result<Option<String>> {
        self.current_user_id().await.map_err(to_core_error)
    }

    async fn select(
        &self,
        table: &str,
        owner_id: &str,
        range: Option<&TimeRange>,
    ) -> saldo_core::Result<Vec<Value>> {
        self.select_rows(table, owner_id, range)
            .await
            .map_err(to_core_error)
    }

    async fn insert(&self, table: &str, row: Value) -> saldo_core::Result<Value> {
        self.insert_row(table, row).await.map_err(to_core_error)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        owner_id: &str,
        changes: Value,
    ) -> saldo_core::Result<Value> {
        self.update_row(table, id, owner_id, changes)
            .await
            .map_err(to_core_error)
    }

    async fn delete(&self, table: &str, id: &str, owner_id: &str) -> saldo_core::Result<()> {
        self.delete_row(table, id, owner_id)
            .await
            .map_err(to_core_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        target: String,
    }

    #[derive(Debug, Clone)]
    struct MockResponse {
        status: u16,
        body: String,
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            500 => "Internal Server Error",
            _ => "Error",
        }
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
                let mut lines = head.lines();
                let request_line = lines.next()?.to_string();
                let mut parts = request_line.split_whitespace();
                let method = parts.next()?.to_string();
                let target = parts.next()?.to_string();

                let content_length = lines
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body_read = buffer.len() - header_end - 4;
                while body_read < content_length {
                    let mut chunk = [0_u8; 2048];
                    let read = stream.read(&mut chunk).await.ok()?;
                    if read == 0 {
                        break;
                    }
                    body_read += read;
                }
                return Some(CapturedRequest { method, target });
            }
        }
    }

    async fn start_mock_server(
        responses: Vec<MockResponse>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(responses)));
        let captured_clone = Arc::clone(&captured);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                captured_clone.lock().await.push(request);

                let response = scripted.lock().await.pop_front().unwrap_or(MockResponse {
                    status: 500,
                    body: r#"{"message":"unexpected request"}"#.to_string(),
                });
                let payload = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    status_text(response.status),
                    response.body.len(),
                    response.body
                );
                let _ = stream.write_all(payload.as_bytes()).await;
                let _ = stream.flush().await;
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    #[tokio::test]
    async fn select_scopes_rows_to_the_owner() {
        let rows = json!([
            { "id": "srv-1", "user_id": "user-1", "name": "Nubank" }
        ]);
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: rows.to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        let fetched = client
            .select_rows("banks", "user-1", None)
            .await
            .expect("select rows");

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0]["name"], "Nubank");

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].target.starts_with("/rest/v1/banks?"));
        assert!(requests[0].target.contains("user_id=eq.user-1"));

        server.abort();
    }

    #[tokio::test]
    async fn select_applies_time_range_operators() {
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: "[]".to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        let range = TimeRange {
            column: "occurred_at",
            start: "2026-01-01T00:00:00Z".parse().expect("start"),
            end: "2026-02-01T00:00:00Z".parse().expect("end"),
        };
        client
            .select_rows("transactions", "user-1", Some(&range))
            .await
            .expect("select rows");

        let requests = captured.lock().await.clone();
        assert!(requests[0].target.contains("occurred_at=gte."));
        assert!(requests[0].target.contains("occurred_at=lt."));

        server.abort();
    }

    #[tokio::test]
    async fn insert_returns_the_representation_row() {
        let body = json!([
            { "id": "srv-9", "user_id": "user-1", "name": "Inter" }
        ]);
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 201,
            body: body.to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        let created = client
            .insert_row("banks", json!({ "name": "Inter", "user_id": "user-1" }))
            .await
            .expect("insert row");

        assert_eq!(created["id"], "srv-9");
        let requests = captured.lock().await.clone();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/rest/v1/banks");

        server.abort();
    }

    #[tokio::test]
    async fn api_errors_surface_status_and_message() {
        let (base_url, _captured, server) = start_mock_server(vec![MockResponse {
            status: 401,
            body: r#"{"message":"JWT expired","code":"PGRST301"}"#.to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        let result = client.select_rows("banks", "user-1", None).await;

        match result {
            Err(RemoteError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("PGRST301"));
            }
            other => panic!("expected API error, got {:?}", other),
        }

        server.abort();
    }

    #[tokio::test]
    async fn unknown_tables_are_rejected_before_the_wire() {
        let client = PostgrestClient::new("http://127.0.0.1:9", "anon-key");
        let result = client.select_rows("profiles", "user-1", None).await;
        assert!(matches!(result, Err(RemoteError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn owner_resolution_without_a_session_is_none() {
        let client = PostgrestClient::new("http://127.0.0.1:9", "anon-key");
        assert_eq!(client.current_user_id().await.expect("no session"), None);
    }

    #[tokio::test]
    async fn owner_resolution_with_a_session_returns_the_user() {
        let (base_url, captured, server) = start_mock_server(vec![MockResponse {
            status: 200,
            body: r#"{"id":"user-1","email":"a@b.dev"}"#.to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        client.set_access_token(Some("jwt-token".to_string()));
        let owner = client.current_user_id().await.expect("resolve owner");

        assert_eq!(owner.as_deref(), Some("user-1"));
        let requests = captured.lock().await.clone();
        assert_eq!(requests[0].target, "/auth/v1/user");

        server.abort();
    }

    #[tokio::test]
    async fn rejected_session_token_degrades_to_signed_out() {
        let (base_url, _captured, server) = start_mock_server(vec![MockResponse {
            status: 401,
            body: r#"{"message":"invalid JWT"}"#.to_string(),
        }])
        .await;

        let client = PostgrestClient::new(&base_url, "anon-key");
        client.set_access_token(Some("stale-token".to_string()));
        assert_eq!(client.current_user_id().await.expect("signed out"), None);

        server.abort();
    }
}
