//! HTTP client for the Vault API.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Address used when none is configured.
pub const DEFAULT_VAULT_ADDR: &str = "http://localhost:8200";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Header carrying the client token.
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Renewal properties of the client token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Whether the token may be renewed.
    pub renewable: bool,
    /// Remaining time to live.
    pub ttl: Duration,
}

/// A Vault API client bound to one address and token.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    addr: String,
    token: Zeroizing<String>,
}

impl VaultClient {
    /// Creates a client for `addr` authenticated with `token`.
    ///
    /// An empty `addr` falls back to [`DEFAULT_VAULT_ADDR`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptyToken`] if `token` is empty, or an HTTP
    /// error if the client cannot be built.
    pub fn new(addr: &str, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(VaultError::EmptyToken);
        }

        let addr = if addr.is_empty() { DEFAULT_VAULT_ADDR } else { addr };
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            addr: addr.trim_end_matches('/').to_string(),
            token: Zeroizing::new(token.to_string()),
        })
    }

    /// Returns the Vault address this client talks to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        debug!(%method, path, "vault request");

        let mut request = self
            .http
            .request(method, self.url(path))
            .header(TOKEN_HEADER, self.token.as_str())
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Some(Value::Null));
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(VaultError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                message: first_error(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| VaultError::MalformedResponse {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Reads a logical path and returns its `data` object.
    ///
    /// Returns `Ok(None)` when the path does not exist.
    pub async fn read(&self, path: &str) -> Result<Option<Value>> {
        let body = self.send(Method::GET, path, None, &[]).await?;
        Ok(body.and_then(|mut b| b.get_mut("data").map(Value::take)))
    }

    /// Writes `body` to a logical path and returns the response `data`
    /// object, if Vault sent one.
    pub async fn write(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        match self.send(Method::POST, path, Some(body), &[]).await? {
            Some(mut response) => Ok(response.get_mut("data").map(Value::take)),
            None => Err(VaultError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                path: path.to_string(),
                message: "no handler for path".to_string(),
            }),
        }
    }

    /// Lists the keys directly under a logical path.
    ///
    /// Returns an empty list when the path does not exist.
    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        let Some(body) = self.send(Method::GET, path, None, &[("list", "true")]).await? else {
            return Ok(Vec::new());
        };

        let keys = body
            .pointer("/data/keys")
            .and_then(Value::as_array)
            .ok_or_else(|| VaultError::MalformedResponse {
                path: path.to_string(),
                reason: "missing data.keys".to_string(),
            })?;

        Ok(keys
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Looks up the client token.
    pub async fn lookup_self(&self) -> Result<TokenInfo> {
        let path = "auth/token/lookup-self";
        let data = self
            .read(path)
            .await?
            .ok_or_else(|| VaultError::MalformedResponse {
                path: path.to_string(),
                reason: "missing data".to_string(),
            })?;

        Ok(TokenInfo {
            renewable: data.get("renewable").and_then(Value::as_bool).unwrap_or(false),
            ttl: Duration::from_secs(data.get("ttl").and_then(Value::as_u64).unwrap_or(0)),
        })
    }

    /// Renews the client token and returns its new lease.
    pub async fn renew_self(&self) -> Result<TokenInfo> {
        let path = "auth/token/renew-self";
        let body = self
            .send(Method::POST, path, Some(&serde_json::json!({})), &[])
            .await?
            .unwrap_or(Value::Null);

        let auth = body.get("auth").ok_or_else(|| VaultError::MalformedResponse {
            path: path.to_string(),
            reason: "missing auth".to_string(),
        })?;

        Ok(TokenInfo {
            renewable: auth.get("renewable").and_then(Value::as_bool).unwrap_or(false),
            ttl: Duration::from_secs(
                auth.get("lease_duration").and_then(Value::as_u64).unwrap_or(0),
            ),
        })
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("addr", &self.addr)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Extracts the first entry of Vault's `{"errors": [...]}` body.
fn first_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> VaultClient {
        VaultClient::new(&server.uri(), "test-token").expect("client")
    }

    #[test]
    fn new_rejects_empty_token() {
        let result = VaultClient::new("http://vault:8200", "");
        assert!(matches!(result, Err(VaultError::EmptyToken)));
    }

    #[test]
    fn new_defaults_address() {
        let client = VaultClient::new("", "t").expect("client");
        assert_eq!(client.addr(), DEFAULT_VAULT_ADDR);
    }

    #[test]
    fn debug_redacts_token() {
        let client = VaultClient::new("http://vault:8200/", "s.supersecret").expect("client");
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("supersecret"));
        assert_eq!(client.addr(), "http://vault:8200");
    }

    #[test]
    fn first_error_extracts_vault_message() {
        assert_eq!(first_error(r#"{"errors":["permission denied"]}"#), "permission denied");
        assert_eq!(first_error("plain failure\n"), "plain failure");
    }

    #[tokio::test]
    async fn read_returns_data_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/dep/app/public"))
            .and(header("X-Vault-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"data": {"key": "value"}, "metadata": {"version": 3}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let data = client
            .read("secret/data/dep/app/public")
            .await
            .expect("read")
            .expect("present");

        assert_eq!(data.pointer("/data/key"), Some(&json!("value")));
    }

    #[tokio::test]
    async fn read_missing_path_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let data = client.read("secret/data/nothing").await.expect("read");
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn write_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transit/encrypt/key"))
            .and(body_json(json!({"plaintext": "aGVsbG8="})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"ciphertext": "vault:v1:abc"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let data = client
            .write("transit/encrypt/key", &json!({"plaintext": "aGVsbG8="}))
            .await
            .expect("write")
            .expect("data");
        assert_eq!(data["ciphertext"], "vault:v1:abc");
    }

    #[tokio::test]
    async fn write_without_body_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let data = client
            .write("transit/keys/new", &json!({}))
            .await
            .expect("write");
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn status_errors_carry_vault_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .write("secret/data/x", &json!({}))
            .await
            .expect_err("should fail");

        match err {
            VaultError::Status { status, message, .. } => {
                assert_eq!(status, 403);
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_returns_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/dep"))
            .and(query_param("list", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"keys": ["app1/", "global/"]}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let keys = client.list("secret/metadata/dep").await.expect("list");
        assert_eq!(keys, vec!["app1/".to_string(), "global/".to_string()]);
    }

    #[tokio::test]
    async fn list_missing_path_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.list("secret/metadata/none").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn lookup_and_renew_self() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"renewable": true, "ttl": 600}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {"renewable": true, "lease_duration": 1200}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let info = client.lookup_self().await.expect("lookup");
        assert_eq!(
            info,
            TokenInfo {
                renewable: true,
                ttl: Duration::from_secs(600)
            }
        );

        let renewed = client.renew_self().await.expect("renew");
        assert_eq!(renewed.ttl, Duration::from_secs(1200));
    }
}
