//! HTTP client for the remote authenticator.
//!
//! This module provides the `AuthClient` struct, a thin typed wrapper over
//! the four authenticator endpoints (`/register`, `/login-password`,
//! `/login-face`, `/me`) plus the health probe. It does not touch the
//! session store; callers decide what to do with issued tokens.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Identity;
use crate::config::Config;

use super::ApiError;

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    images: &'a [String],
}

#[derive(Debug, Serialize)]
struct LoginPasswordRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginFaceRequest<'a> {
    username: &'a str,
    image: &'a str,
}

/// Token issued by `/register` and `/login-password`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `/login-face` answers 200 for both matches and non-matches; the outcome
/// lives in the body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaceLoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Best match distance reported by the matcher, when it got that far
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the remote authenticator.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a client from the loaded configuration
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_base_url, config.request_timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "Authenticator returned failure status");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Create an account from a password and captured frames
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        images: &[String],
    ) -> Result<TokenResponse, ApiError> {
        debug!(username = %username, frames = images.len(), "POST /register");
        let body = RegisterRequest { username, password, images };
        self.post("/register", &body).await
    }

    pub async fn login_password(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        debug!(username = %username, "POST /login-password");
        let body = LoginPasswordRequest { username, password };
        self.post("/login-password", &body).await
    }

    /// Submit a single encoded frame for matching
    pub async fn login_face(&self, username: &str, image: &str) -> Result<FaceLoginResponse, ApiError> {
        debug!(username = %username, "POST /login-face");
        let body = LoginFaceRequest { username, image };
        self.post("/login-face", &body).await
    }

    /// Resolve the identity behind a bearer token.
    /// Any non-2xx status is treated as unauthorized.
    pub async fn me(&self, token: &str) -> Result<Identity, ApiError> {
        let response = self
            .client
            .get(self.url("/me"))
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Identity check rejected");
            return Err(ApiError::Unauthorized);
        }
        Ok(response.json().await?)
    }

    /// Probe the authenticator root endpoint
    pub async fn health(&self) -> Result<bool, ApiError> {
        let response = self.client.get(self.url("/")).send().await?;
        let response = Self::check_response(response).await?;
        let health: HealthResponse = response.json().await?;
        Ok(health.status == "ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn client_for(server: &MockServer) -> AuthClient {
        AuthClient::with_base_url(&server.uri(), Duration::from_secs(5)).expect("client should build")
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AuthClient::with_base_url("http://localhost:8000/", Duration::from_secs(1))
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/me"), "http://localhost:8000/me");
    }

    #[test]
    fn test_parse_face_login_failure_body() {
        let resp: FaceLoginResponse =
            serde_json::from_str(r#"{"success": false, "distance": 0.62}"#).expect("should parse");
        assert!(!resp.success);
        assert!(resp.access_token.is_none());
        assert_eq!(resp.distance, Some(0.62));

        let resp: FaceLoginResponse =
            serde_json::from_str(r#"{"error": "No valid face found"}"#).expect("should parse");
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("No valid face found"));
    }

    #[tokio::test]
    async fn test_register_sends_all_frames() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .and(body_json(json!({
                "username": "alice",
                "password": "secret",
                "images": ["f0", "f1", "f2"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok1",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let images = vec!["f0".to_string(), "f1".to_string(), "f2".to_string()];
        let token = client_for(&server)
            .register("alice", "secret", &images)
            .await
            .expect("register should succeed");
        assert_eq!(token.access_token, "tok1");
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test]
    async fn test_login_password_rejected() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-password"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .login_password("alice", "wrong")
            .await
            .expect_err("login should be rejected");
        assert!(matches!(err, ApiError::Rejected(ref d) if d == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_me_sends_bearer_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header_eq("authorization", "Bearer tok1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "alice"})))
            .mount(&server)
            .await;

        let identity = client_for(&server).me("tok1").await.expect("me should succeed");
        assert_eq!(identity.username, "alice");

        let err = client_for(&server).me("other").await.expect_err("unmatched token should fail");
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_health() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).health().await.expect("health should succeed"));
    }
}
