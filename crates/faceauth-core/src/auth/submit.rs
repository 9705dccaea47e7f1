//! Credential submission.
//!
//! `SubmissionService` sends a password or face-capture credential to the
//! authenticator and folds every remote outcome into an [`AuthResult`]. Only
//! missing local input is reported as an error, and that is always decided
//! before a request is built.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ApiError, AuthClient, FaceLoginResponse};
use crate::error::{ErrorKind, ValidationError};

use super::SessionStore;

/// Error text for any failure that never produced a usable answer from the
/// authenticator (unreachable, timed out, malformed body).
pub const NETWORK_ERROR: &str = "network";

/// Error text when a 401 arrives without a reason
pub const UNAUTHORIZED_ERROR: &str = "unauthorized";

/// Error text when the face matcher ran but found no match
pub const FACE_NOT_RECOGNIZED: &str = "face not recognized";

/// A credential presented to the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password { username: String, password: String },
    /// Encoded frames in capture order
    FaceCapture { username: String, images: Vec<String> },
}

/// Normalized outcome of a submission, whichever endpoint served it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    pub fn ok(token: String) -> Self {
        Self {
            success: true,
            token: Some(token),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            token: None,
            error: Some(error.into()),
        }
    }

    pub fn network() -> Self {
        Self::failed(NETWORK_ERROR)
    }

    pub fn is_network_failure(&self) -> bool {
        self.error.as_deref() == Some(NETWORK_ERROR)
    }
}

impl From<ApiError> for AuthResult {
    fn from(err: ApiError) -> Self {
        match (err.kind(), err) {
            (ErrorKind::Auth, ApiError::Rejected(detail)) => AuthResult::failed(detail),
            (ErrorKind::Auth, _) => AuthResult::failed(UNAUTHORIZED_ERROR),
            _ => AuthResult::network(),
        }
    }
}

pub struct SubmissionService {
    client: AuthClient,
    store: Arc<SessionStore>,
}

impl SubmissionService {
    pub fn new(client: AuthClient, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Log in with username and password
    pub async fn submit_password(&self, username: &str, password: &str) -> Result<AuthResult, ValidationError> {
        require(username, ValidationError::MissingUsername)?;
        require(password, ValidationError::MissingPassword)?;

        let outcome = self
            .client
            .login_password(username, password)
            .await
            .map(|t| t.access_token);
        Ok(self.finish("login-password", outcome))
    }

    /// Log in with captured frames.
    ///
    /// Only the first frame is sent; the rest of the capture is dropped here.
    pub async fn submit_face_capture(&self, username: &str, images: &[String]) -> Result<AuthResult, ValidationError> {
        require(username, ValidationError::MissingUsername)?;
        let first = images.first().ok_or(ValidationError::MissingImages)?;

        let result = match self.client.login_face(username, first).await {
            Ok(response) => Self::face_outcome(response),
            Err(e) => {
                warn!(error = %e, "Face login request failed");
                AuthResult::from(e)
            }
        };
        Ok(self.install("login-face", result))
    }

    /// Create an account with both factors: password and every captured frame
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        images: &[String],
    ) -> Result<AuthResult, ValidationError> {
        require(username, ValidationError::MissingUsername)?;
        require(password, ValidationError::MissingPassword)?;
        if images.is_empty() {
            return Err(ValidationError::MissingImages);
        }

        let outcome = self
            .client
            .register(username, password, images)
            .await
            .map(|t| t.access_token);
        Ok(self.finish("register", outcome))
    }

    /// Submit whichever credential variant the caller holds
    pub async fn submit(&self, credential: &Credential) -> Result<AuthResult, ValidationError> {
        match credential {
            Credential::Password { username, password } => self.submit_password(username, password).await,
            Credential::FaceCapture { username, images } => self.submit_face_capture(username, images).await,
        }
    }

    /// Drop the current session
    pub fn logout(&self) {
        self.store.clear();
        info!("Logged out");
    }

    fn face_outcome(response: FaceLoginResponse) -> AuthResult {
        match response {
            FaceLoginResponse {
                success: true,
                access_token: Some(token),
                ..
            } => AuthResult::ok(token),
            // A match without a token is not something we can act on
            FaceLoginResponse { success: true, .. } => AuthResult::network(),
            FaceLoginResponse {
                error: Some(error), ..
            } => AuthResult::failed(error),
            FaceLoginResponse { distance, .. } => {
                info!(?distance, "Face not recognized");
                AuthResult::failed(FACE_NOT_RECOGNIZED)
            }
        }
    }

    fn finish(&self, endpoint: &str, outcome: Result<String, ApiError>) -> AuthResult {
        let result = match outcome {
            Ok(token) => AuthResult::ok(token),
            Err(e) => {
                warn!(endpoint = endpoint, error = %e, "Submission failed");
                AuthResult::from(e)
            }
        };
        self.install(endpoint, result)
    }

    fn install(&self, endpoint: &str, result: AuthResult) -> AuthResult {
        if result.success {
            if let Some(ref token) = result.token {
                self.store.set(token);
            }
            info!(endpoint = endpoint, "Submission accepted");
        }
        result
    }
}

fn require(value: &str, missing: ValidationError) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(missing)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use std::time::Duration;
    use wiremock::matchers::{any, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn service_for(base_url: &str) -> SubmissionService {
        let client = AuthClient::with_base_url(base_url, Duration::from_secs(5)).expect("client should build");
        SubmissionService::new(client, Arc::new(SessionStore::in_memory()))
    }

    fn frames() -> Vec<String> {
        vec!["f0".to_string(), "f1".to_string(), "f2".to_string()]
    }

    /// A server that fails the test if anything reaches it
    async fn silent_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_api_error_normalization() {
        assert_eq!(
            AuthResult::from(ApiError::Rejected("invalid credentials".to_string())),
            AuthResult::failed("invalid credentials")
        );
        assert_eq!(AuthResult::from(ApiError::Unauthorized), AuthResult::failed(UNAUTHORIZED_ERROR));
        assert!(AuthResult::from(ApiError::ServerError("boom".to_string())).is_network_failure());
        assert!(AuthResult::from(ApiError::InvalidResponse("?".to_string())).is_network_failure());
    }

    #[test]
    fn test_face_outcome_shapes() {
        let ok = SubmissionService::face_outcome(FaceLoginResponse {
            success: true,
            access_token: Some("t".to_string()),
            ..Default::default()
        });
        assert_eq!(ok, AuthResult::ok("t".to_string()));

        let no_token = SubmissionService::face_outcome(FaceLoginResponse {
            success: true,
            ..Default::default()
        });
        assert!(no_token.is_network_failure());

        let mismatch = SubmissionService::face_outcome(FaceLoginResponse {
            distance: Some(0.7),
            ..Default::default()
        });
        assert_eq!(mismatch.error.as_deref(), Some(FACE_NOT_RECOGNIZED));

        let server_error = SubmissionService::face_outcome(FaceLoginResponse {
            error: Some("User not found or no face registered".to_string()),
            ..Default::default()
        });
        assert_eq!(server_error.error.as_deref(), Some("User not found or no face registered"));
    }

    #[tokio::test]
    async fn test_empty_inputs_never_reach_network() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = silent_server().await;
        let service = service_for(&server.uri());

        assert_eq!(service.submit_password("", "secret").await, Err(ValidationError::MissingUsername));
        assert_eq!(service.submit_password("alice", "").await, Err(ValidationError::MissingPassword));
        assert_eq!(service.register("", "secret", &frames()).await, Err(ValidationError::MissingUsername));
        assert_eq!(service.register("alice", "", &frames()).await, Err(ValidationError::MissingPassword));
        assert_eq!(service.register("alice", "secret", &[]).await, Err(ValidationError::MissingImages));
        assert_eq!(service.submit_face_capture("", &frames()).await, Err(ValidationError::MissingUsername));
        assert_eq!(service.submit_face_capture("alice", &[]).await, Err(ValidationError::MissingImages));
        assert!(!service.store().is_present());
    }

    #[tokio::test]
    async fn test_face_login_sends_only_first_frame() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-face"))
            .and(body_json(json!({"username": "alice", "image": "f0"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "distance": 0.31,
                "access_token": "face-tok",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let result = service
            .submit_face_capture("alice", &frames())
            .await
            .expect("inputs are valid");
        assert_eq!(result, AuthResult::ok("face-tok".to_string()));
        assert_eq!(service.store().get().as_deref(), Some("face-tok"));
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_store_untouched() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-password"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "invalid credentials"})))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let result = service.submit_password("alice", "wrong").await.expect("inputs are valid");
        assert_eq!(
            result,
            AuthResult {
                success: false,
                token: None,
                error: Some("invalid credentials".to_string()),
            }
        );
        assert!(!service.store().is_present());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-password"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "invalid credentials"})))
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        service.store().set("old");
        let result = service.submit_password("alice", "wrong").await.expect("inputs are valid");
        assert!(!result.success);
        assert_eq!(service.store().get().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Grab a free port and release it so nothing is listening there
        let port = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener.local_addr().expect("local addr").port(),
            Err(_) => {
                eprintln!("Skipping test: cannot bind localhost");
                return;
            }
        };
        let service = service_for(&format!("http://127.0.0.1:{}", port));

        let result = service.submit_password("alice", "secret").await.expect("inputs are valid");
        assert_eq!(result, AuthResult::network());
        let result = service.register("alice", "secret", &frames()).await.expect("inputs are valid");
        assert_eq!(result, AuthResult::network());
        let result = service
            .submit_face_capture("alice", &frames())
            .await
            .expect("inputs are valid");
        assert_eq!(result, AuthResult::network());
        assert!(!service.store().is_present());
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_network_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-password"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let result = service.submit_password("alice", "secret").await.expect("inputs are valid");
        assert!(result.is_network_failure());
        assert!(!service.store().is_present());
    }

    #[tokio::test]
    async fn test_register_duplicate_user_reports_detail() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Username already exists"})))
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let result = service.register("alice", "secret", &frames()).await.expect("inputs are valid");
        assert_eq!(result, AuthResult::failed("Username already exists"));
    }

    #[tokio::test]
    async fn test_submit_dispatches_on_credential() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login-password"))
            .and(body_json(json!({"username": "bob", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "pw-tok"})))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server.uri());
        let credential = Credential::Password {
            username: "bob".to_string(),
            password: "pw".to_string(),
        };
        let result = service.submit(&credential).await.expect("inputs are valid");
        assert!(result.success);

        service.logout();
        assert!(!service.store().is_present());
    }
}
