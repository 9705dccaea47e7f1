use thiserror::Error;

/// Missing required local input. Raised before any request is built, so a
/// `ValidationError` never reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username is required")]
    MissingUsername,

    #[error("Password is required")]
    MissingPassword,

    #[error("At least one captured image is required")]
    MissingImages,
}

/// Failure categories a view can react to.
///
/// Validation and device failures come back as typed errors from the call
/// that caused them. Network, auth and response-shape failures are folded
/// into [`AuthResult::error`](crate::auth::AuthResult) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DeviceUnavailable,
    Network,
    Auth,
    UnexpectedResponse,
}
