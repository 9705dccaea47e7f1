//! REST client module for the remote authenticator.
//!
//! This module provides the `AuthClient` for the register, password login,
//! face login and identity endpoints. Failure statuses are mapped to
//! `ApiError`, carrying the server's `detail`/`error` text when present.
//!
//! Authenticated requests use a JWT bearer token issued by a successful
//! login or registration.

pub mod client;
pub mod error;

pub use client::{AuthClient, FaceLoginResponse, TokenResponse};
pub use error::ApiError;
