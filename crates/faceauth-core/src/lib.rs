//! Client-side authentication with two interchangeable factors: a password
//! or a short burst of captured face images.
//!
//! The crate is organized leaf-first:
//! - [`auth::SessionStore`] owns the bearer token and its persistence
//! - [`capture::CaptureController`] owns the camera and the capture protocol
//! - [`auth::SubmissionService`] talks to the authenticator and installs
//!   issued tokens
//! - [`auth::SessionGuard`] verifies the token on protected-view entry
//! - [`flow::ViewFlow`] sequences the views and scopes their async work
//!
//! Hosts provide the camera through [`capture::DeviceProvider`]; everything
//! else is configured through [`config::Config`].

pub mod api;
pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod flow;
pub mod telemetry;

pub use auth::{AuthResult, Credential, GuardState, Identity, SessionGuard, SessionStore, SubmissionService};
pub use capture::{CaptureController, CaptureError, Frame};
pub use config::Config;
pub use error::{ErrorKind, ValidationError};
pub use flow::{View, ViewFlow};
