//! Authentication module: token ownership, credential submission and the
//! protected-view guard.
//!
//! This module provides:
//! - `SessionStore`: the single owner of the bearer token, persisted through
//!   a `TokenStorage` backend (file, OS keychain or memory)
//! - `SubmissionService`: password, face and registration submissions
//!   normalized into `AuthResult`
//! - `SessionGuard`: one `/me` check per protected-view entry

pub mod credentials;
pub mod guard;
pub mod session;
pub mod storage;
pub mod submit;

pub use credentials::KeyringStorage;
pub use guard::{GuardState, Identity, SessionGuard};
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, StoredSession, TokenStorage};
pub use submit::{AuthResult, Credential, SubmissionService, NETWORK_ERROR};
