use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::AuthClient;

use super::SessionStore;

/// Who the authenticator says the token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Identity {
    pub username: String,
}

/// Verification state of a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// A token is stored but has not been confirmed yet
    Unverified,
    Verified(Identity),
    /// No usable token; the view should send the user to Login
    LoggedOut,
}

impl GuardState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            GuardState::Verified(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, GuardState::Verified(_))
    }
}

/// Checks the stored token once on entry to a protected view.
///
/// The guard reads and clears the session but never writes a token.
pub struct SessionGuard {
    client: AuthClient,
    store: Arc<SessionStore>,
}

impl SessionGuard {
    pub fn new(client: AuthClient, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    /// State before any check has run
    pub fn initial_state(&self) -> GuardState {
        if self.store.is_present() {
            GuardState::Unverified
        } else {
            GuardState::LoggedOut
        }
    }

    /// Verify the stored token against `/me`.
    ///
    /// No token means no request. Any failure, including transport errors,
    /// evicts the checked token, unless a newer one was installed while the
    /// check was running.
    pub async fn enter(&self) -> GuardState {
        let token = match self.store.get() {
            Some(token) => token,
            None => {
                debug!("No stored token, protected view is logged out");
                return GuardState::LoggedOut;
            }
        };

        if let Some(age) = self.store.age() {
            debug!(age_minutes = age.num_minutes(), "Verifying stored token");
        }

        match self.client.me(&token).await {
            Ok(identity) => {
                info!(username = %identity.username, "Session verified");
                GuardState::Verified(identity)
            }
            Err(e) => {
                warn!(error = %e, "Session verification failed, clearing token");
                if !self.store.clear_if(&token) {
                    debug!("Token replaced during verification, keeping the new one");
                }
                GuardState::LoggedOut
            }
        }
    }
}
