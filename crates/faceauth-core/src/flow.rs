//! View sequencing: Home → Register → Login → Success.
//!
//! `ViewFlow` owns the services for one client and the lifetime of whichever
//! view is mounted. Every mounted view gets a `ViewScope`; navigating away
//! cancels it, which tears down the view's camera and discards the results
//! of anything still running under that scope.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::AuthClient;
use crate::auth::{AuthResult, GuardState, Identity, SessionGuard, SessionStore, SubmissionService};
use crate::capture::{encode_frames, CaptureConfig, CaptureController, CaptureError, DeviceError, DeviceProvider};
use crate::config::Config;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum View {
    Home,
    Register,
    Login,
    Success,
}

impl View {
    /// Views that need a verified session
    pub fn is_protected(&self) -> bool {
        matches!(self, View::Success)
    }

    /// Views that mount a camera
    pub fn captures(&self) -> bool {
        matches!(self, View::Register | View::Login)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Action not available on the {0:?} view")]
    WrongView(View),
}

/// Lifetime of one mounted view.
#[derive(Debug, Clone)]
pub struct ViewScope {
    view: View,
    token: CancellationToken,
}

impl ViewScope {
    fn new(view: View, parent: &CancellationToken) -> Self {
        Self {
            view,
            token: parent.child_token(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Token that fires when the view is torn down
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run `work` for this view. `None` means the view was torn down first
    /// and the result was dropped.
    pub async fn run<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(view = ?self.view, "Discarding result for torn down view");
                None
            }
            output = work => Some(output),
        }
    }

    fn close(&self) {
        self.token.cancel();
    }
}

pub struct ViewFlow {
    store: Arc<SessionStore>,
    submission: Arc<SubmissionService>,
    guard: SessionGuard,
    provider: Arc<dyn DeviceProvider>,
    capture_config: CaptureConfig,
    root: CancellationToken,
    scope: ViewScope,
    controller: Option<Arc<CaptureController>>,
    guard_state: GuardState,
}

impl ViewFlow {
    pub fn new(
        client: AuthClient,
        store: Arc<SessionStore>,
        provider: Arc<dyn DeviceProvider>,
        capture_config: CaptureConfig,
    ) -> Self {
        let root = CancellationToken::new();
        let guard = SessionGuard::new(client.clone(), store.clone());
        let guard_state = guard.initial_state();
        Self {
            submission: Arc::new(SubmissionService::new(client, store.clone())),
            store,
            guard,
            provider,
            capture_config,
            scope: ViewScope::new(View::Home, &root),
            root,
            controller: None,
            guard_state,
        }
    }

    /// Wire everything up from configuration: HTTP client, persisted store
    /// and capture parameters.
    pub fn from_config(config: &Config, provider: Arc<dyn DeviceProvider>) -> Result<Self> {
        let client = AuthClient::new(config)?;
        let store = SessionStore::from_config(config)?;
        Ok(Self::new(client, store, provider, CaptureConfig::from(config)))
    }

    pub fn current(&self) -> View {
        self.scope.view()
    }

    pub fn scope(&self) -> ViewScope {
        self.scope.clone()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn submission(&self) -> Arc<SubmissionService> {
        self.submission.clone()
    }

    /// Camera controller of the mounted view, if it captures
    pub fn capture(&self) -> Option<Arc<CaptureController>> {
        self.controller.clone()
    }

    /// Why the mounted view's camera could not be acquired, if it failed
    pub fn device_error(&self) -> Option<DeviceError> {
        self.controller.as_ref().and_then(|c| c.device_error())
    }

    pub fn guard_state(&self) -> &GuardState {
        &self.guard_state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.guard_state.identity()
    }

    /// Tear down the current view and mount `to`.
    ///
    /// Entering a protected view runs the session guard once; if it reports
    /// logged out the flow lands on Login instead. Returns the view actually
    /// mounted.
    pub async fn navigate(&mut self, to: View) -> View {
        let mut target = to;
        loop {
            self.unmount().await;
            self.scope = ViewScope::new(target, &self.root);
            info!(view = ?target, "View mounted");

            if target.captures() {
                let controller = Arc::new(CaptureController::new(
                    self.provider.clone(),
                    self.capture_config.clone(),
                    self.scope.token(),
                ));
                // The view stays mounted without a camera; the reason is
                // kept on the controller and reported by `device_error`.
                if let Err(e) = controller.activate().await {
                    warn!(view = ?target, error = %e, "Camera unavailable for view");
                }
                self.controller = Some(controller);
            }

            if !target.is_protected() {
                return target;
            }

            self.guard_state = self.guard.enter().await;
            if self.guard_state.is_verified() {
                return target;
            }
            target = View::Login;
        }
    }

    async fn unmount(&mut self) {
        self.scope.close();
        if let Some(controller) = self.controller.take() {
            controller.teardown().await;
        }
    }

    /// Move on after a submission: Success when it was accepted, otherwise
    /// stay put so the user can retry.
    pub async fn after_submission(&mut self, result: &AuthResult) -> View {
        if result.success {
            self.navigate(View::Success).await
        } else {
            self.current()
        }
    }

    /// Clear the session and go Home
    pub async fn logout(&mut self) -> View {
        self.submission.logout();
        self.guard_state = GuardState::LoggedOut;
        self.navigate(View::Home).await
    }

    /// Password login from the Login view.
    ///
    /// The returned future owns everything it needs and does not borrow the
    /// flow, so the host can keep navigating while it runs. It resolves to
    /// `None` if the view is torn down first; a late token is then never
    /// installed.
    pub fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Option<Result<AuthResult, FlowError>>> + 'static {
        let mounted = self.require(View::Login);
        let scope = self.scope.clone();
        let submission = self.submission.clone();
        let username = username.to_string();
        let password = password.to_string();
        async move {
            if let Err(e) = mounted {
                return Some(Err(e));
            }
            scope
                .run(submission.submit_password(&username, &password))
                .await
                .map(|r| r.map_err(FlowError::from))
        }
    }

    /// Capture a cycle and log in with it from the Login view. Detached from
    /// the flow like [`ViewFlow::login_with_password`].
    pub fn login_with_face(&self, username: &str) -> impl Future<Output = Option<Result<AuthResult, FlowError>>> + 'static {
        let prepared = if username.is_empty() {
            Err(ValidationError::MissingUsername.into())
        } else {
            self.capture_for(View::Login)
        };
        let submission = self.submission.clone();
        let username = username.to_string();
        async move {
            let controller = match prepared {
                Ok(controller) => controller,
                Err(e) => return Some(Err(e)),
            };
            let outcome = controller
                .capture_then(move |frames| async move {
                    let images = encode_frames(&frames);
                    submission.submit_face_capture(&username, &images).await
                })
                .await;
            settle(outcome)
        }
    }

    /// Capture a cycle and create an account from the Register view.
    /// Detached from the flow like [`ViewFlow::login_with_password`].
    pub fn register(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Option<Result<AuthResult, FlowError>>> + 'static {
        let prepared = if username.is_empty() {
            Err(ValidationError::MissingUsername.into())
        } else if password.is_empty() {
            Err(ValidationError::MissingPassword.into())
        } else {
            self.capture_for(View::Register)
        };
        let submission = self.submission.clone();
        let username = username.to_string();
        let password = password.to_string();
        async move {
            let controller = match prepared {
                Ok(controller) => controller,
                Err(e) => return Some(Err(e)),
            };
            let outcome = controller
                .capture_then(move |frames| async move {
                    let images = encode_frames(&frames);
                    submission.register(&username, &password, &images).await
                })
                .await;
            settle(outcome)
        }
    }

    fn require(&self, view: View) -> Result<(), FlowError> {
        if self.current() != view {
            return Err(FlowError::WrongView(self.current()));
        }
        Ok(())
    }

    fn capture_for(&self, view: View) -> Result<Arc<CaptureController>, FlowError> {
        self.require(view)?;
        self.controller
            .clone()
            .ok_or(FlowError::Capture(CaptureError::NotReady))
    }
}

/// Cancelled cycles belong to a torn down view and produce no result
fn settle(outcome: Result<Result<AuthResult, ValidationError>, CaptureError>) -> Option<Result<AuthResult, FlowError>> {
    match outcome {
        Err(CaptureError::Cancelled) => None,
        Err(e) => Some(Err(e.into())),
        Ok(result) => Some(result.map_err(FlowError::from)),
    }
}

impl Drop for ViewFlow {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
