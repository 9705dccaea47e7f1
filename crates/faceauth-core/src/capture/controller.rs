use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ErrorKind;

use super::device::{DeviceError, DeviceProvider, VideoDevice};
use super::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(DeviceError),

    #[error("Camera is not ready")]
    NotReady,

    #[error("A capture is already in progress")]
    Busy,

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Camera has been released")]
    Released,

    #[error("Frame capture failed: {0}")]
    Frame(DeviceError),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::DeviceUnavailable(_) | CaptureError::Frame(_) => ErrorKind::DeviceUnavailable,
            _ => ErrorKind::Validation,
        }
    }
}

/// Controller lifecycle.
///
/// `Inactive → Acquiring → Ready ⇄ Capturing → Submitting → Ready`, with
/// `Unavailable` after a failed acquisition and `Released` after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Acquiring,
    Ready,
    Capturing,
    Submitting,
    Unavailable,
    Released,
}

/// Frames grabbed per trigger. Fixed by the authenticator protocol.
pub const FRAMES_PER_CAPTURE: usize = 3;

/// Minimum spacing between two consecutive grabs.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(300);

/// Capture protocol parameters.
///
/// Frame count and spacing are not configurable; only the still encoding
/// comes from [`Config`].
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    frame_count: usize,
    frame_interval: Duration,
    mime: String,
}

impl CaptureConfig {
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            frame_count: FRAMES_PER_CAPTURE,
            frame_interval: MIN_FRAME_INTERVAL,
            mime: mime.into(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Shorter spacing so flow tests running on the real clock stay fast
    #[cfg(test)]
    pub(crate) fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CaptureConfig {
    fn from(config: &Config) -> Self {
        Self::new(config.image_mime.clone())
    }
}

/// Exclusive hold on an acquired camera. Dropping it releases the device.
pub struct CaptureSession {
    device: Box<dyn VideoDevice>,
    released: bool,
}

impl CaptureSession {
    pub fn new(device: Box<dyn VideoDevice>) -> Self {
        Self {
            device,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.device.release();
            self.released = true;
            info!("Camera released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the camera for one view and runs capture cycles on it.
///
/// At most one capture (or capture-then-submit) cycle runs at a time; a
/// second trigger from any path is refused with [`CaptureError::Busy`].
/// Cancelling the token handed to [`CaptureController::new`] (or calling
/// [`CaptureController::teardown`]) aborts the cycle, discards partial
/// frames and releases the device.
pub struct CaptureController {
    provider: Arc<dyn DeviceProvider>,
    config: CaptureConfig,
    state: Mutex<CaptureState>,
    session: tokio::sync::Mutex<Option<CaptureSession>>,
    in_flight: AtomicBool,
    device_error: Mutex<Option<DeviceError>>,
    cancel: CancellationToken,
}

impl CaptureController {
    pub fn new(provider: Arc<dyn DeviceProvider>, config: CaptureConfig, cancel: CancellationToken) -> Self {
        Self {
            provider,
            config,
            state: Mutex::new(CaptureState::Inactive),
            session: tokio::sync::Mutex::new(None),
            in_flight: AtomicBool::new(false),
            device_error: Mutex::new(None),
            cancel,
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: CaptureState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // Released is terminal
        if *state != CaptureState::Released && *state != next {
            debug!(from = ?*state, to = ?next, "Capture state change");
            *state = next;
        }
    }

    /// Back to `Ready` once a cycle that actually started has ended
    fn finish_cycle(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, CaptureState::Capturing | CaptureState::Submitting) {
            *state = CaptureState::Ready;
        }
    }

    /// Why the last acquisition failed, while the controller is `Unavailable`
    pub fn device_error(&self) -> Option<DeviceError> {
        self.device_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether a capture trigger would currently be accepted
    pub fn is_trigger_enabled(&self) -> bool {
        self.state() == CaptureState::Ready && !self.in_flight.load(Ordering::SeqCst)
    }

    /// Acquire the default camera.
    ///
    /// Activating an already acquired camera is a no-op; activating while
    /// another acquisition is still pending is refused with `NotReady`.
    /// After a failure the controller is `Unavailable` and activation may be
    /// retried.
    pub async fn activate(&self) -> Result<(), CaptureError> {
        match self.state() {
            CaptureState::Inactive | CaptureState::Unavailable => {}
            CaptureState::Acquiring => return Err(CaptureError::NotReady),
            CaptureState::Released => return Err(CaptureError::Released),
            CaptureState::Ready | CaptureState::Capturing | CaptureState::Submitting => return Ok(()),
        }
        if self.cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }
        self.set_state(CaptureState::Acquiring);

        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CaptureError::Cancelled),
            result = self.provider.acquire_default() => result,
        };

        let session = match acquired {
            Ok(device) => CaptureSession::new(device),
            Err(e) => {
                warn!(error = %e, "Camera acquisition failed");
                *self.device_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(e.clone());
                self.set_state(CaptureState::Unavailable);
                return Err(CaptureError::DeviceUnavailable(e));
            }
        };

        let mut slot = self.session.lock().await;
        if self.cancel.is_cancelled() {
            // View went away while the permission prompt was open
            drop(session);
            return Err(CaptureError::Cancelled);
        }
        *slot = Some(session);
        self.device_error.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.set_state(CaptureState::Ready);
        info!("Camera acquired");
        Ok(())
    }

    fn begin(&self) -> Result<InFlight<'_>, CaptureError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CaptureError::Busy)?;
        Ok(InFlight(&self.in_flight))
    }

    /// Run one capture cycle and return the frames in capture order
    pub async fn capture(&self) -> Result<Vec<Frame>, CaptureError> {
        let _flight = self.begin()?;
        let frames = self.capture_frames().await;
        self.finish_cycle();
        frames
    }

    /// Capture, then hand the frames to `submit` while the trigger stays
    /// disabled. Nothing is submitted unless the full cycle completed.
    pub async fn capture_then<F, Fut, T>(&self, submit: F) -> Result<T, CaptureError>
    where
        F: FnOnce(Vec<Frame>) -> Fut,
        Fut: Future<Output = T>,
    {
        let _flight = self.begin()?;
        let frames = match self.capture_frames().await {
            Ok(frames) => frames,
            Err(e) => {
                self.finish_cycle();
                return Err(e);
            }
        };

        self.set_state(CaptureState::Submitting);
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CaptureError::Cancelled),
            value = submit(frames) => Ok(value),
        };
        self.finish_cycle();
        outcome
    }

    async fn capture_frames(&self) -> Result<Vec<Frame>, CaptureError> {
        match self.state() {
            CaptureState::Ready => {}
            CaptureState::Released => return Err(CaptureError::Released),
            CaptureState::Unavailable => {
                return Err(self
                    .device_error()
                    .map_or(CaptureError::NotReady, CaptureError::DeviceUnavailable));
            }
            _ => return Err(CaptureError::NotReady),
        }
        self.set_state(CaptureState::Capturing);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CaptureError::Cancelled),
            frames = self.grab_sequence() => frames,
        };
        if let Err(ref e) = result {
            warn!(error = %e, "Capture aborted, discarding frames");
        }
        result
    }

    async fn grab_sequence(&self) -> Result<Vec<Frame>, CaptureError> {
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or(CaptureError::Released)?;

        let mut frames: Vec<Frame> = Vec::with_capacity(self.config.frame_count);
        for index in 0..self.config.frame_count {
            if let Some(previous) = frames.last() {
                tokio::time::sleep_until(previous.captured_at + self.config.frame_interval).await;
            }

            // Re-read every frame; the stream may settle on a resolution late
            let (width, height) = match session.device.dimensions() {
                Some(dims) => dims,
                None => {
                    warn!(index, "Camera has not reported dimensions, capturing anyway");
                    (0, 0)
                }
            };

            let data = session
                .device
                .grab(width, height)
                .await
                .map_err(CaptureError::Frame)?;
            debug!(index, width, height, bytes = data.len(), "Frame captured");
            frames.push(Frame {
                index,
                width,
                height,
                mime: self.config.mime.clone(),
                data,
                captured_at: Instant::now(),
            });
        }
        Ok(frames)
    }

    /// Cancel any cycle in progress and release the camera.
    ///
    /// Safe to call repeatedly and from any state. Dropping the controller
    /// releases the camera as well.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        self.set_state(CaptureState::Released);
        if self.session.lock().await.take().is_some() {
            debug!("Capture controller torn down");
        }
    }
}
